//! Domain-specific error types for staffdesk
//!
//! - **EditError**: the edit-session taxonomy surfaced to hosts (local
//!   validation, backend rejections, session-contract violations)
//! - **GatewayError**: transport-level outcomes of the persistence gateway,
//!   mapped from HTTP status classes

pub mod edit;
pub mod gateway;

pub use edit::EditError;
pub use gateway::GatewayError;

/// Result type alias for edit-session operations
pub type EditResult<T> = Result<T, EditError>;

/// Result type alias for gateway calls
pub type GatewayResult<T> = Result<T, GatewayError>;

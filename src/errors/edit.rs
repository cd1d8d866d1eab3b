//! Edit-session error taxonomy
//!
//! Local validation failures never reach the network and keep the field in
//! edit mode; everything network-originated rolls the field back to its last
//! committed value.

use thiserror::Error;

use super::gateway::GatewayError;

/// Errors surfaced by the edit session and its field controllers
#[derive(Error, Debug)]
pub enum EditError {
    /// Local validation failure; the save is blocked before any network call
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// Backend rejected the update (HTTP 400) with a field-specific message
    #[error("{field}: {message}")]
    Rejected { field: String, message: String },

    /// Caller is not allowed to update the record (HTTP 401/403)
    #[error("not authorized to update this record")]
    Unauthorized,

    /// Record vanished between load and save (HTTP 404)
    #[error("record no longer exists")]
    NotFound,

    /// Network failure or server fault (5xx)
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Field name is not in the descriptor registry
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// Field is marked read-only and cannot be activated
    #[error("field '{0}' is read-only")]
    ReadOnly(String),

    /// Another field is already in edit mode or has a save in flight
    #[error("field '{0}' is already being edited")]
    AnotherFieldActive(String),

    /// Operation requires an active field and none is
    #[error("no field is being edited")]
    NoActiveField,

    /// Field cannot be activated in the record's current state
    #[error("field '{0}' cannot be edited right now")]
    NotActivatable(String),

    /// A different value is already on its way to the backend for this field
    #[error("a save is already in flight for '{0}'")]
    SaveInFlight(String),

    /// The session was closed; no further edits are accepted
    #[error("the edit session has been closed")]
    SessionClosed,

    /// Backend payload could not be interpreted as a record
    #[error("malformed record payload: {0}")]
    MalformedRecord(String),
}

impl EditError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EditError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a local validation failure (never hit the wire)
    pub fn is_validation(&self) -> bool {
        matches!(self, EditError::Validation { .. })
    }

    /// Check if this error originated from the backend or the network
    pub fn is_network_originated(&self) -> bool {
        matches!(
            self,
            EditError::Rejected { .. }
                | EditError::Unauthorized
                | EditError::NotFound
                | EditError::Unavailable(_)
        )
    }

    /// Get error code for host-facing presentation
    pub fn error_code(&self) -> &'static str {
        match self {
            EditError::Validation { .. } => "VALIDATION_FAILED",
            EditError::Rejected { .. } => "REQUEST_REJECTED",
            EditError::Unauthorized => "UNAUTHORIZED",
            EditError::NotFound => "NOT_FOUND",
            EditError::Unavailable(_) => "UNAVAILABLE",
            EditError::UnknownField(_) => "UNKNOWN_FIELD",
            EditError::ReadOnly(_) => "READ_ONLY",
            EditError::AnotherFieldActive(_) => "FIELD_BUSY",
            EditError::NoActiveField => "NO_ACTIVE_FIELD",
            EditError::NotActivatable(_) => "NOT_ACTIVATABLE",
            EditError::SaveInFlight(_) => "SAVE_IN_FLIGHT",
            EditError::SessionClosed => "SESSION_CLOSED",
            EditError::MalformedRecord(_) => "MALFORMED_RECORD",
        }
    }

    /// Classify a gateway failure against the field it was saving
    pub fn from_gateway(field: &str, err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { message, fields } => {
                // The backend keys messages by field name; surface the message
                // for the saved field when present, otherwise the first one.
                let message = fields
                    .get(field)
                    .cloned()
                    .or_else(|| fields.values().next().cloned())
                    .unwrap_or(message);
                EditError::Rejected {
                    field: field.to_string(),
                    message,
                }
            }
            GatewayError::Unauthorized => EditError::Unauthorized,
            GatewayError::NotFound => EditError::NotFound,
            GatewayError::Unavailable(message) => EditError::Unavailable(message),
        }
    }
}

/// Field-less classification for calls outside the save path (listings,
/// snapshot loads). A 400 on those is a backend fault from the session's
/// perspective.
impl From<GatewayError> for EditError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { message, .. } => EditError::Unavailable(message),
            GatewayError::Unauthorized => EditError::Unauthorized,
            GatewayError::NotFound => EditError::NotFound,
            GatewayError::Unavailable(message) => EditError::Unavailable(message),
        }
    }
}

//! Persistence-gateway error types
//!
//! One variant per backend outcome class. The HTTP client maps status codes
//! onto these; in-process fakes construct them directly.

use std::collections::BTreeMap;

use thiserror::Error;

/// Transport-level outcome of a gateway call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// HTTP 400; the body carries per-field messages
    #[error("request rejected: {message}")]
    Rejected {
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// HTTP 401 or 403
    #[error("not authorized")]
    Unauthorized,

    /// HTTP 404
    #[error("resource not found")]
    NotFound,

    /// Network failure or HTTP 5xx
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn rejected(message: impl Into<String>) -> Self {
        GatewayError::Rejected {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        GatewayError::Unavailable(message.into())
    }

    /// Build a rejection from a 400 response body.
    ///
    /// The backend answers validation failures with an object keyed by field
    /// name; each value is either a message or an array of messages. Anything
    /// else degrades to a generic rejection.
    pub fn rejection_from_body(body: &serde_json::Value) -> Self {
        let mut fields = BTreeMap::new();

        if let Some(map) = body.as_object() {
            for (field, messages) in map {
                let message = match messages {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Array(items) => {
                        items.first().and_then(|v| v.as_str()).map(String::from)
                    }
                    _ => None,
                };
                if let Some(message) = message {
                    fields.insert(field.clone(), message);
                }
            }
        }

        let message = fields
            .values()
            .next()
            .cloned()
            .unwrap_or_else(|| "the backend rejected the update".to_string());

        GatewayError::Rejected { message, fields }
    }
}

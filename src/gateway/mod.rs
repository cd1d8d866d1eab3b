//! Persistence gateway: the backend contracts the edit engine consumes
//!
//! Three surfaces, all stateless per call:
//! - `PATCH /<resource>/<id>/`: partial update (JSON, or multipart when an
//!   attachment field is included)
//! - `GET /<resource>/`: record listing (manager pool, snapshot helper)
//! - `GET /masters/<collection>/`: reference-data listing

pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::errors::GatewayResult;
use crate::fields::MasterCollection;

pub use http::HttpGateway;

/// A file picked by the operator for an attachment field
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One row of `GET /masters/<collection>/`
#[derive(Debug, Clone, Deserialize)]
pub struct MasterEntry {
    #[serde(default)]
    pub id: Option<Value>,
    pub name: String,
    #[serde(default)]
    pub status: Option<Value>,
}

impl MasterEntry {
    /// Stable code for the entry: the id when present, otherwise the name
    pub fn code(&self) -> String {
        match &self.id {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => self.name.clone(),
        }
    }

    /// Absence of a status field is treated as implicitly active
    pub fn is_active(&self) -> bool {
        match &self.status {
            None => true,
            Some(status) => status_is_active(status),
        }
    }
}

/// Interpret a wire `status` value; absent/null means active
pub fn status_is_active(status: &Value) -> bool {
    match status {
        Value::Null => true,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() != Some(0),
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || s.eq_ignore_ascii_case("active") || s == "1" || s.eq_ignore_ascii_case("true")
        }
        _ => true,
    }
}

/// Backend operations consumed by the edit engine
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Partial update; returns the server's full or partial representation
    /// of the updated record.
    async fn patch_record(
        &self,
        resource: &str,
        id: &str,
        changes: &serde_json::Map<String, Value>,
    ) -> GatewayResult<Value>;

    /// Multipart partial update carrying one attachment field. Transfer
    /// progress (0–100) is reported through `progress`.
    async fn upload_attachment(
        &self,
        resource: &str,
        id: &str,
        field: &str,
        upload: &AttachmentUpload,
        progress: watch::Sender<u8>,
    ) -> GatewayResult<Value>;

    /// Full record listing for the resource
    async fn list_records(&self, resource: &str) -> GatewayResult<Vec<Value>>;

    /// Reference-data listing for one master collection
    async fn list_master(&self, collection: MasterCollection) -> GatewayResult<Vec<MasterEntry>>;
}

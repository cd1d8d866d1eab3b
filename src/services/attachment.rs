//! Attachment field operations
//!
//! Attachments reuse the field-controller states but skip the activate/blur
//! cycle: picking a file dispatches the save immediately as a multipart
//! partial update keyed by field name. Transfer progress is observable while
//! the save is in flight.

use tokio::sync::watch;

use crate::errors::EditResult;
use crate::gateway::AttachmentUpload;

use super::edit_session::EditSession;

/// What an attachment save carries to the backend
#[derive(Debug, Clone)]
pub enum AttachmentOp {
    /// Replace (or set) the stored file
    Upload(AttachmentUpload),
    /// Clear the field; the same partial-update call with a null value
    Delete,
}

/// Observable transfer progress (0–100) of the in-flight upload
#[derive(Debug, Clone)]
pub struct AttachmentProgress {
    rx: watch::Receiver<u8>,
}

impl AttachmentProgress {
    pub(crate) fn new(rx: watch::Receiver<u8>) -> Self {
        AttachmentProgress { rx }
    }

    pub fn percent(&self) -> u8 {
        *self.rx.borrow()
    }
}

/// Host-facing handle for one attachment field of the open record.
///
/// Obtained from [`EditSession::attachment`]; both operations queue the save
/// and return immediately; the session's `flush` performs the transfer.
pub struct AttachmentController<'s> {
    pub(crate) session: &'s mut EditSession,
    pub(crate) field: &'static str,
}

impl std::fmt::Debug for AttachmentController<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentController")
            .field("field", &self.field)
            .finish()
    }
}

impl AttachmentController<'_> {
    pub fn field(&self) -> &str {
        self.field
    }

    /// Dispatch an upload for this field immediately (no edit mode)
    pub fn upload(self, upload: AttachmentUpload) -> EditResult<()> {
        self.session
            .queue_attachment(self.field, AttachmentOp::Upload(upload))
    }

    /// Clear the stored file for this field
    pub fn delete(self) -> EditResult<()> {
        self.session.queue_attachment(self.field, AttachmentOp::Delete)
    }
}

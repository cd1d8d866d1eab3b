//! Edit session: the per-record coordinator of the edit engine
//!
//! One session owns the in-memory draft of one record, decides which field
//! controller holds the single edit slot, applies the level to reporting
//! manager cascade, and talks to the persistence gateway.
//!
//! Commits are two-phase: a synchronous `commit` validates, normalizes and
//! queues the save (this is where the duplicate-save guard lives), then an
//! async `flush` performs the queued network call and applies the server's
//! authoritative response, or rolls the field back on failure. At most one
//! save is ever in flight, so the server's response always reflects the
//! session's own latest write.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::{EditError, EditResult};
use crate::fields::{self, FieldKind, FIELDS, LEVEL_FIELD, REPORTING_MANAGER_FIELD};
use crate::gateway::PersistenceGateway;
use crate::record::{display_value, Record, EMPTY_DISPLAY};

use super::attachment::{AttachmentController, AttachmentOp, AttachmentProgress};
use super::field_controller::{save_key, FieldController, FieldState};
use super::hierarchy::{Level, ManagerCandidate, ManagerHierarchyResolver};
use super::reference_data::ReferenceDataStore;

/// Result of the synchronous commit phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Value changed; a save is queued for `flush`
    Queued,
    /// Value identical to the committed one; no network call
    Unchanged,
    /// Identical commit already in flight; swallowed by the duplicate guard
    Suppressed,
}

/// Notifications hosts drain to drive toasts and list refreshes
#[derive(Debug, Clone, PartialEq)]
pub enum EditEvent {
    FieldSaved { field: String, value: Value },
    SaveFailed { field: String, message: String },
    /// The level changed and the reporting manager was cleared
    ManagerCleared { previous: Value },
    /// An attachment changed; list views should refresh their thumbnails
    AttachmentChanged { field: String },
}

/// A validated save waiting for `flush`
struct PendingSave {
    field: &'static str,
    body: Map<String, Value>,
    attachment: Option<AttachmentOp>,
    progress: Option<watch::Sender<u8>>,
    /// Previous manager value when this save also clears the manager
    cleared_manager: Option<Value>,
}

/// Coordinates all field edits for one open record
pub struct EditSession {
    gateway: Arc<dyn PersistenceGateway>,
    reference_data: Arc<ReferenceDataStore>,
    resource: String,
    record: Record,
    controllers: IndexMap<&'static str, FieldController>,
    active: Option<&'static str>,
    pending: Option<PendingSave>,
    upload_progress: Option<AttachmentProgress>,
    resolver: ManagerHierarchyResolver,
    events: VecDeque<EditEvent>,
    closed: bool,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("resource", &self.resource)
            .field("record", &self.record)
            .field("controllers", &self.controllers)
            .field("active", &self.active)
            .field("pending", &self.pending.is_some())
            .field("upload_progress", &self.upload_progress)
            .field("resolver", &self.resolver)
            .field("events", &self.events)
            .field("closed", &self.closed)
            .finish()
    }
}

impl EditSession {
    pub fn new(
        record: Record,
        gateway: Arc<dyn PersistenceGateway>,
        reference_data: Arc<ReferenceDataStore>,
        resource: impl Into<String>,
    ) -> Self {
        let controllers = FIELDS
            .values()
            .map(|desc| {
                let committed = record.get(desc.name).clone();
                (desc.name, FieldController::new(desc, committed))
            })
            .collect();

        EditSession {
            gateway,
            reference_data,
            resource: resource.into(),
            record,
            controllers,
            active: None,
            pending: None,
            upload_progress: None,
            resolver: ManagerHierarchyResolver::default(),
            events: VecDeque::new(),
            closed: false,
        }
    }

    /// Fetch the resource listing and open a session on the record with the
    /// given id. The backend exposes no single-record endpoint.
    pub async fn open(
        id: &str,
        gateway: Arc<dyn PersistenceGateway>,
        reference_data: Arc<ReferenceDataStore>,
        resource: impl Into<String>,
    ) -> EditResult<Self> {
        let resource = resource.into();
        let rows = gateway.list_records(&resource).await?;

        let payload = rows
            .iter()
            .find(|row| row.get("id").map(|v| id_matches(v, id)).unwrap_or(false))
            .ok_or(EditError::NotFound)?;

        let record = Record::from_value(payload)?;
        info!("opened edit session for {} {}", resource, record.id());
        Ok(EditSession::new(record, gateway, reference_data, resource))
    }

    /// Load reference data and the manager pool in parallel.
    ///
    /// Neither failure blocks the session: resolution degrades per tier and
    /// the candidate set stays empty until a pool arrives.
    pub async fn preload(&mut self) {
        let (pool, _) = tokio::join!(
            self.gateway.list_records(&self.resource),
            self.reference_data.load_all(),
        );

        match pool {
            Ok(rows) => {
                self.resolver = ManagerHierarchyResolver::from_records(&rows);
                debug!("manager pool loaded: {} employees", self.resolver.pool_size());
            }
            Err(err) => warn!("failed to load the employee pool: {}", err),
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn resolver(&self) -> &ManagerHierarchyResolver {
        &self.resolver
    }

    pub fn reference_data(&self) -> &ReferenceDataStore {
        &self.reference_data
    }

    pub fn controller(&self, field: &str) -> EditResult<&FieldController> {
        let desc = fields::descriptor(field)?;
        Ok(&self.controllers[desc.name])
    }

    pub fn active_field(&self) -> Option<&str> {
        self.active
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop applying results to this session. An in-flight save is allowed
    /// to complete; its response is discarded.
    pub fn close(&mut self) {
        debug!("closing edit session for record {}", self.record.id());
        self.closed = true;
    }

    /// Drain pending notifications
    pub fn take_events(&mut self) -> Vec<EditEvent> {
        self.events.drain(..).collect()
    }

    /// Enter edit mode on a field. Only one field across the record may be
    /// editing or saving at a time.
    pub fn activate(&mut self, field: &str) -> EditResult<()> {
        self.ensure_open()?;
        let desc = fields::descriptor(field)?;

        if desc.is_attachment() {
            // Attachments dispatch immediately on selection; there is no
            // edit mode to enter.
            return Err(EditError::NotActivatable(desc.name.to_string()));
        }

        if desc.name == REPORTING_MANAGER_FIELD {
            match self.effective_level() {
                Some(level) if !level.allowed_reporting_levels().is_empty() => {}
                _ => return Err(EditError::NotActivatable(desc.name.to_string())),
            }
        }

        if let Some(busy) = self.busy_field() {
            if busy != desc.name {
                return Err(EditError::AnotherFieldActive(busy.to_string()));
            }
        }

        self.controllers[desc.name].activate()?;
        self.active = Some(desc.name);
        debug!("field {} activated", desc.name);
        Ok(())
    }

    /// Replace the active field's draft; no side effects
    pub fn update_draft(&mut self, value: Value) -> EditResult<()> {
        self.ensure_open()?;
        let field = self.active.ok_or(EditError::NoActiveField)?;
        self.controllers[field].update(value)
    }

    /// Leave edit mode, discarding the draft
    pub fn cancel(&mut self) -> EditResult<()> {
        self.ensure_open()?;
        let field = self.active.ok_or(EditError::NoActiveField)?;
        match self.controllers[field].state() {
            FieldState::Saving => Err(EditError::SaveInFlight(field.to_string())),
            _ => {
                self.controllers[field].cancel();
                self.active = None;
                Ok(())
            }
        }
    }

    /// Synchronous commit phase: validate, normalize, and queue the save.
    ///
    /// An unchanged value goes straight back to viewing with no network
    /// call. A commit identical to the one already in flight is suppressed;
    /// this is the guard against key-press and focus-loss handlers both
    /// firing for the same interaction. Validation failures keep the field
    /// in edit mode.
    pub fn commit(&mut self) -> EditResult<CommitOutcome> {
        self.ensure_open()?;
        let field = self.active.ok_or(EditError::NoActiveField)?;
        let state = self.controllers[field].state();

        match state {
            FieldState::Saving => {
                let key = save_key(field, self.controllers[field].draft());
                if self.pending.is_some() && self.controllers[field].matches_attempt(&key) {
                    debug!("suppressed duplicate save for {}", field);
                    Ok(CommitOutcome::Suppressed)
                } else {
                    Err(EditError::SaveInFlight(field.to_string()))
                }
            }
            FieldState::Editing => {
                let desc = self.controllers[field].descriptor();
                let normalized = fields::normalize_and_validate(desc, self.controllers[field].draft())?;

                if &normalized == self.controllers[field].committed() {
                    self.controllers[field].cancel();
                    self.active = None;
                    debug!("unchanged commit for {}; skipping network call", field);
                    return Ok(CommitOutcome::Unchanged);
                }

                let key = save_key(field, &normalized);
                let mut body = Map::new();
                body.insert(field.to_string(), normalized.clone());

                // Level and reporting manager are a linked pair: a level
                // change always clears the manager, in the same request.
                let mut cleared_manager = None;
                if field == LEVEL_FIELD {
                    let previous = self.record.get(REPORTING_MANAGER_FIELD).clone();
                    if !previous.is_null() {
                        body.insert(REPORTING_MANAGER_FIELD.to_string(), Value::Null);
                        cleared_manager = Some(previous);
                    }
                }

                self.controllers[field].begin_save(key, normalized);
                self.pending = Some(PendingSave {
                    field,
                    body,
                    attachment: None,
                    progress: None,
                    cleared_manager,
                });
                Ok(CommitOutcome::Queued)
            }
            _ => Err(EditError::NoActiveField),
        }
    }

    /// Perform the queued save, if any.
    ///
    /// On success the server's representation is merged over the record and
    /// the field adopts the server's value. On failure the field rolls back
    /// to its committed value and the error is surfaced. If the session was
    /// closed in the meantime the request still completes but its result is
    /// discarded.
    pub async fn flush(&mut self) -> EditResult<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let PendingSave {
            field,
            body,
            attachment,
            progress,
            cleared_manager,
        } = pending;

        info!("saving {} for record {}", field, self.record.id());
        let result = match &attachment {
            Some(AttachmentOp::Upload(upload)) => {
                let progress = progress.unwrap_or_else(|| watch::channel(0).0);
                self.gateway
                    .upload_attachment(&self.resource, self.record.id(), field, upload, progress)
                    .await
            }
            Some(AttachmentOp::Delete) | None => {
                self.gateway
                    .patch_record(&self.resource, self.record.id(), &body)
                    .await
            }
        };

        self.upload_progress = None;

        if self.closed {
            debug!("session closed; discarding save result for {}", field);
            return Ok(());
        }

        match result {
            Ok(server) => {
                self.record.apply_server_response(&server);

                // The server is the source of truth for the saved field; fall
                // back to the sent value only when its response omits it.
                let committed = server
                    .get(field)
                    .cloned()
                    .or_else(|| body.get(field).cloned())
                    .unwrap_or_else(|| self.record.get(field).clone());
                self.record.set(field, committed.clone());
                self.controllers[field].succeed(committed.clone());

                if let Some(previous) = cleared_manager {
                    self.record.set(REPORTING_MANAGER_FIELD, Value::Null);
                    self.controllers[REPORTING_MANAGER_FIELD].force_committed(Value::Null);
                    self.events.push_back(EditEvent::ManagerCleared { previous });
                }

                if attachment.is_some() {
                    self.events.push_back(EditEvent::AttachmentChanged {
                        field: field.to_string(),
                    });
                }
                self.events.push_back(EditEvent::FieldSaved {
                    field: field.to_string(),
                    value: committed,
                });

                self.active = None;
                Ok(())
            }
            Err(gateway_err) => {
                let err = EditError::from_gateway(field, gateway_err);
                warn!("save failed for {}: {}", field, err);

                self.controllers[field].fail(err.to_string());
                self.controllers[field].rollback();
                self.events.push_back(EditEvent::SaveFailed {
                    field: field.to_string(),
                    message: err.to_string(),
                });

                self.active = None;
                Err(err)
            }
        }
    }

    /// Commit and, if a save was queued, flush it in one call
    pub async fn commit_and_flush(&mut self) -> EditResult<CommitOutcome> {
        let outcome = self.commit()?;
        if outcome == CommitOutcome::Queued {
            self.flush().await?;
        }
        Ok(outcome)
    }

    /// Level governing manager eligibility right now: the live draft while
    /// the level field is being edited, the committed value otherwise.
    pub fn effective_level(&self) -> Option<Level> {
        if self.active == Some(LEVEL_FIELD)
            && self.controllers[LEVEL_FIELD].state() == FieldState::Editing
        {
            return Level::from_value(self.controllers[LEVEL_FIELD].draft());
        }
        Level::from_value(self.record.get(LEVEL_FIELD))
    }

    /// Eligible reporting managers for the effective level, sorted by name
    pub fn manager_candidates(&self) -> Vec<ManagerCandidate> {
        match self.effective_level() {
            Some(level) => self.resolver.candidates_for(level),
            None => Vec::new(),
        }
    }

    /// Handle for one attachment field
    pub fn attachment(&mut self, field: &str) -> EditResult<AttachmentController<'_>> {
        let desc = fields::descriptor(field)?;
        if !desc.is_attachment() {
            return Err(EditError::NotActivatable(desc.name.to_string()));
        }
        Ok(AttachmentController {
            session: self,
            field: desc.name,
        })
    }

    /// Progress of the in-flight upload, if one is queued or running
    pub fn upload_progress(&self) -> Option<AttachmentProgress> {
        self.upload_progress.clone()
    }

    pub(crate) fn queue_attachment(
        &mut self,
        field: &'static str,
        op: AttachmentOp,
    ) -> EditResult<()> {
        self.ensure_open()?;
        if self.pending.is_some() {
            return Err(EditError::SaveInFlight(field.to_string()));
        }
        if let Some(busy) = self.busy_field() {
            return Err(EditError::AnotherFieldActive(busy.to_string()));
        }

        let (body, key, progress) = match &op {
            AttachmentOp::Upload(upload) => {
                let (tx, rx) = watch::channel(0u8);
                self.upload_progress = Some(AttachmentProgress::new(rx));
                let key = save_key(field, &Value::String(upload.file_name.clone()));
                (Map::new(), key, Some(tx))
            }
            AttachmentOp::Delete => {
                let mut body = Map::new();
                body.insert(field.to_string(), Value::Null);
                (body, save_key(field, &Value::Null), None)
            }
        };

        self.controllers[field].begin_immediate_save(key);
        self.active = Some(field);
        self.pending = Some(PendingSave {
            field,
            body,
            attachment: Some(op),
            progress,
            cleared_manager: None,
        });
        info!("queued attachment save for {}", field);
        Ok(())
    }

    /// Display text for a field: enumerated codes resolve through the
    /// reference store, manager codes through the employee pool, absent
    /// values as `-`.
    pub fn resolve_display(&self, field: &str) -> EditResult<String> {
        let desc = fields::descriptor(field)?;
        let value = self.record.get(desc.name);

        if value.is_null() {
            return Ok(EMPTY_DISPLAY.to_string());
        }

        if desc.name == REPORTING_MANAGER_FIELD {
            let code = code_string(value);
            return Ok(self
                .resolver
                .display_name(&code)
                .map(str::to_string)
                .unwrap_or(code));
        }

        match desc.kind {
            FieldKind::Enumerated(collection) => {
                Ok(self.reference_data.resolve(collection, &code_string(value)))
            }
            _ => Ok(display_value(value)),
        }
    }

    /// Number of controllers currently holding the edit slot; never more than one
    pub fn busy_count(&self) -> usize {
        self.controllers.values().filter(|c| c.is_busy()).count()
    }

    fn busy_field(&self) -> Option<&'static str> {
        self.controllers
            .iter()
            .find(|(_, ctrl)| ctrl.is_busy())
            .map(|(name, _)| *name)
    }

    fn ensure_open(&self) -> EditResult<()> {
        if self.closed {
            Err(EditError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

fn id_matches(value: &Value, id: &str) -> bool {
    match value {
        Value::String(s) => s == id,
        Value::Number(n) => n.to_string() == id,
        _ => false,
    }
}

fn code_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

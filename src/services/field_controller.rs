//! Per-field edit/save state machine
//!
//! A controller never talks to the network itself; the edit session decides
//! when a save goes out and feeds the outcome back in. The controller's job
//! is the state discipline: what is committed, what is drafted, and whether
//! a commit for the same normalized value is already on the wire.

use serde_json::Value;

use crate::errors::{EditError, EditResult};
use crate::fields::FieldDescriptor;

/// Lifecycle of one editable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// At rest, showing the committed value
    Viewing,
    /// Operator is drafting a new value
    Editing,
    /// A save for this field is in flight
    Saving,
    /// A save failed; rollback to the committed value is pending
    Error,
}

/// State machine for one field of the record under edit
#[derive(Debug, Clone)]
pub struct FieldController {
    descriptor: &'static FieldDescriptor,
    state: FieldState,
    committed: Value,
    draft: Value,
    last_attempted_key: Option<String>,
    last_error: Option<String>,
}

/// Duplicate-save suppression key: a pure function of the field and its
/// normalized value, independent of which host event triggered the commit.
pub fn save_key(field: &str, normalized: &Value) -> String {
    format!("{field}:{normalized}")
}

impl FieldController {
    pub(crate) fn new(descriptor: &'static FieldDescriptor, committed: Value) -> Self {
        let draft = committed.clone();
        FieldController {
            descriptor,
            state: FieldState::Viewing,
            committed,
            draft,
            last_attempted_key: None,
            last_error: None,
        }
    }

    pub fn descriptor(&self) -> &'static FieldDescriptor {
        self.descriptor
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Last committed value; what the host displays outside edit mode
    pub fn committed(&self) -> &Value {
        &self.committed
    }

    /// Current draft; equals the committed value outside edit mode
    pub fn draft(&self) -> &Value {
        &self.draft
    }

    /// Message of the most recent failed save, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True while the field holds the record's single edit slot
    pub fn is_busy(&self) -> bool {
        matches!(self.state, FieldState::Editing | FieldState::Saving)
    }

    pub(crate) fn matches_attempt(&self, key: &str) -> bool {
        self.last_attempted_key.as_deref() == Some(key)
    }

    pub(crate) fn activate(&mut self) -> EditResult<()> {
        if self.descriptor.read_only {
            return Err(EditError::ReadOnly(self.descriptor.name.to_string()));
        }
        match self.state {
            FieldState::Viewing => {
                self.draft = self.committed.clone();
                self.state = FieldState::Editing;
                Ok(())
            }
            FieldState::Saving => Err(EditError::SaveInFlight(self.descriptor.name.to_string())),
            _ => Err(EditError::AnotherFieldActive(
                self.descriptor.name.to_string(),
            )),
        }
    }

    pub(crate) fn update(&mut self, value: Value) -> EditResult<()> {
        match self.state {
            FieldState::Editing => {
                self.draft = value;
                Ok(())
            }
            FieldState::Saving => Err(EditError::SaveInFlight(self.descriptor.name.to_string())),
            _ => Err(EditError::NoActiveField),
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.draft = self.committed.clone();
        self.state = FieldState::Viewing;
    }

    /// Enter `Saving` from edit mode; the draft is pinned to the normalized
    /// value so a duplicate commit event recomputes the same key.
    pub(crate) fn begin_save(&mut self, key: String, normalized: Value) {
        self.draft = normalized;
        self.last_attempted_key = Some(key);
        self.state = FieldState::Saving;
    }

    /// Attachment path: selection dispatches immediately from `Viewing`,
    /// with no activate/blur cycle.
    pub(crate) fn begin_immediate_save(&mut self, key: String) {
        self.last_attempted_key = Some(key);
        self.state = FieldState::Saving;
    }

    /// Apply the server's authoritative value for this field
    pub(crate) fn succeed(&mut self, server_value: Value) {
        self.committed = server_value;
        self.draft = self.committed.clone();
        self.last_attempted_key = None;
        self.last_error = None;
        self.state = FieldState::Viewing;
    }

    /// Record a failed save; the session rolls back right after surfacing it
    pub(crate) fn fail(&mut self, message: String) {
        self.last_error = Some(message);
        self.state = FieldState::Error;
    }

    /// Discard the draft and return to the committed value
    pub(crate) fn rollback(&mut self) {
        self.draft = self.committed.clone();
        self.last_attempted_key = None;
        self.state = FieldState::Viewing;
    }

    /// Overwrite the committed value outside the save path (cascade clears)
    pub(crate) fn force_committed(&mut self, value: Value) {
        self.committed = value;
        if !self.is_busy() {
            self.draft = self.committed.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::fields::descriptor;

    use super::*;

    fn controller(field: &str, committed: Value) -> FieldController {
        FieldController::new(descriptor(field).unwrap(), committed)
    }

    #[test]
    fn activate_captures_committed_into_draft() {
        let mut ctrl = controller("firstName", json!("John"));
        ctrl.activate().unwrap();

        assert_eq!(ctrl.state(), FieldState::Editing);
        assert_eq!(ctrl.draft(), &json!("John"));
    }

    #[test]
    fn read_only_fields_refuse_activation() {
        let mut ctrl = controller("employeeCode", json!("EMP-001"));
        let err = ctrl.activate().unwrap_err();
        assert_eq!(err.error_code(), "READ_ONLY");
        assert_eq!(ctrl.state(), FieldState::Viewing);
    }

    #[test]
    fn update_outside_edit_mode_is_refused() {
        let mut ctrl = controller("firstName", json!("John"));
        assert!(ctrl.update(json!("Jane")).is_err());
    }

    #[test]
    fn cancel_discards_the_draft() {
        let mut ctrl = controller("firstName", json!("John"));
        ctrl.activate().unwrap();
        ctrl.update(json!("Jane")).unwrap();
        ctrl.cancel();

        assert_eq!(ctrl.state(), FieldState::Viewing);
        assert_eq!(ctrl.draft(), &json!("John"));
    }

    #[test]
    fn save_cycle_adopts_the_server_value() {
        let mut ctrl = controller("dob", json!("1994-2-8"));
        ctrl.activate().unwrap();
        ctrl.update(json!("1994-02-08")).unwrap();

        let key = save_key("dob", &json!("1994-02-08"));
        ctrl.begin_save(key.clone(), json!("1994-02-08"));
        assert_eq!(ctrl.state(), FieldState::Saving);
        assert!(ctrl.matches_attempt(&key));

        // Server reformats; its value wins over what was sent.
        ctrl.succeed(json!("08-Feb-1994"));
        assert_eq!(ctrl.state(), FieldState::Viewing);
        assert_eq!(ctrl.committed(), &json!("08-Feb-1994"));
        assert!(!ctrl.matches_attempt(&key));
    }

    #[test]
    fn failure_rolls_back_to_committed() {
        let mut ctrl = controller("phone2", Value::Null);
        ctrl.activate().unwrap();
        ctrl.update(json!("9876543210")).unwrap();
        ctrl.begin_save(save_key("phone2", &json!("9876543210")), json!("9876543210"));

        ctrl.fail("backend unavailable: 500".to_string());
        assert_eq!(ctrl.state(), FieldState::Error);

        ctrl.rollback();
        assert_eq!(ctrl.state(), FieldState::Viewing);
        assert!(ctrl.draft().is_null());
        assert_eq!(ctrl.last_error(), Some("backend unavailable: 500"));
    }

    #[test]
    fn save_key_distinguishes_types_and_fields() {
        assert_ne!(save_key("ctc", &json!(5)), save_key("ctc", &json!("5")));
        assert_ne!(save_key("ctc", &json!(5)), save_key("phone1", &json!(5)));
        assert_eq!(
            save_key("phone1", &json!("987")),
            save_key("phone1", &json!("987"))
        );
    }
}

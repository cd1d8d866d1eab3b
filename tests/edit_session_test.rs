//! Edit-session integration tests
//!
//! Exercises the engine's observable properties against a recording
//! in-memory gateway: idempotence, rollback, the single-active-field rule,
//! duplicate-save suppression, the level-to-manager cascade, and the
//! attachment flows.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::watch;

use staffdesk::errors::{EditError, GatewayError, GatewayResult};
use staffdesk::fields::MasterCollection;
use staffdesk::gateway::{AttachmentUpload, MasterEntry, PersistenceGateway};
use staffdesk::record::Record;
use staffdesk::services::edit_session::{CommitOutcome, EditEvent, EditSession};
use staffdesk::services::field_controller::FieldState;
use staffdesk::services::reference_data::ReferenceDataStore;

/// Recording gateway with scriptable responses; echoes changes by default
#[derive(Default)]
struct MockGateway {
    patch_calls: Mutex<Vec<Map<String, Value>>>,
    upload_calls: Mutex<Vec<(String, String)>>,
    patch_responses: Mutex<VecDeque<GatewayResult<Value>>>,
    upload_responses: Mutex<VecDeque<GatewayResult<Value>>>,
}

impl MockGateway {
    fn new() -> Arc<Self> {
        Arc::new(MockGateway::default())
    }

    fn queue_patch(&self, response: GatewayResult<Value>) {
        self.patch_responses.lock().unwrap().push_back(response);
    }

    fn queue_upload(&self, response: GatewayResult<Value>) {
        self.upload_responses.lock().unwrap().push_back(response);
    }

    fn patch_count(&self) -> usize {
        self.patch_calls.lock().unwrap().len()
    }

    fn patch_body(&self, index: usize) -> Map<String, Value> {
        self.patch_calls.lock().unwrap()[index].clone()
    }
}

fn employee_rows() -> Vec<Value> {
    vec![
        json!({
            "id": 7,
            "firstName": "Ravi",
            "lastName": "Kumar",
            "level": "L2",
            "reportingManager": "3",
            "phone1": "9000000001",
            "phone2": null,
            "ctc": 50000,
            "photo": "files/old.jpg",
            "status": "active",
        }),
        json!({ "id": 1, "firstName": "Asha", "lastName": "Verma", "level": "L5", "status": "active" }),
        json!({ "id": 2, "firstName": "Dev", "lastName": "Rao", "level": "L4", "status": "active" }),
        json!({ "id": 3, "firstName": "Kiran", "lastName": "Shah", "level": "L3", "status": "active" }),
        json!({ "id": 4, "firstName": "Mina", "lastName": "Iyer", "level": "L5", "status": "inactive" }),
    ]
}

#[async_trait]
impl PersistenceGateway for MockGateway {
    async fn patch_record(
        &self,
        _resource: &str,
        id: &str,
        changes: &Map<String, Value>,
    ) -> GatewayResult<Value> {
        self.patch_calls.lock().unwrap().push(changes.clone());
        if let Some(response) = self.patch_responses.lock().unwrap().pop_front() {
            return response;
        }

        let mut merged = Map::new();
        merged.insert("id".to_string(), json!(id));
        merged.extend(changes.clone());
        Ok(Value::Object(merged))
    }

    async fn upload_attachment(
        &self,
        _resource: &str,
        id: &str,
        field: &str,
        upload: &AttachmentUpload,
        progress: watch::Sender<u8>,
    ) -> GatewayResult<Value> {
        self.upload_calls
            .lock()
            .unwrap()
            .push((field.to_string(), upload.file_name.clone()));
        let _ = progress.send(100);

        if let Some(response) = self.upload_responses.lock().unwrap().pop_front() {
            return response;
        }
        Ok(json!({ "id": id, field: format!("files/{}", upload.file_name) }))
    }

    async fn list_records(&self, _resource: &str) -> GatewayResult<Vec<Value>> {
        Ok(employee_rows())
    }

    async fn list_master(&self, _collection: MasterCollection) -> GatewayResult<Vec<MasterEntry>> {
        Ok(Vec::new())
    }
}

async fn open_session(gateway: Arc<MockGateway>) -> EditSession {
    let reference_data = Arc::new(ReferenceDataStore::new(gateway.clone()));
    let mut session = EditSession::open("7", gateway, reference_data, "employees")
        .await
        .expect("record 7 exists");
    session.preload().await;
    session
}

#[tokio::test]
async fn open_finds_the_record_by_id() {
    let gateway = MockGateway::new();
    let session = open_session(gateway).await;

    assert_eq!(session.record().id(), "7");
    assert_eq!(session.record().get("firstName"), &json!("Ravi"));
}

#[tokio::test]
async fn open_fails_for_an_unknown_id() {
    let gateway = MockGateway::new();
    let reference_data = Arc::new(ReferenceDataStore::new(gateway.clone()));
    let err = EditSession::open("999", gateway, reference_data, "employees")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn unchanged_commit_makes_no_network_call() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    session.activate("firstName").unwrap();
    session.update_draft(json!("  Ravi ")).unwrap();

    let outcome = session.commit_and_flush().await.unwrap();
    assert_eq!(outcome, CommitOutcome::Unchanged);
    assert_eq!(gateway.patch_count(), 0);
    assert_eq!(session.active_field(), None);
}

#[tokio::test]
async fn changed_commit_patches_one_field() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    session.activate("firstName").unwrap();
    session.update_draft(json!("Raveendra")).unwrap();
    let outcome = session.commit_and_flush().await.unwrap();

    assert_eq!(outcome, CommitOutcome::Queued);
    assert_eq!(gateway.patch_count(), 1);
    assert_eq!(gateway.patch_body(0), {
        let mut body = Map::new();
        body.insert("firstName".to_string(), json!("Raveendra"));
        body
    });
    assert_eq!(session.record().get("firstName"), &json!("Raveendra"));
}

#[tokio::test]
async fn server_value_wins_over_the_sent_value() {
    let gateway = MockGateway::new();
    gateway.queue_patch(Ok(json!({ "id": 7, "dob": "08-Feb-1994" })));
    let mut session = open_session(gateway).await;

    session.activate("dob").unwrap();
    session.update_draft(json!("1994-02-08")).unwrap();
    session.commit_and_flush().await.unwrap();

    assert_eq!(session.record().get("dob"), &json!("08-Feb-1994"));
    assert_eq!(
        session.controller("dob").unwrap().committed(),
        &json!("08-Feb-1994")
    );
}

#[tokio::test]
async fn required_field_rejects_blank_and_stays_in_edit_mode() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    session.activate("firstName").unwrap();
    session.update_draft(json!("")).unwrap();

    let err = session.commit().unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_FAILED");
    assert_eq!(gateway.patch_count(), 0);
    assert_eq!(
        session.controller("firstName").unwrap().state(),
        FieldState::Editing
    );

    // The operator can fix the draft and commit from the same edit.
    session.update_draft(json!("Ravi Sr")).unwrap();
    session.commit_and_flush().await.unwrap();
    assert_eq!(gateway.patch_count(), 1);
}

#[tokio::test]
async fn non_numeric_ctc_is_rejected_locally() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    session.activate("ctc").unwrap();
    session.update_draft(json!("abc")).unwrap();

    let err = session.commit().unwrap_err();
    assert!(matches!(err, EditError::Validation { .. }));
    assert_eq!(gateway.patch_count(), 0);
}

#[tokio::test]
async fn gateway_failure_rolls_back_to_the_previous_display() {
    let gateway = MockGateway::new();
    gateway.queue_patch(Err(GatewayError::unavailable("backend returned 500")));
    let mut session = open_session(gateway).await;

    let before = session.record().display("phone2");
    assert_eq!(before, "-");

    session.activate("phone2").unwrap();
    session.update_draft(json!("9876543210")).unwrap();
    let err = session.commit_and_flush().await.unwrap_err();

    assert_eq!(err.error_code(), "UNAVAILABLE");
    assert_eq!(session.record().display("phone2"), before);

    let ctrl = session.controller("phone2").unwrap();
    assert_eq!(ctrl.state(), FieldState::Viewing);
    assert!(ctrl.draft().is_null());
    assert!(ctrl.last_error().unwrap().contains("backend returned 500"));

    let events = session.take_events();
    assert!(matches!(events[0], EditEvent::SaveFailed { .. }));
}

#[tokio::test]
async fn rejection_surfaces_the_field_message() {
    let gateway = MockGateway::new();
    let mut fields = std::collections::BTreeMap::new();
    fields.insert("email".to_string(), "Enter a valid email address.".to_string());
    gateway.queue_patch(Err(GatewayError::Rejected {
        message: "validation failed".to_string(),
        fields,
    }));
    let mut session = open_session(gateway).await;

    session.activate("email").unwrap();
    session.update_draft(json!("ravi@acme.io")).unwrap();
    let err = session.commit_and_flush().await.unwrap_err();

    assert_eq!(err.to_string(), "email: Enter a valid email address.");
    assert!(session.record().get("email").is_null());
}

#[tokio::test]
async fn only_one_field_holds_the_edit_slot() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway).await;

    session.activate("firstName").unwrap();
    let err = session.activate("lastName").unwrap_err();
    assert_eq!(err.error_code(), "FIELD_BUSY");
    assert_eq!(session.busy_count(), 1);

    // Still blocked while the first field's save is in flight.
    session.update_draft(json!("Raveendra")).unwrap();
    assert_eq!(session.commit().unwrap(), CommitOutcome::Queued);
    let err = session.activate("lastName").unwrap_err();
    assert_eq!(err.error_code(), "FIELD_BUSY");
    assert_eq!(session.busy_count(), 1);

    session.flush().await.unwrap();
    assert_eq!(session.busy_count(), 0);
    session.activate("lastName").unwrap();
}

#[tokio::test]
async fn duplicate_commits_in_the_inflight_window_collapse_to_one_call() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    session.activate("phone1").unwrap();
    session.update_draft(json!("9000000002")).unwrap();

    // Key-press and focus-loss handlers both commit the same interaction.
    assert_eq!(session.commit().unwrap(), CommitOutcome::Queued);
    assert_eq!(session.commit().unwrap(), CommitOutcome::Suppressed);

    session.flush().await.unwrap();
    assert_eq!(gateway.patch_count(), 1);

    // A fresh edit of the same field saves again: the window is over.
    session.activate("phone1").unwrap();
    session.update_draft(json!("9000000003")).unwrap();
    session.commit_and_flush().await.unwrap();
    assert_eq!(gateway.patch_count(), 2);
}

#[tokio::test]
async fn cancel_discards_the_draft_without_saving() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    session.activate("city").unwrap();
    session.update_draft(json!("Pune")).unwrap();
    session.cancel().unwrap();

    assert_eq!(gateway.patch_count(), 0);
    assert!(session.record().get("city").is_null());
    assert_eq!(session.active_field(), None);
}

#[tokio::test]
async fn read_only_fields_refuse_activation() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway).await;

    let err = session.activate("employeeCode").unwrap_err();
    assert_eq!(err.error_code(), "READ_ONLY");
}

#[tokio::test]
async fn level_change_clears_the_manager_in_the_same_request() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;
    assert_eq!(session.record().get("reportingManager"), &json!("3"));

    session.activate("level").unwrap();
    session.update_draft(json!("L4")).unwrap();
    session.commit_and_flush().await.unwrap();

    let body = gateway.patch_body(0);
    assert_eq!(body.get("level"), Some(&json!("L4")));
    assert_eq!(body.get("reportingManager"), Some(&Value::Null));

    assert!(session.record().get("reportingManager").is_null());
    assert!(session
        .take_events()
        .iter()
        .any(|e| matches!(e, EditEvent::ManagerCleared { previous } if previous == &json!("3"))));

    // L4 may only report to L5; the inactive L5 employee is excluded and the
    // previously selected L3 manager stays cleared.
    let candidates = session.manager_candidates();
    let codes: Vec<&str> = candidates.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["1"]);
}

#[tokio::test]
async fn editing_the_level_filters_candidates_live() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    // Committed level is L2: candidates span L3..L5.
    assert_eq!(session.manager_candidates().len(), 3);

    session.activate("level").unwrap();
    session.update_draft(json!("L4")).unwrap();
    assert_eq!(session.manager_candidates().len(), 1);

    // Cancelling returns to the committed level's candidates, untouched.
    session.cancel().unwrap();
    assert_eq!(session.manager_candidates().len(), 3);
    assert_eq!(gateway.patch_count(), 0);
}

#[tokio::test]
async fn manager_field_is_not_activatable_at_l5() {
    let gateway = MockGateway::new();
    gateway.queue_patch(Ok(json!({ "id": 7, "level": "L5" })));
    let mut session = open_session(gateway).await;

    session.activate("level").unwrap();
    session.update_draft(json!("L5")).unwrap();
    session.commit_and_flush().await.unwrap();

    assert!(session.manager_candidates().is_empty());
    let err = session.activate("reportingManager").unwrap_err();
    assert_eq!(err.error_code(), "NOT_ACTIVATABLE");
}

#[tokio::test]
async fn closed_session_discards_the_inflight_result() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    session.activate("firstName").unwrap();
    session.update_draft(json!("Raveendra")).unwrap();
    assert_eq!(session.commit().unwrap(), CommitOutcome::Queued);

    session.close();
    session.flush().await.unwrap();

    // The request completed but nothing was applied to the dismissed view.
    assert_eq!(gateway.patch_count(), 1);
    assert_eq!(session.record().get("firstName"), &json!("Ravi"));
    assert!(session.take_events().is_empty());

    let err = session.activate("lastName").unwrap_err();
    assert_eq!(err.error_code(), "SESSION_CLOSED");
}

#[tokio::test]
async fn attachment_upload_dispatches_immediately() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway.clone()).await;

    let upload = AttachmentUpload {
        file_name: "pic.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xff, 0xd8, 0xff],
    };
    session.attachment("photo").unwrap().upload(upload).unwrap();

    let progress = session.upload_progress().expect("progress is observable");
    session.flush().await.unwrap();

    assert_eq!(progress.percent(), 100);
    assert_eq!(
        gateway.upload_calls.lock().unwrap()[0],
        ("photo".to_string(), "pic.jpg".to_string())
    );
    assert_eq!(session.record().get("photo"), &json!("files/pic.jpg"));

    let events = session.take_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, EditEvent::AttachmentChanged { field } if field == "photo")));
}

#[tokio::test]
async fn attachment_failure_keeps_the_prior_file() {
    let gateway = MockGateway::new();
    gateway.queue_upload(Err(GatewayError::unavailable("connection reset")));
    let mut session = open_session(gateway).await;

    let upload = AttachmentUpload {
        file_name: "new.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![1, 2, 3],
    };
    session.attachment("photo").unwrap().upload(upload).unwrap();
    let err = session.flush().await.unwrap_err();

    assert_eq!(err.error_code(), "UNAVAILABLE");
    assert_eq!(session.record().get("photo"), &json!("files/old.jpg"));
    assert_eq!(
        session.controller("photo").unwrap().committed(),
        &json!("files/old.jpg")
    );
}

#[tokio::test]
async fn attachment_delete_clears_the_field() {
    let gateway = MockGateway::new();
    gateway.queue_patch(Ok(json!({ "id": 7, "photo": null })));
    let mut session = open_session(gateway.clone()).await;

    session.attachment("photo").unwrap().delete().unwrap();
    session.flush().await.unwrap();

    let body = gateway.patch_body(0);
    assert_eq!(body.get("photo"), Some(&Value::Null));
    assert!(session.record().get("photo").is_null());
}

#[tokio::test]
async fn scalar_fields_cannot_use_the_attachment_path() {
    let gateway = MockGateway::new();
    let mut session = open_session(gateway).await;

    let err = session.attachment("firstName").unwrap_err();
    assert_eq!(err.error_code(), "NOT_ACTIVATABLE");

    let err = session.activate("photo").unwrap_err();
    assert_eq!(err.error_code(), "NOT_ACTIVATABLE");
}

#[tokio::test]
async fn record_snapshot_is_independent_of_the_listing() {
    let rows = employee_rows();
    let record = Record::from_value(&rows[0]).unwrap();
    assert_eq!(record.id(), "7");
    assert_eq!(record.display("phone2"), "-");
}

mod helpers;

use std::sync::Arc;

use helpers::*;
use serde_json::json;
use taskdesk_core::{CreateTaskRequest, ParentId, UploadError};
use taskdesk_upload::{
    AttachmentStatus, AttachmentValidator, FlowOutcome, RunOutcome, TaskCreationFlow,
};

fn flow_with(
    resources: &MockResourceApi,
    store: &MockObjectStore,
    metadata: &MockMetadataApi,
) -> TaskCreationFlow {
    TaskCreationFlow::new(
        Arc::new(resources.clone()),
        orchestrator(store, metadata),
        AttachmentValidator::default(),
    )
}

fn request() -> CreateTaskRequest {
    CreateTaskRequest {
        description: Some("Broken login on staging".to_string()),
        priority: Some("high".to_string()),
        ..CreateTaskRequest::new("Fix login")
    }
}

#[tokio::test]
async fn test_submit_creates_task_then_uploads() {
    let resources = MockResourceApi::new();
    let store = MockObjectStore::new();
    let metadata = MockMetadataApi::new();
    let mut flow = flow_with(&resources, &store, &metadata);
    flow.select_file(file("a.png", 1024)).unwrap();
    flow.select_file(file("b.pdf", 2048)).unwrap();

    let outcome = flow.submit(&request()).await.unwrap();

    assert!(outcome.is_finalized());
    assert_eq!(outcome.result().uploaded, 2);
    assert_eq!(flow.parent_id(), Some(&ParentId::from("42")));

    let submissions = resources.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, "tasks");
    assert_eq!(submissions[0].1["title"], json!("Fix login"));
    assert_eq!(submissions[0].1["priority"], json!("high"));
    assert!(submissions[0].1.get("sprint_id").is_none());

    assert!(store.calls().iter().all(|key| key.starts_with("42/")));
    assert!(metadata
        .saved()
        .iter()
        .all(|m| m.parent_resource_id == ParentId::from("42")));
}

#[tokio::test]
async fn test_submit_without_attachments_is_finalized() {
    let resources = MockResourceApi::new();
    let store = MockObjectStore::new();
    let metadata = MockMetadataApi::new();
    let mut flow = flow_with(&resources, &store, &metadata);

    let outcome = flow.submit(&request()).await.unwrap();

    assert_eq!(outcome.result().outcome(), RunOutcome::Completed);
    assert!(outcome.is_finalized());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_partial_failure_needs_attention_and_resume_never_recreates_task() {
    let resources = MockResourceApi::new();
    let store = MockObjectStore::new();
    store.fail_times("b.pdf", ScriptedFailure::Network, 1);
    let metadata = MockMetadataApi::new();
    let mut flow = flow_with(&resources, &store, &metadata);
    flow.select_file(file("a.png", 1024)).unwrap();
    flow.select_file(file("b.pdf", 1024)).unwrap();

    let outcome = flow.submit(&request()).await.unwrap();
    match &outcome {
        FlowOutcome::NeedsAttention { result, can_resume } => {
            assert!(result.is_partial_success());
            assert!(*can_resume);
        }
        other => panic!("expected NeedsAttention, got {:?}", other),
    }

    // A second submit would create a duplicate task.
    assert!(matches!(
        flow.submit(&request()).await,
        Err(UploadError::InvalidState(_))
    ));

    let outcome = flow.resume().await.unwrap();
    assert!(outcome.is_finalized());
    assert_eq!(resources.submissions().len(), 1);
    assert!(flow
        .attachments()
        .iter()
        .all(|r| r.status() == AttachmentStatus::Uploaded));
}

#[tokio::test]
async fn test_task_creation_failure_uploads_nothing() {
    let resources = MockResourceApi::failing();
    let store = MockObjectStore::new();
    let metadata = MockMetadataApi::new();
    let mut flow = flow_with(&resources, &store, &metadata);
    flow.select_file(file("a.png", 1024)).unwrap();

    let err = flow.submit(&request()).await.unwrap_err();

    assert!(matches!(err, UploadError::Resource(_)));
    assert!(flow.parent_id().is_none());
    assert!(store.calls().is_empty());
    assert!(matches!(
        flow.resume().await,
        Err(UploadError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_response_without_id_is_rejected() {
    let resources = MockResourceApi::with_response(json!({"success": true}));
    let store = MockObjectStore::new();
    let metadata = MockMetadataApi::new();
    let mut flow = flow_with(&resources, &store, &metadata);
    flow.select_file(file("a.png", 1024)).unwrap();

    let err = flow.submit(&request()).await.unwrap_err();

    assert!(matches!(err, UploadError::Resource(_)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_selection_and_removal() {
    let resources = MockResourceApi::new();
    let store = MockObjectStore::new();
    let metadata = MockMetadataApi::new();
    let mut flow = flow_with(&resources, &store, &metadata);

    let keep = flow.select_file(file("a.png", 1024)).unwrap();
    let removed = flow.select_file(file("b.pdf", 1024)).unwrap();
    assert!(matches!(
        flow.select_file(file("movie.avi", 1024)),
        Err(UploadError::InvalidAttachment(_))
    ));

    flow.remove_file(removed).unwrap();
    assert_eq!(flow.attachments().len(), 1);
    assert_eq!(flow.attachments()[0].id(), keep);

    let outcome = flow.submit(&request()).await.unwrap();
    assert!(outcome.is_finalized());
    assert_eq!(store.calls().len(), 1);
}

#[tokio::test]
async fn test_paused_flow_can_resume() {
    let resources = MockResourceApi::new();
    let store = MockObjectStore::new();
    let metadata = MockMetadataApi::new();
    let mut flow = flow_with(&resources, &store, &metadata);
    store.pause_after("a.png", flow.handle());
    flow.select_file(file("a.png", 1024)).unwrap();
    flow.select_file(file("b.png", 1024)).unwrap();

    let outcome = flow.submit(&request()).await.unwrap();
    assert_eq!(outcome.result().outcome(), RunOutcome::Paused);
    assert!(matches!(
        outcome,
        FlowOutcome::NeedsAttention {
            can_resume: true,
            ..
        }
    ));

    let outcome = flow.resume().await.unwrap();
    assert!(outcome.is_finalized());

    let records = flow.close();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.has_payload()));
}

#[tokio::test]
async fn test_existing_task_session() {
    let resources = MockResourceApi::new();
    let store = MockObjectStore::new();
    let metadata = MockMetadataApi::new();
    let mut flow = TaskCreationFlow::for_existing(
        ParentId::from("77"),
        Arc::new(resources.clone()),
        orchestrator(&store, &metadata),
        AttachmentValidator::default(),
    );
    flow.select_file(file("a.png", 1024)).unwrap();

    let outcome = flow.upload().await.unwrap();

    assert!(outcome.is_finalized());
    assert!(resources.submissions().is_empty());
    assert!(store.calls()[0].starts_with("77/"));
}

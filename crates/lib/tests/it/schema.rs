//! Record validation as seen through the store.

use serde_json::json;
use strongbox::schema::{self, EntityKind, IssueKind};
use strongbox::{Document, Error};

use crate::helpers::*;

async fn save_one(env: &TestEnv, collection: &str, id: &str, record: serde_json::Value) -> strongbox::Result<()> {
    let mut document = env.instance.load_store().await?;
    document.insert(collection, id, record);
    env.instance.save_store(&document).await
}

fn issues_of(err: Error) -> Vec<(String, IssueKind)> {
    match err {
        Error::Validation(validation) => validation
            .issues
            .into_iter()
            .map(|issue| (issue.field, issue.kind))
            .collect(),
        other => panic!("expected a validation error, got {other}"),
    }
}

#[tokio::test]
async fn test_every_entity_kind_accepts_a_valid_record() {
    let env = setup().await;
    let mut document = Document::empty();
    document.insert("projects", "p1", project("p1", "Roadmap"));
    document.insert("tasks", "t1", task("t1", "Write docs"));
    document.insert(
        "comments",
        "c1",
        json!({"id": "c1", "body": "Looks good.\nShip it.", "author": "sarah", "target_id": "t1"}),
    );
    document.insert(
        "invoices",
        "i1",
        json!({
            "id": "i1", "number": "2024-001", "client": "ACME", "amount": 1200.5,
            "issue_date": "2024-02-01", "due_date": "2024-03-01", "currency": "EUR", "status": "Sent",
        }),
    );
    document.insert(
        "resources",
        "r1",
        json!({"id": "r1", "name": "Meeting room", "capacity": 8, "hourly_rate": 25.0}),
    );
    document.insert(
        "attachments",
        "a1",
        json!({"id": "a1", "file_name": "spec.pdf", "path": "p1/spec.pdf", "size_bytes": 2048}),
    );
    env.instance.save_store(&document).await.unwrap();
    assert_eq!(env.instance.load_store().await.unwrap(), document);
}

#[tokio::test]
async fn test_script_injection_is_rejected() {
    let env = setup().await;
    let err = save_one(
        &env,
        "comments",
        "c1",
        json!({"id": "c1", "body": "<script>alert(1)</script>", "author": "eve", "target_id": "t1"}),
    )
    .await
    .unwrap_err();
    assert!(issues_of(err).contains(&("comments/c1/body".to_string(), IssueKind::ScriptInjection)));
}

#[tokio::test]
async fn test_injection_in_undeclared_field_is_rejected() {
    let env = setup().await;
    let mut record = project("p1", "Roadmap");
    record["notes"] = json!(["fine", "<img src=x onerror=alert(1)>"]);
    let err = save_one(&env, "projects", "p1", record).await.unwrap_err();
    assert!(err.is_validation_error());
}

#[tokio::test]
async fn test_attachment_path_traversal_is_rejected() {
    let env = setup().await;
    let err = save_one(
        &env,
        "attachments",
        "a1",
        json!({"id": "a1", "file_name": "passwd.txt", "path": "../../etc/passwd.txt"}),
    )
    .await
    .unwrap_err();
    assert!(issues_of(err).iter().any(|(_, kind)| *kind == IssueKind::PathTraversal));
}

#[tokio::test]
async fn test_date_ranges_and_enums() {
    let env = setup().await;
    let err = save_one(
        &env,
        "invoices",
        "i1",
        json!({
            "id": "i1", "number": "7", "client": "ACME", "amount": -5,
            "issue_date": "2024-03-01", "due_date": "2024-02-01", "currency": "YEN",
        }),
    )
    .await
    .unwrap_err();

    let issues = issues_of(err);
    assert!(issues.contains(&("invoices/i1/amount".to_string(), IssueKind::OutOfRange)));
    assert!(issues.contains(&("invoices/i1/due_date".to_string(), IssueKind::OutOfRange)));
    assert!(issues.contains(&("invoices/i1/currency".to_string(), IssueKind::NotAllowed)));
}

#[tokio::test]
async fn test_duplicate_usernames_are_rejected_on_save() {
    let env = setup().await;
    let mut document = Document::empty();
    for id in ["u1", "u2"] {
        document.insert("users", id, json!({"id": id, "username": "twin", "role": "User"}));
    }
    let issues = issues_of(env.instance.save_store(&document).await.unwrap_err());
    assert!(issues.iter().any(|(_, kind)| *kind == IssueKind::Duplicate));
}

#[tokio::test]
async fn test_sanitized_payload_round_trips() {
    let env = setup().await;
    let raw = json!({"id": "t1", "text": "  Call\u{0007} the client  ", "status": "In Progress"});
    let clean = schema::sanitize(EntityKind::Task, raw).unwrap();
    assert_eq!(clean["text"], "Call the client");

    save_one(&env, "tasks", "t1", clean.clone()).await.unwrap();
    let document = env.instance.load_store().await.unwrap();
    assert_eq!(document.get("tasks", "t1"), Some(&clean));
}

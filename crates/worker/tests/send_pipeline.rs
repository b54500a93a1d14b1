//! Send pipeline: message composition and outcome reconciliation.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use coldmail_core::template::{DEFAULT_BODY, DEFAULT_SUBJECT};
use coldmail_core::CustomerStatus;
use coldmail_worker::{ClaimStore, DeliveryOutcome, RunConfig, SendPipeline};

use common::{pipeline, MemoryStore, ScriptedMailer};

const TEMPLATE: &str = concat!(
    "<p>{{company_name}} {{ceo_name}}께</p>",
    r#"<a href="https://mail.example.com/unsubscribe?email=someone%40else.test">수신거부</a>"#,
);

fn campaign() -> RunConfig {
    RunConfig {
        is_running: true,
        email_subject: Some("{{company_name}} 제안".to_string()),
        email_template: Some(TEMPLATE.to_string()),
    }
}

/// Insert a recipient and claim it the way the dispatch loop would.
async fn claimed(store: &MemoryStore, email: &str) -> coldmail_db::models::customer::Customer {
    let id = store.insert(email, CustomerStatus::Ready).await;
    assert!(store.try_claim(id, CustomerStatus::Ready).await.unwrap());
    store.get(id).await
}

// ---------------------------------------------------------------------------
// compose
// ---------------------------------------------------------------------------

#[tokio::test]
async fn compose_fills_placeholders_and_personalises_unsubscribe_link() {
    let store = MemoryStore::new();
    let customer = claimed(&store, "kim+sales@acme.test").await;

    let email = SendPipeline::compose(&customer, &campaign());

    assert_eq!(email.to, "kim+sales@acme.test");
    // The subject is sent verbatim; placeholders are a body feature.
    assert_eq!(email.subject, "{{company_name}} 제안");
    assert!(email.html.starts_with("<p>Acme 대표님께</p>"), "{}", email.html);
    assert!(
        email
            .html
            .contains(r#"href="https://mail.example.com/unsubscribe?email=kim%2Bsales%40acme.test""#),
        "{}",
        email.html
    );
    assert!(!email.html.contains("someone%40else.test"));
}

#[tokio::test]
async fn compose_uses_defaults_for_empty_configuration() {
    let store = MemoryStore::new();
    let customer = claimed(&store, "ceo@acme.test").await;
    let run_config = RunConfig {
        is_running: true,
        email_subject: Some(String::new()),
        email_template: None,
    };

    let email = SendPipeline::compose(&customer, &run_config);

    assert_eq!(email.subject, DEFAULT_SUBJECT);
    assert_eq!(email.html, DEFAULT_BODY);
}

#[tokio::test]
async fn compose_leaves_unknown_placeholders_verbatim() {
    let store = MemoryStore::new();
    let customer = claimed(&store, "ceo@acme.test").await;
    let run_config = RunConfig {
        email_template: Some("<p>{{phone}} / {{company_name}}</p>".to_string()),
        ..campaign()
    };

    let email = SendPipeline::compose(&customer, &run_config);

    assert_eq!(email.html, "<p>{{phone}} / Acme</p>");
}

// ---------------------------------------------------------------------------
// deliver
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_send_marks_sent() {
    let store = MemoryStore::new();
    let customer = claimed(&store, "ceo@acme.test").await;
    let mailer = Arc::new(ScriptedMailer::default());

    let outcome = pipeline(&mailer)
        .deliver(&store, &customer, &campaign())
        .await
        .unwrap();

    assert_eq!(outcome, DeliveryOutcome::Sent);
    let row = store.get(customer.id).await;
    assert_eq!(row.status, CustomerStatus::Sent);
    assert!(row.sent_at.is_some());
    assert!(row.fail_reason.is_none());
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn transport_failure_marks_failed_with_reason() {
    let store = MemoryStore::new();
    let customer = claimed(&store, "nobody@acme.test").await;
    let mailer = Arc::new(ScriptedMailer::default());
    mailer.fail_next("connection refused");

    let outcome = pipeline(&mailer)
        .deliver(&store, &customer, &campaign())
        .await
        .unwrap();

    assert_matches!(outcome, DeliveryOutcome::Failed { ref reason } if reason.contains("connection refused"));
    let row = store.get(customer.id).await;
    assert_eq!(row.status, CustomerStatus::Failed);
    assert!(row.sent_at.is_none());
    assert!(row.fail_reason.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn failed_recipient_is_not_retried_automatically() {
    let store = MemoryStore::new();
    let customer = claimed(&store, "nobody@acme.test").await;
    let mailer = Arc::new(ScriptedMailer::default());
    mailer.fail_next("timeout");

    pipeline(&mailer)
        .deliver(&store, &customer, &campaign())
        .await
        .unwrap();

    assert!(!store.try_claim(customer.id, CustomerStatus::Ready).await.unwrap());
    assert!(!store
        .try_claim(customer.id, CustomerStatus::Dispatch)
        .await
        .unwrap());
}

#[tokio::test]
async fn unsubscribe_during_send_is_preserved() {
    let store = MemoryStore::new();
    let customer = claimed(&store, "ceo@acme.test").await;
    // The recipient clicks unsubscribe while the email is in flight.
    store
        .set_status(customer.id, CustomerStatus::Unsubscribed)
        .await;
    let mailer = Arc::new(ScriptedMailer::default());

    let outcome = pipeline(&mailer)
        .deliver(&store, &customer, &campaign())
        .await
        .unwrap();

    assert_eq!(outcome, DeliveryOutcome::Sent);
    let row = store.get(customer.id).await;
    assert_eq!(row.status, CustomerStatus::Unsubscribed);
    assert!(row.sent_at.is_some());
}

#[tokio::test]
async fn reconciliation_error_is_returned() {
    let store = MemoryStore::new();
    let customer = claimed(&store, "ceo@acme.test").await;
    store.fail_outcome_writes(true).await;
    let mailer = Arc::new(ScriptedMailer::default());

    let result = pipeline(&mailer)
        .deliver(&store, &customer, &campaign())
        .await;

    assert!(result.is_err());
    assert_eq!(store.get(customer.id).await.status, CustomerStatus::Sending);
}

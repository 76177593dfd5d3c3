use chrono::{Duration, Utc};
use serde_json::json;

use super::job::{FIRST_ATTEMPT, JobEnvelope, NotificationContent, NotificationJob, OutboxJob, RelayJob};
use super::{Message, MessageStatus, Pattern, Subscription};

#[test]
fn test_message_new_is_received_without_id() {
    let msg = Message::new(serde_json::Map::new());
    assert!(msg.id.is_none());
    assert_eq!(msg.status, MessageStatus::Received);
}

#[test]
fn test_ensure_id_is_stable() {
    let mut msg = Message::new(serde_json::Map::new());
    let first = msg.ensure_id();
    let second = msg.ensure_id();
    assert_eq!(first, second);
    assert_eq!(msg.id, Some(first));
}

#[test]
fn test_message_serializes_status_lowercase() {
    let mut msg = Message::new(json!({"sender": "AU"}).as_object().cloned().unwrap());
    msg.ensure_id();
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["status"], "received");
    assert_eq!(value["payload"]["sender"], "AU");
    assert!(value["id"].is_string());
}

#[test]
fn test_relay_job_defaults_retry_and_increments_by_one() {
    let id = uuid::Uuid::new_v4();
    let job = RelayJob::from_payload(json!({ "message_id": id })).unwrap();
    assert_eq!(job.retry, FIRST_ATTEMPT);

    let next = job.next_attempt();
    assert_eq!(next.message_id, id);
    assert_eq!(next.retry, 2);
}

#[test]
fn test_notification_job_topic_for_jurisdiction() {
    let job = NotificationJob::for_jurisdiction(
        "AU",
        NotificationContent { id: json!(24) },
    );
    assert_eq!(
        job.to_payload().unwrap(),
        json!({ "topic": "jurisdiction.AU", "content": { "id": 24 } })
    );
}

#[test]
fn test_outbox_job_next_attempt_keeps_target() {
    let job = OutboxJob::new("http://cb.example/hook", json!({"id": "1"}));
    let next = job.next_attempt().next_attempt();
    assert_eq!(next.callback_url, "http://cb.example/hook");
    assert_eq!(next.payload, json!({"id": "1"}));
    assert_eq!(next.retry, 3);
}

#[test]
fn test_pattern_prefix_matching() {
    let topic = Pattern::new("jurisdiction.AU").unwrap();

    assert!(Pattern::new("jurisdiction").unwrap().matches(&topic));
    assert!(Pattern::new("jurisdiction.*").unwrap().matches(&topic));
    assert!(Pattern::new("Jurisdiction.au").unwrap().matches(&topic));
    assert!(!Pattern::new("jurisdiction.SG").unwrap().matches(&topic));
    assert!(!Pattern::new("jurisdiction.AU.extra").unwrap().matches(&topic));
    assert!(!Pattern::new("juris").unwrap().matches(&topic));
}

#[test]
fn test_pattern_layers() {
    let topic = Pattern::new("a.B.c").unwrap();
    assert_eq!(topic.layers(), vec!["a", "a.b", "a.b.c"]);
}

#[test]
fn test_pattern_rejects_malformed_topics() {
    assert!(Pattern::new("").is_err());
    assert!(Pattern::new("*").is_err());
    assert!(Pattern::new("a..b").is_err());
    assert!(Pattern::new("a.b|c").is_err());
    assert!(Pattern::new("a/b").is_err());
}

#[test]
fn test_pattern_keys_ignore_wildcard_and_case() {
    let url = "http://cb.example/hook";
    assert_eq!(
        Pattern::new("jurisdiction.*").unwrap().to_key(url),
        Pattern::new("JURISDICTION").unwrap().to_key(url)
    );
    assert_ne!(
        Pattern::new("jurisdiction").unwrap().to_key(url),
        Pattern::new("jurisdiction.au").unwrap().to_key(url)
    );
}

#[test]
fn test_subscription_validity_follows_expiry() {
    let now = Utc::now();
    let mut sub = Subscription {
        topic_pattern: "jurisdiction.AU".to_string(),
        callback_url: "http://cb.example/hook".to_string(),
        expiry: None,
    };
    assert!(sub.is_valid_at(now));

    sub.expiry = Some(now + Duration::seconds(60));
    assert!(sub.is_valid_at(now));

    sub.expiry = Some(now - Duration::seconds(1));
    assert!(!sub.is_valid_at(now));
}

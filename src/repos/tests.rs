use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::{TempDir, tempdir};

use super::memory::{MemoryJobQueue, MemoryMessageStore, MemorySubscriptionIndex};
use super::sled_store::SledStore;
use super::{JobQueue, MessageStore, SubscriptionIndex};
use crate::domain::{Message, MessageStatus, Pattern};

fn create_test_store() -> (TempDir, SledStore) {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path().to_str().unwrap()).unwrap();
    (dir, store)
}

fn message(sender: &str) -> Message {
    Message::new(json!({ "sender": sender }).as_object().cloned().unwrap())
}

async fn check_message_store(store: &dyn MessageStore) {
    let saved = store.save_message(message("AU")).await.unwrap();
    let id = saved.id.expect("id assigned on save");

    let mut loaded = store.get_message(&id).await.unwrap().unwrap();
    assert_eq!(loaded, saved);

    loaded.status = MessageStatus::Delivered;
    let resaved = store.save_message(loaded).await.unwrap();
    assert_eq!(resaved.id, Some(id), "id must not change on update");
    assert_eq!(
        store.get_message(&id).await.unwrap().unwrap().status,
        MessageStatus::Delivered
    );

    assert!(store.get_message(&uuid::Uuid::new_v4()).await.unwrap().is_none());
}

async fn check_job_queue(queue: &dyn JobQueue) {
    assert!(queue.get_job().await.unwrap().is_none());

    let first = queue.post_job(json!({ "n": 1 }), 0).await.unwrap();
    queue.post_job(json!({ "n": 2 }), 0).await.unwrap();
    queue.post_job(json!({ "n": 3 }), 3600).await.unwrap();

    let job = queue.get_job().await.unwrap().unwrap();
    assert_eq!(job.id, first);
    assert_eq!(job.payload, json!({ "n": 1 }));

    // The first job is held by us; the delayed one is not yet eligible.
    let job2 = queue.get_job().await.unwrap().unwrap();
    assert_eq!(job2.payload, json!({ "n": 2 }));
    assert!(queue.get_job().await.unwrap().is_none());

    queue.delete(&job.id).await.unwrap();
    queue.delete(&job2.id).await.unwrap();
    // Deleting twice is harmless.
    queue.delete(&job2.id).await.unwrap();
    assert!(queue.get_job().await.unwrap().is_none());
}

async fn check_subscription_index(index: &dyn SubscriptionIndex) {
    let exact = Pattern::new("jurisdiction.AU").unwrap();
    let parent = Pattern::new("jurisdiction.*").unwrap();
    let other = Pattern::new("jurisdiction.SG").unwrap();
    let expiry = Some(Utc::now() + Duration::seconds(60));

    index.subscribe_by_pattern(&exact, "http://a/cb", None).await.unwrap();
    index.subscribe_by_pattern(&exact, "http://a/cb", expiry).await.unwrap();
    index.subscribe_by_pattern(&parent, "http://b/cb", None).await.unwrap();
    index.subscribe_by_pattern(&other, "http://c/cb", None).await.unwrap();

    let topic = Pattern::new("jurisdiction.AU").unwrap();
    let mut urls: Vec<_> = index
        .get_subscriptions_by_pattern(&topic)
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.callback_url, s.expiry))
        .collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            ("http://a/cb".to_string(), expiry),
            ("http://b/cb".to_string(), None)
        ],
        "re-subscribing replaces the previous entry"
    );

    index
        .bulk_delete(&[exact.to_key("http://a/cb")])
        .await
        .unwrap();
    let remaining = index.get_subscriptions_by_pattern(&topic).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].callback_url, "http://b/cb");
}

#[tokio::test]
async fn test_memory_message_store() {
    check_message_store(&MemoryMessageStore::new()).await;
}

#[tokio::test]
async fn test_memory_job_queue() {
    check_job_queue(&MemoryJobQueue::new("test", 60)).await;
}

#[tokio::test]
async fn test_memory_subscription_index() {
    check_subscription_index(&MemorySubscriptionIndex::new()).await;
}

#[tokio::test]
async fn test_sled_message_store() {
    let (_dir, store) = create_test_store();
    check_message_store(&store.messages().unwrap()).await;
}

#[tokio::test]
async fn test_sled_job_queue() {
    let (_dir, store) = create_test_store();
    check_job_queue(&store.queue("test", 60).unwrap()).await;
}

#[tokio::test]
async fn test_sled_subscription_index() {
    let (_dir, store) = create_test_store();
    check_subscription_index(&store.subscriptions().unwrap()).await;
}

#[tokio::test]
async fn test_job_reappears_after_visibility_timeout() {
    let queue = MemoryJobQueue::new("test", 0);
    queue.post_job(json!({ "n": 1 }), 0).await.unwrap();

    let first = queue.get_job().await.unwrap().unwrap();
    let again = queue.get_job().await.unwrap().unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_sled_queues_are_isolated() {
    let (_dir, store) = create_test_store();
    let relay = store.queue(super::RELAY_QUEUE, 60).unwrap();
    let outbox = store.queue(super::DELIVERY_OUTBOX_QUEUE, 60).unwrap();

    relay.post_job(json!({ "n": 1 }), 0).await.unwrap();
    assert_eq!(relay.len(), 1);
    assert!(outbox.is_empty());
    assert!(outbox.get_job().await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sled_concurrent_consumers_never_share_a_job() {
    let (_dir, store) = create_test_store();
    let queue = Arc::new(store.queue("test", 60).unwrap());
    for n in 0..20 {
        queue.post_job(json!({ "n": n }), 0).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(job) = queue.get_job().await.unwrap() {
                seen.push(job.id);
            }
            seen
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let total = all.len();
    all.sort();
    all.dedup();
    assert_eq!(total, 20);
    assert_eq!(all.len(), 20);
}

//! End-to-end runs of the pipeline over in-memory stores.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::app::App;
use crate::config::Settings;
use crate::domain::{Message, MessageStatus, NotificationContent, Pattern};
use crate::hub::StepOutcome;
use crate::worker::Processor;

fn settings_for(foreign: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.storage.in_memory = true;
    settings.service.service_url = "http://hub.test".to_string();
    settings.service.foreign_endpoint_url = format!("{}/incoming/messages", foreign.uri());
    settings.http.timeout_secs = 5;
    settings
}

fn payload() -> serde_json::Map<String, serde_json::Value> {
    json!({
        "sender": "AU",
        "receiver": "CN",
        "subject": "AU.abn0000000000.XXXX-XXXXX-XXXXX-XXXXXX",
        "obj": "QmQtYtUS7K1AdKjbuMsmPmPGDLaKL38M5HYwqxW9RKW49n",
        "predicate": "UN.CEFACT.Trade.CertificateOfOrigin.created"
    })
    .as_object()
    .cloned()
    .unwrap()
}

#[tokio::test]
async fn test_received_message_is_relayed_and_marked_delivered() {
    let foreign = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/incoming/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&foreign)
        .await;

    let app = App::from_settings(settings_for(&foreign)).unwrap();
    let received = app
        .receive_message()
        .receive(Message::new(payload()))
        .await
        .unwrap();
    let id = received.id.unwrap();

    let relay = Processor::new(app.process_message(), app.poll_interval());
    assert_eq!(relay.tick().await, StepOutcome::Processed);
    assert_eq!(relay.tick().await, StepOutcome::Idle);

    let stored = app.messages.get_message(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Delivered);
}

#[tokio::test]
async fn test_incoming_message_reaches_subscriber_callback() {
    let foreign = MockServer::start().await;
    let subscriber = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header(
            "link",
            "<http://hub.test/messages/subscriptions/by_jurisdiction>; rel=\"hub\"",
        ))
        .and(body_json(json!({ "id": "msg-42" })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&subscriber)
        .await;

    let app = App::from_settings(settings_for(&foreign)).unwrap();
    let callback = format!("{}/hook", subscriber.uri());
    app.subscriptions
        .subscribe_by_pattern(&Pattern::new("jurisdiction").unwrap(), &callback, None)
        .await
        .unwrap();

    app.publish_new_message()
        .publish(
            "AU",
            NotificationContent {
                id: json!("msg-42"),
            },
        )
        .await
        .unwrap();

    let spreader = Processor::new(app.dispatch_to_subscribers(), app.poll_interval());
    let deliverer = Processor::new(app.deliver_callback(), app.poll_interval());
    assert_eq!(spreader.tick().await, StepOutcome::Processed);
    assert_eq!(deliverer.tick().await, StepOutcome::Processed);
    assert_eq!(deliverer.tick().await, StepOutcome::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_relay_processors_share_sled_store() {
    let foreign = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/incoming/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(6)
        .mount(&foreign)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_for(&foreign);
    settings.storage.in_memory = false;
    settings.storage.path = dir.path().join("db").to_string_lossy().into_owned();
    settings.worker.concurrency = 3;
    settings.worker.poll_interval_ms = 10;
    let app = App::from_settings(settings).unwrap();
    assert_eq!(app.workers_per_stage(), 3);

    let mut ids = Vec::new();
    for _ in 0..6 {
        let message = app
            .receive_message()
            .receive(Message::new(payload()))
            .await
            .unwrap();
        ids.push(message.id.unwrap());
    }

    let (tx, rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();
    for _ in 0..app.workers_per_stage() {
        let processor = Processor::new(app.process_message(), app.poll_interval());
        handles.push(tokio::spawn(processor.run(rx.clone())));
    }

    for _ in 0..200 {
        let mut delivered = 0;
        for id in &ids {
            let message = app.messages.get_message(id).await.unwrap().unwrap();
            if message.status == MessageStatus::Delivered {
                delivered += 1;
            }
        }
        if delivered == ids.len() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
    for id in &ids {
        let message = app.messages.get_message(id).await.unwrap().unwrap();
        assert_eq!(message.status, MessageStatus::Delivered);
    }
}

#[tokio::test]
async fn test_zero_concurrency_still_runs_one_processor() {
    let foreign = MockServer::start().await;
    let mut settings = settings_for(&foreign);
    settings.worker.concurrency = 0;
    let app = App::from_settings(settings).unwrap();
    assert_eq!(app.workers_per_stage(), 1);
}

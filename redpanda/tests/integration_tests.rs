//! Integration tests for [`NotificationConsumer`] with a real Kafka instance.
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they require
//! Docker and take a while to spin up Kafka. To run explicitly:
//! ```bash
//! cargo test -p evento-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use evento_redpanda::{NotificationConsumer, NotificationStream};
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

const TOPIC: &str = "eventos-actualizacion";

async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

fn producer(brokers: &str) -> FutureProducer {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", "5000")
        .create()
        .expect("Failed to create producer")
}

/// Publishes until the broker accepts, which also auto-creates the topic.
async fn publish(producer: &FutureProducer, payload: &str) {
    for attempt in 1..=60 {
        let record = FutureRecord::<(), str>::to(TOPIC).payload(payload);
        if producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(attempt != 60, "Kafka never accepted a message");
    }
}

fn subscribe(brokers: &str, group: &str) -> NotificationStream {
    NotificationConsumer::builder()
        .brokers(brokers)
        .topic(TOPIC)
        .group_id(group)
        .auto_offset_reset("earliest")
        .build()
        .expect("valid configuration")
        .subscribe()
        .expect("Failed to subscribe")
}

async fn next_payload(stream: &mut NotificationStream) -> String {
    tokio::time::timeout(Duration::from_secs(30), stream.next())
        .await
        .expect("Timeout waiting for notification")
        .expect("stream ended")
        .expect("receive error")
        .payload
}

#[tokio::test]
#[ignore]
async fn notifications_arrive_in_order() {
    let (_kafka, brokers) = start_kafka().await;
    let producer = producer(&brokers);
    publish(&producer, r#"{"eventoId":1}"#).await;
    publish(&producer, r#"{"eventoId":2}"#).await;

    let mut stream = subscribe(&brokers, "orden");

    assert_eq!(next_payload(&mut stream).await, r#"{"eventoId":1}"#);
    assert_eq!(next_payload(&mut stream).await, r#"{"eventoId":2}"#);
}

#[tokio::test]
#[ignore]
async fn unhandled_notification_is_redelivered() {
    let (_kafka, brokers) = start_kafka().await;
    let producer = producer(&brokers);
    publish(&producer, "primero").await;
    publish(&producer, "segundo").await;

    {
        let mut stream = subscribe(&brokers, "reentrega");
        assert_eq!(next_payload(&mut stream).await, "primero");
        // Polling again commits "primero".
        assert_eq!(next_payload(&mut stream).await, "segundo");
        // Dropped before "segundo" was acknowledged by another poll.
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut stream = subscribe(&brokers, "reentrega");
    assert_eq!(next_payload(&mut stream).await, "segundo");
}

//! Kafka/Redpanda consumer for cátedra change notifications.
//!
//! Cátedra publishes a message on a topic whenever its event catalog or seat
//! map changes. The payload is informational only: every message means
//! "something changed, resynchronize". This crate turns the topic into a
//! stream of [`Notificacion`] values.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Auto commit is disabled
//! - The offset of a notification is committed when the stream is polled for
//!   the next one, that is after the caller finished handling it
//! - If the process crashes while handling, the message is redelivered
//! - Handlers must tolerate duplicates (a resync is idempotent)
//!
//! # Example
//!
//! ```no_run
//! use evento_redpanda::NotificationConsumer;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut stream = NotificationConsumer::builder()
//!     .brokers("localhost:9092")
//!     .topic("eventos-actualizacion")
//!     .group_id("evento-proxy")
//!     .build()?
//!     .subscribe()?;
//!
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(notificacion) => println!("Changed: {}", notificacion.payload),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use std::pin::Pin;
use thiserror::Error;

/// Default consumer group.
pub const DEFAULT_GROUP_ID: &str = "evento-proxy";

/// Default offset policy for a group without committed offsets.
pub const DEFAULT_AUTO_OFFSET_RESET: &str = "latest";

/// Errors of the notification consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumerError {
    /// Missing or invalid configuration
    #[error("consumer configuration error: {0}")]
    Config(String),

    /// The consumer could not be created or subscribed
    #[error("failed to subscribe to {topic}: {reason}")]
    Subscription {
        /// Topic
        topic: String,
        /// Broker or client error
        reason: String,
    },

    /// A message could not be received
    #[error("failed to receive message: {0}")]
    Transport(String),
}

/// A change notification received from the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notificacion {
    /// Topic it came from
    pub topic: String,
    /// Partition
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Message key, if any
    pub key: Option<String>,
    /// Payload as text (invalid UTF-8 replaced), empty when absent
    pub payload: String,
}

impl Notificacion {
    fn from_message(message: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(texto),
            payload: message.payload().map(texto).unwrap_or_default(),
        }
    }
}

fn texto(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Stream of notifications.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Result<Notificacion, ConsumerError>> + Send>>;

/// Consumer configuration, ready to subscribe.
///
/// # Example
///
/// ```no_run
/// use evento_redpanda::NotificationConsumer;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let consumer = NotificationConsumer::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .topic("eventos-actualizacion")
///     .auto_offset_reset("earliest")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NotificationConsumer {
    brokers: String,
    topic: String,
    group_id: String,
    auto_offset_reset: String,
}

impl NotificationConsumer {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> NotificationConsumerBuilder {
        NotificationConsumerBuilder::default()
    }

    /// Broker list.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Consumer group.
    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Creates the Kafka consumer, subscribes and returns the notification stream.
    ///
    /// The stream never ends on its own; receive errors are yielded and the
    /// stream keeps going.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Subscription`] if the client cannot be created
    /// or the subscription is refused.
    pub fn subscribe(self) -> Result<NotificationStream, ConsumerError> {
        let subscription_error = |reason: String| ConsumerError::Subscription {
            topic: self.topic.clone(),
            reason,
        };

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| subscription_error(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| subscription_error(format!("Failed to subscribe: {e}")))?;

        tracing::info!(
            topic = %self.topic,
            consumer_group = %self.group_id,
            auto_offset_reset = %self.auto_offset_reset,
            manual_commit = true,
            "Subscribed to notification topic"
        );

        let stream = async_stream::stream! {
            let mut pendiente: Option<(String, i32, i64)> = None;
            loop {
                // Being polled again means the previous notification was handled.
                if let Some((topic, partition, offset)) = pendiente.take() {
                    commit(&consumer, &topic, partition, offset);
                }

                match consumer.recv().await {
                    Ok(message) => {
                        let notificacion = Notificacion::from_message(&message);
                        tracing::trace!(
                            topic = %notificacion.topic,
                            partition = notificacion.partition,
                            offset = notificacion.offset,
                            "Received notification"
                        );
                        pendiente = Some((
                            notificacion.topic.clone(),
                            notificacion.partition,
                            notificacion.offset,
                        ));
                        yield Ok(notificacion);
                    },
                    Err(e) => {
                        yield Err(ConsumerError::Transport(e.to_string()));
                    },
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn commit(consumer: &StreamConsumer, topic: &str, partition: i32, offset: i64) {
    let mut offsets = TopicPartitionList::new();
    let result = offsets
        .add_partition_offset(topic, partition, Offset::Offset(offset + 1))
        .and_then(|()| consumer.commit(&offsets, CommitMode::Async));
    if let Err(e) = result {
        tracing::warn!(
            topic = topic,
            partition = partition,
            offset = offset,
            error = %e,
            "Failed to commit offset (message may be redelivered)"
        );
    }
}

/// Builder for [`NotificationConsumer`].
#[derive(Debug, Default)]
pub struct NotificationConsumerBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    group_id: Option<String>,
    auto_offset_reset: Option<String>,
}

impl NotificationConsumerBuilder {
    /// Comma-separated broker addresses (required).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Topic to consume (required).
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Consumer group. Default: [`DEFAULT_GROUP_ID`].
    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Where a group without committed offsets starts: `"earliest"` or
    /// `"latest"`. Default: [`DEFAULT_AUTO_OFFSET_RESET`].
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`NotificationConsumer`].
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Config`] if brokers or topic are missing or
    /// blank, or the offset policy is unknown.
    pub fn build(self) -> Result<NotificationConsumer, ConsumerError> {
        let requerido = |valor: Option<String>, nombre: &str| {
            valor
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConsumerError::Config(format!("{nombre} not configured")))
        };
        let brokers = requerido(self.brokers, "Brokers")?;
        let topic = requerido(self.topic, "Topic")?;

        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| DEFAULT_AUTO_OFFSET_RESET.to_string());
        if !matches!(auto_offset_reset.as_str(), "earliest" | "latest") {
            return Err(ConsumerError::Config(format!(
                "Unknown auto.offset.reset policy: {auto_offset_reset}"
            )));
        }

        Ok(NotificationConsumer {
            brokers,
            topic,
            group_id: self.group_id.unwrap_or_else(|| DEFAULT_GROUP_ID.to_string()),
            auto_offset_reset,
        })
    }
}

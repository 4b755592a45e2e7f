//! Broker collaborator interfaces.
//!
//! These traits describe the partitioned log broker at its interface
//! boundary only; concrete client wiring lives outside the core.

use async_trait::async_trait;
use thiserror::Error;

/// A message delivered by the broker consumer.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Partition the message was read from.
    pub partition: i32,
    /// Offset of the message within its partition.
    pub offset: i64,
    /// Optional partitioning key.
    pub key: Option<String>,
    /// Opaque message body.
    pub payload: Vec<u8>,
}

/// A message to produce inside the transaction.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Destination topic.
    pub topic: String,
    /// Optional partitioning key.
    pub key: Option<String>,
    /// Opaque message body.
    pub payload: Vec<u8>,
}

/// A consumer position to fold into a transaction commit. Following log
/// broker convention this is the offset of the *next* message to consume,
/// not the one just handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOffset {
    /// The partition the offset applies to.
    pub partition: i32,
    /// Offset of the next message to consume.
    pub offset: i64,
}

/// Broker-side failures.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Transient transport failure. The transaction is aborted and the
    /// message redelivered.
    #[error("broker transport error: {0}")]
    Transport(String),

    /// Another producer with the same transactional identity fenced this
    /// one off. Fatal for this producer instance.
    #[error("producer fenced: {0}")]
    Fenced(String),
}

/// A producer whose sends are scoped to explicit transactions.
///
/// Implementations are fenced by a transactional identity that must stay
/// stable across restarts of the same logical consumer-producer pairing;
/// a changing identity voids the duplicate- and lost-delivery guarantees.
#[async_trait]
pub trait TransactionalProducer: Send + Sync {
    /// Opens a transaction. Sends and the final offset commit are scoped
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the broker rejects the begin.
    async fn begin(&self) -> Result<(), BrokerError>;

    /// Produces a message inside the open transaction. The message is
    /// invisible to consumers until the transaction commits.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the send fails; the caller aborts.
    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError>;

    /// Commits the open transaction, atomically publishing every sent
    /// message and advancing the given consumer offsets.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the commit fails; nothing is published
    /// and no offset advances.
    async fn commit(&self, offsets: &[PartitionOffset]) -> Result<(), BrokerError>;

    /// Aborts the open transaction, rolling back every sent message.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError` if the abort itself fails.
    async fn abort(&self) -> Result<(), BrokerError>;
}

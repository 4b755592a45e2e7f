//! The EOS coordinator: one transaction per handled message.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::broker::{BrokerError, InboundMessage, PartitionOffset, TransactionalProducer};

/// Boxed error reported by the work closure (typically the dispatch
/// loop's terminal failure).
pub type WorkError = Box<dyn std::error::Error + Send + Sync>;

/// Coordinator-level failures.
#[derive(Debug, Error)]
pub enum EosError {
    /// The transactional identity was empty. The identity fences zombie
    /// producers; without a stable one the exactly-once guarantee is
    /// void, so this is rejected at construction.
    #[error("transactional id must not be empty")]
    EmptyTransactionalId,

    /// The broker failed outside the abort path (begin failed, or an
    /// abort itself failed). The host treats this as a processing
    /// failure; the unadvanced offset means the message is redelivered.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// How a handled message left the coordinator.
///
/// An aborted transaction is an outcome, not an error: the broker's own
/// redelivery replays the message, so the host has nothing to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EosOutcome {
    /// Produced messages and the offset advance are both visible.
    Committed {
        /// The offset folded into the commit (next message to consume).
        offset: PartitionOffset,
    },
    /// Produced messages were rolled back and the offset did not
    /// advance; the broker will redeliver the message.
    Aborted {
        /// Why the transaction was abandoned.
        reason: String,
    },
}

/// Binds a consumer offset advance and a producer transaction into one
/// all-or-nothing unit per handled message.
///
/// Transactions for one coordinator never overlap: the coordinator
/// serializes `process` calls for its consumer-producer identity.
pub struct EosCoordinator<P> {
    producer: Arc<P>,
    transactional_id: String,
    in_flight: AsyncMutex<()>,
}

impl<P> std::fmt::Debug for EosCoordinator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EosCoordinator")
            .field("transactional_id", &self.transactional_id)
            .finish()
    }
}

impl<P> EosCoordinator<P>
where
    P: TransactionalProducer,
{
    /// Creates a coordinator fenced by `transactional_id`.
    ///
    /// The id must remain stable across restarts of the same logical
    /// consumer-producer pairing.
    ///
    /// # Errors
    ///
    /// Returns [`EosError::EmptyTransactionalId`] if the id is empty or
    /// whitespace.
    pub fn new(transactional_id: impl Into<String>, producer: Arc<P>) -> Result<Self, EosError> {
        let transactional_id = transactional_id.into();
        if transactional_id.trim().is_empty() {
            return Err(EosError::EmptyTransactionalId);
        }
        Ok(Self {
            producer,
            transactional_id,
            in_flight: AsyncMutex::new(()),
        })
    }

    /// Returns the fencing identity.
    #[must_use]
    pub fn transactional_id(&self) -> &str {
        &self.transactional_id
    }

    /// Handles one consumed message inside a transaction.
    ///
    /// Begins a transaction, runs `work` (which produces any outbound
    /// messages through the transaction-scoped producer), and on success
    /// commits the produced messages together with the consumed offset.
    /// Any failure in `work` or in the commit aborts the transaction:
    /// produced messages are rolled back, the offset does not advance,
    /// and the broker redelivers the message.
    ///
    /// # Errors
    ///
    /// Returns [`EosError::Broker`] only if the transaction could not be
    /// opened or could not be rolled back. Everything else is an
    /// [`EosOutcome`].
    pub async fn process<W, Fut>(
        &self,
        message: &InboundMessage,
        work: W,
    ) -> Result<EosOutcome, EosError>
    where
        W: FnOnce(Arc<P>) -> Fut + Send,
        Fut: Future<Output = Result<(), WorkError>> + Send,
    {
        let _exclusive = self.in_flight.lock().await;

        self.producer.begin().await?;

        if let Err(e) = work(Arc::clone(&self.producer)).await {
            return self.abort(message, format!("handler failed: {e}")).await;
        }

        let offset = PartitionOffset {
            partition: message.partition,
            offset: message.offset + 1,
        };
        match self.producer.commit(&[offset]).await {
            Ok(()) => {
                tracing::debug!(
                    transactional_id = %self.transactional_id,
                    partition = offset.partition,
                    offset = offset.offset,
                    "transaction committed"
                );
                Ok(EosOutcome::Committed { offset })
            }
            Err(fenced @ BrokerError::Fenced(_)) => Err(fenced.into()),
            Err(e) => self.abort(message, format!("commit failed: {e}")).await,
        }
    }

    /// Rolls the open transaction back and reports the abort as an
    /// outcome.
    async fn abort(
        &self,
        message: &InboundMessage,
        reason: String,
    ) -> Result<EosOutcome, EosError> {
        self.producer.abort().await?;
        tracing::debug!(
            transactional_id = %self.transactional_id,
            partition = message.partition,
            offset = message.offset,
            reason = %reason,
            "transaction aborted; message will be redelivered"
        );
        Ok(EosOutcome::Aborted { reason })
    }
}

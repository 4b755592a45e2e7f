//! Scripted transactional producer for EOS tests.
//!
//! Tracks the full transaction protocol and only exposes messages and
//! offsets once their transaction commits, so tests can assert the
//! all-or-nothing property directly. Fault injection points cover the
//! "crash after send, before offset commit" scenario.

use std::sync::Mutex;

use async_trait::async_trait;

use ledgerstream_eos::{BrokerError, OutboundMessage, PartitionOffset, TransactionalProducer};

/// Where the next transaction should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailPoint {
    /// No injected failure.
    #[default]
    None,
    /// The next `send` fails with a transport error.
    OnSend,
    /// The next `commit` fails with a transport error (after sends
    /// succeeded — the EOS atomicity scenario).
    OnCommit,
    /// The next `commit` fails with a fencing error.
    FencedOnCommit,
}

#[derive(Debug, Default)]
struct ProducerState {
    in_transaction: bool,
    pending: Vec<OutboundMessage>,
    committed_messages: Vec<OutboundMessage>,
    committed_offsets: Vec<PartitionOffset>,
    aborted_transactions: u32,
    fail_point: FailPoint,
}

/// An in-memory `TransactionalProducer` that records every protocol step.
#[derive(Debug, Default)]
pub struct ScriptedProducer {
    state: Mutex<ProducerState>,
}

impl ScriptedProducer {
    /// Creates a producer with no scripted failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure point for the next transaction.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_at(&self, fail_point: FailPoint) {
        self.state.lock().unwrap().fail_point = fail_point;
    }

    /// Messages made visible by committed transactions, in commit order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn visible_messages(&self) -> Vec<OutboundMessage> {
        self.state.lock().unwrap().committed_messages.clone()
    }

    /// Offsets advanced by committed transactions, in commit order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn committed_offsets(&self) -> Vec<PartitionOffset> {
        self.state.lock().unwrap().committed_offsets.clone()
    }

    /// Number of aborted transactions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn aborted_transactions(&self) -> u32 {
        self.state.lock().unwrap().aborted_transactions
    }
}

#[async_trait]
impl TransactionalProducer for ScriptedProducer {
    async fn begin(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if state.in_transaction {
            return Err(BrokerError::Transport(
                "transaction already in progress".into(),
            ));
        }
        state.in_transaction = true;
        state.pending.clear();
        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if !state.in_transaction {
            return Err(BrokerError::Transport("no open transaction".into()));
        }
        if state.fail_point == FailPoint::OnSend {
            state.fail_point = FailPoint::None;
            return Err(BrokerError::Transport("simulated send failure".into()));
        }
        state.pending.push(message);
        Ok(())
    }

    async fn commit(&self, offsets: &[PartitionOffset]) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if !state.in_transaction {
            return Err(BrokerError::Transport("no open transaction".into()));
        }
        match state.fail_point {
            FailPoint::OnCommit => {
                state.fail_point = FailPoint::None;
                return Err(BrokerError::Transport("simulated commit failure".into()));
            }
            FailPoint::FencedOnCommit => {
                state.fail_point = FailPoint::None;
                return Err(BrokerError::Fenced("newer producer instance".into()));
            }
            FailPoint::None | FailPoint::OnSend => {}
        }
        let pending = std::mem::take(&mut state.pending);
        state.committed_messages.extend(pending);
        state.committed_offsets.extend_from_slice(offsets);
        state.in_transaction = false;
        Ok(())
    }

    async fn abort(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if !state.in_transaction {
            return Err(BrokerError::Transport("no open transaction".into()));
        }
        state.pending.clear();
        state.in_transaction = false;
        state.aborted_transactions += 1;
        Ok(())
    }
}

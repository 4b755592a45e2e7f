//! Ledgerstream EOS — exactly-once consume-transform-produce.
//!
//! The [`EosCoordinator`] binds a consumer's offset advance to the
//! transactional commit of everything produced while handling that
//! message, so both become visible together or neither does.

mod broker;
mod coordinator;

pub use broker::{
    BrokerError, InboundMessage, OutboundMessage, PartitionOffset, TransactionalProducer,
};
pub use coordinator::{EosCoordinator, EosError, EosOutcome, WorkError};

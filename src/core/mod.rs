//! Core ledger components

pub mod blockchain;
pub mod block;
pub mod transaction;
pub mod utxo;

pub use blockchain::{AppendOutcome, ChainSnapshot, Ledger, RejectReason};
pub use block::Block;
pub use transaction::{OutPoint, Transaction, TxInput, TxOutput};
pub use utxo::{ScanMode, SpendableOutputs, UtxoEntry, UtxoSet};

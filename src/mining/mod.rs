//! Proof-of-work sealing

pub mod miner;

pub use miner::{CancelFlag, CancelOnDrop, ProofOfWork, MAX_DIFFICULTY};

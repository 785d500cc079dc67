//! Hashchain Ledger - an in-memory, append-only chain of proof-of-work blocks
//!
//! This library implements:
//! - UTXO-based value transfers with coinbase minting
//! - SHA-256 hash-linked blocks sealed by a leading-zero nonce search
//! - An append gate that re-checks linkage, work and spends under a lock
//! - Consistent snapshot reads while blocks are being appended
//! - A REST API and command line for serving the ledger

pub mod core;
pub mod crypto;
pub mod mining;
pub mod api;
pub mod cli;
pub mod error;
pub mod config;

pub use error::{LedgerError, Result};

//! Unlock verification for transaction inputs and outputs.
//!
//! Inputs carry an unlocking token (`script_sig`) and outputs a locking token
//! (`script_pubkey`). Whether a token satisfies a given context (an address) is
//! decided by an [`UnlockVerifier`], so a real signature scheme can replace the
//! plain string comparison without touching ledger code.

use std::fmt::Debug;

pub trait UnlockVerifier: Send + Sync + Debug {
    /// Returns true if `token` unlocks for `context`.
    fn verify(&self, token: &str, context: &str) -> bool;
}

/// Tokens are plain addresses; a token unlocks only for an identical address.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTokenVerifier;

impl UnlockVerifier for PlainTokenVerifier {
    fn verify(&self, token: &str, context: &str) -> bool {
        token == context
    }
}

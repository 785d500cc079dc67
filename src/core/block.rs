use crate::core::Transaction;
use crate::crypto::hash::Hash256;
use crate::Result;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: String,
    pub transactions: Vec<Transaction>,
    pub hash: String,
    pub prev_hash: String,
    pub nonce: String,
}

impl Block {
    /// Assembles an unsealed block stamped with the current time.
    pub fn new(prev_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        Self::with_timestamp(timestamp, prev_hash, transactions)
    }

    pub fn with_timestamp(
        timestamp: impl Into<String>,
        prev_hash: impl Into<String>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            transactions,
            hash: String::new(),
            prev_hash: prev_hash.into(),
            nonce: String::new(),
        }
    }

    /// Digest over the concatenated transaction ids, in block order.
    pub fn hash_transactions(&self) -> Hash256 {
        let ids: Vec<&[u8]> = self
            .transactions
            .iter()
            .map(|tx| tx.id.as_bytes())
            .collect();
        Hash256::hash_concat(&ids)
    }

    /// Recomputes the fingerprint from the stored fields.
    pub fn compute_hash(&self) -> String {
        self.hash_with_nonce(&self.nonce, &self.hash_transactions())
    }

    /// Fingerprint for a candidate nonce. `tx_digest` must be
    /// `self.hash_transactions()`; the miner computes it once per search.
    pub(crate) fn hash_with_nonce(&self, nonce: &str, tx_digest: &Hash256) -> String {
        Hash256::hash_concat(&[
            self.timestamp.as_bytes(),
            self.prev_hash.as_bytes(),
            nonce.as_bytes(),
            &tx_digest.as_bytes()[..],
        ])
        .to_hex()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn size(&self) -> usize {
        self.to_bytes().map(|data| data.len()).unwrap_or(0)
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

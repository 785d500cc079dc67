use crate::core::Block;
use crate::{LedgerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Nonce attempts between two looks at the cancel flag.
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Widest target a hex-encoded SHA-256 fingerprint can satisfy.
pub const MAX_DIFFICULTY: usize = 64;

/// Shared signal telling an in-flight search to give up.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Guard that raises the flag when dropped, e.g. when the request future
    /// awaiting a seal is abandoned.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

#[derive(Debug)]
pub struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Leading-zero proof-of-work over the hex block fingerprint.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: usize,
    prefix: String,
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            prefix: "0".repeat(difficulty),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn meets_target(&self, hash: &str) -> bool {
        hash.starts_with(&self.prefix)
    }

    /// True when the stored hash both recomputes and meets the target.
    pub fn verify(&self, block: &Block) -> bool {
        self.meets_target(&block.hash) && block.compute_hash() == block.hash
    }

    /// Searches nonces 0, 1, 2, ... (hex encoded) until the fingerprint meets
    /// the target, then fixes `nonce` and `hash` on the block.
    pub fn seal(&self, mut block: Block, cancel: &CancelFlag) -> Result<Block> {
        let tx_digest = block.hash_transactions();
        let start_time = Instant::now();
        log::debug!(
            "Sealing block over {} transaction(s), digest {}, difficulty {}",
            block.transactions.len(),
            tx_digest,
            self.difficulty
        );

        for nonce in 0..=u64::MAX {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                log::info!("🛑 Proof-of-work cancelled after {} attempts", nonce);
                return Err(LedgerError::SealCancelled);
            }

            let nonce_hex = format!("{:x}", nonce);
            let hash = block.hash_with_nonce(&nonce_hex, &tx_digest);

            if self.meets_target(&hash) {
                let elapsed = start_time.elapsed();
                log::info!(
                    "✅ Block sealed! Hash: {}, Nonce: {}, Attempts: {}, Time: {:.2}s",
                    hash,
                    nonce_hex,
                    nonce + 1,
                    elapsed.as_secs_f64()
                );

                block.nonce = nonce_hex;
                block.hash = hash;
                return Ok(block);
            }

            log::trace!("{} do more work!", hash);
        }

        Err(LedgerError::Seal("nonce space exhausted".to_string()))
    }

    /// Runs [`ProofOfWork::seal`] on the blocking pool so the search never
    /// stalls the async runtime.
    pub async fn seal_async(&self, block: Block, cancel: CancelFlag) -> Result<Block> {
        let pow = self.clone();
        tokio::task::spawn_blocking(move || pow.seal(block, &cancel))
            .await
            .map_err(|e| LedgerError::Seal(format!("mining task failed: {}", e)))?
    }
}

use crate::config::LedgerConfig;
use crate::core::transaction::{OutPoint, SUBSIDY};
use crate::core::utxo::{ScanMode, SpendableOutputs, UtxoEntry, UtxoSet};
use crate::core::{Block, Transaction, TxOutput};
use crate::crypto::unlock::{PlainTokenVerifier, UnlockVerifier};
use crate::mining::{CancelFlag, ProofOfWork};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

pub const GENESIS_COINBASE_DATA: &str =
    "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// Why a sealed candidate was kept out of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    PrevHashMismatch { expected: String, found: String },
    HashMismatch { stored: String, computed: String },
    InsufficientWork { hash: String, difficulty: usize },
    InvalidTransactionId { txid: String },
    DuplicateTransaction { txid: String },
    InvalidCoinbase { txid: String, value: u64 },
    UnknownOutput { txid: String, vout: i64 },
    Unauthorized { outpoint: OutPoint },
    SpendConflict { outpoint: OutPoint },
    ValueMismatch { txid: String, inputs: u64, outputs: u64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::PrevHashMismatch { expected, found } => {
                write!(f, "previous hash mismatch: expected {}, found {}", expected, found)
            }
            RejectReason::HashMismatch { stored, computed } => {
                write!(f, "hash mismatch: stored {}, computed {}", stored, computed)
            }
            RejectReason::InsufficientWork { hash, difficulty } => {
                write!(f, "hash {} does not meet difficulty {}", hash, difficulty)
            }
            RejectReason::InvalidTransactionId { txid } => {
                write!(f, "transaction {} does not match its contents", txid)
            }
            RejectReason::DuplicateTransaction { txid } => {
                write!(f, "transaction {} is already recorded", txid)
            }
            RejectReason::InvalidCoinbase { txid, value } => {
                write!(f, "coinbase {} mints {} instead of the subsidy", txid, value)
            }
            RejectReason::UnknownOutput { txid, vout } => {
                write!(f, "input references unknown output {}:{}", txid, vout)
            }
            RejectReason::Unauthorized { outpoint } => {
                write!(f, "input cannot unlock output {}", outpoint)
            }
            RejectReason::SpendConflict { outpoint } => {
                write!(f, "output {} is already spent", outpoint)
            }
            RejectReason::ValueMismatch { txid, inputs, outputs } => {
                write!(f, "transaction {} spends {} but pays out {}", txid, inputs, outputs)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Committed { height: u64 },
    Rejected(RejectReason),
}

impl AppendOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, AppendOutcome::Committed { .. })
    }

    pub fn into_result(self) -> Result<u64> {
        match self {
            AppendOutcome::Committed { height } => Ok(height),
            AppendOutcome::Rejected(reason) => Err(LedgerError::BlockRejected(reason)),
        }
    }
}

/// Immutable point-in-time view of the chain.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    blocks: Arc<Vec<Block>>,
    verifier: Arc<dyn UnlockVerifier>,
    scan_mode: ScanMode,
}

impl ChainSnapshot {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn height(&self) -> u64 {
        self.blocks.len().saturating_sub(1) as u64
    }

    /// Genesis is present from construction, so the tail always exists.
    pub fn tail(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn utxo_set(&self) -> UtxoSet<'_> {
        UtxoSet::new(&self.blocks, self.verifier.as_ref(), self.scan_mode)
    }

    pub fn find_unspent_transactions(&self, address: &str) -> Vec<Transaction> {
        self.utxo_set().find_unspent_transactions(address)
    }

    pub fn find_utxo(&self, address: &str) -> Vec<TxOutput> {
        self.utxo_set().find_utxo(address)
    }

    pub fn find_spendable_outputs(&self, address: &str, amount: u64) -> SpendableOutputs {
        self.utxo_set().find_spendable_outputs(address, amount)
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        self.utxo_set().get_balance(address)
    }

    pub fn new_transfer_transaction(&self, from: &str, to: &str, amount: u64) -> Result<Transaction> {
        let spendable = self.find_spendable_outputs(from, amount);
        Transaction::new_transfer(from, to, amount, &spendable)
    }
}

/// Append-only, in-memory chain of sealed blocks.
///
/// Readers take cheap `Arc` snapshots; `append` copies the sequence only when
/// a snapshot is still alive. Proof-of-work always runs outside the lock.
#[derive(Debug)]
pub struct Ledger {
    chain: RwLock<Arc<Vec<Block>>>,
    pow: ProofOfWork,
    verifier: Arc<dyn UnlockVerifier>,
    scan_mode: ScanMode,
    max_submit_attempts: u32,
}

impl Ledger {
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        Self::with_verifier(config, Arc::new(PlainTokenVerifier))
    }

    pub fn with_verifier(config: &LedgerConfig, verifier: Arc<dyn UnlockVerifier>) -> Result<Self> {
        config.validate()?;

        let pow = ProofOfWork::new(config.difficulty);
        let genesis = Self::genesis(&config.genesis_recipient, &pow)?;
        log::info!(
            "⛓️  Genesis block {} created for '{}' at difficulty {}",
            genesis.hash,
            config.genesis_recipient,
            config.difficulty
        );

        Ok(Self {
            chain: RwLock::new(Arc::new(vec![genesis])),
            pow,
            verifier,
            scan_mode: config.scan_mode,
            max_submit_attempts: config.max_submit_attempts.max(1),
        })
    }

    /// The block at index 0: the well-known coinbase, no predecessor.
    pub fn genesis(recipient: &str, pow: &ProofOfWork) -> Result<Block> {
        let coinbase = Transaction::new_coinbase(recipient, GENESIS_COINBASE_DATA);
        pow.seal(Block::new(String::new(), vec![coinbase]), &CancelFlag::new())
    }

    pub fn is_valid(candidate: &Block, predecessor: &Block) -> bool {
        Self::validate_link(candidate, predecessor).is_ok()
    }

    /// Linkage and fingerprint check of `candidate` against `predecessor`.
    pub fn validate_link(candidate: &Block, predecessor: &Block) -> std::result::Result<(), RejectReason> {
        if predecessor.hash != candidate.prev_hash {
            return Err(RejectReason::PrevHashMismatch {
                expected: predecessor.hash.clone(),
                found: candidate.prev_hash.clone(),
            });
        }

        let computed = candidate.compute_hash();
        if computed != candidate.hash {
            return Err(RejectReason::HashMismatch {
                stored: candidate.hash.clone(),
                computed,
            });
        }

        Ok(())
    }

    pub fn snapshot(&self) -> Result<ChainSnapshot> {
        let blocks = self.chain.read()?.clone();
        Ok(ChainSnapshot {
            blocks,
            verifier: self.verifier.clone(),
            scan_mode: self.scan_mode,
        })
    }

    pub fn get_chain(&self) -> Result<Vec<Block>> {
        Ok(self.chain.read()?.as_ref().clone())
    }

    pub fn tail(&self) -> Result<Block> {
        Ok(self.snapshot()?.tail().clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.chain.read()?.len())
    }

    pub fn height(&self) -> Result<u64> {
        Ok(self.snapshot()?.height())
    }

    pub fn difficulty(&self) -> usize {
        self.pow.difficulty()
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Validates `candidate` against the current tail and pushes it, all under
    /// the write lock.
    pub fn append(&self, candidate: Block) -> Result<AppendOutcome> {
        let mut chain = self.chain.write()?;

        let verdict = Self::validate_link(&candidate, &chain[chain.len() - 1])
            .and_then(|_| self.check_work(&candidate))
            .and_then(|_| self.check_transactions(&chain, &candidate));

        match verdict {
            Ok(()) => {
                Arc::make_mut(&mut chain).push(candidate);
                let height = (chain.len() - 1) as u64;
                log::info!("✅ Block {} added to ledger", height);
                Ok(AppendOutcome::Committed { height })
            }
            Err(reason) => {
                log::warn!("Rejected block {}: {}", candidate.hash, reason);
                Ok(AppendOutcome::Rejected(reason))
            }
        }
    }

    fn check_work(&self, candidate: &Block) -> std::result::Result<(), RejectReason> {
        if self.pow.meets_target(&candidate.hash) {
            Ok(())
        } else {
            Err(RejectReason::InsufficientWork {
                hash: candidate.hash.clone(),
                difficulty: self.pow.difficulty(),
            })
        }
    }

    /// Per-transaction gate: ids must match contents and be new to the chain,
    /// a coinbase mints exactly the subsidy, and every other input must name an
    /// existing, unspent output it can unlock. Inputs and outputs must balance.
    fn check_transactions(&self, blocks: &[Block], candidate: &Block) -> std::result::Result<(), RejectReason> {
        let utxo = UtxoSet::new(blocks, self.verifier.as_ref(), ScanMode::Full);
        let mut spent = utxo.spent_outpoints();
        let mut seen = utxo.transaction_ids();

        for tx in &candidate.transactions {
            if !tx.has_valid_id() {
                return Err(RejectReason::InvalidTransactionId { txid: tx.id.clone() });
            }
            if !seen.insert(tx.id.as_str()) {
                return Err(RejectReason::DuplicateTransaction { txid: tx.id.clone() });
            }

            if tx.is_coinbase() {
                if tx.outputs.len() != 1 || tx.outputs[0].value != SUBSIDY {
                    return Err(RejectReason::InvalidCoinbase {
                        txid: tx.id.clone(),
                        value: tx.total_output_value(),
                    });
                }
                continue;
            }

            let mut inputs: u64 = 0;
            for input in &tx.inputs {
                let unknown = || RejectReason::UnknownOutput {
                    txid: input.txid.clone(),
                    vout: input.vout,
                };
                let outpoint = input.outpoint().ok_or_else(unknown)?;
                let output = utxo.find_output(&outpoint).ok_or_else(unknown)?;

                if !self.verifier.verify(&input.script_sig, &output.script_pubkey) {
                    return Err(RejectReason::Unauthorized { outpoint });
                }
                if !spent.insert(outpoint.clone()) {
                    return Err(RejectReason::SpendConflict { outpoint });
                }
                inputs = inputs.saturating_add(output.value);
            }

            let outputs = tx.total_output_value();
            if inputs != outputs {
                return Err(RejectReason::ValueMismatch {
                    txid: tx.id.clone(),
                    inputs,
                    outputs,
                });
            }
        }

        Ok(())
    }

    /// Re-checks genesis and every link of the committed chain.
    pub fn verify_chain(&self) -> Result<()> {
        let snapshot = self.snapshot()?;
        let blocks = snapshot.blocks();

        let genesis = &blocks[0];
        let computed = genesis.compute_hash();
        if computed != genesis.hash {
            return Err(LedgerError::CorruptChain {
                height: 0,
                reason: RejectReason::HashMismatch {
                    stored: genesis.hash.clone(),
                    computed,
                },
            });
        }

        for (height, pair) in blocks.windows(2).enumerate() {
            Self::validate_link(&pair[1], &pair[0])
                .and_then(|_| self.check_work(&pair[1]))
                .map_err(|reason| LedgerError::CorruptChain {
                    height: height as u64 + 1,
                    reason,
                })?;
        }

        Ok(())
    }

    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        Ok(self.snapshot()?.find_unspent_transactions(address))
    }

    pub fn find_utxo(&self, address: &str) -> Result<Vec<TxOutput>> {
        Ok(self.snapshot()?.find_utxo(address))
    }

    pub fn get_utxos(&self, address: &str) -> Result<Vec<UtxoEntry>> {
        Ok(self.snapshot()?.utxo_set().get_utxos(address))
    }

    pub fn find_spendable_outputs(&self, address: &str, amount: u64) -> Result<SpendableOutputs> {
        Ok(self.snapshot()?.find_spendable_outputs(address, amount))
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        Ok(self.snapshot()?.get_balance(address))
    }

    pub fn get_total_supply(&self) -> Result<u64> {
        Ok(self.snapshot()?.utxo_set().get_total_supply())
    }

    pub fn new_transfer_transaction(&self, from: &str, to: &str, amount: u64) -> Result<Transaction> {
        self.snapshot()?.new_transfer_transaction(from, to, amount)
    }

    pub async fn submit_transfer(&self, from: &str, to: &str, amount: u64) -> Result<Block> {
        self.submit_transfer_with_cancel(from, to, amount, CancelFlag::new()).await
    }

    /// Builds a transfer, seals it and commits it. Funds are re-selected on
    /// every attempt, so losing a race to another block surfaces as
    /// `InsufficientFunds` when the same outputs are gone.
    pub async fn submit_transfer_with_cancel(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        cancel: CancelFlag,
    ) -> Result<Block> {
        log::debug!("Transfer request: {} -> {} ({})", from, to, amount);
        self.commit_with_retry(cancel, |snapshot| {
            Ok(vec![snapshot.new_transfer_transaction(from, to, amount)?])
        })
        .await
    }

    /// Mints a fresh subsidy to `address` in a block of its own.
    pub async fn mine_reward(&self, address: &str) -> Result<Block> {
        self.mine_reward_with_cancel(address, CancelFlag::new()).await
    }

    pub async fn mine_reward_with_cancel(&self, address: &str, cancel: CancelFlag) -> Result<Block> {
        if address.is_empty() {
            return Err(LedgerError::InvalidInput("reward address must not be empty".to_string()));
        }

        self.commit_with_retry(cancel, |snapshot| {
            let memo = format!("Reward to '{}' at height {}", address, snapshot.len());
            Ok(vec![Transaction::new_coinbase(address, &memo)])
        })
        .await
    }

    async fn commit_with_retry<F>(&self, cancel: CancelFlag, build: F) -> Result<Block>
    where
        F: Fn(&ChainSnapshot) -> Result<Vec<Transaction>> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let snapshot = self.snapshot()?;
            let transactions = build(&snapshot)?;
            let candidate = Block::new(snapshot.tail().hash.clone(), transactions);
            drop(snapshot);

            let sealed = self.pow.seal_async(candidate, cancel.clone()).await?;

            match self.append(sealed.clone())? {
                AppendOutcome::Committed { .. } => return Ok(sealed),
                AppendOutcome::Rejected(RejectReason::PrevHashMismatch { .. })
                    if attempt < self.max_submit_attempts =>
                {
                    log::debug!("Tail moved while sealing, retrying (attempt {})", attempt + 1);
                }
                AppendOutcome::Rejected(reason) => return Err(LedgerError::BlockRejected(reason)),
            }
        }
    }
}

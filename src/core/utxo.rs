use crate::core::transaction::OutPoint;
use crate::core::{Block, Transaction, TxOutput};
use crate::crypto::unlock::UnlockVerifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// How far back an address scan walks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Visit every block down to genesis.
    #[default]
    Full,
    /// Stop at the first block without transactions, treating it as the end
    /// of meaningful history.
    StopAtEmptyBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub script_pubkey: String,
    pub height: u64,
    pub is_coinbase: bool,
}

/// Outputs picked to fund a transfer, keyed by owning transaction id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpendableOutputs {
    pub accumulated: u64,
    pub outputs: BTreeMap<String, Vec<u32>>,
}

impl SpendableOutputs {
    pub fn outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.outputs
            .iter()
            .flat_map(|(txid, indices)| indices.iter().map(move |vout| OutPoint::new(txid.clone(), *vout)))
    }
}

struct Unspent<'a> {
    tx: &'a Transaction,
    vout: u32,
    height: u64,
}

impl Unspent<'_> {
    fn output(&self) -> &TxOutput {
        &self.tx.outputs[self.vout as usize]
    }
}

/// Read-only UTXO queries over an ordered block sequence.
pub struct UtxoSet<'a> {
    blocks: &'a [Block],
    verifier: &'a dyn UnlockVerifier,
    mode: ScanMode,
}

impl<'a> UtxoSet<'a> {
    pub fn new(blocks: &'a [Block], verifier: &'a dyn UnlockVerifier, mode: ScanMode) -> Self {
        Self {
            blocks,
            verifier,
            mode,
        }
    }

    /// Unspent outputs `address` can unlock, newest first.
    ///
    /// Blocks and the transactions inside them are walked in reverse, and each
    /// transaction's inputs are recorded as spent before its own outputs are
    /// checked, so a spend is always seen before the output it consumes.
    fn scan(&self, address: &str) -> Vec<Unspent<'a>> {
        let mut spent: HashSet<OutPoint> = HashSet::new();
        let mut found = Vec::new();

        for (height, block) in self.blocks.iter().enumerate().rev() {
            if block.transactions.is_empty() && self.mode == ScanMode::StopAtEmptyBlock {
                break;
            }

            for tx in block.transactions.iter().rev() {
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        if input.can_unlock_output_with(self.verifier, address) {
                            if let Some(outpoint) = input.outpoint() {
                                spent.insert(outpoint);
                            }
                        }
                    }
                }

                for (vout, output) in tx.outputs.iter().enumerate() {
                    let vout = vout as u32;
                    if output.can_be_unlocked_with(self.verifier, address)
                        && !spent.contains(&OutPoint::new(tx.id.as_str(), vout))
                    {
                        found.push(Unspent {
                            tx,
                            vout,
                            height: height as u64,
                        });
                    }
                }
            }
        }

        found
    }

    /// Transactions holding at least one unspent output for `address`, each
    /// listed once.
    pub fn find_unspent_transactions(&self, address: &str) -> Vec<Transaction> {
        let mut txs: Vec<&Transaction> = self.scan(address).into_iter().map(|u| u.tx).collect();
        txs.dedup_by(|a, b| a.id == b.id);
        txs.into_iter().cloned().collect()
    }

    pub fn find_utxo(&self, address: &str) -> Vec<TxOutput> {
        self.scan(address)
            .iter()
            .map(|u| u.output().clone())
            .collect()
    }

    pub fn get_utxos(&self, address: &str) -> Vec<UtxoEntry> {
        self.scan(address)
            .iter()
            .map(|u| {
                let output = u.output();
                UtxoEntry {
                    txid: u.tx.id.clone(),
                    vout: u.vout,
                    value: output.value,
                    script_pubkey: output.script_pubkey.clone(),
                    height: u.height,
                    is_coinbase: u.tx.is_coinbase(),
                }
            })
            .collect()
    }

    /// Greedily selects unspent outputs until `amount` is covered. If the
    /// address cannot cover it, everything found is returned and the caller
    /// decides.
    pub fn find_spendable_outputs(&self, address: &str, amount: u64) -> SpendableOutputs {
        let mut spendable = SpendableOutputs::default();

        for unspent in self.scan(address) {
            if spendable.accumulated >= amount {
                break;
            }
            spendable.accumulated = spendable.accumulated.saturating_add(unspent.output().value);
            spendable
                .outputs
                .entry(unspent.tx.id.clone())
                .or_default()
                .push(unspent.vout);
        }

        spendable
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        self.scan(address)
            .iter()
            .fold(0, |total, u| total.saturating_add(u.output().value))
    }

    /// Every outpoint consumed by a committed input, regardless of owner.
    pub fn spent_outpoints(&self) -> HashSet<OutPoint> {
        self.transactions()
            .filter(|tx| !tx.is_coinbase())
            .flat_map(|tx| tx.inputs.iter().filter_map(|input| input.outpoint()))
            .collect()
    }

    pub fn transaction_ids(&self) -> HashSet<&'a str> {
        self.transactions().map(|tx| tx.id.as_str()).collect()
    }

    pub fn find_output(&self, outpoint: &OutPoint) -> Option<&'a TxOutput> {
        self.transactions()
            .find(|tx| tx.id == outpoint.txid)
            .and_then(|tx| tx.outputs.get(outpoint.vout as usize))
    }

    /// Sum of every unspent output on the chain, whoever owns it.
    pub fn get_total_supply(&self) -> u64 {
        let spent = self.spent_outpoints();
        self.transactions()
            .flat_map(|tx| {
                tx.outputs
                    .iter()
                    .enumerate()
                    .map(move |(vout, output)| (OutPoint::new(tx.id.as_str(), vout as u32), output))
            })
            .filter(|(outpoint, _)| !spent.contains(outpoint))
            .fold(0, |total, (_, output)| total.saturating_add(output.value))
    }

    fn transactions(&self) -> impl Iterator<Item = &'a Transaction> {
        self.blocks.iter().flat_map(|block| block.transactions.iter())
    }
}

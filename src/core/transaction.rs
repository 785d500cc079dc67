use crate::core::utxo::SpendableOutputs;
use crate::crypto::hash::{Hash256, Hashable};
use crate::crypto::unlock::UnlockVerifier;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value minted by every coinbase transaction.
pub const SUBSIDY: u64 = 10;

/// Output index carried by the single input of a coinbase transaction.
pub const COINBASE_VOUT: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: i64,
    pub script_sig: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

impl Transaction {
    /// Builds a transaction and fixes its id from the encoded contents.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: String::new(),
            inputs,
            outputs,
        };
        tx.id = tx.hash().to_hex();
        tx
    }

    pub fn new_coinbase(recipient: &str, memo: &str) -> Self {
        let memo = if memo.is_empty() {
            format!("Reward to '{}'", recipient)
        } else {
            memo.to_string()
        };

        let input = TxInput {
            txid: String::new(),
            vout: COINBASE_VOUT,
            script_sig: memo,
        };
        let output = TxOutput {
            value: SUBSIDY,
            script_pubkey: recipient.to_string(),
        };

        Self::new(vec![input], vec![output])
    }

    /// Spends the selected outputs of `from`, paying `amount` to `to` and any
    /// excess back to `from`.
    pub fn new_transfer(
        from: &str,
        to: &str,
        amount: u64,
        spendable: &SpendableOutputs,
    ) -> Result<Self> {
        if amount == 0 {
            return Err(LedgerError::InvalidInput("transfer amount must be positive".to_string()));
        }

        if spendable.accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: spendable.accumulated,
            });
        }

        let inputs = spendable
            .outpoints()
            .map(|outpoint| TxInput {
                txid: outpoint.txid,
                vout: i64::from(outpoint.vout),
                script_sig: from.to_string(),
            })
            .collect();

        let mut outputs = vec![TxOutput {
            value: amount,
            script_pubkey: to.to_string(),
        }];
        if spendable.accumulated > amount {
            // change
            outputs.push(TxOutput {
                value: spendable.accumulated - amount,
                script_pubkey: from.to_string(),
            });
        }

        Ok(Self::new(inputs, outputs))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].txid.is_empty()
            && self.inputs[0].vout == COINBASE_VOUT
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0, |total, output| total.saturating_add(output.value))
    }

    /// Recomputes the fingerprint and compares it with the stored id.
    pub fn has_valid_id(&self) -> bool {
        self.hash().to_hex() == self.id
    }
}

impl Hashable for Transaction {
    /// Length-prefixed encoding of every input and output field. The id itself
    /// is excluded.
    fn hash(&self) -> Hash256 {
        let mut data = Vec::new();

        data.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            data.extend_from_slice(&(input.txid.len() as u32).to_le_bytes());
            data.extend_from_slice(input.txid.as_bytes());
            data.extend_from_slice(&input.vout.to_le_bytes());
            data.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
            data.extend_from_slice(input.script_sig.as_bytes());
        }

        data.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            data.extend_from_slice(&output.value.to_le_bytes());
            data.extend_from_slice(&(output.script_pubkey.len() as u32).to_le_bytes());
            data.extend_from_slice(output.script_pubkey.as_bytes());
        }

        Hash256::hash(&data)
    }
}

impl TxInput {
    /// Whether `address` initiated this input.
    pub fn can_unlock_output_with(&self, verifier: &dyn UnlockVerifier, address: &str) -> bool {
        verifier.verify(&self.script_sig, address)
    }

    /// The output this input spends, or `None` for a coinbase input.
    pub fn outpoint(&self) -> Option<OutPoint> {
        if self.txid.is_empty() {
            return None;
        }
        let vout = u32::try_from(self.vout).ok()?;
        Some(OutPoint::new(self.txid.clone(), vout))
    }
}

impl TxOutput {
    pub fn can_be_unlocked_with(&self, verifier: &dyn UnlockVerifier, address: &str) -> bool {
        verifier.verify(&self.script_pubkey, address)
    }
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

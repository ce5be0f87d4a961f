use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use std::collections::BTreeMap;

use super::clock::Clock;
use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature};
use super::wallet::SenderWallet;

/// Ledger amounts are whole units
pub type Amount = u64;

/// Input address marking a miner reward instead of a signed transfer
pub const REWARD_INPUT_ADDRESS: &str = "*authorized-reward*";

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Amount {requested} exceeds balance {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("Invalid amount from {address}: outputs total {outputs}, input declares {input}")]
    AmountMismatch {
        address: Address,
        input: Amount,
        outputs: u128,
    },

    #[error("Invalid signature from {0}")]
    InvalidSignature(Address),

    #[error("Wallet {wallet} did not author a transaction sent by {sender}")]
    SenderMismatch { wallet: Address, sender: Address },

    #[error("Sender {0} cannot be its own recipient")]
    SelfTransfer(Address),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// The signed summary of what the sender intends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionInput {
    /// When the output map was last signed
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Sender balance the outputs must add up to
    #[schema(value_type = u64)]
    pub amount: Amount,

    /// Sender address, used to verify the signature
    pub address: Address,

    /// Signature over the output map
    pub signature: DigitalSignature,
}

/// A transfer from one sender to one or more recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,

    /// Recipient allocations, including the sender's change
    #[schema(value_type = Object)]
    pub output_map: BTreeMap<Address, Amount>,

    /// Signed input
    pub input: TransactionInput,
}

impl Transaction {
    /// Creates and signs a transfer of `amount` from `sender` to `recipient`.
    ///
    /// The sender keeps `balance - amount` as change. Fails with
    /// `InsufficientBalance` when `amount` is more than the sender holds.
    pub fn create<W>(
        sender: &W,
        recipient: Address,
        amount: Amount,
        clock: &dyn Clock,
    ) -> Result<Self, TransactionError>
    where
        W: SenderWallet + ?Sized,
    {
        let balance = sender.balance();
        if amount > balance {
            return Err(TransactionError::InsufficientBalance {
                requested: amount,
                available: balance,
            });
        }

        if &recipient == sender.address() {
            return Err(TransactionError::SelfTransfer(recipient));
        }

        let mut output_map = BTreeMap::new();
        output_map.insert(recipient, amount);
        output_map.insert(sender.address().clone(), balance - amount);

        let input = Self::create_input(sender, balance, &output_map, clock)?;

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            output_map,
            input,
        })
    }

    /// Creates the payout for a miner. Reward inputs carry no signature.
    pub fn reward(miner: &Address, amount: Amount, clock: &dyn Clock) -> Self {
        let mut output_map = BTreeMap::new();
        output_map.insert(miner.clone(), amount);

        Transaction {
            id: Uuid::new_v4().to_string(),
            output_map,
            input: TransactionInput {
                timestamp: clock.now(),
                amount,
                address: Address(REWARD_INPUT_ADDRESS.to_string()),
                signature: DigitalSignature::default(),
            },
        }
    }

    /// Allocates another `amount` of the sender's remaining change to `recipient`
    /// and re-signs the input.
    ///
    /// On error the transaction is left exactly as it was.
    pub fn amend<W>(
        &mut self,
        sender: &W,
        recipient: Address,
        amount: Amount,
        clock: &dyn Clock,
    ) -> Result<(), TransactionError>
    where
        W: SenderWallet + ?Sized,
    {
        if sender.address() != &self.input.address {
            return Err(TransactionError::SenderMismatch {
                wallet: sender.address().clone(),
                sender: self.input.address.clone(),
            });
        }

        if &recipient == sender.address() {
            return Err(TransactionError::SelfTransfer(recipient));
        }

        let remaining = self.output_map.get(sender.address()).copied().unwrap_or(0);
        if amount > remaining {
            return Err(TransactionError::InsufficientBalance {
                requested: amount,
                available: remaining,
            });
        }

        let mut output_map = self.output_map.clone();
        let allocated = output_map.entry(recipient).or_insert(0);
        *allocated = allocated.saturating_add(amount);
        output_map.insert(sender.address().clone(), remaining - amount);

        // The outputs still add up to what was declared when the transaction was created
        let input = Self::create_input(sender, self.input.amount, &output_map, clock)?;

        self.output_map = output_map;
        self.input = input;

        Ok(())
    }

    /// Checks conservation of the outputs, then the input signature
    pub fn validate(&self) -> Result<(), TransactionError> {
        let outputs: u128 = self.output_map.values().map(|amount| u128::from(*amount)).sum();

        if outputs != u128::from(self.input.amount) {
            return Err(TransactionError::AmountMismatch {
                address: self.input.address.clone(),
                input: self.input.amount,
                outputs,
            });
        }

        let message = Self::signing_bytes(&self.output_map)?;
        if !verify_signature(&self.input.address, &message, &self.input.signature) {
            return Err(TransactionError::InvalidSignature(self.input.address.clone()));
        }

        Ok(())
    }

    /// Like [`Transaction::validate`], but logs the reason and answers yes or no
    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(err) => {
                error!("Transaction {} cancelled: {}", self.id, err);
                false
            }
        }
    }

    /// Checks if the transaction is a miner reward
    pub fn is_reward(&self) -> bool {
        self.input.address.0 == REWARD_INPUT_ADDRESS
    }

    /// Canonical bytes covered by the input signature.
    ///
    /// `BTreeMap` serializes in key order, so every node signs and verifies
    /// the same bytes for the same outputs.
    pub fn signing_bytes(output_map: &BTreeMap<Address, Amount>) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(output_map)?)
    }

    fn create_input<W>(
        sender: &W,
        amount: Amount,
        output_map: &BTreeMap<Address, Amount>,
        clock: &dyn Clock,
    ) -> Result<TransactionInput, TransactionError>
    where
        W: SenderWallet + ?Sized,
    {
        let message = Self::signing_bytes(output_map)?;

        Ok(TransactionInput {
            timestamp: clock.now(),
            amount,
            address: sender.address().clone(),
            signature: sender.sign(&message)?,
        })
    }
}

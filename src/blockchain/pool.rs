use dashmap::DashMap;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::block::Block;
use super::crypto::Address;
use super::transaction::Transaction;

/// Transactions waiting to be sealed into a block, keyed by id
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    transactions: Arc<DashMap<String, Transaction>>,
}

impl TransactionPool {
    /// Creates an empty pool
    pub fn new() -> Self {
        TransactionPool {
            transactions: Arc::new(DashMap::new()),
        }
    }

    /// Inserts a transaction, replacing any earlier version with the same id
    pub fn set_transaction(&self, transaction: Transaction) {
        self.transactions.insert(transaction.id.clone(), transaction);
    }

    /// Finds the pending transaction sent by `address`, if any
    pub fn existing_transaction(&self, address: &Address) -> Option<Transaction> {
        self.transactions
            .iter()
            .find(|entry| &entry.value().input.address == address)
            .map(|entry| entry.value().clone())
    }

    /// Snapshot of the pool, ordered by id
    pub fn transaction_map(&self) -> BTreeMap<String, Transaction> {
        self.transactions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Pending transactions that pass validation, oldest first.
    ///
    /// Only the oldest transaction of each sender is returned, since a block
    /// may carry at most one spend per sender.
    pub fn valid_transactions(&self) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.value().is_valid())
            .map(|entry| entry.value().clone())
            .collect();

        transactions.sort_by(|a, b| {
            a.input
                .timestamp
                .cmp(&b.input.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut senders = HashSet::new();
        transactions.retain(|transaction| senders.insert(transaction.input.address.clone()));
        transactions
    }

    /// Drops every pending transaction
    pub fn clear(&self) {
        self.transactions.clear();
    }

    /// Drops pending transactions that already appear in `chain`
    pub fn clear_blockchain_transactions(&self, chain: &[Block]) {
        let sealed: HashSet<&str> = chain
            .iter()
            .flat_map(|block| block.data.iter().map(|transaction| transaction.id.as_str()))
            .collect();

        self.transactions.retain(|id, _| !sealed.contains(id.as_str()));
    }

    /// Drops what `block` sealed, pending transactions from anyone who spent
    /// in it (their declared input no longer matches the chain) and anything
    /// that fails validation.
    ///
    /// Everything else stays pending for the next block.
    pub fn clear_block_transactions(&self, block: &Block) {
        let sealed: HashSet<&str> = block.data.iter().map(|transaction| transaction.id.as_str()).collect();
        let senders: HashSet<&Address> = block
            .data
            .iter()
            .filter(|transaction| !transaction.is_reward())
            .map(|transaction| &transaction.input.address)
            .collect();

        self.transactions.retain(|id, transaction| {
            !sealed.contains(id.as_str())
                && !senders.contains(&transaction.input.address)
                && transaction.validate().is_ok()
        });
    }

    /// Number of pending transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Checks if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

use log::{error, info};
use parking_lot::Mutex;
use thiserror::Error;

use std::collections::HashSet;
use std::sync::Arc;

use super::block::{Block, BlockError, Payload};
use super::clock::Clock;
use super::transaction::{Amount, Transaction};
use super::wallet::Wallet;
use crate::config::LedgerConfig;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Block error: {0}")]
    Block(#[from] BlockError),

    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Incoming chain of {candidate} blocks is not longer than the current {current}")]
    ChainNotLonger { candidate: usize, current: usize },

    #[error("Invalid transaction data: {0}")]
    InvalidTransactionData(String),
}

/// Represents the blockchain
#[derive(Debug, Clone)]
pub struct Blockchain<P: Payload = Vec<Transaction>> {
    /// The chain of blocks, genesis first
    chain: Arc<Mutex<Vec<Block<P>>>>,

    /// Timestamps for locally added blocks
    clock: Arc<dyn Clock>,
}

impl<P: Payload> Blockchain<P> {
    /// Creates a new blockchain holding only the genesis block
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self, BlockchainError> {
        Ok(Blockchain {
            chain: Arc::new(Mutex::new(vec![Block::genesis()?])),
            clock,
        })
    }

    /// Gets a copy of the entire chain
    pub fn get_chain(&self) -> Vec<Block<P>> {
        self.chain.lock().clone()
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.lock().len()
    }

    /// Gets the last block in the chain
    pub fn get_last_block(&self) -> Option<Block<P>> {
        self.chain.lock().last().cloned()
    }

    /// Appends a block carrying `data` on top of the latest block.
    ///
    /// Local history is trusted, so nothing beyond hashing is checked.
    pub fn add_block(&self, data: P) -> Result<Block<P>, BlockchainError> {
        let mut chain = self.chain.lock();
        let last_block = chain
            .last()
            .ok_or_else(|| BlockchainError::InvalidChain("chain has no genesis block".to_string()))?;

        let block = Block::new(last_block, data, self.clock.as_ref())?;
        chain.push(block.clone());

        info!("Added block {} at height {}", block.hash, chain.len() - 1);
        Ok(block)
    }

    /// Checks genesis pinning, link integrity and content integrity of `chain`.
    ///
    /// The first failing block rejects the whole chain.
    pub fn validate_chain(chain: &[Block<P>]) -> Result<(), BlockchainError> {
        let first = chain
            .first()
            .ok_or_else(|| BlockchainError::InvalidChain("chain is empty".to_string()))?;

        if *first != Block::genesis()? {
            return Err(BlockchainError::InvalidChain(
                "chain does not start with the genesis block".to_string(),
            ));
        }

        for (index, pair) in chain.windows(2).enumerate() {
            let (previous_block, block) = (&pair[0], &pair[1]);
            let height = index + 1;

            if block.previous_hash != previous_block.calculate_hash()? {
                return Err(BlockchainError::InvalidChain(format!(
                    "block {} does not link to its predecessor",
                    height
                )));
            }

            if block.hash != block.calculate_hash()? {
                return Err(BlockchainError::InvalidChain(format!(
                    "block {} hash does not match its contents",
                    height
                )));
            }
        }

        Ok(())
    }

    /// Validates `chain`, logging the reason when it is rejected
    pub fn is_valid_chain(chain: &[Block<P>]) -> bool {
        match Self::validate_chain(chain) {
            Ok(()) => true,
            Err(err) => {
                error!("{}", err);
                false
            }
        }
    }

    /// Checks the local chain
    pub fn is_valid(&self) -> bool {
        Self::is_valid_chain(&self.chain.lock())
    }

    /// Longest-valid-chain rule: adopts `candidate` only if it is strictly longer
    /// than the local chain and valid. Otherwise the local chain is untouched.
    pub fn replace_chain(&self, candidate: Vec<Block<P>>) -> Result<(), BlockchainError> {
        self.replace_chain_with(candidate, |_| Ok(()))
    }

    fn replace_chain_with<F>(&self, candidate: Vec<Block<P>>, extra_checks: F) -> Result<(), BlockchainError>
    where
        F: FnOnce(&[Block<P>]) -> Result<(), BlockchainError>,
    {
        // Held until the swap so no local append can interleave
        let mut chain = self.chain.lock();

        let result = if candidate.len() <= chain.len() {
            Err(BlockchainError::ChainNotLonger {
                candidate: candidate.len(),
                current: chain.len(),
            })
        } else {
            Self::validate_chain(&candidate).and_then(|_| extra_checks(&candidate))
        };

        if let Err(err) = result {
            error!("Rejected incoming chain: {}", err);
            return Err(err);
        }

        info!(
            "Replacing chain of {} blocks with {} blocks",
            chain.len(),
            candidate.len()
        );
        *chain = candidate;

        Ok(())
    }
}

impl Blockchain<Vec<Transaction>> {
    /// Checks the transactions inside `chain` against the ledger rules.
    ///
    /// Each block may hold a single reward paying exactly `mining_reward`. Every
    /// other transaction must be valid and must declare the sender's balance as
    /// of the blocks before it. Within a block no transaction repeats and no
    /// sender spends twice.
    pub fn valid_transaction_data(chain: &[Block], config: &LedgerConfig) -> Result<(), BlockchainError> {
        for (height, block) in chain.iter().enumerate().skip(1) {
            let mut seen = HashSet::new();
            let mut senders = HashSet::new();
            let mut reward_count = 0;

            for transaction in &block.data {
                if !seen.insert(transaction.id.as_str()) {
                    return Err(BlockchainError::InvalidTransactionData(format!(
                        "block {} repeats transaction {}",
                        height, transaction.id
                    )));
                }

                if transaction.is_reward() {
                    reward_count += 1;
                    if reward_count > 1 {
                        return Err(BlockchainError::InvalidTransactionData(format!(
                            "block {} has more than one miner reward",
                            height
                        )));
                    }

                    let paid: u128 = transaction.output_map.values().map(|a| u128::from(*a)).sum();
                    if transaction.output_map.len() != 1 || paid != u128::from(config.mining_reward) {
                        return Err(BlockchainError::InvalidTransactionData(format!(
                            "block {} pays a miner reward of {} instead of {}",
                            height, paid, config.mining_reward
                        )));
                    }
                    continue;
                }

                if !senders.insert(&transaction.input.address) {
                    return Err(BlockchainError::InvalidTransactionData(format!(
                        "block {}: {} spends more than once",
                        height, transaction.input.address
                    )));
                }

                transaction.validate().map_err(|err| {
                    BlockchainError::InvalidTransactionData(format!("block {}: {}", height, err))
                })?;

                let true_balance: Amount = Wallet::calculate_balance(
                    &chain[..height],
                    &transaction.input.address,
                    config.starting_balance,
                );
                if transaction.input.amount != true_balance {
                    return Err(BlockchainError::InvalidTransactionData(format!(
                        "block {}: transaction {} declares input {} but {} holds {}",
                        height,
                        transaction.id,
                        transaction.input.amount,
                        transaction.input.address,
                        true_balance
                    )));
                }
            }
        }

        Ok(())
    }

    /// [`Blockchain::replace_chain`] that also requires valid transaction data
    pub fn replace_chain_validated(
        &self,
        candidate: Vec<Block>,
        config: &LedgerConfig,
    ) -> Result<(), BlockchainError> {
        self.replace_chain_with(candidate, |chain| Self::valid_transaction_data(chain, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::clock::SystemClock;
    use crate::blockchain::crypto::Address;
    use crate::blockchain::wallet::BalanceSource;

    type LedgerChain = Blockchain;

    /// Keeps every log record so tests can check what was reported
    struct RecordingLogger;

    static RECORDS: parking_lot::Mutex<Vec<(log::Level, String)>> = parking_lot::const_mutex(Vec::new());
    static LOGGER: RecordingLogger = RecordingLogger;

    impl log::Log for RecordingLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            RECORDS.lock().push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    fn record_logs() {
        // Another test may have installed it already
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Info);
    }

    fn logged(level: log::Level, message: &str) -> bool {
        RECORDS.lock().iter().any(|(l, m)| *l == level && m == message)
    }

    fn string_chain() -> Blockchain<String> {
        Blockchain::new(Arc::new(SystemClock)).unwrap()
    }

    fn ledger_chain() -> LedgerChain {
        Blockchain::new(Arc::new(SystemClock)).unwrap()
    }

    #[test]
    fn test_new_blockchain() {
        let blockchain = string_chain();
        let chain = blockchain.get_chain();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0], Block::genesis().unwrap());
    }

    #[test]
    fn test_add_block() {
        let blockchain = string_chain();
        let block = blockchain.add_block("foo-bar".to_string()).unwrap();

        let chain = blockchain.get_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].data, "foo-bar");
        assert_eq!(chain[1], block);
        assert_eq!(block.previous_hash, chain[0].hash);
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_empty_chain_is_invalid() {
        assert!(!Blockchain::<String>::is_valid_chain(&[]));
    }

    #[test]
    fn test_fake_genesis_is_invalid() {
        let blockchain = string_chain();
        blockchain.add_block("real".to_string()).unwrap();
        let mut chain = blockchain.get_chain();

        chain[0].data = "fake-data".to_string();

        assert!(matches!(
            Blockchain::validate_chain(&chain),
            Err(BlockchainError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_rehashed_fake_genesis_is_still_invalid() {
        let mut chain = string_chain().get_chain();
        chain[0].data = "fake-data".to_string();
        chain[0].hash = chain[0].calculate_hash().unwrap();

        assert!(!Blockchain::is_valid_chain(&chain));
    }

    #[test]
    fn test_valid_chain() {
        let blockchain = string_chain();
        blockchain.add_block("real".to_string()).unwrap();
        blockchain.add_block("more".to_string()).unwrap();

        assert!(Blockchain::is_valid_chain(&blockchain.get_chain()));
    }

    #[test]
    fn test_tampered_previous_hash_is_invalid() {
        let blockchain = string_chain();
        blockchain.add_block("one".to_string()).unwrap();
        blockchain.add_block("two".to_string()).unwrap();

        let original = blockchain.get_chain();
        let mut tampered = original.clone();
        tampered[1].previous_hash = "tampered".to_string();

        assert!(!Blockchain::is_valid_chain(&tampered));
        // The copy it came from is unaffected
        assert!(Blockchain::is_valid_chain(&original));
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_rehashed_link_tamper_is_invalid() {
        let blockchain = string_chain();
        blockchain.add_block("one".to_string()).unwrap();
        let mut chain = blockchain.get_chain();

        chain[1].previous_hash = "tampered".to_string();
        chain[1].hash = chain[1].calculate_hash().unwrap();

        assert!(matches!(
            Blockchain::validate_chain(&chain),
            Err(BlockchainError::InvalidChain(reason)) if reason.contains("link")
        ));
    }

    #[test]
    fn test_tampered_data_is_invalid() {
        let blockchain = string_chain();
        blockchain.add_block("real".to_string()).unwrap();
        let mut chain = blockchain.get_chain();

        chain[1].data = "bad-data".to_string();

        assert!(matches!(
            Blockchain::validate_chain(&chain),
            Err(BlockchainError::InvalidChain(reason)) if reason.contains("contents")
        ));
    }

    #[test]
    fn test_replace_with_shorter_or_equal_chain_is_rejected() {
        let blockchain = string_chain();
        blockchain.add_block("local".to_string()).unwrap();
        let before = blockchain.get_chain();

        let other = string_chain();
        other.add_block("remote".to_string()).unwrap();

        let result = blockchain.replace_chain(other.get_chain());

        assert!(matches!(
            result,
            Err(BlockchainError::ChainNotLonger { candidate: 2, current: 2 })
        ));
        assert_eq!(blockchain.get_chain(), before);

        let shorter = string_chain().get_chain();
        assert!(blockchain.replace_chain(shorter).is_err());
        assert_eq!(blockchain.get_chain(), before);
    }

    #[test]
    fn test_replace_with_longer_invalid_chain_is_rejected() {
        let blockchain = string_chain();
        let before = blockchain.get_chain();

        let other = string_chain();
        other.add_block("real".to_string()).unwrap();
        other.add_block("real".to_string()).unwrap();
        let mut candidate = other.get_chain();
        candidate[2].hash = "fake-hash".to_string();

        let result = blockchain.replace_chain(candidate);

        assert!(matches!(result, Err(BlockchainError::InvalidChain(_))));
        assert_eq!(blockchain.get_chain(), before);
    }

    #[test]
    fn test_replace_with_longer_valid_chain() {
        let blockchain = string_chain();

        let other = string_chain();
        other.add_block("real".to_string()).unwrap();
        let candidate = other.get_chain();

        blockchain.replace_chain(candidate.clone()).unwrap();

        assert_eq!(blockchain.get_chain(), candidate);

        // Local appends continue from the adopted tip
        let next = blockchain.add_block("next".to_string()).unwrap();
        assert_eq!(next.previous_hash, candidate[1].hash);
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_replace_chain_reports_outcome() {
        record_logs();
        let blockchain = string_chain();

        let other = string_chain();
        for data in ["one", "two", "three", "four", "five", "six"] {
            other.add_block(data.to_string()).unwrap();
        }
        let candidate = other.get_chain();

        blockchain.replace_chain(candidate.clone()).unwrap();
        assert!(logged(log::Level::Info, "Replacing chain of 1 blocks with 7 blocks"));

        assert!(blockchain.replace_chain(candidate[..6].to_vec()).is_err());
        assert!(logged(
            log::Level::Error,
            "Rejected incoming chain: Incoming chain of 6 blocks is not longer than the current 7"
        ));
    }

    #[test]
    fn test_valid_transaction_data() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();
        let mut wallet = Wallet::new(config.starting_balance);
        let miner = Address::from("miner");

        let transaction = wallet
            .create_transaction(Address::from("R1"), 40, Some(&blockchain.get_chain()), &SystemClock)
            .unwrap();
        let reward = Transaction::reward(&miner, config.mining_reward, &SystemClock);
        blockchain.add_block(vec![transaction, reward]).unwrap();

        let transaction = wallet
            .create_transaction(Address::from("R2"), 10, Some(&blockchain.get_chain()), &SystemClock)
            .unwrap();
        assert_eq!(transaction.input.amount, config.starting_balance - 40);
        blockchain.add_block(vec![transaction]).unwrap();

        assert!(LedgerChain::valid_transaction_data(&blockchain.get_chain(), &config).is_ok());
    }

    #[test]
    fn test_duplicate_reward_is_rejected() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();
        let miner = Address::from("miner");

        blockchain
            .add_block(vec![
                Transaction::reward(&miner, config.mining_reward, &SystemClock),
                Transaction::reward(&miner, config.mining_reward, &SystemClock),
            ])
            .unwrap();

        assert!(matches!(
            LedgerChain::valid_transaction_data(&blockchain.get_chain(), &config),
            Err(BlockchainError::InvalidTransactionData(reason)) if reason.contains("more than one")
        ));
    }

    #[test]
    fn test_inflated_reward_is_rejected() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();

        blockchain
            .add_block(vec![Transaction::reward(&Address::from("miner"), config.mining_reward + 1, &SystemClock)])
            .unwrap();

        assert!(LedgerChain::valid_transaction_data(&blockchain.get_chain(), &config).is_err());
    }

    #[test]
    fn test_malformed_transaction_is_rejected() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();
        let wallet = Wallet::new(config.starting_balance);

        let mut transaction =
            Transaction::create(&wallet, Address::from("R1"), 10, &SystemClock).unwrap();
        transaction.output_map.insert(wallet.address().clone(), 999_999);
        blockchain.add_block(vec![transaction]).unwrap();

        assert!(LedgerChain::valid_transaction_data(&blockchain.get_chain(), &config).is_err());
    }

    #[test]
    fn test_fake_input_balance_is_rejected() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();
        // Properly signed, but claims more than the chain says the wallet has
        let rich = Wallet::new(config.starting_balance * 10);

        let transaction = Transaction::create(&rich, Address::from("R1"), 10, &SystemClock).unwrap();
        assert!(transaction.is_valid());
        blockchain.add_block(vec![transaction]).unwrap();

        assert!(matches!(
            LedgerChain::valid_transaction_data(&blockchain.get_chain(), &config),
            Err(BlockchainError::InvalidTransactionData(reason)) if reason.contains("declares input")
        ));
    }

    #[test]
    fn test_repeated_transaction_is_rejected() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();
        let wallet = Wallet::new(config.starting_balance);

        let transaction = Transaction::create(&wallet, Address::from("R1"), 10, &SystemClock).unwrap();
        blockchain.add_block(vec![transaction.clone(), transaction]).unwrap();

        assert!(matches!(
            LedgerChain::valid_transaction_data(&blockchain.get_chain(), &config),
            Err(BlockchainError::InvalidTransactionData(reason)) if reason.contains("repeats")
        ));
    }

    #[test]
    fn test_second_spend_by_same_sender_is_rejected() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();
        let wallet = Wallet::new(config.starting_balance);

        // Each declares the full balance and is valid on its own
        let first = Transaction::create(&wallet, Address::from("R1"), config.starting_balance, &SystemClock).unwrap();
        let second = Transaction::create(&wallet, Address::from("R2"), config.starting_balance, &SystemClock).unwrap();
        blockchain.add_block(vec![first, second]).unwrap();

        assert!(matches!(
            LedgerChain::valid_transaction_data(&blockchain.get_chain(), &config),
            Err(BlockchainError::InvalidTransactionData(reason)) if reason.contains("spends more than once")
        ));
    }

    #[test]
    fn test_replace_chain_validated_rejects_bad_transactions() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();
        let before = blockchain.get_chain();

        let other = ledger_chain();
        other
            .add_block(vec![Transaction::reward(&Address::from("miner"), config.mining_reward * 2, &SystemClock)])
            .unwrap();

        // Structurally the chain is fine; only the transaction rules catch it
        assert!(Blockchain::is_valid_chain(&other.get_chain()));
        let result = blockchain.replace_chain_validated(other.get_chain(), &config);

        assert!(matches!(result, Err(BlockchainError::InvalidTransactionData(_))));
        assert_eq!(blockchain.get_chain(), before);
    }

    #[test]
    fn test_replace_chain_validated_accepts_good_chain() {
        let config = LedgerConfig::default();
        let blockchain = ledger_chain();

        let other = ledger_chain();
        other
            .add_block(vec![Transaction::reward(&Address::from("miner"), config.mining_reward, &SystemClock)])
            .unwrap();

        blockchain.replace_chain_validated(other.get_chain(), &config).unwrap();
        assert_eq!(blockchain.get_chain(), other.get_chain());
    }
}

// Blockchain module
//
// This module contains the ledger implementation including:
// - Block structure and hashing
// - Blockchain validation and chain replacement
// - Transactions and their signed inputs
// - Wallets and the signing capability
// - The pending transaction pool and the miner that drains it

pub mod block;
pub mod chain;
pub mod clock;
pub mod crypto;
pub mod miner;
pub mod pool;
pub mod transaction;
pub mod wallet;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, BlockchainError};
pub use clock::{Clock, SystemClock};
pub use crypto::Address;
pub use miner::TransactionMiner;
pub use pool::TransactionPool;
pub use transaction::{Amount, Transaction};
pub use wallet::{BalanceSource, Wallet};

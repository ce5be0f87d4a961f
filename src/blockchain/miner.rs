use log::info;

use std::sync::Arc;

use super::block::Block;
use super::chain::{Blockchain, BlockchainError};
use super::clock::Clock;
use super::crypto::Address;
use super::pool::TransactionPool;
use super::transaction::Transaction;
use crate::config::LedgerConfig;

/// Seals pending transactions into blocks and pays the miner
#[derive(Debug, Clone)]
pub struct TransactionMiner {
    blockchain: Blockchain,
    pool: TransactionPool,
    miner_address: Address,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
}

impl TransactionMiner {
    pub fn new(
        blockchain: Blockchain,
        pool: TransactionPool,
        miner_address: Address,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        TransactionMiner {
            blockchain,
            pool,
            miner_address,
            config,
            clock,
        }
    }

    /// Appends a block holding the valid pending transactions plus the miner
    /// reward, then drops what the block sealed from the pool.
    ///
    /// Transactions pooled while the block is being built stay pending.
    pub fn mine_transactions(&self) -> Result<Block, BlockchainError> {
        let mut transactions = self.pool.valid_transactions();
        let pending = transactions.len();

        transactions.push(Transaction::reward(
            &self.miner_address,
            self.config.mining_reward,
            self.clock.as_ref(),
        ));

        let block = self.blockchain.add_block(transactions)?;
        self.pool.clear_block_transactions(&block);

        info!(
            "Mined block {} with {} transactions for {}",
            block.hash, pending, self.miner_address
        );
        Ok(block)
    }
}

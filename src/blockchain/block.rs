use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt::Debug;

use super::clock::Clock;
use super::transaction::Transaction;

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "-----";

/// Errors that can occur while building or hashing a block
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Failed to serialize block fields: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Anything a block can carry
pub trait Payload: Serialize + DeserializeOwned + Clone + PartialEq + Default + Debug + Send + Sync {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + PartialEq + Default + Debug + Send + Sync {}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block<P = Vec<Transaction>> {
    /// Timestamp when the block was created
    pub timestamp: DateTime<Utc>,

    /// Payload, a list of transactions unless the chain says otherwise
    pub data: P,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of the fields above
    pub hash: String,
}

/// The hashed fields, in the order they are serialized
#[derive(Serialize)]
struct HashFields<'a, P> {
    timestamp: &'a DateTime<Utc>,
    data: &'a P,
    previous_hash: &'a str,
}

impl<P: Payload> Block<P> {
    /// The block every chain starts from.
    ///
    /// All of its fields are fixed, so every node derives the same hash.
    pub fn genesis() -> Result<Self, BlockError> {
        let timestamp = DateTime::<Utc>::UNIX_EPOCH;
        let data = P::default();
        let previous_hash = GENESIS_PREVIOUS_HASH.to_string();
        let hash = Self::hash_fields(&timestamp, &data, &previous_hash)?;

        Ok(Block {
            timestamp,
            data,
            previous_hash,
            hash,
        })
    }

    /// Creates a block on top of `previous_block`
    pub fn new(previous_block: &Block<P>, data: P, clock: &dyn Clock) -> Result<Self, BlockError> {
        let timestamp = clock.now();
        let previous_hash = previous_block.hash.clone();
        let hash = Self::hash_fields(&timestamp, &data, &previous_hash)?;

        Ok(Block {
            timestamp,
            data,
            previous_hash,
            hash,
        })
    }

    /// Recomputes the hash from the block's own fields
    pub fn calculate_hash(&self) -> Result<String, BlockError> {
        Self::hash_fields(&self.timestamp, &self.data, &self.previous_hash)
    }

    /// SHA-256 over the JSON encoding of `(timestamp, data, previous_hash)`, as hex
    pub fn hash_fields(
        timestamp: &DateTime<Utc>,
        data: &P,
        previous_hash: &str,
    ) -> Result<String, BlockError> {
        let fields = HashFields {
            timestamp,
            data,
            previous_hash,
        };
        let block_bytes = serde_json::to_vec(&fields)?;

        let mut hasher = Sha256::new();
        hasher.update(&block_bytes);

        Ok(hex::encode(hasher.finalize()))
    }
}

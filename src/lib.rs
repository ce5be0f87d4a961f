//! An append-only ledger node: hash-linked blocks, signed transactions that
//! their sender can amend until they are mined, and a longest-valid-chain rule
//! for adopting chains offered by peers.

pub mod api;
pub mod blockchain;
pub mod config;

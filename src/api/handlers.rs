use actix_web::{web, HttpResponse, Responder};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::blockchain::{
    Address, Amount, BalanceSource, Block, Blockchain, BlockchainError, Clock, Transaction,
    TransactionMiner, TransactionPool, Wallet,
};
use crate::config::LedgerConfig;

/// Everything a node serves requests from
#[derive(Debug)]
pub struct NodeState {
    pub blockchain: Blockchain,
    pub pool: TransactionPool,
    /// The node's wallet. Its lock also orders pool writes against mining and chain replacement
    pub wallet: Mutex<Wallet>,
    pub miner: TransactionMiner,
    pub config: LedgerConfig,
    pub clock: Arc<dyn Clock>,
}

impl NodeState {
    /// Builds a node with a fresh chain and a fresh wallet that also receives mining rewards
    pub fn new(config: LedgerConfig, clock: Arc<dyn Clock>) -> Result<Self, BlockchainError> {
        let blockchain = Blockchain::new(clock.clone())?;
        let pool = TransactionPool::new();
        let wallet = Wallet::new(config.starting_balance);
        let miner = TransactionMiner::new(
            blockchain.clone(),
            pool.clone(),
            wallet.address().clone(),
            config,
            clock.clone(),
        );

        Ok(NodeState {
            blockchain,
            pool,
            wallet: Mutex::new(wallet),
            miner,
            config,
            clock,
        })
    }
}

/// Data structure for the node state
pub type NodeData = web::Data<NodeState>;

/// Response for the blocks endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    #[schema(value_type = Object)]
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transact endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactRequest {
    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    #[schema(value_type = u64)]
    pub amount: Amount,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    #[schema(value_type = Object)]
    pub block: Block,
}

/// Response for the wallet endpoints
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The balance according to the local chain
    #[schema(value_type = u64)]
    pub balance: Amount,
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/blocks",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_blocks(node: NodeData) -> impl Responder {
    let chain = node.blockchain.get_chain();
    let is_valid = Blockchain::<Vec<Transaction>>::is_valid_chain(&chain);

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Check if the blockchain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.blockchain.is_valid())
}

/// Offer a chain received from a peer
///
/// The chain is adopted only if it is longer than ours and valid, including its transactions
#[utoipa::path(
    post,
    path = "/api/v1/chain/replace",
    responses(
        (status = 200, description = "Chain replaced"),
        (status = 409, description = "Chain is not longer than the local chain"),
        (status = 400, description = "Chain is invalid")
    )
)]
pub async fn replace_chain(node: NodeData, candidate: web::Json<Vec<Block>>) -> impl Responder {
    let candidate = candidate.into_inner();
    let _wallet = node.wallet.lock();

    match node.blockchain.replace_chain_validated(candidate, &node.config) {
        Ok(()) => {
            let chain = node.blockchain.get_chain();
            node.pool.clear_blockchain_transactions(&chain);

            HttpResponse::Ok().json(serde_json::json!({
                "message": "Chain replaced",
                "length": chain.len()
            }))
        }
        Err(err @ BlockchainError::ChainNotLonger { .. }) => {
            HttpResponse::Conflict().json(serde_json::json!({
                "error": err.to_string()
            }))
        }
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": err.to_string()
        })),
    }
}

/// Send funds from the node's wallet
///
/// Amends the wallet's pending transaction if there is one, otherwise creates a new one
#[utoipa::path(
    post,
    path = "/api/v1/transact",
    request_body = TransactRequest,
    responses(
        (status = 201, description = "Transaction pooled", body = Transaction),
        (status = 400, description = "Invalid recipient address or transaction")
    )
)]
pub async fn transact(node: NodeData, request: web::Json<TransactRequest>) -> impl Responder {
    let TransactRequest { recipient, amount } = request.into_inner();
    let recipient: Address = match recipient.parse() {
        Ok(address) => address,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid recipient address: {}", err)
            }))
        }
    };
    let chain = node.blockchain.get_chain();
    let mut wallet = node.wallet.lock();

    let result = match node.pool.existing_transaction(wallet.address()) {
        Some(mut transaction) => transaction
            .amend(&*wallet, recipient, amount, node.clock.as_ref())
            .map(|_| transaction),
        None => wallet.create_transaction(recipient, amount, Some(&chain), node.clock.as_ref()),
    };

    match result {
        Ok(transaction) => {
            node.pool.set_transaction(transaction.clone());
            HttpResponse::Created().json(transaction)
        }
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": err.to_string()
        })),
    }
}

/// Get the transaction pool
///
/// Returns all transactions waiting to be included in a block, keyed by id
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pool",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully")
    )
)]
pub async fn get_transaction_pool(node: NodeData) -> impl Responder {
    let transactions: BTreeMap<String, Transaction> = node.pool.transaction_map();
    HttpResponse::Ok().json(transactions)
}

/// Mine the pending transactions
///
/// Seals every valid pending transaction and the node's reward into a new block
#[utoipa::path(
    post,
    path = "/api/v1/mine-transactions",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_transactions(node: NodeData) -> impl Responder {
    // No amendment may land between the pool snapshot and the clear
    let _wallet = node.wallet.lock();

    match node.miner.mine_transactions() {
        Ok(block) => HttpResponse::Ok().json(MineResponse {
            message: "New Block Mined".to_string(),
            block,
        }),
        Err(err) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to mine block: {}", err)
        })),
    }
}

/// Get the node wallet
#[utoipa::path(
    get,
    path = "/api/v1/wallet-info",
    responses(
        (status = 200, description = "Wallet retrieved successfully", body = WalletResponse)
    )
)]
pub async fn wallet_info(node: NodeData) -> impl Responder {
    let address = node.wallet.lock().address().clone();
    let balance = Wallet::calculate_balance(
        &node.blockchain.get_chain(),
        &address,
        node.config.starting_balance,
    );

    HttpResponse::Ok().json(WalletResponse {
        address: address.0,
        balance,
    })
}

/// Get wallet balance
///
/// Returns the balance of any address according to the local chain
#[utoipa::path(
    get,
    path = "/api/v1/wallet/balance/{address}",
    responses(
        (status = 200, description = "Wallet balance retrieved successfully", body = WalletResponse),
        (status = 400, description = "Invalid address")
    )
)]
pub async fn get_wallet_balance(node: NodeData, address: web::Path<String>) -> impl Responder {
    let address: Address = match address.parse() {
        Ok(address) => address,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid address: {}", err)
            }))
        }
    };
    let balance = Wallet::calculate_balance(
        &node.blockchain.get_chain(),
        &address,
        node.config.starting_balance,
    );

    HttpResponse::Ok().json(WalletResponse {
        address: address.0,
        balance,
    })
}

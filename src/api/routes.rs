use actix_web::web;

use super::handlers;

/// Upper bound on a JSON request body, in bytes
const MAX_JSON_PAYLOAD: usize = 16 * 1024 * 1024;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Peer chains arrive whole
            .app_data(web::JsonConfig::default().limit(MAX_JSON_PAYLOAD))
            .route("/blocks", web::get().to(handlers::get_blocks))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/chain/replace", web::post().to(handlers::replace_chain))
            .route("/transact", web::post().to(handlers::transact))
            .route("/transactions/pool", web::get().to(handlers::get_transaction_pool))
            .route("/mine-transactions", web::post().to(handlers::mine_transactions))
            .route("/wallet-info", web::get().to(handlers::wallet_info))
            .route("/wallet/balance/{address}", web::get().to(handlers::get_wallet_balance))
    );
}

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;

use cryptoledger::blockchain::{BalanceSource, SystemClock};
use cryptoledger::{api, blockchain, config};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_blocks,
        api::handlers::validate_chain,
        api::handlers::replace_chain,
        api::handlers::transact,
        api::handlers::get_transaction_pool,
        api::handlers::mine_transactions,
        api::handlers::wallet_info,
        api::handlers::get_wallet_balance
    ),
    components(
        schemas(
            blockchain::Transaction,
            blockchain::transaction::TransactionInput,
            blockchain::crypto::Address,
            blockchain::crypto::DigitalSignature,
            api::handlers::ChainResponse,
            api::handlers::TransactRequest,
            api::handlers::MineResponse,
            api::handlers::WalletResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger node API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "1.0.0",
        description = "Hash-linked ledger with signed, amendable transactions",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::Config::from_env().context("Failed to load configuration")?;

    let node = api::NodeState::new(config.ledger, Arc::new(SystemClock))
        .context("Failed to create the genesis block")?;
    info!("Node wallet address: {}", node.wallet.lock().address());
    let node = web::Data::new(node);

    info!("Starting HTTP server at http://{}:{}", config.http.host, config.http.port);

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(node.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.http.host.as_str(), config.http.port))?
    .run()
    .await?;

    Ok(())
}

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pawnledger::config::Config;
use pawnledger::middleware::{json_error_handler, ErrorHandler, RequestId};
use pawnledger::modules::collateral::{CollateralSignal, MySqlCollateralSignal};
use pawnledger::modules::customers::{CustomerStatsRelay, MySqlCustomerRepository};
use pawnledger::modules::health;
use pawnledger::modules::settlement::{
    self, LedgerStore, MySqlLedgerStore, ReversalService, SettlementService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = Config::from_env().map_err(std::io::Error::other)?;
    config.validate().map_err(std::io::Error::other)?;

    init_tracing(&config);

    tracing::info!("Starting pawnledger settlement service");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    // Create database connection pool
    let db_pool = config
        .database
        .create_pool()
        .await
        .map_err(std::io::Error::other)?;

    tracing::info!(
        "Database pool initialized ({} connections)",
        config.database.pool_size
    );

    if config.database.run_migrations {
        config
            .database
            .migrate(&db_pool)
            .await
            .map_err(std::io::Error::other)?;
        tracing::info!("Database migrations applied");
    }

    let store: Arc<dyn LedgerStore> = Arc::new(MySqlLedgerStore::new(db_pool.clone()));
    let collateral: Arc<dyn CollateralSignal> = Arc::new(MySqlCollateralSignal::new(db_pool.clone()));
    let retry = config.settlement.retry_policy();

    let settlement_service = Arc::new(SettlementService::new(
        store.clone(),
        collateral.clone(),
        retry,
    ));
    let reversal_service = Arc::new(ReversalService::new(store.clone(), collateral, retry));

    // Customer totals catch up with settlements out of band
    let customers = Arc::new(MySqlCustomerRepository::new(db_pool.clone()));
    let relay = Arc::new(CustomerStatsRelay::new(
        customers,
        config.settlement.customer_stats_poll_interval(),
        config.settlement.customer_stats_batch_size,
        config.settlement.customer_stats_max_attempts,
    ));
    tokio::spawn(relay.start());

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(ErrorHandler)
            .wrap(RequestId)
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(settlement_service.clone()))
            .app_data(web::Data::new(reversal_service.clone()))
            .configure(health::controllers::configure)
            .configure(settlement::controllers::configure)
    })
    .workers(config.server.workers)
    .bind(&bind_address)?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("pawnledger={},actix_web=info", config.app.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.app.json_logs() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

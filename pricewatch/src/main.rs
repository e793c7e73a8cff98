use std::sync::Arc;

use anyhow::Context;
use common::logger::init_logger;
use pricewatch::{
    catalog::{LogMetadataHook, SqlxCatalogRepository},
    config::AppConfig,
    db::Db,
    fetch::HttpFetchGateway,
    history::SqlxHistoryStore,
    metrics::counters::Counters,
    notify::HttpPushProvider,
    reconcile::{EngineDeps, ReconciliationEngine},
    scheduler::Scheduler,
    snapshot::{SnapshotCache, SqlxKeyValueCache},
};

/// Connects to the database, runs migrations and wires every adapter into the engine.
async fn build_engine(cfg: &AppConfig) -> anyhow::Result<Arc<ReconciliationEngine>> {
    let db = Db::connect(&cfg.database_url)
        .await
        .context("database connection failed")?;
    db.migrate().await.context("schema migration failed")?;

    let gateway = HttpFetchGateway::new(&cfg.fetch_endpoint, cfg.engine.fetch_timeout)
        .context("invalid price fetch gateway config")?;
    let push = HttpPushProvider::new(&cfg.push_endpoint).context("invalid push provider config")?;

    let deps = EngineDeps {
        catalog: Arc::new(SqlxCatalogRepository::new(db.pool.clone())),
        gateway: Arc::new(gateway),
        cache: SnapshotCache::new(Arc::new(SqlxKeyValueCache::new(db.pool.clone()))),
        history: Arc::new(SqlxHistoryStore::new(db.pool.clone())),
        push: Arc::new(push),
        metadata_hook: Arc::new(LogMetadataHook),
    };

    Ok(Arc::new(ReconciliationEngine::new(
        deps,
        cfg.engine.clone(),
        Counters::default(),
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let cfg = AppConfig::from_env()?;
    init_logger("pricewatch", cfg.json_logs);

    tracing::info!("Starting pricewatch...");

    let engine = build_engine(&cfg).await?;
    let scheduler = Scheduler::new(engine.clone(), cfg.cycle_interval);

    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = ?e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    let counters = engine.counters();
    tracing::info!(
        cycles = Counters::get(&counters.cycles_completed),
        failed = Counters::get(&counters.cycles_failed),
        alerts = Counters::get(&counters.notifications_sent),
        "Shutdown signal received"
    );

    Ok(())
}

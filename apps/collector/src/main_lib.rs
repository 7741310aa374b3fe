use std::sync::Arc;

use marketfeed_market_data::{
    setup_registry, BackfillEngine, CollectorConfig, FileStore, Scheduler, Sink, Source,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `log` records from the library are
/// forwarded into it.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Wire the registry, file store and engine into a scheduler.
pub async fn build_scheduler(config: &CollectorConfig) -> anyhow::Result<Scheduler> {
    let store = Arc::new(FileStore::open(&config.data_dir)?);
    tracing::info!("Data directory in use: {}", store.root().display());

    let registry = setup_registry(config.enabled_providers()).await;
    if registry.is_empty() {
        tracing::warn!("No provider could be set up; cycles will only report errors");
    }

    let engine = BackfillEngine::new(config.pace(), config.failure_policy);
    let sink: Arc<dyn Sink> = store.clone();
    let source: Arc<dyn Source> = store;

    Ok(Scheduler::new(
        Arc::new(registry),
        sink,
        Some(source),
        config.targets.clone(),
        engine,
    )
    .with_consolidation_time(config.consolidation_time))
}

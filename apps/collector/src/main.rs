mod config;
mod main_lib;

use config::{Config, RunMode};
use main_lib::{build_scheduler, init_tracing};
use marketfeed_market_data::stop_channel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_format);
    let collector = config.collector_config()?;
    let mut scheduler = build_scheduler(&collector).await?;

    let (handle, stop) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping collector");
            handle.stop();
        }
    });

    match config.mode {
        RunMode::Once => {
            let summary = scheduler.run_once(&stop).await;
            tracing::info!("Cycle summary: {}", serde_json::to_string(&summary)?);
        }
        RunMode::Scheduled => {
            let cycles = scheduler
                .run_scheduled(collector.interval_minutes, &stop)
                .await?;
            tracing::info!("Collector exiting after {} cycle(s)", cycles);
        }
    }
    Ok(())
}

mod config;
mod datasources;
mod error;
mod instrument;
mod quote_coordinator;
mod resolver;

use anyhow::Result;
use log::{info, warn};

use config::Config;
use datasources::TwseQuoteSource;
use instrument::InstrumentCode;
use quote_coordinator::{QuoteCoordinator, Snapshot};
use resolver::{resolve, LastValueStore, Resolution};

fn format_line(code: &InstrumentCode, resolution: &Resolution) -> String {
    let attributes = resolution
        .attributes
        .as_ref()
        .and_then(|a| serde_json::to_string(a).ok())
        .unwrap_or_else(|| "{}".to_owned());
    format!(
        "{} = {} {} (available: {}) {}",
        code.label(),
        resolution.value,
        code.unit_of_measurement(),
        resolution.available,
        attributes,
    )
}

fn publish(codes: &[InstrumentCode], snapshot: Option<&Snapshot>, store: &mut LastValueStore) {
    for code in codes {
        let resolution = resolve(code, snapshot, store);
        info!("{}", format_line(code, &resolution));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let coordinator = QuoteCoordinator::new(TwseQuoteSource::new()?, config.codes);
    let mut store = LastValueStore::new();

    if let Err(err) = coordinator.refresh().await {
        warn!("Initial fetch failed, values may be empty: {}", err);
    }
    let codes = coordinator.codes().to_vec();
    publish(&codes, coordinator.snapshot().as_deref(), &mut store);

    tokio::select! {
        _ = coordinator.monitor(|snapshot| publish(&codes, Some(snapshot), &mut store)) => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}

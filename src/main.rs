use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use weatheredge::config::{Config, EnvConfig};
use weatheredge::data::cache::EnsembleCache;
use weatheredge::data::gamma_api::GammaApiClient;
use weatheredge::data::http::RetryingFetcher;
use weatheredge::data::weather::EnsembleClient;
use weatheredge::engine::Engine;
use weatheredge::execution::ledger;
use weatheredge::execution::persistence::PortfolioStore;
use weatheredge::execution::types::Portfolio;
use weatheredge::monitoring::logger::CsvLogger;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("weatheredge scanner starting");

    let config = Config::load("config.toml")?;
    let env_config = EnvConfig::load();

    let store = match PortfolioStore::open(&config.system.database_path) {
        Ok(store) => Some(store),
        Err(e) => {
            error!("portfolio store unavailable, running in-memory: {e:#}");
            None
        }
    };
    let portfolio = match store.as_ref().map(PortfolioStore::load) {
        Some(Ok(portfolio)) => portfolio,
        Some(Err(e)) => {
            warn!("failed to load saved portfolio, starting fresh: {e:#}");
            Portfolio::default()
        }
        None => Portfolio::default(),
    };
    info!(
        "loaded {} trades, bankroll ${:.2}",
        portfolio.trades.len(),
        ledger::compute_bankroll(&portfolio)
    );

    let timeout = Duration::from_secs(config.scanner.request_timeout_secs);
    let discovery_fetcher = Arc::new(RetryingFetcher::new(
        config.scanner.discovery_retries,
        Duration::from_millis(config.scanner.discovery_retry_delay_ms),
        timeout,
    )?);
    let ensemble_fetcher = Arc::new(RetryingFetcher::new(
        config.scanner.ensemble_retries,
        Duration::from_millis(config.scanner.ensemble_retry_delay_ms),
        timeout,
    )?);

    let gamma = GammaApiClient::new(discovery_fetcher, env_config.gamma_api_url);
    let ensemble = EnsembleClient::new(ensemble_fetcher, env_config.ensemble_api_url);
    let cache = EnsembleCache::new(Duration::from_secs(config.scanner.ensemble_cache_ttl_secs));
    let csv = if config.monitoring.csv_logging {
        Some(CsvLogger::new(config.monitoring.csv_log_path.clone())?)
    } else {
        None
    };

    let mut engine =
        Engine::new(gamma, ensemble, cache, store, portfolio, config.scanner.clone(), csv);

    loop {
        match engine.run_scan(Utc::now()).await {
            Ok(outcome) => {
                let stats = engine.stats();
                info!(
                    "cycle done: {} markets, {} signals, {} opened, {} closed — bankroll ${:.2}, W/L {}/{}",
                    outcome.markets.len(),
                    outcome.signals.len(),
                    outcome.trades_opened,
                    outcome.trades_closed,
                    engine.bankroll(),
                    stats.wins,
                    stats.losses
                );
            }
            Err(e) => error!("scan failed: {e:#}"),
        }

        let interval = Duration::from_secs(engine.settings().scan_interval.max(60));
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

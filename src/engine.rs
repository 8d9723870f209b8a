use std::cmp::Ordering;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ScannerConfig;
use crate::data::cache::EnsembleCache;
use crate::data::gamma_api::GammaApiClient;
use crate::data::markets::normalize_event;
use crate::data::types::Market;
use crate::data::weather::EnsembleClient;
use crate::execution::ledger;
use crate::execution::persistence::PortfolioStore;
use crate::execution::types::{Portfolio, Settings, Trade, TradeStats};
use crate::monitoring::logger::CsvLogger;
use crate::strategies::confidence;
use crate::strategies::edge::detect_edges;
use crate::strategies::probability::score_buckets;
use crate::strategies::types::{Confidence, Signal};

/// A signal with its owning market's context, as ranked for the
/// presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSignal {
    #[serde(flatten)]
    pub signal: Signal,
    pub event_id: String,
    pub title: String,
    pub city: String,
    pub target_date: NaiveDate,
}

/// What one scan cycle produced. All fields are read-only views; the
/// portfolio itself is only reachable through the engine.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub markets: Vec<Market>,
    pub signals: Vec<MarketSignal>,
    pub trades_opened: usize,
    pub trades_closed: usize,
}

#[derive(Default)]
struct MarketAnalysis {
    signals: Vec<Signal>,
    opened: usize,
}

/// Drives the pipeline: discovery, normalization, ensemble scoring, edge
/// detection, auto trading and exit checks. Owns the portfolio under a
/// single-writer discipline; every logical mutation is persisted in full
/// before the cycle moves on.
pub struct Engine {
    gamma: GammaApiClient,
    ensemble: EnsembleClient,
    cache: EnsembleCache,
    store: Option<PortfolioStore>,
    portfolio: Portfolio,
    scanner: ScannerConfig,
    csv: Option<CsvLogger>,
}

impl Engine {
    pub fn new(
        gamma: GammaApiClient,
        ensemble: EnsembleClient,
        cache: EnsembleCache,
        store: Option<PortfolioStore>,
        portfolio: Portfolio,
        scanner: ScannerConfig,
        csv: Option<CsvLogger>,
    ) -> Self {
        Self { gamma, ensemble, cache, store, portfolio, scanner, csv }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn settings(&self) -> &Settings {
        &self.portfolio.settings
    }

    pub fn bankroll(&self) -> f64 {
        ledger::compute_bankroll(&self.portfolio)
    }

    pub fn stats(&self) -> TradeStats {
        ledger::compute_stats(&self.portfolio.trades)
    }

    pub fn update_settings(&mut self, settings: Settings) {
        self.portfolio.settings = settings;
        self.persist();
    }

    /// Explicit user action: wipe the trade history and restart ids.
    pub fn reset_trades(&mut self) {
        self.portfolio.reset_trades();
        self.persist();
    }

    /// Run one scan cycle. Per-market failures are logged and skipped; only
    /// a discovery failure surfaces as a (single, top-level) scan failure.
    pub async fn run_scan(&mut self, now: DateTime<Utc>) -> Result<ScanOutcome> {
        info!("starting market scan");
        let events =
            self.gamma.fetch_weather_events().await.context("market discovery failed")?;

        let today = now.date_naive();
        let markets: Vec<Market> =
            events.iter().filter_map(|e| normalize_event(e, today)).collect();
        let active = markets.iter().filter(|m| !m.is_resolved).count();
        info!("found {} weather markets ({} active)", markets.len(), active);

        let mut signals: Vec<MarketSignal> = Vec::new();
        let mut trades_opened = 0;

        let analyzable = markets
            .iter()
            .filter(|m| !m.is_resolved && m.city_info.is_some() && m.target_date.is_some())
            .take(self.scanner.max_markets_per_cycle);

        for market in analyzable {
            match self.analyze_market(market, now).await {
                Ok(analysis) => {
                    trades_opened += analysis.opened;
                    signals.extend(analysis.signals.into_iter().map(|signal| MarketSignal {
                        signal,
                        event_id: market.event_id.clone(),
                        title: market.title.clone(),
                        city: market.city.clone().unwrap_or_default(),
                        target_date: market.target_date.unwrap_or(today),
                    }));
                }
                Err(e) => {
                    warn!(
                        "error analyzing {}: {e:#}",
                        market.city.as_deref().unwrap_or("unknown city")
                    );
                }
            }

            // Deliberate throttle between markets for upstream rate limits.
            tokio::time::sleep(Duration::from_millis(self.scanner.market_pause_ms)).await;
        }

        // The ledger re-evaluates every open trade against each freshly
        // normalized market, resolved ones included; trades on markets
        // absent from this cycle are left untouched.
        let mut trades_closed = 0;
        for market in &markets {
            trades_closed += self.close_exited_trades(market, now);
        }

        signals.sort_by(|a, b| {
            b.signal
                .edge_strength
                .partial_cmp(&a.signal.edge_strength)
                .unwrap_or(Ordering::Equal)
        });

        info!(
            "scan complete: {} signals, {} trades opened, {} closed",
            signals.len(),
            trades_opened,
            trades_closed
        );

        Ok(ScanOutcome { markets, signals, trades_opened, trades_closed })
    }

    async fn analyze_market(
        &mut self,
        market: &Market,
        now: DateTime<Utc>,
    ) -> Result<MarketAnalysis> {
        let Some(city_info) = market.city_info else {
            bail!("market has no resolvable city");
        };
        let Some(target_date) = market.target_date else {
            bail!("market has no target date");
        };
        let city = market.city.as_deref().unwrap_or(city_info.name);
        info!("analyzing {} — {}", city, target_date);

        let key = EnsembleCache::key(city_info.lat, city_info.lon, target_date, market.temp_unit);
        let ensemble = match self.cache.get(&key) {
            Some(cached) => cached,
            None => {
                let fetched = self
                    .ensemble
                    .fetch_ensemble(city_info.lat, city_info.lon, target_date, market.temp_unit, now)
                    .await;
                self.cache.insert(key, fetched.clone());
                fetched
            }
        };

        if !ensemble.is_usable() {
            info!("no ensemble data for {} {}", city, target_date);
            return Ok(MarketAnalysis::default());
        }

        let scored = score_buckets(
            &ensemble,
            &market.buckets,
            self.portfolio.settings.spread_inflation,
            self.scanner.bias_correction,
        );
        let mut signals = detect_edges(&scored, &self.portfolio.settings);
        for signal in signals.iter_mut() {
            signal.confidence = confidence::grade(signal, &ensemble, &self.portfolio.settings);
        }

        let mut opened = 0;
        if self.portfolio.settings.auto_trade {
            for signal in signals.iter().filter(|s| s.confidence != Confidence::Low) {
                match ledger::open_trade(&mut self.portfolio, signal, market, now) {
                    Ok(trade) => {
                        info!(
                            "paper trade #{}: {} {} @ ${:.2} — ${:.2}",
                            trade.id, trade.side, trade.bucket_label, trade.entry_price, trade.cost
                        );
                        self.log_csv(&trade);
                        self.persist();
                        opened += 1;
                    }
                    Err(rejection) => warn!("trade rejected: {}", rejection),
                }
            }
        }

        Ok(MarketAnalysis { signals, opened })
    }

    fn close_exited_trades(&mut self, market: &Market, now: DateTime<Utc>) -> usize {
        let closed_trades = ledger::check_exits(&mut self.portfolio, market, now);
        for trade in &closed_trades {
            let reason = trade.exit_reason.map(|r| format!("{r:?}")).unwrap_or_default();
            info!(
                "closed #{} {} — {} — P&L ${:+.2}",
                trade.id,
                trade.bucket_label,
                reason,
                trade.pnl.unwrap_or(0.0)
            );
            self.log_csv(trade);
        }
        if !closed_trades.is_empty() {
            self.persist();
        }
        closed_trades.len()
    }

    /// Rewrite the persisted portfolio; a store failure downgrades the cycle
    /// to in-memory state instead of aborting it.
    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.portfolio) {
                error!("failed to persist portfolio, continuing in-memory: {e:#}");
            }
        }
    }

    fn log_csv(&self, trade: &Trade) {
        if let Some(csv) = &self.csv {
            if let Err(e) = csv.log_trade(trade) {
                warn!("failed to write trade log: {e:#}");
            }
        }
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::strategies::types::{Confidence, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    ResolvedWin,
    ResolvedLoss,
    TakeProfit,
    StopLoss,
}

/// One simulated position. Created only by the ledger's open operation,
/// mutated only by its exit check, never deleted (history is append-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub event_title: String,
    pub city: String,
    pub target_date: Option<NaiveDate>,
    pub bucket_id: String,
    pub bucket_label: String,
    pub side: Side,
    pub entry_price: f64,
    pub shares: f64,
    pub cost: f64,
    pub model_prob: f64,
    pub market_price: f64,
    pub edge: f64,
    pub confidence: Confidence,
    pub status: TradeStatus,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub exit_timestamp: Option<DateTime<Utc>>,
    pub pnl: Option<f64>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }
}

/// Runtime-tunable strategy settings, persisted with the portfolio and
/// resettable as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Starting bankroll in currency units.
    pub bankroll: f64,
    /// Minimum edge in percentage points before a signal is emitted.
    pub min_edge: f64,
    /// Multiplier widening the raw ensemble spread.
    pub spread_inflation: f64,
    pub max_positions: usize,
    /// Cap on one position as a percentage of bankroll.
    pub max_position_pct: f64,
    pub auto_trade: bool,
    /// Seconds between scan cycles.
    pub scan_interval: u64,
    pub take_profit_cents: f64,
    pub stop_loss_pct: f64,
    /// Maximum divergence (degrees) between model means counted as agreement.
    pub model_agreement_threshold: f64,
    /// Maximum YES entry price in cents.
    pub max_entry_price: f64,
    pub kelly_fraction: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bankroll: 100.0,
            min_edge: 5.0,
            spread_inflation: 1.3,
            max_positions: 5,
            max_position_pct: 10.0,
            auto_trade: false,
            scan_interval: 300,
            take_profit_cents: 85.0,
            stop_loss_pct: 50.0,
            model_agreement_threshold: 3.0,
            max_entry_price: 25.0,
            kelly_fraction: 0.25,
        }
    }
}

/// The unit of persistence: full trade history, settings, and the id counter.
/// Loaded once at startup, rewritten in full after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Portfolio {
    pub trades: Vec<Trade>,
    pub settings: Settings,
    pub next_trade_id: u64,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self { trades: Vec::new(), settings: Settings::default(), next_trade_id: 1 }
    }
}

impl Portfolio {
    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_open())
    }

    /// Clear the trade history and restart ids. An explicit user action, not
    /// silent pruning.
    pub fn reset_trades(&mut self) {
        self.trades.clear();
        self.next_trade_id = 1;
    }

    pub fn reset_settings(&mut self) {
        self.settings = Settings::default();
    }
}

/// Read-only trade statistics for the presentation layer.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TradeStats {
    pub closed_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percentage of closed trades that won; absent before the first close.
    pub win_rate: Option<f64>,
    pub total_pnl: f64,
    pub open_positions: usize,
    pub open_cost: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

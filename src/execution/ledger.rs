use chrono::{DateTime, Utc};

use crate::data::markets::SETTLED_BUCKET_PRICE;
use crate::data::types::Market;
use crate::execution::types::{ExitReason, Portfolio, Trade, TradeStats, TradeStatus};
use crate::strategies::kelly::kelly_size;
use crate::strategies::types::{Side, Signal};

/// Smallest position the ledger will open, in currency units.
pub const MIN_TRADE_COST: f64 = 0.50;

/// Effective price at which a winning position is taken off.
pub const TAKE_PROFIT_PRICE: f64 = 0.85;

/// A position is cut once its effective price halves from entry.
pub const STOP_LOSS_FRACTION: f64 = 0.5;

/// Why the ledger refused to open a position. Distinct from "no signal":
/// callers log these as warnings and move on.
#[derive(Debug, thiserror::Error)]
pub enum TradeRejection {
    #[error("bankroll depleted (${0:.2} available)")]
    BankrollDepleted(f64),

    #[error("max open positions reached: {0}")]
    MaxPositionsReached(usize),

    #[error("already holding an open position on bucket {0}")]
    DuplicatePosition(String),

    #[error("cost ${cost:.2} exceeds available bankroll ${bankroll:.2}")]
    CostExceedsBankroll { cost: f64, bankroll: f64 },
}

pub fn floor_cents(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Open a paper position for a signal under the portfolio's constraints.
/// Stake is Kelly-sized, capped by the per-position bankroll percentage and
/// floored at the minimum trade size; the share count is rounded down to a
/// cent-share and the cost recomputed from it so the books never drift.
pub fn open_trade(
    portfolio: &mut Portfolio,
    signal: &Signal,
    market: &Market,
    now: DateTime<Utc>,
) -> Result<Trade, TradeRejection> {
    let bankroll = compute_bankroll(portfolio);
    if bankroll <= 0.0 {
        return Err(TradeRejection::BankrollDepleted(bankroll));
    }

    let open_count = portfolio.open_trades().count();
    if open_count >= portfolio.settings.max_positions {
        return Err(TradeRejection::MaxPositionsReached(open_count));
    }

    if portfolio.open_trades().any(|t| t.bucket_id == signal.bucket.id) {
        return Err(TradeRejection::DuplicatePosition(signal.bucket.id.clone()));
    }

    let price = signal.effective_price;
    let model_prob = signal.effective_model_prob;

    let max_cost = bankroll * (portfolio.settings.max_position_pct / 100.0);
    let mut cost = kelly_size(model_prob, price, bankroll, portfolio.settings.kelly_fraction);
    cost = cost.min(max_cost);
    cost = cost.max(MIN_TRADE_COST);
    if cost > bankroll {
        return Err(TradeRejection::CostExceedsBankroll { cost, bankroll });
    }

    let shares = floor_cents(cost / price);
    let actual_cost = round_cents(shares * price);

    let trade = Trade {
        id: portfolio.next_trade_id,
        timestamp: now,
        event_title: market.title.clone(),
        city: market.city.clone().unwrap_or_default(),
        target_date: market.target_date,
        bucket_id: signal.bucket.id.clone(),
        bucket_label: signal.bucket.label.clone(),
        side: signal.side,
        entry_price: price,
        shares,
        cost: actual_cost,
        model_prob,
        market_price: signal.bucket.yes_price,
        edge: signal.edge,
        confidence: signal.confidence,
        status: TradeStatus::Open,
        exit_price: None,
        exit_reason: None,
        exit_timestamp: None,
        pnl: None,
    };

    portfolio.trades.push(trade.clone());
    portfolio.next_trade_id += 1;
    Ok(trade)
}

/// Re-evaluate every open trade belonging to a just-normalized market against
/// the exit rules. Trades on other markets are left untouched (stale, not
/// erroneously closed). Returns the trades closed this pass.
pub fn check_exits(portfolio: &mut Portfolio, market: &Market, now: DateTime<Utc>) -> Vec<Trade> {
    let mut closed = Vec::new();

    for trade in portfolio.trades.iter_mut() {
        if !trade.is_open() {
            continue;
        }
        if market.city.as_deref() != Some(trade.city.as_str())
            || trade.target_date != market.target_date
        {
            continue;
        }
        if let Some(updated) = evaluate_exit(trade, market, now) {
            *trade = updated.clone();
            closed.push(updated);
        }
    }

    closed
}

/// Apply the exit rules to one trade. Returns the closed trade on a
/// transition, `None` when the position stays open. Re-running on an
/// already-closed trade is a no-op.
pub fn evaluate_exit(trade: &Trade, market: &Market, now: DateTime<Utc>) -> Option<Trade> {
    if !trade.is_open() {
        return None;
    }

    let current_price = market
        .buckets
        .iter()
        .find(|b| b.id == trade.bucket_id)
        .map(|b| match trade.side {
            Side::Yes => b.yes_price,
            Side::No => 1.0 - b.yes_price,
        });

    if market.is_resolved {
        let settled = market.buckets.iter().find(|b| b.yes_price >= SETTLED_BUCKET_PRICE);
        let won_yes =
            settled.map_or(false, |s| s.id == trade.bucket_id && trade.side == Side::Yes);
        let won_no = settled.map_or(false, |s| s.id != trade.bucket_id && trade.side == Side::No);
        let won = won_yes || won_no;

        let (exit_price, reason, pnl) = if won {
            (1.0, ExitReason::ResolvedWin, round_cents(trade.shares - trade.cost))
        } else {
            (0.0, ExitReason::ResolvedLoss, -trade.cost)
        };
        return Some(close_trade(trade, exit_price, reason, pnl, now));
    }

    let price = current_price?;

    if price >= TAKE_PROFIT_PRICE {
        let pnl = round_cents(trade.shares * price - trade.cost);
        return Some(close_trade(trade, price, ExitReason::TakeProfit, pnl, now));
    }

    if price <= trade.entry_price * STOP_LOSS_FRACTION {
        let pnl = round_cents(trade.shares * price - trade.cost);
        return Some(close_trade(trade, price, ExitReason::StopLoss, pnl, now));
    }

    None
}

fn close_trade(
    trade: &Trade,
    exit_price: f64,
    reason: ExitReason,
    pnl: f64,
    now: DateTime<Utc>,
) -> Trade {
    let mut closed = trade.clone();
    closed.status = TradeStatus::Closed;
    closed.exit_price = Some(exit_price);
    closed.exit_reason = Some(reason);
    closed.exit_timestamp = Some(now);
    closed.pnl = Some(pnl);
    closed
}

/// Available bankroll, always recomputed from the full trade history so it
/// self-heals after any persistence corruption.
pub fn compute_bankroll(portfolio: &Portfolio) -> f64 {
    let mut bankroll = portfolio.settings.bankroll;
    for trade in &portfolio.trades {
        match trade.status {
            TradeStatus::Open => bankroll -= trade.cost,
            TradeStatus::Closed => bankroll += trade.pnl.unwrap_or(0.0),
        }
    }
    round_cents(bankroll)
}

/// Aggregate trade statistics for the presentation layer.
pub fn compute_stats(trades: &[Trade]) -> TradeStats {
    let closed: Vec<&Trade> = trades.iter().filter(|t| !t.is_open()).collect();
    let wins: Vec<f64> = closed.iter().filter_map(|t| t.pnl).filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = closed.iter().filter_map(|t| t.pnl).filter(|p| *p <= 0.0).collect();

    let total_pnl: f64 = closed.iter().filter_map(|t| t.pnl).sum();
    let open: Vec<&Trade> = trades.iter().filter(|t| t.is_open()).collect();
    let open_cost: f64 = open.iter().map(|t| t.cost).sum();

    TradeStats {
        closed_trades: closed.len(),
        wins: wins.len(),
        losses: losses.len(),
        win_rate: if closed.is_empty() {
            None
        } else {
            Some(round_cents(wins.len() as f64 / closed.len() as f64 * 100.0))
        },
        total_pnl: round_cents(total_pnl),
        open_positions: open.len(),
        open_cost: round_cents(open_cost),
        avg_win: if wins.is_empty() {
            0.0
        } else {
            round_cents(wins.iter().sum::<f64>() / wins.len() as f64)
        },
        avg_loss: if losses.is_empty() {
            0.0
        } else {
            round_cents(losses.iter().sum::<f64>() / losses.len() as f64)
        },
    }
}

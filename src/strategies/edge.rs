use std::cmp::Ordering;

use crate::execution::types::Settings;
use crate::strategies::types::{Confidence, ScoredBucket, Side, Signal};

/// A bucket priced at or beyond these bounds has effectively settled and is
/// not genuinely tradeable.
pub const SETTLED_HIGH: f64 = 0.98;
pub const SETTLED_LOW: f64 = 0.002;

/// NO is only considered when the bucket is not already near zero; below this
/// price the NO side is "underpriced" by rounding noise alone.
const MIN_PRICE_FOR_NO: f64 = 0.05;

/// Compare model probability to market price on both sides of each bucket,
/// keep the better side, and filter by minimum edge. Results are ranked
/// descending by edge strength.
pub fn detect_edges(scored: &[ScoredBucket], settings: &Settings) -> Vec<Signal> {
    let mut signals: Vec<Signal> = scored
        .iter()
        .filter(|s| {
            let b = &s.bucket;
            b.yes_price < SETTLED_HIGH && b.yes_price > SETTLED_LOW && !b.closed && b.active
        })
        .filter_map(|s| evaluate_bucket(s, settings))
        .collect();

    signals.sort_by(|a, b| {
        b.edge_strength.partial_cmp(&a.edge_strength).unwrap_or(Ordering::Equal)
    });
    signals
}

fn evaluate_bucket(scored: &ScoredBucket, settings: &Settings) -> Option<Signal> {
    let bucket = &scored.bucket;
    let yes_edge = scored.model_prob - bucket.yes_price;
    let no_model_prob = 1.0 - scored.model_prob;
    let no_market_price = 1.0 - bucket.yes_price;
    let no_edge = no_model_prob - no_market_price;

    let yes_eligible = yes_edge > 0.0 && bucket.yes_price <= settings.max_entry_price / 100.0;
    let no_eligible = no_edge > 0.0 && bucket.yes_price > MIN_PRICE_FOR_NO;

    let (side, edge, price, model_prob) = if yes_eligible && no_eligible {
        // Both sides look attractive: take the higher edge relative to its own
        // price. NO is priced closer to 1 and always has more absolute room;
        // comparing absolute edges would bury cheap, proportionally sharper
        // YES entries.
        let yes_rel = yes_edge / bucket.yes_price;
        let no_rel = no_edge / no_market_price;
        if yes_rel >= no_rel {
            (Side::Yes, yes_edge, bucket.yes_price, scored.model_prob)
        } else {
            (Side::No, no_edge, no_market_price, no_model_prob)
        }
    } else if yes_eligible {
        (Side::Yes, yes_edge, bucket.yes_price, scored.model_prob)
    } else if no_eligible {
        (Side::No, no_edge, no_market_price, no_model_prob)
    } else {
        return None;
    };

    let edge_strength = edge.abs() * 100.0;
    if edge_strength < settings.min_edge {
        return None;
    }

    Some(Signal {
        bucket: bucket.clone(),
        model_prob: scored.model_prob,
        side,
        effective_price: price,
        effective_model_prob: model_prob,
        edge,
        rel_edge: if price > 0.0 { edge / price * 100.0 } else { 0.0 },
        edge_strength,
        confidence: Confidence::Low,
    })
}

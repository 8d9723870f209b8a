use serde::{Deserialize, Serialize};

use crate::data::types::Bucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Yes,
    No,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Med,
    High,
}

/// A bucket annotated with the model's settlement probability for the cycle.
#[derive(Debug, Clone)]
pub struct ScoredBucket {
    pub bucket: Bucket,
    pub model_prob: f64,
}

/// A detected mispricing on one side of one bucket. Derived every cycle,
/// never persisted on its own.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub bucket: Bucket,
    /// Model probability of the bucket settling YES.
    pub model_prob: f64,
    pub side: Side,
    /// Cost of one share on the chosen side.
    pub effective_price: f64,
    /// Model probability of the chosen side paying out.
    pub effective_model_prob: f64,
    /// Chosen side's edge in probability units.
    pub edge: f64,
    /// Edge relative to the price paid, in percent.
    pub rel_edge: f64,
    /// Absolute edge in percentage points; the ranking key.
    pub edge_strength: f64,
    pub confidence: Confidence,
}

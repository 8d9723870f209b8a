use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempUnit {
    Fahrenheit,
    Celsius,
}

impl TempUnit {
    /// Value the forecast API expects in its `temperature_unit` parameter.
    pub fn api_param(&self) -> &'static str {
        match self {
            TempUnit::Fahrenheit => "fahrenheit",
            TempUnit::Celsius => "celsius",
        }
    }
}

/// A known city a market title can resolve to.
#[derive(Debug, Clone, Copy)]
pub struct CityInfo {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub unit: TempUnit,
}

/// The payout interval of one temperature bucket, as a closed set of variants.
/// Only the fields meaningful for each comparison type are carried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BucketRange {
    Exact { value: f64 },
    Lte { high: f64 },
    Gte { low: f64 },
    Range { low: f64, high: f64 },
}

impl BucketRange {
    /// Integration bounds for the Gaussian model. Buckets report an
    /// integer-rounded reading of a continuous quantity, hence the ±0.5
    /// continuity correction.
    pub fn cdf_bounds(&self) -> (f64, f64) {
        match *self {
            BucketRange::Lte { high } => (f64::NEG_INFINITY, high + 0.5),
            BucketRange::Gte { low } => (low - 0.5, f64::INFINITY),
            BucketRange::Range { low, high } => (low - 0.5, high + 0.5),
            BucketRange::Exact { value } => (value - 0.5, value + 0.5),
        }
    }

    /// Effective temperature used to order buckets within a market. An
    /// open-below bucket sorts by its upper bound.
    pub fn sort_key(&self) -> f64 {
        match *self {
            BucketRange::Lte { high } => high,
            BucketRange::Gte { low } => low,
            BucketRange::Range { low, .. } => low,
            BucketRange::Exact { value } => value,
        }
    }
}

/// One tradeable payout bucket of a temperature market, parsed from its
/// free-text label. Recomputed each scan cycle as prices move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub id: String,
    pub label: String,
    pub range: BucketRange,
    pub unit: Option<TempUnit>,
    pub yes_price: f64,
    pub token_id: String,
    pub active: bool,
    pub closed: bool,
    pub accepting_orders: bool,
}

/// A normalized temperature market: one event with its buckets sorted
/// ascending by effective temperature.
#[derive(Debug, Clone, Serialize)]
pub struct Market {
    pub event_id: String,
    pub title: String,
    pub slug: String,
    pub city: Option<String>,
    #[serde(skip)]
    pub city_info: Option<CityInfo>,
    pub target_date: Option<NaiveDate>,
    pub temp_unit: TempUnit,
    pub buckets: Vec<Bucket>,
    pub is_resolved: bool,
    pub active: bool,
    pub volume: f64,
}

/// Pooled forecast-model ensemble for one (location, date) pair. Built fresh
/// per scan cycle, never persisted.
#[derive(Debug, Clone, Default)]
pub struct Ensemble {
    pub gfs_members: Vec<f64>,
    pub ecmwf_members: Vec<f64>,
    pub gfs_mean: Option<f64>,
    pub ecmwf_mean: Option<f64>,
    pub combined_mean: Option<f64>,
    pub combined_std: Option<f64>,
}

impl Ensemble {
    /// An ensemble with zero members across both models cannot price buckets;
    /// the market is skipped for the cycle.
    pub fn is_usable(&self) -> bool {
        self.combined_mean.is_some() && self.combined_std.is_some()
    }
}

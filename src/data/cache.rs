use std::time::{Duration, Instant};

use chrono::NaiveDate;
use dashmap::DashMap;

use crate::data::types::{Ensemble, TempUnit};

/// TTL cache for fetched ensembles, keyed by (location, date, unit). The TTL
/// stays below the scan interval so consecutive cycles see fresh model runs
/// while repeated lookups within one cycle reuse the same fetch.
pub struct EnsembleCache {
    cache: DashMap<String, CachedEnsemble>,
    ttl: Duration,
}

struct CachedEnsemble {
    ensemble: Ensemble,
    fetched_at: Instant,
}

impl EnsembleCache {
    pub fn new(ttl: Duration) -> Self {
        Self { cache: DashMap::new(), ttl }
    }

    pub fn key(lat: f64, lon: f64, date: NaiveDate, unit: TempUnit) -> String {
        format!("{:.4},{:.4},{},{}", lat, lon, date, unit.api_param())
    }

    pub fn insert(&self, key: String, ensemble: Ensemble) {
        self.cache.insert(key, CachedEnsemble { ensemble, fetched_at: Instant::now() });
    }

    /// Get an ensemble if not expired (evict on read).
    pub fn get(&self, key: &str) -> Option<Ensemble> {
        let entry = self.cache.get(key)?;
        if entry.fetched_at.elapsed() > self.ttl {
            drop(entry);
            self.cache.remove(key);
            return None;
        }
        Some(entry.ensemble.clone())
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sample_ensemble(mean: f64) -> Ensemble {
        Ensemble {
            combined_mean: Some(mean),
            combined_std: Some(3.0),
            ..Default::default()
        }
    }

    fn key() -> String {
        EnsembleCache::key(40.7128, -74.006, NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(), TempUnit::Fahrenheit)
    }

    #[test]
    fn test_cache_insert_and_get() {
        let cache = EnsembleCache::new(Duration::from_secs(60));
        cache.insert(key(), sample_ensemble(75.0));

        let hit = cache.get(&key()).unwrap();
        assert_eq!(hit.combined_mean, Some(75.0));
    }

    #[test]
    fn test_cache_ttl_expiration() {
        let cache = EnsembleCache::new(Duration::from_millis(50));
        cache.insert(key(), sample_ensemble(75.0));

        assert!(cache.get(&key()).is_some());
        thread::sleep(Duration::from_millis(80));
        assert!(cache.get(&key()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_distinguishes_units() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let f = EnsembleCache::key(51.5074, -0.1278, date, TempUnit::Fahrenheit);
        let c = EnsembleCache::key(51.5074, -0.1278, date, TempUnit::Celsius);
        assert_ne!(f, c);
    }
}

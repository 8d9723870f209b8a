use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::data::http::JsonFetcher;
use crate::data::types::{Ensemble, TempUnit};

const GFS_MODEL: &str = "gfs025";
const ECMWF_MODEL: &str = "ecmwf_ifs025";
const GFS_MAX_MEMBER: usize = 30;
const ECMWF_MAX_MEMBER: usize = 50;

/// Uncertainty assumed when only a single ensemble member is available; a
/// sample of size 1 has no defined variance and must not read as certainty.
const SINGLE_MEMBER_STD: f64 = 2.0;

pub struct EnsembleClient {
    fetcher: Arc<dyn JsonFetcher>,
    base_url: String,
}

impl EnsembleClient {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, base_url: String) -> Self {
        Self { fetcher, base_url }
    }

    /// Fetch both forecast-model ensembles for one (location, date) pair and
    /// pool them. The two requests are issued together and awaited jointly;
    /// a failure in one source leaves the other source's members usable.
    pub async fn fetch_ensemble(
        &self,
        lat: f64,
        lon: f64,
        target_date: NaiveDate,
        unit: TempUnit,
        now: DateTime<Utc>,
    ) -> Ensemble {
        let forecast_days = forecast_horizon(target_date, now);
        let gfs_url = self.model_url(lat, lon, GFS_MODEL, forecast_days, unit);
        let ecmwf_url = self.model_url(lat, lon, ECMWF_MODEL, forecast_days, unit);

        let (gfs, ecmwf) =
            futures::join!(self.fetcher.get_json(&gfs_url), self.fetcher.get_json(&ecmwf_url));

        let mut ensemble = Ensemble::default();
        match gfs {
            Ok(payload) => {
                ensemble.gfs_members = extract_members(&payload, target_date, GFS_MAX_MEMBER)
            }
            Err(e) => warn!("GFS ensemble fetch failed: {e:#}"),
        }
        match ecmwf {
            Ok(payload) => {
                ensemble.ecmwf_members = extract_members(&payload, target_date, ECMWF_MAX_MEMBER)
            }
            Err(e) => warn!("ECMWF ensemble fetch failed: {e:#}"),
        }

        if !ensemble.gfs_members.is_empty() {
            ensemble.gfs_mean = Some(mean(&ensemble.gfs_members));
        }
        if !ensemble.ecmwf_members.is_empty() {
            ensemble.ecmwf_mean = Some(mean(&ensemble.ecmwf_members));
        }

        let pooled: Vec<f64> = ensemble
            .gfs_members
            .iter()
            .chain(ensemble.ecmwf_members.iter())
            .copied()
            .collect();
        match pooled.len() {
            0 => {}
            1 => {
                ensemble.combined_mean = Some(pooled[0]);
                ensemble.combined_std = Some(SINGLE_MEMBER_STD);
            }
            _ => {
                ensemble.combined_mean = Some(mean(&pooled));
                ensemble.combined_std = Some(sample_std(&pooled));
            }
        }

        ensemble
    }

    fn model_url(&self, lat: f64, lon: f64, model: &str, days: i64, unit: TempUnit) -> String {
        format!(
            "{}?latitude={}&longitude={}&daily=temperature_2m_max&models={}&forecast_days={}&temperature_unit={}",
            self.base_url,
            lat,
            lon,
            model,
            days,
            unit.api_param()
        )
    }
}

/// Forecast horizon to request: enough days to cover the target plus slack,
/// clamped to what the upstream accepts.
pub fn forecast_horizon(target: NaiveDate, now: DateTime<Utc>) -> i64 {
    let target_noon = (target.and_time(NaiveTime::MIN) + Duration::hours(12)).and_utc();
    let days_out = ((target_noon - now).num_seconds() as f64 / 86_400.0).ceil().max(1.0) as i64;
    (days_out + 2).clamp(3, 16)
}

/// Collect every member's value at the target date's index in the daily
/// series. Member keys come zero-padded or not depending on the model;
/// null/NaN members are skipped.
fn extract_members(payload: &Value, target: NaiveDate, max_member: usize) -> Vec<f64> {
    let daily = &payload["daily"];
    let Some(times) = daily["time"].as_array() else {
        return Vec::new();
    };

    let date_str = target.format("%Y-%m-%d").to_string();
    let Some(date_idx) = times.iter().position(|t| t.as_str() == Some(date_str.as_str())) else {
        return Vec::new();
    };

    let mut members = Vec::new();
    for i in 0..=max_member {
        let padded = format!("temperature_2m_max_member{:02}", i);
        let unpadded = format!("temperature_2m_max_member{}", i);
        let series = if !daily[&padded].is_null() {
            &daily[&padded]
        } else if !daily[&unpadded].is_null() {
            &daily[&unpadded]
        } else {
            continue;
        };

        if let Some(v) = series.get(date_idx).and_then(Value::as_f64) {
            if v.is_finite() {
                members.push(v);
            }
        }
    }
    members
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N−1 denominator).
pub fn sample_std(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)).sqrt()
}

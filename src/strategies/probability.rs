use crate::data::types::{Bucket, Ensemble};
use crate::strategies::types::ScoredBucket;

/// Hard floor on the model sigma. A tightly clustered ensemble must not
/// produce spuriously certain probabilities.
pub const SIGMA_FLOOR: f64 = 0.5;

/// Substitutes for unbounded CDF limits, far outside any realistic surface
/// temperature in either working unit.
const LOWER_SUBSTITUTE: f64 = -100.0;
const UPPER_SUBSTITUTE: f64 = 200.0;

/// Error function via the Abramowitz & Stegun rational approximation,
/// absolute error below 1.5e-7.
pub fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Normal CDF. Degrades to a step function when std is not positive.
pub fn normal_cdf(x: f64, mean: f64, std: f64) -> f64 {
    if std <= 0.0 {
        return if x >= mean { 1.0 } else { 0.0 };
    }
    0.5 * (1.0 + erf((x - mean) / (std * std::f64::consts::SQRT_2)))
}

/// Annotate each bucket with its settlement probability under a Gaussian
/// model of the pooled ensemble. The spread-inflation multiplier widens the
/// raw ensemble std; the bias correction is reserved for calibration.
pub fn score_buckets(
    ensemble: &Ensemble,
    buckets: &[Bucket],
    spread_inflation: f64,
    bias_correction: f64,
) -> Vec<ScoredBucket> {
    let (Some(mean), Some(std)) = (ensemble.combined_mean, ensemble.combined_std) else {
        return Vec::new();
    };

    let mu = mean + bias_correction;
    let sigma = (std * spread_inflation).max(SIGMA_FLOOR);

    buckets
        .iter()
        .map(|bucket| {
            let (lower, upper) = bucket.range.cdf_bounds();
            let lower = if lower == f64::NEG_INFINITY { LOWER_SUBSTITUTE } else { lower };
            let upper = if upper == f64::INFINITY { UPPER_SUBSTITUTE } else { upper };
            let prob = normal_cdf(upper, mu, sigma) - normal_cdf(lower, mu, sigma);
            ScoredBucket { bucket: bucket.clone(), model_prob: prob.clamp(0.0, 1.0) }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::bucket::parse_bucket_label;

    fn bucket(id: &str, label: &str, yes_price: f64) -> Bucket {
        let parsed = parse_bucket_label(label).expect(label);
        Bucket {
            id: id.to_string(),
            label: parsed.label,
            range: parsed.range,
            unit: parsed.unit,
            yes_price,
            token_id: String::new(),
            active: true,
            closed: false,
            accepting_orders: true,
        }
    }

    fn ensemble(mean: f64, std: f64) -> Ensemble {
        Ensemble {
            combined_mean: Some(mean),
            combined_std: Some(std),
            ..Default::default()
        }
    }

    #[test]
    fn test_erf_known_values() {
        assert!((erf(0.0)).abs() < 1e-9);
        assert!((erf(1.0) - 0.842_700_79).abs() < 1e-6);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 1e-6);
        assert!((erf(2.0) - 0.995_322_27).abs() < 1e-6);
    }

    #[test]
    fn test_normal_cdf_midpoint_and_saturation() {
        assert!((normal_cdf(78.0, 78.0, 4.0) - 0.5).abs() < 1e-9);
        assert!(normal_cdf(78.0 - 40.0, 78.0, 4.0) < 1e-6);
        assert!(normal_cdf(78.0 + 40.0, 78.0, 4.0) > 1.0 - 1e-6);
    }

    #[test]
    fn test_normal_cdf_monotone() {
        let mut prev = 0.0;
        let mut x = 60.0;
        while x <= 95.0 {
            let p = normal_cdf(x, 78.0, 4.0);
            assert!(p >= prev);
            prev = p;
            x += 0.25;
        }
    }

    #[test]
    fn test_normal_cdf_degenerate_std_is_step() {
        assert_eq!(normal_cdf(77.9, 78.0, 0.0), 0.0);
        assert_eq!(normal_cdf(78.0, 78.0, 0.0), 1.0);
    }

    #[test]
    fn test_score_buckets_sum_to_one_when_exhaustive() {
        let buckets = vec![
            bucket("b1", "74 or lower", 0.2),
            bucket("b2", "75-76", 0.3),
            bucket("b3", "77-78", 0.3),
            bucket("b4", "79 or higher", 0.2),
        ];
        let scored = score_buckets(&ensemble(76.0, 3.0), &buckets, 1.0, 0.0);
        let total: f64 = scored.iter().map(|s| s.model_prob).sum();
        assert!((total - 1.0).abs() < 0.02);
    }

    #[test]
    fn test_score_buckets_gte_scenario() {
        // "82 or higher" with mean 78, std 4: P ≈ 1 − Φ(81.5) ≈ 0.191
        let buckets = vec![bucket("b1", "82 or higher", 0.10)];
        let scored = score_buckets(&ensemble(78.0, 4.0), &buckets, 1.0, 0.0);
        assert!((scored[0].model_prob - 0.1908).abs() < 0.005);
    }

    #[test]
    fn test_score_buckets_sigma_floor() {
        // A near-zero spread must not produce a near-certain exact bucket.
        let buckets = vec![bucket("b1", "75", 0.5)];
        let scored = score_buckets(&ensemble(75.0, 0.01), &buckets, 1.0, 0.0);
        // With the 0.5 floor, P(74.5..75.5) = Φ(1) − Φ(−1) ≈ 0.683
        assert!((scored[0].model_prob - 0.6827).abs() < 0.01);
    }

    #[test]
    fn test_score_buckets_unusable_ensemble() {
        let buckets = vec![bucket("b1", "75", 0.5)];
        assert!(score_buckets(&Ensemble::default(), &buckets, 1.3, 0.0).is_empty());
    }

    #[test]
    fn test_bias_correction_shifts_mean() {
        let buckets = vec![bucket("b1", "82 or higher", 0.10)];
        let without = score_buckets(&ensemble(78.0, 4.0), &buckets, 1.0, 0.0);
        let with = score_buckets(&ensemble(78.0, 4.0), &buckets, 1.0, 2.0);
        assert!(with[0].model_prob > without[0].model_prob);
    }
}

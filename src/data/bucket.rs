use std::sync::OnceLock;

use regex::Regex;

use crate::data::types::{BucketRange, TempUnit};

/// Result of parsing a payout-bucket label such as `"82 or higher"`,
/// `"75-76"` or `"32 or lower°F"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBucket {
    pub range: BucketRange,
    pub unit: Option<TempUnit>,
    pub label: String,
}

struct BucketPatterns {
    unit: Regex,
    lte: Regex,
    gte: Regex,
    plus: Regex,
    range: Regex,
    exact: Regex,
}

fn patterns() -> &'static BucketPatterns {
    static PATTERNS: OnceLock<BucketPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| BucketPatterns {
        unit: Regex::new(r"(?i)°[CF]").expect("unit pattern"),
        lte: Regex::new(r"(?i)^(-?\d+(?:\.\d+)?)\s+or\s+(?:lower|less|below)").expect("lte pattern"),
        gte: Regex::new(r"(?i)^(-?\d+(?:\.\d+)?)\s+or\s+(?:higher|more|above)").expect("gte pattern"),
        plus: Regex::new(r"^(-?\d+(?:\.\d+)?)\+$").expect("plus pattern"),
        range: Regex::new(r"(?i)^(-?\d+(?:\.\d+)?)\s*(?:[-–—]|to)\s*(-?\d+(?:\.\d+)?)")
            .expect("range pattern"),
        exact: Regex::new(r"^(-?\d+(?:\.\d+)?)$").expect("exact pattern"),
    })
}

/// Parse a free-text bucket label into an interval and comparison type.
/// Returns `None` for labels matching no known pattern; such buckets are
/// dropped from the market rather than failing the scan.
pub fn parse_bucket_label(text: &str) -> Option<ParsedBucket> {
    let clean = text.trim();
    if clean.is_empty() {
        return None;
    }

    let lower = clean.to_lowercase();
    let unit = if lower.contains("°c") {
        Some(TempUnit::Celsius)
    } else if lower.contains("°f") {
        Some(TempUnit::Fahrenheit)
    } else {
        None
    };

    // Strip the unit marker before numeric parsing.
    let pats = patterns();
    let numeric = pats.unit.replace_all(clean, "");
    let numeric = numeric.trim();

    if let Some(cap) = pats.lte.captures(numeric) {
        let high = cap[1].parse().ok()?;
        return Some(ParsedBucket { range: BucketRange::Lte { high }, unit, label: clean.to_string() });
    }

    let gte_cap = pats.gte.captures(numeric).or_else(|| pats.plus.captures(numeric));
    if let Some(cap) = gte_cap {
        let low = cap[1].parse().ok()?;
        return Some(ParsedBucket { range: BucketRange::Gte { low }, unit, label: clean.to_string() });
    }

    if let Some(cap) = pats.range.captures(numeric) {
        let low = cap[1].parse().ok()?;
        let high = cap[2].parse().ok()?;
        return Some(ParsedBucket {
            range: BucketRange::Range { low, high },
            unit,
            label: clean.to_string(),
        });
    }

    if let Some(cap) = pats.exact.captures(numeric) {
        let value = cap[1].parse().ok()?;
        return Some(ParsedBucket {
            range: BucketRange::Exact { value },
            unit,
            label: clean.to_string(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_of(label: &str) -> BucketRange {
        parse_bucket_label(label).expect(label).range
    }

    #[test]
    fn test_parse_or_lower() {
        assert_eq!(range_of("32 or lower"), BucketRange::Lte { high: 32.0 });
        assert_eq!(range_of("32 or less"), BucketRange::Lte { high: 32.0 });
        assert_eq!(range_of("0 or below"), BucketRange::Lte { high: 0.0 });
    }

    #[test]
    fn test_parse_or_higher() {
        assert_eq!(range_of("82 or higher"), BucketRange::Gte { low: 82.0 });
        assert_eq!(range_of("82 or more"), BucketRange::Gte { low: 82.0 });
        assert_eq!(range_of("82 or above"), BucketRange::Gte { low: 82.0 });
        assert_eq!(range_of("82+"), BucketRange::Gte { low: 82.0 });
    }

    #[test]
    fn test_parse_range_separators() {
        let expected = BucketRange::Range { low: 75.0, high: 76.0 };
        assert_eq!(range_of("75-76"), expected);
        assert_eq!(range_of("75 - 76"), expected);
        assert_eq!(range_of("75–76"), expected);
        assert_eq!(range_of("75 to 76"), expected);
    }

    #[test]
    fn test_parse_exact() {
        assert_eq!(range_of("75"), BucketRange::Exact { value: 75.0 });
        assert_eq!(range_of("-5"), BucketRange::Exact { value: -5.0 });
    }

    #[test]
    fn test_unit_detection_and_stripping() {
        let parsed = parse_bucket_label("32 or lower°F").unwrap();
        assert_eq!(parsed.unit, Some(TempUnit::Fahrenheit));
        assert_eq!(parsed.range, BucketRange::Lte { high: 32.0 });

        let parsed = parse_bucket_label("15°C").unwrap();
        assert_eq!(parsed.unit, Some(TempUnit::Celsius));
        assert_eq!(parsed.range, BucketRange::Exact { value: 15.0 });
    }

    #[test]
    fn test_negative_range() {
        assert_eq!(range_of("-5 or lower"), BucketRange::Lte { high: -5.0 });
    }

    #[test]
    fn test_unparseable_labels_dropped() {
        assert!(parse_bucket_label("").is_none());
        assert!(parse_bucket_label("sunny with a chance of rain").is_none());
        assert!(parse_bucket_label("warmer than usual").is_none());
    }

    #[test]
    fn test_cdf_bounds_continuity_correction() {
        assert_eq!(
            BucketRange::Lte { high: 32.0 }.cdf_bounds(),
            (f64::NEG_INFINITY, 32.5)
        );
        assert_eq!(BucketRange::Gte { low: 82.0 }.cdf_bounds(), (81.5, f64::INFINITY));
        assert_eq!(BucketRange::Range { low: 75.0, high: 76.0 }.cdf_bounds(), (74.5, 76.5));
        assert_eq!(BucketRange::Exact { value: 75.0 }.cdf_bounds(), (74.5, 75.5));
    }

    #[test]
    fn test_adjacent_buckets_partition_the_line() {
        // A full ladder as listed on a real market: bounds must tile the real
        // line with no gaps and no overlaps except shared endpoints.
        let ladder = [
            range_of("74 or lower"),
            range_of("75-76"),
            range_of("77-78"),
            range_of("79 or higher"),
        ];
        for pair in ladder.windows(2) {
            let (_, upper) = pair[0].cdf_bounds();
            let (lower, _) = pair[1].cdf_bounds();
            assert_eq!(upper, lower);
        }
        assert_eq!(ladder[0].cdf_bounds().0, f64::NEG_INFINITY);
        assert_eq!(ladder[3].cdf_bounds().1, f64::INFINITY);
    }

    #[test]
    fn test_sort_key_uses_upper_bound_for_lte() {
        assert_eq!(BucketRange::Lte { high: 32.0 }.sort_key(), 32.0);
        assert_eq!(BucketRange::Gte { low: 82.0 }.sort_key(), 82.0);
        assert_eq!(BucketRange::Range { low: 75.0, high: 76.0 }.sort_key(), 75.0);
    }
}

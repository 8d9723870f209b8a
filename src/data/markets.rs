use std::cmp::Ordering;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde_json::Value;

use crate::data::bucket::parse_bucket_label;
use crate::data::gamma_api::{RawEvent, RawMarket};
use crate::data::types::TempUnit::{Celsius as C, Fahrenheit as F};
use crate::data::types::{Bucket, CityInfo, Market, TempUnit};

/// Price at which a bucket is considered settled when deriving market
/// resolution status.
pub const SETTLED_BUCKET_PRICE: f64 = 0.95;

/// Cities the scanner knows how to locate. Matched against market titles
/// longest-name-first so e.g. "new york" is never shadowed by a shorter
/// substring entry.
pub const CITIES: &[CityInfo] = &[
    CityInfo { name: "new york", lat: 40.7128, lon: -74.006, unit: F },
    CityInfo { name: "nyc", lat: 40.7128, lon: -74.006, unit: F },
    CityInfo { name: "chicago", lat: 41.8781, lon: -87.6298, unit: F },
    CityInfo { name: "miami", lat: 25.7617, lon: -80.1918, unit: F },
    CityInfo { name: "dallas", lat: 32.7767, lon: -96.797, unit: F },
    CityInfo { name: "los angeles", lat: 34.0522, lon: -118.2437, unit: F },
    CityInfo { name: "atlanta", lat: 33.749, lon: -84.388, unit: F },
    CityInfo { name: "seattle", lat: 47.6062, lon: -122.3321, unit: F },
    CityInfo { name: "denver", lat: 39.7392, lon: -104.9903, unit: F },
    CityInfo { name: "san francisco", lat: 37.7749, lon: -122.4194, unit: F },
    CityInfo { name: "washington", lat: 38.9072, lon: -77.0369, unit: F },
    CityInfo { name: "boston", lat: 42.3601, lon: -71.0589, unit: F },
    CityInfo { name: "houston", lat: 29.7604, lon: -95.3698, unit: F },
    CityInfo { name: "phoenix", lat: 33.4484, lon: -112.074, unit: F },
    CityInfo { name: "philadelphia", lat: 39.9526, lon: -75.1652, unit: F },
    CityInfo { name: "london", lat: 51.5074, lon: -0.1278, unit: C },
    CityInfo { name: "paris", lat: 48.8566, lon: 2.3522, unit: C },
    CityInfo { name: "tokyo", lat: 35.6762, lon: 139.6503, unit: C },
    CityInfo { name: "seoul", lat: 37.5665, lon: 126.978, unit: C },
    CityInfo { name: "buenos aires", lat: -34.6037, lon: -58.3816, unit: C },
    CityInfo { name: "ankara", lat: 39.9334, lon: 32.8597, unit: C },
    CityInfo { name: "sydney", lat: -33.8688, lon: 151.2093, unit: C },
    CityInfo { name: "mumbai", lat: 19.076, lon: 72.8777, unit: C },
    CityInfo { name: "cairo", lat: 30.0444, lon: 31.2357, unit: C },
    CityInfo { name: "mexico city", lat: 19.4326, lon: -99.1332, unit: C },
    CityInfo { name: "toronto", lat: 43.6532, lon: -79.3832, unit: C },
    CityInfo { name: "berlin", lat: 52.52, lon: 13.405, unit: C },
    CityInfo { name: "moscow", lat: 55.7558, lon: 37.6173, unit: C },
    CityInfo { name: "dubai", lat: 25.2048, lon: 55.2708, unit: C },
    CityInfo { name: "singapore", lat: 1.3521, lon: 103.8198, unit: C },
    CityInfo { name: "bangkok", lat: 13.7563, lon: 100.5018, unit: C },
    CityInfo { name: "rio de janeiro", lat: -22.9068, lon: -43.1729, unit: C },
    CityInfo { name: "rio", lat: -22.9068, lon: -43.1729, unit: C },
    CityInfo { name: "istanbul", lat: 41.0082, lon: 28.9784, unit: C },
    CityInfo { name: "beijing", lat: 39.9042, lon: 116.4074, unit: C },
    CityInfo { name: "lagos", lat: 6.5244, lon: 3.3792, unit: C },
    CityInfo { name: "nairobi", lat: -1.2921, lon: 36.8219, unit: C },
    CityInfo { name: "lima", lat: -12.0464, lon: -77.0428, unit: C },
    CityInfo { name: "taipei", lat: 25.033, lon: 121.5654, unit: C },
    CityInfo { name: "hong kong", lat: 22.3193, lon: 114.1694, unit: C },
    CityInfo { name: "kuala lumpur", lat: 3.139, lon: 101.6869, unit: C },
    CityInfo { name: "jakarta", lat: -6.2088, lon: 106.8456, unit: C },
];

fn city_fallback_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:temperature|weather)\s+in\s+(.+?)\s+on\s").expect("city pattern")
    })
}

fn named_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"on\s+([a-z]+)\s+(\d{1,2})(?:,?\s*(\d{4}))?").expect("date pattern"))
}

fn iso_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("iso pattern"))
}

/// Resolve a known city from a market title. Returns the city name plus its
/// coordinates when recognized; an unrecognized "temperature in X on" city
/// yields the name alone (the market is listed but not analyzable).
pub fn extract_city(title: &str) -> (Option<String>, Option<CityInfo>) {
    let lower = title.to_lowercase();

    let mut best: Option<&CityInfo> = None;
    for city in CITIES {
        if lower.contains(city.name) && best.map_or(true, |b| city.name.len() > b.name.len()) {
            best = Some(city);
        }
    }
    if let Some(city) = best {
        return (Some(city.name.to_string()), Some(*city));
    }

    if let Some(cap) = city_fallback_pattern().captures(&lower) {
        let extracted = cap[1].trim().to_string();
        for city in CITIES {
            if extracted.contains(city.name) {
                return (Some(city.name.to_string()), Some(*city));
            }
        }
        return (Some(extracted), None);
    }

    (None, None)
}

fn month_number(name: &str) -> Option<u32> {
    Some(match name {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    })
}

/// Extract the target calendar date from a market title: either a natural
/// "on <Month> <Day>[, <Year>]" phrase (year defaults to the current one) or
/// an ISO `YYYY-MM-DD`.
pub fn extract_date(title: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = title.to_lowercase();

    if let Some(cap) = named_date_pattern().captures(&lower) {
        if let Some(month) = month_number(&cap[1]) {
            let day: u32 = cap[2].parse().ok()?;
            let year: i32 = match cap.get(3) {
                Some(y) => y.as_str().parse().ok()?,
                None => today.year(),
            };
            return NaiveDate::from_ymd_opt(year, month, day);
        }
    }

    if let Some(cap) = iso_date_pattern().captures(title) {
        let year: i32 = cap[1].parse().ok()?;
        let month: u32 = cap[2].parse().ok()?;
        let day: u32 = cap[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// Upstream fields arrive either as JSON arrays or as string-encoded JSON
/// arrays; decode both shapes.
fn decode_array(value: Option<&Value>) -> Option<Value> {
    match value {
        Some(Value::String(s)) => serde_json::from_str(s).ok(),
        Some(other) => Some(other.clone()),
        None => None,
    }
}

fn first_number(value: Option<&Value>) -> Option<f64> {
    match decode_array(value)?.as_array()?.first()? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn first_string(value: Option<&Value>) -> Option<String> {
    match decode_array(value)?.as_array()?.first()? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_raw_bucket(raw: &RawMarket) -> Option<Bucket> {
    let label_src = raw
        .group_item_title
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(raw.question.as_deref())
        .unwrap_or("");
    let parsed = parse_bucket_label(label_src)?;

    Some(Bucket {
        id: raw.id.clone().unwrap_or_default(),
        label: parsed.label,
        range: parsed.range,
        unit: parsed.unit,
        yes_price: first_number(raw.outcome_prices.as_ref()).unwrap_or(0.0),
        token_id: first_string(raw.clob_token_ids.as_ref()).unwrap_or_default(),
        active: raw.active != Some(false),
        closed: raw.closed == Some(true),
        accepting_orders: raw.accepting_orders != Some(false),
    })
}

/// Turn a raw event plus its child market records into a structured Market.
/// Events with zero parseable buckets are discarded. `today` is supplied by
/// the caller so resolution status stays a pure computation.
pub fn normalize_event(event: &RawEvent, today: NaiveDate) -> Option<Market> {
    let title = event.title.clone().unwrap_or_default();
    let (city, city_info) = extract_city(&title);
    let target_date = extract_date(&title, today);

    let mut buckets: Vec<Bucket> = event.markets.iter().filter_map(parse_raw_bucket).collect();
    if buckets.is_empty() {
        return None;
    }
    buckets.sort_by(|a, b| {
        a.range
            .sort_key()
            .partial_cmp(&b.range.sort_key())
            .unwrap_or(Ordering::Equal)
    });

    // Unit detected from bucket labels wins over the city's default.
    let detected_unit = buckets.iter().find_map(|b| b.unit);
    let temp_unit = detected_unit
        .or(city_info.map(|c| c.unit))
        .unwrap_or(TempUnit::Fahrenheit);

    let has_settled_bucket = buckets.iter().any(|b| b.yes_price >= SETTLED_BUCKET_PRICE);
    let is_past_date = target_date.map_or(false, |d| d < today);
    let all_closed =
        !event.markets.is_empty() && event.markets.iter().all(|m| m.closed == Some(true));
    let is_resolved =
        has_settled_bucket || is_past_date || all_closed || event.closed == Some(true);

    Some(Market {
        event_id: event.id.clone().unwrap_or_default(),
        title,
        slug: event.slug.clone().unwrap_or_default(),
        city,
        city_info,
        target_date,
        temp_unit,
        buckets,
        is_resolved,
        active: event.active != Some(false),
        volume: value_as_f64(event.volume.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 8).unwrap()
    }

    fn raw_market(id: &str, label: &str, yes_price: &str, closed: bool) -> RawMarket {
        RawMarket {
            id: Some(id.to_string()),
            question: None,
            group_item_title: Some(label.to_string()),
            outcome_prices: Some(json!(format!("[\"{}\", \"0.5\"]", yes_price))),
            clob_token_ids: Some(json!(format!("[\"tok-{}\", \"tok-{}-no\"]", id, id))),
            active: Some(true),
            closed: Some(closed),
            accepting_orders: Some(true),
        }
    }

    fn raw_event(title: &str, markets: Vec<RawMarket>) -> RawEvent {
        RawEvent {
            id: Some("evt-1".to_string()),
            title: Some(title.to_string()),
            slug: Some("slug".to_string()),
            description: None,
            active: Some(true),
            closed: Some(false),
            volume: Some(json!("12345.6")),
            markets,
        }
    }

    #[test]
    fn test_extract_city_longest_name_first() {
        let (city, info) = extract_city("Highest temperature in New York on February 10?");
        assert_eq!(city.as_deref(), Some("new york"));
        assert_eq!(info.unwrap().unit, TempUnit::Fahrenheit);
    }

    #[test]
    fn test_extract_city_fallback_pattern() {
        let (city, info) = extract_city("Temperature in Reykjavik on March 1?");
        assert_eq!(city.as_deref(), Some("reykjavik"));
        assert!(info.is_none());
    }

    #[test]
    fn test_extract_city_none() {
        let (city, info) = extract_city("Will it rain tomorrow?");
        assert!(city.is_none());
        assert!(info.is_none());
    }

    #[test]
    fn test_extract_date_named_month() {
        let date = extract_date("Highest temperature in NYC on February 10, 2026?", today());
        assert_eq!(date, Some(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()));
    }

    #[test]
    fn test_extract_date_defaults_to_current_year() {
        let date = extract_date("Highest temperature in NYC on February 10?", today());
        assert_eq!(date, Some(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()));
    }

    #[test]
    fn test_extract_date_abbreviated_month() {
        let date = extract_date("Highest temperature in NYC on Feb 10?", today());
        assert_eq!(date, Some(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()));
    }

    #[test]
    fn test_extract_date_iso() {
        let date = extract_date("NYC max temp 2026-02-10", today());
        assert_eq!(date, Some(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()));
    }

    #[test]
    fn test_normalize_sorts_buckets_and_decodes_prices() {
        let event = raw_event(
            "Highest temperature in New York on February 10?",
            vec![
                raw_market("b3", "79 or higher", "0.10", false),
                raw_market("b1", "74 or lower", "0.15", false),
                raw_market("b2", "75-78", "0.70", false),
            ],
        );

        let market = normalize_event(&event, today()).unwrap();
        let labels: Vec<&str> = market.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["74 or lower", "75-78", "79 or higher"]);
        assert!((market.buckets[0].yes_price - 0.15).abs() < 1e-9);
        assert_eq!(market.buckets[0].token_id, "tok-b1");
        assert!((market.volume - 12345.6).abs() < 1e-9);
        assert!(!market.is_resolved);
    }

    #[test]
    fn test_normalize_discards_event_without_parseable_buckets() {
        let event = raw_event(
            "Highest temperature in New York on February 10?",
            vec![raw_market("b1", "scorching hot", "0.5", false)],
        );
        assert!(normalize_event(&event, today()).is_none());
    }

    #[test]
    fn test_bucket_unit_overrides_city_default() {
        // New York defaults to fahrenheit; an explicit °C label wins.
        let event = raw_event(
            "Highest temperature in New York on February 10?",
            vec![raw_market("b1", "15°C", "0.5", false)],
        );
        let market = normalize_event(&event, today()).unwrap();
        assert_eq!(market.temp_unit, TempUnit::Celsius);
    }

    #[test]
    fn test_resolved_by_settled_bucket() {
        let event = raw_event(
            "Highest temperature in New York on February 10?",
            vec![
                raw_market("b1", "74 or lower", "0.96", false),
                raw_market("b2", "75 or higher", "0.01", false),
            ],
        );
        assert!(normalize_event(&event, today()).unwrap().is_resolved);
    }

    #[test]
    fn test_resolved_by_past_date() {
        let event = raw_event(
            "Highest temperature in New York on February 7?",
            vec![raw_market("b1", "74 or lower", "0.40", false)],
        );
        assert!(normalize_event(&event, today()).unwrap().is_resolved);
    }

    #[test]
    fn test_resolved_when_all_contracts_closed() {
        let event = raw_event(
            "Highest temperature in New York on February 10?",
            vec![
                raw_market("b1", "74 or lower", "0.40", true),
                raw_market("b2", "75 or higher", "0.60", true),
            ],
        );
        assert!(normalize_event(&event, today()).unwrap().is_resolved);
    }
}

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::data::http::JsonFetcher;

/// Raw child market/contract record as returned by the market listing API.
/// Price and token-id fields may be string-encoded JSON arrays.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMarket {
    pub id: Option<String>,
    pub question: Option<String>,
    pub group_item_title: Option<String>,
    pub outcome_prices: Option<Value>,
    pub clob_token_ids: Option<Value>,
    pub active: Option<bool>,
    pub closed: Option<bool>,
    pub accepting_orders: Option<bool>,
}

/// Raw event record grouping the bucket contracts of one market.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
    pub closed: Option<bool>,
    pub volume: Option<Value>,
    pub markets: Vec<RawMarket>,
}

pub struct GammaApiClient {
    fetcher: Arc<dyn JsonFetcher>,
    base_url: String,
}

impl GammaApiClient {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, base_url: String) -> Self {
        Self { fetcher, base_url }
    }

    /// Discover active weather events: tag and text searches first, then a
    /// broad pagination sweep with a client-side filter when those come up
    /// short. A failed query is logged and skipped; it never fails the scan.
    pub async fn fetch_weather_events(&self) -> Result<Vec<RawEvent>> {
        let mut events: Vec<RawEvent> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let search_urls = [
            format!("{}/events?limit=100&active=true&closed=false&tag=temperature", self.base_url),
            format!("{}/events?limit=100&active=true&closed=false&tag=weather", self.base_url),
            format!("{}/events?limit=100&active=true&closed=false&slug=temperature", self.base_url),
            format!("{}/events?limit=100&active=true&closed=false&_q=temperature", self.base_url),
        ];

        for url in &search_urls {
            match self.fetcher.get_json(url).await {
                Ok(data) => collect_weather_events(&data, &mut events, &mut seen),
                Err(e) => warn!("event search failed: {e:#}"),
            }
        }

        if events.len() < 3 {
            for offset in (0..=400).step_by(100) {
                let url = format!(
                    "{}/events?limit=100&offset={}&active=true&closed=false&order=volume24hr&ascending=false",
                    self.base_url, offset
                );
                match self.fetcher.get_json(&url).await {
                    Ok(data) => {
                        let page = normalize_event_response(&data);
                        let page_len = page.len();
                        for event in page {
                            insert_if_weather(event, &mut events, &mut seen);
                        }
                        if page_len < 100 {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("broad event search at offset {} failed: {e:#}", offset);
                        break;
                    }
                }
            }
        }

        // Some listings omit child markets; fill those in per event.
        for event in events.iter_mut() {
            if !event.markets.is_empty() {
                continue;
            }
            let Some(id) = event.id.as_deref() else { continue };
            let url = format!("{}/events/{}", self.base_url, id);
            match self.fetcher.get_json(&url).await {
                Ok(data) => {
                    if let Ok(full) = serde_json::from_value::<RawEvent>(data) {
                        event.markets = full.markets;
                    }
                }
                Err(e) => debug!("market fill-in for event {} failed: {e:#}", id),
            }
        }

        Ok(events)
    }
}

fn collect_weather_events(data: &Value, events: &mut Vec<RawEvent>, seen: &mut HashSet<String>) {
    for event in normalize_event_response(data) {
        insert_if_weather(event, events, seen);
    }
}

fn insert_if_weather(event: RawEvent, events: &mut Vec<RawEvent>, seen: &mut HashSet<String>) {
    if !is_weather_event(&event) {
        return;
    }
    let Some(id) = event.id.clone() else { return };
    if seen.insert(id) {
        events.push(event);
    }
}

/// The listing endpoint answers in several envelope shapes; accept a bare
/// array or any of the known wrapper keys.
fn normalize_event_response(data: &Value) -> Vec<RawEvent> {
    let items = if data.is_array() {
        Some(data)
    } else {
        ["data", "events", "results"].iter().map(|k| &data[*k]).find(|v| v.is_array())
    };

    match items {
        Some(array) => serde_json::from_value(array.clone()).unwrap_or_default(),
        None => Vec::new(),
    }
}

fn is_weather_event(event: &RawEvent) -> bool {
    let text = format!(
        "{} {} {}",
        event.title.as_deref().unwrap_or(""),
        event.slug.as_deref().unwrap_or(""),
        event.description.as_deref().unwrap_or("")
    )
    .to_lowercase();

    text.contains("temperature")
        || (text.contains("weather")
            && (text.contains("°f") || text.contains("°c") || text.contains("degree")))
        || text.contains("highest temp")
        || text.contains("lowest temp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_event_response_shapes() {
        let bare = json!([{"id": "1", "title": "Highest temperature in NYC on Feb 10?"}]);
        assert_eq!(normalize_event_response(&bare).len(), 1);

        let wrapped = json!({"data": [{"id": "1", "title": "t"}]});
        assert_eq!(normalize_event_response(&wrapped).len(), 1);

        let events_key = json!({"events": [{"id": "1"}, {"id": "2"}]});
        assert_eq!(normalize_event_response(&events_key).len(), 2);

        assert!(normalize_event_response(&json!({"unexpected": true})).is_empty());
    }

    #[test]
    fn test_is_weather_event() {
        let temp = RawEvent {
            title: Some("Highest temperature in London on March 3?".to_string()),
            ..Default::default()
        };
        assert!(is_weather_event(&temp));

        let weather_with_degrees = RawEvent {
            title: Some("London weather: above 20°C?".to_string()),
            ..Default::default()
        };
        assert!(is_weather_event(&weather_with_degrees));

        let unrelated = RawEvent {
            title: Some("Who wins the election?".to_string()),
            ..Default::default()
        };
        assert!(!is_weather_event(&unrelated));
    }
}

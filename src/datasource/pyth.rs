//! Pyth Hermes price source.

use super::{ChainError, PriceSource};
use crate::domain::{normalize_feed_id, PriceFeed};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HermesPriceSource {
    client: Client,
    base_url: String,
}

impl HermesPriceSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestUpdates {
    #[serde(default)]
    parsed: Vec<ParsedUpdate>,
}

#[derive(Debug, Deserialize)]
struct ParsedUpdate {
    id: String,
    price: RawPrice,
}

/// Hermes sends integers as strings.
#[derive(Debug, Deserialize)]
struct RawPrice {
    price: String,
    conf: String,
    expo: i32,
    publish_time: i64,
}

impl ParsedUpdate {
    fn into_feed(self) -> Result<PriceFeed, ChainError> {
        let price = self
            .price
            .price
            .parse::<i64>()
            .map_err(|e| ChainError::ParseError(format!("price of {}: {}", self.id, e)))?;
        let conf = self
            .price
            .conf
            .parse::<u64>()
            .map_err(|e| ChainError::ParseError(format!("conf of {}: {}", self.id, e)))?;
        Ok(PriceFeed {
            id: normalize_feed_id(&self.id),
            price,
            conf,
            expo: self.price.expo,
            publish_time: self.price.publish_time,
        })
    }
}

fn parse_updates(body: &str) -> Result<Vec<PriceFeed>, ChainError> {
    let updates: LatestUpdates =
        serde_json::from_str(body).map_err(|e| ChainError::ParseError(e.to_string()))?;
    updates.parsed.into_iter().map(ParsedUpdate::into_feed).collect()
}

#[async_trait]
impl PriceSource for HermesPriceSource {
    async fn latest_feeds(&self, ids: &[String]) -> Result<Vec<PriceFeed>, ChainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/v2/updates/price/latest", self.base_url);
        let mut query: Vec<(&str, String)> = ids
            .iter()
            .map(|id| ("ids[]", format!("0x{}", normalize_feed_id(id))))
            .collect();
        query.push(("parsed", "true".to_string()));

        debug!(feeds = ids.len(), "Fetching price feeds");
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ChainError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == 429 {
            return Err(ChainError::RateLimited);
        }
        if !status.is_success() {
            return Err(ChainError::HttpError {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChainError::NetworkError(e.to_string()))?;
        parse_updates(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hermes_response() {
        let body = r#"{
            "binary": { "encoding": "hex", "data": [] },
            "parsed": [{
                "id": "EAA020C61CC479712813461CE153894A96A6C00B21ED0CFC2798D1F9A9E9C94A",
                "price": { "price": "99985000", "conf": "73010", "expo": -8, "publish_time": 1718000000 },
                "ema_price": { "price": "99990000", "conf": "70000", "expo": -8, "publish_time": 1718000000 }
            }]
        }"#;
        let feeds = parse_updates(body).unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(
            feeds[0].id,
            "eaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a"
        );
        assert_eq!(feeds[0].price, 99_985_000);
        assert_eq!(feeds[0].conf, 73_010);
        assert_eq!(feeds[0].expo, -8);
    }

    #[test]
    fn test_parse_rejects_non_numeric_price() {
        let body = r#"{"parsed": [{"id": "aa", "price": {"price": "x", "conf": "1", "expo": -8, "publish_time": 0}}]}"#;
        assert!(matches!(parse_updates(body), Err(ChainError::ParseError(_))));
    }
}

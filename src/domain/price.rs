//! USD price feed observations.

use serde::{Deserialize, Serialize};

/// A parsed price update: the value is `price * 10^expo` USD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFeed {
    /// Hex feed id without `0x` prefix, lowercase.
    pub id: String,
    pub price: i64,
    pub conf: u64,
    pub expo: i32,
    pub publish_time: i64,
}

/// Normalizes a feed id to lowercase hex without a `0x` prefix.
pub fn normalize_feed_id(id: &str) -> String {
    id.trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .to_ascii_lowercase()
}

//! Pools and token pairs that earn points, as configured by the operator.

use super::primitives::{serde_u128, Address, Signature, UnixSeconds};
use serde::{Deserialize, Serialize};

/// A pool whose liquidity providers earn points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotedPool {
    pub address: Address,
    /// Account whose transactions carry the pool's position events.
    /// Falls back to the pool address.
    #[serde(default)]
    pub event_account: Option<Address>,
    #[serde(with = "serde_u128")]
    pub points_per_second: u128,
    /// The pool earns nothing before this time.
    #[serde(default)]
    pub start_timestamp: UnixSeconds,
}

impl PromotedPool {
    pub fn event_account(&self) -> Address {
        self.event_account.unwrap_or(self.address)
    }

    pub fn is_live(&self, now: UnixSeconds) -> bool {
        self.start_timestamp <= now
    }
}

/// A token pair whose swaps earn points, with the price feeds of both tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotedPair {
    pub token_x: Address,
    pub token_y: Address,
    pub x_decimal: u8,
    pub y_decimal: u8,
    pub feed_x_id: String,
    pub feed_y_id: String,
    /// Swaps before this signature are never walked.
    #[serde(default)]
    pub start_signature: Option<Signature>,
    /// One pool account per fee tier of the pair.
    pub fee_tier_accounts: Vec<Address>,
}

impl PromotedPair {
    pub fn matches(&self, token_x: &Address, token_y: &Address) -> bool {
        &self.token_x == token_x && &self.token_y == token_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_event_account_defaults_to_pool() {
        let json = format!(
            r#"{{"address": "{}", "pointsPerSecond": "1000"}}"#,
            Address::new([1u8; 32])
        );
        let pool: PromotedPool = serde_json::from_str(&json).unwrap();
        assert_eq!(pool.event_account(), pool.address);
        assert_eq!(pool.points_per_second, 1000);
        assert!(pool.is_live(0));
    }

    #[test]
    fn test_pair_from_json() {
        let json = format!(
            r#"{{"tokenX": "{}", "tokenY": "{}", "xDecimal": 6, "yDecimal": 9,
                "feedXId": "0xaa", "feedYId": "bb", "feeTierAccounts": ["{}"]}}"#,
            Address::new([1u8; 32]),
            Address::new([2u8; 32]),
            Address::new([3u8; 32])
        );
        let pair: PromotedPair = serde_json::from_str(&json).unwrap();
        assert_eq!(pair.x_decimal, 6);
        assert!(pair.start_signature.is_none());
        assert_eq!(pair.fee_tier_accounts.len(), 1);
    }
}

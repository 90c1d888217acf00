//! Protocol events emitted by the swap program and recovered from transaction logs.

use super::primitives::{serde_u128, Address, PositionKey, UnixSeconds};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// A liquidity position as seen by one create or remove event.
///
/// `seconds_per_liquidity_inside_initial` is the position's inside counter at
/// `current_timestamp`: logged directly by a create, derived from the tick and
/// pool counters a remove logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEvent {
    pub owner: Address,
    pub pool: Address,
    #[serde(with = "serde_u128")]
    pub id: u128,
    #[serde(with = "serde_u128")]
    pub liquidity: u128,
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub current_timestamp: UnixSeconds,
    #[serde(with = "serde_u128")]
    pub seconds_per_liquidity_inside_initial: u128,
}

impl PositionEvent {
    pub fn key(&self) -> PositionKey {
        PositionKey {
            pool: self.pool,
            id: self.id,
        }
    }
}

// On-chain layouts. Field order is the borsh wire order.

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CreatePositionEvent {
    pub owner: Address,
    pub pool: Address,
    pub id: u128,
    pub liquidity: u128,
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub current_timestamp: u64,
    pub seconds_per_liquidity_inside_initial: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RemovePositionEvent {
    pub owner: Address,
    pub pool: Address,
    pub id: u128,
    pub liquidity: u128,
    pub upper_tick: i32,
    pub current_tick: i32,
    pub lower_tick: i32,
    pub upper_tick_seconds_per_liquidity_outside: u128,
    pub lower_tick_seconds_per_liquidity_outside: u128,
    pub pool_seconds_per_liquidity_global: u128,
    pub current_timestamp: u64,
}

impl From<CreatePositionEvent> for PositionEvent {
    fn from(e: CreatePositionEvent) -> Self {
        PositionEvent {
            owner: e.owner,
            pool: e.pool,
            id: e.id,
            liquidity: e.liquidity,
            lower_tick: e.lower_tick,
            upper_tick: e.upper_tick,
            current_timestamp: e.current_timestamp,
            seconds_per_liquidity_inside_initial: e.seconds_per_liquidity_inside_initial,
        }
    }
}

/// A swap against a pool. Only the fields used for point accounting are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    pub swapper: Address,
    pub token_x: Address,
    pub token_y: Address,
    pub x_to_y: bool,
    /// Fee charged in the input token's base units.
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    CreatePosition(PositionEvent),
    RemovePosition(PositionEvent),
    Swap(SwapEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_event_json_uses_decimal_strings() {
        let event = PositionEvent {
            owner: Address::new([1u8; 32]),
            pool: Address::new([2u8; 32]),
            id: u128::MAX,
            liquidity: 10,
            lower_tick: -10,
            upper_tick: 10,
            current_timestamp: 1000,
            seconds_per_liquidity_inside_initial: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], u128::MAX.to_string());
        assert_eq!(json["lowerTick"], -10);

        let back: PositionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}

//! JSON form of a points ledger, used for exports and the leaderboard feed.
//!
//! ```json
//! { "<address>": { "totalPoints": "123", "positionsAmount": 2,
//!                  "points24HoursHistory": [{ "timestamp": 1700000000, "diff": "5" }] } }
//! ```
//!
//! Point values are decimal strings so 128-bit totals survive JSON readers
//! that parse numbers as doubles. The count key is variant specific.

use super::{CodecError, HistoryEntry, LedgerVariant, PointsEntry, PointsLedger};
use crate::domain::Address;
use serde_json::{json, Map, Value};

const TOTAL_POINTS: &str = "totalPoints";
const HISTORY: &str = "points24HoursHistory";

impl<V: LedgerVariant> PointsLedger<V> {
    pub fn to_json_value(&self) -> Result<Value, CodecError> {
        self.validate()?;

        let mut root = Map::with_capacity(self.len());
        for (address, entry) in self.iter() {
            let history: Vec<Value> = entry
                .history
                .iter()
                .map(|h| json!({ "timestamp": h.timestamp, "diff": h.diff.to_string() }))
                .collect();

            let mut object = Map::new();
            object.insert(TOTAL_POINTS.into(), Value::String(entry.total_points.to_string()));
            object.insert(V::AMOUNT_FIELD.into(), Value::from(entry.amount));
            object.insert(HISTORY.into(), Value::Array(history));
            root.insert(address.to_base58(), Value::Object(object));
        }
        Ok(Value::Object(root))
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&self.to_json_value()?)?)
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &Value) -> Result<Self, CodecError> {
        let root = value.as_object().ok_or_else(|| invalid("ledger", value))?;

        let mut ledger = Self::new();
        for (key, item) in root {
            let address: Address = key.parse()?;
            let object = item.as_object().ok_or_else(|| invalid("entry", item))?;

            let total_points = decimal_field(object, TOTAL_POINTS)?;
            let amount = object
                .get(V::AMOUNT_FIELD)
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| invalid(V::AMOUNT_FIELD, object.get(V::AMOUNT_FIELD).unwrap_or(&Value::Null)))?;

            let mut history = Vec::new();
            if let Some(items) = object.get(HISTORY) {
                let items = items.as_array().ok_or_else(|| invalid(HISTORY, items))?;
                for h in items {
                    let h = h.as_object().ok_or_else(|| invalid(HISTORY, h))?;
                    let timestamp = h
                        .get("timestamp")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| invalid("timestamp", h.get("timestamp").unwrap_or(&Value::Null)))?;
                    let diff = decimal_field(h, "diff")?;
                    history.push(HistoryEntry { timestamp, diff });
                }
            }

            ledger.insert(
                address,
                PointsEntry {
                    total_points,
                    amount,
                    history,
                },
            );
        }

        ledger.validate()?;
        Ok(ledger)
    }
}

/// Accepts a decimal string or a non-negative JSON integer.
fn decimal_field(object: &Map<String, Value>, field: &'static str) -> Result<u128, CodecError> {
    match object.get(field) {
        Some(Value::String(s)) => s.parse::<u128>().map_err(|_| CodecError::InvalidNumber {
            field,
            value: s.clone(),
        }),
        Some(Value::Number(n)) => n.as_u64().map(u128::from).ok_or_else(|| CodecError::InvalidNumber {
            field,
            value: n.to_string(),
        }),
        other => Err(invalid(field, other.unwrap_or(&Value::Null))),
    }
}

fn invalid(field: &'static str, value: &Value) -> CodecError {
    CodecError::InvalidNumber {
        field,
        value: value.to_string(),
    }
}

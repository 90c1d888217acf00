//! JSON-RPC chain reader.

use super::accounts::{parse_pool, parse_tick, tick_discriminator, tick_layout};
use super::{ChainError, ChainReader};
use crate::domain::{Address, PoolState, Signature};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Largest page `getSignaturesForAddress` serves.
const SIGNATURE_PAGE_LIMIT: usize = 1_000;
const COMMITMENT: &str = "confirmed";

/// Chain reader backed by a JSON-RPC node.
#[derive(Debug, Clone)]
pub struct RpcChainReader {
    client: Client,
    url: String,
    program_id: Address,
}

impl RpcChainReader {
    pub fn new(url: String, program_id: Address) -> Self {
        Self {
            client: Client::new(),
            url,
            program_id,
        }
    }

    fn request(id: usize, method: &str, params: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
    }

    async fn send(&self, body: &Value) -> Result<Value, ChainError> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
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

        response
            .json::<Value>()
            .await
            .map_err(|e| ChainError::ParseError(e.to_string()))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let response = self.send(&Self::request(1, method, params)).await?;
        take_result(response)
    }

    async fn list_ticks(&self, pool: &Address) -> Result<HashMap<i32, u128>, ChainError> {
        let params = json!([
            self.program_id.to_base58(),
            {
                "encoding": "base64",
                "commitment": COMMITMENT,
                "filters": [
                    { "dataSize": tick_layout::LEN },
                    { "memcmp": { "offset": 0, "bytes": bs58::encode(tick_discriminator()).into_string() } },
                    { "memcmp": { "offset": tick_layout::POOL, "bytes": pool.to_base58() } }
                ]
            }
        ]);
        let result = self.call("getProgramAccounts", params).await?;
        let accounts = result
            .as_array()
            .ok_or_else(|| ChainError::ParseError("Expected array of program accounts".to_string()))?;

        let mut ticks = HashMap::with_capacity(accounts.len());
        for item in accounts {
            let address: Address = item
                .get("pubkey")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ChainError::ParseError("Program account without pubkey".to_string()))?;
            let data = account_data(&address, item.get("account"))?;
            let tick = parse_tick(&address, &data)?;
            if tick.pool != *pool {
                warn!(tick = %address, pool = %pool, "Tick belongs to another pool, skipping");
                continue;
            }
            ticks.insert(tick.index, tick.seconds_per_liquidity_outside);
        }
        Ok(ticks)
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn list_signatures(
        &self,
        account: &Address,
        before: Option<&Signature>,
        until: Option<&Signature>,
    ) -> Result<Vec<Signature>, ChainError> {
        let mut options = json!({ "limit": SIGNATURE_PAGE_LIMIT, "commitment": COMMITMENT });
        if let Some(before) = before {
            options["before"] = json!(before.as_str());
        }
        if let Some(until) = until {
            options["until"] = json!(until.as_str());
        }

        let result = self
            .call("getSignaturesForAddress", json!([account.to_base58(), options]))
            .await?;
        let items = result
            .as_array()
            .ok_or_else(|| ChainError::ParseError("Expected array of signatures".to_string()))?;

        items
            .iter()
            .map(|item| {
                item.get("signature")
                    .and_then(Value::as_str)
                    .map(Signature::new)
                    .ok_or_else(|| ChainError::ParseError("Signature entry without signature".to_string()))
            })
            .collect()
    }

    async fn latest_signature(&self, account: &Address) -> Result<Option<Signature>, ChainError> {
        let result = self
            .call(
                "getSignaturesForAddress",
                json!([account.to_base58(), { "limit": 1, "commitment": COMMITMENT }]),
            )
            .await?;
        Ok(result
            .get(0)
            .and_then(|item| item.get("signature"))
            .and_then(Value::as_str)
            .map(Signature::new))
    }

    async fn fetch_transaction_logs(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Vec<String>>, ChainError> {
        if signatures.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = signatures.len(), "Fetching transaction logs");

        let batch: Vec<Value> = signatures
            .iter()
            .enumerate()
            .map(|(id, sig)| {
                Self::request(
                    id,
                    "getTransaction",
                    json!([sig.as_str(), {
                        "encoding": "json",
                        "commitment": COMMITMENT,
                        "maxSupportedTransactionVersion": 0
                    }]),
                )
            })
            .collect();

        let response = self.send(&Value::Array(batch)).await?;
        let items = match response {
            Value::Array(items) => items,
            // Some nodes answer a failed batch with a single error object.
            other => {
                take_result(other)?;
                return Err(ChainError::ParseError("Expected batch response array".to_string()));
            }
        };

        let mut by_id: HashMap<usize, Value> = HashMap::with_capacity(items.len());
        for item in items {
            let id = item
                .get("id")
                .and_then(Value::as_u64)
                .ok_or_else(|| ChainError::ParseError("Batch response without id".to_string()))?;
            by_id.insert(id as usize, item);
        }

        let mut logs = Vec::with_capacity(signatures.len());
        for (id, sig) in signatures.iter().enumerate() {
            let item = by_id
                .remove(&id)
                .ok_or_else(|| ChainError::ParseError(format!("No response for transaction {}", sig)))?;
            let result = take_result(item)?;
            if result.is_null() {
                // Not yet visible at this commitment; the node may catch up.
                return Err(ChainError::RpcError {
                    code: -32004,
                    message: format!("transaction {} not available", sig),
                });
            }
            let lines = result
                .pointer("/meta/logMessages")
                .and_then(Value::as_array)
                .map(|lines| {
                    lines
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            logs.push(lines);
        }
        Ok(logs)
    }

    async fn fetch_pool_state(&self, pool: &Address) -> Result<PoolState, ChainError> {
        let result = self
            .call(
                "getAccountInfo",
                json!([pool.to_base58(), { "encoding": "base64", "commitment": COMMITMENT }]),
            )
            .await?;
        let value = result.get("value").filter(|v| !v.is_null()).ok_or(ChainError::AccountNotFound(*pool))?;
        let data = account_data(pool, Some(value))?;
        let account = parse_pool(pool, &data)?;

        let ticks = self.list_ticks(pool).await?;
        debug!(pool = %pool, ticks = ticks.len(), "Fetched pool state");

        Ok(PoolState {
            address: *pool,
            liquidity: account.liquidity,
            current_tick: account.current_tick_index,
            seconds_per_liquidity_global: account.seconds_per_liquidity_global,
            last_timestamp: account.last_timestamp,
            ticks,
        })
    }
}

/// Unwraps a JSON-RPC response into its `result`, mapping `error` objects.
fn take_result(mut response: Value) -> Result<Value, ChainError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(ChainError::RpcError { code, message });
    }
    response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| ChainError::ParseError("Response without result".to_string()))
}

/// Decodes `{"data": ["<base64>", "base64"], ...}`.
fn account_data(account: &Address, value: Option<&Value>) -> Result<Vec<u8>, ChainError> {
    let encoded = value
        .and_then(|v| v.get("data"))
        .and_then(|d| d.get(0))
        .and_then(Value::as_str)
        .ok_or_else(|| ChainError::InvalidAccountData {
            account: *account,
            reason: "missing base64 data".to_string(),
        })?;
    STANDARD.decode(encoded).map_err(|e| ChainError::InvalidAccountData {
        account: *account,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::accounts::tests::pool_bytes;

    #[test]
    fn test_take_result_maps_rpc_error() {
        let response = json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32005, "message": "Node is behind" } });
        assert_eq!(
            take_result(response),
            Err(ChainError::RpcError {
                code: -32005,
                message: "Node is behind".to_string()
            })
        );
    }

    #[test]
    fn test_take_result_returns_result() {
        let response = json!({ "jsonrpc": "2.0", "id": 1, "result": [1, 2] });
        assert_eq!(take_result(response).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_account_data_decodes_base64() {
        let account = Address::new([1u8; 32]);
        let bytes = pool_bytes(10, 0, 0, 0);
        let value = json!({ "data": [STANDARD.encode(&bytes), "base64"], "owner": "x" });
        assert_eq!(account_data(&account, Some(&value)).unwrap(), bytes);
        assert!(account_data(&account, Some(&json!({}))).is_err());
    }
}

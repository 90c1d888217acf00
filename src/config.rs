use crate::domain::{Address, PromotedPair, PromotedPool, Signature};
use crate::retry::RetryPolicy;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HERMES_URL: &str = "https://hermes.pyth.network";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub rpc_url: String,
    pub program_id: Address,
    pub hermes_url: String,
    pub promoted_pools: Vec<PromotedPool>,
    pub promoted_pairs: Vec<PromotedPair>,
    pub swap_blacklist: HashSet<Address>,
    /// Lower bound for the first walk of an account without a checkpoint.
    pub full_snapshot_start: Option<Signature>,
    pub retry: RetryPolicy,
    pub max_signatures_per_call: usize,
    /// Largest accepted `conf / price`, in percent.
    pub max_confidence_percentage: Decimal,
    pub points_per_usd: u128,
    pub summary_path: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Cannot read {0}: {1}")]
    UnreadableFile(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = required(&env_map, "DATABASE_PATH")?;
        let rpc_url = required(&env_map, "RPC_URL")?;
        let program_id = parse_value::<Address>(&env_map, "PROGRAM_ID", None)?;

        let hermes_url = env_map
            .get("HERMES_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HERMES_URL.to_string());

        let promoted_pools: Vec<PromotedPool> = read_json_file(&env_map, "PROMOTED_POOLS_FILE")?;
        let promoted_pairs: Vec<PromotedPair> = read_json_file(&env_map, "PROMOTED_PAIRS_FILE")?;
        let swap_blacklist = parse_blacklist_from_map(&env_map)?;

        let full_snapshot_start = env_map
            .get("FULL_SNAP_START_SIGNATURE")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(Signature::new);

        let max_retries = parse_value::<u32>(&env_map, "MAX_RETRIES", Some("3"))?;
        let retry_delay_ms = parse_value::<u64>(&env_map, "RETRY_DELAY_MS", Some("1000"))?;

        let max_signatures_per_call =
            parse_value::<usize>(&env_map, "MAX_SIGNATURES_PER_CALL", Some("100"))?;
        if max_signatures_per_call == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_SIGNATURES_PER_CALL".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let max_confidence_percentage =
            parse_value::<Decimal>(&env_map, "MAX_CONFIDENCE_PERCENTAGE", Some("1"))?;
        if max_confidence_percentage.is_sign_negative() {
            return Err(ConfigError::InvalidValue(
                "MAX_CONFIDENCE_PERCENTAGE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let points_per_usd = parse_value::<u128>(&env_map, "POINTS_PER_USD", Some("1000"))?;
        let summary_path = env_map.get("SUMMARY_PATH").cloned();

        Ok(Config {
            database_path,
            rpc_url,
            program_id,
            hermes_url,
            promoted_pools,
            promoted_pairs,
            swap_blacklist,
            full_snapshot_start,
            retry: RetryPolicy::new(max_retries, Duration::from_millis(retry_delay_ms)),
            max_signatures_per_call,
            max_confidence_percentage,
            points_per_usd,
            summary_path,
        })
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

/// Parses `key`, falling back to `default`. A missing key without default is an error.
fn parse_value<T>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Option<&str>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = match (env_map.get(key), default) {
        (Some(value), _) => value.as_str(),
        (None, Some(default)) => default,
        (None, None) => return Err(ConfigError::MissingEnv(key.to_string())),
    };
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

/// Reads a JSON list from the file named by `key`. An unset key yields an empty list.
fn read_json_file<T: serde::de::DeserializeOwned>(
    env_map: &HashMap<String, String>,
    key: &str,
) -> Result<Vec<T>, ConfigError> {
    let Some(path) = env_map.get(key) else {
        return Ok(Vec::new());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::UnreadableFile(path.clone(), e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn parse_blacklist_from_map(
    env_map: &HashMap<String, String>,
) -> Result<HashSet<Address>, ConfigError> {
    let (key, entries): (&str, Vec<String>) = if let Some(list) = env_map.get("SWAP_BLACKLIST") {
        (
            "SWAP_BLACKLIST",
            list.split(',').map(|s| s.trim().to_string()).collect(),
        )
    } else if let Some(file_path) = env_map.get("SWAP_BLACKLIST_FILE") {
        let content = std::fs::read_to_string(file_path)
            .map_err(|e| ConfigError::UnreadableFile(file_path.clone(), e.to_string()))?;
        (
            "SWAP_BLACKLIST_FILE",
            content.lines().map(|line| line.trim().to_string()).collect(),
        )
    } else {
        return Ok(HashSet::new());
    };

    entries
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Address>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
        })
        .collect()
}

//! Pool and tick account layouts.
//!
//! Accounts are Anchor zero-copy structs: an 8-byte discriminator followed by
//! packed little-endian fields. Only the fields needed for accrual are read.

use super::decode::discriminator;
use super::ChainError;
use crate::domain::primitives::ADDRESS_LEN;
use crate::domain::Address;

pub const ACCOUNT_DISCRIMINATOR_LEN: usize = 8;

/// Byte offsets within a pool account, discriminator included.
pub mod pool_layout {
    pub const TOKEN_X: usize = 8;
    pub const TOKEN_Y: usize = 40;
    pub const LIQUIDITY: usize = 186;
    pub const CURRENT_TICK_INDEX: usize = 218;
    pub const SECONDS_PER_LIQUIDITY_GLOBAL: usize = 302;
    pub const START_TIMESTAMP: usize = 318;
    pub const LAST_TIMESTAMP: usize = 326;
    pub const LEN: usize = 400;
}

/// Byte offsets within a tick account, discriminator included.
pub mod tick_layout {
    pub const POOL: usize = 8;
    pub const INDEX: usize = 40;
    pub const SECONDS_PER_LIQUIDITY_OUTSIDE: usize = 125;
    pub const LEN: usize = 142;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolAccount {
    pub token_x: Address,
    pub token_y: Address,
    pub liquidity: u128,
    pub current_tick_index: i32,
    pub seconds_per_liquidity_global: u128,
    pub start_timestamp: u64,
    pub last_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickAccount {
    pub pool: Address,
    pub index: i32,
    pub seconds_per_liquidity_outside: u128,
}

pub fn pool_discriminator() -> [u8; 8] {
    discriminator("account", "Pool")
}

pub fn tick_discriminator() -> [u8; 8] {
    discriminator("account", "Tick")
}

pub fn parse_pool(account: &Address, data: &[u8]) -> Result<PoolAccount, ChainError> {
    let data = AccountData::new(account, data, &pool_discriminator(), pool_layout::LEN)?;
    Ok(PoolAccount {
        token_x: data.address(pool_layout::TOKEN_X),
        token_y: data.address(pool_layout::TOKEN_Y),
        liquidity: data.u128(pool_layout::LIQUIDITY),
        current_tick_index: data.i32(pool_layout::CURRENT_TICK_INDEX),
        seconds_per_liquidity_global: data.u128(pool_layout::SECONDS_PER_LIQUIDITY_GLOBAL),
        start_timestamp: data.u64(pool_layout::START_TIMESTAMP),
        last_timestamp: data.u64(pool_layout::LAST_TIMESTAMP),
    })
}

pub fn parse_tick(account: &Address, data: &[u8]) -> Result<TickAccount, ChainError> {
    let data = AccountData::new(account, data, &tick_discriminator(), tick_layout::LEN)?;
    Ok(TickAccount {
        pool: data.address(tick_layout::POOL),
        index: data.i32(tick_layout::INDEX),
        seconds_per_liquidity_outside: data.u128(tick_layout::SECONDS_PER_LIQUIDITY_OUTSIDE),
    })
}

/// Account bytes whose length and discriminator were checked up front, so
/// field reads at fixed offsets stay in bounds.
struct AccountData<'a> {
    bytes: &'a [u8],
}

impl<'a> AccountData<'a> {
    fn new(
        account: &Address,
        bytes: &'a [u8],
        expected: &[u8; 8],
        min_len: usize,
    ) -> Result<Self, ChainError> {
        if bytes.len() < min_len {
            return Err(ChainError::InvalidAccountData {
                account: *account,
                reason: format!("{} bytes, expected at least {}", bytes.len(), min_len),
            });
        }
        if &bytes[..ACCOUNT_DISCRIMINATOR_LEN] != expected {
            return Err(ChainError::InvalidAccountData {
                account: *account,
                reason: "discriminator mismatch".to_string(),
            });
        }
        Ok(Self { bytes })
    }

    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        out
    }

    fn address(&self, offset: usize) -> Address {
        Address::new(self.array::<ADDRESS_LEN>(offset))
    }

    fn u128(&self, offset: usize) -> u128 {
        u128::from_le_bytes(self.array(offset))
    }

    fn u64(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.array(offset))
    }

    fn i32(&self, offset: usize) -> i32 {
        i32::from_le_bytes(self.array(offset))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn pool_bytes(liquidity: u128, tick: i32, global: u128, last: u64) -> Vec<u8> {
        let mut data = vec![0u8; pool_layout::LEN];
        data[..8].copy_from_slice(&pool_discriminator());
        data[pool_layout::TOKEN_X..pool_layout::TOKEN_X + 32].copy_from_slice(&[7u8; 32]);
        data[pool_layout::LIQUIDITY..pool_layout::LIQUIDITY + 16].copy_from_slice(&liquidity.to_le_bytes());
        data[pool_layout::CURRENT_TICK_INDEX..pool_layout::CURRENT_TICK_INDEX + 4]
            .copy_from_slice(&tick.to_le_bytes());
        data[pool_layout::SECONDS_PER_LIQUIDITY_GLOBAL..pool_layout::SECONDS_PER_LIQUIDITY_GLOBAL + 16]
            .copy_from_slice(&global.to_le_bytes());
        data[pool_layout::LAST_TIMESTAMP..pool_layout::LAST_TIMESTAMP + 8].copy_from_slice(&last.to_le_bytes());
        data
    }

    pub(crate) fn tick_bytes(pool: &Address, index: i32, outside: u128) -> Vec<u8> {
        let mut data = vec![0u8; tick_layout::LEN];
        data[..8].copy_from_slice(&tick_discriminator());
        data[tick_layout::POOL..tick_layout::POOL + 32].copy_from_slice(pool.as_bytes());
        data[tick_layout::INDEX..tick_layout::INDEX + 4].copy_from_slice(&index.to_le_bytes());
        data[tick_layout::SECONDS_PER_LIQUIDITY_OUTSIDE..tick_layout::SECONDS_PER_LIQUIDITY_OUTSIDE + 16]
            .copy_from_slice(&outside.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_pool() {
        let account = Address::new([1u8; 32]);
        let pool = parse_pool(&account, &pool_bytes(500, -42, u128::MAX - 1, 1_700_000_000)).unwrap();
        assert_eq!(pool.token_x, Address::new([7u8; 32]));
        assert_eq!(pool.liquidity, 500);
        assert_eq!(pool.current_tick_index, -42);
        assert_eq!(pool.seconds_per_liquidity_global, u128::MAX - 1);
        assert_eq!(pool.last_timestamp, 1_700_000_000);
    }

    #[test]
    fn test_parse_tick() {
        let account = Address::new([1u8; 32]);
        let pool = Address::new([2u8; 32]);
        let tick = parse_tick(&account, &tick_bytes(&pool, -120, 99)).unwrap();
        assert_eq!(tick.pool, pool);
        assert_eq!(tick.index, -120);
        assert_eq!(tick.seconds_per_liquidity_outside, 99);
    }

    #[test]
    fn test_rejects_short_or_foreign_accounts() {
        let account = Address::new([1u8; 32]);
        let data = pool_bytes(1, 0, 0, 0);
        assert!(matches!(
            parse_pool(&account, &data[..100]),
            Err(ChainError::InvalidAccountData { .. })
        ));
        assert!(matches!(
            parse_tick(&account, &data),
            Err(ChainError::InvalidAccountData { .. })
        ));
    }
}

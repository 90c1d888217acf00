//! Decoding of program events from transaction logs.
//!
//! The program emits events as `Program data: <base64>` log lines. The payload
//! is an 8-byte discriminator (`sha256("event:<Name>")[..8]`) followed by the
//! borsh-encoded event. Only the leading fields we account for are decoded;
//! trailing fields are ignored.
//!
//! A remove event does not log the position's inside counter. It is rebuilt
//! from the tick and pool counters the event carries.

use crate::domain::{
    Address, CreatePositionEvent, PositionEvent, ProtocolEvent, RemovePositionEvent, SwapEvent,
};
use crate::engine::wrapping::seconds_per_liquidity_inside;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use borsh::BorshDeserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

pub const DATA_PREFIX: &str = "Program data: ";
pub const SWAP_LOG_PREFIX: &str = "Program log: INVARIANT: SWAP";

pub const CREATE_POSITION_EVENT: &str = "CreatePositionEvent";
pub const REMOVE_POSITION_EVENT: &str = "RemovePositionEvent";
pub const SWAP_EVENT: &str = "SwapEvent";

/// Anchor discriminator for an event or account, e.g. `discriminator("event", "SwapEvent")`.
pub fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// Decodes one base64 event payload. Unknown or malformed payloads yield `None`.
pub fn decode_event(payload: &str) -> Option<ProtocolEvent> {
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    if bytes.len() < 8 {
        return None;
    }
    let (tag, mut body) = bytes.split_at(8);

    let event = if tag == discriminator("event", CREATE_POSITION_EVENT) {
        CreatePositionEvent::deserialize(&mut body)
            .ok()
            .map(|e| ProtocolEvent::CreatePosition(e.into()))
    } else if tag == discriminator("event", REMOVE_POSITION_EVENT) {
        RemovePositionEvent::deserialize(&mut body)
            .ok()
            .map(|e| ProtocolEvent::RemovePosition(closed_position(&e)))
    } else if tag == discriminator("event", SWAP_EVENT) {
        SwapEvent::deserialize(&mut body).ok().map(ProtocolEvent::Swap)
    } else {
        None
    };

    if event.is_none() {
        debug!(len = bytes.len(), "Skipping undecodable event payload");
    }
    event
}

/// The position a remove event closes, with its inside counter at removal.
pub fn closed_position(e: &RemovePositionEvent) -> PositionEvent {
    PositionEvent {
        owner: e.owner,
        pool: e.pool,
        id: e.id,
        liquidity: e.liquidity,
        lower_tick: e.lower_tick,
        upper_tick: e.upper_tick,
        current_timestamp: e.current_timestamp,
        seconds_per_liquidity_inside_initial: seconds_per_liquidity_inside(
            e.lower_tick,
            e.upper_tick,
            e.current_tick,
            e.lower_tick_seconds_per_liquidity_outside,
            e.upper_tick_seconds_per_liquidity_outside,
            e.pool_seconds_per_liquidity_global,
        ),
    }
}

/// Encodes an event in the program's wire layout.
///
/// A remove is logged with the current tick at the position's lower bound and
/// zero outside counters, so the pool counter equals the position's inside
/// counter.
pub fn encode_event(event: &ProtocolEvent) -> String {
    let (name, body) = match event {
        ProtocolEvent::CreatePosition(e) => (
            CREATE_POSITION_EVENT,
            borsh::to_vec(&CreatePositionEvent {
                owner: e.owner,
                pool: e.pool,
                id: e.id,
                liquidity: e.liquidity,
                lower_tick: e.lower_tick,
                upper_tick: e.upper_tick,
                current_timestamp: e.current_timestamp,
                seconds_per_liquidity_inside_initial: e.seconds_per_liquidity_inside_initial,
            }),
        ),
        ProtocolEvent::RemovePosition(e) => (
            REMOVE_POSITION_EVENT,
            borsh::to_vec(&RemovePositionEvent {
                owner: e.owner,
                pool: e.pool,
                id: e.id,
                liquidity: e.liquidity,
                upper_tick: e.upper_tick,
                current_tick: e.lower_tick,
                lower_tick: e.lower_tick,
                upper_tick_seconds_per_liquidity_outside: 0,
                lower_tick_seconds_per_liquidity_outside: 0,
                pool_seconds_per_liquidity_global: e.seconds_per_liquidity_inside_initial,
                current_timestamp: e.current_timestamp,
            }),
        ),
        ProtocolEvent::Swap(e) => (SWAP_EVENT, borsh::to_vec(e)),
    };
    let mut bytes = discriminator("event", name).to_vec();
    // Writing into a Vec cannot fail.
    bytes.extend(body.unwrap_or_default());
    STANDARD.encode(bytes)
}

/// Payloads emitted directly by the program: a data line followed by the
/// program's own `Program <id> ...` line.
pub fn position_payloads<'a>(logs: &'a [String], program_id: &Address) -> Vec<&'a str> {
    let program_line = format!("Program {}", program_id);
    logs.iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let payload = line.strip_prefix(DATA_PREFIX)?;
            let next = logs.get(i + 1)?;
            next.starts_with(&program_line).then_some(payload)
        })
        .collect()
}

/// Payloads logged right after the swap marker line.
pub fn swap_payloads(logs: &[String]) -> Vec<&str> {
    logs.iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let payload = line.strip_prefix(DATA_PREFIX)?;
            let previous = logs.get(i.checked_sub(1)?)?;
            previous.starts_with(SWAP_LOG_PREFIX).then_some(payload)
        })
        .collect()
}

/// Position create/remove events of a batch of transactions, in log order.
pub fn position_events(transactions: &[Vec<String>], program_id: &Address) -> Vec<ProtocolEvent> {
    transactions
        .iter()
        .flat_map(|logs| position_payloads(logs, program_id))
        .filter_map(decode_event)
        .filter(|e| !matches!(e, ProtocolEvent::Swap(_)))
        .collect()
}

/// Swap events of a batch of transactions, in log order.
pub fn swap_events(transactions: &[Vec<String>]) -> Vec<SwapEvent> {
    transactions
        .iter()
        .flat_map(|logs| swap_payloads(logs))
        .filter_map(decode_event)
        .filter_map(|e| match e {
            ProtocolEvent::Swap(swap) => Some(swap),
            _ => None,
        })
        .collect()
}

/// Log lines of a transaction that emitted `events`.
///
/// Swaps are preceded by the swap marker; position events are followed by the
/// program's completion line.
pub fn logs_for_events(program_id: &Address, events: &[ProtocolEvent]) -> Vec<String> {
    let mut logs = vec![format!("Program {} invoke [1]", program_id)];
    for event in events {
        if let ProtocolEvent::Swap(_) = event {
            logs.push(SWAP_LOG_PREFIX.to_string());
            logs.push(format!("{}{}", DATA_PREFIX, encode_event(event)));
        } else {
            logs.push(format!("{}{}", DATA_PREFIX, encode_event(event)));
            logs.push(format!("Program {} consumed 21000 of 200000 compute units", program_id));
        }
    }
    logs.push(format!("Program {} success", program_id));
    logs
}

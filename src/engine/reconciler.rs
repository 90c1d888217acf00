//! Classifies the positions of promoted pools after one sync cycle.
//!
//! Every position known after the cycle lands in exactly one bucket:
//! - `still_open`: active before the cycle, not closed in it
//! - `new_open`: created in the cycle, still open
//! - `new_closed`: active before the cycle, closed in it
//! - `new_open_closed`: closed in the cycle without a prior active record;
//!   the open leg is present when the create was seen in the same cycle

use super::IntegrityError;
use crate::domain::{ActiveRecord, Address, OwnerLedger, PositionEvent, PositionKey, ProtocolEvent};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    pub still_open: Vec<ActiveRecord>,
    pub new_open: Vec<PositionEvent>,
    pub new_closed: Vec<(ActiveRecord, PositionEvent)>,
    pub new_open_closed: Vec<(Option<PositionEvent>, PositionEvent)>,
}

impl Buckets {
    pub fn len(&self) -> usize {
        self.still_open.len() + self.new_open.len() + self.new_closed.len() + self.new_open_closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partitions prior active positions and this cycle's position events.
///
/// Events are expected oldest first but a remove seen before its create is
/// still paired. Creates replayed for positions that are already active or
/// already closed in this cycle are ignored, as are events of pools that are
/// not promoted.
pub fn reconcile(
    prior: &BTreeMap<Address, OwnerLedger>,
    events: &[ProtocolEvent],
    promoted: &HashSet<Address>,
) -> Result<Buckets, IntegrityError> {
    let mut prior_active: HashMap<PositionKey, &ActiveRecord> = HashMap::new();
    for ledger in prior.values() {
        for record in &ledger.active {
            let key = record.event.key();
            if prior_active.insert(key, record).is_some() {
                return Err(IntegrityError::DuplicateActivePosition {
                    owner: ledger.owner,
                    key,
                });
            }
        }
    }

    let mut buckets = Buckets::default();
    let mut closed: HashSet<PositionKey> = HashSet::new();

    for event in events {
        match event {
            ProtocolEvent::CreatePosition(create) => {
                if !promoted.contains(&create.pool) {
                    continue;
                }
                let key = create.key();
                if prior_active.contains_key(&key) {
                    debug!(position = %key, "Create for already active position, skipping");
                    continue;
                }
                if let Some(slot) = buckets
                    .new_open_closed
                    .iter_mut()
                    .find(|(open, close)| open.is_none() && close.key() == key)
                {
                    slot.0 = Some(create.clone());
                    continue;
                }
                if closed.contains(&key) {
                    debug!(position = %key, "Create for position closed this cycle, skipping");
                    continue;
                }
                if buckets.new_open.iter().any(|e| e.key() == key) {
                    debug!(position = %key, "Duplicate create in cycle, skipping");
                    continue;
                }
                buckets.new_open.push(create.clone());
            }
            ProtocolEvent::RemovePosition(remove) => {
                if !promoted.contains(&remove.pool) {
                    continue;
                }
                let key = remove.key();
                if !closed.insert(key) {
                    debug!(position = %key, "Duplicate remove in cycle, skipping");
                    continue;
                }
                if let Some(index) = buckets.new_open.iter().position(|e| e.key() == key) {
                    let create = buckets.new_open.remove(index);
                    buckets.new_open_closed.push((Some(create), remove.clone()));
                } else if let Some(record) = prior_active.get(&key) {
                    buckets.new_closed.push(((*record).clone(), remove.clone()));
                } else {
                    buckets.new_open_closed.push((None, remove.clone()));
                }
            }
            ProtocolEvent::Swap(_) => {}
        }
    }

    // Prior records keep their ledger order.
    for ledger in prior.values() {
        for record in &ledger.active {
            if !closed.contains(&record.event.key()) {
                buckets.still_open.push(record.clone());
            }
        }
    }

    Ok(buckets)
}

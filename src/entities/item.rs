use crate::entities::creature::CreatureId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Largest amount a cumulative stack can hold. Protocol-visible bound;
/// joins past it produce a remainder instance.
pub const MAX_STACK_AMOUNT: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u32);

static NEXT_ITEM_ID: AtomicU32 = AtomicU32::new(1);

impl ItemId {
    pub fn next() -> Self {
        let id = NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed);
        ItemId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemTypeId(pub u16);

/// One item instance. Containment lives in the item store; an item only
/// carries its own attributes plus container state when its type is a
/// container.
#[derive(Debug)]
pub struct Item {
    pub id: ItemId,
    pub type_id: ItemTypeId,
    pub amount: u8,
    pub container: Option<ContainerState>,
}

impl Item {
    pub fn is_container(&self) -> bool {
        self.container.is_some()
    }

    /// Merges `incoming` amount into this stack, capped at
    /// [`MAX_STACK_AMOUNT`]. Returns the amount that did not fit.
    pub fn absorb(&mut self, incoming: u8) -> u8 {
        let total = u16::from(self.amount) + u16::from(incoming);
        if total <= u16::from(MAX_STACK_AMOUNT) {
            self.amount = total as u8;
            0
        } else {
            self.amount = MAX_STACK_AMOUNT;
            (total - u16::from(MAX_STACK_AMOUNT)) as u8
        }
    }
}

/// Container-specific state: the ordered content (index 0 is the most
/// recently added slot) and the viewer-tracking map.
///
/// `opened_by` has its own lock because viewer open/close is driven by
/// connection threads, independent of the single-writer content path.
/// Content mutation never takes this lock.
#[derive(Debug)]
pub struct ContainerState {
    pub capacity: u8,
    pub content: Vec<ItemId>,
    opened_by: Mutex<HashMap<CreatureId, u8>>,
}

impl ContainerState {
    pub fn new(capacity: u8) -> Self {
        Self {
            capacity,
            content: Vec::new(),
            opened_by: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_full(&self) -> bool {
        self.content.len() >= usize::from(self.capacity)
    }

    /// Starts tracking this container as opened by `viewer`. Idempotent:
    /// an existing mapping wins and its id is returned, the proposed id
    /// is ignored.
    pub fn begin_tracking(&self, viewer: CreatureId, proposed_id: u8) -> u8 {
        let mut opened = self.lock_opened();
        *opened.entry(viewer).or_insert(proposed_id)
    }

    pub fn end_tracking(&self, viewer: CreatureId) {
        let mut opened = self.lock_opened();
        opened.remove(&viewer);
    }

    pub fn is_tracking(&self, viewer: CreatureId) -> Option<u8> {
        let opened = self.lock_opened();
        opened.get(&viewer).copied()
    }

    /// Snapshot of every viewer currently tracking this container.
    pub fn viewers(&self) -> Vec<(CreatureId, u8)> {
        let opened = self.lock_opened();
        opened.iter().map(|(id, client)| (*id, *client)).collect()
    }

    fn lock_opened(&self) -> MutexGuard<'_, HashMap<CreatureId, u8>> {
        // The critical sections leave the map consistent, so a poisoned
        // lock is recoverable.
        self.opened_by.lock().unwrap_or_else(|err| err.into_inner())
    }
}

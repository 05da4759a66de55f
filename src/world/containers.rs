use crate::entities::creature::CreatureId;
use crate::entities::inventory::InventorySlot;
use crate::entities::item::{ContainerState, Item, ItemId, ItemTypeId, MAX_STACK_AMOUNT};
use crate::entities::item_types::ItemFactory;
use crate::world::position::{Position, CONTENT_INDEX_ANY};
use std::collections::HashMap;

/// Ancestry walks stop here; a longer parent chain is treated as cyclic.
const MAX_NESTING_DEPTH: usize = 64;

/// The holder an item currently belongs to. Always an index, never an
/// owning reference; the holder's content list and this link are
/// updated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cylinder {
    Container(ItemId),
    Tile(Position),
    Slot(CreatureId, InventorySlot),
}

#[derive(Debug)]
pub struct ItemNode {
    pub item: Item,
    pub parent: Option<Cylinder>,
}

/// A committed content change, published after the mutation. Consumers
/// (viewer fan-out) subscribe by draining the sink the caller supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEvent {
    Added {
        container: ItemId,
        item: ItemId,
    },
    Updated {
        container: ItemId,
        index: u8,
        item: ItemId,
    },
    Removed {
        container: ItemId,
        index: u8,
    },
}

impl ContentEvent {
    pub fn container(&self) -> ItemId {
        match self {
            ContentEvent::Added { container, .. }
            | ContentEvent::Updated { container, .. }
            | ContentEvent::Removed { container, .. } => *container,
        }
    }
}

/// Arena owning every item instance in the world. Containment is a
/// graph of ids over this arena: containers list child ids, children
/// point back at their holder.
#[derive(Debug, Default)]
pub struct ItemStore {
    nodes: HashMap<ItemId, ItemNode>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a detached item to the arena and returns its id.
    pub fn insert_detached(&mut self, item: Item) -> ItemId {
        let id = item.id;
        self.nodes.insert(id, ItemNode { item, parent: None });
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.nodes.get(&id).map(|node| &node.item)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.nodes.get_mut(&id).map(|node| &mut node.item)
    }

    pub fn parent_of(&self, id: ItemId) -> Option<Cylinder> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn set_parent(&mut self, id: ItemId, parent: Option<Cylinder>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
        }
    }

    /// Drops an item from the arena entirely (e.g. fully absorbed by a
    /// join). The caller must have detached it from any holder first.
    pub fn discard(&mut self, id: ItemId) -> Option<Item> {
        self.nodes.remove(&id).map(|node| node.item)
    }

    pub fn container(&self, id: ItemId) -> Option<&ContainerState> {
        self.get(id).and_then(|item| item.container.as_ref())
    }

    pub fn container_mut(&mut self, id: ItemId) -> Option<&mut ContainerState> {
        self.get_mut(id).and_then(|item| item.container.as_mut())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when walking `node`'s parent chain reaches `ancestor`.
    pub fn is_descendant_of(&self, node: ItemId, ancestor: ItemId) -> bool {
        let mut current = node;
        for _ in 0..MAX_NESTING_DEPTH {
            match self.parent_of(current) {
                Some(Cylinder::Container(parent)) => {
                    if parent == ancestor {
                        return true;
                    }
                    current = parent;
                }
                _ => return false,
            }
        }
        // Depth bound exceeded: refuse rather than loop.
        true
    }

    /// Attempts to add `thing` to `container`'s content.
    ///
    /// An in-range `index` with an occupant first recurses into a
    /// container occupant or tries to join with a cumulative one; the
    /// [`CONTENT_INDEX_ANY`] sentinel and out-of-range indexes skip
    /// straight to insertion. Whatever remains is inserted at index 0
    /// (newest first), unless the container is at capacity, in which
    /// case the remainder is handed back.
    ///
    /// Returns `(success, remainder)`; a `None` remainder means the
    /// thing was fully absorbed.
    pub fn add_content(
        &mut self,
        factory: &ItemFactory,
        container: ItemId,
        thing: ItemId,
        index: u8,
        events: &mut Vec<ContentEvent>,
    ) -> (bool, Option<ItemId>) {
        if thing == container || self.is_descendant_of(container, thing) {
            return (false, Some(thing));
        }
        let (len, capacity) = match self.container(container) {
            Some(state) => (state.content.len(), usize::from(state.capacity)),
            None => return (false, Some(thing)),
        };
        let at_capacity = len >= capacity;
        let occupant = if usize::from(index) < len {
            self.container(container)
                .and_then(|state| state.content.get(usize::from(index)).copied())
        } else {
            None
        };

        let mut success = false;
        let mut remainder = Some(thing);

        if let Some(existing) = occupant {
            if self.get(existing).is_some_and(Item::is_container) {
                let (nested_success, nested_remainder) =
                    self.add_content(factory, existing, thing, CONTENT_INDEX_ANY, events);
                success = nested_success;
                remainder = nested_remainder;
            } else if self.can_join(factory, existing, thing) {
                let incoming = self.get(thing).map(|item| item.amount).unwrap_or(0);
                let leftover = match self.get_mut(existing) {
                    Some(item) => item.absorb(incoming),
                    None => incoming,
                };
                success = true;
                let mut updated_index = index;
                if leftover == 0 {
                    self.discard(thing);
                    remainder = None;
                } else {
                    if let Some(item) = self.get_mut(thing) {
                        item.amount = leftover;
                    }
                    if !at_capacity {
                        updated_index = updated_index.saturating_add(1);
                    }
                }
                events.push(ContentEvent::Updated {
                    container,
                    index: updated_index,
                    item: existing,
                });
            }
        }

        let Some(rest) = remainder else {
            return (true, None);
        };
        let full = match self.container(container) {
            Some(state) => state.is_full(),
            None => return (success, Some(rest)),
        };
        if full {
            return (success, Some(rest));
        }
        if let Some(state) = self.container_mut(container) {
            state.content.insert(0, rest);
        }
        self.set_parent(rest, Some(Cylinder::Container(container)));
        events.push(ContentEvent::Added {
            container,
            item: rest,
        });
        (true, None)
    }

    /// Attempts to remove `amount` of `type_id` from `container`, at an
    /// exact index or wherever the type first occurs on
    /// [`CONTENT_INDEX_ANY`].
    ///
    /// Whole-slot removals detach and return the occupant; partial
    /// removals from a cumulative stack split off a new instance of the
    /// requested amount and leave the rest in place.
    pub fn remove_content(
        &mut self,
        factory: &ItemFactory,
        container: ItemId,
        type_id: ItemTypeId,
        index: u8,
        amount: u8,
        events: &mut Vec<ContentEvent>,
    ) -> (bool, Option<ItemId>) {
        if amount == 0 {
            return (false, None);
        }
        let Some(idx) = self.resolve_index(container, type_id, index) else {
            return (false, None);
        };
        let Some(existing_id) = self
            .container(container)
            .and_then(|state| state.content.get(idx).copied())
        else {
            return (false, None);
        };
        let Some(existing) = self.get(existing_id) else {
            return (false, None);
        };
        if existing.type_id != type_id || existing.amount < amount {
            return (false, None);
        }
        let cumulative = factory
            .types()
            .get(type_id)
            .is_some_and(|item_type| item_type.cumulative);
        if !cumulative || existing.amount == amount {
            if let Some(state) = self.container_mut(container) {
                state.content.remove(idx);
            }
            self.set_parent(existing_id, None);
            events.push(ContentEvent::Removed {
                container,
                index: idx as u8,
            });
            return (true, Some(existing_id));
        }

        let Some(mut split) = factory.create(type_id) else {
            return (false, None);
        };
        split.amount = amount;
        if let Some(item) = self.get_mut(existing_id) {
            item.amount -= amount;
        }
        let split_id = self.insert_detached(split);
        events.push(ContentEvent::Updated {
            container,
            index: idx as u8,
            item: existing_id,
        });
        (true, Some(split_id))
    }

    /// Swaps the slot holding `from_type` for `to_thing`, reparenting
    /// the newcomer and detaching the old occupant (left unparented in
    /// the arena for the caller). No join or split semantics.
    pub fn replace_content(
        &mut self,
        container: ItemId,
        from_type: ItemTypeId,
        to_thing: ItemId,
        index: u8,
        amount: u8,
        events: &mut Vec<ContentEvent>,
    ) -> bool {
        if amount == 0 {
            return false;
        }
        if to_thing == container || self.is_descendant_of(container, to_thing) {
            return false;
        }
        let Some(idx) = self.resolve_index(container, from_type, index) else {
            return false;
        };
        let Some(old_id) = self
            .container(container)
            .and_then(|state| state.content.get(idx).copied())
        else {
            return false;
        };
        let matches = self
            .get(old_id)
            .is_some_and(|item| item.type_id == from_type && item.amount >= amount);
        if !matches {
            return false;
        }
        if let Some(state) = self.container_mut(container) {
            state.content[idx] = to_thing;
        }
        self.set_parent(old_id, None);
        self.set_parent(to_thing, Some(Cylinder::Container(container)));
        events.push(ContentEvent::Updated {
            container,
            index: idx as u8,
            item: to_thing,
        });
        true
    }

    /// Counts the amount at `index`, counted from the tail of the
    /// content list. `-1` when out of range, `0` on a type mismatch,
    /// otherwise the amount capped at 100. Client slot queries rely on
    /// these exact sentinels.
    pub fn count_amount_at(
        &self,
        container: ItemId,
        index: u8,
        expected_type_id: ItemTypeId,
    ) -> i8 {
        let Some(state) = self.container(container) else {
            return -1;
        };
        let Some(pos) = state.content.len().checked_sub(usize::from(index) + 1) else {
            return -1;
        };
        let Some(item) = state.content.get(pos).and_then(|id| self.get(*id)) else {
            return -1;
        };
        if item.type_id != expected_type_id {
            return 0;
        }
        item.amount.min(MAX_STACK_AMOUNT) as i8
    }

    fn resolve_index(&self, container: ItemId, type_id: ItemTypeId, index: u8) -> Option<usize> {
        let state = self.container(container)?;
        if index == CONTENT_INDEX_ANY {
            state
                .content
                .iter()
                .position(|id| self.get(*id).map(|item| item.type_id) == Some(type_id))
        } else if usize::from(index) < state.content.len() {
            Some(usize::from(index))
        } else {
            None
        }
    }

    fn can_join(&self, factory: &ItemFactory, existing: ItemId, thing: ItemId) -> bool {
        let (Some(existing), Some(thing)) = (self.get(existing), self.get(thing)) else {
            return false;
        };
        existing.type_id == thing.type_id
            && factory
                .types()
                .get(existing.type_id)
                .is_some_and(|item_type| item_type.cumulative)
    }
}

use crate::config::EngineConfig;
use crate::entities::creature::{Creature, CreatureId};
use crate::entities::inventory::InventorySlot;
use crate::entities::item::{ItemId, ItemTypeId};
use crate::entities::item_types::ItemFactory;
use crate::world::containers::{ContentEvent, Cylinder, ItemStore};
use crate::world::map::WorldMap;
use crate::world::position::{Location, Position, CONTENT_INDEX_ANY};
use std::collections::HashMap;

/// The authoritative world. Owned by the engine loop; everything else
/// reaches it through commands, never directly.
#[derive(Debug)]
pub struct WorldState {
    pub config: EngineConfig,
    pub map: WorldMap,
    pub store: ItemStore,
    pub factory: ItemFactory,
    creatures: HashMap<CreatureId, Creature>,
}

impl WorldState {
    pub fn new(config: EngineConfig, factory: ItemFactory) -> Self {
        Self {
            config,
            map: WorldMap::default(),
            store: ItemStore::new(),
            factory,
            creatures: HashMap::new(),
        }
    }

    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    pub fn add_creature(&mut self, creature: Creature) {
        self.creatures.insert(creature.id, creature);
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    /// Creates a fresh instance and registers it in the store, still
    /// detached from any holder.
    pub fn spawn_item(&mut self, type_id: ItemTypeId, amount: u8) -> Option<ItemId> {
        let item = self.factory.create_with_amount(type_id, amount)?;
        Some(self.store.insert_detached(item))
    }

    /// Puts a detached item on top of a tile's stack.
    pub fn place_on_tile(&mut self, item: ItemId, position: Position) {
        self.map.ensure_tile(position).items.push(item);
        self.store.set_parent(item, Some(Cylinder::Tile(position)));
    }

    /// Puts a detached item into an empty equipment slot. Fails when the
    /// slot is taken.
    pub fn equip(&mut self, creature: CreatureId, slot: InventorySlot, item: ItemId) -> bool {
        let Some(holder) = self.creatures.get_mut(&creature) else {
            return false;
        };
        if holder.inventory.slot(slot).is_some() {
            return false;
        }
        holder.inventory.set_slot(slot, Some(item));
        self.store
            .set_parent(item, Some(Cylinder::Slot(creature, slot)));
        true
    }

    /// Detaches an item from whatever currently holds it, using the
    /// store's back-link. Container removals are published as events.
    pub fn detach(&mut self, item: ItemId, events: &mut Vec<ContentEvent>) -> bool {
        match self.store.parent_of(item) {
            Some(Cylinder::Tile(position)) => {
                let Some(tile) = self.map.tile_mut(position) else {
                    return false;
                };
                if let Some(pos) = tile.items.iter().position(|id| *id == item) {
                    tile.items.remove(pos);
                    self.store.set_parent(item, None);
                    true
                } else {
                    false
                }
            }
            Some(Cylinder::Slot(creature, slot)) => {
                let Some(holder) = self.creatures.get_mut(&creature) else {
                    return false;
                };
                if holder.inventory.slot(slot) == Some(item) {
                    holder.inventory.take_slot(slot);
                    self.store.set_parent(item, None);
                    true
                } else {
                    false
                }
            }
            Some(Cylinder::Container(container)) => {
                let Some(idx) = self
                    .store
                    .container(container)
                    .and_then(|state| state.content.iter().position(|id| *id == item))
                else {
                    return false;
                };
                if let Some(state) = self.store.container_mut(container) {
                    state.content.remove(idx);
                }
                self.store.set_parent(item, None);
                events.push(ContentEvent::Removed {
                    container,
                    index: idx as u8,
                });
                true
            }
            None => false,
        }
    }

    /// Finds the item a client request points at: top of the tile stack,
    /// the equipped slot, or a container index. The type id must match;
    /// stale requests resolve to `None`.
    pub fn resolve_at(&self, location: Location, type_id: ItemTypeId) -> Option<ItemId> {
        let candidate = match location {
            Location::Map(position) => self.map.tile(position)?.top_item()?,
            Location::Slot { creature, slot } => self.creature(creature)?.inventory.slot(slot)?,
            Location::Container { container, index } => {
                let state = self.store.container(container)?;
                if index == CONTENT_INDEX_ANY {
                    *state.content.iter().find(|id| {
                        self.store.get(**id).map(|item| item.type_id) == Some(type_id)
                    })?
                } else {
                    *state.content.get(usize::from(index))?
                }
            }
        };
        (self.store.get(candidate)?.type_id == type_id).then_some(candidate)
    }

    /// The map position a location resolves to, for range checks.
    /// Container locations resolve through the holder chain to the tile
    /// or carrier the container ultimately sits on.
    pub fn anchor_position(&self, location: Location) -> Option<Position> {
        match location {
            Location::Map(position) => Some(position),
            Location::Slot { creature, .. } => self.creature(creature).map(|c| c.position),
            Location::Container { container, .. } => self.item_anchor(container),
        }
    }

    fn item_anchor(&self, item: ItemId) -> Option<Position> {
        let mut current = item;
        // Bounded like the containment walk; the store enforces
        // acyclicity so this terminates in practice.
        for _ in 0..64 {
            match self.store.parent_of(current)? {
                Cylinder::Tile(position) => return Some(position),
                Cylinder::Slot(creature, _) => return self.creature(creature).map(|c| c.position),
                Cylinder::Container(parent) => current = parent,
            }
        }
        None
    }
}

use crate::entities::inventory::Inventory;
use crate::entities::item::ItemId;
use crate::world::position::{Direction, Position};
use std::collections::HashMap;

/// Client-local container ids are a small fixed range.
const MAX_OPEN_CONTAINERS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CreatureId(pub u32);

#[derive(Debug)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    pub position: Position,
    pub direction: Direction,
    pub inventory: Inventory,
    /// Client-local container id -> container instance, for containers
    /// this creature currently has open. Mirrors the per-container
    /// viewer tracking; only the authoritative loop mutates it.
    pub open_containers: HashMap<u8, ItemId>,
}

impl Creature {
    pub fn new(id: CreatureId, name: &str, position: Position) -> Self {
        Self {
            id,
            name: name.to_string(),
            position,
            direction: Direction::South,
            inventory: Inventory::default(),
            open_containers: HashMap::new(),
        }
    }

    /// Lowest free client-local container id, if any remain.
    pub fn next_container_id(&self) -> Option<u8> {
        (0..MAX_OPEN_CONTAINERS).find(|id| !self.open_containers.contains_key(id))
    }
}

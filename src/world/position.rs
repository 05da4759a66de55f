use crate::entities::creature::CreatureId;
use crate::entities::inventory::InventorySlot;
use crate::entities::item::ItemId;

/// Sentinel index meaning "any index" in container addressing.
pub const CONTENT_INDEX_ANY: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

impl Position {
    pub fn chebyshev_distance(self, other: Position) -> u16 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx.max(dy)
    }

    pub fn same_floor(self, other: Position) -> bool {
        self.z == other.z
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    North,
    East,
    #[default]
    South,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

/// Where a thing is, or where it is going: a map tile, an equipment
/// slot, or an index inside an open container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Map(Position),
    Slot {
        creature: CreatureId,
        slot: InventorySlot,
    },
    Container {
        container: ItemId,
        index: u8,
    },
}

impl Location {
    pub fn is_map(&self) -> bool {
        matches!(self, Location::Map(_))
    }

    pub fn map_position(&self) -> Option<Position> {
        match self {
            Location::Map(position) => Some(*position),
            _ => None,
        }
    }
}

use crate::entities::item::ItemId;

/// One map square: an optional ground layer plus the stack of things on
/// it. The last entry is the top of the stack.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tile {
    pub ground: Option<ItemId>,
    pub items: Vec<ItemId>,
}

impl Tile {
    pub fn has_ground(&self) -> bool {
        self.ground.is_some()
    }

    pub fn top_item(&self) -> Option<ItemId> {
        self.items.last().copied()
    }
}

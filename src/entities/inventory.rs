use crate::entities::item::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventorySlot {
    Head,
    Necklace,
    Backpack,
    Armor,
    RightHand,
    LeftHand,
    Legs,
    Feet,
    Ring,
    Ammo,
}

impl InventorySlot {
    const COUNT: usize = 10;

    pub fn index(self) -> usize {
        match self {
            InventorySlot::Head => 0,
            InventorySlot::Necklace => 1,
            InventorySlot::Backpack => 2,
            InventorySlot::Armor => 3,
            InventorySlot::RightHand => 4,
            InventorySlot::LeftHand => 5,
            InventorySlot::Legs => 6,
            InventorySlot::Feet => 7,
            InventorySlot::Ring => 8,
            InventorySlot::Ammo => 9,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(InventorySlot::Head),
            1 => Some(InventorySlot::Necklace),
            2 => Some(InventorySlot::Backpack),
            3 => Some(InventorySlot::Armor),
            4 => Some(InventorySlot::RightHand),
            5 => Some(InventorySlot::LeftHand),
            6 => Some(InventorySlot::Legs),
            7 => Some(InventorySlot::Feet),
            8 => Some(InventorySlot::Ring),
            9 => Some(InventorySlot::Ammo),
            _ => None,
        }
    }
}

/// Fixed equipment slots. Slots hold item ids; the items themselves
/// live in the item store, which also records the back-link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    slots: Vec<Option<ItemId>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            slots: vec![None; InventorySlot::COUNT],
        }
    }
}

impl Inventory {
    pub fn slot(&self, slot: InventorySlot) -> Option<ItemId> {
        self.slots.get(slot.index()).copied().flatten()
    }

    pub fn set_slot(&mut self, slot: InventorySlot, item: Option<ItemId>) {
        if let Some(entry) = self.slots.get_mut(slot.index()) {
            *entry = item;
        }
    }

    pub fn take_slot(&mut self, slot: InventorySlot) -> Option<ItemId> {
        self.slots.get_mut(slot.index()).and_then(|entry| entry.take())
    }
}

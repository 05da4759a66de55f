pub mod creature;
pub mod inventory;
pub mod item;
pub mod item_types;

use crate::entities::item::{ContainerState, Item, ItemId, ItemTypeId};
use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved id range; client item types start at 100.
const FIRST_ITEM_TYPE_ID: u16 = 100;

/// Immutable per-type data shared by every instance of the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemType {
    pub id: ItemTypeId,
    pub name: String,
    pub container: bool,
    pub cumulative: bool,
    pub collision_trigger: bool,
    pub blocking: bool,
    pub ground: bool,
    pub takeable: bool,
    pub capacity: Option<u8>,
}

impl ItemType {
    pub fn new(id: ItemTypeId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            container: false,
            cumulative: false,
            collision_trigger: false,
            blocking: false,
            ground: false,
            takeable: true,
            capacity: None,
        }
    }
}

/// The item type catalog. Built once at load, then shared read-only.
#[derive(Debug, Default, Clone)]
pub struct ItemTypeIndex {
    types: HashMap<ItemTypeId, ItemType>,
}

impl ItemTypeIndex {
    pub fn get(&self, id: ItemTypeId) -> Option<&ItemType> {
        self.types.get(&id)
    }

    pub fn insert(&mut self, item_type: ItemType) -> EngineResult<()> {
        if self.types.contains_key(&item_type.id) {
            return Err(EngineError::DuplicateItemType(item_type.id.0));
        }
        self.types.insert(item_type.id, item_type);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Materializes item instances from the catalog. Used for fresh items
/// and for the new instance a split produces.
#[derive(Debug, Clone)]
pub struct ItemFactory {
    types: Arc<ItemTypeIndex>,
    default_capacity: u8,
}

impl ItemFactory {
    pub fn new(types: Arc<ItemTypeIndex>, default_capacity: u8) -> Self {
        Self {
            types,
            default_capacity,
        }
    }

    pub fn types(&self) -> &ItemTypeIndex {
        &self.types
    }

    /// Creates an instance of the given type with amount 1, or `None`
    /// for reserved or unknown type ids.
    pub fn create(&self, type_id: ItemTypeId) -> Option<Item> {
        if type_id.0 < FIRST_ITEM_TYPE_ID {
            return None;
        }
        let item_type = self.types.get(type_id)?;
        let container = item_type
            .container
            .then(|| ContainerState::new(item_type.capacity.unwrap_or(self.default_capacity)));
        Some(Item {
            id: ItemId::next(),
            type_id,
            amount: 1,
            container,
        })
    }

    pub fn create_with_amount(&self, type_id: ItemTypeId, amount: u8) -> Option<Item> {
        let mut item = self.create(type_id)?;
        item.amount = amount.max(1);
        Some(item)
    }
}

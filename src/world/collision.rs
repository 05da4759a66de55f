use crate::entities::creature::CreatureId;
use crate::entities::item::{ItemId, ItemTypeId};
use crate::world::position::Position;
use crate::world::state::WorldState;
use tracing::debug;

/// Whether a matching handler applies to this particular landing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionGuard {
    Always,
    MovingItemTypeIs(ItemTypeId),
    RequestorPresent,
}

impl CollisionGuard {
    fn accepts(
        &self,
        world: &WorldState,
        moving: ItemId,
        requestor: Option<CreatureId>,
    ) -> bool {
        match self {
            CollisionGuard::Always => true,
            CollisionGuard::MovingItemTypeIs(type_id) => {
                world.store.get(moving).map(|item| item.type_id) == Some(*type_id)
            }
            CollisionGuard::RequestorPresent => requestor.is_some(),
        }
    }
}

/// What a handler does once selected. Executability is checked before
/// selection; a handler whose effect cannot run does not count as the
/// match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionEffect {
    /// Swap the trigger item's type in place.
    TransformTrigger(ItemTypeId),
    /// Destroy the thing that landed.
    ConsumeMoving,
    LogOnly,
}

impl CollisionEffect {
    fn can_execute(&self, world: &WorldState, moving: ItemId) -> bool {
        match self {
            CollisionEffect::TransformTrigger(type_id) => {
                world.factory.types().get(*type_id).is_some()
            }
            CollisionEffect::ConsumeMoving => world.store.get(moving).is_some(),
            CollisionEffect::LogOnly => true,
        }
    }

    fn execute(&self, world: &mut WorldState, trigger: ItemId, moving: ItemId) {
        match self {
            CollisionEffect::TransformTrigger(type_id) => {
                if let Some(item) = world.store.get_mut(trigger) {
                    debug!(from = item.type_id.0, to = type_id.0, "collision transform");
                    item.type_id = *type_id;
                }
            }
            CollisionEffect::ConsumeMoving => {
                let mut events = Vec::new();
                world.detach(moving, &mut events);
                world.store.discard(moving);
                debug!(item = moving.0, "collision consumed item");
            }
            CollisionEffect::LogOnly => {
                debug!(trigger = trigger.0, moving = moving.0, "collision");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionHandler {
    pub trigger_type_id: ItemTypeId,
    pub guard: CollisionGuard,
    pub effect: CollisionEffect,
}

/// Registration-ordered handler list. Dispatch runs the FIRST handler
/// whose trigger type matches, whose guard accepts, and whose effect is
/// executable; later matches never run.
#[derive(Debug, Default)]
pub struct CollisionCatalog {
    handlers: Vec<CollisionHandler>,
}

impl CollisionCatalog {
    pub fn register(&mut self, handler: CollisionHandler) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs collision handling for `moving` having just landed at
    /// `position`. Returns true when a handler executed.
    pub fn dispatch(
        &self,
        world: &mut WorldState,
        position: Position,
        moving: ItemId,
        requestor: Option<CreatureId>,
    ) -> bool {
        let Some(selected) = self.select(world, position, moving, requestor) else {
            return false;
        };
        let (trigger, effect) = selected;
        effect.execute(world, trigger, moving);
        true
    }

    fn select(
        &self,
        world: &WorldState,
        position: Position,
        moving: ItemId,
        requestor: Option<CreatureId>,
    ) -> Option<(ItemId, CollisionEffect)> {
        let tile = world.map.tile(position)?;
        let triggers: Vec<(ItemId, ItemTypeId)> = tile
            .items
            .iter()
            .filter(|id| **id != moving)
            .filter_map(|id| world.store.get(*id).map(|item| (*id, item.type_id)))
            .filter(|(_, type_id)| {
                world
                    .factory
                    .types()
                    .get(*type_id)
                    .is_some_and(|item_type| item_type.collision_trigger)
            })
            .collect();
        if triggers.is_empty() {
            return None;
        }
        for handler in &self.handlers {
            for (trigger, trigger_type) in &triggers {
                if handler.trigger_type_id == *trigger_type
                    && handler.guard.accepts(world, moving, requestor)
                    && handler.effect.can_execute(world, moving)
                {
                    return Some((*trigger, handler.effect.clone()));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::entities::item_types::{ItemFactory, ItemType, ItemTypeIndex};
    use std::sync::Arc;

    const TRAP: ItemTypeId = ItemTypeId(200);
    const SPRUNG_TRAP: ItemTypeId = ItemTypeId(201);
    const TORCH: ItemTypeId = ItemTypeId(2920);
    const GOLD: ItemTypeId = ItemTypeId(3031);

    fn world() -> WorldState {
        let mut index = ItemTypeIndex::default();
        let mut trap = ItemType::new(TRAP, "trap");
        trap.collision_trigger = true;
        index.insert(trap).expect("trap");
        index
            .insert(ItemType::new(SPRUNG_TRAP, "sprung trap"))
            .expect("sprung trap");
        index.insert(ItemType::new(TORCH, "torch")).expect("torch");
        let mut gold = ItemType::new(GOLD, "gold coin");
        gold.cumulative = true;
        index.insert(gold).expect("gold");
        WorldState::new(EngineConfig::default(), ItemFactory::new(Arc::new(index), 8))
    }

    fn pos() -> Position {
        Position { x: 50, y: 50, z: 7 }
    }

    #[test]
    fn first_matching_handler_wins() {
        let mut world = world();
        let trap = world.spawn_item(TRAP, 1).expect("trap");
        world.place_on_tile(trap, pos());
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos());

        let mut catalog = CollisionCatalog::default();
        catalog.register(CollisionHandler {
            trigger_type_id: TRAP,
            guard: CollisionGuard::Always,
            effect: CollisionEffect::TransformTrigger(SPRUNG_TRAP),
        });
        catalog.register(CollisionHandler {
            trigger_type_id: TRAP,
            guard: CollisionGuard::Always,
            effect: CollisionEffect::ConsumeMoving,
        });

        assert!(catalog.dispatch(&mut world, pos(), torch, None));
        // First handler transformed the trap; the second never ran.
        assert_eq!(world.store.get(trap).map(|i| i.type_id), Some(SPRUNG_TRAP));
        assert!(world.store.get(torch).is_some());
    }

    #[test]
    fn rejected_guard_falls_through_to_the_next_handler() {
        let mut world = world();
        let trap = world.spawn_item(TRAP, 1).expect("trap");
        world.place_on_tile(trap, pos());
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos());

        let mut catalog = CollisionCatalog::default();
        catalog.register(CollisionHandler {
            trigger_type_id: TRAP,
            guard: CollisionGuard::MovingItemTypeIs(GOLD),
            effect: CollisionEffect::TransformTrigger(SPRUNG_TRAP),
        });
        catalog.register(CollisionHandler {
            trigger_type_id: TRAP,
            guard: CollisionGuard::Always,
            effect: CollisionEffect::ConsumeMoving,
        });

        assert!(catalog.dispatch(&mut world, pos(), torch, None));
        assert_eq!(world.store.get(trap).map(|i| i.type_id), Some(TRAP));
        assert!(world.store.get(torch).is_none());
        assert_eq!(world.map.tile(pos()).map(|t| t.items.len()), Some(1));
    }

    #[test]
    fn no_trigger_on_tile_is_a_noop() {
        let mut world = world();
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos());

        let mut catalog = CollisionCatalog::default();
        catalog.register(CollisionHandler {
            trigger_type_id: TRAP,
            guard: CollisionGuard::Always,
            effect: CollisionEffect::LogOnly,
        });
        assert!(!catalog.dispatch(&mut world, pos(), torch, None));
    }

    #[test]
    fn landing_item_does_not_trigger_itself() {
        let mut world = world();
        let trap = world.spawn_item(TRAP, 1).expect("trap");
        world.place_on_tile(trap, pos());

        let mut catalog = CollisionCatalog::default();
        catalog.register(CollisionHandler {
            trigger_type_id: TRAP,
            guard: CollisionGuard::Always,
            effect: CollisionEffect::LogOnly,
        });
        // The trap itself landing on an empty tile finds no other trigger.
        assert!(!catalog.dispatch(&mut world, pos(), trap, None));
    }
}

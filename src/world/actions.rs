use crate::entities::creature::CreatureId;
use crate::entities::item::{ItemId, ItemTypeId};
use crate::world::collision::CollisionCatalog;
use crate::world::conditions::DEFAULT_REJECTION;
use crate::world::containers::ContentEvent;
use crate::world::notify::{
    notify_cancellation, notify_container_events, notify_tile, ConnectionRegistry, Notification,
};
use crate::world::position::{Location, Position};
use crate::world::state::WorldState;
use tracing::debug;

/// Everything an action needs at run time. The world reference is the
/// single writer; the registry is for fan-out only.
pub struct ActionContext<'a> {
    pub world: &'a mut WorldState,
    pub registry: &'a mut ConnectionRegistry,
    pub collisions: &'a CollisionCatalog,
}

/// A deferred effect. Actions carry request parameters, never resolved
/// object references; everything is re-resolved against the world at
/// the moment the action runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    MoveItem {
        type_id: ItemTypeId,
        from: Location,
        to: Location,
        amount: u8,
    },
    UseItem {
        type_id: ItemTypeId,
        at: Location,
    },
    /// Failure path: tell the requestor why nothing happened.
    NotifyCancellation,
}

impl Action {
    pub fn run(
        &self,
        ctx: &mut ActionContext<'_>,
        requestor: Option<CreatureId>,
        failure: Option<&str>,
    ) {
        match self {
            Action::MoveItem {
                type_id,
                from,
                to,
                amount,
            } => run_move(ctx, requestor, *type_id, *from, *to, *amount),
            Action::UseItem { type_id, at } => run_use(ctx, requestor, *type_id, *at),
            Action::NotifyCancellation => {
                if let Some(requestor) = requestor {
                    notify_cancellation(
                        ctx.registry,
                        requestor,
                        failure.unwrap_or(DEFAULT_REJECTION),
                    );
                }
            }
        }
    }
}

fn run_move(
    ctx: &mut ActionContext<'_>,
    requestor: Option<CreatureId>,
    type_id: ItemTypeId,
    from: Location,
    to: Location,
    amount: u8,
) {
    let world = &mut *ctx.world;
    let mut events: Vec<ContentEvent> = Vec::new();
    let mut touched: Vec<Position> = Vec::new();

    let Some(moving) = take_from_source(world, type_id, from, amount, &mut events, &mut touched)
    else {
        debug!(type_id = type_id.0, "move source no longer matches, dropped");
        return;
    };

    match to {
        Location::Map(position) => {
            let landed = drop_on_tile(world, moving, position, &mut touched);
            ctx.collisions.dispatch(world, position, landed, requestor);
        }
        Location::Container { container, index } => {
            let factory = world.factory.clone();
            let (_, remainder) =
                world
                    .store
                    .add_content(&factory, container, moving, index, &mut events);
            if let Some(rest) = remainder {
                fall_back_to_ground(ctx, requestor, rest, from, &mut touched);
            }
        }
        Location::Slot { creature, slot } => {
            if !world.equip(creature, slot, moving) {
                // Occupied slot: try the source slot back, then the ground.
                let returned = match from {
                    Location::Slot {
                        creature: source_creature,
                        slot: source_slot,
                    } => world.equip(source_creature, source_slot, moving),
                    _ => false,
                };
                if !returned {
                    fall_back_to_ground(ctx, requestor, moving, from, &mut touched);
                }
            }
        }
    }

    let world = &*ctx.world;
    notify_container_events(world, ctx.registry, &events);
    touched.dedup();
    for position in touched {
        notify_tile(ctx.world, ctx.registry, position);
    }
}

/// Detaches the requested amount from the source holder and returns the
/// instance to deliver, or `None` when the source no longer matches the
/// request.
fn take_from_source(
    world: &mut WorldState,
    type_id: ItemTypeId,
    from: Location,
    amount: u8,
    events: &mut Vec<ContentEvent>,
    touched: &mut Vec<Position>,
) -> Option<ItemId> {
    if let Location::Container { container, index } = from {
        let factory = world.factory.clone();
        let (_, taken) =
            world
                .store
                .remove_content(&factory, container, type_id, index, amount, events);
        return taken;
    }

    let item = world.resolve_at(from, type_id)?;
    let current = world.store.get(item)?.amount;
    if amount > current {
        return None;
    }
    let cumulative = world
        .factory
        .types()
        .get(type_id)
        .is_some_and(|item_type| item_type.cumulative);
    let taken = if cumulative && amount < current {
        if let Some(existing) = world.store.get_mut(item) {
            existing.amount = current - amount;
        }
        world.spawn_item(type_id, amount)?
    } else {
        if !world.detach(item, events) {
            return None;
        }
        item
    };
    if let Some(position) = from.map_position() {
        touched.push(position);
    }
    Some(taken)
}

/// Lands an item on a tile, merging into a cumulative top item when the
/// types match. Returns the id that represents the landing afterwards.
fn drop_on_tile(
    world: &mut WorldState,
    moving: ItemId,
    position: Position,
    touched: &mut Vec<Position>,
) -> ItemId {
    touched.push(position);
    let top = world.map.tile(position).and_then(|tile| tile.top_item());
    if let Some(top) = top {
        let joinable = match (world.store.get(top), world.store.get(moving)) {
            (Some(existing), Some(incoming)) => {
                existing.type_id == incoming.type_id
                    && world
                        .factory
                        .types()
                        .get(existing.type_id)
                        .is_some_and(|item_type| item_type.cumulative)
            }
            _ => false,
        };
        if joinable {
            let incoming = world.store.get(moving).map(|item| item.amount).unwrap_or(0);
            let leftover = match world.store.get_mut(top) {
                Some(existing) => existing.absorb(incoming),
                None => incoming,
            };
            if leftover == 0 {
                world.store.discard(moving);
                return top;
            }
            if let Some(item) = world.store.get_mut(moving) {
                item.amount = leftover;
            }
        }
    }
    world.place_on_tile(moving, position);
    moving
}

/// Last resort for a thing that found no room at its destination: throw
/// it to the requestor's feet, or back to the source anchor when the
/// request has no requestor.
fn fall_back_to_ground(
    ctx: &mut ActionContext<'_>,
    requestor: Option<CreatureId>,
    thing: ItemId,
    from: Location,
    touched: &mut Vec<Position>,
) {
    let world = &mut *ctx.world;
    let landing = requestor
        .and_then(|id| world.creature(id).map(|creature| creature.position))
        .or_else(|| world.anchor_position(from));
    let Some(position) = landing else {
        debug!(item = thing.0, "no ground fallback available, item stays detached");
        return;
    };
    let landed = drop_on_tile(world, thing, position, touched);
    ctx.collisions.dispatch(world, position, landed, requestor);
}

fn run_use(
    ctx: &mut ActionContext<'_>,
    requestor: Option<CreatureId>,
    type_id: ItemTypeId,
    at: Location,
) {
    let world = &mut *ctx.world;
    let Some(item) = world.resolve_at(at, type_id) else {
        debug!(type_id = type_id.0, "use target no longer matches, dropped");
        return;
    };
    let Some(requestor) = requestor else {
        return;
    };
    if world.store.get(item).is_some_and(|item| item.is_container()) {
        let open = world
            .store
            .container(item)
            .and_then(|state| state.is_tracking(requestor))
            .is_some();
        if open {
            close_container(world, ctx.registry, requestor, item);
        } else {
            open_container(world, ctx.registry, requestor, item);
        }
        return;
    }
    // The full use-rule catalog lives outside this engine; plain and
    // collision-flagged items just record the use.
    debug!(item = item.0, type_id = type_id.0, requestor = requestor.0, "item used");
}

/// Opens a container for a viewer: allocates a client-local id, starts
/// viewer tracking, and notifies the viewer's connections.
pub fn open_container(
    world: &mut WorldState,
    registry: &mut ConnectionRegistry,
    viewer: CreatureId,
    container: ItemId,
) {
    let Some((item_type, capacity)) = world.store.get(container).and_then(|item| {
        item.container
            .as_ref()
            .map(|state| (item.type_id, state.capacity))
    }) else {
        return;
    };
    let Some(proposed) = world
        .creature(viewer)
        .and_then(|creature| creature.next_container_id())
    else {
        notify_cancellation(registry, viewer, "You cannot open any more containers.");
        return;
    };
    let assigned = match world.store.container(container) {
        Some(state) => state.begin_tracking(viewer, proposed),
        None => return,
    };
    if let Some(creature) = world.creature_mut(viewer) {
        creature.open_containers.insert(assigned, container);
    }
    debug!(viewer = viewer.0, container = container.0, container_id = assigned, "container opened");
    registry.send_to(
        viewer,
        &Notification::ContainerOpened {
            container_id: assigned,
            item_type,
            capacity,
        },
    );
}

/// Closes a container for a viewer; a viewer that never had it open is
/// a no-op.
pub fn close_container(
    world: &mut WorldState,
    registry: &mut ConnectionRegistry,
    viewer: CreatureId,
    container: ItemId,
) {
    let Some(container_id) = world
        .store
        .container(container)
        .and_then(|state| state.is_tracking(viewer))
    else {
        return;
    };
    if let Some(state) = world.store.container(container) {
        state.end_tracking(viewer);
    }
    if let Some(creature) = world.creature_mut(viewer) {
        creature.open_containers.remove(&container_id);
    }
    debug!(viewer = viewer.0, container = container.0, container_id, "container closed");
    registry.send_to(viewer, &Notification::ContainerClosed { container_id });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::entities::creature::Creature;
    use crate::entities::inventory::InventorySlot;
    use crate::entities::item_types::{ItemFactory, ItemType, ItemTypeIndex};
    use crate::world::containers::Cylinder;
    use crate::world::notify::ContainerChange;
    use crate::world::position::CONTENT_INDEX_ANY;
    use std::sync::Arc;

    const BAG: ItemTypeId = ItemTypeId(2853);
    const TORCH: ItemTypeId = ItemTypeId(2920);
    const GOLD: ItemTypeId = ItemTypeId(3031);

    fn world() -> WorldState {
        let mut index = ItemTypeIndex::default();
        let mut bag = ItemType::new(BAG, "bag");
        bag.container = true;
        bag.capacity = Some(2);
        index.insert(bag).expect("bag");
        index.insert(ItemType::new(TORCH, "torch")).expect("torch");
        let mut gold = ItemType::new(GOLD, "gold coin");
        gold.cumulative = true;
        index.insert(gold).expect("gold");
        WorldState::new(EngineConfig::default(), ItemFactory::new(Arc::new(index), 8))
    }

    fn pos(x: u16, y: u16) -> Position {
        Position { x, y, z: 7 }
    }

    fn run(
        world: &mut WorldState,
        registry: &mut ConnectionRegistry,
        action: Action,
        requestor: Option<CreatureId>,
    ) {
        let collisions = CollisionCatalog::default();
        let mut ctx = ActionContext {
            world,
            registry,
            collisions: &collisions,
        };
        action.run(&mut ctx, requestor, None);
    }

    #[test]
    fn move_from_tile_into_container() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(10, 10));
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos(10, 11));

        run(
            &mut world,
            &mut registry,
            Action::MoveItem {
                type_id: TORCH,
                from: Location::Map(pos(10, 11)),
                to: Location::Container {
                    container: bag,
                    index: CONTENT_INDEX_ANY,
                },
                amount: 1,
            },
            None,
        );

        assert_eq!(world.store.container(bag).expect("bag").content, vec![torch]);
        assert_eq!(world.store.parent_of(torch), Some(Cylinder::Container(bag)));
        assert_eq!(world.map.tile(pos(10, 11)).map(|t| t.items.len()), Some(0));
    }

    #[test]
    fn stale_move_request_is_dropped_silently() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(10, 10));

        // Nothing at the source tile anymore.
        run(
            &mut world,
            &mut registry,
            Action::MoveItem {
                type_id: TORCH,
                from: Location::Map(pos(10, 11)),
                to: Location::Container {
                    container: bag,
                    index: CONTENT_INDEX_ANY,
                },
                amount: 1,
            },
            None,
        );
        assert!(world.store.container(bag).expect("bag").content.is_empty());
    }

    #[test]
    fn capacity_remainder_falls_to_the_requestors_feet() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        world.add_creature(Creature::new(CreatureId(1), "Avia", pos(10, 10)));
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(10, 10));
        for _ in 0..2 {
            let filler = world.spawn_item(TORCH, 1).expect("filler");
            let mut events = Vec::new();
            let factory = world.factory.clone();
            world
                .store
                .add_content(&factory, bag, filler, CONTENT_INDEX_ANY, &mut events);
        }
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos(10, 11));

        run(
            &mut world,
            &mut registry,
            Action::MoveItem {
                type_id: TORCH,
                from: Location::Map(pos(10, 11)),
                to: Location::Container {
                    container: bag,
                    index: CONTENT_INDEX_ANY,
                },
                amount: 1,
            },
            Some(CreatureId(1)),
        );

        // Bag stayed full; the torch landed on the requestor's tile.
        assert_eq!(world.store.container(bag).expect("bag").content.len(), 2);
        assert_eq!(world.store.parent_of(torch), Some(Cylinder::Tile(pos(10, 10))));
    }

    #[test]
    fn partial_move_splits_a_map_stack() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        let pile = world.spawn_item(GOLD, 20).expect("pile");
        world.place_on_tile(pile, pos(5, 5));
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(5, 6));

        run(
            &mut world,
            &mut registry,
            Action::MoveItem {
                type_id: GOLD,
                from: Location::Map(pos(5, 5)),
                to: Location::Container {
                    container: bag,
                    index: CONTENT_INDEX_ANY,
                },
                amount: 5,
            },
            None,
        );

        assert_eq!(world.store.get(pile).expect("pile").amount, 15);
        let content = &world.store.container(bag).expect("bag").content;
        assert_eq!(content.len(), 1);
        assert_eq!(world.store.get(content[0]).expect("split").amount, 5);
    }

    #[test]
    fn tile_landing_merges_with_a_cumulative_top_item() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        let pile = world.spawn_item(GOLD, 30).expect("pile");
        world.place_on_tile(pile, pos(8, 8));
        let more = world.spawn_item(GOLD, 20).expect("more");
        world.place_on_tile(more, pos(8, 9));

        run(
            &mut world,
            &mut registry,
            Action::MoveItem {
                type_id: GOLD,
                from: Location::Map(pos(8, 9)),
                to: Location::Map(pos(8, 8)),
                amount: 20,
            },
            None,
        );

        assert_eq!(world.store.get(pile).expect("pile").amount, 50);
        assert!(world.store.get(more).is_none());
        assert_eq!(world.map.tile(pos(8, 8)).map(|t| t.items.len()), Some(1));
    }

    #[test]
    fn displaced_slot_move_returns_to_the_source_slot() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        world.add_creature(Creature::new(CreatureId(1), "Avia", pos(10, 10)));
        let sword = world.spawn_item(TORCH, 1).expect("first");
        let shield = world.spawn_item(TORCH, 1).expect("second");
        assert!(world.equip(CreatureId(1), InventorySlot::LeftHand, sword));
        assert!(world.equip(CreatureId(1), InventorySlot::RightHand, shield));

        run(
            &mut world,
            &mut registry,
            Action::MoveItem {
                type_id: TORCH,
                from: Location::Slot {
                    creature: CreatureId(1),
                    slot: InventorySlot::LeftHand,
                },
                to: Location::Slot {
                    creature: CreatureId(1),
                    slot: InventorySlot::RightHand,
                },
                amount: 1,
            },
            Some(CreatureId(1)),
        );

        let creature = world.creature(CreatureId(1)).expect("creature");
        assert_eq!(creature.inventory.slot(InventorySlot::LeftHand), Some(sword));
        assert_eq!(creature.inventory.slot(InventorySlot::RightHand), Some(shield));
    }

    #[test]
    fn use_item_toggles_container_open_state() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        world.add_creature(Creature::new(CreatureId(1), "Avia", pos(10, 10)));
        let receiver = registry.register(CreatureId(1));
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(10, 10));

        let use_action = Action::UseItem {
            type_id: BAG,
            at: Location::Map(pos(10, 10)),
        };
        run(&mut world, &mut registry, use_action.clone(), Some(CreatureId(1)));
        assert_eq!(
            world
                .store
                .container(bag)
                .expect("bag")
                .is_tracking(CreatureId(1)),
            Some(0)
        );
        assert_eq!(
            receiver.try_recv().ok(),
            Some(Notification::ContainerOpened {
                container_id: 0,
                item_type: BAG,
                capacity: 2,
            })
        );

        run(&mut world, &mut registry, use_action, Some(CreatureId(1)));
        assert_eq!(
            world
                .store
                .container(bag)
                .expect("bag")
                .is_tracking(CreatureId(1)),
            None
        );
        assert_eq!(
            receiver.try_recv().ok(),
            Some(Notification::ContainerClosed { container_id: 0 })
        );
    }

    #[test]
    fn container_moves_notify_tracking_viewers() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        world.add_creature(Creature::new(CreatureId(1), "Avia", pos(200, 200)));
        let receiver = registry.register(CreatureId(1));
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(10, 10));
        world
            .store
            .container(bag)
            .expect("bag")
            .begin_tracking(CreatureId(1), 4);
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos(10, 11));

        run(
            &mut world,
            &mut registry,
            Action::MoveItem {
                type_id: TORCH,
                from: Location::Map(pos(10, 11)),
                to: Location::Container {
                    container: bag,
                    index: CONTENT_INDEX_ANY,
                },
                amount: 1,
            },
            None,
        );

        assert_eq!(
            receiver.try_recv().ok(),
            Some(Notification::ContainerChanged {
                container_id: 4,
                change: ContainerChange::Added {
                    item_type: TORCH,
                    amount: 1
                },
            })
        );
    }

    #[test]
    fn cancellation_reaches_only_the_requestor() {
        let mut world = world();
        let mut registry = ConnectionRegistry::default();
        world.add_creature(Creature::new(CreatureId(1), "Avia", pos(10, 10)));
        let receiver = registry.register(CreatureId(1));

        let collisions = CollisionCatalog::default();
        let mut ctx = ActionContext {
            world: &mut world,
            registry: &mut registry,
            collisions: &collisions,
        };
        Action::NotifyCancellation.run(&mut ctx, Some(CreatureId(1)), Some("Destination is out of range."));

        assert_eq!(
            receiver.try_recv().ok(),
            Some(Notification::MoveCancelled {
                message: "Destination is out of range.".to_string()
            })
        );
    }
}

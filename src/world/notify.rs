use crate::entities::creature::CreatureId;
use crate::entities::item::ItemTypeId;
use crate::world::containers::ContentEvent;
use crate::world::position::Position;
use crate::world::state::WorldState;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::debug;

/// What a tile looks like right now. Built fresh for every fan-out so a
/// spectator never observes a half-applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSnapshot {
    pub position: Position,
    pub ground: Option<ItemTypeId>,
    pub items: Vec<(ItemTypeId, u8)>,
}

impl TileSnapshot {
    pub fn capture(world: &WorldState, position: Position) -> Self {
        let (ground, items) = match world.map.tile(position) {
            Some(tile) => {
                let ground = tile
                    .ground
                    .and_then(|id| world.store.get(id))
                    .map(|item| item.type_id);
                let items = tile
                    .items
                    .iter()
                    .filter_map(|id| world.store.get(*id))
                    .map(|item| (item.type_id, item.amount))
                    .collect();
                (ground, items)
            }
            None => (None, Vec::new()),
        };
        Self {
            position,
            ground,
            items,
        }
    }
}

/// One committed change inside an open container, addressed by the
/// viewer's client-local container id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerChange {
    Added { item_type: ItemTypeId, amount: u8 },
    Updated {
        index: u8,
        item_type: ItemTypeId,
        amount: u8,
    },
    Removed { index: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    TileUpdated(TileSnapshot),
    ContainerChanged {
        container_id: u8,
        change: ContainerChange,
    },
    ContainerOpened {
        container_id: u8,
        item_type: ItemTypeId,
        capacity: u8,
    },
    ContainerClosed { container_id: u8 },
    MoveCancelled { message: String },
}

/// Creature id -> the channels of its live connections. The engine loop
/// owns the registry; connection threads hold the receivers.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<CreatureId, Vec<Sender<Notification>>>,
}

impl ConnectionRegistry {
    pub fn register(&mut self, creature: CreatureId) -> Receiver<Notification> {
        let (sender, receiver) = mpsc::channel();
        self.connections.entry(creature).or_default().push(sender);
        receiver
    }

    /// Sends to every connection of the creature, dropping channels
    /// whose receiver has gone away.
    pub fn send_to(&mut self, creature: CreatureId, notification: &Notification) {
        if let Some(senders) = self.connections.get_mut(&creature) {
            senders.retain(|sender| sender.send(notification.clone()).is_ok());
            if senders.is_empty() {
                self.connections.remove(&creature);
            }
        }
    }
}

/// Fans a fresh snapshot of `position` out to every spectator whose
/// creature stands within the configured viewport.
pub fn notify_tile(world: &WorldState, registry: &mut ConnectionRegistry, position: Position) {
    let snapshot = TileSnapshot::capture(world, position);
    let spectators: Vec<CreatureId> = world
        .creatures()
        .filter(|creature| {
            creature.position.same_floor(position)
                && creature.position.x.abs_diff(position.x) <= world.config.viewport_x
                && creature.position.y.abs_diff(position.y) <= world.config.viewport_y
        })
        .map(|creature| creature.id)
        .collect();
    debug!(x = position.x, y = position.y, z = position.z, spectators = spectators.len(), "tile update");
    let notification = Notification::TileUpdated(snapshot);
    for spectator in spectators {
        registry.send_to(spectator, &notification);
    }
}

/// Routes committed container events to every viewer tracking the
/// container, translated to that viewer's client-local container id.
pub fn notify_container_events(
    world: &WorldState,
    registry: &mut ConnectionRegistry,
    events: &[ContentEvent],
) {
    for event in events {
        let Some(state) = world.store.container(event.container()) else {
            continue;
        };
        for (viewer, container_id) in state.viewers() {
            let change = match *event {
                ContentEvent::Added { item, .. } => {
                    let Some(item) = world.store.get(item) else {
                        continue;
                    };
                    ContainerChange::Added {
                        item_type: item.type_id,
                        amount: item.amount,
                    }
                }
                ContentEvent::Updated { index, item, .. } => {
                    let Some(item) = world.store.get(item) else {
                        continue;
                    };
                    ContainerChange::Updated {
                        index,
                        item_type: item.type_id,
                        amount: item.amount,
                    }
                }
                ContentEvent::Removed { index, .. } => ContainerChange::Removed { index },
            };
            registry.send_to(
                viewer,
                &Notification::ContainerChanged {
                    container_id,
                    change,
                },
            );
        }
    }
}

/// Tells the requestor's connections their request was cancelled.
pub fn notify_cancellation(
    registry: &mut ConnectionRegistry,
    requestor: CreatureId,
    message: &str,
) {
    debug!(requestor = requestor.0, message, "request cancelled");
    registry.send_to(
        requestor,
        &Notification::MoveCancelled {
            message: message.to_string(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::entities::creature::Creature;
    use crate::entities::item_types::{ItemFactory, ItemType, ItemTypeIndex};
    use crate::world::position::CONTENT_INDEX_ANY;
    use std::sync::Arc;

    const BAG: ItemTypeId = ItemTypeId(2853);
    const TORCH: ItemTypeId = ItemTypeId(2920);

    fn world() -> WorldState {
        let mut index = ItemTypeIndex::default();
        let mut bag = ItemType::new(BAG, "bag");
        bag.container = true;
        bag.capacity = Some(8);
        index.insert(bag).expect("bag");
        index.insert(ItemType::new(TORCH, "torch")).expect("torch");
        WorldState::new(EngineConfig::default(), ItemFactory::new(Arc::new(index), 8))
    }

    fn pos(x: u16, y: u16) -> Position {
        Position { x, y, z: 7 }
    }

    #[test]
    fn tile_update_reaches_only_spectators_in_range() {
        let mut world = world();
        world.add_creature(Creature::new(CreatureId(1), "Near", pos(10, 10)));
        world.add_creature(Creature::new(CreatureId(2), "Far", pos(100, 100)));
        let mut registry = ConnectionRegistry::default();
        let near = registry.register(CreatureId(1));
        let far = registry.register(CreatureId(2));

        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos(12, 12));
        notify_tile(&world, &mut registry, pos(12, 12));

        match near.try_recv() {
            Ok(Notification::TileUpdated(snapshot)) => {
                assert_eq!(snapshot.items, vec![(TORCH, 1)]);
            }
            other => panic!("expected tile update, got {other:?}"),
        }
        assert!(far.try_recv().is_err());
    }

    #[test]
    fn container_events_use_the_viewers_client_id() {
        let mut world = world();
        let bag = world.spawn_item(BAG, 1).expect("bag");
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world
            .store
            .container(bag)
            .expect("bag state")
            .begin_tracking(CreatureId(1), 3);
        let mut registry = ConnectionRegistry::default();
        let receiver = registry.register(CreatureId(1));

        let mut events = Vec::new();
        let factory = world.factory.clone();
        world
            .store
            .add_content(&factory, bag, torch, CONTENT_INDEX_ANY, &mut events);
        notify_container_events(&world, &mut registry, &events);

        assert_eq!(
            receiver.try_recv().ok(),
            Some(Notification::ContainerChanged {
                container_id: 3,
                change: ContainerChange::Added {
                    item_type: TORCH,
                    amount: 1
                },
            })
        );
    }

    #[test]
    fn dead_connections_are_pruned_on_send() {
        let mut registry = ConnectionRegistry::default();
        let receiver = registry.register(CreatureId(9));
        drop(receiver);
        notify_cancellation(&mut registry, CreatureId(9), DEFAULT_MESSAGE);
        assert!(registry.connections.get(&CreatureId(9)).is_none());
    }

    const DEFAULT_MESSAGE: &str = "Sorry, not possible.";
}

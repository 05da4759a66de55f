use crate::entities::creature::CreatureId;
use crate::entities::item::{ItemId, ItemTypeId};
use crate::world::actions::{self, ActionContext};
use crate::world::collision::CollisionCatalog;
use crate::world::conditions::DEFAULT_REJECTION;
use crate::world::moves;
use crate::world::notify::{notify_cancellation, ConnectionRegistry, Notification};
use crate::world::position::Location;
use crate::world::scheduler::Scheduler;
use crate::world::state::WorldState;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A request from a connection thread. Commands carry ids and
/// locations only; resolution happens on the engine thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    MoveItem {
        requestor: Option<CreatureId>,
        type_id: ItemTypeId,
        from: Location,
        to: Location,
        amount: u8,
    },
    UseItem {
        requestor: CreatureId,
        type_id: ItemTypeId,
        at: Location,
    },
    OpenContainer {
        viewer: CreatureId,
        container: ItemId,
    },
    CloseContainer {
        viewer: CreatureId,
        container: ItemId,
    },
    Shutdown,
}

/// The authoritative loop. Owns the world outright; connection threads
/// only ever reach it through the command channel.
pub struct Engine {
    world: WorldState,
    registry: ConnectionRegistry,
    collisions: CollisionCatalog,
    scheduler: Scheduler,
    commands: Receiver<EngineCommand>,
    tick: u64,
}

impl Engine {
    pub fn new(world: WorldState, collisions: CollisionCatalog) -> (Self, Sender<EngineCommand>) {
        let (sender, receiver) = mpsc::channel();
        let engine = Self {
            world,
            registry: ConnectionRegistry::default(),
            collisions,
            scheduler: Scheduler::new(),
            commands: receiver,
            tick: 0,
        };
        (engine, sender)
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Registers a connection for a creature; the receiver belongs to
    /// the connection thread.
    pub fn register_connection(&mut self, creature: CreatureId) -> Receiver<Notification> {
        self.registry.register(creature)
    }

    /// Runs until shutdown or until every command sender is gone.
    /// Returns the final world.
    pub fn run(mut self) -> WorldState {
        info!(tick_millis = self.world.config.tick_millis, "engine started");
        loop {
            let deadline =
                Instant::now() + Duration::from_millis(self.world.config.tick_millis);
            loop {
                let timeout = deadline.saturating_duration_since(Instant::now());
                match self.commands.recv_timeout(timeout) {
                    Ok(EngineCommand::Shutdown) => {
                        // Flush what is already queued before stopping.
                        self.advance_tick();
                        info!(tick = self.tick, "engine stopped");
                        return self.world;
                    }
                    Ok(command) => self.apply(command),
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        self.advance_tick();
                        info!(tick = self.tick, "all command senders dropped");
                        return self.world;
                    }
                }
            }
            self.advance_tick();
        }
    }

    /// One synchronous pump: drain pending commands, then advance one
    /// tick. The blocking `run` loop is this plus waiting.
    pub fn pump(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            if matches!(command, EngineCommand::Shutdown) {
                break;
            }
            self.apply(command);
        }
        self.advance_tick();
    }

    fn apply(&mut self, command: EngineCommand) {
        debug!(tick = self.tick, ?command, "command received");
        match command {
            EngineCommand::MoveItem {
                requestor,
                type_id,
                from,
                to,
                amount,
            } => {
                match moves::move_item(requestor, type_id, from, to, amount) {
                    Ok(action) => {
                        let due = self.tick;
                        let mut ctx = ActionContext {
                            world: &mut self.world,
                            registry: &mut self.registry,
                            collisions: &self.collisions,
                        };
                        self.scheduler.schedule(&mut ctx, action, due);
                    }
                    Err(error) => {
                        debug!(%error, "malformed move request");
                        if let Some(requestor) = requestor {
                            notify_cancellation(&mut self.registry, requestor, DEFAULT_REJECTION);
                        }
                    }
                }
            }
            EngineCommand::UseItem {
                requestor,
                type_id,
                at,
            } => match moves::use_item(Some(requestor), type_id, at) {
                Ok(action) => {
                    let due = self.tick;
                    let mut ctx = ActionContext {
                        world: &mut self.world,
                        registry: &mut self.registry,
                        collisions: &self.collisions,
                    };
                    self.scheduler.schedule(&mut ctx, action, due);
                }
                Err(error) => {
                    debug!(%error, "malformed use request");
                    notify_cancellation(&mut self.registry, requestor, DEFAULT_REJECTION);
                }
            },
            EngineCommand::OpenContainer { viewer, container } => {
                actions::open_container(&mut self.world, &mut self.registry, viewer, container);
            }
            EngineCommand::CloseContainer { viewer, container } => {
                actions::close_container(&mut self.world, &mut self.registry, viewer, container);
            }
            EngineCommand::Shutdown => {}
        }
    }

    fn advance_tick(&mut self) {
        self.tick += 1;
        let mut ctx = ActionContext {
            world: &mut self.world,
            registry: &mut self.registry,
            collisions: &self.collisions,
        };
        let processed = self.scheduler.run_due(&mut ctx, self.tick);
        if processed > 0 {
            debug!(tick = self.tick, processed, "tick advanced");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::entities::creature::Creature;
    use crate::entities::item_types::{ItemFactory, ItemType, ItemTypeIndex};
    use crate::world::containers::Cylinder;
    use crate::world::position::{Position, CONTENT_INDEX_ANY};
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
        let mut config = EngineConfig::default();
        config.tick_millis = 1;
        WorldState::new(config, ItemFactory::new(Arc::new(index), 8))
    }

    fn pos(x: u16, y: u16) -> Position {
        Position { x, y, z: 7 }
    }

    #[test]
    fn pump_executes_queued_commands() {
        let mut world = world();
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(10, 10));
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos(10, 11));

        let (mut engine, sender) = Engine::new(world, CollisionCatalog::default());
        sender
            .send(EngineCommand::MoveItem {
                requestor: None,
                type_id: TORCH,
                from: Location::Map(pos(10, 11)),
                to: Location::Container {
                    container: bag,
                    index: CONTENT_INDEX_ANY,
                },
                amount: 1,
            })
            .expect("send");
        engine.pump();

        assert_eq!(
            engine.world().store.parent_of(torch),
            Some(Cylinder::Container(bag))
        );
        assert_eq!(engine.current_tick(), 1);
    }

    #[test]
    fn open_and_close_commands_update_tracking() {
        let mut world = world();
        world.add_creature(Creature::new(CreatureId(1), "Avia", pos(10, 10)));
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(10, 10));

        let (mut engine, sender) = Engine::new(world, CollisionCatalog::default());
        let receiver = engine.register_connection(CreatureId(1));
        sender
            .send(EngineCommand::OpenContainer {
                viewer: CreatureId(1),
                container: bag,
            })
            .expect("send");
        engine.pump();
        assert!(matches!(
            receiver.try_recv().ok(),
            Some(Notification::ContainerOpened { container_id: 0, .. })
        ));

        sender
            .send(EngineCommand::CloseContainer {
                viewer: CreatureId(1),
                container: bag,
            })
            .expect("send");
        engine.pump();
        assert_eq!(
            receiver.try_recv().ok(),
            Some(Notification::ContainerClosed { container_id: 0 })
        );
    }

    #[test]
    fn run_stops_on_shutdown_and_returns_the_world() {
        let mut world = world();
        let bag = world.spawn_item(BAG, 1).expect("bag");
        world.place_on_tile(bag, pos(10, 10));
        let torch = world.spawn_item(TORCH, 1).expect("torch");
        world.place_on_tile(torch, pos(10, 11));

        let (engine, sender) = Engine::new(world, CollisionCatalog::default());
        let handle = std::thread::spawn(move || engine.run());
        sender
            .send(EngineCommand::MoveItem {
                requestor: None,
                type_id: TORCH,
                from: Location::Map(pos(10, 11)),
                to: Location::Container {
                    container: bag,
                    index: CONTENT_INDEX_ANY,
                },
                amount: 1,
            })
            .expect("send move");
        sender.send(EngineCommand::Shutdown).expect("send shutdown");
        let world = handle.join().expect("engine thread");

        assert_eq!(world.store.parent_of(torch), Some(Cylinder::Container(bag)));
    }

    #[test]
    fn invalid_amount_cancels_immediately() {
        let mut world = world();
        world.add_creature(Creature::new(CreatureId(1), "Avia", pos(10, 10)));
        let (mut engine, sender) = Engine::new(world, CollisionCatalog::default());
        let receiver = engine.register_connection(CreatureId(1));

        sender
            .send(EngineCommand::MoveItem {
                requestor: Some(CreatureId(1)),
                type_id: TORCH,
                from: Location::Map(pos(10, 11)),
                to: Location::Map(pos(10, 12)),
                amount: 0,
            })
            .expect("send");
        engine.pump();

        assert!(matches!(
            receiver.try_recv().ok(),
            Some(Notification::MoveCancelled { .. })
        ));
    }
}

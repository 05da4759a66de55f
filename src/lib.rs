pub mod config;
pub mod entities;
pub mod error;
pub mod telemetry;
pub mod world;

pub use config::EngineConfig;
pub use entities::creature::{Creature, CreatureId};
pub use entities::inventory::{Inventory, InventorySlot};
pub use entities::item::{Item, ItemId, ItemTypeId, MAX_STACK_AMOUNT};
pub use entities::item_types::{ItemFactory, ItemType, ItemTypeIndex};
pub use error::{EngineError, EngineResult};
pub use world::engine::{Engine, EngineCommand};
pub use world::notify::Notification;
pub use world::position::{Direction, Location, Position, CONTENT_INDEX_ANY};
pub use world::scheduler::{EvaluationTime, ScheduleOutcome, ScheduledAction, Scheduler};
pub use world::state::WorldState;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use world::collision::{CollisionCatalog, CollisionEffect, CollisionGuard, CollisionHandler};

const GRASS: ItemTypeId = ItemTypeId(101);
const TRAP: ItemTypeId = ItemTypeId(200);
const SPRUNG_TRAP: ItemTypeId = ItemTypeId(201);
const BAG: ItemTypeId = ItemTypeId(2853);
const TORCH: ItemTypeId = ItemTypeId(2920);
const GOLD: ItemTypeId = ItemTypeId(3031);

/// Bootstraps a small demonstration world and runs the engine through a
/// scripted session. Item type and map loading stay out of scope, so
/// the catalog here is hand-seeded.
pub fn run() -> EngineResult<()> {
    telemetry::logging::init();
    let config = EngineConfig::load(Path::new("tarn.yaml"))?;
    info!(tick_millis = config.tick_millis, "configuration loaded");

    let factory = ItemFactory::new(Arc::new(catalog()?), config.default_container_capacity);
    let mut world = WorldState::new(config, factory);
    let hero = CreatureId(1);
    let start = Position { x: 100, y: 100, z: 7 };
    world.add_creature(Creature::new(hero, "Avia", start));
    for dx in 0..4u16 {
        for dy in 0..4u16 {
            let position = Position {
                x: start.x + dx,
                y: start.y + dy,
                z: start.z,
            };
            if let Some(ground) = world.spawn_item(GRASS, 1) {
                world.map.ensure_tile(position).ground = Some(ground);
            }
        }
    }
    let Some(bag) = world.spawn_item(BAG, 1) else {
        return Err(EngineError::unknown_type(BAG));
    };
    world.place_on_tile(bag, start);
    if let Some(torch) = world.spawn_item(TORCH, 1) {
        world.place_on_tile(torch, Position { x: 101, y: 100, z: 7 });
    }
    if let Some(gold) = world.spawn_item(GOLD, 60) {
        world.place_on_tile(gold, Position { x: 102, y: 100, z: 7 });
    }
    if let Some(trap) = world.spawn_item(TRAP, 1) {
        world.place_on_tile(trap, Position { x: 100, y: 101, z: 7 });
    }

    let mut collisions = CollisionCatalog::default();
    collisions.register(CollisionHandler {
        trigger_type_id: TRAP,
        guard: CollisionGuard::Always,
        effect: CollisionEffect::TransformTrigger(SPRUNG_TRAP),
    });

    let (mut engine, commands) = Engine::new(world, collisions);
    let notifications = engine.register_connection(hero);
    let engine_thread = std::thread::spawn(move || engine.run());

    let script = [
        EngineCommand::OpenContainer {
            viewer: hero,
            container: bag,
        },
        EngineCommand::MoveItem {
            requestor: Some(hero),
            type_id: TORCH,
            from: Location::Map(Position { x: 101, y: 100, z: 7 }),
            to: Location::Container {
                container: bag,
                index: CONTENT_INDEX_ANY,
            },
            amount: 1,
        },
        EngineCommand::MoveItem {
            requestor: Some(hero),
            type_id: GOLD,
            from: Location::Map(Position { x: 102, y: 100, z: 7 }),
            to: Location::Map(Position { x: 100, y: 101, z: 7 }),
            amount: 60,
        },
    ];
    for command in script {
        if commands.send(command).is_err() {
            warn!("engine stopped before the script finished");
            break;
        }
    }
    while let Ok(notification) = notifications.recv_timeout(Duration::from_millis(500)) {
        info!(?notification, "client notification");
    }
    if commands.send(EngineCommand::Shutdown).is_ok() {
        match engine_thread.join() {
            Ok(world) => info!(items = world.store.len(), "world shut down"),
            Err(_) => warn!("engine thread panicked"),
        }
    }
    Ok(())
}

fn catalog() -> EngineResult<ItemTypeIndex> {
    let mut index = ItemTypeIndex::default();
    let mut grass = ItemType::new(GRASS, "grass");
    grass.ground = true;
    grass.takeable = false;
    index.insert(grass)?;
    let mut trap = ItemType::new(TRAP, "trap");
    trap.collision_trigger = true;
    index.insert(trap)?;
    index.insert(ItemType::new(SPRUNG_TRAP, "sprung trap"))?;
    let mut bag = ItemType::new(BAG, "bag");
    bag.container = true;
    bag.capacity = Some(8);
    index.insert(bag)?;
    index.insert(ItemType::new(TORCH, "torch"))?;
    let mut gold = ItemType::new(GOLD, "gold coin");
    gold.cumulative = true;
    index.insert(gold)?;
    Ok(index)
}

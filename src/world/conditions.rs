use crate::entities::creature::CreatureId;
use crate::entities::item::{ItemId, ItemTypeId};
use crate::world::position::{Location, Position};
use crate::world::state::WorldState;

/// The stock rejection text clients expect.
pub const DEFAULT_REJECTION: &str = "Sorry, not possible.";

/// Why a condition rejected; carries the message shown to the requestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionFailure {
    pub message: String,
}

impl ConditionFailure {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl Default for ConditionFailure {
    fn default() -> Self {
        Self::new(DEFAULT_REJECTION)
    }
}

/// A deferred precondition. Conditions are plain data bound to request
/// parameters; they read the live world at whatever instant they are
/// checked, so a stale request simply fails instead of acting on a
/// world that no longer matches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Destination tile exists and has a ground layer.
    LocationHasGround(Location),
    /// No blocking item sits on the destination tile.
    LocationNotObstructed(Location),
    /// The source holder still has the requested item, at or above the
    /// requested amount.
    SourceHasItem {
        source: Location,
        type_id: ItemTypeId,
        amount: u8,
    },
    /// The requestor currently has this container open.
    ContainerOpenByRequestor(ItemId),
    /// Both anchors share a floor and lie within the throw range.
    WithinThrowRange { from: Location, to: Location },
}

impl Condition {
    pub fn check(
        &self,
        world: &WorldState,
        requestor: Option<CreatureId>,
    ) -> Result<(), ConditionFailure> {
        match self {
            Condition::LocationHasGround(location) => {
                let grounded = location
                    .map_position()
                    .and_then(|position| world.map.tile(position))
                    .is_some_and(|tile| tile.has_ground());
                if grounded {
                    Ok(())
                } else {
                    Err(ConditionFailure::default())
                }
            }
            Condition::LocationNotObstructed(location) => {
                let Some(position) = location.map_position() else {
                    return Err(ConditionFailure::default());
                };
                if tile_blocked(world, position) {
                    Err(ConditionFailure::new("There is not enough room."))
                } else {
                    Ok(())
                }
            }
            Condition::SourceHasItem {
                source,
                type_id,
                amount,
            } => {
                let enough = world
                    .resolve_at(*source, *type_id)
                    .and_then(|id| world.store.get(id))
                    .is_some_and(|item| item.amount >= *amount);
                if enough {
                    Ok(())
                } else {
                    Err(ConditionFailure::default())
                }
            }
            Condition::ContainerOpenByRequestor(container) => {
                let open = requestor.is_some_and(|viewer| {
                    world
                        .store
                        .container(*container)
                        .and_then(|state| state.is_tracking(viewer))
                        .is_some()
                });
                if open {
                    Ok(())
                } else {
                    Err(ConditionFailure::default())
                }
            }
            Condition::WithinThrowRange { from, to } => {
                let (Some(from), Some(to)) =
                    (world.anchor_position(*from), world.anchor_position(*to))
                else {
                    return Err(ConditionFailure::default());
                };
                if !from.same_floor(to)
                    || from.chebyshev_distance(to) > world.config.throw_range
                {
                    return Err(ConditionFailure::new("Destination is out of range."));
                }
                if !line_is_clear(world, from, to) {
                    return Err(ConditionFailure::new("You cannot throw there."));
                }
                Ok(())
            }
        }
    }
}

fn tile_blocked(world: &WorldState, position: Position) -> bool {
    // A tile that does not exist cannot obstruct; the ground condition
    // is what rejects the void.
    world.map.tile(position).is_some_and(|tile| {
        tile.items.iter().any(|id| {
            world
                .store
                .get(*id)
                .and_then(|item| world.factory.types().get(item.type_id))
                .is_some_and(|item_type| item_type.blocking)
        })
    })
}

/// Bresenham walk between the two positions; the endpoints themselves
/// are exempt, only the tiles in between can block the throw.
fn line_is_clear(world: &WorldState, from: Position, to: Position) -> bool {
    let (mut x, mut y) = (i32::from(from.x), i32::from(from.y));
    let (tx, ty) = (i32::from(to.x), i32::from(to.y));
    let dx = (tx - x).abs();
    let dy = -(ty - y).abs();
    let sx = if x < tx { 1 } else { -1 };
    let sy = if y < ty { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        if x == tx && y == ty {
            return true;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        if x == tx && y == ty {
            return true;
        }
        let step = Position {
            x: x as u16,
            y: y as u16,
            z: from.z,
        };
        if tile_blocked(world, step) {
            return false;
        }
    }
}

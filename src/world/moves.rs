use crate::entities::creature::CreatureId;
use crate::entities::item::ItemTypeId;
use crate::error::{EngineError, EngineResult};
use crate::world::actions::Action;
use crate::world::conditions::Condition;
use crate::world::position::Location;
use crate::world::scheduler::{EvaluationTime, ScheduledAction};

/// Builds the scheduled action for a move request. The condition list
/// is assembled from the source and destination kinds; every holder
/// pairing goes through this one builder instead of a hand-written
/// variant per pairing.
pub fn move_item(
    requestor: Option<CreatureId>,
    type_id: ItemTypeId,
    from: Location,
    to: Location,
    amount: u8,
) -> EngineResult<ScheduledAction> {
    if amount == 0 {
        return Err(EngineError::InvalidAmount);
    }

    let mut conditions = Vec::new();
    if requestor.is_some() && to.is_map() {
        conditions.push(Condition::WithinThrowRange { from, to });
    }
    if let Location::Container { container, .. } = from {
        conditions.push(Condition::ContainerOpenByRequestor(container));
    }
    conditions.push(Condition::SourceHasItem {
        source: from,
        type_id,
        amount,
    });
    if to.is_map() {
        conditions.push(Condition::LocationNotObstructed(to));
        conditions.push(Condition::LocationHasGround(to));
    }

    // Throws out of the body are the one pairing checked twice; every
    // other move is checked only when it runs.
    let evaluation = match (from, to) {
        (Location::Slot { .. }, Location::Map(_)) => EvaluationTime::OnBoth,
        _ => EvaluationTime::OnExecute,
    };

    Ok(ScheduledAction {
        requestor,
        evaluation,
        conditions,
        on_pass: vec![Action::MoveItem {
            type_id,
            from,
            to,
            amount,
        }],
        on_fail: fail_path(requestor),
    })
}

/// Builds the scheduled action for a use request.
pub fn use_item(
    requestor: Option<CreatureId>,
    type_id: ItemTypeId,
    at: Location,
) -> EngineResult<ScheduledAction> {
    let mut conditions = Vec::new();
    if let Location::Container { container, .. } = at {
        conditions.push(Condition::ContainerOpenByRequestor(container));
    }
    conditions.push(Condition::SourceHasItem {
        source: at,
        type_id,
        amount: 1,
    });

    Ok(ScheduledAction {
        requestor,
        evaluation: EvaluationTime::OnBoth,
        conditions,
        on_pass: vec![Action::UseItem { type_id, at }],
        on_fail: fail_path(requestor),
    })
}

fn fail_path(requestor: Option<CreatureId>) -> Vec<Action> {
    if requestor.is_some() {
        vec![Action::NotifyCancellation]
    } else {
        Vec::new()
    }
}

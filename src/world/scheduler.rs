use crate::entities::creature::CreatureId;
use crate::world::actions::{Action, ActionContext};
use crate::world::conditions::{Condition, ConditionFailure};
use crate::world::state::WorldState;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// When a scheduled action's conditions are checked against the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationTime {
    OnSchedule,
    OnExecute,
    OnBoth,
}

impl EvaluationTime {
    fn checks_on_schedule(self) -> bool {
        matches!(self, EvaluationTime::OnSchedule | EvaluationTime::OnBoth)
    }

    fn checks_on_execute(self) -> bool {
        matches!(self, EvaluationTime::OnExecute | EvaluationTime::OnBoth)
    }
}

/// A request frozen as data: conditions to re-check and the effects for
/// either verdict. Evaluated once at its due tick (and optionally at
/// schedule time), then gone; there is no retry and no cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAction {
    pub requestor: Option<CreatureId>,
    pub evaluation: EvaluationTime,
    pub conditions: Vec<Condition>,
    pub on_pass: Vec<Action>,
    pub on_fail: Vec<Action>,
}

impl ScheduledAction {
    /// First failing condition, in registration order. Short-circuits.
    fn first_failure(&self, world: &WorldState) -> Option<ConditionFailure> {
        self.conditions
            .iter()
            .find_map(|condition| condition.check(world, self.requestor).err())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Queued,
    /// Conditions failed at schedule time; `on_fail` already ran.
    Rejected,
}

#[derive(Debug)]
struct Entry {
    due_tick: u64,
    seq: u64,
    action: ScheduledAction,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due_tick == other.due_tick && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the BinaryHeap pops the earliest (due_tick, seq)
    // first; seq breaks same-tick ties in enqueue order.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due_tick, other.seq).cmp(&(self.due_tick, self.seq))
    }
}

/// Time-ordered action queue over virtual ticks.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Entry>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueues an action for `due_tick`. `OnSchedule`/`OnBoth` actions
    /// are checked now; a failure runs `on_fail` synchronously with the
    /// failing message and never enqueues.
    pub fn schedule(
        &mut self,
        ctx: &mut ActionContext<'_>,
        action: ScheduledAction,
        due_tick: u64,
    ) -> ScheduleOutcome {
        if action.evaluation.checks_on_schedule() {
            if let Some(failure) = action.first_failure(ctx.world) {
                debug!(due_tick, message = %failure.message, "rejected at schedule time");
                run_all(&action.on_fail, ctx, action.requestor, Some(&failure.message));
                return ScheduleOutcome::Rejected;
            }
        }
        self.seq += 1;
        self.queue.push(Entry {
            due_tick,
            seq: self.seq,
            action,
        });
        debug!(due_tick, queued = self.queue.len(), "action queued");
        ScheduleOutcome::Queued
    }

    /// Runs every action due at or before `now`, in (due_tick, enqueue)
    /// order, re-checking `OnExecute`/`OnBoth` conditions against the
    /// world as it is NOW, not as it was at schedule time. Returns the
    /// number of actions processed.
    pub fn run_due(&mut self, ctx: &mut ActionContext<'_>, now: u64) -> usize {
        let mut processed = 0;
        while self
            .queue
            .peek()
            .is_some_and(|entry| entry.due_tick <= now)
        {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            let action = entry.action;
            processed += 1;
            if action.evaluation.checks_on_execute() {
                if let Some(failure) = action.first_failure(ctx.world) {
                    debug!(due_tick = entry.due_tick, message = %failure.message, "failed at execute time");
                    run_all(&action.on_fail, ctx, action.requestor, Some(&failure.message));
                    continue;
                }
            }
            run_all(&action.on_pass, ctx, action.requestor, None);
        }
        processed
    }
}

fn run_all(
    actions: &[Action],
    ctx: &mut ActionContext<'_>,
    requestor: Option<CreatureId>,
    failure: Option<&str>,
) {
    for action in actions {
        action.run(ctx, requestor, failure);
    }
}

//! # Trigger tags, event info, and the readiness evaluator
//!
//! `spec.md` §4.3: one pass over the chain tags each task with the first
//! matching trigger in a fixed precedence order. This module owns that
//! precedence (`evaluate`), the trigger tag itself (`Trigger`), and the
//! struct handed to callbacks on dispatch (`EventInfo`, reused and reset
//! between calls per §3).

use crate::task::{Task, TaskFlags, UserData};

/// Why a task was made ready, or why the dispatcher was invoked with no
/// task at all. Precedence order matches `spec.md` §4.3: time, then queue
/// sub-triggers in the order listed, then notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    #[default]
    None,
    TimeElapsed,
    QueueFull,
    QueueCount,
    QueueReceiver,
    QueueEmpty,
    NotificationSimple,
    /// Synthesized by the scheduler for a cell popped off the priority
    /// queue, ahead of the ready sweep (`spec.md` §4.2/§4.4).
    NotificationQueued,
    /// Synthesized when the ready sweep found nothing to dispatch.
    NoReadyTasks,
}

/// The struct passed to every callback, FSM, and the idle hook. One
/// instance lives in the scheduler and is reset between dispatches —
/// callbacks never own it.
#[derive(Debug, Clone, Copy)]
pub struct EventInfo {
    pub trigger: Trigger,
    /// True the first time this task is ever dispatched (`!init_done`
    /// at entry).
    pub first_call: bool,
    /// True on the dispatch that consumes the negated-initial iteration
    /// count (`spec.md` §3, §4.4).
    pub first_iteration: bool,
    /// True iff this dispatch decremented `iterations` to zero.
    pub last_iteration: bool,
    /// The dispatched task's `user_data`, unconditionally.
    pub task_data: UserData,
    /// Trigger-dependent payload — see `spec.md` §4.4's per-trigger table.
    pub event_data: UserData,
}

impl EventInfo {
    pub const fn new() -> Self {
        EventInfo {
            trigger: Trigger::None,
            first_call: false,
            first_iteration: false,
            last_iteration: false,
            task_data: UserData::NONE,
            event_data: UserData::NONE,
        }
    }

    /// Reset to the idle state between dispatches, per `spec.md` §3
    /// ("reused across dispatches, reset between them").
    pub fn reset(&mut self) {
        *self = EventInfo::new();
    }
}

impl Default for EventInfo {
    fn default() -> Self {
        EventInfo::new()
    }
}

/// One task's readiness check, in the fixed precedence of `spec.md` §4.3.
///
/// On a `TimeElapsed` match this resets `task.clock_start` to `now`
/// (the trigger's side effect happens here, at evaluation time, not at
/// dispatch — matching the original's `_qScheduler_ReadySweep`). Returns
/// `None` if the task should stay `Suspended`.
pub fn evaluate(task: &mut Task, now: u32) -> Option<Trigger> {
    if !task.flags.contains(TaskFlags::ENABLED) {
        return None;
    }

    let has_remaining_work = task.iterations == crate::config::PERIODIC || task.iterations != 0;
    let deadline_reached = task.interval == 0 || now.wrapping_sub(task.clock_start) >= task.interval;
    if has_remaining_work && deadline_reached {
        task.clock_start = now;
        return Some(Trigger::TimeElapsed);
    }

    #[cfg(feature = "queues")]
    if let Some(queue) = task.queue_ref {
        // SAFETY: `queue_ref`, when set, points at a `QueueEvents` object
        // the owning task outlives, per `Task::attach_queue`'s contract.
        let queue = unsafe { queue.as_ref() };
        if task.flags.contains(TaskFlags::QUEUE_FULL) && queue.is_full() {
            return Some(Trigger::QueueFull);
        }
        if task.queue_count_threshold > 0 && queue.count() >= task.queue_count_threshold as usize {
            return Some(Trigger::QueueCount);
        }
        if task.flags.contains(TaskFlags::QUEUE_RECEIVER) && queue.count() > 0 {
            return Some(Trigger::QueueReceiver);
        }
        if task.flags.contains(TaskFlags::QUEUE_EMPTY) && queue.is_empty() {
            return Some(Trigger::QueueEmpty);
        }
    }

    if task.notification_count > 0 {
        return Some(Trigger::NotificationSimple);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PERIODIC;
    use crate::fsm::Fsm;
    use crate::coroutine::Coroutine;

    fn blank_task() -> Task {
        Task {
            callback: None,
            interval: 0,
            iterations: 1,
            priority: 0,
            flags: TaskFlags::ENABLED,
            queue_count_threshold: 0,
            notification_count: 0,
            async_data: UserData::NONE,
            clock_start: 0,
            queue_ref: None,
            fsm_ref: None,
            parser_ref: None,
            coroutine: Coroutine::new(),
            user_data: UserData::NONE,
            state: crate::task::TaskState::Suspended,
            trigger: Trigger::None,
            next: None,
            cycles: 0,
        }
    }

    #[test]
    fn disabled_task_never_matches() {
        let mut t = blank_task();
        t.flags = TaskFlags::empty();
        t.notification_count = 1;
        assert_eq!(evaluate(&mut t, 100), None);
    }

    #[test]
    fn time_elapsed_takes_precedence_and_resets_clock() {
        let mut t = blank_task();
        t.interval = 10;
        t.clock_start = 0;
        t.notification_count = 5;
        assert_eq!(evaluate(&mut t, 10), Some(Trigger::TimeElapsed));
        assert_eq!(t.clock_start, 10);
    }

    #[test]
    fn interval_zero_is_always_due() {
        let mut t = blank_task();
        t.interval = 0;
        assert_eq!(evaluate(&mut t, 0), Some(Trigger::TimeElapsed));
    }

    #[test]
    fn periodic_never_exhausts() {
        let mut t = blank_task();
        t.interval = 0;
        t.iterations = PERIODIC;
        assert_eq!(evaluate(&mut t, 0), Some(Trigger::TimeElapsed));
    }

    #[test]
    fn exhausted_iterations_are_not_time_ready() {
        let mut t = blank_task();
        t.interval = 0;
        t.iterations = 0;
        t.notification_count = 1;
        assert_eq!(evaluate(&mut t, 0), Some(Trigger::NotificationSimple));
    }

    #[test]
    fn notification_is_last_resort() {
        let mut t = blank_task();
        t.interval = 100;
        t.clock_start = 0;
        t.notification_count = 1;
        assert_eq!(evaluate(&mut t, 1), Some(Trigger::NotificationSimple));
    }

    #[test]
    fn no_trigger_leaves_task_suspended() {
        let mut t = blank_task();
        t.interval = 100;
        t.clock_start = 0;
        assert_eq!(evaluate(&mut t, 1), None);
    }
}

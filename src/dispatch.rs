//! # Dispatcher
//!
//! `spec.md` §4.4: assembles the per-trigger [`crate::event::EventInfo`],
//! invokes the task's callback (or its FSM or bound AT-command parser, if
//! the callback equals the `FSM_BODY`/`PARSER_BODY` sentinel), and
//! performs the dispatch-round bookkeeping
//! (`first_call`/`first_iteration`/`last_iteration`, `init_done`,
//! `cycles`, `current_running`). Ported from
//! `original_source/src/os/qkernel.c`'s `qScheduler_Dispatch`.

use crate::config::PERIODIC;
use crate::event::{EventInfo, Trigger};
use crate::fsm::StateStatus;
use crate::task::{Task, TaskFlags, TaskState};

/// Sentinel callback value: a task whose callback equals this, and which
/// has an `fsm_ref` installed, is dispatched through its FSM instead of
/// calling the sentinel (`spec.md` §3 "`fsm_ref`" / §4.4).
pub fn fsm_body(_info: &mut EventInfo) {}

/// One dispatch round for a single task. `info` is the scheduler's single
/// reused [`EventInfo`] instance (`spec.md` §3: "reused across dispatches,
/// reset between them").
///
/// Returns the FSM's [`StateStatus`] when the task is FSM-bodied, so
/// callers that care (tests, `spread_notification`-adjacent tooling) can
/// observe the outcome; plain-callback tasks always return `None`.
///
/// `queued_payload` is only consulted for `Trigger::NotificationQueued` —
/// the payload staged by the scheduler's priority-queue extraction
/// (`spec.md` §4.2/§4.4); every other trigger ignores it.
pub fn dispatch(
    task: &mut Task,
    trigger: Trigger,
    info: &mut EventInfo,
    queued_payload: crate::task::UserData,
) -> Option<StateStatus> {
    info.reset();
    info.trigger = trigger;
    info.first_call = !task.flags.contains(TaskFlags::INIT_DONE);
    info.task_data = task.user_data;

    match trigger {
        Trigger::TimeElapsed => {
            if task.iterations != PERIODIC && task.iterations < 0 {
                info.first_iteration = true;
                task.iterations = -task.iterations;
            }
            if task.iterations != PERIODIC {
                task.iterations -= 1;
                info.last_iteration = task.iterations == 0;
                if info.last_iteration {
                    task.flags.remove(TaskFlags::ENABLED);
                }
            }
        }
        Trigger::NotificationSimple => {
            info.event_data = task.async_data;
            task.notification_count = task.notification_count.saturating_sub(1);
        }
        Trigger::QueueReceiver => {
            if let Some(queue) = task.queue_ref {
                // SAFETY: see `crate::event::evaluate`.
                let front = unsafe { queue.as_ref() }.peek_front_ptr();
                info.event_data = crate::task::UserData::from_nonnull(front);
            }
        }
        Trigger::QueueFull | Trigger::QueueCount | Trigger::QueueEmpty => {
            if let Some(queue) = task.queue_ref {
                let handle = core::ptr::NonNull::new(queue.as_ptr() as *mut ());
                info.event_data = crate::task::UserData::from_nonnull(handle);
            }
        }
        Trigger::NotificationQueued => {
            info.event_data = queued_payload;
        }
        Trigger::None | Trigger::NoReadyTasks => {}
    }

    task.state = TaskState::Running;

    let fsm_status = match task.fsm_ref {
        Some(mut fsm) if is_fsm_body(task.callback) => {
            // SAFETY: `fsm_ref`, when set, points at storage the owning
            // task outlives (same arena, no ownership transfer).
            let fsm = unsafe { fsm.as_mut() };
            fsm.run(info.task_data).ok()
        }
        _ => match task.parser_ref {
            Some(mut parser) if is_parser_body(task.callback) => {
                // SAFETY: `parser_ref`, when set, points at storage the
                // owning task outlives, same contract as `fsm_ref`.
                let parser = unsafe { parser.as_mut() };
                crate::atparser::run_parser(parser);
                None
            }
            _ => {
                if let Some(cb) = task.callback {
                    cb(info);
                }
                None
            }
        },
    };

    if trigger == Trigger::QueueReceiver {
        if let Some(mut queue) = task.queue_ref {
            unsafe { queue.as_mut() }.remove_front();
        }
    }

    task.flags.insert(TaskFlags::INIT_DONE);
    info.first_iteration = false;
    info.last_iteration = false;
    info.event_data = crate::task::UserData::NONE;
    #[cfg(feature = "cycle-counting")]
    if task.is_enabled() {
        task.cycles = task.cycles.wrapping_add(1);
    }
    task.state = TaskState::Suspended;

    fsm_status
}

fn is_fsm_body(callback: Option<crate::task::TaskFn>) -> bool {
    matches!(callback, Some(cb) if cb as usize == fsm_body as usize)
}

fn is_parser_body(callback: Option<crate::task::TaskFn>) -> bool {
    matches!(callback, Some(cb) if cb as usize == crate::atparser::parser_body as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::UserData;

    fn blank_task() -> Task {
        Task {
            callback: None,
            interval: 0,
            iterations: -1,
            priority: 0,
            flags: TaskFlags::ENABLED,
            queue_count_threshold: 0,
            notification_count: 0,
            async_data: UserData::NONE,
            clock_start: 0,
            queue_ref: None,
            fsm_ref: None,
            parser_ref: None,
            coroutine: crate::coroutine::Coroutine::new(),
            user_data: UserData::NONE,
            state: TaskState::Suspended,
            trigger: Trigger::None,
            next: None,
            cycles: 0,
        }
    }

    static mut CALLS: u32 = 0;
    fn counting_cb(_info: &mut EventInfo) {
        unsafe { CALLS += 1 };
    }

    #[test]
    fn first_iteration_flag_set_exactly_once_p4() {
        unsafe { CALLS = 0 };
        let mut t = blank_task();
        t.callback = Some(counting_cb);
        let mut info = EventInfo::new();

        dispatch(&mut t, Trigger::TimeElapsed, &mut info, UserData::NONE);
        assert!(info.first_iteration);
        assert_eq!(t.iterations, 0);
        assert!(info.last_iteration);
        assert!(!t.is_enabled(), "single-shot task disables itself (S2)");
    }

    #[test]
    fn periodic_task_never_consumes_first_iteration_twice() {
        unsafe { CALLS = 0 };
        let mut t = blank_task();
        t.iterations = PERIODIC;
        t.callback = Some(counting_cb);
        let mut info = EventInfo::new();

        dispatch(&mut t, Trigger::TimeElapsed, &mut info, UserData::NONE);
        assert!(!info.first_iteration);
        assert_eq!(t.iterations, PERIODIC);
        assert!(t.is_enabled());
    }

    #[test]
    fn notification_copies_payload_and_decrements_count() {
        let mut t = blank_task();
        t.notification_count = 2;
        let mut x = 7u32;
        t.async_data = UserData::from_ref(&mut x);
        t.callback = Some(counting_cb);
        let mut info = EventInfo::new();

        dispatch(&mut t, Trigger::NotificationSimple, &mut info, UserData::NONE);
        assert_eq!(t.notification_count, 1);
        unsafe {
            assert_eq!(*info.event_data.as_ref::<u32>().unwrap(), 7);
        }
    }

    #[test]
    fn init_done_set_after_first_dispatch() {
        let mut t = blank_task();
        t.callback = Some(counting_cb);
        let mut info = EventInfo::new();
        dispatch(&mut t, Trigger::TimeElapsed, &mut info, UserData::NONE);
        assert!(t.flags.contains(TaskFlags::INIT_DONE));

        let mut info2 = EventInfo::new();
        t.iterations = PERIODIC;
        t.flags.insert(TaskFlags::ENABLED);
        dispatch(&mut t, Trigger::TimeElapsed, &mut info2, UserData::NONE);
        assert!(!info2.first_call);
    }

    struct CountingParser {
        runs: u32,
    }

    impl crate::atparser::AtParser for CountingParser {
        fn run(&mut self) {
            self.runs += 1;
        }
    }

    #[test]
    fn parser_body_sentinel_runs_the_bound_parser_instead_of_the_callback() {
        let mut parser = CountingParser { runs: 0 };
        let mut t = blank_task();
        t.callback = Some(crate::atparser::parser_body);
        t.parser_ref = core::ptr::NonNull::new(&mut parser as &mut dyn crate::atparser::AtParser as *mut dyn crate::atparser::AtParser);
        let mut info = EventInfo::new();

        dispatch(&mut t, Trigger::TimeElapsed, &mut info, UserData::NONE);
        assert_eq!(parser.runs, 1);
    }
}

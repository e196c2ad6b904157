//! # Kernel public API
//!
//! `spec.md` §6: the functions application code actually calls. Wraps one
//! process-wide [`Scheduler`] singleton (`spec.md` §9 Design Notes) behind
//! a boolean/`Option` boundary — every public function here converts the
//! scheduler's internal [`KernelError`] into the "did it work" contract
//! `spec.md` §7 mandates, logging the classified reason via `log::warn!`
//! before discarding it.
//!
//! Ported in spirit from the teacher's `kernel.rs` (`static mut SCHEDULER`,
//! `init`/API wrapper shape) but the scheduling discipline underneath is
//! entirely different: no SysTick, no PendSV, no per-task stack — see
//! `scheduler.rs`.

use log::{debug, trace, warn};

use crate::clock::TickProviderFn;
use crate::error::KernelError;
use crate::fsm::{Attribute, Fsm, StateFn, SubstateFn};
use crate::scheduler::{IdleFn, ReleaseFn, Scheduler, SpreadFn};
use crate::task::{TaskHandle, UserData};

static mut SCHEDULER: Scheduler = Scheduler::new();
static mut RUNNING: bool = false;

fn scheduler() -> &'static mut Scheduler {
    // SAFETY: the kernel API is documented as single-threaded-cooperative
    // (`spec.md` §5) except for the four ISR-safe entry points, which
    // bracket their mutation in `critical_section` internally
    // (`scheduler.rs`'s `pqueue_insert`/`remove_task`). There is exactly
    // one kernel per core, matching the embedded domain's reality
    // (`spec.md` §9 Design Notes).
    unsafe { &mut *core::ptr::addr_of_mut!(SCHEDULER) }
}

/// `init_scheduler(tick_provider, idle_cb, ...)` — `spec.md` §6. The
/// priority queue and task-chain storage are fixed-capacity internals
/// (`config::MAX_TASKS`/`config::PQUEUE_SIZE`) rather than caller-supplied
/// arenas — see `DESIGN.md` for why this deviates from the byte-queue
/// collaborator's caller-owned-storage shape.
pub fn init_scheduler(tick_provider: TickProviderFn, idle_cb: Option<IdleFn>) {
    let s = scheduler();
    s.set_tick_provider(tick_provider);
    s.set_idle(idle_cb);
    debug!("scheduler initialized");
}

/// `add_task` — `spec.md` §6.
pub fn add_task(
    cb: crate::task::TaskFn,
    priority: u8,
    interval: u32,
    iterations: i32,
    initial_enable: bool,
    user_data: UserData,
) -> Option<TaskHandle> {
    let handle = scheduler().add_task(Some(cb), priority, interval, iterations, initial_enable, user_data);
    match handle {
        Some(h) => {
            trace!("task added, priority={priority}");
            Some(h)
        }
        None => {
            warn!("add_task failed: {:?}", KernelError::CapacityExceeded);
            None
        }
    }
}

/// `add_event_task` — shorthand: immediate interval, single-shot,
/// disabled (`spec.md` §6).
pub fn add_event_task(cb: crate::task::TaskFn, priority: u8, user_data: UserData) -> Option<TaskHandle> {
    add_task(cb, priority, 0, 1, false, user_data)
}

/// `add_fsm_task` — `spec.md` §6. Binds `fsm` (which must outlive the
/// task) to a task whose callback is the `FSM_BODY` sentinel
/// ([`crate::dispatch::fsm_body`]); `dispatch.rs` recognizes the sentinel
/// and runs the FSM instead of calling it. Only available when the `fsm`
/// Cargo feature is enabled (default); with it disabled there is no way
/// to attach an FSM to a task, matching `Q_FSM` gating the subsystem out
/// of the original build entirely.
#[cfg(feature = "fsm")]
#[allow(clippy::too_many_arguments)]
pub fn add_fsm_task(
    priority: u8,
    interval: u32,
    fsm: &'static mut Fsm,
    init_state: StateFn,
    before: Option<SubstateFn>,
    success: Option<SubstateFn>,
    failure: Option<SubstateFn>,
    unexpected: Option<SubstateFn>,
    initial_enable: bool,
    user_data: UserData,
) -> Option<TaskHandle> {
    fsm.setup(init_state);
    if let Some(f) = before {
        fsm.attribute(Attribute::SetBeforeAny(f));
    }
    if let Some(f) = success {
        fsm.attribute(Attribute::SetSuccess(f));
    }
    if let Some(f) = failure {
        fsm.attribute(Attribute::SetFailure(f));
    }
    if let Some(f) = unexpected {
        fsm.attribute(Attribute::SetUnexpected(f));
    }

    let handle = scheduler().add_task(
        Some(crate::dispatch::fsm_body),
        priority,
        interval,
        crate::config::PERIODIC,
        initial_enable,
        user_data,
    )?;
    let task = scheduler().task_mut(handle)?;
    task.fsm_ref = core::ptr::NonNull::new(fsm as *mut Fsm);
    trace!("fsm task added, priority={priority}");
    Some(handle)
}

/// `add_parser_task` — `spec.md` §6 / `SPEC_FULL.md` §5: wraps an
/// [`crate::atparser::AtParser`] as a disabled, single-shot, immediate
/// task whose callback is the `PARSER_BODY` sentinel
/// ([`crate::atparser::parser_body`]); `dispatch.rs` recognizes the
/// sentinel the same way it recognizes `dispatch::fsm_body` for an
/// `fsm_ref` and runs the bound parser instead of calling it. Only
/// available when the `at-parser` Cargo feature is enabled.
#[cfg(feature = "at-parser")]
pub fn add_parser_task(parser: &'static mut dyn crate::atparser::AtParser, priority: u8) -> Option<TaskHandle> {
    let handle = scheduler().add_task(Some(crate::atparser::parser_body), priority, 0, 1, false, UserData::NONE)?;
    let task = scheduler().task_mut(handle)?;
    task.parser_ref = core::ptr::NonNull::new(parser as *mut dyn crate::atparser::AtParser);
    trace!("parser task added, priority={priority}");
    Some(handle)
}

/// `remove_task` — `spec.md` §6. `false` if `handle` is not currently in
/// the chain (`StateViolation`).
pub fn remove_task(handle: TaskHandle) -> bool {
    let ok = scheduler().remove_task(handle);
    if !ok {
        warn!("remove_task failed: {:?}", KernelError::StateViolation);
    } else {
        trace!("task removed");
    }
    ok
}

/// Change a task's priority at runtime; marks the chain dirty so the next
/// scheduling iteration rebuilds it (`spec.md` §4.1 Auto-rearrange).
pub fn set_task_priority(handle: TaskHandle, priority: u8) -> bool {
    let Some(task) = scheduler().task_mut(handle) else {
        warn!("set_task_priority failed: {:?}", KernelError::InvalidArgument);
        return false;
    };
    task.set_priority(priority);
    scheduler().mark_chain_dirty();
    true
}

/// Force an immediate chain rebuild. A no-op convenience when the
/// `auto-rearrange` feature is enabled (the next `run()` iteration would
/// rebuild anyway); required when it's disabled, since nothing else calls
/// [`Scheduler::rearrange_chain`] in that configuration.
pub fn rearrange_chain() {
    scheduler().rearrange_chain();
}

pub fn set_idle(cb: Option<IdleFn>) {
    scheduler().set_idle(cb);
}

pub fn set_release_callback(cb: Option<ReleaseFn>) {
    scheduler().set_release_callback(cb);
}

/// `release()` — `spec.md` §6: request `run()`'s loop to exit.
pub fn release() {
    scheduler().release();
}

/// `spread_notification` — `spec.md` §6.
pub fn spread_notification(data: UserData, mode_fn: SpreadFn) -> bool {
    scheduler().spread_notification(data, mode_fn)
}

/// `pqueue_insert` — ISR-safe entry point, `spec.md` §5/§6.
pub fn pqueue_insert(task: TaskHandle, priority: u8, payload: UserData) -> bool {
    let ok = scheduler().pqueue_insert(task, priority, payload);
    if !ok {
        warn!("pqueue_insert failed: {:?}", KernelError::CapacityExceeded);
    }
    ok
}

/// `send_notification` — ISR-safe entry point, `spec.md` §5/§6: post a
/// simple async notification to `handle`.
pub fn send_notification(handle: TaskHandle, data: UserData) -> bool {
    crate::sync::critical_section(|_| {
        let Some(task) = scheduler().task_mut(handle) else {
            return false;
        };
        task.async_data = data;
        task.notification_count = task.notification_count.saturating_add(1);
        true
    })
}

/// `run()` — `spec.md` §6: enters the cooperative scheduling loop,
/// returning only once `release()` has been called. Guards against the
/// re-entrant call `spec.md` §9 Design Notes forbids.
pub fn run() {
    // SAFETY: single-threaded cooperative kernel; `RUNNING` is only ever
    // touched from the thread that calls `run()`.
    unsafe {
        if core::ptr::addr_of!(RUNNING).read() {
            warn!("run() called re-entrantly; ignoring");
            return;
        }
        core::ptr::addr_of_mut!(RUNNING).write(true);
    }
    debug!("scheduler run loop entered");
    scheduler().run();
    unsafe {
        core::ptr::addr_of_mut!(RUNNING).write(false);
    }
    debug!("scheduler run loop exited");
}

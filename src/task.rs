//! # Task node
//!
//! The scheduling record described in `spec.md` §3: callback, timing,
//! priority, the bitset of event-readiness flags, and the per-task links
//! to an optional queue, FSM, and coroutine scratch space. Tasks live in
//! the fixed-size arena owned by [`crate::chain::Chain`] — application
//! code never holds a `Task` directly, only the [`TaskHandle`] returned by
//! `kernel::add_task` and friends, matching the "arena + index" identity
//! discipline from `spec.md` §9 rather than the original's raw
//! `qTask_t *`.

use core::ptr::NonNull;

use crate::atparser::AtParser;
use crate::config::PERIODIC;
use crate::coroutine::Coroutine;
use crate::event::Trigger;
use crate::fsm::Fsm;
use crate::queue::QueueEvents;

/// A callback invoked with the event that triggered dispatch.
pub type TaskFn = fn(&mut crate::event::EventInfo);

/// An opaque application payload, the Rust analogue of the original's
/// `void *TaskData`. Carrying an actual generic here would require either
/// `dyn Trait` (needs a vtable, fine) or monomorphized per-task storage
/// (impossible in a single concrete task arena without an allocator); a
/// thin pointer newtype is the standard opaque-context idiom for
/// `#![no_std]` kernels that must stay generic-free at the task-array
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserData(Option<NonNull<()>>);

impl UserData {
    /// The "no payload" value.
    pub const NONE: UserData = UserData(None);

    /// Wrap a reference as an opaque payload. The caller is responsible
    /// for the pointee outliving every task dispatch that might read it
    /// back — exactly the same discipline the original's untyped `void *`
    /// placed on callers.
    pub fn from_ref<T>(value: &mut T) -> Self {
        UserData(NonNull::new(value as *mut T as *mut ()))
    }

    /// Wrap an already-erased pointer directly, used internally when the
    /// payload is itself a type-erased handle (a queue reference, a
    /// pointer into a queue's front slot) rather than a typed value.
    pub(crate) fn from_nonnull(ptr: Option<NonNull<()>>) -> Self {
        UserData(ptr)
    }

    pub const fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Recover the payload as `&T`.
    ///
    /// # Safety
    /// The caller must guarantee this `UserData` was produced by
    /// [`UserData::from_ref`] with a `T` of the same type, and that the
    /// pointee is still alive and not mutably aliased.
    pub unsafe fn as_ref<T>(&self) -> Option<&T> {
        self.0.map(|p| unsafe { &*(p.as_ptr() as *const T) })
    }

    /// Recover the payload as `&mut T`.
    ///
    /// # Safety
    /// Same contract as [`UserData::as_ref`], plus exclusivity.
    pub unsafe fn as_mut<T>(&mut self) -> Option<&mut T> {
        self.0.map(|p| unsafe { &mut *(p.as_ptr() as *mut T) })
    }
}

impl Default for UserData {
    fn default() -> Self {
        UserData::NONE
    }
}

bitflags::bitflags! {
    /// Boolean readiness/lifecycle flags from `spec.md` §3. `queue_count`
    /// is deliberately absent here: the original stores a *threshold byte*
    /// under that name, not a boolean, so it lives in
    /// [`Task::queue_count_threshold`] instead (see `_qIndex_QueueCount`
    /// in `original_source/src/os/qkernel.c`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskFlags: u8 {
        const ENABLED        = 1 << 0;
        const INIT_DONE      = 1 << 1;
        const QUEUE_RECEIVER = 1 << 2;
        const QUEUE_FULL     = 1 << 3;
        const QUEUE_EMPTY    = 1 << 4;
    }
}

/// Execution state of a task, per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Disabled,
    Suspended,
    Waiting,
    Ready,
    Running,
}

/// A stable reference to a task in the kernel's arena, handed back by
/// `add_task`/`add_event_task`/`add_fsm_task`. Cheap to copy, valid for
/// the lifetime of the task (i.e. until `remove_task`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(pub(crate) usize);

/// The task node itself. `Copy` because every field is either a scalar,
/// a function pointer, or a `NonNull` — no owned heap state — which lets
/// the chain's arena be a plain `[Option<Task>; MAX_TASKS]` initialized
/// as `[None; MAX_TASKS]` with no per-element construction.
#[derive(Clone, Copy)]
pub struct Task {
    pub(crate) callback: Option<TaskFn>,
    pub(crate) interval: u32,
    pub(crate) iterations: i32,
    pub(crate) priority: u8,
    pub(crate) flags: TaskFlags,
    pub(crate) queue_count_threshold: u16,
    pub(crate) notification_count: u16,
    pub(crate) async_data: UserData,
    pub(crate) clock_start: u32,
    pub(crate) queue_ref: Option<NonNull<dyn QueueEvents>>,
    pub(crate) fsm_ref: Option<NonNull<Fsm>>,
    /// Bound by `kernel::add_parser_task`; `dispatch.rs` recognizes the
    /// `atparser::parser_body` sentinel callback the same way it
    /// recognizes `dispatch::fsm_body` for `fsm_ref`.
    pub(crate) parser_ref: Option<NonNull<dyn AtParser>>,
    pub(crate) coroutine: Coroutine,
    pub(crate) user_data: UserData,
    pub(crate) state: TaskState,
    pub(crate) trigger: Trigger,
    pub(crate) next: Option<usize>,
    pub(crate) cycles: u32,
}

impl Task {
    pub(crate) fn reset(
        &mut self,
        callback: Option<TaskFn>,
        priority: u8,
        interval: u32,
        iterations: i32,
        enabled: bool,
        user_data: UserData,
        clock_start: u32,
    ) {
        self.callback = callback;
        self.interval = interval;
        self.iterations = if iterations == PERIODIC {
            PERIODIC
        } else {
            -iterations
        };
        self.priority = priority;
        self.flags = if enabled {
            TaskFlags::ENABLED
        } else {
            TaskFlags::empty()
        };
        self.queue_count_threshold = 0;
        self.notification_count = 0;
        self.async_data = UserData::NONE;
        self.clock_start = clock_start;
        self.queue_ref = None;
        self.fsm_ref = None;
        self.parser_ref = None;
        self.coroutine = Coroutine::new();
        self.user_data = user_data;
        self.state = TaskState::Suspended;
        self.trigger = Trigger::None;
        self.next = None;
        self.cycles = 0;
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(TaskFlags::ENABLED)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.flags.set(TaskFlags::ENABLED, enabled);
    }

    pub fn set_priority(&mut self, priority: u8) {
        self.priority = priority;
    }

    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval;
    }

    pub fn set_iterations(&mut self, iterations: i32) {
        self.iterations = if iterations == PERIODIC {
            PERIODIC
        } else {
            -iterations
        };
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn user_data(&self) -> UserData {
        self.user_data
    }

    /// Attach a queue as this task's event source (`queue_receiver`,
    /// `queue_full`, `queue_count_threshold`, `queue_empty` triggers read
    /// it in `event::evaluate`).
    ///
    /// # Safety
    /// `queue` must outlive this task's membership in the chain.
    pub unsafe fn attach_queue(&mut self, queue: &'static mut dyn QueueEvents) {
        self.queue_ref = NonNull::new(queue as *mut dyn QueueEvents);
    }

    pub fn set_queue_receiver(&mut self, on: bool) {
        self.flags.set(TaskFlags::QUEUE_RECEIVER, on);
    }

    pub fn set_queue_full_trigger(&mut self, on: bool) {
        self.flags.set(TaskFlags::QUEUE_FULL, on);
    }

    pub fn set_queue_empty_trigger(&mut self, on: bool) {
        self.flags.set(TaskFlags::QUEUE_EMPTY, on);
    }

    pub fn set_queue_count_threshold(&mut self, threshold: u16) {
        self.queue_count_threshold = threshold;
    }

    pub fn coroutine_mut(&mut self) -> &mut Coroutine {
        &mut self.coroutine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn userdata_roundtrip() {
        let mut x = 42u32;
        let ud = UserData::from_ref(&mut x);
        assert!(!ud.is_none());
        unsafe {
            assert_eq!(*ud.as_ref::<u32>().unwrap(), 42);
        }
    }

    #[test]
    fn userdata_none_is_none() {
        assert!(UserData::NONE.is_none());
    }

    #[test]
    fn reset_negates_iterations_until_first_dispatch() {
        let mut t = blank_task();
        t.reset(None, 1, 0, 5, true, UserData::NONE, 0);
        assert_eq!(t.iterations, -5);
    }

    #[test]
    fn reset_preserves_periodic_sentinel() {
        let mut t = blank_task();
        t.reset(None, 1, 0, PERIODIC, true, UserData::NONE, 0);
        assert_eq!(t.iterations, PERIODIC);
    }

    fn blank_task() -> Task {
        Task {
            callback: None,
            interval: 0,
            iterations: 0,
            priority: 0,
            flags: TaskFlags::empty(),
            queue_count_threshold: 0,
            notification_count: 0,
            async_data: UserData::NONE,
            clock_start: 0,
            queue_ref: None,
            fsm_ref: None,
            parser_ref: None,
            coroutine: Coroutine::new(),
            user_data: UserData::NONE,
            state: TaskState::Suspended,
            trigger: Trigger::None,
            next: None,
            cycles: 0,
        }
    }
}

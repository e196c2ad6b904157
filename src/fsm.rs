//! # Finite state machine runtime
//!
//! `spec.md` §4.6, ported from `original_source/src/os/qfsm.c`. A state is
//! a plain function; a [`Fsm`] owns the current/previous/last state
//! pointers, the last return value, an optional transition table, and an
//! optional signal queue. `kernel.rs` hangs one of these off a task via
//! `fsm_ref` and the dispatcher (`dispatch.rs`) drives it with `run`
//! instead of calling a plain callback when the task's callback equals the
//! `FSM_BODY` sentinel.

use core::ptr::NonNull;

use crate::error::{KernelError, KernelResult};
use crate::queue::Queue;
use crate::task::UserData;

/// The narrow surface `Fsm` needs from its signal queue: push a signal
/// (back, or front if urgent) and pop the next one. A dedicated trait
/// rather than reusing [`crate::queue::QueueEvents`] because signals are
/// delivered by value, not peeked by pointer — `QueueEvents`'s
/// `peek_front_ptr` erasure doesn't fit a `Copy` scalar payload.
trait SignalQueue {
    fn push(&mut self, sig: i16, front: bool) -> bool;
    fn pop(&mut self) -> Option<i16>;
    fn is_full(&self) -> bool;
}

impl<const N: usize> SignalQueue for Queue<i16, N> {
    fn push(&mut self, sig: i16, front: bool) -> bool {
        if front {
            self.send_front(sig)
        } else {
            self.send_back(sig)
        }
    }
    fn pop(&mut self) -> Option<i16> {
        self.receive()
    }
    fn is_full(&self) -> bool {
        Queue::is_full(self)
    }
}

/// No signal pending / no signal delivered this run.
pub const SIGNAL_NONE: i16 = 0;
/// Upper exclusive bound of application-assignable signal values; signals
/// outside `[SIGNAL_NONE + 1 .. SIGNAL_RANGE_MAX)` are ignored by the
/// transition table sweep (`spec.md` §4.6).
pub const SIGNAL_RANGE_MAX: i16 = i16::MAX;
/// Synthetic signal the runtime feeds a state on entry.
pub const SIGNAL_ENTRY: i16 = -1;
/// Synthetic signal fed to the outgoing state of a transition.
pub const SIGNAL_EXIT: i16 = -2;

/// A state function's return value — `spec.md` Design Notes: "model as a
/// tagged return rather than a raw integer; the unexpected hook subsumes
/// the open range."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateStatus {
    Success,
    Failure,
    Unexpected(i16),
}

/// A state function. Receives the owning FSM (so it can read `signal`/
/// `data` and request a transition via [`Fsm::set_next_state`]) and
/// returns its outcome.
pub type StateFn = fn(&mut Fsm) -> StateStatus;
/// A substate hook: side-effect only, no return (`spec.md` §2 item 8).
pub type SubstateFn = fn(&mut Fsm);

/// One row of an installed transition table (`spec.md` §4.6): "first entry
/// whose `current_state == next_state` AND `signal == current signal`
/// fires".
#[derive(Clone, Copy)]
pub struct Transition {
    pub current_state: StateFn,
    pub signal: i16,
    pub next_state: StateFn,
    pub action: Option<SubstateFn>,
}

/// The mutator accepted by [`Fsm::attribute`].
#[derive(Clone, Copy)]
pub enum Attribute {
    Restart,
    ClearFirstEntryFlag,
    SetFailure(SubstateFn),
    SetSuccess(SubstateFn),
    SetUnexpected(SubstateFn),
    SetBeforeAny(SubstateFn),
    UninstallTable,
}

/// A finite state machine instance. Every field is a scalar or `NonNull`
/// — no owned heap state — so it can live inline in a [`crate::task::Task`]
/// slot the same way [`crate::coroutine::Coroutine`] does.
pub struct Fsm {
    next_state: Option<StateFn>,
    previous_state: Option<StateFn>,
    last_state: Option<StateFn>,
    signal: i16,
    last_return: Option<StateStatus>,
    previous_return: Option<StateStatus>,
    data: UserData,
    parent: Option<NonNull<Fsm>>,
    transition_table: Option<NonNull<[Transition]>>,
    signal_queue: Option<NonNull<dyn SignalQueue>>,
    failure_sub: Option<SubstateFn>,
    success_sub: Option<SubstateFn>,
    unexpected_sub: Option<SubstateFn>,
    before_any_sub: Option<SubstateFn>,
    first_entry_done: bool,
}

impl Fsm {
    pub const fn new() -> Self {
        Fsm {
            next_state: None,
            previous_state: None,
            last_state: None,
            signal: SIGNAL_NONE,
            last_return: None,
            previous_return: None,
            data: UserData::NONE,
            parent: None,
            transition_table: None,
            signal_queue: None,
            failure_sub: None,
            success_sub: None,
            unexpected_sub: None,
            before_any_sub: None,
            first_entry_done: false,
        }
    }

    /// `setup` — install the initial state. Fails with `InvalidArgument`
    /// if `init_state` were somehow absent; in Rust the function pointer
    /// is never null, so this only resets bookkeeping.
    pub fn setup(&mut self, init_state: StateFn) {
        self.next_state = Some(init_state);
        self.previous_state = None;
        self.last_state = None;
        self.signal = SIGNAL_NONE;
        self.last_return = None;
        self.previous_return = None;
        self.first_entry_done = false;
    }

    pub fn signal(&self) -> i16 {
        self.signal
    }

    pub fn data(&self) -> UserData {
        self.data
    }

    pub fn last_return(&self) -> Option<StateStatus> {
        self.last_return
    }

    /// Called by a state function to request a transition: the dispatch
    /// loop in `run` notices `next_state != last_state` and re-executes
    /// the outgoing state with `signal == EXIT` before entering the new
    /// one (P5).
    pub fn set_next_state(&mut self, state: StateFn) {
        self.next_state = Some(state);
    }

    pub fn set_parent(&mut self, parent: &mut Fsm) {
        self.parent = NonNull::new(parent as *mut Fsm);
    }

    pub fn parent(&self) -> Option<NonNull<Fsm>> {
        self.parent
    }

    /// `get_handler` — the state currently installed as `next_state`
    /// (what will run on the next `run`, or is running now).
    pub fn get_handler(&self) -> Option<StateFn> {
        self.next_state
    }

    pub fn install_transition_table(&mut self, table: &'static mut [Transition]) {
        self.transition_table = NonNull::new(table as *mut [Transition]);
    }

    /// `signal_queue_setup` — bind a signal queue backed by the external
    /// byte-queue collaborator. Per the Design Notes' resolved Open
    /// Question, this takes `&mut self` (never null in Rust) and instead
    /// defensively rejects a zero-capacity queue.
    pub fn signal_queue_setup<const N: usize>(
        &mut self,
        queue: &'static mut Queue<i16, N>,
    ) -> KernelResult<()> {
        if N == 0 {
            return Err(KernelError::InvalidArgument);
        }
        self.signal_queue = NonNull::new(queue as *mut dyn SignalQueue);
        Ok(())
    }

    /// `attribute` — apply one mutator. Unknown combinations are silent
    /// no-ops per `spec.md` §7.
    pub fn attribute(&mut self, attr: Attribute) {
        match attr {
            Attribute::Restart => {
                self.last_state = None;
                self.signal = SIGNAL_NONE;
                self.first_entry_done = false;
            }
            Attribute::ClearFirstEntryFlag => self.first_entry_done = true,
            Attribute::SetFailure(f) => self.failure_sub = Some(f),
            Attribute::SetSuccess(f) => self.success_sub = Some(f),
            Attribute::SetUnexpected(f) => self.unexpected_sub = Some(f),
            Attribute::SetBeforeAny(f) => self.before_any_sub = Some(f),
            Attribute::UninstallTable => self.transition_table = None,
        }
    }

    /// `send_signal` — enqueue a signal, urgent signals jumping the
    /// internal queue. Fails if no queue is configured or `sig ==
    /// SIGNAL_NONE` (`spec.md` §7 `InvalidArgument`/`NotConfigured`).
    ///
    /// # Safety
    /// Callable from ISR context, bracketed by the caller in
    /// [`crate::sync::critical_section`] per `spec.md` §5.
    pub fn send_signal(&mut self, sig: i16, urgent: bool) -> KernelResult<()> {
        if sig == SIGNAL_NONE {
            return Err(KernelError::InvalidArgument);
        }
        let Some(mut queue) = self.signal_queue else {
            return Err(KernelError::NotConfigured);
        };
        // SAFETY: `signal_queue`, when set, points at storage the bound
        // queue outlives (a `'static` reference at setup time).
        let queue = unsafe { queue.as_mut() };
        if queue.push(sig, urgent) {
            Ok(())
        } else {
            Err(KernelError::CapacityExceeded)
        }
    }

    /// Run one scheduling step: entry detection, signal dequeue + table
    /// sweep, state execution, and exit re-execution on transition
    /// (`spec.md` §4.6 steps 1-5).
    pub fn run(&mut self, data: UserData) -> KernelResult<StateStatus> {
        self.data = data;
        self.signal = SIGNAL_NONE;

        let Some(next) = self.next_state else {
            return Err(KernelError::StateViolation);
        };

        let is_entry = self.last_state != Some(next);
        if is_entry {
            self.previous_state = self.last_state;
            self.previous_return = self.last_return;
            self.signal = SIGNAL_ENTRY;
        } else {
            if self.signal == SIGNAL_NONE {
                if let Some(sig) = self.dequeue_signal() {
                    self.signal = sig;
                }
            }
            if self.signal != SIGNAL_NONE && self.signal > SIGNAL_NONE && self.signal < SIGNAL_RANGE_MAX {
                self.sweep_table();
            }
        }

        let status = self.execute_state(next);

        if let Some(new_next) = self.next_state {
            if Some(new_next) != Some(next) {
                self.signal = SIGNAL_EXIT;
                self.execute_state(next);
            }
        }

        Ok(status)
    }

    /// Dequeue one pending signal, if any.
    fn dequeue_signal(&mut self) -> Option<i16> {
        let mut queue = self.signal_queue?;
        // SAFETY: see `send_signal`.
        unsafe { queue.as_mut() }.pop()
    }

    fn sweep_table(&mut self) {
        let Some(ptr) = self.transition_table else {
            return;
        };
        let Some(current) = self.next_state else {
            return;
        };
        // SAFETY: `transition_table`, when set, points at a `'static`
        // slice the caller keeps alive for the FSM's lifetime.
        let table = unsafe { ptr.as_ref() };
        for entry in table {
            if Some(entry.current_state) == Some(current) && entry.signal == self.signal {
                if let Some(action) = entry.action {
                    action(self);
                }
                self.next_state = Some(entry.next_state);
                break;
            }
        }
    }

    fn execute_state(&mut self, state: StateFn) -> StateStatus {
        if let Some(before) = self.before_any_sub {
            before(self);
        }
        let status = state(self);
        self.last_return = Some(status);
        self.last_state = Some(state);
        match status {
            StateStatus::Success => {
                if let Some(sub) = self.success_sub {
                    sub(self);
                }
            }
            StateStatus::Failure => {
                if let Some(sub) = self.failure_sub {
                    sub(self);
                }
            }
            StateStatus::Unexpected(_) => {
                if let Some(sub) = self.unexpected_sub {
                    sub(self);
                }
            }
        }
        status
    }
}

impl Default for Fsm {
    fn default() -> Self {
        Fsm::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s0(fsm: &mut Fsm) -> StateStatus {
        if fsm.signal() == SIGNAL_ENTRY {
            unsafe { ENTRIES_S0 += 1 };
        }
        if fsm.signal() == SIGNAL_EXIT {
            unsafe { EXITS_S0 += 1 };
        }
        StateStatus::Success
    }

    fn s1(fsm: &mut Fsm) -> StateStatus {
        if fsm.signal() == SIGNAL_ENTRY {
            unsafe { ENTRIES_S1 += 1 };
        }
        StateStatus::Success
    }

    static mut ENTRIES_S0: u32 = 0;
    static mut EXITS_S0: u32 = 0;
    static mut ENTRIES_S1: u32 = 0;

    fn reset_counters() {
        unsafe {
            ENTRIES_S0 = 0;
            EXITS_S0 = 0;
            ENTRIES_S1 = 0;
        }
    }

    #[test]
    fn initial_run_enters_with_entry_signal() {
        reset_counters();
        let mut fsm = Fsm::new();
        fsm.setup(s0);
        let status = fsm.run(UserData::NONE).unwrap();
        assert_eq!(status, StateStatus::Success);
        assert_eq!(unsafe { ENTRIES_S0 }, 1);
    }

    #[test]
    fn transition_fires_exit_then_entry_p5_s5() {
        reset_counters();
        static mut TABLE: [Transition; 1] = [Transition {
            current_state: s0,
            signal: 1,
            next_state: s1,
            action: None,
        }];
        static mut SIGNALS: Queue<i16, 4> = Queue::new();

        let mut fsm = Fsm::new();
        fsm.setup(s0);
        unsafe { fsm.signal_queue_setup(&mut *core::ptr::addr_of_mut!(SIGNALS)) }.unwrap();
        fsm.run(UserData::NONE).unwrap();
        assert_eq!(unsafe { ENTRIES_S0 }, 1);

        fsm.send_signal(1, false).unwrap();
        unsafe { fsm.install_transition_table(&mut *core::ptr::addr_of_mut!(TABLE)) };
        fsm.run(UserData::NONE).unwrap();
        assert_eq!(unsafe { EXITS_S0 }, 1);

        fsm.run(UserData::NONE).unwrap();
        assert_eq!(unsafe { ENTRIES_S1 }, 1);
    }

    #[test]
    fn attribute_restart_forces_reentry_r2() {
        reset_counters();
        let mut fsm = Fsm::new();
        fsm.setup(s0);
        fsm.run(UserData::NONE).unwrap();
        fsm.run(UserData::NONE).unwrap();
        assert_eq!(unsafe { ENTRIES_S0 }, 1, "second run is not a re-entry");

        fsm.attribute(Attribute::Restart);
        fsm.run(UserData::NONE).unwrap();
        assert_eq!(unsafe { ENTRIES_S0 }, 2);
    }

    #[test]
    fn run_without_setup_is_state_violation() {
        let mut fsm = Fsm::new();
        assert_eq!(fsm.run(UserData::NONE), Err(KernelError::StateViolation));
    }

    #[test]
    fn send_signal_without_queue_is_not_configured() {
        let mut fsm = Fsm::new();
        assert_eq!(fsm.send_signal(1, false), Err(KernelError::NotConfigured));
    }

    #[test]
    fn send_signal_none_is_invalid_argument() {
        static mut Q: Queue<i16, 4> = Queue::new();
        let mut fsm = Fsm::new();
        unsafe { fsm.signal_queue_setup(&mut *core::ptr::addr_of_mut!(Q)) }.unwrap();
        assert_eq!(fsm.send_signal(SIGNAL_NONE, false), Err(KernelError::InvalidArgument));
    }
}

//! # Scheduler core
//!
//! `spec.md` §4.5: the cooperative main loop. Replaces the teacher's
//! preemptive, SysTick-driven `Scheduler` (tick-based time-slicing, PendSV
//! context switches, game-theoretic payoff scheduling) with the
//! non-preemptive discipline this kernel specifies: priority-queue
//! extraction, then a readiness sweep over the chain, then a
//! cursor-ordered dispatch round; idle callback when nothing is ready.
//! Ported from `original_source/src/os/qkernel.c`'s `qScheduler_Run`.

use crate::chain::Chain;
use crate::clock::Clock;
use crate::config::PQUEUE_SIZE;
use crate::dispatch;
use crate::event::{self, EventInfo, Trigger};
use crate::pqueue::PriorityQueue;
use crate::task::{TaskHandle, TaskState, UserData};

/// The idle hook, called with a synthesized `NoReadyTasks` event whenever
/// a scheduling iteration finds nothing to dispatch.
pub type IdleFn = fn(&mut EventInfo);
/// Called once, after `run()`'s loop exits, per `spec.md` §4.5
/// `fire_release_event()`.
pub type ReleaseFn = fn();
/// `spread_notification`'s per-task predicate (`spec.md` §6): applied to
/// every chain node, conjoined.
pub type SpreadFn = fn(&mut crate::task::Task, UserData) -> bool;

/// The scheduler's process-wide state: the task chain, the deferred-event
/// priority queue, the clock, and the idle/release hooks. `kernel.rs`
/// wraps exactly one of these in a global singleton guarded by
/// `critical_section` (`spec.md` §9 Design Notes: "a process-wide
/// singleton is idiomatic here").
pub struct Scheduler {
    chain: Chain,
    pqueue: PriorityQueue<PQUEUE_SIZE>,
    clock: Clock,
    idle_cb: Option<IdleFn>,
    idle_init_done: bool,
    release_requested: bool,
    release_cb: Option<ReleaseFn>,
    event_info: EventInfo,
}

impl Scheduler {
    pub const fn new() -> Self {
        Scheduler {
            chain: Chain::new(),
            pqueue: PriorityQueue::new(),
            clock: Clock::new(),
            idle_cb: None,
            idle_init_done: false,
            release_requested: false,
            release_cb: None,
            event_info: EventInfo::new(),
        }
    }

    pub fn set_tick_provider(&mut self, provider: crate::clock::TickProviderFn) {
        self.clock.set_tick_provider(provider);
    }

    pub fn set_idle(&mut self, cb: Option<IdleFn>) {
        self.idle_cb = cb;
    }

    pub fn set_release_callback(&mut self, cb: Option<ReleaseFn>) {
        self.release_cb = cb;
    }

    /// `release()` — request the loop in `run()` to exit after the
    /// current iteration completes.
    pub fn release(&mut self) {
        self.release_requested = true;
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_task(
        &mut self,
        callback: Option<crate::task::TaskFn>,
        priority: u8,
        interval: u32,
        iterations: i32,
        enabled: bool,
        user_data: UserData,
    ) -> Option<TaskHandle> {
        let now = self.clock.tick_now();
        self.chain.add(callback, priority, interval, iterations, enabled, user_data, now)
    }

    pub(crate) fn remove_task(&mut self, handle: TaskHandle) -> bool {
        crate::sync::critical_section(|_| self.chain.remove(handle))
    }

    pub(crate) fn task_mut(&mut self, handle: TaskHandle) -> Option<&mut crate::task::Task> {
        self.chain.get_mut(handle)
    }

    pub(crate) fn task(&self, handle: TaskHandle) -> Option<&crate::task::Task> {
        self.chain.get(handle)
    }

    /// Any mutation that may invalidate chain order (a runtime priority
    /// change) should call this — the next scheduling iteration rebuilds
    /// the chain (`spec.md` §4.1 Auto-rearrange), if the `auto-rearrange`
    /// feature is enabled. With it disabled, dirtying the chain has no
    /// effect on `run()` and the caller must call
    /// [`Scheduler::rearrange_chain`] itself.
    pub(crate) fn mark_chain_dirty(&mut self) {
        self.chain.mark_dirty();
    }

    /// Force an immediate chain rebuild, under a critical section — the
    /// manual counterpart to the `auto-rearrange` feature's automatic
    /// per-iteration check in `run()`.
    pub fn rearrange_chain(&mut self) {
        crate::sync::critical_section(|_| self.chain.rearrange());
    }

    /// `pqueue_insert` — ISR-safe. `spec.md` §6. A compile-time no-op
    /// (always `false`) when the `priority-queue` feature is disabled —
    /// mirrors `Q_PRIORITY_QUEUE` gating the whole subsystem out of the
    /// original build.
    #[cfg(feature = "priority-queue")]
    pub fn pqueue_insert(&mut self, task: TaskHandle, priority: u8, payload: UserData) -> bool {
        crate::sync::critical_section(|_| self.pqueue.insert(task, priority, payload))
    }

    #[cfg(not(feature = "priority-queue"))]
    pub fn pqueue_insert(&mut self, _task: TaskHandle, _priority: u8, _payload: UserData) -> bool {
        false
    }

    /// `spread_notification` — `SPEC_FULL.md` §5, ported from
    /// `qSchedulerSpreadNotification`: apply `mode_fn` to every task in
    /// the chain, ANDing the results.
    pub fn spread_notification(&mut self, data: UserData, mode_fn: SpreadFn) -> bool {
        let mut all_ok = true;
        let handles: heapless::Vec<TaskHandle, { crate::config::MAX_TASKS }> =
            self.chain.iter_handles().collect();
        for handle in handles {
            if let Some(task) = self.chain.get_mut(handle) {
                all_ok &= mode_fn(task, data);
            }
        }
        all_ok
    }

    /// One pass over the chain, tagging each task `Ready`/`Waiting` per
    /// the precedence in `spec.md` §4.3. Returns whether any task became
    /// ready.
    fn ready_sweep(&mut self) -> bool {
        let now = self.clock.tick_now();
        let mut any_ready = false;
        for handle in self.chain.iter_handles() {
            if let Some(task) = self.chain.get_mut(handle) {
                match event::evaluate(task, now) {
                    Some(trigger) => {
                        task.trigger = trigger;
                        task.state = TaskState::Ready;
                        any_ready = true;
                    }
                    None => task.state = TaskState::Waiting,
                }
            }
        }
        any_ready
    }

    /// Visit every chain node exactly once, starting from the persistent
    /// cursor (`spec.md` §4.5: "reaching tail resets to head... gives a
    /// round-robin-with-readiness-filter discipline"), dispatching the
    /// ones tagged `Ready`.
    fn dispatch_ready_round(&mut self) {
        let n = self.chain.len();
        for _ in 0..n {
            let Some(handle) = self.chain.advance_cursor() else {
                break;
            };
            if let Some(task) = self.chain.get_mut(handle) {
                if task.state == TaskState::Ready {
                    let trigger = task.trigger;
                    dispatch::dispatch(task, trigger, &mut self.event_info, UserData::NONE);
                }
            }
        }
    }

    fn dispatch_idle(&mut self) {
        if let Some(cb) = self.idle_cb {
            self.event_info.reset();
            self.event_info.trigger = Trigger::NoReadyTasks;
            self.event_info.first_call = !self.idle_init_done;
            cb(&mut self.event_info);
            self.idle_init_done = true;
        }
    }

    /// `run()` — `spec.md` §4.5's loop, verbatim:
    ///
    /// ```text
    /// init = true
    /// loop:
    ///   if !init: head = rearrange(head); init = true
    ///   t = pqueue_extract(); if t: dispatch(t, NotificationQueued)
    ///   if ready_sweep(): for each node in chain: if Ready: dispatch(node, node.trigger) else Waiting
    ///   elif idle_callback: dispatch(null, NoReadyTasks)
    /// until release_requested
    /// fire_release_event()
    /// ```
    ///
    /// Returns only once `release()` has been called. Re-entrant calls are
    /// a logic error the caller must avoid — `kernel.rs` guards against it
    /// at the API boundary (`spec.md` §9 Design Notes: "forbid re-entrant
    /// `run`").
    pub fn run(&mut self) {
        self.release_requested = false;
        loop {
            #[cfg(feature = "auto-rearrange")]
            if self.chain.needs_rearrange() {
                crate::sync::critical_section(|_| self.chain.rearrange());
            }

            #[cfg(feature = "priority-queue")]
            {
                let extracted = crate::sync::critical_section(|_| self.pqueue.extract());
                if let Some((handle, payload)) = extracted {
                    if let Some(task) = self.chain.get_mut(handle) {
                        dispatch::dispatch(task, Trigger::NotificationQueued, &mut self.event_info, payload);
                    }
                }
            }

            if self.ready_sweep() {
                self.dispatch_ready_round();
            } else {
                self.dispatch_idle();
            }

            #[cfg(feature = "scheduler-release")]
            if self.release_requested {
                break;
            }
        }
        #[cfg(feature = "scheduler-release")]
        if let Some(cb) = self.release_cb {
            cb();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    static TICKS: AtomicU32 = AtomicU32::new(0);
    fn fake_tick() -> u32 {
        TICKS.load(Ordering::Relaxed)
    }

    static CALLS_A: AtomicUsize = AtomicUsize::new(0);
    static CALLS_B: AtomicUsize = AtomicUsize::new(0);
    static ORDER: AtomicUsize = AtomicUsize::new(0);
    static LAST_B_ORDER: AtomicUsize = AtomicUsize::new(0);
    static LAST_A_ORDER: AtomicUsize = AtomicUsize::new(0);

    fn cb_a(_info: &mut EventInfo) {
        CALLS_A.fetch_add(1, Ordering::Relaxed);
        LAST_A_ORDER.store(ORDER.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
    }
    fn cb_b(_info: &mut EventInfo) {
        CALLS_B.fetch_add(1, Ordering::Relaxed);
        LAST_B_ORDER.store(ORDER.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
    }

    fn reset_counters() {
        TICKS.store(0, Ordering::Relaxed);
        CALLS_A.store(0, Ordering::Relaxed);
        CALLS_B.store(0, Ordering::Relaxed);
        ORDER.store(0, Ordering::Relaxed);
    }

    #[test]
    fn two_periodic_tasks_each_dispatch_every_iteration_s1() {
        reset_counters();
        let mut sched = Scheduler::new();
        sched.set_tick_provider(fake_tick);
        sched.add_task(Some(cb_a), 2, 10, crate::config::PERIODIC, true, UserData::NONE);
        sched.add_task(Some(cb_b), 5, 10, crate::config::PERIODIC, true, UserData::NONE);

        for i in 0..100u32 {
            TICKS.store((i + 1) * 10, Ordering::Relaxed);
            sched.ready_sweep();
            sched.dispatch_ready_round();
        }

        assert_eq!(CALLS_A.load(Ordering::Relaxed), 100);
        assert_eq!(CALLS_B.load(Ordering::Relaxed), 100);
        assert!(
            LAST_B_ORDER.load(Ordering::Relaxed) < LAST_A_ORDER.load(Ordering::Relaxed),
            "higher-priority B dispatched before A within the final iteration"
        );
    }

    fn single_shot_cb(_info: &mut EventInfo) {
        CALLS_A.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn single_shot_task_disables_after_one_dispatch_s2() {
        reset_counters();
        let mut sched = Scheduler::new();
        sched.set_tick_provider(fake_tick);
        let h = sched
            .add_task(Some(single_shot_cb), 1, 0, 1, true, UserData::NONE)
            .unwrap();

        assert!(sched.ready_sweep());
        sched.dispatch_ready_round();
        assert_eq!(CALLS_A.load(Ordering::Relaxed), 1);
        assert!(!sched.task(h).unwrap().is_enabled());

        assert!(!sched.ready_sweep(), "exhausted task no longer contends");
    }

    #[test]
    fn pqueue_extraction_precedes_ready_sweep_s4() {
        reset_counters();
        let mut sched = Scheduler::new();
        sched.set_tick_provider(fake_tick);
        let t_low = sched.add_task(Some(cb_a), 1, 0, 1, false, UserData::NONE).unwrap();
        let t_high = sched.add_task(Some(cb_a), 5, 0, 1, false, UserData::NONE).unwrap();
        let t_mid = sched.add_task(Some(cb_a), 3, 0, 1, false, UserData::NONE).unwrap();

        sched.pqueue_insert(t_low, 1, UserData::NONE);
        sched.pqueue_insert(t_high, 5, UserData::NONE);
        sched.pqueue_insert(t_mid, 3, UserData::NONE);

        let mut order = heapless::Vec::<TaskHandle, 4>::new();
        for _ in 0..3 {
            if let Some((h, _)) = sched.pqueue.extract() {
                order.push(h).unwrap();
            }
        }
        assert_eq!(order.as_slice(), &[t_high, t_mid, t_low]);
    }
}

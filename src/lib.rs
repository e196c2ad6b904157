//! # qoriko — a cooperative, non-preemptive real-time kernel core
//!
//! A static-priority round-robin scheduler for resource-constrained
//! embedded targets, built around three orthogonal event sources (time
//! deadlines, queue states, asynchronous notifications) plus a
//! high-priority bypass path for deferred events. An optional finite
//! state machine subsystem is hookable as a task body; a stackless
//! coroutine facility is available as a syntactic convention inside any
//! task body.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Application Tasks                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                Kernel API (kernel.rs)                     │
//! │   init_scheduler() · add_task() · add_fsm_task() · run()  │
//! ├──────────────┬─────────────────┬──────────────┬──────────┤
//! │  Scheduler   │  Chain/PQueue   │  FSM/Coroutine│  Clock   │
//! │ scheduler.rs │ chain.rs pqueue │  fsm.rs       │ clock.rs │
//! │  ─ run()     │  .rs            │  coroutine.rs │ timer.rs │
//! │  ─ dispatch  │  ─ priority     │  ─ run()      │          │
//! │    (event.rs,│    order        │  ─ yield      │          │
//! │    dispatch  │  ─ extract      │    points     │          │
//! │    .rs)      │                 │               │          │
//! ├──────────────┴─────────────────┴──────────────┴──────────┤
//! │        Task model (task.rs) · Queue (queue.rs)            │
//! │        Memory pool (mempool.rs) · AT parser (atparser.rs) │
//! ├─────────────────────────────────────────────────────────┤
//! │   Critical-section shim (sync.rs) · error.rs · config.rs  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling model
//!
//! Single-threaded cooperative: exactly one task, FSM state, or coroutine
//! body runs at a time, to completion. There is no preemption and no
//! blocking primitive other than the cooperative yield/coroutine
//! semaphore. A callback that never returns blocks the entire system.
//!
//! Each scheduling iteration:
//! 1. rebuilds the task chain if a prior priority change dirtied it
//!    (`auto-rearrange` feature);
//! 2. extracts one cell from the deferred-event priority queue, if any,
//!    and dispatches it ahead of everything else (`priority-queue`
//!    feature);
//! 3. sweeps the chain for readiness (time, queue, notification
//!    triggers, in that precedence) and dispatches every ready task in
//!    chain (priority) order;
//! 4. if nothing was ready, invokes the idle callback instead.
//!
//! ## Memory model
//!
//! `#![no_std]`, no `alloc`. All kernel state — the task arena, the
//! deferred-event buffer, per-task FSM/coroutine/queue scratch space — is
//! statically sized by the constants in [`config`]. [`mempool`] offers an
//! optional first-fit allocator over a caller-supplied byte arena for
//! task bodies that want dynamic-looking allocation; the scheduler itself
//! never calls into it.

#![no_std]

// Every module below is always compiled: the task arena (`task::Task`) is
// a single concrete, statically-sized struct shared by every task
// regardless of which optional subsystems a given application exercises,
// so its fields (`queue_ref`, `fsm_ref`, `coroutine`, `cycles`, ...) can't
// be conditionally compiled without forking the struct layout per feature
// combination. The `priority-queue`/`queues`/`fsm`/`at-parser`/
// `auto-rearrange`/`scheduler-release`/`cycle-counting` Cargo features
// instead gate *behavior* at the call sites that matter — see
// `DESIGN.md` for the rationale and exactly where each one is checked.
pub mod atparser;
pub mod chain;
pub mod clock;
pub mod config;
pub mod coroutine;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod fsm;
pub mod kernel;
pub mod mempool;
pub mod pqueue;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod timer;

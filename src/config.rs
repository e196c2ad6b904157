//! # Kernel configuration
//!
//! Compile-time constants governing the scheduler and its subsystems.
//! All limits are fixed at compile time — no dynamic allocation. Optional
//! subsystems (priority queue, queue-driven events, FSM, AT parser, auto
//! chain rearrange, scheduler release, cycle counting) are additionally
//! gated behind Cargo features of the same name so a target that doesn't
//! need them pays nothing for the code.

/// Maximum number of tasks the kernel can hold simultaneously.
/// Bounds the static task arena — each task consumes `size_of::<Task>()`
/// bytes of RAM regardless of whether it is ever enabled.
pub const MAX_TASKS: usize = 16;

/// Capacity of the deferred-event priority queue (only meaningful when the
/// `priority-queue` feature is enabled).
pub const PQUEUE_SIZE: usize = 8;

/// Capacity of a single FSM's signal queue.
pub const FSM_SIGNAL_QUEUE_SIZE: usize = 8;

/// Byte alignment used by the memory pool allocator. One of 1, 2, 4, 8.
/// Mirrors `Q_BYTE_ALIGNMENT` from the original implementation.
pub const MEMPOOL_BYTE_ALIGNMENT: usize = 8;

/// Default heap size (bytes) for the memory pool allocator, when the
/// application doesn't supply its own backing arena. Mirrors
/// `Q_DEFAULT_HEAP_SIZE`.
pub const MEMPOOL_DEFAULT_HEAP_SIZE: usize = 512;

/// Sentinel iteration value meaning "run forever". Chosen so that negating
/// it (the first-dispatch storage trick in `task.rs`) can never occur from
/// a legitimate iteration count.
pub const PERIODIC: i32 = i32::MIN;

/// Sentinel interval value meaning "fire on every scheduling pass".
pub const TIME_IMMEDIATE: u32 = 0;

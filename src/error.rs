//! Internal error classification.
//!
//! The public kernel API never returns this type directly — every entry
//! point keeps the boolean/`Option` contract the original C API used, so a
//! false return always just means "the requested effect did not take
//! place". `KernelError` exists so the boundary functions in `kernel.rs`
//! have something specific to log before flattening to `bool`/`None`.

/// Why a kernel operation refused to take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A required argument was null/empty/out of range (e.g. a null task,
    /// a null callback where one is required, an empty priority-queue
    /// storage slice, sending `Signal::NONE`).
    InvalidArgument,
    /// A bounded buffer was full (priority-queue insert, signal-queue send).
    CapacityExceeded,
    /// The operation requires a collaborator that was never installed
    /// (e.g. sending a signal to an FSM with no signal queue).
    NotConfigured,
    /// The operation is invalid given current state (e.g. removing a task
    /// that isn't in the chain).
    StateViolation,
}

pub(crate) type KernelResult<T> = Result<T, KernelError>;

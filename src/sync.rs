//! # Synchronization primitives
//!
//! Interrupt-safe critical section abstraction used by every ISR-safe
//! entry point (`send_notification`, `queue_send`, `pqueue_insert`,
//! `send_signal`). Backed by the platform-agnostic `critical-section`
//! crate instead of an architecture-specific implementation — this kernel
//! has no context-switch path of its own, so there is nothing here that
//! needs to know it is running on a particular core.
//!
//! The embedding application links in exactly one `critical_section`
//! implementation (e.g. `critical-section::set_impl!` on bare metal, or
//! `critical-section`'s `std` feature on host-side tests).

use critical_section::CriticalSection;

/// Execute a closure within a critical section (interrupts disabled on
/// targets that implement one).
///
/// This is the primary mechanism for safely mutating shared kernel state
/// from both the scheduler loop and interrupt context. Keep the closure
/// short — it runs with interrupts masked.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection) -> R,
{
    critical_section::with(f)
}

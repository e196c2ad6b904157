//! Minimal two-task round-robin demo, host-side.
//!
//! Registers a high-priority "blink" task and a low-priority "report"
//! task, drives the scheduler's tick with a software counter (standing in
//! for a hardware timer on a real target), and releases the loop once
//! both tasks have run a fixed number of times.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use qoriko::event::EventInfo;
use qoriko::kernel;
use qoriko::task::UserData;

static TICKS: AtomicU32 = AtomicU32::new(0);
static BLINK_COUNT: AtomicUsize = AtomicUsize::new(0);
static REPORT_COUNT: AtomicUsize = AtomicUsize::new(0);

fn tick_provider() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

fn blink_task(info: &mut EventInfo) {
    let n = BLINK_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
    if info.first_call {
        println!("blink: first dispatch");
    }
    println!("blink: toggle (call #{n})");
}

fn report_task(_info: &mut EventInfo) {
    let n = REPORT_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
    println!("report: {n} blinks so far");
    if n >= 5 {
        kernel::release();
    }
}

fn idle(_info: &mut EventInfo) {
    // Stand in for advancing a hardware tick; a real target would not
    // need this since the timer ISR would drive TICKS independently.
    TICKS.fetch_add(1, Ordering::Relaxed);
}

fn main() {
    kernel::init_scheduler(tick_provider, Some(idle));
    kernel::set_release_callback(Some(on_release));

    kernel::add_task(blink_task, 5, 2, qoriko::config::PERIODIC, true, UserData::NONE)
        .expect("blink task registration");
    kernel::add_task(report_task, 1, 10, qoriko::config::PERIODIC, true, UserData::NONE)
        .expect("report task registration");

    kernel::run();
}

fn on_release() {
    println!("scheduler released after {} report cycles", REPORT_COUNT.load(Ordering::Relaxed));
}

//! Three-state traffic light driven by the FSM runtime, host-side.
//!
//! Red -> Green -> Yellow -> Red, each state holding for a fixed number of
//! ticks before posting the signal that advances the transition table.

use std::sync::atomic::{AtomicU32, Ordering};

use qoriko::event::EventInfo;
use qoriko::fsm::{Attribute, Fsm, StateStatus, Transition};
use qoriko::kernel;
use qoriko::queue::Queue;
use qoriko::task::UserData;

static TICKS: AtomicU32 = AtomicU32::new(0);

const ADVANCE: i16 = 1;

fn tick_provider() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

static mut LIGHT: Fsm = Fsm::new();
static mut SIGNALS: Queue<i16, 4> = Queue::new();
static mut TABLE: [Transition; 3] = [
    Transition { current_state: red, signal: ADVANCE, next_state: green, action: None },
    Transition { current_state: green, signal: ADVANCE, next_state: yellow, action: None },
    Transition { current_state: yellow, signal: ADVANCE, next_state: red, action: None },
];

fn red(fsm: &mut Fsm) -> StateStatus {
    if fsm.signal() == qoriko::fsm::SIGNAL_ENTRY {
        println!("-> RED");
    }
    StateStatus::Success
}

fn green(fsm: &mut Fsm) -> StateStatus {
    if fsm.signal() == qoriko::fsm::SIGNAL_ENTRY {
        println!("-> GREEN");
    }
    StateStatus::Success
}

fn yellow(fsm: &mut Fsm) -> StateStatus {
    if fsm.signal() == qoriko::fsm::SIGNAL_ENTRY {
        println!("-> YELLOW");
    }
    StateStatus::Success
}

fn on_success(fsm: &mut Fsm) {
    // Hold for 3 ticks, then request the next transition.
    if TICKS.load(Ordering::Relaxed) % 3 == 2 {
        fsm.send_signal(ADVANCE, false).ok();
    }
}

fn idle(_info: &mut EventInfo) {
    let n = TICKS.fetch_add(1, Ordering::Relaxed) + 1;
    if n >= 12 {
        kernel::release();
    }
}

fn main() {
    kernel::init_scheduler(tick_provider, Some(idle));
    kernel::set_release_callback(Some(|| println!("traffic light stopped")));

    // SAFETY: installed once, before `run()` starts; no other reference to
    // LIGHT/SIGNALS/TABLE exists until then.
    unsafe {
        let light = &mut *core::ptr::addr_of_mut!(LIGHT);
        let signals = &mut *core::ptr::addr_of_mut!(SIGNALS);
        light.signal_queue_setup(signals).expect("signal queue setup");
        light.install_transition_table(&mut *core::ptr::addr_of_mut!(TABLE));
        light.attribute(Attribute::SetSuccess(on_success));

        kernel::add_fsm_task(10, 1, light, red, None, None, None, None, true, UserData::NONE)
            .expect("fsm task registration");
    }

    kernel::run();
}

//! # AT-command parser task wrapper
//!
//! `spec.md` lists the AT-command parser itself as an external
//! collaborator, interface only (§1 "DELIBERATELY OUT OF SCOPE"). What the
//! kernel core owns is the *wrapper pattern* that turns an external parser
//! into a task: `original_source/src/os/qkernel.c`'s
//! `qScheduler_ATParserTaskCallback` registers a disabled, single-shot,
//! immediate-interval task whose body runs the parser, and
//! `qScheduler_ATParserNotifyFcn` is the parser-side hook that re-enables
//! it (via `send_notification`) when new input arrives — enriched back in
//! per `SPEC_FULL.md` §5 since the distillation dropped the wrapper while
//! keeping it in the kernel API list (`spec.md` §6 `add_parser_task`).

/// The parser surface the kernel wrapper needs. Application code implements
/// this over whatever concrete AT-command engine it uses; the kernel core
/// never parses bytes itself.
pub trait AtParser {
    /// Run one parse pass over whatever input is currently buffered.
    fn run(&mut self);
}

/// Sentinel callback value: a task whose callback equals this, and which
/// has a `parser_ref` installed, is dispatched through its bound
/// [`AtParser`] instead of calling the sentinel — the same
/// install-a-marker-function pattern [`crate::dispatch::fsm_body`] uses
/// for FSM-bodied tasks. Never called directly; `dispatch.rs` intercepts
/// it.
pub fn parser_body(_info: &mut crate::event::EventInfo) {}

/// Run the bound parser once. Called by `dispatch.rs` when it recognizes
/// [`parser_body`] on a task carrying a `parser_ref`, per
/// `qScheduler_ATParserTaskCallback`.
pub(crate) fn run_parser(parser: &mut dyn AtParser) {
    parser.run();
}

/// The hook a parser implementation calls when it has new input ready to
/// be parsed on the next scheduler iteration — the Rust analogue of
/// `qScheduler_ATParserNotifyFcn`. Re-enables the owning task and posts a
/// simple notification so the next ready sweep dispatches it.
///
/// # Safety
/// Callable from ISR context (this is exactly the shape
/// `send_notification` already supports), bracketed by the caller in
/// [`crate::sync::critical_section`].
pub fn notify(task: &mut crate::task::Task, data: crate::task::UserData) {
    task.set_enabled(true);
    task.async_data = data;
    task.notification_count = task.notification_count.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskFlags, TaskState, UserData};

    struct CountingParser {
        runs: u32,
    }

    impl AtParser for CountingParser {
        fn run(&mut self) {
            self.runs += 1;
        }
    }

    fn blank_task() -> Task {
        Task {
            callback: None,
            interval: 0,
            iterations: 1,
            priority: 0,
            flags: TaskFlags::empty(),
            queue_count_threshold: 0,
            notification_count: 0,
            async_data: UserData::NONE,
            clock_start: 0,
            queue_ref: None,
            fsm_ref: None,
            parser_ref: None,
            coroutine: crate::coroutine::Coroutine::new(),
            user_data: UserData::NONE,
            state: TaskState::Suspended,
            trigger: crate::event::Trigger::None,
            next: None,
            cycles: 0,
        }
    }

    #[test]
    fn task_callback_runs_the_bound_parser() {
        let mut parser = CountingParser { runs: 0 };
        run_parser(&mut parser);
        assert_eq!(parser.runs, 1);
    }

    #[test]
    fn notify_re_enables_and_posts_notification() {
        let mut t = blank_task();
        assert!(!t.is_enabled());
        notify(&mut t, UserData::NONE);
        assert!(t.is_enabled());
        assert_eq!(t.notification_count, 1);
    }
}

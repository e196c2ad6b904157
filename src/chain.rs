//! # Task chain
//!
//! `spec.md` §4.1: a singly linked, priority-sorted list of tasks. Ported
//! from `original_source/src/os/qkernel.c`'s `qScheduler_AddTask`/
//! `_qSchedulerInsertTask` but re-grounded on an arena + index, per
//! `spec.md` §9 Design Notes ("do not attempt to preserve the raw pointer
//! idiom"): tasks live in a fixed `[Option<Task>; MAX_TASKS]` slab, and the
//! chain is the `next` index threaded through them plus a `head` index.

use crate::config::MAX_TASKS;
use crate::task::{Task, TaskFlags, TaskHandle, TaskState, UserData};

/// The fixed-capacity slab of tasks plus the priority-sorted singly linked
/// list threaded through their `next` indices.
pub struct Chain {
    slots: [Option<Task>; MAX_TASKS],
    head: Option<usize>,
    /// Cleared by any mutation that may have invalidated ordering
    /// (`set_priority`); the next scheduling iteration rebuilds the chain
    /// (`spec.md` §4.1 "Auto-rearrange").
    init: bool,
    /// Persistent round-robin cursor for the dispatch sweep (`spec.md`
    /// §4.5): "reaching tail resets to head".
    cursor: Option<usize>,
}

impl Chain {
    pub const fn new() -> Self {
        Chain {
            slots: [None; MAX_TASKS],
            head: None,
            init: true,
            cursor: None,
        }
    }

    /// Allocate a free slot and splice it into the chain at its
    /// priority-ordered position. Returns `None` if the arena is full.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add(
        &mut self,
        callback: Option<crate::task::TaskFn>,
        priority: u8,
        interval: u32,
        iterations: i32,
        enabled: bool,
        user_data: UserData,
        clock_start: u32,
    ) -> Option<TaskHandle> {
        let idx = self.slots.iter().position(Option::is_none)?;
        let mut task = Task {
            callback,
            interval,
            iterations,
            priority,
            flags: TaskFlags::empty(),
            queue_count_threshold: 0,
            notification_count: 0,
            async_data: UserData::NONE,
            clock_start,
            queue_ref: None,
            fsm_ref: None,
            parser_ref: None,
            coroutine: crate::coroutine::Coroutine::new(),
            user_data,
            state: TaskState::Suspended,
            trigger: crate::event::Trigger::None,
            next: None,
            cycles: 0,
        };
        task.reset(callback, priority, interval, iterations, enabled, user_data, clock_start);
        self.slots[idx] = Some(task);
        self.splice_in_priority_order(idx);
        Some(TaskHandle(idx))
    }

    /// `spec.md` §4.1's insertion rule: highest priority at head; equal
    /// priorities preserve existing relative order (stable insert).
    fn splice_in_priority_order(&mut self, idx: usize) {
        let priority = self.slots[idx].as_ref().unwrap().priority;
        match self.head {
            None => {
                self.head = Some(idx);
            }
            Some(head) if priority > self.slots[head].as_ref().unwrap().priority => {
                self.slots[idx].as_mut().unwrap().next = Some(head);
                self.head = Some(idx);
            }
            Some(head) => {
                let mut cur = head;
                loop {
                    let next = self.slots[cur].as_ref().unwrap().next;
                    match next {
                        Some(n) if self.slots[n].as_ref().unwrap().priority >= priority => {
                            cur = n;
                        }
                        _ => break,
                    }
                }
                self.slots[idx].as_mut().unwrap().next = next_of(&self.slots, cur);
                self.slots[cur].as_mut().unwrap().next = Some(idx);
            }
        }
    }

    /// `remove_task` — walk the chain finding the node whose `next` equals
    /// the target and rewire; vacate the slot. Returns `false`
    /// (`StateViolation`) if `handle` is not currently in the chain.
    pub(crate) fn remove(&mut self, handle: TaskHandle) -> bool {
        let idx = handle.0;
        if idx >= MAX_TASKS || self.slots[idx].is_none() {
            return false;
        }
        match self.head {
            Some(h) if h == idx => {
                self.head = self.slots[idx].as_ref().unwrap().next;
            }
            Some(mut cur) => {
                let mut found = false;
                loop {
                    let next = self.slots[cur].as_ref().unwrap().next;
                    match next {
                        Some(n) if n == idx => {
                            let after = self.slots[idx].as_ref().unwrap().next;
                            self.slots[cur].as_mut().unwrap().next = after;
                            found = true;
                            break;
                        }
                        Some(n) => cur = n,
                        None => break,
                    }
                }
                if !found {
                    return false;
                }
            }
            None => return false,
        }
        if self.cursor == Some(idx) {
            self.cursor = None;
        }
        self.slots[idx] = None;
        true
    }

    pub fn get(&self, handle: TaskHandle) -> Option<&Task> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: TaskHandle) -> Option<&mut Task> {
        self.slots.get_mut(handle.0).and_then(Option::as_mut)
    }

    /// Mark the chain dirty — the next scheduling iteration will
    /// `rearrange` before sweeping (`spec.md` §4.1 Auto-rearrange).
    pub fn mark_dirty(&mut self) {
        self.init = false;
    }

    pub fn needs_rearrange(&self) -> bool {
        !self.init
    }

    /// Pop every task off the chain and reinsert through the priority
    /// insertion routine, per `spec.md` §4.1: "rebuild the chain by
    /// pop-and-reinsert... re-sets `init`." Caller holds the platform
    /// critical section for the duration (`spec.md` §4.1 "runs inside the
    /// critical section guard").
    pub fn rearrange(&mut self) {
        let mut order = [None; MAX_TASKS];
        let mut n = 0;
        let mut cur = self.head;
        while let Some(idx) = cur {
            order[n] = Some(idx);
            n += 1;
            cur = self.slots[idx].as_ref().unwrap().next;
        }
        self.head = None;
        for slot in &mut self.slots {
            if let Some(t) = slot {
                t.next = None;
            }
        }
        for &idx in order.iter().take(n) {
            let idx = idx.unwrap();
            self.splice_in_priority_order(idx);
        }
        self.init = true;
        self.cursor = None;
    }

    /// P1: iterate the chain head-to-tail, priority weakly decreasing.
    pub fn iter_handles(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            cursor: self.head,
        }
    }

    /// Advance the persistent round-robin cursor described in `spec.md`
    /// §4.5, wrapping from tail back to head.
    pub fn advance_cursor(&mut self) -> Option<TaskHandle> {
        let next = match self.cursor {
            Some(idx) => self.slots[idx].as_ref().unwrap().next.or(self.head),
            None => self.head,
        };
        self.cursor = next;
        next.map(TaskHandle)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

fn next_of(slots: &[Option<Task>; MAX_TASKS], idx: usize) -> Option<usize> {
    slots[idx].as_ref().unwrap().next
}

impl Default for Chain {
    fn default() -> Self {
        Chain::new()
    }
}

/// Iterator over task handles in chain (priority) order.
pub struct ChainIter<'a> {
    chain: &'a Chain,
    cursor: Option<usize>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = TaskHandle;

    fn next(&mut self) -> Option<TaskHandle> {
        let idx = self.cursor?;
        self.cursor = self.chain.slots[idx].as_ref().unwrap().next;
        Some(TaskHandle(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priorities(chain: &Chain) -> heapless::Vec<u8, { crate::config::MAX_TASKS }> {
        let mut v = heapless::Vec::new();
        for h in chain.iter_handles() {
            v.push(chain.get(h).unwrap().priority()).unwrap();
        }
        v
    }

    #[test]
    fn insertion_keeps_priority_weakly_decreasing_p1() {
        let mut chain = Chain::new();
        chain.add(None, 3, 0, 1, true, UserData::NONE, 0).unwrap();
        chain.add(None, 9, 0, 1, true, UserData::NONE, 0).unwrap();
        chain.add(None, 1, 0, 1, true, UserData::NONE, 0).unwrap();
        chain.add(None, 5, 0, 1, true, UserData::NONE, 0).unwrap();
        let p = priorities(&chain);
        for w in p.windows(2) {
            assert!(w[0] >= w[1]);
        }
        assert_eq!(p.as_slice(), &[9, 5, 3, 1]);
    }

    #[test]
    fn equal_priority_preserves_insertion_order() {
        let mut chain = Chain::new();
        chain.add(None, 5, 0, 1, true, UserData::NONE, 0).unwrap();
        chain.add(None, 5, 0, 1, true, UserData::NONE, 0).unwrap();
        let handles: heapless::Vec<TaskHandle, 4> = chain.iter_handles().collect();
        assert_eq!(handles[0].0, 0);
        assert_eq!(handles[1].0, 1);
    }

    #[test]
    fn add_then_remove_restores_prior_chain_r1() {
        let mut chain = Chain::new();
        let a = chain.add(None, 3, 0, 1, true, UserData::NONE, 0).unwrap();
        chain.add(None, 9, 0, 1, true, UserData::NONE, 0).unwrap();
        let before = priorities(&chain);
        let b = chain.add(None, 1, 0, 1, true, UserData::NONE, 0).unwrap();
        assert!(chain.remove(b));
        let after = priorities(&chain);
        assert_eq!(before, after);
        assert!(chain.get(a).is_some());
    }

    #[test]
    fn remove_missing_task_is_state_violation() {
        let mut chain = Chain::new();
        let a = chain.add(None, 1, 0, 1, true, UserData::NONE, 0).unwrap();
        assert!(chain.remove(a));
        assert!(!chain.remove(a));
    }

    #[test]
    fn cursor_wraps_tail_to_head() {
        let mut chain = Chain::new();
        chain.add(None, 9, 0, 1, true, UserData::NONE, 0).unwrap();
        chain.add(None, 5, 0, 1, true, UserData::NONE, 0).unwrap();
        let first = chain.advance_cursor().unwrap();
        let second = chain.advance_cursor().unwrap();
        let wrapped = chain.advance_cursor().unwrap();
        assert_eq!(wrapped, first);
        assert_ne!(first, second);
    }

    #[test]
    fn rearrange_reasserts_priority_order_after_dirtying() {
        let mut chain = Chain::new();
        let a = chain.add(None, 1, 0, 1, true, UserData::NONE, 0).unwrap();
        chain.add(None, 2, 0, 1, true, UserData::NONE, 0).unwrap();
        chain.get_mut(a).unwrap().set_priority(9);
        chain.mark_dirty();
        assert!(chain.needs_rearrange());
        chain.rearrange();
        assert!(!chain.needs_rearrange());
        assert_eq!(priorities(&chain).as_slice(), &[9, 2]);
    }
}

//! Deterministic task queue.
//!
//! Stands in for the host event loop: a FIFO of microtasks plus timers on a
//! virtual clock. Nothing runs until the owner drains the queue, which keeps
//! every ordering observable in tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

struct Timer {
    due: u64,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct Inner {
    microtasks: VecDeque<Task>,
    timers: Vec<Timer>,
    now: u64,
    seq: u64,
}

/// Shared handle to the queue. Clones refer to the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Rc<RefCell<Inner>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a microtask.
    pub fn queue(&self, task: impl FnOnce() + 'static) {
        self.inner.borrow_mut().microtasks.push_back(Box::new(task));
    }

    /// Queue a task to run once the clock has advanced by `delay_ms`.
    pub fn queue_timeout(&self, delay_ms: u64, task: impl FnOnce() + 'static) {
        let mut inner = self.inner.borrow_mut();
        inner.seq += 1;
        let timer = Timer {
            due: inner.now + delay_ms,
            seq: inner.seq,
            task: Box::new(task),
        };
        inner.timers.push(timer);
    }

    /// Virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.inner.borrow().now
    }

    pub fn pending_microtasks(&self) -> usize {
        self.inner.borrow().microtasks.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Run microtasks, including ones queued while draining, until none remain.
    /// Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.inner.borrow_mut().microtasks.pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Advance the clock, firing due timers in order. Microtasks are drained
    /// before and after each timer.
    pub fn advance(&self, ms: u64) {
        self.run_until_idle();
        let target = self.inner.borrow().now + ms;
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                let due = inner
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.seq))
                    .map(|(i, _)| i);
                due.map(|i| {
                    let timer = inner.timers.remove(i);
                    inner.now = timer.due;
                    timer.task
                })
            };
            match next {
                Some(task) => {
                    task();
                    self.run_until_idle();
                }
                None => break,
            }
        }
        self.inner.borrow_mut().now = target;
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TaskQueue")
            .field("now", &inner.now)
            .field("microtasks", &inner.microtasks.len())
            .field("timers", &inner.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn microtasks_run_fifo_including_nested() {
        let q = TaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2, q2) = (log.clone(), log.clone(), q.clone());
        q.queue(move || {
            l1.borrow_mut().push(1);
            let l3 = l1.clone();
            q2.queue(move || l3.borrow_mut().push(3));
        });
        q.queue(move || l2.borrow_mut().push(2));
        assert_eq!(q.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn timers_fire_only_when_due() {
        let q = TaskQueue::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (fired.clone(), fired.clone());
        q.queue_timeout(1000, move || a.borrow_mut().push("late"));
        q.queue_timeout(10, move || b.borrow_mut().push("early"));
        q.advance(500);
        assert_eq!(*fired.borrow(), vec!["early"]);
        q.advance(500);
        assert_eq!(*fired.borrow(), vec!["early", "late"]);
        assert_eq!(q.now(), 1000);
        assert_eq!(q.pending_timers(), 0);
    }
}

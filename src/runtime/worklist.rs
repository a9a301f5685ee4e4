//! Shared pool of pending work items.
//!
//! The pool is unordered from the caller's point of view (FIFO internally)
//! and tracks how many items are in flight. [`Worklist::take`] only returns
//! `None` at *quiescence*: the queue is empty and no worker holds an item,
//! since a worker that is still running may push new work when it finishes.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

#[derive(Debug)]
struct State<T> {
    queue: VecDeque<T>,
    in_flight: usize,
    halted: bool,
}

/// Multi-producer, multi-consumer work pool with quiescence detection.
#[derive(Debug)]
pub struct Worklist<T> {
    state: Mutex<State<T>>,
    wakeup: Condvar,
}

impl<T> Default for Worklist<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                in_flight: 0,
                halted: false,
            }),
            wakeup: Condvar::new(),
        }
    }
}

impl<T> Worklist<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.state.lock().queue.push_back(item);
        self.wakeup.notify_one();
    }

    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) {
        let added = {
            let mut state = self.state.lock();
            let before = state.queue.len();
            state.queue.extend(items);
            state.queue.len() - before
        };
        match added {
            0 => {}
            1 => {
                self.wakeup.notify_one();
            }
            _ => {
                self.wakeup.notify_all();
            }
        }
    }

    /// Takes the next item, waiting while the pool is transiently empty.
    ///
    /// Every `Some` must be matched by exactly one [`Worklist::finish`].
    pub fn take(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.halted {
                return None;
            }
            if let Some(item) = state.queue.pop_front() {
                state.in_flight += 1;
                return Some(item);
            }
            if state.in_flight == 0 {
                // Quiescent: wake everybody else so they can observe it too.
                self.wakeup.notify_all();
                return None;
            }
            self.wakeup.wait(&mut state);
        }
    }

    /// Marks one taken item as done, scheduling `follow_up` atomically with it.
    pub fn finish<I: IntoIterator<Item = T>>(&self, follow_up: I) {
        let mut state = self.state.lock();
        state.queue.extend(follow_up);
        debug_assert!(state.in_flight > 0, "finish without a matching take");
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.wakeup.notify_all();
    }

    /// Stops handing out work; pending items are left in place.
    pub fn halt(&self) {
        self.state.lock().halted = true;
        self.wakeup.notify_all();
    }

    pub fn is_halted(&self) -> bool {
        self.state.lock().halted
    }

    /// Items waiting to be taken.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn drains_in_fifo_order() {
        let wl = Worklist::new();
        wl.extend([1, 2, 3]);
        assert_eq!(wl.take(), Some(1));
        wl.finish([]);
        assert_eq!(wl.take(), Some(2));
        assert_eq!(wl.take(), Some(3));
        wl.finish([]);
        wl.finish([]);
        assert_eq!(wl.take(), None);
    }

    #[test]
    fn follow_up_work_keeps_the_pool_alive() {
        let wl = Worklist::new();
        wl.push(0u32);
        let mut seen = Vec::new();
        while let Some(item) = wl.take() {
            seen.push(item);
            let next = if item < 4 { vec![item + 1] } else { vec![] };
            wl.finish(next);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(wl.in_flight(), 0);
    }

    #[test]
    fn idle_workers_wait_for_in_flight_items() {
        // One seed item fans out into many; idle threads must not quit early.
        let wl = Worklist::new();
        wl.push(0usize);
        let processed = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while let Some(depth) = wl.take() {
                        processed.fetch_add(1, Ordering::Relaxed);
                        std::thread::yield_now();
                        let children = if depth < 6 { vec![depth + 1, depth + 1] } else { vec![] };
                        wl.finish(children);
                    }
                });
            }
        });
        // Complete binary tree of depth 6.
        assert_eq!(processed.load(Ordering::Relaxed), (1 << 7) - 1);
        assert!(wl.is_empty());
    }

    #[test]
    fn halt_stops_distribution() {
        let wl = Worklist::new();
        wl.extend([1, 2]);
        wl.halt();
        assert!(wl.is_halted());
        assert_eq!(wl.take(), None);
        assert_eq!(wl.len(), 2);
    }
}

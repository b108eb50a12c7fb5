//! Backpressure between the part producer and the ordered writer.
//!
//! The producer takes a slot before dispatching each part; the writer gives
//! the slot back once that part has been written to the sink (whether it came
//! straight off the channel or out of the pending buffer). A part that is
//! being fetched, queued, or buffered behind a gap holds its slot, so the
//! amount of unwritten payload stays bounded when the sink is slower than the
//! network.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cancel::CancelToken;

/// Upper bound on how long a blocked producer sleeps before re-checking
/// cancellation. Releases wake it immediately.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct FlowState {
    /// Parts dispatched but not yet written.
    in_flight: usize,
    /// Highest `in_flight` seen during the run.
    peak: usize,
}

/// Counting gate on parts dispatched-but-not-written. Never lets more than
/// `ceiling` parts be outstanding at once.
#[derive(Debug)]
pub struct FlowController {
    ceiling: usize,
    state: Mutex<FlowState>,
    released: Condvar,
}

impl FlowController {
    /// A ceiling of 0 is treated as 1 so the pipeline can always make progress.
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
            state: Mutex::new(FlowState::default()),
            released: Condvar::new(),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Block until a slot is free, then take it. Returns `false` (without
    /// taking a slot) if `cancel` fires while waiting.
    pub fn acquire(&self, cancel: &CancelToken) -> bool {
        let mut state = self.lock();
        while state.in_flight >= self.ceiling {
            if cancel.is_cancelled() {
                return false;
            }
            let (guard, _) = self
                .released
                .wait_timeout(state, POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        if cancel.is_cancelled() {
            return false;
        }
        state.in_flight += 1;
        state.peak = state.peak.max(state.in_flight);
        true
    }

    /// Give back one slot. Called exactly once per part consumed by the writer,
    /// or by the producer when a dispatch it already paid for fails.
    pub fn release(&self) {
        let mut state = self.lock();
        debug_assert!(state.in_flight > 0, "flow counter released below zero");
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.released.notify_one();
    }

    /// Parts currently dispatched but not yet written.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Highest number of outstanding parts observed so far.
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_blocks_at_ceiling_until_release() {
        let flow = Arc::new(FlowController::new(2));
        let cancel = CancelToken::new();
        assert!(flow.acquire(&cancel));
        assert!(flow.acquire(&cancel));
        assert_eq!(flow.in_flight(), 2);

        let (tx, rx) = mpsc::channel();
        let handle = {
            let flow = Arc::clone(&flow);
            let cancel = cancel.clone();
            thread::spawn(move || {
                let ok = flow.acquire(&cancel);
                tx.send(ok).unwrap();
            })
        };

        // Still blocked: nothing released yet.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(flow.in_flight(), 2);

        flow.release();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        handle.join().unwrap();
        assert_eq!(flow.in_flight(), 2);
        assert_eq!(flow.peak(), 2);
    }

    #[test]
    fn cancel_unblocks_waiting_producer() {
        let flow = Arc::new(FlowController::new(1));
        let cancel = CancelToken::new();
        assert!(flow.acquire(&cancel));

        let handle = {
            let flow = Arc::clone(&flow);
            let cancel = cancel.clone();
            thread::spawn(move || flow.acquire(&cancel))
        };
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        assert!(!handle.join().unwrap());
        assert_eq!(flow.in_flight(), 1);
    }

    #[test]
    fn acquire_after_cancel_takes_no_slot() {
        let flow = FlowController::new(4);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(!flow.acquire(&cancel));
        assert_eq!(flow.in_flight(), 0);
    }

    #[test]
    fn zero_ceiling_is_clamped() {
        let flow = FlowController::new(0);
        assert_eq!(flow.ceiling(), 1);
        assert!(flow.acquire(&CancelToken::new()));
    }

    #[test]
    fn peak_never_exceeds_ceiling_under_churn() {
        let flow = Arc::new(FlowController::new(3));
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel::<()>();

        let releaser = {
            let flow = Arc::clone(&flow);
            thread::spawn(move || {
                for _ in rx.iter() {
                    thread::sleep(Duration::from_millis(1));
                    flow.release();
                }
            })
        };

        for _ in 0..50 {
            assert!(flow.acquire(&cancel));
            assert!(flow.in_flight() <= 3);
            tx.send(()).unwrap();
        }
        drop(tx);
        releaser.join().unwrap();

        assert_eq!(flow.in_flight(), 0);
        assert!(flow.peak() <= 3);
    }
}

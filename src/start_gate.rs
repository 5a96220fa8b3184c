//! One-shot start barrier shared by the render and audio tasks.
//!
//! The gate is armed once, released once, and hands every waiter the same
//! release instant, which becomes the session's start time.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Armed,
    Released(Instant),
    /// The trigger was dropped without releasing.
    Abandoned,
}

struct Shared {
    state: Mutex<GateState>,
    released: Condvar,
}

/// Waiting half; clone one per task.
#[derive(Clone)]
pub struct StartGate {
    shared: Arc<Shared>,
}

/// Releasing half. Consumed by [`StartTrigger::release`], so it can fire once.
pub struct StartTrigger {
    shared: Arc<Shared>,
    fired: bool,
}

impl StartGate {
    pub fn arm() -> (StartGate, StartTrigger) {
        let shared = Arc::new(Shared {
            state: Mutex::new(GateState::Armed),
            released: Condvar::new(),
        });
        (
            StartGate {
                shared: shared.clone(),
            },
            StartTrigger {
                shared,
                fired: false,
            },
        )
    }

    /// Blocks until released and returns the release instant, or `None` if the
    /// trigger was dropped without releasing.
    pub fn wait(&self) -> Option<Instant> {
        let mut state = self.shared.state.lock();
        loop {
            match *state {
                GateState::Armed => self.shared.released.wait(&mut state),
                GateState::Released(at) => return Some(at),
                GateState::Abandoned => return None,
            }
        }
    }

    #[cfg(test)]
    fn is_released(&self) -> bool {
        matches!(*self.shared.state.lock(), GateState::Released(_))
    }
}

impl StartTrigger {
    /// Releases every current and future waiter with the same start instant.
    pub fn release(mut self) -> Instant {
        let at = Instant::now();
        self.finish(GateState::Released(at));
        at
    }

    fn finish(&mut self, outcome: GateState) {
        if self.fired {
            return;
        }
        self.fired = true;
        let mut state = self.shared.state.lock();
        *state = outcome;
        self.shared.released.notify_all();
    }
}

impl Drop for StartTrigger {
    fn drop(&mut self) {
        self.finish(GateState::Abandoned);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn waiters_stay_blocked_until_release() {
        let (gate, trigger) = StartGate::arm();
        let passed = Arc::new(AtomicUsize::new(0));

        let handles = (0..3)
            .map(|_| {
                let gate = gate.clone();
                let passed = passed.clone();
                thread::spawn(move || {
                    let at = gate.wait();
                    passed.fetch_add(1, Ordering::SeqCst);
                    at
                })
            })
            .collect::<Vec<_>>();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(passed.load(Ordering::SeqCst), 0);
        assert!(!gate.is_released());

        let released_at = trigger.release();
        for handle in handles {
            let at = handle.join().expect("waiter should not panic");
            assert_eq!(at, Some(released_at));
        }
        assert_eq!(passed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn late_waiter_sees_same_instant() {
        let (gate, trigger) = StartGate::arm();
        let released_at = trigger.release();
        assert!(gate.is_released());
        assert_eq!(gate.wait(), Some(released_at));
        assert_eq!(gate.clone().wait(), Some(released_at));
    }

    #[test]
    fn dropped_trigger_abandons_waiters() {
        let (gate, trigger) = StartGate::arm();
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait())
        };
        thread::sleep(Duration::from_millis(20));
        drop(trigger);
        assert_eq!(waiter.join().expect("waiter should not panic"), None);
        assert!(!gate.is_released());
    }
}

//! Drain-then-close barrier guarding module teardown.
//!
//! Every capability invocation holds a permit; unloading flips the gate
//! to draining (no new permits) and waits for outstanding permits to be
//! returned before the module handle may be released.

use std::sync::{Condvar, Mutex};

use crate::error::InvokeError;

#[derive(Debug)]
struct GateState {
    in_flight: usize,
    draining: bool,
}

#[derive(Debug)]
pub(crate) struct CallGate {
    state: Mutex<GateState>,
    idle: Condvar,
}

impl CallGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                in_flight: 0,
                draining: false,
            }),
            idle: Condvar::new(),
        }
    }

    /// Take a permit for one invocation. Fails once draining has begun.
    pub fn begin(&self) -> Result<CallPermit<'_>, InvokeError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.draining {
            return Err(InvokeError::Unloading);
        }
        state.in_flight += 1;
        Ok(CallPermit { gate: self })
    }

    /// Block new invocations and wait until in-flight ones finish.
    /// Idempotent; the gate stays closed afterwards.
    pub fn drain(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.draining = true;
        while state.in_flight > 0 {
            state = self.idle.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).in_flight
    }
}

#[derive(Debug)]
pub(crate) struct CallPermit<'a> {
    gate: &'a CallGate,
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        let mut state = self
            .gate
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.gate.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn permits_count_in_flight_calls() {
        let gate = CallGate::new();
        let a = gate.begin().unwrap();
        let b = gate.begin().unwrap();
        assert_eq!(gate.in_flight(), 2);
        drop(a);
        assert_eq!(gate.in_flight(), 1);
        drop(b);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn drain_rejects_new_calls() {
        let gate = CallGate::new();
        gate.drain();
        assert_eq!(gate.begin().unwrap_err(), InvokeError::Unloading);
        // Draining twice is fine.
        gate.drain();
    }

    #[test]
    fn drain_waits_for_outstanding_permits() {
        let gate = Arc::new(CallGate::new());
        let finished = Arc::new(AtomicBool::new(false));

        let permit_gate = Arc::clone(&gate);
        let permit_done = Arc::clone(&finished);
        let worker = std::thread::spawn(move || {
            let permit = permit_gate.begin().unwrap();
            std::thread::sleep(Duration::from_millis(100));
            permit_done.store(true, Ordering::SeqCst);
            drop(permit);
        });

        // Give the worker time to take its permit before draining.
        std::thread::sleep(Duration::from_millis(20));
        gate.drain();
        assert!(
            finished.load(Ordering::SeqCst),
            "drain returned while a call was still in flight"
        );

        worker.join().unwrap();
    }
}

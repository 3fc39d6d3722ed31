// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timer service (component C1).
//!
//! The driver is a single-threaded cooperative state machine: nothing in
//! the core blocks or suspends. A timer therefore isn't a
//! background thread with a sleep — it is a deadline that the owning event
//! loop checks by calling [`Timer::poll`] whenever it has an opportunity to
//! run (after a UART read, after a `send_command`, or on an explicit idle
//! tick). `poll` fires the callback at most once per expiry and disarms the
//! timer, matching "callbacks never nest under start/stop".

use std::time::{Duration, Instant};

/// A one-shot, cancellable, re-armable timer.
pub trait Timer {
    /// Arms the timer to fire after `duration`. Returns `true` if a new
    /// timer was started (an already-running timer is replaced: the old
    /// deadline and callback are discarded).
    fn start(&mut self, duration: Duration, callback: TimerCallback) -> bool;

    /// Cancels a running timer. Returns `true` if a running timer was
    /// actually cancelled.
    fn stop(&mut self) -> bool;

    /// Whether the timer currently has an armed deadline.
    fn is_running(&self) -> bool;

    /// Checks the deadline against `now` and, if it has passed, clears the
    /// timer and invokes its callback. Returns `true` if the callback fired.
    ///
    /// This is the core's only notion of "waiting": the event loop is
    /// expected to call `poll` from its own idle point rather than this
    /// trait spawning anything.
    fn poll(&mut self, now: Instant) -> bool;
}

/// Callback invoked on timer expiry. Receives no arguments: the expiring
/// timer has already disarmed itself by the time the callback runs, so
/// there is nothing useful to hand back through a `&mut dyn Timer`
/// reference without re-entrancy hazards.
pub type TimerCallback = Box<dyn FnMut() + Send>;

/// A [`Timer`] backed by [`std::time::Instant`].
pub struct MonotonicTimer {
    deadline: Option<Instant>,
    callback: Option<TimerCallback>,
}

impl MonotonicTimer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deadline: None,
            callback: None,
        }
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for MonotonicTimer {
    fn start(&mut self, duration: Duration, callback: TimerCallback) -> bool {
        self.stop();
        self.deadline = Some(Instant::now() + duration);
        self.callback = Some(callback);
        true
    }

    fn stop(&mut self) -> bool {
        let was_running = self.deadline.is_some();
        self.deadline = None;
        self.callback = None;
        was_running
    }

    fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    fn poll(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        self.deadline = None;
        if let Some(mut callback) = self.callback.take() {
            callback();
            true
        } else {
            false
        }
    }
}

//! Countdown state machine.
//!
//! ```text
//! Idle ──start──▶ Counting ──remaining hits zero──▶ Expired
//!                    │
//!                    └──cancel──▶ Cancelled ──▶ Idle
//! ```
//!
//! The controller holds no timer. Whoever owns the tick source calls
//! [`CountdownController::tick`] with the generation returned by
//! [`CountdownController::start`]; ticks from any other generation are
//! ignored, so a tick that was already in flight when the countdown was
//! cancelled can never expire it.

use std::time::Duration;

use paddock_protocol::{CountdownState, CountdownStatus};

use crate::LobbyError;

/// Result of feeding one tick to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not counting, or the tick belongs to an earlier generation.
    Stale,
    /// Still counting; carries the new remaining time.
    Counting(Duration),
    /// Remaining time reached zero.
    Expired,
}

#[derive(Debug, Clone)]
pub struct CountdownController {
    state: CountdownState,
    duration: Duration,
    step: Duration,
    remaining: Duration,
    generation: u64,
}

impl CountdownController {
    /// `duration` is restored on every start; `step` is taken off per tick.
    pub fn new(duration: Duration, step: Duration) -> Self {
        Self {
            state: CountdownState::Idle,
            duration,
            step,
            remaining: duration,
            generation: 0,
        }
    }

    /// Idle → Counting with the full duration. Returns the new generation.
    pub fn start(&mut self) -> Result<u64, LobbyError> {
        match self.state {
            CountdownState::Idle | CountdownState::Cancelled => {
                self.state = CountdownState::Counting;
                self.remaining = self.duration;
                self.generation += 1;
                Ok(self.generation)
            }
            CountdownState::Counting => Err(LobbyError::CountdownActive),
            CountdownState::Expired => Err(LobbyError::SessionClosed),
        }
    }

    /// Advances a running countdown by one step.
    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        if self.state != CountdownState::Counting || generation != self.generation {
            return TickOutcome::Stale;
        }
        self.remaining = self.remaining.saturating_sub(self.step);
        if self.remaining.is_zero() {
            self.state = CountdownState::Expired;
            TickOutcome::Expired
        } else {
            TickOutcome::Counting(self.remaining)
        }
    }

    /// Counting → Cancelled → Idle.
    ///
    /// Returns both transitions so each can be broadcast. Remaining time is
    /// back at the full duration in the Idle status.
    pub fn cancel(&mut self) -> Result<[CountdownStatus; 2], LobbyError> {
        if self.state != CountdownState::Counting {
            return Err(LobbyError::CountdownNotRunning);
        }
        self.state = CountdownState::Cancelled;
        let cancelled = self.status();
        self.state = CountdownState::Idle;
        self.remaining = self.duration;
        Ok([cancelled, self.status()])
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn is_counting(&self) -> bool {
        self.state == CountdownState::Counting
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Generation of the most recent start; 0 before the first.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> CountdownStatus {
        CountdownStatus {
            state: self.state,
            remaining_ms: self.remaining.as_millis() as u64,
        }
    }
}

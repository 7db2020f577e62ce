//! Once-a-second redraw timer for interactive mode

use log::trace;

/// Interactive mode updates once a second, on the second
pub const INTERACTIVE_UPDATE_RATE_MS: i64 = 1000;

/// Milliseconds from `now_ms` until the next whole second of wall-clock time.
/// Always in `1..=1000`, so a tick landing exactly on a boundary waits a full
/// second rather than re-firing immediately.
pub fn delay_to_next_tick(now_ms: i64) -> i64 {
    INTERACTIVE_UPDATE_RATE_MS - now_ms.rem_euclid(INTERACTIVE_UPDATE_RATE_MS)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerState {
    Running,
    Stopped,
}

/// Identifies one arming of the timer. A fire carrying any token other than
/// the currently pending one is stale and does nothing.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct TimerToken(u64);

/// A timer message waiting to be delivered
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PendingTimer {
    pub token: TimerToken,
    /// Wall-clock time (ms since the epoch) the message is due
    pub due_ms: i64,
}

/// Keeps at most one redraw timer pending, and only while the face should be
/// ticking (visible and interactive). The owner re-evaluates with
/// [Self::update] whenever visibility or ambient mode changes.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// Bumped on every arm, so old tokens never match again
    generation: u64,
    pending: Option<PendingTimer>,
    /// Set on teardown. Nothing can be armed after this.
    shut_down: bool,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TimerState {
        if self.pending.is_some() {
            TimerState::Running
        } else {
            TimerState::Stopped
        }
    }

    pub fn pending(&self) -> Option<PendingTimer> {
        self.pending
    }

    /// Start the timer if it should be running, or stop it if not. Any
    /// pending message is dropped first, so this never leaves two behind.
    /// Starting delivers the first tick immediately.
    pub fn update(&mut self, should_run: bool, now_ms: i64) {
        self.cancel();
        if should_run {
            self.arm(now_ms);
        }
    }

    /// Handle a delivered timer message. Returns whether the face should
    /// redraw; stale or cancelled messages return `false`. A live tick re-arms
    /// itself for the next second boundary if the timer should keep running.
    pub fn fire(
        &mut self,
        token: TimerToken,
        should_run: bool,
        now_ms: i64,
    ) -> bool {
        match self.pending {
            Some(pending) if pending.token == token => {}
            _ => {
                trace!("Ignoring stale timer {token:?}");
                return false;
            }
        }
        self.pending = None;
        if should_run {
            self.arm(now_ms + delay_to_next_tick(now_ms));
        }
        true
    }

    /// Cancel everything, permanently. Used when the face is torn down.
    pub fn shutdown(&mut self) {
        self.cancel();
        self.shut_down = true;
    }

    fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            trace!("Cancelled timer {:?}", pending.token);
        }
    }

    fn arm(&mut self, due_ms: i64) {
        if self.shut_down {
            return;
        }
        self.generation += 1;
        let pending = PendingTimer {
            token: TimerToken(self.generation),
            due_ms,
        };
        trace!("Armed timer {pending:?}");
        self.pending = Some(pending);
    }
}

//! Wall-clock deadline timers for the timed phases
//!
//! Timers never count down by decrement. Each one holds an absolute epoch
//! deadline and derives the remaining time from `deadline - now` on every
//! observation, which keeps it correct across reloads and suspended tabs.
//! Pausing records when the pause started; resuming pushes the deadline
//! forward by the paused span so the player is never charged for it.

use std::{cell::Cell, rc::Rc, time::Duration};

use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use web_time::SystemTime;

/// Milliseconds since the Unix epoch
pub type EpochMillis = u64;

/// Source of the current wall-clock time
pub trait Clock {
    /// Returns the current time in epoch milliseconds
    fn now(&self) -> EpochMillis;
}

/// The host's wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochMillis {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as EpochMillis)
    }
}

/// A clock that only moves when told to
///
/// Clones share the same time, so a test can keep a handle while the
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<EpochMillis>>);

impl ManualClock {
    /// Creates a clock reading `now`
    pub fn new(now: EpochMillis) -> Self {
        Self(Rc::new(Cell::new(now)))
    }

    /// Moves the clock forward
    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by.as_millis() as EpochMillis);
    }

    /// Sets the clock to an absolute time
    pub fn set(&self, now: EpochMillis) {
        self.0.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> EpochMillis {
        self.0.get()
    }
}

/// The timed sub-states of a round
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize, derive_more::Display,
)]
pub enum Phase {
    /// Category preview, where the power-up and the wager are decided
    #[display("category")]
    Category,
    /// The question is shown and accepts an answer
    #[display("question")]
    Question,
    /// The answer is revealed
    #[display("answer")]
    Answer,
}

/// Independent reasons for a timer to be paused
///
/// A timer is paused while any of them holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum PauseSource {
    /// A blocking dialog is open
    Modal,
    /// The host environment is not rendering (backgrounded tab)
    Hidden,
    /// The round's media has not finished loading
    MediaPending,
}

/// The set of active pause signals
#[derive(Debug, Clone, Default)]
pub struct PauseSignals(EnumMap<PauseSource, bool>);

impl PauseSignals {
    /// Raises or clears one signal
    pub fn set(&mut self, source: PauseSource, active: bool) {
        self.0[source] = active;
    }

    /// Whether `source` is currently raised
    pub fn get(&self, source: PauseSource) -> bool {
        self.0[source]
    }

    /// Whether any signal is raised
    pub fn any(&self) -> bool {
        self.0.values().any(|active| *active)
    }
}

/// An armed countdown towards an absolute deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineTimer {
    deadline: EpochMillis,
    total: Duration,
    paused_since: Option<EpochMillis>,
    fired: bool,
}

impl DeadlineTimer {
    /// Arms a fresh timer
    ///
    /// The deadline is `now + duration + grace`. The grace absorbs render
    /// latency so the phase never ends before the visible countdown reaches
    /// zero; it is not part of `total`.
    pub fn arm(now: EpochMillis, duration: Duration, grace: Duration) -> Self {
        Self {
            deadline: now + duration.as_millis() as EpochMillis + grace.as_millis() as EpochMillis,
            total: duration,
            paused_since: None,
            fired: false,
        }
    }

    /// Resumes a timer from a persisted deadline
    pub fn resume(deadline: EpochMillis, total: Duration) -> Self {
        Self {
            deadline,
            total,
            paused_since: None,
            fired: false,
        }
    }

    /// Arms a timer, honoring `stored` when it is still in the future
    pub fn arm_or_resume(
        stored: Option<EpochMillis>,
        now: EpochMillis,
        duration: Duration,
        grace: Duration,
    ) -> Self {
        match stored {
            Some(deadline) if deadline > now => Self::resume(deadline, duration),
            _ => Self::arm(now, duration, grace),
        }
    }

    /// The current absolute deadline
    pub fn deadline(&self) -> EpochMillis {
        self.deadline
    }

    /// The nominal length of the phase
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Whether the timer is paused
    pub fn is_paused(&self) -> bool {
        self.paused_since.is_some()
    }

    /// The deadline as it would be if the pause ended at `now`
    ///
    /// Used to persist a fair deadline while a long pause is still running.
    pub fn projected_deadline(&self, now: EpochMillis) -> EpochMillis {
        match self.paused_since {
            Some(since) => self.deadline + now.saturating_sub(since),
            None => self.deadline,
        }
    }

    /// Time left until the deadline
    ///
    /// While paused, the remaining time is frozen at the moment the pause began.
    pub fn remaining(&self, now: EpochMillis) -> Duration {
        let observed_at = self.paused_since.unwrap_or(now);
        Duration::from_millis(self.deadline.saturating_sub(observed_at))
    }

    /// Starts or ends a pause
    ///
    /// # Returns
    ///
    /// The shifted deadline when a pause ends, so the caller can persist it;
    /// `None` when nothing changed or a pause began.
    pub fn set_paused(&mut self, paused: bool, now: EpochMillis) -> Option<EpochMillis> {
        match (paused, self.paused_since) {
            (true, None) => {
                self.paused_since = Some(now);
                None
            }
            (false, Some(since)) => {
                self.paused_since = None;
                self.deadline += now.saturating_sub(since);
                Some(self.deadline)
            }
            _ => None,
        }
    }

    /// Reports expiry, exactly once per arm cycle
    ///
    /// Returns true the first time it is called at or after the deadline
    /// while the timer is not paused.
    pub fn expire(&mut self, now: EpochMillis) -> bool {
        if self.fired || self.is_paused() || !self.remaining(now).is_zero() {
            return false;
        }
        self.fired = true;
        true
    }

    /// An observational snapshot for display
    pub fn view(&self, phase: Phase, now: EpochMillis) -> TimerView {
        let remaining = self.remaining(now);
        let progress = if self.total.is_zero() {
            0.
        } else {
            (remaining.as_secs_f64() / self.total.as_secs_f64()).min(1.)
        };

        TimerView {
            phase,
            remaining,
            total: self.total,
            progress,
            paused: self.is_paused(),
            label: countdown_label(remaining),
        }
    }
}

/// Formats a remaining time as `m:ss`, or plain seconds under a minute
///
/// Seconds are rounded up so the label reads `1` until the very end.
pub fn countdown_label(remaining: Duration) -> String {
    let secs = remaining.as_millis().div_ceil(1000);
    let (minutes, seconds) = (secs / 60, secs % 60);
    if minutes > 0 {
        format!("{minutes}:{seconds:02}")
    } else {
        format!("{seconds}")
    }
}

/// What a countdown bar needs to draw itself
///
/// Purely observational: nothing here feeds back into scoring.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerView {
    /// The phase being timed
    pub phase: Phase,
    /// Time left
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub remaining: Duration,
    /// Nominal phase length
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub total: Duration,
    /// `remaining / total`, clamped to `[0, 1]`
    pub progress: f64,
    /// Whether the countdown is held
    pub paused: bool,
    /// Remaining time formatted for display
    pub label: String,
}

use chrono::{DateTime, Duration, Utc};

use retro_types::api::TimerView;
use retro_types::models::Retrospective;

/// Result of asking the shared timer to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStart {
    /// Nothing was running; this is the new deadline to persist.
    Started(DateTime<Utc>),
    /// Someone already started the countdown. Adopt their deadline and
    /// leave the stored value alone.
    AlreadyRunning(DateTime<Utc>),
}

impl TimerStart {
    pub fn expiration(&self) -> DateTime<Utc> {
        match self {
            Self::Started(at) | Self::AlreadyRunning(at) => *at,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

pub fn is_running(expiration: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expiration > now
}

/// Decide the shared deadline for a start request.
pub fn start(retro: &Retrospective, minutes: u32, now: DateTime<Utc>) -> TimerStart {
    if is_running(retro.timer_expiration, now) {
        TimerStart::AlreadyRunning(retro.timer_expiration)
    } else {
        TimerStart::Started(now + Duration::minutes(i64::from(minutes)))
    }
}

/// A reset stores "now", which every reader treats as expired.
pub fn reset(now: DateTime<Utc>) -> DateTime<Utc> {
    now
}

/// Time left until `expiration`, clamped at zero.
pub fn remaining(expiration: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expiration - now).max(Duration::zero())
}

/// Seconds left, rounded up, so a countdown only reads zero once it has
/// actually expired.
pub fn whole_seconds(left: Duration) -> i64 {
    let millis = left.num_milliseconds().max(0);
    (millis + 999) / 1000
}

/// Whole minutes and leftover seconds of a (non-negative) duration.
pub fn minutes_seconds(left: Duration) -> (i64, i64) {
    let secs = whole_seconds(left);
    (secs / 60, secs % 60)
}

/// `MM:SS`, both fields zero-padded.
pub fn format_remaining(left: Duration) -> String {
    let (minutes, seconds) = minutes_seconds(left);
    format!("{minutes:02}:{seconds:02}")
}

pub fn view(expiration: DateTime<Utc>, now: DateTime<Utc>) -> TimerView {
    let left = remaining(expiration, now);
    TimerView {
        expires_at: expiration,
        running: is_running(expiration, now),
        remaining_seconds: whole_seconds(left),
        display: format_remaining(left),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountdownState {
    Running { deadline: DateTime<Utc> },
    Paused { left: Duration },
    Stopped,
}

/// One viewer's local countdown.
///
/// Pausing only freezes this viewer's display. The shared deadline keeps
/// running for everybody else, and a later `resume` that finds nothing left
/// re-syncs from the shared value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    state: CountdownState,
}

impl Countdown {
    /// Adopt the shared deadline as-is.
    pub fn sync(expiration: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let state = if is_running(expiration, now) {
            CountdownState::Running {
                deadline: expiration,
            }
        } else {
            CountdownState::Stopped
        };
        Self { state }
    }

    pub fn restart(&mut self, expiration: DateTime<Utc>, now: DateTime<Utc>) {
        *self = Self::sync(expiration, now);
    }

    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            CountdownState::Running { deadline } => is_running(deadline, now),
            _ => false,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, CountdownState::Paused { .. })
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if let CountdownState::Running { deadline } = self.state {
            self.state = CountdownState::Paused {
                left: remaining(deadline, now),
            };
        }
    }

    /// Continue from the frozen value, or fall back to the shared deadline
    /// when nothing is left locally.
    pub fn resume(&mut self, shared_expiration: DateTime<Utc>, now: DateTime<Utc>) {
        let left = self.remaining(now);
        if left > Duration::zero() {
            if let CountdownState::Paused { left } = self.state {
                self.state = CountdownState::Running {
                    deadline: now + left,
                };
            }
        } else {
            self.restart(shared_expiration, now);
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.state {
            CountdownState::Running { deadline } => remaining(deadline, now),
            CountdownState::Paused { left } => left,
            CountdownState::Stopped => Duration::zero(),
        }
    }

    pub fn display(&self, now: DateTime<Utc>) -> String {
        format_remaining(self.remaining(now))
    }
}

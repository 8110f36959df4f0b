use chrono::{DateTime, Duration, Utc};

/// What a call to [`TimerEngine::tick`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    /// At least one whole second elapsed; `warning` is set while the
    /// countdown is inside its warning band.
    Tick {
        remaining_seconds: u32,
        warning: bool,
    },
    /// The countdown reached zero and has been stopped.
    Expired,
}

#[derive(Debug, Clone)]
struct Countdown {
    remaining_seconds: u32,
    warn_below: Option<u32>,
    last_flush: DateTime<Utc>,
}

/// Single-slot countdown engine.
///
/// The engine never runs its own clock; callers poll [`TimerEngine::tick`]
/// with the current time (roughly once a second) and the engine drains
/// however many whole seconds elapsed since the last poll. Starting a new
/// countdown replaces the previous one, so at most one countdown exists
/// at a time.
#[derive(Debug, Clone, Default)]
pub struct TimerEngine {
    active: Option<Countdown>,
}

impl TimerEngine {
    #[must_use]
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Starts a countdown of `seconds`, replacing any running one.
    ///
    /// `warn_below` enables warning ticks once the remaining time is at
    /// or under that many seconds.
    pub fn start(&mut self, seconds: u32, warn_below: Option<u32>, now: DateTime<Utc>) {
        self.active = Some(Countdown {
            remaining_seconds: seconds,
            warn_below,
            last_flush: now,
        });
    }

    /// Stops the running countdown, if any.
    pub fn stop(&mut self) {
        self.active = None;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Remaining whole seconds of the running countdown.
    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.active.as_ref().map(|c| c.remaining_seconds)
    }

    /// Drains elapsed time and reports what happened.
    ///
    /// Returns `None` while no countdown runs or less than a whole
    /// second has passed since the previous call. A poll that arrives
    /// late drains every missed second at once; intermediate ticks are
    /// coalesced and only the final state is reported. On expiry the
    /// countdown is cleared.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<TimerSignal> {
        let countdown = self.active.as_mut()?;

        if countdown.remaining_seconds == 0 {
            self.active = None;
            return Some(TimerSignal::Expired);
        }

        let elapsed = (now - countdown.last_flush).num_seconds();
        if elapsed <= 0 {
            return None;
        }

        let drained = u32::try_from(elapsed).unwrap_or(u32::MAX);
        if drained >= countdown.remaining_seconds {
            self.active = None;
            return Some(TimerSignal::Expired);
        }

        countdown.remaining_seconds -= drained;
        countdown.last_flush += Duration::seconds(elapsed);
        let warning = countdown
            .warn_below
            .is_some_and(|band| countdown.remaining_seconds <= band);

        Some(TimerSignal::Tick {
            remaining_seconds: countdown.remaining_seconds,
            warning,
        })
    }
}

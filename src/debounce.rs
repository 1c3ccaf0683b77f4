//! Consecutive-frame debounce for hazard alerts.
//!
//! The streak counts consecutive hazardous processed frames. One clean frame
//! resets it to zero immediately; there is no decay and no sliding window. The
//! alert is confirmed once the streak reaches the configured threshold.
//!
//! ```text
//! Normal --hazard--> Suspect(1) --hazard--> ... --hazard--> Confirmed(k >= N)
//!    ^                   |                                      |
//!    +------ clean ------+----------------- clean --------------+
//! ```
//!
//! A threshold of 1 confirms on the first hazardous frame (pure per-frame policy).

use std::fmt;

pub const DEFAULT_CONFIRM_STREAK: u32 = 4;

/// Debounce state after the most recent processed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertState {
    #[default]
    Normal,
    /// Hazard seen on `n` consecutive frames, below the confirm threshold.
    Suspect(u32),
    /// Hazard seen on `n` consecutive frames, at or above the threshold.
    Confirmed(u32),
}

impl AlertState {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, AlertState::Confirmed(_))
    }

    pub fn streak(&self) -> u32 {
        match *self {
            AlertState::Normal => 0,
            AlertState::Suspect(n) | AlertState::Confirmed(n) => n,
        }
    }
}

/// Streak counter with a fixed confirm threshold.
#[derive(Clone, Debug)]
pub struct AlertStreak {
    streak: u32,
    confirm_at: u32,
}

impl AlertStreak {
    /// `confirm_at` is clamped to at least 1.
    pub fn new(confirm_at: u32) -> Self {
        Self {
            streak: 0,
            confirm_at: confirm_at.max(1),
        }
    }

    /// Feed one processed frame's hazard verdict.
    pub fn observe(&mut self, hazardous: bool) -> AlertState {
        if hazardous {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.streak = 0;
        }
        self.state()
    }

    pub fn state(&self) -> AlertState {
        if self.streak == 0 {
            AlertState::Normal
        } else if self.streak >= self.confirm_at {
            AlertState::Confirmed(self.streak)
        } else {
            AlertState::Suspect(self.streak)
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn confirm_at(&self) -> u32 {
        self.confirm_at
    }
}

impl Default for AlertStreak {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_STREAK)
    }
}

// ----------------------------------------------------------------------------
// Banner: human-readable status line
// ----------------------------------------------------------------------------

/// Status banner shown on the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Banner {
    Standby,
    Monitoring,
    Analyzing { streak: u32, confirm_at: u32 },
    FireConfirmed,
}

impl Banner {
    pub fn for_state(state: AlertState, confirm_at: u32) -> Self {
        match state {
            AlertState::Normal => Banner::Monitoring,
            AlertState::Suspect(streak) => Banner::Analyzing { streak, confirm_at },
            AlertState::Confirmed(_) => Banner::FireConfirmed,
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, Banner::FireConfirmed)
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Banner::Standby => write!(f, "SYSTEM STANDBY"),
            Banner::Monitoring => write!(f, "SYSTEM MONITORING - NORMAL"),
            Banner::Analyzing { streak, confirm_at } => {
                write!(f, "Analyzing... ({}/{})", streak, confirm_at)
            }
            Banner::FireConfirmed => write!(f, "FIRE CONFIRMED"),
        }
    }
}

//! User-activity tracking.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Interaction events that count as user activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityEvent {
    MouseDown,
    MouseMove,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
}

impl ActivityEvent {
    pub const ALL: [ActivityEvent; 6] = [
        ActivityEvent::MouseDown,
        ActivityEvent::MouseMove,
        ActivityEvent::KeyPress,
        ActivityEvent::Scroll,
        ActivityEvent::TouchStart,
        ActivityEvent::Click,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityEvent::MouseDown => "mousedown",
            ActivityEvent::MouseMove => "mousemove",
            ActivityEvent::KeyPress => "keypress",
            ActivityEvent::Scroll => "scroll",
            ActivityEvent::TouchStart => "touchstart",
            ActivityEvent::Click => "click",
        }
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        ActivityEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == name)
            .ok_or_else(|| format!("Unknown activity event: {}", s.trim()))
    }
}

/// In-memory activity state: when the user was last seen, and whether the
/// expiry warning has been raised since then.
#[derive(Debug, Clone)]
pub struct ActivityState {
    last_activity: DateTime<Utc>,
    warning_shown: bool,
}

impl ActivityState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_activity: now,
            warning_shown: false,
        }
    }

    /// Reset the idle clock. Clears the warning flag.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.warning_shown = false;
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn warning_shown(&self) -> bool {
        self.warning_shown
    }

    /// Returns true if the flag was newly set.
    pub fn mark_warning_shown(&mut self) -> bool {
        !std::mem::replace(&mut self.warning_shown, true)
    }

    pub fn clear_warning(&mut self) {
        self.warning_shown = false;
    }
}

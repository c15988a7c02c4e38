//! Session timeout and renewal tracking.
//!
//! A [`SessionTimeout`] coordinator owns two periodic checks (token expiry
//! and user idleness), the activity subscription, and an auto-renewal
//! timer. All renewals go through a shared [`RenewalGuard`] so that
//! overlapping triggers only ever produce one refresh call.

mod activity;
mod renewal;
mod scheduler;
mod timeout;

pub use activity::*;
pub use renewal::*;
pub use scheduler::*;
pub use timeout::*;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::time::Duration;

use crate::error::AuthError;

/// An authenticated session as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Expiry as a Unix timestamp in seconds
    pub exp: i64,
    pub role: Option<String>,
}

impl Session {
    pub fn new(exp: i64) -> Self {
        Self { exp, role: None }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Fractional minutes left before expiry; negative once expired.
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> f64 {
        let remaining_ms = self.exp_millis().saturating_sub(now.timestamp_millis());
        remaining_ms as f64 / 60_000.0
    }

    /// Expiry in Unix milliseconds, saturating for out-of-range claims.
    pub fn exp_millis(&self) -> i64 {
        self.exp.saturating_mul(1000)
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The host's authentication state: current session plus the logout and
/// refresh actions the tracker may invoke.
#[async_trait]
pub trait AuthContext: Send + Sync {
    fn current_session(&self) -> Option<Session>;

    async fn logout(&self);

    async fn refresh_token(&self) -> Result<Session, AuthError>;
}

/// Why the tracker ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogoutReason {
    SessionExpired,
    RenewalFailed,
    IdleTimeout,
}

impl LogoutReason {
    /// Machine-readable marker placed in the login redirect.
    pub fn query_marker(&self) -> &'static str {
        match self {
            // A failed refresh is reported to the login page as an expiry
            LogoutReason::SessionExpired | LogoutReason::RenewalFailed => "session_expired",
            LogoutReason::IdleTimeout => "idle_timeout",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::SessionExpired => "session_expired",
            LogoutReason::RenewalFailed => "renewal_failed",
            LogoutReason::IdleTimeout => "idle_timeout",
        }
    }

    pub fn login_redirect(&self, login_path: &str) -> String {
        format!("{}?error={}", login_path, self.query_marker())
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning knobs for [`SessionTimeout`].
#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    /// Lead time before expiry at which the warning is raised
    pub warning_time: Duration,
    /// Interval between expiry checks
    pub check_interval: Duration,
    /// Lead time before expiry at which a check renews the session
    pub renewal_threshold: Duration,
    /// Inactivity after which the user is logged out
    pub max_idle_time: Duration,
    pub idle_check_interval: Duration,
    /// Lead time before expiry for the scheduled renewal
    pub renewal_lead: Duration,
    pub login_path: String,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            warning_time: Duration::from_secs(5 * 60),
            check_interval: Duration::from_secs(60),
            renewal_threshold: Duration::from_secs(10 * 60),
            max_idle_time: Duration::from_secs(30 * 60),
            idle_check_interval: Duration::from_secs(30),
            renewal_lead: Duration::from_secs(10 * 60),
            login_path: "/login".to_string(),
        }
    }
}

pub(crate) fn as_minutes(duration: Duration) -> f64 {
    duration.as_secs_f64() / 60.0
}

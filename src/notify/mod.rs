//! Toast notifications and navigation.
//!
//! The tracker talks to the user through two small capabilities: a
//! [`Notifier`] that displays toasts and a [`Navigator`] that moves the
//! user to another route (the login page after a forced logout).

use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::session::LogoutReason;

pub type ToastId = Uuid;

/// Default display time for non-persistent toasts
const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastKind::Info => write!(f, "info"),
            ToastKind::Success => write!(f, "success"),
            ToastKind::Warning => write!(f, "warning"),
            ToastKind::Error => write!(f, "error"),
        }
    }
}

/// Action button attached to a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastAction {
    ExtendSession,
}

impl ToastAction {
    pub fn label(&self) -> &'static str {
        match self {
            ToastAction::ExtendSession => "Extend Session",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    /// Zero keeps the toast until it is dismissed or replaced
    pub duration: Duration,
    pub action: Option<ToastAction>,
}

impl Toast {
    pub fn new(kind: ToastKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: message.into(),
            duration: DEFAULT_TOAST_DURATION,
            action: None,
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, title, message)
    }

    pub fn persistent(mut self) -> Self {
        self.duration = Duration::ZERO;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_action(mut self, action: ToastAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.duration.is_zero()
    }

    /// The "session expiring soon" warning.
    pub fn expiry_warning(minutes_left: f64) -> Self {
        let minutes = minutes_left.ceil().max(1.0) as u64;
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        Self::warning(
            "Session Expiring Soon",
            format!(
                "Your session will expire in {} {}. Extend it to stay signed in.",
                minutes, unit
            ),
        )
        .persistent()
        .with_action(ToastAction::ExtendSession)
    }

    /// Toast shown after the tracker ends the session.
    pub fn forced_logout(reason: LogoutReason) -> Self {
        match reason {
            LogoutReason::SessionExpired => Self::error(
                "Session Expired",
                "Your session has expired. Please sign in again.",
            ),
            LogoutReason::RenewalFailed => Self::error(
                "Session Expired",
                "We couldn't renew your session. Please sign in again.",
            ),
            LogoutReason::IdleTimeout => Self::warning(
                "Signed Out Due to Inactivity",
                "You were signed out after a period of inactivity. Please sign in again.",
            )
            .with_duration(Duration::from_secs(8)),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn show(&self, toast: Toast) -> ToastId;

    fn dismiss(&self, id: ToastId);
}

pub trait Navigator: Send + Sync {
    fn push(&self, path: &str);
}

/// Notifier that writes toasts to the log. A new persistent toast replaces
/// the previous one.
#[derive(Default)]
pub struct TracingNotifier {
    persistent: Mutex<Option<ToastId>>,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_persistent(&self) -> Option<ToastId> {
        *self.persistent.lock()
    }
}

impl Notifier for TracingNotifier {
    fn show(&self, toast: Toast) -> ToastId {
        if toast.is_persistent() {
            if let Some(replaced) = self.persistent.lock().replace(toast.id) {
                info!(toast_id = %replaced, "Toast replaced");
            }
        }

        let action = toast.action.map(|a| a.label()).unwrap_or("");
        match toast.kind {
            ToastKind::Error => error!(
                toast_id = %toast.id,
                title = %toast.title,
                action,
                "{}",
                toast.message
            ),
            ToastKind::Warning => warn!(
                toast_id = %toast.id,
                title = %toast.title,
                action,
                "{}",
                toast.message
            ),
            _ => info!(
                toast_id = %toast.id,
                kind = %toast.kind,
                title = %toast.title,
                "{}",
                toast.message
            ),
        }
        toast.id
    }

    fn dismiss(&self, id: ToastId) {
        let mut persistent = self.persistent.lock();
        if *persistent == Some(id) {
            *persistent = None;
        }
        info!(toast_id = %id, "Toast dismissed");
    }
}

/// Navigator for headless hosts: records the route change in the log.
#[derive(Debug, Default)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn push(&self, path: &str) {
        info!(path, "Navigating");
    }
}

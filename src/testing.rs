//! Test doubles for the tracker's collaborators.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{AuthError, StorageError};
use crate::notify::{Navigator, Notifier, Toast, ToastId};
use crate::session::{AuthContext, Clock, Session};
use crate::storage::KeyValueStore;

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Wall clock driven by tokio's (pausable) timer, starting at [`epoch`].
pub struct TokioClock {
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now() - self.started;
        epoch() + chrono::Duration::from_std(elapsed).unwrap()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RefreshBehavior {
    /// Issue a session expiring at the given Unix timestamp
    Extend(i64),
    /// Succeed without moving the expiry
    Keep,
    Fail,
}

pub struct MockAuth {
    session: Mutex<Option<Session>>,
    behavior: Mutex<RefreshBehavior>,
    delay: Option<Duration>,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockAuth {
    pub fn new(session: Option<Session>, behavior: RefreshBehavior) -> Self {
        Self {
            session: Mutex::new(session),
            behavior: Mutex::new(behavior),
            delay: None,
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn expiring_at(exp: i64, behavior: RefreshBehavior) -> Self {
        Self::new(Some(Session::new(exp)), behavior)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_behavior(&self, behavior: RefreshBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthContext for MockAuth {
    fn current_session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    async fn logout(&self) {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.lock() = None;
    }

    async fn refresh_token(&self) -> Result<Session, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = *self.behavior.lock();
        match behavior {
            RefreshBehavior::Extend(exp) => {
                let session = Session::new(exp);
                *self.session.lock() = Some(session.clone());
                Ok(session)
            }
            RefreshBehavior::Keep => self.current_session().ok_or(AuthError::MissingToken),
            RefreshBehavior::Fail => Err(AuthError::Rejected {
                status: 401,
                body: "refresh token expired".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Toast>>,
    dismissed: Mutex<Vec<ToastId>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<Toast> {
        self.shown.lock().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.shown.lock().iter().map(|t| t.title.clone()).collect()
    }

    pub fn dismissed(&self) -> Vec<ToastId> {
        self.dismissed.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, toast: Toast) -> ToastId {
        let id = toast.id;
        self.shown.lock().push(toast);
        id
    }

    fn dismiss(&self, id: ToastId) {
        self.dismissed.lock().push(id);
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, path: &str) {
        self.paths.lock().push(path.to_string());
    }
}

/// A store whose every operation fails.
pub struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }
}

//! Session timeout coordinator.
//!
//! Runs two periodic checks while started:
//! - Expiry check (every `check_interval`): renews the session when it is
//!   within `renewal_threshold` of expiry, warns once when it is within
//!   `warning_time`, and logs the user out once it has expired
//! - Idle check (every `idle_check_interval`): logs the user out after
//!   `max_idle_time` without activity
//!
//! A third task follows renewals and keeps the [`RenewalScheduler`] armed
//! for the current expiry.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    as_minutes, ActivityEvent, ActivityState, AuthContext, Clock, LogoutReason, RenewalGuard,
    RenewalScheduler, Session, SystemClock, TimeoutSettings,
};
use crate::metrics::{record_forced_logout, record_warning_shown};
use crate::notify::{Navigator, Notifier, Toast, ToastId};
use crate::storage::{KeyValueStore, SessionMirror};

/// Minimum spacing between mirrored last-activity writes
const ACTIVITY_SAVE_INTERVAL_MS: i64 = 1_000;

/// Result of one expiry check
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// No session to check
    NoSession,
    Checked {
        minutes_until_expiry: f64,
        renewed: bool,
        warned: bool,
    },
    LoggedOut(LogoutReason),
}

/// Result of one idle check
#[derive(Debug, Clone, PartialEq)]
pub enum IdleOutcome {
    NoSession,
    Active { idle_for: Duration },
    LoggedOut(LogoutReason),
}

struct Tracker {
    settings: TimeoutSettings,
    auth: Arc<dyn AuthContext>,
    guard: Arc<RenewalGuard>,
    scheduler: RenewalScheduler,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    mirror: SessionMirror,
    clock: Arc<dyn Clock>,
    activity: Mutex<ActivityState>,
    /// When last activity was last written to the mirror
    activity_saved_at: Mutex<Option<DateTime<Utc>>>,
    warning_toast: Mutex<Option<ToastId>>,
    /// Set once a forced logout begins; cleared by `start`
    logged_out: AtomicBool,
}

pub struct SessionTimeout {
    tracker: Arc<Tracker>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Builder for [`SessionTimeout`].
pub struct SessionTimeoutBuilder {
    settings: TimeoutSettings,
    auth: Arc<dyn AuthContext>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    guard: Option<Arc<RenewalGuard>>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
}

impl SessionTimeoutBuilder {
    /// Share a renewal guard with other renewal triggers
    pub fn with_guard(mut self, guard: Arc<RenewalGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Mirror activity state into the given store
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> SessionTimeout {
        let guard = self
            .guard
            .unwrap_or_else(|| Arc::new(RenewalGuard::new(Arc::clone(&self.auth))));
        let scheduler = RenewalScheduler::new(
            Arc::clone(&guard),
            Arc::clone(&self.clock),
            self.settings.renewal_lead,
        );
        let mirror = match self.store {
            Some(store) => SessionMirror::new(store),
            None => SessionMirror::disabled(),
        };
        let activity = ActivityState::new(self.clock.now());

        SessionTimeout {
            tracker: Arc::new(Tracker {
                settings: self.settings,
                auth: self.auth,
                guard,
                scheduler,
                notifier: self.notifier,
                navigator: self.navigator,
                mirror,
                clock: self.clock,
                activity: Mutex::new(activity),
                activity_saved_at: Mutex::new(None),
                warning_toast: Mutex::new(None),
                logged_out: AtomicBool::new(false),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }
}

impl SessionTimeout {
    pub fn builder(
        settings: TimeoutSettings,
        auth: Arc<dyn AuthContext>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> SessionTimeoutBuilder {
        SessionTimeoutBuilder {
            settings,
            auth,
            notifier,
            navigator,
            guard: None,
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Start the periodic checks and the renewal timer, replacing any
    /// tasks from a previous start. Must be called from within a tokio runtime.
    pub fn start(&self) {
        self.stop();

        let tracker = &self.tracker;
        tracker.logged_out.store(false, Ordering::SeqCst);
        tracker.restore_activity();

        info!(
            check_interval_secs = tracker.settings.check_interval.as_secs(),
            idle_check_interval_secs = tracker.settings.idle_check_interval.as_secs(),
            warning_minutes = as_minutes(tracker.settings.warning_time),
            renewal_threshold_minutes = as_minutes(tracker.settings.renewal_threshold),
            max_idle_minutes = as_minutes(tracker.settings.max_idle_time),
            "Starting session timeout tracking"
        );

        let expiry_task = {
            let tracker = Arc::clone(tracker);
            tokio::spawn(async move {
                let mut tick = interval(tracker.settings.check_interval);
                tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tick.tick().await;
                    tracker.check_session().await;
                }
            })
        };

        let idle_task = {
            let tracker = Arc::clone(tracker);
            tokio::spawn(async move {
                let mut tick = interval(tracker.settings.idle_check_interval);
                tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tick.tick().await;
                    tracker.check_idle().await;
                }
            })
        };

        let renewal_task = {
            let tracker = Arc::clone(tracker);
            tokio::spawn(async move {
                let mut renewed = tracker.guard.subscribe();
                if let Some(session) = tracker.auth.current_session() {
                    tracker.scheduler.schedule(session.exp);
                }
                // The scheduler ignores an expiry it is already armed for
                while renewed.changed().await.is_ok() {
                    let exp = renewed.borrow_and_update().as_ref().map(|s| s.exp);
                    if let Some(exp) = exp {
                        tracker.scheduler.schedule(exp);
                    }
                }
            })
        };

        self.tasks
            .lock()
            .extend([expiry_task, idle_task, renewal_task]);
    }

    /// Stop all tasks and cancel the renewal timer.
    pub fn stop(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        if !tasks.is_empty() {
            debug!("Stopping session timeout tracking");
        }
        for task in tasks {
            task.abort();
        }
        self.tracker.scheduler.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.tasks.lock().iter().any(|task| !task.is_finished())
    }

    /// Record user activity now.
    pub fn record_activity(&self) {
        self.tracker.record_activity();
    }

    pub fn handle_event(&self, event: ActivityEvent) {
        debug!(event = %event, "User activity");
        self.tracker.record_activity();
    }

    /// Run an expiry check immediately.
    pub async fn check_session(&self) -> CheckOutcome {
        self.tracker.check_session().await
    }

    /// Run an idle check immediately.
    pub async fn check_idle(&self) -> IdleOutcome {
        self.tracker.check_idle().await
    }

    /// Renew on the user's request (the warning toast's action).
    pub async fn extend_session(&self) -> Option<Session> {
        self.tracker.extend_session().await
    }

    /// Minutes until the current session expires, if there is one.
    pub fn minutes_until_expiry(&self) -> Option<f64> {
        let session = self.tracker.auth.current_session()?;
        Some(session.minutes_until_expiry(self.tracker.clock.now()))
    }

    pub fn is_session_active(&self) -> bool {
        !self.tracker.logged_out.load(Ordering::SeqCst)
            && self.minutes_until_expiry().is_some_and(|m| m > 0.0)
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.tracker.activity.lock().last_activity()
    }

    pub fn idle_for(&self) -> Duration {
        self.tracker.activity.lock().idle_for(self.tracker.clock.now())
    }

    pub fn warning_shown(&self) -> bool {
        self.tracker.activity.lock().warning_shown()
    }

    pub fn renewal_guard(&self) -> Arc<RenewalGuard> {
        Arc::clone(&self.tracker.guard)
    }

    pub fn is_renewal_scheduled(&self) -> bool {
        self.tracker.scheduler.is_scheduled()
    }
}

impl Drop for SessionTimeout {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Tracker {
    fn warning_minutes(&self) -> f64 {
        as_minutes(self.settings.warning_time)
    }

    fn renewal_minutes(&self) -> f64 {
        as_minutes(self.settings.renewal_threshold)
    }

    /// Pick up activity state mirrored by a previous run. A stored timestamp
    /// older than the idle limit is treated as a fresh start.
    fn restore_activity(&self) {
        let now = self.clock.now();
        let stored = self.mirror.last_activity().filter(|at| {
            let idle = (now - *at).to_std().unwrap_or(Duration::ZERO);
            *at <= now && idle < self.settings.max_idle_time
        });

        let mut activity = self.activity.lock();
        match stored {
            Some(at) => {
                debug!(last_activity = %at, "Restored last activity from storage");
                *activity = ActivityState::new(at);
                if self.mirror.warning_shown() {
                    activity.mark_warning_shown();
                }
            }
            None => *activity = ActivityState::new(now),
        }
        let last = activity.last_activity();
        drop(activity);
        self.save_activity(last, true);
    }

    /// Mirror the last activity time, at most once per
    /// `ACTIVITY_SAVE_INTERVAL_MS` unless forced.
    fn save_activity(&self, at: DateTime<Utc>, force: bool) {
        {
            let mut saved_at = self.activity_saved_at.lock();
            let recent = saved_at
                .is_some_and(|last| (at - last).num_milliseconds() < ACTIVITY_SAVE_INTERVAL_MS);
            if recent && !force {
                return;
            }
            *saved_at = Some(at);
        }
        self.mirror.save_last_activity(at);
    }

    fn record_activity(&self) {
        let now = self.clock.now();
        let had_warning = {
            let mut activity = self.activity.lock();
            let had_warning = activity.warning_shown();
            activity.record(now);
            had_warning
        };

        self.save_activity(now, false);
        if had_warning {
            self.mirror.save_warning_shown(false);
        }
    }

    async fn check_session(&self) -> CheckOutcome {
        if self.logged_out.load(Ordering::SeqCst) {
            return CheckOutcome::NoSession;
        }
        let Some(session) = self.auth.current_session() else {
            return CheckOutcome::NoSession;
        };

        let mut minutes = session.minutes_until_expiry(self.clock.now());
        debug!(minutes_until_expiry = minutes, "Checking session expiry");

        if minutes <= 0.0 {
            self.force_logout(LogoutReason::SessionExpired).await;
            return CheckOutcome::LoggedOut(LogoutReason::SessionExpired);
        }

        let mut renewed = false;
        if minutes <= self.renewal_minutes() {
            match self.guard.renew().await {
                Ok(session) => {
                    renewed = true;
                    minutes = session.minutes_until_expiry(self.clock.now());
                    if minutes > self.warning_minutes() {
                        self.clear_warning();
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Could not renew expiring session");
                    self.force_logout(LogoutReason::RenewalFailed).await;
                    return CheckOutcome::LoggedOut(LogoutReason::RenewalFailed);
                }
            }
        }

        let warned =
            minutes > 0.0 && minutes <= self.warning_minutes() && self.raise_warning(minutes);

        CheckOutcome::Checked {
            minutes_until_expiry: minutes,
            renewed,
            warned,
        }
    }

    async fn check_idle(&self) -> IdleOutcome {
        if self.logged_out.load(Ordering::SeqCst) {
            return IdleOutcome::NoSession;
        }
        let Some(session) = self.auth.current_session() else {
            return IdleOutcome::NoSession;
        };

        let now = self.clock.now();
        // Expiry takes precedence over idleness
        if session.minutes_until_expiry(now) <= 0.0 {
            self.force_logout(LogoutReason::SessionExpired).await;
            return IdleOutcome::LoggedOut(LogoutReason::SessionExpired);
        }

        let idle_for = self.activity.lock().idle_for(now);
        if idle_for >= self.settings.max_idle_time {
            info!(
                idle_minutes = as_minutes(idle_for),
                max_idle_minutes = as_minutes(self.settings.max_idle_time),
                "User idle for too long"
            );
            self.force_logout(LogoutReason::IdleTimeout).await;
            return IdleOutcome::LoggedOut(LogoutReason::IdleTimeout);
        }

        IdleOutcome::Active { idle_for }
    }

    async fn extend_session(&self) -> Option<Session> {
        if self.logged_out.load(Ordering::SeqCst) {
            return None;
        }

        match self.guard.renew().await {
            Ok(session) => {
                self.clear_warning();
                self.record_activity();
                self.notifier.show(Toast::success(
                    "Session Extended",
                    "Your session has been extended.",
                ));
                Some(session)
            }
            Err(e) => {
                warn!(error = %e, "Could not extend session");
                self.force_logout(LogoutReason::RenewalFailed).await;
                None
            }
        }
    }

    /// Returns true if a warning was shown by this call.
    fn raise_warning(&self, minutes: f64) -> bool {
        if !self.activity.lock().mark_warning_shown() {
            return false;
        }
        self.mirror.save_warning_shown(true);

        info!(minutes_until_expiry = minutes, "Session expiring soon");
        record_warning_shown();
        let id = self.notifier.show(Toast::expiry_warning(minutes));
        *self.warning_toast.lock() = Some(id);
        true
    }

    fn clear_warning(&self) {
        let was_shown = {
            let mut activity = self.activity.lock();
            let was_shown = activity.warning_shown();
            activity.clear_warning();
            was_shown
        };
        if was_shown {
            self.mirror.save_warning_shown(false);
        }
        if let Some(id) = self.warning_toast.lock().take() {
            self.notifier.dismiss(id);
        }
    }

    async fn force_logout(&self, reason: LogoutReason) {
        if self.logged_out.swap(true, Ordering::SeqCst) {
            return;
        }

        warn!(reason = %reason, "Ending session");
        record_forced_logout(reason);
        self.scheduler.cancel();

        self.auth.logout().await;

        if let Some(id) = self.warning_toast.lock().take() {
            self.notifier.dismiss(id);
        }
        self.activity.lock().clear_warning();
        self.mirror.clear();
        self.activity_saved_at.lock().take();

        self.notifier.show(Toast::forced_logout(reason));
        self.navigator
            .push(&reason.login_redirect(&self.settings.login_path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::{
        epoch, BrokenStore, ManualClock, MockAuth, RecordingNavigator, RecordingNotifier,
        RefreshBehavior, TokioClock,
    };

    struct Harness {
        auth: Arc<MockAuth>,
        notifier: Arc<RecordingNotifier>,
        navigator: Arc<RecordingNavigator>,
        clock: Arc<ManualClock>,
        timeout: SessionTimeout,
    }

    fn minutes_from_now(minutes: i64) -> i64 {
        epoch().timestamp() + minutes * 60
    }

    fn harness_with(settings: TimeoutSettings, auth: MockAuth) -> Harness {
        let auth = Arc::new(auth);
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let clock = Arc::new(ManualClock::new(epoch()));
        let timeout = SessionTimeout::builder(
            settings,
            auth.clone(),
            notifier.clone(),
            navigator.clone(),
        )
        .with_clock(clock.clone())
        .build();

        Harness {
            auth,
            notifier,
            navigator,
            clock,
            timeout,
        }
    }

    fn harness(exp_minutes: i64, behavior: RefreshBehavior) -> Harness {
        harness_with(
            TimeoutSettings::default(),
            MockAuth::expiring_at(minutes_from_now(exp_minutes), behavior),
        )
    }

    #[tokio::test]
    async fn test_renews_without_warning_outside_warning_window() {
        let h = harness(9, RefreshBehavior::Keep);

        let outcome = h.timeout.check_session().await;

        assert_eq!(
            outcome,
            CheckOutcome::Checked {
                minutes_until_expiry: 9.0,
                renewed: true,
                warned: false,
            }
        );
        assert_eq!(h.auth.refresh_calls(), 1);
        assert!(h.notifier.toasts().is_empty());
        assert!(h.navigator.paths().is_empty());
    }

    #[tokio::test]
    async fn test_successful_renewal_moves_session_out_of_warning_window() {
        let h = harness(4, RefreshBehavior::Extend(minutes_from_now(60)));

        let outcome = h.timeout.check_session().await;

        assert_eq!(
            outcome,
            CheckOutcome::Checked {
                minutes_until_expiry: 60.0,
                renewed: true,
                warned: false,
            }
        );
        assert!(h.notifier.toasts().is_empty());
        assert!(h.timeout.is_session_active());
    }

    #[tokio::test]
    async fn test_warns_after_renewal_when_still_expiring() {
        let h = harness(4, RefreshBehavior::Keep);

        let outcome = h.timeout.check_session().await;

        assert!(matches!(
            outcome,
            CheckOutcome::Checked {
                renewed: true,
                warned: true,
                ..
            }
        ));
        assert_eq!(h.auth.refresh_calls(), 1);

        let toasts = h.notifier.toasts();
        assert_eq!(toasts.len(), 1);
        assert!(toasts[0].message.contains("4 minutes"));
        assert!(toasts[0].is_persistent());
        assert_eq!(toasts[0].action, Some(crate::notify::ToastAction::ExtendSession));
    }

    #[tokio::test]
    async fn test_warns_without_renewal_below_threshold() {
        let settings = TimeoutSettings {
            renewal_threshold: Duration::from_secs(2 * 60),
            ..TimeoutSettings::default()
        };
        let h = harness_with(
            settings,
            MockAuth::expiring_at(minutes_from_now(4), RefreshBehavior::Keep),
        );

        let outcome = h.timeout.check_session().await;

        assert_eq!(
            outcome,
            CheckOutcome::Checked {
                minutes_until_expiry: 4.0,
                renewed: false,
                warned: true,
            }
        );
        assert_eq!(h.auth.refresh_calls(), 0);
        assert!(h.timeout.warning_shown());
    }

    #[tokio::test]
    async fn test_warning_not_repeated_until_activity() {
        let h = harness(4, RefreshBehavior::Keep);

        h.timeout.check_session().await;
        h.clock.advance(chrono::Duration::seconds(30));
        let second = h.timeout.check_session().await;
        assert!(matches!(second, CheckOutcome::Checked { warned: false, .. }));
        assert_eq!(h.notifier.toasts().len(), 1);

        h.timeout.handle_event(ActivityEvent::Click);
        assert!(!h.timeout.warning_shown());

        let third = h.timeout.check_session().await;
        assert!(matches!(third, CheckOutcome::Checked { warned: true, .. }));
        assert_eq!(h.notifier.toasts().len(), 2);
    }

    #[tokio::test]
    async fn test_every_activity_event_resets_idle_and_warning() {
        for event in ActivityEvent::ALL {
            let h = harness(4, RefreshBehavior::Keep);
            h.timeout.check_session().await;
            h.clock.advance(chrono::Duration::minutes(3));
            assert!(h.timeout.warning_shown());
            assert_eq!(h.timeout.idle_for(), Duration::from_secs(3 * 60));

            h.timeout.handle_event(event);

            assert_eq!(h.timeout.idle_for(), Duration::ZERO, "{event} did not reset idle");
            assert!(!h.timeout.warning_shown(), "{event} did not clear warning");
        }
    }

    #[tokio::test]
    async fn test_idle_timeout_logs_out_before_expiry() {
        let h = harness(60, RefreshBehavior::Keep);
        h.clock.advance(chrono::Duration::minutes(31));

        let outcome = h.timeout.check_idle().await;

        assert_eq!(outcome, IdleOutcome::LoggedOut(LogoutReason::IdleTimeout));
        assert_eq!(h.auth.logout_calls(), 1);
        assert_eq!(h.navigator.paths(), vec!["/login?error=idle_timeout"]);
        assert_eq!(h.notifier.titles(), vec!["Signed Out Due to Inactivity"]);
        assert!(!h.timeout.is_session_active());
    }

    #[tokio::test]
    async fn test_idle_below_limit_keeps_session() {
        let h = harness(60, RefreshBehavior::Keep);
        h.clock.advance(chrono::Duration::minutes(29));

        let outcome = h.timeout.check_idle().await;

        assert_eq!(
            outcome,
            IdleOutcome::Active {
                idle_for: Duration::from_secs(29 * 60)
            }
        );
        assert_eq!(h.auth.logout_calls(), 0);
    }

    #[tokio::test]
    async fn test_expiry_wins_over_idle() {
        let h = harness(1, RefreshBehavior::Keep);
        h.clock.advance(chrono::Duration::minutes(31));

        let outcome = h.timeout.check_idle().await;

        assert_eq!(outcome, IdleOutcome::LoggedOut(LogoutReason::SessionExpired));
        assert_eq!(h.navigator.paths(), vec!["/login?error=session_expired"]);
    }

    #[tokio::test]
    async fn test_expired_session_logs_out() {
        let h = harness(0, RefreshBehavior::Keep);

        let outcome = h.timeout.check_session().await;

        assert_eq!(outcome, CheckOutcome::LoggedOut(LogoutReason::SessionExpired));
        assert_eq!(h.auth.refresh_calls(), 0);
        assert_eq!(h.notifier.titles(), vec!["Session Expired"]);
        assert_eq!(h.navigator.paths(), vec!["/login?error=session_expired"]);
    }

    #[tokio::test]
    async fn test_failed_renewal_is_treated_as_expiry() {
        let h = harness(9, RefreshBehavior::Fail);

        let outcome = h.timeout.check_session().await;

        assert_eq!(outcome, CheckOutcome::LoggedOut(LogoutReason::RenewalFailed));
        assert_eq!(h.auth.refresh_calls(), 1);
        assert_eq!(h.auth.logout_calls(), 1);
        assert_eq!(h.navigator.paths(), vec!["/login?error=session_expired"]);
        assert_eq!(h.notifier.titles(), vec!["Session Expired"]);
    }

    #[tokio::test]
    async fn test_logout_happens_once() {
        let h = harness(60, RefreshBehavior::Keep);
        h.clock.advance(chrono::Duration::minutes(61));

        let (expiry, idle) = tokio::join!(h.timeout.check_session(), h.timeout.check_idle());

        assert_eq!(expiry, CheckOutcome::LoggedOut(LogoutReason::SessionExpired));
        assert_eq!(idle, IdleOutcome::NoSession);
        assert_eq!(h.auth.logout_calls(), 1);
        assert_eq!(h.navigator.paths().len(), 1);
        assert_eq!(h.timeout.check_session().await, CheckOutcome::NoSession);
    }

    #[tokio::test]
    async fn test_no_session_is_a_noop() {
        let h = harness_with(
            TimeoutSettings::default(),
            MockAuth::new(None, RefreshBehavior::Keep),
        );

        assert_eq!(h.timeout.check_session().await, CheckOutcome::NoSession);
        assert_eq!(h.timeout.check_idle().await, IdleOutcome::NoSession);
        assert_eq!(h.timeout.minutes_until_expiry(), None);
        assert!(!h.timeout.is_session_active());
    }

    #[tokio::test]
    async fn test_extend_session_dismisses_warning() {
        let settings = TimeoutSettings {
            renewal_threshold: Duration::from_secs(60),
            ..TimeoutSettings::default()
        };
        let h = harness_with(
            settings,
            MockAuth::expiring_at(
                minutes_from_now(4),
                RefreshBehavior::Extend(minutes_from_now(60)),
            ),
        );

        h.timeout.check_session().await;
        let warning_id = h.notifier.toasts()[0].id;

        let session = h.timeout.extend_session().await.unwrap();

        assert_eq!(session.exp, minutes_from_now(60));
        assert_eq!(h.notifier.dismissed(), vec![warning_id]);
        assert_eq!(h.notifier.titles().last().unwrap(), "Session Extended");
        assert!(!h.timeout.warning_shown());
        assert_eq!(h.timeout.minutes_until_expiry(), Some(60.0));
    }

    #[tokio::test]
    async fn test_extend_failure_logs_out() {
        let h = harness(4, RefreshBehavior::Fail);

        assert!(h.timeout.extend_session().await.is_none());
        assert_eq!(h.auth.logout_calls(), 1);
        assert_eq!(h.navigator.paths(), vec!["/login?error=session_expired"]);
    }

    #[tokio::test]
    async fn test_broken_storage_does_not_interrupt_tracking() {
        let auth = Arc::new(MockAuth::expiring_at(minutes_from_now(4), RefreshBehavior::Keep));
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(epoch()));
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            auth,
            notifier.clone(),
            Arc::new(RecordingNavigator::default()),
        )
        .with_store(Arc::new(BrokenStore))
        .with_clock(clock)
        .build();

        timeout.record_activity();
        let outcome = timeout.check_session().await;

        assert!(matches!(outcome, CheckOutcome::Checked { warned: true, .. }));
        assert_eq!(notifier.toasts().len(), 1);
    }

    #[tokio::test]
    async fn test_activity_mirrored_to_store() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(epoch()));
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            Arc::new(MockAuth::expiring_at(minutes_from_now(60), RefreshBehavior::Keep)),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingNavigator::default()),
        )
        .with_store(store.clone())
        .with_clock(clock.clone())
        .build();

        clock.advance(chrono::Duration::minutes(2));
        timeout.record_activity();

        let mirror = SessionMirror::new(store);
        assert_eq!(
            mirror.last_activity(),
            Some(epoch() + chrono::Duration::minutes(2))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_restores_recent_activity() {
        let store = Arc::new(MemoryStore::new());
        let mirror = SessionMirror::new(store.clone());
        let clock = Arc::new(ManualClock::new(epoch()));
        mirror.save_last_activity(epoch() - chrono::Duration::minutes(10));

        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            Arc::new(MockAuth::expiring_at(minutes_from_now(60), RefreshBehavior::Keep)),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingNavigator::default()),
        )
        .with_store(store)
        .with_clock(clock)
        .build();

        timeout.start();
        assert_eq!(timeout.idle_for(), Duration::from_secs(10 * 60));
        timeout.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_stored_activity_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        SessionMirror::new(store.clone()).save_last_activity(epoch() - chrono::Duration::hours(5));
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            Arc::new(MockAuth::expiring_at(minutes_from_now(60), RefreshBehavior::Keep)),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingNavigator::default()),
        )
        .with_store(store)
        .with_clock(Arc::new(ManualClock::new(epoch())))
        .build();

        timeout.start();
        assert_eq!(timeout.idle_for(), Duration::ZERO);
        timeout.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_idle_check_logs_out() {
        let auth = Arc::new(MockAuth::expiring_at(minutes_from_now(60), RefreshBehavior::Keep));
        let navigator = Arc::new(RecordingNavigator::default());
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            auth.clone(),
            Arc::new(RecordingNotifier::default()),
            navigator.clone(),
        )
        .with_clock(Arc::new(TokioClock::new()))
        .build();

        timeout.start();
        assert!(timeout.is_running());
        assert!(timeout.is_session_active());

        tokio::time::sleep(Duration::from_secs(29 * 60)).await;
        assert_eq!(auth.logout_calls(), 0);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(auth.logout_calls(), 1);
        assert_eq!(navigator.paths(), vec!["/login?error=idle_timeout"]);

        timeout.stop();
        assert!(!timeout.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_renewal_rearms_for_new_expiry() {
        let exp = epoch().timestamp() + 15 * 60 + 30;
        let auth = Arc::new(MockAuth::expiring_at(
            exp,
            RefreshBehavior::Extend(minutes_from_now(75)),
        ));
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            auth.clone(),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingNavigator::default()),
        )
        .with_clock(Arc::new(TokioClock::new()))
        .build();

        timeout.start();
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert_eq!(auth.refresh_calls(), 0);
        assert!(timeout.is_renewal_scheduled());

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(auth.refresh_calls(), 1);
        assert!(timeout.is_renewal_scheduled());

        timeout.stop();
        assert!(!timeout.is_renewal_scheduled());
    }

    #[tokio::test]
    async fn test_activity_writes_are_throttled() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(epoch()));
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            Arc::new(MockAuth::expiring_at(minutes_from_now(60), RefreshBehavior::Keep)),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingNavigator::default()),
        )
        .with_store(store.clone())
        .with_clock(clock.clone())
        .build();
        let mirror = SessionMirror::new(store);

        timeout.record_activity();
        assert_eq!(mirror.last_activity(), Some(epoch()));

        clock.advance(chrono::Duration::milliseconds(500));
        timeout.record_activity();
        assert_eq!(mirror.last_activity(), Some(epoch()));
        assert_eq!(
            timeout.last_activity(),
            epoch() + chrono::Duration::milliseconds(500)
        );

        clock.advance(chrono::Duration::milliseconds(600));
        timeout.record_activity();
        assert_eq!(
            mirror.last_activity(),
            Some(epoch() + chrono::Duration::milliseconds(1_100))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_expiry_renews_once_per_check() {
        let auth = Arc::new(MockAuth::expiring_at(minutes_from_now(9), RefreshBehavior::Keep));
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            auth.clone(),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingNavigator::default()),
        )
        .with_clock(Arc::new(TokioClock::new()))
        .build();

        timeout.start();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(auth.refresh_calls(), 1);
        assert!(!timeout.is_renewal_scheduled());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(auth.refresh_calls(), 2);

        timeout.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_renewal_with_unchanged_expiry_fires_once() {
        let exp = epoch().timestamp() + 15 * 60 + 30;
        let auth = Arc::new(MockAuth::expiring_at(exp, RefreshBehavior::Keep));
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            auth.clone(),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingNavigator::default()),
        )
        .with_clock(Arc::new(TokioClock::new()))
        .build();

        timeout.start();
        tokio::time::sleep(Duration::from_secs(5 * 60 + 45)).await;
        assert_eq!(auth.refresh_calls(), 1);
        assert!(!timeout.is_renewal_scheduled());

        // next expiry check is inside the renewal threshold
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(auth.refresh_calls(), 2);
        assert!(!timeout.is_renewal_scheduled());

        timeout.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scheduled_renewal_logs_out_on_next_check() {
        let exp = epoch().timestamp() + 15 * 60 + 30;
        let auth = Arc::new(MockAuth::expiring_at(exp, RefreshBehavior::Fail));
        let navigator = Arc::new(RecordingNavigator::default());
        let timeout = SessionTimeout::builder(
            TimeoutSettings::default(),
            auth.clone(),
            Arc::new(RecordingNotifier::default()),
            navigator.clone(),
        )
        .with_clock(Arc::new(TokioClock::new()))
        .build();

        timeout.start();
        tokio::time::sleep(Duration::from_secs(5 * 60 + 45)).await;
        assert_eq!(auth.refresh_calls(), 1);
        assert_eq!(auth.logout_calls(), 0);
        assert!(timeout.is_session_active());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(auth.refresh_calls(), 2);
        assert_eq!(auth.logout_calls(), 1);
        assert_eq!(navigator.paths(), vec!["/login?error=session_expired"]);

        timeout.stop();
    }
}

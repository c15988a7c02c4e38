//! Proactive renewal timer.
//!
//! Rather than waiting for the next expiry check, a single one-shot timer
//! is armed to renew the session shortly before it expires.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Clock, RenewalGuard};

pub struct RenewalScheduler {
    guard: Arc<RenewalGuard>,
    clock: Arc<dyn Clock>,
    /// How long before expiry the timer fires
    lead: Duration,
    timer: Mutex<Option<ArmedTimer>>,
}

struct ArmedTimer {
    exp: i64,
    handle: JoinHandle<()>,
}

impl RenewalScheduler {
    pub fn new(guard: Arc<RenewalGuard>, clock: Arc<dyn Clock>, lead: Duration) -> Self {
        Self {
            guard,
            clock,
            lead,
            timer: Mutex::new(None),
        }
    }

    /// Delay from now until the renewal for a session expiring at `exp` is due.
    pub fn delay_until_renewal(&self, exp: i64) -> Duration {
        let lead_ms = i64::try_from(self.lead.as_millis()).unwrap_or(i64::MAX);
        let fire_at_ms = exp.saturating_mul(1000).saturating_sub(lead_ms);
        let remaining_ms = fire_at_ms.saturating_sub(self.clock.now().timestamp_millis());
        Duration::from_millis(remaining_ms.max(0) as u64)
    }

    /// Arm the timer for a session expiring at `exp`, replacing any
    /// previously armed timer. Must be called from within a tokio runtime.
    ///
    /// Returns false without touching the timer when `exp` is the expiry
    /// the timer was last armed for, or when the renewal is already due.
    /// A due renewal is left to the periodic expiry check, which renews at
    /// most once per check.
    pub fn schedule(&self, exp: i64) -> bool {
        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|armed| armed.exp == exp) {
            debug!(exp, "Renewal already scheduled for this expiry");
            return false;
        }
        if let Some(previous) = timer.take() {
            previous.handle.abort();
        }

        let delay = self.delay_until_renewal(exp);
        if delay.is_zero() {
            debug!(exp, "Renewal already due, leaving it to the expiry check");
            return false;
        }

        debug!(exp, delay_secs = delay.as_secs(), "Scheduling session renewal");
        let guard = Arc::clone(&self.guard);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match guard.renew().await {
                Ok(session) => info!(exp = session.exp, "Scheduled session renewal succeeded"),
                Err(e) => warn!(error = %e, "Scheduled session renewal failed"),
            }
        });
        *timer = Some(ArmedTimer { exp, handle });
        true
    }

    pub fn cancel(&self) {
        if let Some(armed) = self.timer.lock().take() {
            armed.handle.abort();
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|armed| !armed.handle.is_finished())
    }
}

impl Drop for RenewalScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

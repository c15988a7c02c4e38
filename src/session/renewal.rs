//! Renewal de-duplication.
//!
//! Several triggers may ask for a renewal at nearly the same moment: the
//! scheduled timer, the periodic expiry check, and the user's "extend
//! session" action. The guard keeps at most one refresh in flight; callers
//! arriving while it runs await the same result.
//!
//! The refresh runs as its own task, so a caller that is cancelled while
//! waiting (a stopped timer, say) does not leave the attempt unfinished.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{AuthContext, Session};
use crate::error::RenewalError;
use crate::metrics::record_renewal;

type RenewalFuture = Shared<BoxFuture<'static, Result<Session, RenewalError>>>;

pub struct RenewalGuard {
    auth: Arc<dyn AuthContext>,
    in_flight: Arc<Mutex<Option<RenewalFuture>>>,
    renewed: Arc<watch::Sender<Option<Session>>>,
}

impl RenewalGuard {
    pub fn new(auth: Arc<dyn AuthContext>) -> Self {
        let (renewed, _) = watch::channel(None);
        Self {
            auth,
            in_flight: Arc::new(Mutex::new(None)),
            renewed: Arc::new(renewed),
        }
    }

    /// Whether a refresh is currently outstanding
    pub fn is_renewing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Receives every session produced by a successful renewal
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.renewed.subscribe()
    }

    /// Renew the session, joining the in-flight attempt if there is one.
    pub async fn renew(&self) -> Result<Session, RenewalError> {
        let attempt = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight session renewal");
                    pending.clone()
                }
                None => {
                    let attempt = self.start_attempt();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    fn start_attempt(&self) -> RenewalFuture {
        let auth = Arc::clone(&self.auth);
        let in_flight = Arc::clone(&self.in_flight);
        let renewed = Arc::clone(&self.renewed);

        let task = tokio::spawn(async move {
            debug!("Refreshing session token");
            let result = auth.refresh_token().await.map_err(RenewalError::from);

            // Cleared before any waiter resumes, so the next request starts fresh
            in_flight.lock().take();

            match &result {
                Ok(session) => {
                    info!(exp = session.exp, "Session renewed");
                    record_renewal(true);
                    renewed.send_replace(Some(session.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "Session renewal failed");
                    record_renewal(false);
                }
            }
            result
        });

        async move { task.await.unwrap_or_else(|e| Err(RenewalError::from(e))) }
            .boxed()
            .shared()
    }
}

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use session::{
    ActivityEvent, AuthContext, CheckOutcome, IdleOutcome, LogoutReason, RenewalGuard,
    RenewalScheduler, Session, SessionTimeout, TimeoutSettings,
};

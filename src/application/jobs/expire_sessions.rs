//! Periodic eviction of expired login sessions.

use std::sync::Arc;
use std::time::Duration;

use crate::application::sessions::SessionStore;

use super::PeriodicJob;

/// Sweep expired sessions once.
pub fn expire_sessions(sessions: &SessionStore, ttl: Duration) -> usize {
    let expired = sessions.sweep(ttl);
    if expired > 0 {
        tracing::info!(expired_count = expired, "Expired sessions");
    }
    expired
}

pub fn spawn_session_sweep(
    sessions: Arc<SessionStore>,
    period: Duration,
    ttl: Duration,
) -> PeriodicJob {
    PeriodicJob::spawn("expire-sessions", period, move || {
        let sessions = sessions.clone();
        async move {
            expire_sessions(&sessions, ttl);
        }
    })
}

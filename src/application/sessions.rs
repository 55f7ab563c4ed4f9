//! In-memory login sessions.
//!
//! Tokens map to their creation time. Nothing is persisted: a restart logs
//! everyone out. Expired entries are removed only by [`SessionStore::sweep`],
//! which a background job runs on its own interval.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use metrics::{counter, gauge};
use thiserror::Error;
use time::OffsetDateTime;

use crate::cache::lock::mutex_lock;

use super::auth::{AuthError, EntropySource, keyed_hash, os_entropy};

const SOURCE: &str = "application::sessions";
const TOKEN_ENTROPY_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("secure random source unavailable")]
    CryptoUnavailable(#[source] rand::Error),
    #[error("session token derivation failed")]
    Token(#[from] AuthError),
}

/// Why a request carries no valid session. Every variant means "not logged in".
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    #[error("session cookie missing")]
    MissingCookie,
    #[error("session cookie is empty")]
    EmptyToken,
    #[error("session unknown or expired")]
    UnknownToken,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, OffsetDateTime>>,
    entropy: EntropySource,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_entropy(os_entropy)
    }

    pub fn with_entropy(entropy: EntropySource) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            entropy,
        }
    }

    /// Open a session and return its token.
    ///
    /// The token is a keyed hash over `seed` and fresh random bytes.
    pub fn create(&self, seed: &str) -> Result<String, SessionError> {
        let mut nonce = [0u8; TOKEN_ENTROPY_BYTES];
        (self.entropy)(&mut nonce).map_err(SessionError::CryptoUnavailable)?;

        let token = keyed_hash(seed.as_bytes(), &[&nonce])?;
        self.insert_at(token.clone(), OffsetDateTime::now_utc());
        counter!("microblog_sessions_created_total").increment(1);
        Ok(token)
    }

    pub(crate) fn insert_at(&self, token: String, created: OffsetDateTime) {
        let mut sessions = mutex_lock(&self.sessions, SOURCE, "insert");
        sessions.insert(token, created);
        gauge!("microblog_sessions_active").set(sessions.len() as f64);
    }

    pub fn exists(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        mutex_lock(&self.sessions, SOURCE, "exists").contains_key(token)
    }

    /// Validate the token carried by a request, if any.
    pub fn check(&self, token: Option<&str>) -> Result<(), SessionRejection> {
        match token {
            None => Err(SessionRejection::MissingCookie),
            Some("") => Err(SessionRejection::EmptyToken),
            Some(token) if self.exists(token) => Ok(()),
            Some(_) => Err(SessionRejection::UnknownToken),
        }
    }

    /// Remove a session. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        let mut sessions = mutex_lock(&self.sessions, SOURCE, "revoke");
        let removed = sessions.remove(token).is_some();
        gauge!("microblog_sessions_active").set(sessions.len() as f64);
        removed
    }

    /// Evict every session older than `ttl`. Returns the number removed.
    ///
    /// The cutoff is fixed before the scan, so sessions created after the
    /// sweep started are never evicted by it.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let now = OffsetDateTime::now_utc();

        let mut sessions = mutex_lock(&self.sessions, SOURCE, "sweep");
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, created)| now - **created > ttl)
            .map(|(token, _)| token.clone())
            .collect();
        for token in &expired {
            sessions.remove(token);
        }
        gauge!("microblog_sessions_active").set(sessions.len() as f64);
        drop(sessions);

        counter!("microblog_sessions_expired_total").increment(expired.len() as u64);
        expired.len()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.sessions, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TTL: Duration = Duration::from_secs(3600);
    const KNOWN: &str = "b0e292b2e7822a4cde578f5b10456dab1420820eb74f62e230e30b03f9fd6db1";

    fn no_entropy(_buffer: &mut [u8]) -> Result<(), rand::Error> {
        Err(rand::Error::new(std::io::Error::other("entropy exhausted")))
    }

    #[test]
    fn created_sessions_exist() {
        let store = SessionStore::new();
        let token = store.create("seed").expect("token");
        assert_eq!(token.len(), 64);
        assert!(store.exists(&token));
        assert_eq!(store.check(Some(&token)), Ok(()));
    }

    #[test]
    fn tokens_are_unique() {
        let store = SessionStore::new();
        let a = store.create("seed").expect("token");
        let b = store.create("seed").expect("token");
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn absent_empty_and_unknown_tokens_are_rejected() {
        let store = SessionStore::new();
        store.insert_at(KNOWN.to_string(), OffsetDateTime::now_utc());

        assert_eq!(store.check(None), Err(SessionRejection::MissingCookie));
        assert_eq!(store.check(Some("")), Err(SessionRejection::EmptyToken));
        assert_eq!(store.check(Some("test")), Err(SessionRejection::UnknownToken));
        assert_eq!(
            store.check(Some(&KNOWN.replace('b', "c"))),
            Err(SessionRejection::UnknownToken)
        );
        assert!(!store.exists(""));
        assert_eq!(store.check(Some(KNOWN)), Ok(()));
    }

    #[test]
    fn sweep_evicts_expired_sessions() {
        let store = SessionStore::new();
        let expired = OffsetDateTime::now_utc() - (TTL + Duration::from_secs(1));
        store.insert_at(KNOWN.to_string(), expired);

        assert_eq!(store.sweep(TTL), 1);
        assert!(!store.exists(KNOWN));
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_keeps_fresh_sessions() {
        let store = SessionStore::new();
        let token = store.create("seed").expect("token");

        assert_eq!(store.sweep(TTL), 0);
        assert!(store.exists(&token));
    }

    #[test]
    fn sweep_spares_sessions_newer_than_its_cutoff() {
        let store = SessionStore::new();
        store.insert_at(
            "future".to_string(),
            OffsetDateTime::now_utc() + Duration::from_secs(5),
        );
        assert_eq!(store.sweep(Duration::ZERO), 0);
        assert!(store.exists("future"));
    }

    #[test]
    fn revoke_removes_the_session() {
        let store = SessionStore::new();
        let token = store.create("seed").expect("token");
        assert!(store.revoke(&token));
        assert!(!store.revoke(&token));
        assert!(!store.exists(&token));
    }

    #[test]
    fn entropy_failure_fails_only_the_login() {
        let store = SessionStore::with_entropy(no_entropy);
        let err = store.create("seed").expect_err("no entropy");
        assert!(matches!(err, SessionError::CryptoUnavailable(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_logins_and_sweeps() {
        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let token = store.create("seed").expect("token");
                        assert!(store.exists(&token));
                        store.sweep(TTL);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }
        assert_eq!(store.len(), 400);
    }
}

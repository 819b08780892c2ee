//! Resume state for paginated full scans.
//!
//! A token maps to the identity of the last tuple handed out. Tokens are
//! single use: presenting one removes it. Entries nobody comes back for are
//! evicted by a periodic sweep once their expiry passes; until then an
//! expired token still resumes its scan.

use crate::error::{DagError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub last_seen_id: i64,
    pub expires_at: DateTime<Utc>,
}

pub struct PageStateCache {
    states: RwLock<HashMap<String, PageState>>,
    ttl: chrono::Duration,
}

impl PageStateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52)),
        }
    }

    /// Store resume state under a fresh token that was not present before.
    pub fn issue(&self, last_seen_id: i64) -> String {
        self.issue_at(last_seen_id, Utc::now())
    }

    pub fn issue_at(&self, last_seen_id: i64, now: DateTime<Utc>) -> String {
        let mut states = self.states.write();
        let mut token = generate_token();
        while states.contains_key(&token) {
            token = generate_token();
        }
        states.insert(
            token.clone(),
            PageState {
                last_seen_id,
                expires_at: now
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        );
        token
    }

    /// Consume the state stored under `token`.
    ///
    /// Expiry is left to [`PageStateCache::sweep`]: an entry is served for as
    /// long as it is present.
    pub fn take(&self, token: &str) -> Result<PageState> {
        self.states
            .write()
            .remove(token)
            .ok_or(DagError::PageStateNotFound)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.states.read().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict expired entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut states = self.states.write();
        let before = states.len();
        states.retain(|_, state| state.expires_at > now);
        before - states.len()
    }

    /// Run [`PageStateCache::sweep`] every `interval` until the returned
    /// handle is shut down or dropped. Must be called inside a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> Result<SweeperHandle> {
        if interval.is_zero() {
            return Err(DagError::ConfigError(
                "page state sweep interval must be positive".into(),
            ));
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("Page state sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = cache.sweep();
                        if evicted > 0 {
                            debug!(evicted, "Evicted expired page states");
                        }
                    }
                }
            }
        });

        Ok(SweeperHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        })
    }
}

/// Owner of the background sweep task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_single_use() {
        let cache = PageStateCache::new(Duration::from_secs(300));
        let token = cache.issue(42);
        assert!(cache.contains(&token));

        assert_eq!(cache.take(&token).unwrap().last_seen_id, 42);
        assert!(matches!(cache.take(&token), Err(DagError::PageStateNotFound)));
        assert!(matches!(cache.take("unknown"), Err(DagError::PageStateNotFound)));
    }

    #[test]
    fn test_tokens_are_unique() {
        let cache = PageStateCache::new(Duration::from_secs(300));
        let tokens: std::collections::HashSet<String> = (0..100).map(|i| cache.issue(i)).collect();
        assert_eq!(tokens.len(), 100);
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_expired_state_resumes_until_swept() {
        let cache = PageStateCache::new(Duration::from_secs(300));
        let now = Utc::now();
        let stale = now - chrono::Duration::seconds(301);

        let unswept = cache.issue_at(7, stale);
        assert_eq!(cache.take(&unswept).unwrap().last_seen_id, 7);

        let swept = cache.issue_at(8, stale);
        assert_eq!(cache.sweep_at(now), 1);
        assert!(matches!(cache.take(&swept), Err(DagError::PageStateNotFound)));
    }

    #[test]
    fn test_huge_ttl_saturates_expiry() {
        let cache = PageStateCache::new(Duration::from_secs(1 << 45));
        let token = cache.issue(3);

        assert_eq!(cache.sweep(), 0);
        let state = cache.take(&token).unwrap();
        assert_eq!(state.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_sweep_evicts_only_expired() {
        let cache = PageStateCache::new(Duration::from_secs(300));
        let now = Utc::now();
        let old = cache.issue_at(1, now - chrono::Duration::minutes(10));
        let fresh = cache.issue_at(2, now);

        assert_eq!(cache.sweep_at(now), 1);
        assert!(!cache.contains(&old));
        assert!(cache.contains(&fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_until_shutdown() {
        let cache = Arc::new(PageStateCache::new(Duration::from_secs(300)));
        cache.issue_at(1, Utc::now() - chrono::Duration::minutes(10));

        let sweeper = cache.spawn_sweeper(Duration::from_secs(10)).unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty());

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_sweep_interval_is_rejected() {
        let cache = Arc::new(PageStateCache::new(Duration::from_secs(300)));
        let result = cache.spawn_sweeper(Duration::ZERO);
        assert!(matches!(result, Err(DagError::ConfigError(_))));
    }
}

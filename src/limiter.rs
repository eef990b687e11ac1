use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Sliding-window request limiter keyed by an arbitrary identity string
/// (client IP, user id). One instance per policy; no global state. Entries
/// older than the window are purged lazily on each check, and the total
/// number of tracked identities is capped, evicting the stalest buckets
/// first.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    buckets: Mutex<HashMap<String, VecDeque<Instant>>>,
}

const MAX_BUCKET_KEYS: usize = 4096;

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        RateLimiter {
            max_requests,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a request for `identity` at the current instant.
    /// Admission records the attempt; rejection records nothing.
    pub async fn admit(&self, identity: &str) -> bool {
        self.admit_at(identity, Instant::now()).await
    }

    /// Clock-injectable variant of [`admit`](Self::admit).
    pub async fn admit_at(&self, identity: &str, now: Instant) -> bool {
        let mut guard = self.buckets.lock().await;
        Self::prune_buckets(&mut guard, now, self.window, MAX_BUCKET_KEYS);
        if !guard.contains_key(identity) && guard.len() >= MAX_BUCKET_KEYS {
            return false;
        }
        let bucket = guard.entry(identity.to_string()).or_default();
        while let Some(ts) = bucket.front() {
            if now.duration_since(*ts) > self.window {
                let _ = bucket.pop_front();
            } else {
                break;
            }
        }
        if bucket.len() >= self.max_requests {
            return false;
        }
        bucket.push_back(now);
        true
    }

    fn prune_buckets(
        buckets: &mut HashMap<String, VecDeque<Instant>>,
        now: Instant,
        window: Duration,
        max_keys: usize,
    ) {
        buckets.retain(|_, bucket| {
            while let Some(ts) = bucket.front() {
                if now.duration_since(*ts) > window {
                    let _ = bucket.pop_front();
                } else {
                    break;
                }
            }
            !bucket.is_empty()
        });
        if buckets.len() <= max_keys {
            return;
        }
        let mut by_oldest = buckets
            .iter()
            .filter_map(|(k, bucket)| bucket.back().copied().map(|ts| (k.clone(), ts)))
            .collect::<Vec<_>>();
        by_oldest.sort_by_key(|(_, ts)| *ts);
        let remove_n = buckets.len().saturating_sub(max_keys);
        for (k, _) in by_oldest.into_iter().take(remove_n) {
            let _ = buckets.remove(&k);
        }
    }

    #[cfg(test)]
    async fn tracked_identities(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

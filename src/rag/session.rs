//! Session cache: one retrieval engine per (requester, knowledge base) key.
//!
//! The map lock is held only to claim or drop a slot. Building runs outside
//! it; concurrent callers for the same key are serialized by the slot's
//! `OnceCell`, so each attempt embeds every chunk at most once. A slot that
//! loses its map entry (invalidation or capacity eviction) may still finish
//! building, but finishes into an unreachable cell and is never published.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::core::errors::RagError;

use super::engine::RagEngine;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub requester_id: String,
    pub knowledge_base_id: String,
}

impl SessionKey {
    pub fn new(requester_id: impl Into<String>, knowledge_base_id: impl Into<String>) -> Self {
        Self {
            requester_id: requester_id.into(),
            knowledge_base_id: knowledge_base_id.into(),
        }
    }
}

/// Result slot of one build attempt. Set exactly once; both outcomes are
/// terminal until the key is invalidated.
type BuildSlot = Arc<OnceCell<Result<Arc<RagEngine>, RagError>>>;

/// Observable lifecycle of a session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Empty,
    Building,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct SessionCache {
    slots: Mutex<LruCache<SessionKey, BuildSlot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SessionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the cached engine for `key`, or runs `build` to produce one.
    /// Concurrent callers for the same key share a single build; a cached
    /// failure is handed back as-is until [`invalidate`](Self::invalidate).
    pub async fn get_or_build<F, Fut>(
        &self,
        key: &SessionKey,
        build: F,
    ) -> Result<Arc<RagEngine>, RagError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<RagEngine>, RagError>>,
    {
        let slot = self.claim(key).await;
        let result = slot
            .get_or_init(|| {
                info!(
                    requester = %key.requester_id,
                    knowledge_base = %key.knowledge_base_id,
                    "building retrieval session"
                );
                build()
            })
            .await;
        result.clone()
    }

    /// Drops the slot for `key` immediately, whatever its state. An in-flight
    /// build keeps running but its result is not published.
    pub async fn invalidate(&self, key: &SessionKey) -> bool {
        let mut slots = self.slots.lock().await;
        let removed = slots.pop(key).is_some();
        if removed {
            info!(
                requester = %key.requester_id,
                knowledge_base = %key.knowledge_base_id,
                "session invalidated"
            );
        }
        removed
    }

    /// Drops every session of a knowledge base across all requesters; called
    /// when the knowledge base is deleted. Returns how many were dropped.
    pub async fn invalidate_knowledge_base(&self, knowledge_base_id: &str) -> usize {
        let mut slots = self.slots.lock().await;
        let doomed: Vec<SessionKey> = slots
            .iter()
            .filter(|(key, _)| key.knowledge_base_id == knowledge_base_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            slots.pop(key);
        }
        if !doomed.is_empty() {
            info!(
                knowledge_base = knowledge_base_id,
                sessions = doomed.len(),
                "knowledge base sessions invalidated"
            );
        }
        doomed.len()
    }

    pub async fn state(&self, key: &SessionKey) -> BuildState {
        let slots = self.slots.lock().await;
        match slots.peek(key) {
            None => BuildState::Empty,
            Some(slot) => match slot.get() {
                None => BuildState::Building,
                Some(Ok(_)) => BuildState::Ready,
                Some(Err(_)) => BuildState::Failed,
            },
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Lock scope: look up or insert the slot, nothing more. The build itself
    /// never runs under this lock.
    async fn claim(&self, key: &SessionKey) -> BuildSlot {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return slot.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let slot: BuildSlot = Arc::new(OnceCell::new());
        // The key is absent under this lock, so push can only displace the
        // least recently used entry.
        if let Some((evicted, _)) = slots.push(key.clone(), slot.clone()) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(
                requester = %evicted.requester_id,
                knowledge_base = %evicted.knowledge_base_id,
                "session evicted at capacity"
            );
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::core::errors::EmbeddingError;
    use crate::llm::Embedder;

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.0])
        }
    }

    fn blank_engine() -> Arc<RagEngine> {
        Arc::new(RagEngine::new(Arc::new(NullEmbedder)))
    }

    async fn wait_for_state(cache: &SessionCache, key: &SessionKey, state: BuildState) {
        for _ in 0..200 {
            if cache.state(key).await == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("slot never reached {:?}", state);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_build() {
        let cache = Arc::new(SessionCache::new(8));
        let key = SessionKey::new("r1", "kb1");
        let builds = Arc::new(AtomicUsize::new(0));

        let run = |cache: Arc<SessionCache>, builds: Arc<AtomicUsize>, key: SessionKey| async move {
            cache
                .get_or_build(&key, || async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(blank_engine())
                })
                .await
        };

        let (a, b) = tokio::join!(
            run(cache.clone(), builds.clone(), key.clone()),
            run(cache.clone(), builds.clone(), key.clone())
        );

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(cache.state(&key).await, BuildState::Ready);

        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn failed_build_is_terminal_until_invalidated() {
        let cache = SessionCache::new(8);
        let key = SessionKey::new("r1", "kb1");
        let builds = Arc::new(AtomicUsize::new(0));

        let attempt = |outcome: Result<Arc<RagEngine>, RagError>| {
            let builds = builds.clone();
            move || async move {
                builds.fetch_add(1, Ordering::SeqCst);
                outcome
            }
        };

        let failure = RagError::BuildFailed(EmbeddingError::UpstreamStatus(500));
        let first = cache.get_or_build(&key, attempt(Err(failure.clone()))).await;
        assert_eq!(first.unwrap_err(), failure);
        assert_eq!(cache.state(&key).await, BuildState::Failed);

        // Second call must not rebuild, just hand the failure back.
        let second = cache.get_or_build(&key, attempt(Ok(blank_engine()))).await;
        assert_eq!(second.unwrap_err(), failure);
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        // Invalidation permits a fresh attempt.
        assert!(cache.invalidate(&key).await);
        let third = cache.get_or_build(&key, attempt(Ok(blank_engine()))).await;
        assert!(third.is_ok());
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.state(&key).await, BuildState::Ready);
    }

    #[tokio::test]
    async fn invalidation_during_build_discards_the_result() {
        let cache = Arc::new(SessionCache::new(8));
        let key = SessionKey::new("r1", "kb1");
        let gate = Arc::new(tokio::sync::Notify::new());

        let task = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            let gate = gate.clone();
            async move {
                cache
                    .get_or_build(&key, || async move {
                        gate.notified().await;
                        Ok(blank_engine())
                    })
                    .await
            }
        });

        wait_for_state(&cache, &key, BuildState::Building).await;
        assert!(cache.invalidate(&key).await);
        gate.notify_one();

        // The in-flight caller still gets its engine...
        assert!(task.await.unwrap().is_ok());
        // ...but nothing was published for the key.
        assert_eq!(cache.state(&key).await, BuildState::Empty);

        let builds = Arc::new(AtomicUsize::new(0));
        let rebuilt = cache
            .get_or_build(&key, || {
                let builds = builds.clone();
                async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(blank_engine())
                }
            })
            .await;
        assert!(rebuilt.is_ok());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used_key() {
        let cache = SessionCache::new(2);
        let k1 = SessionKey::new("r1", "kb1");
        let k2 = SessionKey::new("r1", "kb2");
        let k3 = SessionKey::new("r1", "kb3");

        for key in [&k1, &k2] {
            cache
                .get_or_build(key, || async { Ok(blank_engine()) })
                .await
                .unwrap();
        }
        // Touch k1 so k2 is the eviction candidate.
        cache
            .get_or_build(&k1, || async { Ok(blank_engine()) })
            .await
            .unwrap();
        cache
            .get_or_build(&k3, || async { Ok(blank_engine()) })
            .await
            .unwrap();

        assert_eq!(cache.state(&k2).await, BuildState::Empty);
        assert_eq!(cache.state(&k1).await, BuildState::Ready);
        assert_eq!(cache.state(&k3).await, BuildState::Ready);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn knowledge_base_invalidation_spans_requesters() {
        let cache = SessionCache::new(8);
        let doomed_a = SessionKey::new("r1", "kb1");
        let doomed_b = SessionKey::new("r2", "kb1");
        let survivor = SessionKey::new("r1", "kb2");

        for key in [&doomed_a, &doomed_b, &survivor] {
            cache
                .get_or_build(key, || async { Ok(blank_engine()) })
                .await
                .unwrap();
        }

        assert_eq!(cache.invalidate_knowledge_base("kb1").await, 2);
        assert_eq!(cache.state(&doomed_a).await, BuildState::Empty);
        assert_eq!(cache.state(&doomed_b).await, BuildState::Empty);
        assert_eq!(cache.state(&survivor).await, BuildState::Ready);
    }

    #[tokio::test]
    async fn invalidating_an_absent_key_is_a_no_op() {
        let cache = SessionCache::new(8);
        assert!(!cache.invalidate(&SessionKey::new("r", "kb")).await);
        assert_eq!(cache.invalidate_knowledge_base("kb").await, 0);
    }
}

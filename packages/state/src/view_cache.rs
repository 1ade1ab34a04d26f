//! # View Cache
//!
//! Per-session store of server-kept saved states, bounded on two levels:
//!
//! - at most `logical_views` logical views (one per browser tab or window),
//!   keyed by the logical part of the token
//! - at most `views_per_logical` saved states per logical view, keyed by the
//!   actual part
//!
//! Both levels evict the least recently used entry. A postback chain in one
//! tab therefore only pushes out that tab's older states. `get` and `put` each
//! take the cache lock once, so every single lookup or store is atomic. Stored
//! states are never mutated; a request that saves again stores a new state
//! under a new token.

use crate::error::StateError;
use crate::saved_state::SavedState;
use crate::token::ServerToken;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub state: Arc<SavedState>,
    pub stored_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

/// What a `put` pushed out of the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eviction {
    /// The least recently used logical view, with all of its saved states
    Logical { logical: String, views: usize },
    /// The least recently used state of the logical view being saved
    View(ServerToken),
}

type ActualViews = LruCache<String, CacheEntry>;

#[derive(Debug)]
pub struct ViewCache {
    logical: Mutex<LruCache<String, ActualViews>>,
    views_per_logical: NonZeroUsize,
}

impl ViewCache {
    pub fn new(logical_views: usize, views_per_logical: usize) -> Result<Self, StateError> {
        let logical_views = NonZeroUsize::new(logical_views).ok_or(StateError::ZeroCapacity)?;
        let views_per_logical = NonZeroUsize::new(views_per_logical).ok_or(StateError::ZeroCapacity)?;
        Ok(Self {
            logical: Mutex::new(LruCache::new(logical_views)),
            views_per_logical,
        })
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, ActualViews>> {
        self.logical.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `state` under `token`. Returns what was evicted to make room, if anything.
    pub fn put(&self, token: &ServerToken, state: SavedState) -> Option<Eviction> {
        let now = Utc::now();
        let entry = CacheEntry {
            state: Arc::new(state),
            stored_at: now,
            last_access: now,
        };

        let mut logical = self.lock();
        if let Some(views) = logical.get_mut(&token.logical) {
            return match views.push(token.actual.clone(), entry) {
                Some((evicted, _)) if evicted != token.actual => {
                    debug!(logical = %token.logical, actual = %evicted, "Evicted least recently used view state");
                    Some(Eviction::View(ServerToken::new(token.logical.clone(), evicted)))
                }
                _ => None,
            };
        }

        let mut views = LruCache::new(self.views_per_logical);
        views.put(token.actual.clone(), entry);
        match logical.push(token.logical.clone(), views) {
            Some((evicted, views)) if evicted != token.logical => {
                debug!(logical = %evicted, views = views.len(), "Evicted least recently used logical view");
                Some(Eviction::Logical {
                    logical: evicted,
                    views: views.len(),
                })
            }
            _ => None,
        }
    }

    /// Look up `token` and mark both its logical view and the state most recently used.
    /// Unknown and evicted tokens fail with `StateError::ViewExpired`.
    pub fn get(&self, view_id: &str, token: &ServerToken) -> Result<Arc<SavedState>, StateError> {
        let mut logical = self.lock();
        let entry = logical
            .get_mut(&token.logical)
            .and_then(|views| views.get_mut(&token.actual));
        match entry {
            Some(entry) => {
                entry.last_access = Utc::now();
                Ok(Arc::clone(&entry.state))
            }
            None => Err(StateError::expired(view_id, token.to_string())),
        }
    }

    /// Look up without touching recency
    pub fn peek(&self, token: &ServerToken) -> Option<CacheEntry> {
        self.lock()
            .peek(&token.logical)
            .and_then(|views| views.peek(&token.actual))
            .cloned()
    }

    /// Drop one state; a logical view left without states goes too
    pub fn remove(&self, token: &ServerToken) -> Option<Arc<SavedState>> {
        let mut logical = self.lock();
        let views = logical.peek_mut(&token.logical)?;
        let removed = views.pop(&token.actual).map(|entry| entry.state);
        if views.is_empty() {
            logical.pop(&token.logical);
        }
        removed
    }

    pub fn contains(&self, token: &ServerToken) -> bool {
        self.lock()
            .peek(&token.logical)
            .map(|views| views.contains(&token.actual))
            .unwrap_or(false)
    }

    /// Tokens grouped by logical view, each level from most to least recently used
    pub fn tokens(&self) -> Vec<ServerToken> {
        self.lock()
            .iter()
            .flat_map(|(logical, views)| {
                views
                    .iter()
                    .map(move |(actual, _)| ServerToken::new(logical.clone(), actual.clone()))
            })
            .collect()
    }

    /// Number of saved states across all logical views
    pub fn len(&self) -> usize {
        self.lock().iter().map(|(_, views)| views.len()).sum()
    }

    pub fn logical_len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logical_len() == 0
    }

    pub fn logical_capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn views_per_logical(&self) -> usize {
        self.views_per_logical.get()
    }
}

//! Per-session state, created on first use and dropped when the session ends.

use crate::error::StateError;
use crate::view_cache::ViewCache;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::info;
use weft_component::{ScopeMap, SharedScope};

#[derive(Debug)]
pub struct SessionState {
    pub id: String,
    pub created_at: DateTime<Utc>,
    views: ViewCache,
    scope: SharedScope,
    pending_flash: Mutex<ScopeMap>,
    sequence: AtomicU64,
}

impl SessionState {
    pub fn new(id: impl Into<String>, logical_views: usize, views_per_logical: usize) -> Result<Self, StateError> {
        Ok(Self {
            id: id.into(),
            created_at: Utc::now(),
            views: ViewCache::new(logical_views, views_per_logical)?,
            scope: SharedScope::default(),
            pending_flash: Mutex::new(ScopeMap::new()),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn views(&self) -> &ViewCache {
        &self.views
    }

    /// Session scope map, shared by every request of the session
    pub fn scope(&self) -> SharedScope {
        Arc::clone(&self.scope)
    }

    /// Next value of the per-session save counter (starts at 1)
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Flash values left for this request by a redirecting predecessor
    pub fn take_flash(&self) -> ScopeMap {
        std::mem::take(&mut *self.pending_flash.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_flash(&self, values: ScopeMap) {
        *self.pending_flash.lock().unwrap_or_else(PoisonError::into_inner) = values;
    }
}

pub type SessionHook = Box<dyn Fn(&SessionState) + Send + Sync>;

/// Owns all live sessions
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionState>>>,
    logical_views: usize,
    views_per_logical: usize,
    on_create: Vec<SessionHook>,
    on_destroy: Vec<SessionHook>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("logical_views", &self.logical_views)
            .field("views_per_logical", &self.views_per_logical)
            .finish()
    }
}

impl SessionStore {
    /// Every session keeps at most `logical_views` logical views with
    /// `views_per_logical` saved states each
    pub fn new(logical_views: usize, views_per_logical: usize) -> Result<Self, StateError> {
        if logical_views == 0 || views_per_logical == 0 {
            return Err(StateError::ZeroCapacity);
        }
        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            logical_views,
            views_per_logical,
            on_create: Vec::new(),
            on_destroy: Vec::new(),
        })
    }

    pub fn on_create(&mut self, hook: impl Fn(&SessionState) + Send + Sync + 'static) {
        self.on_create.push(Box::new(hook));
    }

    pub fn on_destroy(&mut self, hook: impl Fn(&SessionState) + Send + Sync + 'static) {
        self.on_destroy.push(Box::new(hook));
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionState>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn get_or_create(&self, id: &str) -> Result<Arc<SessionState>, StateError> {
        if let Some(session) = self.get(id) {
            return Ok(session);
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get(id) {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(SessionState::new(id, self.logical_views, self.views_per_logical)?);
        sessions.insert(id.to_string(), Arc::clone(&session));
        drop(sessions);

        info!(session_id = %id, "Session created");
        for hook in &self.on_create {
            hook(&session);
        }
        Ok(session)
    }

    /// End a session; its view states go with it
    pub fn destroy(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        match removed {
            Some(session) => {
                info!(session_id = %id, views = session.views().len(), "Session destroyed");
                for hook in &self.on_destroy {
                    hook(&session);
                }
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

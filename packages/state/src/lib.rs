//! # Weft State
//!
//! Partial state saving for component trees.
//!
//! ```text
//! ComponentTree ──differ::save──▶ TreeDiff ─┐
//!                                           ├─▶ SavedState ──▶ ViewCache (server)
//!                     view scope, ids ──────┘              └─▶ base64 payload (client)
//!
//! template build ──mark_initial_state──▶ baseline ──differ::restore──▶ ComponentTree
//! ```

pub mod codec;
pub mod differ;
pub mod error;
pub mod manager;
pub mod saved_state;
pub mod session;
pub mod token;
pub mod view_cache;

pub use error::StateError;
pub use manager::{RestoredView, StateManager};
pub use saved_state::{AttributeDiff, RecordKind, SavedState, StructuralEdit, StructuralMismatch, TreeDiff};
pub use session::{SessionHook, SessionState, SessionStore};
pub use token::{ServerToken, TokenStrategy};
pub use view_cache::{CacheEntry, Eviction, ViewCache};

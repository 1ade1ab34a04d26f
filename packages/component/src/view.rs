use crate::scope::ScopeMap;
use crate::tree::ComponentTree;

/// One view instance: a component tree plus per-view metadata
#[derive(Debug, Clone)]
pub struct View {
    pub view_id: String,
    pub tree: ComponentTree,
    pub locale: String,
    /// Lives as long as the view; saved with its state
    pub view_scope: ScopeMap,
    /// Stable across postbacks of the same logical view (server-side saving)
    pub logical_id: Option<String>,
    /// Token the view was restored from, or the one issued when it was saved
    pub state_token: Option<String>,
    /// A transient view is never saved
    pub transient: bool,
}

impl View {
    pub fn new(view_id: impl Into<String>, tree: ComponentTree, locale: impl Into<String>) -> Self {
        Self {
            view_id: view_id.into(),
            tree,
            locale: locale.into(),
            view_scope: ScopeMap::new(),
            logical_id: None,
            state_token: None,
            transient: false,
        }
    }
}

//! End-to-end state saving through sessions and the view cache

use weft_common::{Config, StateSavingMethod};
use weft_component::{
    ComponentNode, ComponentRegistry, ComponentTree, NodeDescriptor, NodeKind, TemplateSet, View, ViewTemplates,
};
use weft_state::{SessionStore, StateManager, StructuralEdit};

fn templates() -> TemplateSet {
    let mut set = TemplateSet::new();
    set.insert(
        "/list",
        NodeDescriptor::new("weft.ViewRoot").with_id("root").with_child(
            NodeDescriptor::new("weft.Panel")
                .with_id("parent")
                .with_child(NodeDescriptor::new("weft.Output").with_id("A"))
                .with_child(NodeDescriptor::new("weft.Output").with_id("B")),
        ),
    );
    set
}

fn new_view(templates: &TemplateSet, registry: &ComponentRegistry) -> View {
    let mut tree = ComponentTree::new(templates.build("/list", registry).unwrap());
    tree.mark_initial_state();
    View::new("/list", tree, "en")
}

fn child_ids(view: &View) -> Vec<String> {
    view.tree
        .find("parent")
        .unwrap()
        .children()
        .iter()
        .map(|c| c.id().to_string())
        .collect()
}

#[test]
fn test_insert_between_template_nodes_round_trips() {
    let templates = templates();
    let registry = ComponentRegistry::with_builtins();
    let store = SessionStore::new(15, 15).unwrap();
    let session = store.get_or_create("s1").unwrap();
    let manager = StateManager::new(&Config::default());

    let mut view = new_view(&templates, &registry);
    view.tree
        .add_child("parent", 1, ComponentNode::new("weft.Output", NodeKind::Output).with_id("C"))
        .unwrap();

    let token = manager.save(&mut view, &session).unwrap();

    let saved = manager.lookup("/list", &token, &session).unwrap();
    assert!(saved.diff.attribute_diffs.is_empty());
    assert_eq!(saved.diff.structural_edits.len(), 1);
    match &saved.diff.structural_edits[0] {
        StructuralEdit::Insert {
            parent_client_id,
            index,
            descriptor,
            ..
        } => {
            assert_eq!(parent_client_id, "parent");
            assert_eq!(*index, 1);
            assert_eq!(descriptor.id.as_deref(), Some("C"));
        }
        other => panic!("expected insert, got {:?}", other),
    }

    let restored = manager
        .restore("/list", &token, "en", &session, &templates, &registry)
        .unwrap();
    assert_eq!(child_ids(&restored.view), vec!["A", "C", "B"]);
}

#[test]
fn test_cache_keeps_only_configured_number_of_logical_views() {
    let templates = templates();
    let registry = ComponentRegistry::with_builtins();
    let config = Config::default().with_number_of_logical_views(2);
    let store = SessionStore::new(config.number_of_logical_views, config.number_of_views_in_session).unwrap();
    let session = store.get_or_create("s1").unwrap();
    let manager = StateManager::new(&config);

    // Every fresh view is its own logical view
    let mut tokens = Vec::new();
    for _ in 0..3 {
        let mut view = new_view(&templates, &registry);
        tokens.push(manager.save(&mut view, &session).unwrap());
    }

    assert!(manager.lookup("/list", &tokens[0], &session).unwrap_err().is_view_expired());
    assert!(manager.lookup("/list", &tokens[1], &session).is_ok());
    assert!(manager.lookup("/list", &tokens[2], &session).is_ok());
    assert_eq!(session.views().logical_len(), 2);
}

#[test]
fn test_cache_keeps_only_configured_number_of_states_per_logical_view() {
    let templates = templates();
    let registry = ComponentRegistry::with_builtins();
    let config = Config::default().with_number_of_views(2);
    let store = SessionStore::new(config.number_of_logical_views, config.number_of_views_in_session).unwrap();
    let session = store.get_or_create("s1").unwrap();
    let manager = StateManager::new(&config);

    let mut other = new_view(&templates, &registry);
    let other_token = manager.save(&mut other, &session).unwrap();

    let mut view = new_view(&templates, &registry);
    let tokens: Vec<String> = (0..3).map(|_| manager.save(&mut view, &session).unwrap()).collect();

    assert!(manager.lookup("/list", &tokens[0], &session).unwrap_err().is_view_expired());
    assert!(manager.lookup("/list", &tokens[1], &session).is_ok());
    assert!(manager.lookup("/list", &tokens[2], &session).is_ok());
    assert!(manager.lookup("/list", &other_token, &session).is_ok());
    assert_eq!(session.views().len(), 3);
}

#[test]
fn test_sessions_do_not_share_views() {
    let templates = templates();
    let registry = ComponentRegistry::with_builtins();
    let store = SessionStore::new(5, 5).unwrap();
    let manager = StateManager::new(&Config::default());

    let alice = store.get_or_create("alice").unwrap();
    let bob = store.get_or_create("bob").unwrap();

    let mut view = new_view(&templates, &registry);
    let token = manager.save(&mut view, &alice).unwrap();

    assert!(manager.lookup("/list", &token, &alice).is_ok());
    assert!(manager.lookup("/list", &token, &bob).unwrap_err().is_view_expired());

    store.destroy("alice");
    let alice_again = store.get_or_create("alice").unwrap();
    assert!(manager.lookup("/list", &token, &alice_again).unwrap_err().is_view_expired());
}

#[test]
fn test_client_side_state_needs_no_session_cache() {
    let templates = templates();
    let registry = ComponentRegistry::with_builtins();
    let store = SessionStore::new(1, 1).unwrap();
    let session = store.get_or_create("s").unwrap();
    let manager = StateManager::new(&Config::default().with_state_saving_method(StateSavingMethod::Client));

    let mut view = new_view(&templates, &registry);
    view.tree.remove("A").unwrap();
    let token = manager.save(&mut view, &session).unwrap();

    assert!(session.views().is_empty());
    let restored = manager
        .restore("/list", &token, "en", &session, &templates, &registry)
        .unwrap();
    assert_eq!(child_ids(&restored.view), vec!["B"]);
}

//! Per-canvas view adapter.
//!
//! Holds the transient node/edge state the graph widget edits at interaction
//! frequency, and keeps the [`CanvasStore`] eventually consistent with it:
//!
//! - store → view: whenever the store rewrites the canvas, its nodes and edges
//!   replace the local copy (last store write wins);
//! - view → store: only removals and position moves are forwarded.

use tracing::{debug, warn};

use simcanvas_core::types::{Canvas, Connection, Edge, Node};

use crate::protocol::{
    EdgeChange, NodeChange, apply_edge_changes, apply_node_changes, propagated_edge_mutation,
    propagated_node_mutation,
};
use crate::store::CanvasStore;

/// Local nodes and edges as the widget sees them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// A change kept only in the view, replayed after each store sync.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalChange {
    Node(NodeChange),
    Edge(EdgeChange),
}

/// Compute the next local state.
///
/// With no incoming canvas the previous state is kept. Otherwise the store's
/// nodes and edges win, and `pending` local-only changes are replayed on top
/// wherever their targets still exist.
pub fn reconcile(
    previous: &ViewState,
    incoming: Option<&Canvas>,
    pending: &[LocalChange],
) -> ViewState {
    let Some(canvas) = incoming else {
        return previous.clone();
    };

    let mut next = ViewState {
        nodes: canvas.nodes.clone(),
        edges: canvas.edges.clone(),
    };
    for change in pending {
        match change {
            LocalChange::Node(c) => {
                apply_node_changes(std::slice::from_ref(c), &mut next.nodes, &mut next.edges)
            }
            LocalChange::Edge(c) => apply_edge_changes(std::slice::from_ref(c), &mut next.edges),
        }
    }
    next
}

pub struct CanvasView {
    canvas_id: String,
    state: ViewState,
    /// Store revision the local state was last reconciled against.
    seen_revision: Option<u64>,
    pending: Vec<LocalChange>,
}

impl CanvasView {
    /// Bind a view to `canvas_id`, loading it into the store.
    pub fn mount(store: &mut CanvasStore, canvas_id: &str) -> Self {
        let mut view = Self {
            canvas_id: canvas_id.to_string(),
            state: ViewState::default(),
            seen_revision: None,
            pending: Vec::new(),
        };
        view.load(store);
        view
    }

    /// Switch to another canvas. Local state is discarded.
    pub fn set_canvas_id(&mut self, store: &mut CanvasStore, canvas_id: &str) {
        if self.canvas_id == canvas_id {
            return;
        }
        self.canvas_id = canvas_id.to_string();
        self.state = ViewState::default();
        self.seen_revision = None;
        self.pending.clear();
        self.load(store);
    }

    fn load(&mut self, store: &mut CanvasStore) {
        if self.canvas_id.is_empty() {
            return;
        }
        if let Err(e) = store.load_canvas(&self.canvas_id) {
            warn!(canvas_id = %self.canvas_id, %e, "Canvas load failed");
        }
        self.sync_from_store(store);
    }

    /// Pull the store's copy if it changed since the last sync.
    /// Returns true when local state was replaced.
    pub fn sync_from_store(&mut self, store: &CanvasStore) -> bool {
        let revision = store.revision(&self.canvas_id);
        if revision.is_none() || revision == self.seen_revision {
            return false;
        }
        self.state = reconcile(&self.state, store.get(&self.canvas_id), &self.pending);
        self.seen_revision = revision;
        debug!(canvas_id = %self.canvas_id, ?revision, "View synced from store");
        true
    }

    pub fn on_nodes_change(&mut self, store: &mut CanvasStore, changes: Vec<NodeChange>) {
        apply_node_changes(&changes, &mut self.state.nodes, &mut self.state.edges);

        for change in changes {
            if let Some(mutation) = propagated_node_mutation(&change) {
                if let NodeChange::Remove { id } = &change {
                    self.forget_pending(id);
                }
                store.apply(&self.canvas_id, mutation);
            } else if matches!(change, NodeChange::Select { .. }) {
                self.remember(LocalChange::Node(change));
            }
        }
        self.sync_from_store(store);
    }

    pub fn on_edges_change(&mut self, store: &mut CanvasStore, changes: Vec<EdgeChange>) {
        apply_edge_changes(&changes, &mut self.state.edges);

        for change in changes {
            if let Some(mutation) = propagated_edge_mutation(&change) {
                self.forget_pending(change.id());
                store.apply(&self.canvas_id, mutation);
            } else if matches!(change, EdgeChange::Select { .. }) {
                self.remember(LocalChange::Edge(change));
            }
        }
        self.sync_from_store(store);
    }

    /// Handle a connect gesture between two nodes.
    pub fn on_connect(&mut self, store: &mut CanvasStore, connection: Connection) {
        let endpoints_known = self.state.nodes.iter().any(|n| n.id == connection.source)
            && self.state.nodes.iter().any(|n| n.id == connection.target);
        let duplicate = self.state.edges.iter().any(|e| connection.matches(e));
        if endpoints_known && !duplicate {
            self.state.edges.push(Edge::from_connection(&connection));
        }
        store.add_edge(&self.canvas_id, connection);
        self.sync_from_store(store);
    }

    pub fn add_node(&mut self, store: &mut CanvasStore, node: Node) {
        if !self.state.nodes.iter().any(|n| n.id == node.id) {
            self.state.nodes.push(node.clone());
        }
        store.add_node(&self.canvas_id, node);
        self.sync_from_store(store);
    }

    pub fn clear_canvas(&mut self, store: &mut CanvasStore) {
        store.clear_canvas(&self.canvas_id);
        self.state = ViewState::default();
        self.pending.clear();
        self.sync_from_store(store);
    }

    // --- Reads ---

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.state.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.state.edges
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn canvas<'a>(&self, store: &'a CanvasStore) -> Option<&'a Canvas> {
        store.get(&self.canvas_id)
    }

    pub fn is_loading(&self, store: &CanvasStore) -> bool {
        store.is_loading()
    }

    pub fn error<'a>(&self, store: &'a CanvasStore) -> Option<&'a str> {
        store.error()
    }

    // --- Pending local-only changes ---

    /// Keep only the latest pending change per element.
    fn remember(&mut self, change: LocalChange) {
        let id = local_change_id(&change).to_string();
        self.pending.retain(|c| local_change_id(c) != id);
        self.pending.push(change);
    }

    fn forget_pending(&mut self, id: &str) {
        self.pending.retain(|c| local_change_id(c) != id);
    }
}

fn local_change_id(change: &LocalChange) -> &str {
    match change {
        LocalChange::Node(c) => c.id(),
        LocalChange::Edge(c) => c.id(),
    }
}

//! Canvas entity store: the single source of truth for canvas documents.
//!
//! Canvas-level flows (`create`, `load`, `update`, `delete`) report failures to
//! the caller and record them in [`CanvasState::error`]. Node and edge
//! mutations against an unknown canvas id are ignored on purpose: a view may
//! issue them while its canvas is still being loaded, and that race is
//! expected rather than a fault.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use simcanvas_core::error::{Result, SimCanvasError};
use simcanvas_core::observe::{Listeners, SubscriptionId};
use simcanvas_core::types::{Canvas, CanvasPatch, EdgeInput, EdgePatch, Node, NodePatch};

use crate::protocol::StoreMutation;

/// Observable store state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasState {
    pub canvases: HashMap<String, Canvas>,
    pub active_canvas_id: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// How [`CanvasStore::load_canvas`] resolved an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The canvas was already in the store.
    Cached,
    /// The id was unknown and an empty placeholder was created.
    Placeholder,
}

/// Serializable copy of the store contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_canvas_id: Option<String>,
    #[serde(default)]
    pub canvases: Vec<Canvas>,
}

pub struct CanvasStore {
    state: CanvasState,
    placeholder_on_miss: bool,
    /// Per-canvas revision, bumped on every content mutation.
    revisions: HashMap<String, u64>,
    next_revision: u64,
    listeners: Listeners<CanvasState>,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CanvasStore {
    pub fn new(placeholder_on_miss: bool) -> Self {
        Self {
            state: CanvasState::default(),
            placeholder_on_miss,
            revisions: HashMap::new(),
            next_revision: 1,
            listeners: Listeners::new(),
        }
    }

    // --- Canvas management ---

    /// Create an empty canvas, make it active, and return its id.
    pub fn create_canvas(&mut self, name: &str, description: Option<&str>) -> Result<String> {
        self.state.error = None;

        let id = format!("canvas-{}", uuid::Uuid::new_v4());
        if self.state.canvases.contains_key(&id) {
            return Err(self.fail(SimCanvasError::Conflict(id)));
        }

        let canvas = Canvas::new(
            id.clone(),
            name,
            Some(description.unwrap_or_default().to_string()),
        );
        self.state.canvases.insert(id.clone(), canvas);
        self.state.active_canvas_id = Some(id.clone());
        self.state.is_loading = false;
        self.bump(&id);
        info!(canvas_id = %id, name, "Created canvas");
        self.emit();
        Ok(id)
    }

    /// Make `id` active. Unknown ids become an empty placeholder when
    /// placeholder-on-miss is enabled, and fail with `NotFound` otherwise.
    pub fn load_canvas(&mut self, id: &str) -> Result<LoadOutcome> {
        self.state.error = None;

        if self.state.canvases.contains_key(id) {
            self.state.active_canvas_id = Some(id.to_string());
            self.state.is_loading = false;
            self.emit();
            return Ok(LoadOutcome::Cached);
        }

        if !self.placeholder_on_miss {
            return Err(self.fail(SimCanvasError::NotFound(id.to_string())));
        }

        let canvas = Canvas::new(id, format!("Canvas {id}"), None);
        self.state.canvases.insert(id.to_string(), canvas);
        self.state.active_canvas_id = Some(id.to_string());
        self.state.is_loading = false;
        self.bump(id);
        debug!(canvas_id = %id, "Created placeholder canvas on load miss");
        self.emit();
        Ok(LoadOutcome::Placeholder)
    }

    /// Look a canvas up without any fallback.
    pub fn fetch(&self, id: &str) -> Result<&Canvas> {
        self.state
            .canvases
            .get(id)
            .ok_or_else(|| SimCanvasError::NotFound(id.to_string()))
    }

    /// Merge `patch` into an existing canvas.
    pub fn update_canvas(&mut self, id: &str, patch: CanvasPatch) -> Result<()> {
        self.state.error = None;

        let Some(canvas) = self.state.canvases.get_mut(id) else {
            return Err(self.fail(SimCanvasError::NotFound(id.to_string())));
        };

        if let Some(name) = patch.name {
            canvas.name = name;
        }
        if let Some(description) = patch.description {
            canvas.description = Some(description);
        }
        if let Some(nodes) = patch.nodes {
            canvas.nodes = nodes;
        }
        if let Some(edges) = patch.edges {
            canvas.edges = edges;
        }
        let pruned = canvas.prune_dangling_edges();
        if pruned > 0 {
            warn!(canvas_id = %id, pruned, "Dropped edges with missing endpoints");
        }
        canvas.touch();

        self.state.is_loading = false;
        self.bump(id);
        self.emit();
        Ok(())
    }

    pub fn delete_canvas(&mut self, id: &str) -> Result<()> {
        self.state.error = None;

        if self.state.canvases.remove(id).is_none() {
            return Err(self.fail(SimCanvasError::NotFound(id.to_string())));
        }
        self.revisions.remove(id);
        if self.state.active_canvas_id.as_deref() == Some(id) {
            self.state.active_canvas_id = None;
        }
        self.state.is_loading = false;
        info!(canvas_id = %id, "Deleted canvas");
        self.emit();
        Ok(())
    }

    pub fn set_active_canvas(&mut self, id: Option<&str>) {
        self.state.active_canvas_id = id.map(str::to_string);
        self.emit();
    }

    // --- Node and edge management ---
    //
    // Each returns whether the store changed. An unknown canvas id is a no-op.

    pub fn add_node(&mut self, canvas_id: &str, node: Node) -> bool {
        self.mutate(canvas_id, "add_node", |canvas| {
            if canvas.has_node(&node.id) {
                warn!(canvas_id = %canvas.id, node_id = %node.id, "Ignoring duplicate node id");
                return false;
            }
            canvas.nodes.push(node);
            true
        })
    }

    /// Merge `patch` into a node. Unknown node ids leave the canvas untouched.
    pub fn update_node(&mut self, canvas_id: &str, node_id: &str, patch: NodePatch) -> bool {
        self.mutate(canvas_id, "update_node", |canvas| {
            match canvas.nodes.iter_mut().find(|n| n.id == node_id) {
                Some(node) => {
                    patch.apply(node);
                    true
                }
                None => false,
            }
        })
    }

    /// Remove a node and every edge incident to it.
    pub fn remove_node(&mut self, canvas_id: &str, node_id: &str) -> bool {
        self.mutate(canvas_id, "remove_node", |canvas| {
            canvas.nodes.retain(|n| n.id != node_id);
            canvas.edges.retain(|e| !e.touches(node_id));
            true
        })
    }

    /// Add a full edge, or synthesize one from a bare connection.
    ///
    /// Edges whose endpoints are not nodes of the canvas are rejected, as are
    /// edges reusing an existing edge id.
    pub fn add_edge(&mut self, canvas_id: &str, input: impl Into<EdgeInput>) -> bool {
        let edge = input.into().into_edge();
        self.mutate(canvas_id, "add_edge", |canvas| {
            if canvas.edge(&edge.id).is_some() {
                warn!(canvas_id = %canvas.id, edge_id = %edge.id, "Ignoring duplicate edge id");
                return false;
            }
            if !canvas.has_node(&edge.source) || !canvas.has_node(&edge.target) {
                warn!(
                    canvas_id = %canvas.id,
                    source = %edge.source,
                    target = %edge.target,
                    "Ignoring edge with missing endpoint"
                );
                return false;
            }
            canvas.edges.push(edge);
            true
        })
    }

    pub fn update_edge(&mut self, canvas_id: &str, edge_id: &str, patch: EdgePatch) -> bool {
        self.mutate(canvas_id, "update_edge", |canvas| {
            let endpoints_ok = patch.source.as_deref().is_none_or(|s| canvas.has_node(s))
                && patch.target.as_deref().is_none_or(|t| canvas.has_node(t));
            if !endpoints_ok {
                warn!(canvas_id = %canvas.id, edge_id, "Ignoring edge update with missing endpoint");
                return false;
            }
            match canvas.edges.iter_mut().find(|e| e.id == edge_id) {
                Some(edge) => {
                    patch.apply(edge);
                    true
                }
                None => false,
            }
        })
    }

    pub fn remove_edge(&mut self, canvas_id: &str, edge_id: &str) -> bool {
        self.mutate(canvas_id, "remove_edge", |canvas| {
            canvas.edges.retain(|e| e.id != edge_id);
            true
        })
    }

    /// Empty nodes and edges, keeping identity and metadata.
    pub fn clear_canvas(&mut self, canvas_id: &str) -> bool {
        self.mutate(canvas_id, "clear_canvas", |canvas| {
            canvas.nodes.clear();
            canvas.edges.clear();
            true
        })
    }

    /// Apply a mutation forwarded from a view.
    pub fn apply(&mut self, canvas_id: &str, mutation: StoreMutation) -> bool {
        match mutation {
            StoreMutation::RemoveNode { node_id } => self.remove_node(canvas_id, &node_id),
            StoreMutation::UpdateNode { node_id, patch } => {
                self.update_node(canvas_id, &node_id, patch)
            }
            StoreMutation::RemoveEdge { edge_id } => self.remove_edge(canvas_id, &edge_id),
        }
    }

    // --- Reads ---

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn get(&self, id: &str) -> Option<&Canvas> {
        self.state.canvases.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.canvases.contains_key(id)
    }

    pub fn active_canvas_id(&self) -> Option<&str> {
        self.state.active_canvas_id.as_deref()
    }

    pub fn active_canvas(&self) -> Option<&Canvas> {
        self.active_canvas_id().and_then(|id| self.get(id))
    }

    /// All canvases, most recently updated first.
    pub fn list(&self) -> Vec<&Canvas> {
        let mut canvases: Vec<&Canvas> = self.state.canvases.values().collect();
        canvases.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        canvases
    }

    pub fn len(&self) -> usize {
        self.state.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.canvases.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    /// Revision of a canvas's content; changes whenever the store writes it.
    pub fn revision(&self, id: &str) -> Option<u64> {
        self.revisions.get(id).copied()
    }

    pub fn placeholder_on_miss(&self) -> bool {
        self.placeholder_on_miss
    }

    // --- Subscription ---

    pub fn subscribe(&mut self, listener: impl FnMut(&CanvasState) + Send + 'static) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    // --- Snapshots ---

    pub fn snapshot(&self) -> CanvasSnapshot {
        let mut canvases: Vec<Canvas> = self.state.canvases.values().cloned().collect();
        canvases.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        CanvasSnapshot {
            active_canvas_id: self.state.active_canvas_id.clone(),
            canvases,
        }
    }

    /// Replace the store contents with a snapshot.
    pub fn restore(&mut self, snapshot: CanvasSnapshot) {
        self.state.canvases.clear();
        self.revisions.clear();
        for mut canvas in snapshot.canvases {
            canvas.prune_dangling_edges();
            let id = canvas.id.clone();
            self.state.canvases.insert(id.clone(), canvas);
            self.bump(&id);
        }
        self.state.active_canvas_id = snapshot
            .active_canvas_id
            .filter(|id| self.state.canvases.contains_key(id));
        self.state.error = None;
        self.state.is_loading = false;
        self.emit();
    }

    // --- Internals ---

    /// Run `f` on an existing canvas; touch, bump, and notify if it reports a change.
    fn mutate(&mut self, canvas_id: &str, op: &str, f: impl FnOnce(&mut Canvas) -> bool) -> bool {
        let Some(canvas) = self.state.canvases.get_mut(canvas_id) else {
            debug!(canvas_id, op, "Ignoring mutation on unknown canvas");
            return false;
        };
        if !f(canvas) {
            return false;
        }
        canvas.touch();
        self.bump(canvas_id);
        self.emit();
        true
    }

    fn bump(&mut self, id: &str) {
        self.revisions.insert(id.to_string(), self.next_revision);
        self.next_revision += 1;
    }

    fn fail(&mut self, err: SimCanvasError) -> SimCanvasError {
        warn!(%err, "Canvas operation failed");
        self.state.error = Some(err.to_string());
        self.state.is_loading = false;
        self.emit();
        err
    }

    fn emit(&mut self) {
        self.listeners.notify(&self.state);
    }
}

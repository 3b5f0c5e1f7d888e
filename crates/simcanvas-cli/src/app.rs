//! Application context: every store the CLI works with, built from config.

use std::path::PathBuf;

use tracing::{debug, warn};

use simcanvas_canvas::{CanvasStore, SnapshotFile};
use simcanvas_chat::ChatStore;
use simcanvas_client::{ChatSession, SimulationApi};
use simcanvas_core::config::Config;
use simcanvas_core::error::Result;
use simcanvas_core::layout::LayoutStore;
use simcanvas_core::types::{Edge, Node, NodeType, Position};

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub canvases: CanvasStore,
    pub snapshot: SnapshotFile,
    pub chat: ChatStore,
    pub session: ChatSession,
    pub layout: LayoutStore,
}

impl AppContext {
    /// Build the stores and restore canvases saved by earlier runs.
    pub async fn load(config: Config, config_path: PathBuf) -> Result<Self> {
        let (warnings, errors) = config.validate();
        for w in &warnings {
            warn!("config: {w}");
        }
        for e in &errors {
            warn!("config error: {e}");
        }

        let snapshot = SnapshotFile::new(config.snapshot_path());
        let mut canvases = CanvasStore::new(config.placeholder_on_miss());
        canvases.restore(snapshot.load().await?);
        debug!(canvases = canvases.len(), "Canvas store restored");

        let layout = LayoutStore::open(config.layout_path(), config.default_split_ratio());
        let session = ChatSession::new(SimulationApi::from_config(&config));

        Ok(Self {
            config,
            config_path,
            canvases,
            snapshot,
            chat: ChatStore::new(),
            session,
            layout,
        })
    }

    pub async fn save_canvases(&self) -> Result<()> {
        self.snapshot.save(&self.canvases.snapshot()).await
    }

    /// Create a canvas holding the three-node example flow and make it active.
    pub fn seed_demo(&mut self, name: &str) -> Result<String> {
        let id = self
            .canvases
            .create_canvas(name, Some("Example flow: input, processing, output"))?;

        for node in demo_nodes() {
            self.canvases.add_node(&id, node);
        }
        for edge in demo_edges() {
            self.canvases.add_edge(&id, edge);
        }
        Ok(id)
    }
}

fn demo_nodes() -> Vec<Node> {
    vec![
        Node::labeled("1", "Node 1", Position::new(100.0, 100.0)).with_type(NodeType::Input),
        Node::labeled("2", "Node 2", Position::new(250.0, 200.0)),
        Node::labeled("3", "Node 3", Position::new(400.0, 300.0)).with_type(NodeType::Output),
    ]
}

fn demo_edges() -> Vec<Edge> {
    vec![Edge::new("e1-2", "1", "2").animated(), Edge::new("e2-3", "2", "3")]
}

/// Next sequential node id for `canvas`, "1" for an empty one.
pub fn next_node_id(store: &CanvasStore, canvas_id: &str) -> String {
    let count = store.get(canvas_id).map(|c| c.nodes.len()).unwrap_or(0);
    let mut n = count + 1;
    while store.get(canvas_id).is_some_and(|c| c.has_node(&n.to_string())) {
        n += 1;
    }
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcanvas_core::config::{CanvasConfig, LayoutConfig};

    fn temp_config(dir: &std::path::Path) -> Config {
        Config {
            canvas: Some(CanvasConfig {
                snapshot_path: Some(dir.join("canvases.json").display().to_string()),
                ..Default::default()
            }),
            layout: Some(LayoutConfig {
                path: Some(dir.join("layout-storage.json").display().to_string()),
                default_split_ratio: None,
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_demo_graph() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AppContext::load(temp_config(dir.path()), dir.path().join("config.json"))
            .await
            .unwrap();

        let id = ctx.seed_demo("Demo").unwrap();
        let canvas = ctx.canvases.get(&id).unwrap();

        assert_eq!(canvas.nodes.len(), 3);
        assert_eq!(canvas.nodes[0].node_type, Some(NodeType::Input));
        assert_eq!(canvas.nodes[2].node_type, Some(NodeType::Output));
        assert_eq!(canvas.edges.len(), 2);
        assert!(canvas.edges[0].animated);
        assert!(!canvas.edges[1].animated);
        assert_eq!(ctx.canvases.active_canvas_id(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_canvases_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(dir.path());

        let mut ctx = AppContext::load(config.clone(), dir.path().join("config.json"))
            .await
            .unwrap();
        let id = ctx.seed_demo("Persisted").unwrap();
        ctx.save_canvases().await.unwrap();

        let reloaded = AppContext::load(config, dir.path().join("config.json"))
            .await
            .unwrap();
        let canvas = reloaded.canvases.get(&id).unwrap();
        assert_eq!(canvas.name, "Persisted");
        assert_eq!(canvas.nodes.len(), 3);
        assert_eq!(reloaded.canvases.active_canvas_id(), Some(id.as_str()));
    }

    #[test]
    fn test_next_node_id_skips_taken() {
        let mut store = CanvasStore::default();
        let id = store.create_canvas("c", None).unwrap();
        assert_eq!(next_node_id(&store, &id), "1");

        store.add_node(&id, Node::new("2", Position::new(0.0, 0.0)));
        assert_eq!(next_node_id(&store, &id), "3");
    }
}

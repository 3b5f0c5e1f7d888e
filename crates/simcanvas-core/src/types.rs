//! Canvas and chat entity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Canvas graph ---

/// A named graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Canvas {
    /// An empty canvas stamped with the current time.
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description,
            created_at: now,
            updated_at: now,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Drop every edge whose source or target is not a node of this canvas.
    /// Returns how many edges were removed.
    pub fn prune_dangling_edges(&mut self) -> usize {
        let before = self.edges.len();
        let nodes = &self.nodes;
        self.edges.retain(|e| {
            nodes.iter().any(|n| n.id == e.source) && nodes.iter().any(|n| n.id == e.target)
        });
        before - self.edges.len()
    }
}

/// Partial update merged into a [`Canvas`]. `id` and `created_at` are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Edge>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Node type tags understood by the graph widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Default,
    Input,
    Output,
    Custom,
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown node type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub position: Position,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    /// View-only selection flag.
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

impl Node {
    pub fn new(id: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
            data: serde_json::Value::Null,
            node_type: None,
            selected: false,
        }
    }

    /// Node carrying a `{"label": ...}` payload, the shape the widget renders by default.
    pub fn labeled(id: impl Into<String>, label: &str, position: Position) -> Self {
        Self {
            data: serde_json::json!({ "label": label }),
            ..Self::new(id, position)
        }
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.data.get("label").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
}

impl NodePatch {
    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn apply(&self, node: &mut Node) {
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(data) = &self.data {
            node.data = data.clone();
        }
        if let Some(node_type) = self.node_type {
            node.node_type = Some(node_type);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// View-only selection flag.
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            animated: false,
            data: None,
            selected: false,
        }
    }

    pub fn animated(mut self) -> Self {
        self.animated = true;
        self
    }

    /// Build an edge from a connect gesture, synthesizing the id the graph widget would.
    pub fn from_connection(connection: &Connection) -> Self {
        Self {
            id: connection.edge_id(),
            source_handle: connection.source_handle.clone(),
            target_handle: connection.target_handle.clone(),
            ..Self::new(String::new(), &connection.source, &connection.target)
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl EdgePatch {
    pub fn apply(&self, edge: &mut Edge) {
        if let Some(source) = &self.source {
            edge.source = source.clone();
        }
        if let Some(target) = &self.target {
            edge.target = target.clone();
        }
        if let Some(animated) = self.animated {
            edge.animated = animated;
        }
        if let Some(data) = &self.data {
            edge.data = Some(data.clone());
        }
    }
}

/// Bare connection descriptor emitted when the user drags between two handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn edge_id(&self) -> String {
        format!(
            "xy-edge__{}{}-{}{}",
            self.source,
            self.source_handle.as_deref().unwrap_or(""),
            self.target,
            self.target_handle.as_deref().unwrap_or("")
        )
    }

    /// True when `edge` already links the same handles.
    pub fn matches(&self, edge: &Edge) -> bool {
        edge.source == self.source
            && edge.target == self.target
            && edge.source_handle == self.source_handle
            && edge.target_handle == self.target_handle
    }
}

/// Either a fully formed edge or a connection to synthesize one from.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeInput {
    Edge(Edge),
    Connection(Connection),
}

impl EdgeInput {
    pub fn into_edge(self) -> Edge {
        match self {
            EdgeInput::Edge(edge) => edge,
            EdgeInput::Connection(connection) => Edge::from_connection(&connection),
        }
    }
}

impl From<Edge> for EdgeInput {
    fn from(edge: Edge) -> Self {
        EdgeInput::Edge(edge)
    }
}

impl From<Connection> for EdgeInput {
    fn from(connection: Connection) -> Self {
        EdgeInput::Connection(connection)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

// --- Chat ---

/// Chapter number for simulation output, millisecond timestamp for user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageId::Number(n) => write!(f, "{n}"),
            MessageId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            id: MessageId::Number(timestamp.timestamp_millis()),
            content: content.into(),
            is_user: true,
            timestamp,
        }
    }

    pub fn chapter(number: MessageId, content: impl Into<String>) -> Self {
        Self {
            id: number,
            content: content.into(),
            is_user: false,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_edge_id() {
        let mut conn = Connection::new("1", "2");
        assert_eq!(conn.edge_id(), "xy-edge__1-2");

        conn.source_handle = Some("a".into());
        conn.target_handle = Some("b".into());
        assert_eq!(conn.edge_id(), "xy-edge__1a-2b");
    }

    #[test]
    fn test_edge_input_from_connection() {
        let edge = EdgeInput::from(Connection::new("n1", "n2")).into_edge();
        assert_eq!(edge.id, "xy-edge__n1-n2");
        assert_eq!(edge.source, "n1");
        assert_eq!(edge.target, "n2");
        assert!(!edge.animated);
    }

    #[test]
    fn test_node_serializes_type_tag() {
        let node = Node::labeled("1", "Node 1", Position::new(100.0, 100.0)).with_type(NodeType::Input);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "input");
        assert_eq!(json["data"]["label"], "Node 1");
        assert!(json.get("selected").is_none());
    }

    #[test]
    fn test_canvas_camel_case_roundtrip() {
        let canvas = Canvas::new("c1", "Demo", None);
        let json = serde_json::to_value(&canvas).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        let back: Canvas = serde_json::from_value(json).unwrap();
        assert_eq!(back, canvas);
    }

    #[test]
    fn test_prune_dangling_edges() {
        let mut canvas = Canvas::new("c1", "Demo", None);
        canvas.nodes.push(Node::new("a", Position::default()));
        canvas.nodes.push(Node::new("b", Position::default()));
        canvas.edges.push(Edge::new("e1", "a", "b"));
        canvas.edges.push(Edge::new("e2", "a", "ghost"));

        assert_eq!(canvas.prune_dangling_edges(), 1);
        assert_eq!(canvas.edges.len(), 1);
        assert_eq!(canvas.edges[0].id, "e1");
    }

    #[test]
    fn test_message_id_untagged() {
        let n: MessageId = serde_json::from_str("3").unwrap();
        assert_eq!(n, MessageId::Number(3));
        let s: MessageId = serde_json::from_str("\"intro\"").unwrap();
        assert_eq!(s, MessageId::Text("intro".into()));
    }

    #[test]
    fn test_user_message_flags() {
        let msg = Message::user("hello");
        assert!(msg.is_user);
        assert!(matches!(msg.id, MessageId::Number(_)));
    }
}

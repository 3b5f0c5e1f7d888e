//! View-level change events and the store mutations they map to.

use serde::{Deserialize, Serialize};

use simcanvas_core::types::{Edge, Node, NodePatch, Position};

/// Changes the graph widget reports for nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeChange {
    /// A node was added by the widget itself.
    Add { node: Node },
    /// A node was deleted.
    Remove { id: String },
    /// A node was swapped for a new value.
    Replace { id: String, node: Node },
    /// A node moved. `position` is absent at drag start/end without movement.
    Position {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
        #[serde(default)]
        dragging: bool,
    },
    /// Selection toggled.
    Select { id: String, selected: bool },
}

impl NodeChange {
    pub fn id(&self) -> &str {
        match self {
            NodeChange::Add { node } => &node.id,
            NodeChange::Remove { id }
            | NodeChange::Replace { id, .. }
            | NodeChange::Position { id, .. }
            | NodeChange::Select { id, .. } => id,
        }
    }
}

/// Changes the graph widget reports for edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeChange {
    Add { edge: Edge },
    Remove { id: String },
    Replace { id: String, edge: Edge },
    Select { id: String, selected: bool },
}

impl EdgeChange {
    pub fn id(&self) -> &str {
        match self {
            EdgeChange::Add { edge } => &edge.id,
            EdgeChange::Remove { id } | EdgeChange::Replace { id, .. } | EdgeChange::Select { id, .. } => {
                id
            }
        }
    }
}

/// A store mutation forwarded from the view.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreMutation {
    RemoveNode { node_id: String },
    UpdateNode { node_id: String, patch: NodePatch },
    RemoveEdge { edge_id: String },
}

/// Apply node changes to local view state in order.
///
/// Removing a node also drops its incident edges from `edges`.
pub fn apply_node_changes(changes: &[NodeChange], nodes: &mut Vec<Node>, edges: &mut Vec<Edge>) {
    for change in changes {
        match change {
            NodeChange::Add { node } => {
                if !nodes.iter().any(|n| n.id == node.id) {
                    nodes.push(node.clone());
                }
            }
            NodeChange::Remove { id } => {
                nodes.retain(|n| &n.id != id);
                edges.retain(|e| !e.touches(id));
            }
            NodeChange::Replace { id, node } => {
                if let Some(existing) = nodes.iter_mut().find(|n| &n.id == id) {
                    *existing = node.clone();
                }
            }
            NodeChange::Position { id, position, .. } => {
                if let (Some(position), Some(existing)) =
                    (position, nodes.iter_mut().find(|n| &n.id == id))
                {
                    existing.position = *position;
                }
            }
            NodeChange::Select { id, selected } => {
                if let Some(existing) = nodes.iter_mut().find(|n| &n.id == id) {
                    existing.selected = *selected;
                }
            }
        }
    }
}

/// Apply edge changes to local view state in order.
pub fn apply_edge_changes(changes: &[EdgeChange], edges: &mut Vec<Edge>) {
    for change in changes {
        match change {
            EdgeChange::Add { edge } => {
                if !edges.iter().any(|e| e.id == edge.id) {
                    edges.push(edge.clone());
                }
            }
            EdgeChange::Remove { id } => edges.retain(|e| &e.id != id),
            EdgeChange::Replace { id, edge } => {
                if let Some(existing) = edges.iter_mut().find(|e| &e.id == id) {
                    *existing = edge.clone();
                }
            }
            EdgeChange::Select { id, selected } => {
                if let Some(existing) = edges.iter_mut().find(|e| &e.id == id) {
                    existing.selected = *selected;
                }
            }
        }
    }
}

/// The store mutation a node change propagates, if any.
///
/// Only removals and position changes that carry a position reach the store.
pub fn propagated_node_mutation(change: &NodeChange) -> Option<StoreMutation> {
    match change {
        NodeChange::Remove { id } => Some(StoreMutation::RemoveNode { node_id: id.clone() }),
        NodeChange::Position {
            id,
            position: Some(position),
            ..
        } => Some(StoreMutation::UpdateNode {
            node_id: id.clone(),
            patch: NodePatch::position(*position),
        }),
        _ => None,
    }
}

/// The store mutation an edge change propagates, if any. Only removals do.
pub fn propagated_edge_mutation(change: &EdgeChange) -> Option<StoreMutation> {
    match change {
        EdgeChange::Remove { id } => Some(StoreMutation::RemoveEdge { edge_id: id.clone() }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<Node> {
        vec![
            Node::new("1", Position::new(0.0, 0.0)),
            Node::new("2", Position::new(10.0, 10.0)),
        ]
    }

    #[test]
    fn test_only_remove_and_position_propagate() {
        let p = Position::new(5.0, 6.0);
        assert_eq!(
            propagated_node_mutation(&NodeChange::Remove { id: "1".into() }),
            Some(StoreMutation::RemoveNode { node_id: "1".into() })
        );
        assert_eq!(
            propagated_node_mutation(&NodeChange::Position {
                id: "1".into(),
                position: Some(p),
                dragging: true,
            }),
            Some(StoreMutation::UpdateNode {
                node_id: "1".into(),
                patch: NodePatch::position(p),
            })
        );
        assert_eq!(
            propagated_node_mutation(&NodeChange::Position {
                id: "1".into(),
                position: None,
                dragging: false,
            }),
            None
        );
        assert_eq!(
            propagated_node_mutation(&NodeChange::Select {
                id: "1".into(),
                selected: true,
            }),
            None
        );
        assert_eq!(
            propagated_node_mutation(&NodeChange::Add {
                node: Node::new("3", p),
            }),
            None
        );
    }

    #[test]
    fn test_edge_allow_list() {
        assert_eq!(
            propagated_edge_mutation(&EdgeChange::Remove { id: "e".into() }),
            Some(StoreMutation::RemoveEdge { edge_id: "e".into() })
        );
        assert_eq!(
            propagated_edge_mutation(&EdgeChange::Select {
                id: "e".into(),
                selected: true,
            }),
            None
        );
    }

    #[test]
    fn test_apply_node_changes() {
        let mut ns = nodes();
        let mut es = vec![Edge::new("e1-2", "1", "2")];

        apply_node_changes(
            &[
                NodeChange::Position {
                    id: "2".into(),
                    position: Some(Position::new(99.0, 1.0)),
                    dragging: true,
                },
                NodeChange::Select {
                    id: "2".into(),
                    selected: true,
                },
                NodeChange::Remove { id: "1".into() },
            ],
            &mut ns,
            &mut es,
        );

        assert_eq!(ns.len(), 1);
        assert_eq!(ns[0].position, Position::new(99.0, 1.0));
        assert!(ns[0].selected);
        assert!(es.is_empty());
    }

    #[test]
    fn test_change_wire_format() {
        let change: NodeChange =
            serde_json::from_str(r#"{"type":"position","id":"1","position":{"x":1,"y":2}}"#)
                .unwrap();
        assert_eq!(change.id(), "1");
        assert!(matches!(
            change,
            NodeChange::Position {
                position: Some(_),
                dragging: false,
                ..
            }
        ));
    }
}

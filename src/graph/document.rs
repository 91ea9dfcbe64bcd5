//! Versioned document round-trip.
//!
//! The document is carrier data for the embedding editor's persistence
//! layer: a flat, schema-versioned listing of nodes, sockets, wires and
//! frames. Loading rebuilds the derived adjacency indexes and validates, so
//! a corrupt document can never produce an inconsistent graph value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Frame, Graph, GraphError, GraphId, Node, Socket, Wire};

/// Schema version written by [Graph::to_document].
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Serializable snapshot of a [Graph].
pub struct GraphDocument {
    /// Schema version, checked on load.
    pub version: u32,
    /// Identifier of the serialized graph.
    pub graph_id: GraphId,
    /// Nodes in insertion order.
    pub nodes: Vec<Node>,
    /// Sockets in insertion order.
    pub sockets: Vec<Socket>,
    /// Wires in insertion order.
    pub wires: Vec<Wire>,
    /// Frames in insertion order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Frame>,
}

#[derive(Debug, Error)]
/// Failure to turn a document back into a graph.
pub enum DocumentError {
    /// The document was written by an unknown schema version.
    #[error("unsupported document version {0}, expected {DOCUMENT_VERSION}")]
    UnsupportedVersion(u32),
    /// The document describes a structurally invalid graph.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The document text is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GraphDocument {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from a JSON string. The result still needs
    /// [Graph::from_document] to become a usable graph.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl Graph {
    /// Snapshot the graph into a document.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            version: DOCUMENT_VERSION,
            graph_id: self.graph_id.clone(),
            nodes: self.nodes.values().cloned().collect(),
            sockets: self.sockets.values().cloned().collect(),
            wires: self.wires.values().cloned().collect(),
            frames: self.frames.values().cloned().collect(),
        }
    }

    /// Rebuild a graph from a document, restoring the adjacency indexes from
    /// the wire list and validating the result.
    pub fn from_document(document: GraphDocument) -> Result<Self, DocumentError> {
        if document.version != DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion(document.version));
        }

        let mut graph = Graph::new(document.graph_id);
        for node in document.nodes {
            graph.nodes.insert(node.id.clone(), node);
        }
        for socket in document.sockets {
            graph.sockets.insert(socket.id.clone(), socket);
        }
        for frame in document.frames {
            graph.frames.insert(frame.id.clone(), frame);
        }
        for wire in document.wires {
            let (from, to) = graph.wire_nodes(&wire)?;
            graph.outgoing.entry(from.clone()).or_default().insert(to.clone());
            graph.incoming.entry(to).or_default().insert(from);
            graph.wires.insert(wire.id.clone(), wire);
        }

        graph.validate()?;

        Ok(graph)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::ops::test::two_node_graph;
    use crate::graph::{FrameSize, Position};

    fn frame(id: &str) -> Frame {
        Frame {
            id: id.into(),
            title: "group".into(),
            position: Position::new(10., 20.),
            size: FrameSize {
                width: 300.,
                height: 200.,
            },
            collapsed: false,
            exposed_inputs: vec![],
            exposed_outputs: vec!["a.out".into()],
        }
    }

    #[test]
    fn document_round_trip_preserves_everything() {
        let graph = two_node_graph()
            .add_frame(frame("f"))
            .unwrap()
            .update_param(&"a".into(), "value", Some(serde_json::json!(2.0)))
            .unwrap();

        let restored = Graph::from_document(graph.to_document()).unwrap();
        assert_eq!(restored, graph);

        // And through the JSON text form as well.
        let text = graph.to_document().to_json().unwrap();
        let reparsed = Graph::from_document(GraphDocument::from_json(&text).unwrap()).unwrap();
        assert_eq!(reparsed, graph);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let document = GraphDocument {
            version: 99,
            ..two_node_graph().to_document()
        };

        assert!(matches!(
            Graph::from_document(document),
            Err(DocumentError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn corrupt_document_fails_validation() {
        let mut document = two_node_graph().to_document();
        // Point a wire at a socket that does not exist.
        document.wires[0].to_socket_id = "ghost".into();

        assert!(matches!(
            Graph::from_document(document),
            Err(DocumentError::Graph(GraphError::MissingSocket(id))) if id == "ghost".into()
        ));
    }
}

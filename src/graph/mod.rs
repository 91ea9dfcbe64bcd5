//! Graph kernel: the persistent graph value and its building blocks.
//!
//! A [Graph] is an immutable value owning nodes, sockets, wires and frames by
//! id, plus two derived adjacency indexes kept in lockstep with the wires.
//! Mutation happens exclusively through the pure operations in [ops]: each
//! takes the graph by reference and returns a fresh, fully-consistent value
//! or a typed [GraphError], never a half-edited graph.

pub mod document;
pub mod ops;
pub mod topology;
pub mod validate;

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::SocketTypeId;

macro_rules! identifiers {
    { $($(#[$attr:meta])* $name:ident),+ $(,)? } => {
        $(
            #[derive(
                Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
                Serialize, Deserialize, derive_more::Display,
            )]
            #[serde(transparent)]
            $(#[$attr])*
            pub struct $name(String);

            impl $name {
                /// View the identifier as a string slice.
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }
        )+
    };
}

identifiers! {
    /// Identifier of a whole [Graph].
    GraphId,
    /// Identifier of a [Node].
    NodeId,
    /// Identifier of a [Socket].
    SocketId,
    /// Identifier of a [Wire].
    WireId,
    /// Identifier of a [Frame].
    FrameId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
/// On-canvas position of a node or frame. Carrier data for the editor; the
/// kernel never interprets it.
pub struct Position {
    #[allow(missing_docs)]
    pub x: f64,
    #[allow(missing_docs)]
    pub y: f64,
}

impl Position {
    /// Shorthand constructor.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
/// On-canvas extent of a [Frame].
pub struct FrameSize {
    #[allow(missing_docs)]
    pub width: f64,
    #[allow(missing_docs)]
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Which side of a node a socket sits on.
pub enum SocketDirection {
    /// Value flows into the node.
    Input,
    /// Value flows out of the node.
    Output,
}

impl std::fmt::Display for SocketDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// A typed endpoint on a node through which values flow.
pub struct Socket {
    /// Caller-assigned identifier, immutable for the socket's lifetime.
    pub id: SocketId,
    /// Owning node.
    pub node_id: NodeId,
    /// Key the execution engine matches against node definitions.
    pub name: String,
    /// Human-readable label, display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Input or output side.
    pub direction: SocketDirection,
    /// Data type from the registry.
    pub data_type: SocketTypeId,
    /// Whether evaluation reports a missing-input error when the socket is
    /// unconnected and has no default.
    #[serde(default)]
    pub required: bool,
    /// Value used when no wire drives the socket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Connection-count floor, checked by full validation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_connections: Option<u32>,
    /// Connection-count cap. Unset means 1 for inputs, unbounded for outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    /// Display hints for the socket label, not semantic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_settings: Option<Value>,
    /// Free-form display metadata, not semantic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Socket {
    /// Effective connection cap: the explicit cap if set, otherwise 1 for
    /// inputs and unbounded (`None`) for outputs.
    pub fn connection_cap(&self) -> Option<u32> {
        match (self.max_connections, self.direction) {
            (Some(max), _) => Some(max),
            (None, SocketDirection::Input) => Some(1),
            (None, SocketDirection::Output) => None,
        }
    }

    /// Effective connection floor: the explicit floor if set, otherwise 0.
    pub fn connection_floor(&self) -> u32 {
        self.min_connections.unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// A user-authored computation wired at typed sockets.
pub struct Node {
    /// Caller-assigned identifier.
    pub id: NodeId,
    /// Resolver key naming the node's definition; opaque to the kernel.
    pub kind: String,
    /// On-canvas position.
    pub position: Position,
    /// Named parameters handed to the node's compute function.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
    /// Input socket layout, in display order.
    pub inputs: Vec<SocketId>,
    /// Output socket layout, in display order.
    pub outputs: Vec<SocketId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// A directed edge from one output socket to one input socket.
pub struct Wire {
    /// Caller-assigned identifier.
    pub id: WireId,
    /// Source output socket.
    pub from_socket_id: SocketId,
    /// Destination input socket.
    pub to_socket_id: SocketId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// A grouping rectangle over nodes. Purely organizational: the kernel stores
/// frames but never routes execution through them, and the exposed socket
/// lists are allowed to dangle after node removal.
pub struct Frame {
    /// Caller-assigned identifier.
    pub id: FrameId,
    /// Title shown on the frame header.
    pub title: String,
    /// On-canvas position.
    pub position: Position,
    /// On-canvas extent.
    pub size: FrameSize,
    /// Whether the frame is drawn collapsed.
    #[serde(default)]
    pub collapsed: bool,
    /// Input sockets surfaced on the collapsed frame.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exposed_inputs: Vec<SocketId>,
    /// Output sockets surfaced on the collapsed frame.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exposed_outputs: Vec<SocketId>,
}

#[derive(Clone, Debug, PartialEq)]
/// The typed multigraph value. See the [module docs](self) for the mutation
/// discipline; [validate](Graph::validate) re-checks every invariant.
pub struct Graph {
    /// Caller-assigned identifier of the graph itself.
    pub graph_id: GraphId,
    /// Nodes in insertion order.
    pub nodes: IndexMap<NodeId, Node>,
    /// All sockets of all nodes.
    pub sockets: IndexMap<SocketId, Socket>,
    /// All wires.
    pub wires: IndexMap<WireId, Wire>,
    /// All frames.
    pub frames: IndexMap<FrameId, Frame>,

    /// Derived: nodes reachable over one wire, per source node.
    pub(crate) outgoing: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Derived: nodes reaching this node over one wire, per destination node.
    pub(crate) incoming: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

#[derive(Clone, Debug, PartialEq, Error)]
/// Structural failure of a kernel operation. The input graph is always left
/// untouched when one of these is produced.
pub enum GraphError {
    /// A node with this id already exists.
    #[error("duplicate node `{0}`")]
    DuplicateNode(NodeId),
    /// A socket with this id already exists.
    #[error("duplicate socket `{0}`")]
    DuplicateSocket(SocketId),
    /// A wire with this id already exists.
    #[error("duplicate wire `{0}`")]
    DuplicateWire(WireId),
    /// A frame with this id already exists.
    #[error("duplicate frame `{0}`")]
    DuplicateFrame(FrameId),

    /// No node with this id.
    #[error("missing node `{0}`")]
    MissingNode(NodeId),
    /// No socket with this id.
    #[error("missing socket `{0}`")]
    MissingSocket(SocketId),
    /// No wire with this id.
    #[error("missing wire `{0}`")]
    MissingWire(WireId),
    /// No frame with this id.
    #[error("missing frame `{0}`")]
    MissingFrame(FrameId),

    /// A socket claims an owner that does not match the node it was declared
    /// with.
    #[error("socket `{socket_id}` belongs to node `{found}`, expected `{expected}`")]
    SocketNodeMismatch {
        /// Offending socket.
        socket_id: SocketId,
        /// Node the socket was declared with.
        expected: NodeId,
        /// Node the socket claims as owner.
        found: NodeId,
    },
    /// A node's input/output layout does not exactly match its declared
    /// socket set.
    #[error("node `{node_id}` socket layout does not match socket `{socket_id}`")]
    NodeSocketMismatch {
        /// Offending node.
        node_id: NodeId,
        /// Socket missing from or foreign to the layout.
        socket_id: SocketId,
    },
    /// A socket is on the wrong side for its role in a wire.
    #[error("socket `{socket_id}` is an {found}, expected an {expected}")]
    InvalidSocketDirection {
        /// Offending socket.
        socket_id: SocketId,
        /// Direction the operation requires.
        expected: SocketDirection,
        /// Direction the socket actually has.
        found: SocketDirection,
    },
    /// The derived adjacency indexes disagree with the wires.
    #[error("adjacency indexes disagree with wires between `{from}` and `{to}`")]
    AdjacencyMismatch {
        /// Source node of the inconsistent edge.
        from: NodeId,
        /// Destination node of the inconsistent edge.
        to: NodeId,
    },

    /// The registry rejects this (from, to) type pairing.
    #[error("socket types are incompatible: `{from}` cannot feed `{to}`")]
    IncompatibleSocketTypes {
        /// Type of the source output socket.
        from: SocketTypeId,
        /// Type of the destination input socket.
        to: SocketTypeId,
    },
    /// The wire would push a socket past its connection cap.
    #[error("socket `{socket_id}` already has its maximum of {limit} connection(s)")]
    SocketConnectionLimitExceeded {
        /// Saturated socket.
        socket_id: SocketId,
        /// Effective cap.
        limit: u32,
    },
    /// A socket has fewer connections than its declared floor.
    #[error("socket `{socket_id}` has fewer than {minimum} connection(s)")]
    SocketConnectionBelowMin {
        /// Under-connected socket.
        socket_id: SocketId,
        /// Effective floor.
        minimum: u32,
    },
    /// A socket declares a floor above its cap.
    #[error("socket `{socket_id}` declares an impossible connection range")]
    InvalidSocketConnectionLimit {
        /// Offending socket.
        socket_id: SocketId,
    },
    /// The wire's endpoints share a node.
    #[error("wire endpoints both belong to node `{node_id}`")]
    SelfLoop {
        /// Node at both ends.
        node_id: NodeId,
    },
    /// The operation would close, or the graph contains, a directed cycle.
    /// The path starts and ends at the same node.
    #[error("cycle through {}", path_display(.path))]
    CycleDetected {
        /// Offending node path, first and last entries equal.
        path: Vec<NodeId>,
    },
}

fn path_display(path: &[NodeId]) -> String {
    path.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl Graph {
    /// Look up a node, failing with [GraphError::MissingNode].
    pub fn node(&self, id: &NodeId) -> Result<&Node, GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::MissingNode(id.clone()))
    }

    /// Look up a socket, failing with [GraphError::MissingSocket].
    pub fn socket(&self, id: &SocketId) -> Result<&Socket, GraphError> {
        self.sockets
            .get(id)
            .ok_or_else(|| GraphError::MissingSocket(id.clone()))
    }

    /// Look up a wire, failing with [GraphError::MissingWire].
    pub fn wire(&self, id: &WireId) -> Result<&Wire, GraphError> {
        self.wires
            .get(id)
            .ok_or_else(|| GraphError::MissingWire(id.clone()))
    }

    /// Look up a frame, failing with [GraphError::MissingFrame].
    pub fn frame(&self, id: &FrameId) -> Result<&Frame, GraphError> {
        self.frames
            .get(id)
            .ok_or_else(|| GraphError::MissingFrame(id.clone()))
    }

    /// Wires touching the given socket on either end.
    pub fn wires_at_socket<'a>(
        &'a self,
        socket_id: &'a SocketId,
    ) -> impl Iterator<Item = &'a Wire> + 'a {
        self.wires
            .values()
            .filter(move |wire| &wire.from_socket_id == socket_id || &wire.to_socket_id == socket_id)
    }

    /// Wires terminating at the given input socket.
    pub fn wires_into_socket<'a>(
        &'a self,
        socket_id: &'a SocketId,
    ) -> impl Iterator<Item = &'a Wire> + 'a {
        self.wires
            .values()
            .filter(move |wire| &wire.to_socket_id == socket_id)
    }

    /// Number of wires incident to the given socket.
    pub fn connection_count(&self, socket_id: &SocketId) -> usize {
        self.wires_at_socket(socket_id).count()
    }

    /// Wires with either endpoint on a socket of the given node, in wire
    /// insertion order.
    pub fn incident_wires(&self, node_id: &NodeId) -> Vec<&Wire> {
        self.wires
            .values()
            .filter(|wire| {
                [&wire.from_socket_id, &wire.to_socket_id]
                    .into_iter()
                    .any(|socket_id| {
                        self.sockets
                            .get(socket_id)
                            .is_some_and(|socket| &socket.node_id == node_id)
                    })
            })
            .collect()
    }

    /// Resolve a wire's endpoints to the owning (source, destination) nodes.
    pub fn wire_nodes(&self, wire: &Wire) -> Result<(NodeId, NodeId), GraphError> {
        let from = self.socket(&wire.from_socket_id)?.node_id.clone();
        let to = self.socket(&wire.to_socket_id)?.node_id.clone();
        Ok((from, to))
    }

    /// Nodes directly downstream of the given node.
    pub fn outgoing_neighbors<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.outgoing.get(id).into_iter().flatten()
    }

    /// Nodes directly upstream of the given node.
    pub fn incoming_neighbors<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.incoming.get(id).into_iter().flatten()
    }
}

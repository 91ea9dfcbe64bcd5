//! Whole-graph validation and the non-fatal warning pass.
//!
//! [Graph::validate] re-checks every structural invariant from scratch; it
//! exists so tests and document loading can prove a graph consistent without
//! trusting the operation that produced it. [Graph::collect_warnings]
//! reports conditions an editor surfaces as badges; warnings never fail
//! validation.

use std::collections::{BTreeMap, BTreeSet};

use super::{Graph, GraphError, NodeId, SocketDirection, SocketId, WireId};
use crate::types::{self, SocketTypeId};

#[derive(Clone, Debug, PartialEq)]
/// Non-fatal graph condition.
pub enum Warning {
    /// An input socket is required, has no default, and no incoming wire.
    MissingRequiredInput {
        /// Node owning the socket.
        node_id: NodeId,
        /// The unconnected socket.
        socket_id: SocketId,
        /// The socket's definition key.
        socket_name: String,
    },
    /// A wire whose endpoint types no longer match, typically after a socket
    /// reshape retyped one end.
    IncompatibleSocketTypes {
        /// The stale wire.
        wire_id: WireId,
        /// Type of the source output socket.
        from: SocketTypeId,
        /// Type of the destination input socket.
        to: SocketTypeId,
    },
    /// A node with no connected socket on either side.
    UnusedNode {
        /// The disconnected node.
        node_id: NodeId,
    },
}

impl Graph {
    /// Check every structural invariant, returning the first violation.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.validate_sockets()?;
        self.validate_node_layouts()?;
        self.validate_wires()?;
        self.validate_connection_counts()?;
        self.validate_adjacency()?;

        if let Some(path) = self.detect_cycle() {
            return Err(GraphError::CycleDetected { path });
        }

        Ok(())
    }

    fn validate_sockets(&self) -> Result<(), GraphError> {
        for socket in self.sockets.values() {
            let node = self.node(&socket.node_id)?;

            let layout = match socket.direction {
                SocketDirection::Input => &node.inputs,
                SocketDirection::Output => &node.outputs,
            };
            if !layout.contains(&socket.id) {
                return Err(GraphError::NodeSocketMismatch {
                    node_id: node.id.clone(),
                    socket_id: socket.id.clone(),
                });
            }

            if let (Some(min), Some(max)) = (socket.min_connections, socket.max_connections) {
                if min > max {
                    return Err(GraphError::InvalidSocketConnectionLimit {
                        socket_id: socket.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_node_layouts(&self) -> Result<(), GraphError> {
        for node in self.nodes.values() {
            let mut seen = BTreeSet::new();
            for (layout, expected) in [
                (&node.inputs, SocketDirection::Input),
                (&node.outputs, SocketDirection::Output),
            ] {
                for socket_id in layout {
                    let socket = self.socket(socket_id)?;
                    if socket.node_id != node.id {
                        return Err(GraphError::SocketNodeMismatch {
                            socket_id: socket_id.clone(),
                            expected: node.id.clone(),
                            found: socket.node_id.clone(),
                        });
                    }
                    if socket.direction != expected {
                        return Err(GraphError::InvalidSocketDirection {
                            socket_id: socket_id.clone(),
                            expected,
                            found: socket.direction,
                        });
                    }
                    if !seen.insert(socket_id) {
                        return Err(GraphError::NodeSocketMismatch {
                            node_id: node.id.clone(),
                            socket_id: socket_id.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn validate_wires(&self) -> Result<(), GraphError> {
        for wire in self.wires.values() {
            let from = self.socket(&wire.from_socket_id)?;
            let to = self.socket(&wire.to_socket_id)?;

            for (socket, expected) in
                [(from, SocketDirection::Output), (to, SocketDirection::Input)]
            {
                if socket.direction != expected {
                    return Err(GraphError::InvalidSocketDirection {
                        socket_id: socket.id.clone(),
                        expected,
                        found: socket.direction,
                    });
                }
            }

            if !types::is_compatible(from.data_type, to.data_type) {
                return Err(GraphError::IncompatibleSocketTypes {
                    from: from.data_type,
                    to: to.data_type,
                });
            }

            if from.node_id == to.node_id {
                return Err(GraphError::SelfLoop {
                    node_id: from.node_id.clone(),
                });
            }
        }

        Ok(())
    }

    fn validate_connection_counts(&self) -> Result<(), GraphError> {
        for socket in self.sockets.values() {
            let count = self.connection_count(&socket.id) as u32;

            if let Some(cap) = socket.connection_cap() {
                if count > cap {
                    return Err(GraphError::SocketConnectionLimitExceeded {
                        socket_id: socket.id.clone(),
                        limit: cap,
                    });
                }
            }

            let floor = socket.connection_floor();
            if count < floor {
                return Err(GraphError::SocketConnectionBelowMin {
                    socket_id: socket.id.clone(),
                    minimum: floor,
                });
            }
        }

        Ok(())
    }

    fn validate_adjacency(&self) -> Result<(), GraphError> {
        let mut expected: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for wire in self.wires.values() {
            let (from, to) = self.wire_nodes(wire)?;
            expected.entry(from).or_default().insert(to);
        }

        let mut expected_incoming: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for (from, targets) in &expected {
            for to in targets {
                expected_incoming
                    .entry(to.clone())
                    .or_default()
                    .insert(from.clone());
            }
        }

        for (stored, wanted) in [
            (&self.outgoing, &expected),
            (&self.incoming, &expected_incoming),
        ] {
            if stored != wanted {
                let (from, to) = first_difference(stored, wanted);
                return Err(GraphError::AdjacencyMismatch { from, to });
            }
        }

        Ok(())
    }

    /// Report non-fatal conditions, in graph iteration order.
    pub fn collect_warnings(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();

        for socket in self.sockets.values() {
            if socket.direction == SocketDirection::Input
                && socket.required
                && socket.default_value.is_none()
                && self.wires_into_socket(&socket.id).next().is_none()
            {
                warnings.push(Warning::MissingRequiredInput {
                    node_id: socket.node_id.clone(),
                    socket_id: socket.id.clone(),
                    socket_name: socket.name.clone(),
                });
            }
        }

        for wire in self.wires.values() {
            if let (Ok(from), Ok(to)) = (
                self.socket(&wire.from_socket_id),
                self.socket(&wire.to_socket_id),
            ) {
                if !types::is_compatible(from.data_type, to.data_type) {
                    warnings.push(Warning::IncompatibleSocketTypes {
                        wire_id: wire.id.clone(),
                        from: from.data_type,
                        to: to.data_type,
                    });
                }
            }
        }

        for node in self.nodes.values() {
            if self.incident_wires(&node.id).is_empty() {
                warnings.push(Warning::UnusedNode {
                    node_id: node.id.clone(),
                });
            }
        }

        warnings
    }
}

/// Locate one (from, to) pair present on exactly one side of an adjacency
/// comparison, for error reporting.
fn first_difference(
    stored: &BTreeMap<NodeId, BTreeSet<NodeId>>,
    wanted: &BTreeMap<NodeId, BTreeSet<NodeId>>,
) -> (NodeId, NodeId) {
    for (from, targets) in stored {
        let other = wanted.get(from);
        for to in targets {
            if !other.is_some_and(|set| set.contains(to)) {
                return (from.clone(), to.clone());
            }
        }
    }
    for (from, targets) in wanted {
        let other = stored.get(from);
        for to in targets {
            if !other.is_some_and(|set| set.contains(to)) {
                return (from.clone(), to.clone());
            }
        }
    }

    (NodeId::default(), NodeId::default())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::ops::test::{node, socket, two_node_graph};
    use crate::graph::Socket;

    #[test]
    fn graphs_built_from_operations_validate() {
        let graph = two_node_graph();
        assert_eq!(graph.validate(), Ok(()));

        let graph = graph.remove_node(&"a".into()).unwrap();
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn tampered_adjacency_is_caught() {
        let mut graph = two_node_graph();
        graph
            .outgoing
            .entry("b".into())
            .or_default()
            .insert("a".into());

        assert_eq!(
            graph.validate(),
            Err(GraphError::AdjacencyMismatch {
                from: "b".into(),
                to: "a".into(),
            })
        );
    }

    #[test]
    fn connection_floor_is_checked_by_validation_only() {
        // An unconnected input with a floor of 1: legal to build, flagged by
        // full validation.
        let graph = Graph::new("g".into())
            .add_node(
                node("a", "pass", &["a.in"], &[]),
                vec![Socket {
                    min_connections: Some(1),
                    ..socket(
                        "a.in",
                        "a",
                        "in",
                        SocketDirection::Input,
                        SocketTypeId::Float,
                    )
                }],
            )
            .unwrap();

        assert_eq!(
            graph.validate(),
            Err(GraphError::SocketConnectionBelowMin {
                socket_id: "a.in".into(),
                minimum: 1,
            })
        );
    }

    #[test]
    fn warnings_cover_required_and_unused() {
        let graph = two_node_graph()
            .add_node(
                node("lone", "const", &[], &["lone.out"]),
                vec![socket(
                    "lone.out",
                    "lone",
                    "out",
                    SocketDirection::Output,
                    SocketTypeId::Float,
                )],
            )
            .unwrap()
            .update_node_io(
                node("b", "pass", &["b.in", "b.req"], &["b.out"]),
                vec![
                    socket("b.in", "b", "in", SocketDirection::Input, SocketTypeId::Float),
                    Socket {
                        required: true,
                        ..socket("b.req", "b", "req", SocketDirection::Input, SocketTypeId::Float)
                    },
                    socket("b.out", "b", "out", SocketDirection::Output, SocketTypeId::Float),
                ],
            )
            .unwrap();

        assert_eq!(
            graph.collect_warnings(),
            vec![
                Warning::MissingRequiredInput {
                    node_id: "b".into(),
                    socket_id: "b.req".into(),
                    socket_name: "req".into(),
                },
                Warning::UnusedNode {
                    node_id: "lone".into(),
                },
            ]
        );
        // Warnings never fail validation.
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn retyped_wired_socket_goes_stale() {
        // A reshape may retype a wired socket; the wire is then reported as
        // stale by the warning pass and rejected by full validation.
        let graph = two_node_graph()
            .update_node_io(
                node("b", "pass", &["b.in"], &["b.out"]),
                vec![
                    socket("b.in", "b", "in", SocketDirection::Input, SocketTypeId::Mat4),
                    socket("b.out", "b", "out", SocketDirection::Output, SocketTypeId::Float),
                ],
            )
            .unwrap();

        assert!(graph.collect_warnings().contains(
            &Warning::IncompatibleSocketTypes {
                wire_id: "w1".into(),
                from: SocketTypeId::Float,
                to: SocketTypeId::Mat4,
            }
        ));
        assert_eq!(
            graph.validate(),
            Err(GraphError::IncompatibleSocketTypes {
                from: SocketTypeId::Float,
                to: SocketTypeId::Mat4,
            })
        );
    }
}

//! Reversible graph mutations.
//!
//! A [Command] is plain data describing one atomic change. Applying one
//! dispatches to the corresponding kernel operation; every command knows its
//! inverse (a command sequence that undoes it) and whether it is a no-op.
//! Commands that destroy information ([Command::RemoveNode],
//! [Command::ReplaceNodeIo], ...) are built through capture constructors
//! that snapshot the doomed pieces from the live graph first.

pub mod history;

use log::debug;
use serde_json::Value;

use crate::graph::{
    Frame, FrameId, Graph, GraphError, Node, NodeId, Position, Socket, Wire, WireId,
};

#[derive(Clone, Debug, PartialEq)]
/// A node together with its full socket set, as captured before or after an
/// IO reshape.
pub struct NodeIo {
    /// The node record.
    pub node: Node,
    /// Every socket of the node, inputs before outputs.
    pub sockets: Vec<Socket>,
}

impl NodeIo {
    /// Snapshot a node and its sockets from a graph.
    pub fn capture(graph: &Graph, node_id: &NodeId) -> Result<Self, GraphError> {
        let node = graph.node(node_id)?.clone();
        let sockets = node
            .inputs
            .iter()
            .chain(&node.outputs)
            .map(|socket_id| graph.socket(socket_id).map(Socket::clone))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { node, sockets })
    }
}

#[derive(Clone, Debug, PartialEq)]
/// One reversible graph mutation.
pub enum Command {
    /// Add a node with its sockets.
    AddNode {
        /// The node to add.
        node: Node,
        /// Its full socket set.
        sockets: Vec<Socket>,
    },
    /// Remove a node; carries everything needed to restore it.
    RemoveNode {
        /// The removed node.
        node: Node,
        /// Its full socket set.
        sockets: Vec<Socket>,
        /// Incident wires removed along with it.
        wires: Vec<Wire>,
    },
    /// Add a wire.
    AddWire {
        /// The wire to add.
        wire: Wire,
    },
    /// Remove a wire.
    RemoveWire {
        /// The removed wire.
        wire: Wire,
    },
    /// Reposition nodes.
    MoveNodes {
        /// Positions before the move.
        before: Vec<(NodeId, Position)>,
        /// Positions after the move.
        after: Vec<(NodeId, Position)>,
    },
    /// Add a frame.
    AddFrame {
        /// The frame to add.
        frame: Frame,
    },
    /// Remove a frame.
    RemoveFrame {
        /// The removed frame.
        frame: Frame,
    },
    /// Reposition frames.
    MoveFrames {
        /// Positions before the move.
        before: Vec<(FrameId, Position)>,
        /// Positions after the move.
        after: Vec<(FrameId, Position)>,
    },
    /// Replace a frame's attributes.
    UpdateFrame {
        /// Frame before the change.
        before: Frame,
        /// Frame after the change.
        after: Frame,
    },
    /// Set or clear one node parameter.
    UpdateParam {
        /// Node owning the parameter.
        node_id: NodeId,
        /// Parameter key.
        key: String,
        /// Previous value, `None` when the key was absent.
        before: Option<Value>,
        /// New value, `None` to clear the key.
        after: Option<Value>,
    },
    /// Reshape a node's IO non-destructively (wired sockets survive).
    UpdateNodeIo {
        /// Layout before the reshape.
        before: NodeIo,
        /// Layout after the reshape.
        after: NodeIo,
    },
    /// Reshape a node's IO destructively; invalidated wires are captured at
    /// construction time so the inverse can restore them.
    ReplaceNodeIo {
        /// Layout before the reshape.
        before: NodeIo,
        /// Layout after the reshape.
        after: NodeIo,
        /// Wires the reshape invalidates.
        removed_wires: Vec<Wire>,
    },
}

impl Command {
    /// Capture constructor for [Command::RemoveNode].
    pub fn remove_node(graph: &Graph, node_id: &NodeId) -> Result<Self, GraphError> {
        let NodeIo { node, sockets } = NodeIo::capture(graph, node_id)?;
        let wires = graph
            .incident_wires(node_id)
            .into_iter()
            .cloned()
            .collect();

        Ok(Self::RemoveNode {
            node,
            sockets,
            wires,
        })
    }

    /// Capture constructor for [Command::RemoveWire].
    pub fn remove_wire(graph: &Graph, wire_id: &WireId) -> Result<Self, GraphError> {
        Ok(Self::RemoveWire {
            wire: graph.wire(wire_id)?.clone(),
        })
    }

    /// Capture constructor for [Command::RemoveFrame].
    pub fn remove_frame(graph: &Graph, frame_id: &FrameId) -> Result<Self, GraphError> {
        Ok(Self::RemoveFrame {
            frame: graph.frame(frame_id)?.clone(),
        })
    }

    /// Capture constructor for [Command::MoveNodes].
    pub fn move_nodes(graph: &Graph, moves: &[(NodeId, Position)]) -> Result<Self, GraphError> {
        let before = moves
            .iter()
            .map(|(node_id, _)| Ok((node_id.clone(), graph.node(node_id)?.position)))
            .collect::<Result<Vec<_>, GraphError>>()?;

        Ok(Self::MoveNodes {
            before,
            after: moves.to_vec(),
        })
    }

    /// Capture constructor for [Command::MoveFrames].
    pub fn move_frames(graph: &Graph, moves: &[(FrameId, Position)]) -> Result<Self, GraphError> {
        let before = moves
            .iter()
            .map(|(frame_id, _)| Ok((frame_id.clone(), graph.frame(frame_id)?.position)))
            .collect::<Result<Vec<_>, GraphError>>()?;

        Ok(Self::MoveFrames {
            before,
            after: moves.to_vec(),
        })
    }

    /// Capture constructor for [Command::UpdateFrame].
    pub fn update_frame(graph: &Graph, after: Frame) -> Result<Self, GraphError> {
        Ok(Self::UpdateFrame {
            before: graph.frame(&after.id)?.clone(),
            after,
        })
    }

    /// Capture constructor for [Command::UpdateParam].
    pub fn update_param(
        graph: &Graph,
        node_id: &NodeId,
        key: &str,
        after: Option<Value>,
    ) -> Result<Self, GraphError> {
        Ok(Self::UpdateParam {
            before: graph.node(node_id)?.params.get(key).cloned(),
            node_id: node_id.clone(),
            key: key.to_string(),
            after,
        })
    }

    /// Capture constructor for [Command::UpdateNodeIo].
    pub fn update_node_io(graph: &Graph, node: Node, sockets: Vec<Socket>) -> Result<Self, GraphError> {
        Ok(Self::UpdateNodeIo {
            before: NodeIo::capture(graph, &node.id)?,
            after: NodeIo { node, sockets },
        })
    }

    /// Capture constructor for [Command::ReplaceNodeIo]: inspects the graph
    /// for wires the reshape will invalidate.
    pub fn replace_node_io(
        graph: &Graph,
        node: Node,
        sockets: Vec<Socket>,
    ) -> Result<Self, GraphError> {
        let before = NodeIo::capture(graph, &node.id)?;
        let removed_wires = graph
            .wires_invalidated_by_reshape(&node.id, &sockets)?
            .into_iter()
            .cloned()
            .collect();

        Ok(Self::ReplaceNodeIo {
            before,
            after: NodeIo { node, sockets },
            removed_wires,
        })
    }

    /// Dispatch to the kernel operation that performs the change.
    pub fn apply(&self, graph: &Graph) -> Result<Graph, GraphError> {
        debug!("applying {}", self.kind_name());

        match self {
            Self::AddNode { node, sockets } => graph.add_node(node.clone(), sockets.clone()),
            Self::RemoveNode { node, .. } => graph.remove_node(&node.id),
            Self::AddWire { wire } => graph.add_wire(wire.clone()),
            Self::RemoveWire { wire } => graph.remove_wire(&wire.id),
            Self::MoveNodes { after, .. } => graph.move_nodes(after),
            Self::AddFrame { frame } => graph.add_frame(frame.clone()),
            Self::RemoveFrame { frame } => graph.remove_frame(&frame.id),
            Self::MoveFrames { after, .. } => graph.move_frames(after),
            Self::UpdateFrame { after, .. } => graph.update_frame(after.clone()),
            Self::UpdateParam {
                node_id,
                key,
                after,
                ..
            } => graph.update_param(node_id, key, after.clone()),
            Self::UpdateNodeIo { after, .. } => {
                graph.update_node_io(after.node.clone(), after.sockets.clone())
            }
            // The stored `removed_wires` list is authoritative for the
            // inverse only; the reshape re-checks incidence against the live
            // graph and reconciles.
            Self::ReplaceNodeIo { after, .. } => graph
                .replace_node_io(after.node.clone(), after.sockets.clone())
                .map(|(applied, _removed)| applied),
        }
    }

    /// The command sequence that undoes this command, in application order.
    pub fn inverse(&self) -> Vec<Self> {
        match self {
            Self::AddNode { node, sockets } => vec![Self::RemoveNode {
                node: node.clone(),
                sockets: sockets.clone(),
                // Adding a node adds no wires, so its inverse removes none.
                wires: Vec::new(),
            }],
            Self::RemoveNode {
                node,
                sockets,
                wires,
            } => std::iter::once(Self::AddNode {
                node: node.clone(),
                sockets: sockets.clone(),
            })
            .chain(wires.iter().map(|wire| Self::AddWire { wire: wire.clone() }))
            .collect(),
            Self::AddWire { wire } => vec![Self::RemoveWire { wire: wire.clone() }],
            Self::RemoveWire { wire } => vec![Self::AddWire { wire: wire.clone() }],
            Self::MoveNodes { before, after } => vec![Self::MoveNodes {
                before: after.clone(),
                after: before.clone(),
            }],
            Self::AddFrame { frame } => vec![Self::RemoveFrame {
                frame: frame.clone(),
            }],
            Self::RemoveFrame { frame } => vec![Self::AddFrame {
                frame: frame.clone(),
            }],
            Self::MoveFrames { before, after } => vec![Self::MoveFrames {
                before: after.clone(),
                after: before.clone(),
            }],
            Self::UpdateFrame { before, after } => vec![Self::UpdateFrame {
                before: after.clone(),
                after: before.clone(),
            }],
            Self::UpdateParam {
                node_id,
                key,
                before,
                after,
            } => vec![Self::UpdateParam {
                node_id: node_id.clone(),
                key: key.clone(),
                before: after.clone(),
                after: before.clone(),
            }],
            Self::UpdateNodeIo { before, after } => vec![Self::UpdateNodeIo {
                before: after.clone(),
                after: before.clone(),
            }],
            Self::ReplaceNodeIo {
                before,
                after,
                removed_wires,
            } => std::iter::once(Self::ReplaceNodeIo {
                before: after.clone(),
                after: before.clone(),
                removed_wires: Vec::new(),
            })
            .chain(
                removed_wires
                    .iter()
                    .map(|wire| Self::AddWire { wire: wire.clone() }),
            )
            .collect(),
        }
    }

    /// Whether applying the command would leave the graph unchanged. JSON
    /// comparison is structural and key-order-insensitive.
    pub fn is_noop(&self) -> bool {
        match self {
            Self::UpdateParam { before, after, .. } => before == after,
            Self::MoveNodes { before, after } => same_positions(before, after),
            Self::MoveFrames { before, after } => same_positions(before, after),
            Self::UpdateFrame { before, after } => before == after,
            Self::UpdateNodeIo { before, after } => before == after,
            Self::ReplaceNodeIo { before, after, .. } => before == after,
            _ => false,
        }
    }

    /// Whether the caller should mark the affected node dirty in its
    /// execution state after applying this command.
    pub fn affects_execution(&self) -> bool {
        matches!(
            self,
            Self::AddWire { .. }
                | Self::RemoveWire { .. }
                | Self::RemoveNode { .. }
                | Self::UpdateParam { .. }
                | Self::UpdateNodeIo { .. }
                | Self::ReplaceNodeIo { .. }
        )
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "add_node",
            Self::RemoveNode { .. } => "remove_node",
            Self::AddWire { .. } => "add_wire",
            Self::RemoveWire { .. } => "remove_wire",
            Self::MoveNodes { .. } => "move_nodes",
            Self::AddFrame { .. } => "add_frame",
            Self::RemoveFrame { .. } => "remove_frame",
            Self::MoveFrames { .. } => "move_frames",
            Self::UpdateFrame { .. } => "update_frame",
            Self::UpdateParam { .. } => "update_param",
            Self::UpdateNodeIo { .. } => "update_node_io",
            Self::ReplaceNodeIo { .. } => "replace_node_io",
        }
    }
}

/// Every (id, position) pair in `before` has an equal counterpart in
/// `after`, and vice versa; ordering is irrelevant.
fn same_positions<Id: Ord + Clone>(
    before: &[(Id, Position)],
    after: &[(Id, Position)],
) -> bool {
    let key = |moves: &[(Id, Position)]| {
        let mut sorted: Vec<(Id, Position)> = moves.to_vec();
        sorted.sort_by(|(left, _), (right, _)| left.cmp(right));
        sorted
    };

    key(before) == key(after)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::graph::ops::test::{node, socket, two_node_graph, wire};
    use crate::graph::{FrameSize, SocketDirection};
    use crate::types::SocketTypeId;

    fn frame(id: &str) -> Frame {
        Frame {
            id: id.into(),
            title: "group".into(),
            position: Position::default(),
            size: FrameSize {
                width: 100.,
                height: 100.,
            },
            collapsed: false,
            exposed_inputs: vec![],
            exposed_outputs: vec![],
        }
    }

    /// Apply a command, then its inverse sequence, and require the original
    /// graph back on all observable attributes.
    fn assert_involutive(graph: &Graph, command: Command) {
        let mut round_trip = command.apply(graph).unwrap();
        for inverse in command.inverse() {
            round_trip = inverse.apply(&round_trip).unwrap();
        }

        assert_eq!(&round_trip, graph, "inverse of {:?}", command);
    }

    #[test]
    fn structural_commands_are_involutive() {
        let graph = two_node_graph().add_frame(frame("f")).unwrap();

        assert_involutive(
            &graph,
            Command::AddNode {
                node: node("z", "const", &[], &["z.out"]),
                sockets: vec![socket("z.out", "z", "out", SocketDirection::Output, SocketTypeId::Float)],
            },
        );
        assert_involutive(&graph, Command::remove_node(&graph, &"a".into()).unwrap());
        assert_involutive(&graph, Command::remove_wire(&graph, &"w1".into()).unwrap());
        assert_involutive(&graph, Command::remove_frame(&graph, &"f".into()).unwrap());

        let graph_without_wire = graph.remove_wire(&"w1".into()).unwrap();
        assert_involutive(
            &graph_without_wire,
            Command::AddWire {
                wire: wire("w1", "a.out", "b.in"),
            },
        );
    }

    #[test]
    fn removed_node_comes_back_with_its_wires() {
        let graph = two_node_graph();
        let command = Command::remove_node(&graph, &"b".into()).unwrap();

        let removed = command.apply(&graph).unwrap();
        assert!(removed.wires.is_empty());

        let mut restored = removed;
        for inverse in command.inverse() {
            restored = inverse.apply(&restored).unwrap();
        }
        assert_eq!(restored, graph);
        assert!(restored.wires.contains_key(&WireId::from("w1")));
    }

    #[test]
    fn attribute_commands_are_involutive() {
        let graph = two_node_graph()
            .add_frame(frame("f"))
            .unwrap()
            .update_param(&"a".into(), "value", Some(json!(1.)))
            .unwrap();

        assert_involutive(
            &graph,
            Command::move_nodes(&graph, &[("a".into(), Position::new(4., 2.))]).unwrap(),
        );
        assert_involutive(
            &graph,
            Command::move_frames(&graph, &[("f".into(), Position::new(-3., 8.))]).unwrap(),
        );
        assert_involutive(
            &graph,
            Command::update_frame(
                &graph,
                Frame {
                    title: "renamed".into(),
                    collapsed: true,
                    ..frame("f")
                },
            )
            .unwrap(),
        );
        // Overwrite an existing param, and introduce a fresh one (whose
        // inverse must clear the key, not null it).
        assert_involutive(
            &graph,
            Command::update_param(&graph, &"a".into(), "value", Some(json!(2.))).unwrap(),
        );
        assert_involutive(
            &graph,
            Command::update_param(&graph, &"a".into(), "gain", Some(json!(0.5))).unwrap(),
        );
    }

    #[test]
    fn io_reshape_commands_are_involutive() {
        let graph = two_node_graph();

        assert_involutive(
            &graph,
            Command::update_node_io(
                &graph,
                node("b", "pass", &["b.in"], &["b.out"]),
                vec![
                    socket("b.in", "b", "in", SocketDirection::Input, SocketTypeId::Vec3),
                    socket("b.out", "b", "out", SocketDirection::Output, SocketTypeId::Vec3),
                ],
            )
            .unwrap(),
        );

        // The destructive reshape drops the wire into `b`; undo must bring
        // both the old sockets and the wire back.
        let command = Command::replace_node_io(
            &graph,
            node("b", "pass", &["b.in2"], &["b.out"]),
            vec![
                socket("b.in2", "b", "in", SocketDirection::Input, SocketTypeId::Float),
                socket("b.out", "b", "out", SocketDirection::Output, SocketTypeId::Float),
            ],
        )
        .unwrap();

        if let Command::ReplaceNodeIo { removed_wires, .. } = &command {
            assert_eq!(removed_wires.len(), 1);
        } else {
            unreachable!();
        }
        assert_involutive(&graph, command);
    }

    #[test]
    fn noop_detection_compares_structurally() {
        let graph = two_node_graph()
            .update_param(&"a".into(), "value", Some(json!(2.)))
            .unwrap();

        assert!(Command::update_param(&graph, &"a".into(), "value", Some(json!(2.)))
            .unwrap()
            .is_noop());
        assert!(!Command::update_param(&graph, &"a".into(), "value", Some(json!(3.)))
            .unwrap()
            .is_noop());
        // Clearing an absent key is a no-op; clearing a present one is not.
        assert!(Command::update_param(&graph, &"a".into(), "ghost", None)
            .unwrap()
            .is_noop());
        assert!(!Command::update_param(&graph, &"a".into(), "value", None)
            .unwrap()
            .is_noop());

        // Same pairs, different order: still a no-op.
        let stay = Command::MoveNodes {
            before: vec![
                ("a".into(), Position::new(0., 0.)),
                ("b".into(), Position::new(1., 1.)),
            ],
            after: vec![
                ("b".into(), Position::new(1., 1.)),
                ("a".into(), Position::new(0., 0.)),
            ],
        };
        assert!(stay.is_noop());

        let io = NodeIo::capture(&graph, &"b".into()).unwrap();
        assert!(Command::UpdateNodeIo {
            before: io.clone(),
            after: io.clone(),
        }
        .is_noop());
        assert!(Command::ReplaceNodeIo {
            before: io.clone(),
            after: io,
            removed_wires: vec![],
        }
        .is_noop());

        // Structural additions are never no-ops.
        assert!(!Command::AddWire {
            wire: wire("w9", "a.out", "b.in"),
        }
        .is_noop());
    }

    #[test]
    fn noop_commands_leave_the_graph_equal() {
        let graph = two_node_graph()
            .update_param(&"a".into(), "value", Some(json!(2.)))
            .unwrap();

        let commands = [
            Command::update_param(&graph, &"a".into(), "value", Some(json!(2.))).unwrap(),
            Command::move_nodes(&graph, &[("a".into(), graph.node(&"a".into()).unwrap().position)])
                .unwrap(),
        ];

        for command in commands {
            assert!(command.is_noop());
            assert_eq!(command.apply(&graph).unwrap(), graph);
        }
    }

    #[test]
    fn execution_effects_are_flagged() {
        let graph = two_node_graph();

        assert!(Command::remove_wire(&graph, &"w1".into()).unwrap().affects_execution());
        assert!(Command::remove_node(&graph, &"a".into()).unwrap().affects_execution());
        assert!(Command::update_param(&graph, &"a".into(), "value", Some(json!(1.)))
            .unwrap()
            .affects_execution());

        assert!(!Command::move_nodes(&graph, &[("a".into(), Position::new(1., 1.))])
            .unwrap()
            .affects_execution());
        assert!(!Command::AddFrame { frame: frame("f") }.affects_execution());
    }
}

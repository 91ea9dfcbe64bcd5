//! Pure graph operations.
//!
//! Every operation clones the receiver, edits the clone, and returns it; a
//! failure leaves nothing to roll back because the input graph was never
//! touched. The derived adjacency indexes are maintained here, in lockstep
//! with every wire change.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use serde_json::Value;

use super::{
    Frame, FrameId, Graph, GraphError, GraphId, Node, NodeId, Position, Socket, SocketDirection,
    SocketId, Wire, WireId,
};
use crate::types;

impl Graph {
    /// Create an empty graph.
    pub fn new(graph_id: GraphId) -> Self {
        Self {
            graph_id,
            nodes: Default::default(),
            sockets: Default::default(),
            wires: Default::default(),
            frames: Default::default(),
            outgoing: Default::default(),
            incoming: Default::default(),
        }
    }

    /// Add a node together with its full socket set. The node's
    /// `inputs`/`outputs` layout must name exactly the given sockets.
    pub fn add_node(&self, node: Node, sockets: Vec<Socket>) -> Result<Self, GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }

        for socket in &sockets {
            if self.sockets.contains_key(&socket.id) {
                return Err(GraphError::DuplicateSocket(socket.id.clone()));
            }
        }

        check_socket_layout(&node, &sockets)?;

        let mut graph = self.clone();
        for socket in sockets {
            graph.sockets.insert(socket.id.clone(), socket);
        }
        graph.nodes.insert(node.id.clone(), node);

        Ok(graph)
    }

    /// Remove a node, its sockets, and every incident wire.
    pub fn remove_node(&self, node_id: &NodeId) -> Result<Self, GraphError> {
        let node = self.node(node_id)?;

        let mut graph = self.clone();
        let incident: Vec<WireId> = self
            .incident_wires(node_id)
            .into_iter()
            .map(|wire| wire.id.clone())
            .collect();
        for wire_id in &incident {
            detach_wire(&mut graph, wire_id)?;
        }

        for socket_id in node.inputs.iter().chain(&node.outputs) {
            graph.sockets.shift_remove(socket_id);
        }
        graph.nodes.shift_remove(node_id);

        // Incident-wire detachment leaves no edges behind, but the node may
        // still own empty adjacency rows.
        graph.outgoing.remove(node_id);
        graph.incoming.remove(node_id);

        Ok(graph)
    }

    /// Move a single node.
    pub fn move_node(&self, node_id: &NodeId, position: Position) -> Result<Self, GraphError> {
        self.move_nodes(&[(node_id.clone(), position)])
    }

    /// Move several nodes at once.
    pub fn move_nodes(&self, moves: &[(NodeId, Position)]) -> Result<Self, GraphError> {
        let mut graph = self.clone();
        for (node_id, position) in moves {
            graph
                .nodes
                .get_mut(node_id)
                .ok_or_else(|| GraphError::MissingNode(node_id.clone()))?
                .position = *position;
        }

        Ok(graph)
    }

    /// Insert a wire after checking the full legality rule set: endpoint
    /// existence, directions, type compatibility, connection caps, distinct
    /// endpoint nodes, and acyclicity.
    pub fn add_wire(&self, wire: Wire) -> Result<Self, GraphError> {
        if self.wires.contains_key(&wire.id) {
            return Err(GraphError::DuplicateWire(wire.id));
        }

        let from = self.socket(&wire.from_socket_id)?;
        let to = self.socket(&wire.to_socket_id)?;
        let from_node = self.node(&from.node_id)?.id.clone();
        let to_node = self.node(&to.node_id)?.id.clone();

        for (socket, expected) in [(from, SocketDirection::Output), (to, SocketDirection::Input)] {
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

        for socket in [from, to] {
            if let Some(cap) = socket.connection_cap() {
                if self.connection_count(&socket.id) as u32 >= cap {
                    return Err(GraphError::SocketConnectionLimitExceeded {
                        socket_id: socket.id.clone(),
                        limit: cap,
                    });
                }
            }
        }

        if from_node == to_node {
            return Err(GraphError::SelfLoop { node_id: from_node });
        }

        // The wire closes a cycle iff its source is already reachable from
        // its destination. The reported path starts at the proposed source,
        // follows the offending edge, and walks back to the source.
        let mut route = Vec::new();
        if self.find_path(&to_node, &from_node, &mut BTreeSet::new(), &mut route) {
            let mut path = vec![from_node.clone()];
            path.extend(route);
            debug!("rejecting wire `{}`: would close a cycle", wire.id);
            return Err(GraphError::CycleDetected { path });
        }

        let mut graph = self.clone();
        graph
            .outgoing
            .entry(from_node.clone())
            .or_default()
            .insert(to_node.clone());
        graph.incoming.entry(to_node).or_default().insert(from_node);
        graph.wires.insert(wire.id.clone(), wire);

        Ok(graph)
    }

    /// Remove a wire, pruning the adjacency edge when no other wire still
    /// connects the same ordered node pair.
    pub fn remove_wire(&self, wire_id: &WireId) -> Result<Self, GraphError> {
        let mut graph = self.clone();
        detach_wire(&mut graph, wire_id)?;

        Ok(graph)
    }

    /// Add a frame.
    pub fn add_frame(&self, frame: Frame) -> Result<Self, GraphError> {
        if self.frames.contains_key(&frame.id) {
            return Err(GraphError::DuplicateFrame(frame.id));
        }

        let mut graph = self.clone();
        graph.frames.insert(frame.id.clone(), frame);

        Ok(graph)
    }

    /// Remove a frame. Nodes are never owned by frames, so nothing else
    /// changes.
    pub fn remove_frame(&self, frame_id: &FrameId) -> Result<Self, GraphError> {
        if !self.frames.contains_key(frame_id) {
            return Err(GraphError::MissingFrame(frame_id.clone()));
        }

        let mut graph = self.clone();
        graph.frames.shift_remove(frame_id);

        Ok(graph)
    }

    /// Move several frames at once.
    pub fn move_frames(&self, moves: &[(FrameId, Position)]) -> Result<Self, GraphError> {
        let mut graph = self.clone();
        for (frame_id, position) in moves {
            graph
                .frames
                .get_mut(frame_id)
                .ok_or_else(|| GraphError::MissingFrame(frame_id.clone()))?
                .position = *position;
        }

        Ok(graph)
    }

    /// Replace a frame's attributes wholesale.
    pub fn update_frame(&self, frame: Frame) -> Result<Self, GraphError> {
        if !self.frames.contains_key(&frame.id) {
            return Err(GraphError::MissingFrame(frame.id));
        }

        let mut graph = self.clone();
        graph.frames.insert(frame.id.clone(), frame);

        Ok(graph)
    }

    /// Set (`Some`) or clear (`None`) one named parameter of a node.
    pub fn update_param(
        &self,
        node_id: &NodeId,
        key: &str,
        value: Option<Value>,
    ) -> Result<Self, GraphError> {
        let mut graph = self.clone();
        let node = graph
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| GraphError::MissingNode(node_id.clone()))?;

        match value {
            Some(value) => {
                node.params.insert(key.to_string(), value);
            }
            None => {
                node.params.remove(key);
            }
        }

        Ok(graph)
    }

    /// Replace a node's attributes and socket set without touching wires.
    /// Every wired socket must survive the reshape with its direction intact;
    /// use [replace_node_io](Self::replace_node_io) for destructive reshapes.
    /// Type changes are allowed here and surface later as warnings.
    pub fn update_node_io(&self, node: Node, sockets: Vec<Socket>) -> Result<Self, GraphError> {
        let old = self.node(&node.id)?.clone();
        check_socket_layout(&node, &sockets)?;
        self.check_duplicate_foreign_sockets(&old, &sockets)?;

        let new_by_id: HashMap<&SocketId, &Socket> =
            sockets.iter().map(|socket| (&socket.id, socket)).collect();

        for wire in self.incident_wires(&node.id) {
            for (socket_id, expected) in [
                (&wire.from_socket_id, SocketDirection::Output),
                (&wire.to_socket_id, SocketDirection::Input),
            ] {
                if self.socket(socket_id)?.node_id != node.id {
                    continue;
                }

                let replacement = new_by_id
                    .get(socket_id)
                    .ok_or_else(|| GraphError::MissingSocket((*socket_id).clone()))?;
                if replacement.direction != expected {
                    return Err(GraphError::InvalidSocketDirection {
                        socket_id: (*socket_id).clone(),
                        expected,
                        found: replacement.direction,
                    });
                }
            }
        }

        check_caps_against_existing(self, &sockets)?;

        let mut graph = self.clone();
        swap_node_sockets(&mut graph, &old, node, sockets);

        Ok(graph)
    }

    /// Replace a node's attributes and socket set, dropping every wire whose
    /// endpoint socket disappears (or flips direction) in the new layout.
    /// The removed wires are returned so the caller can record them for undo.
    pub fn replace_node_io(
        &self,
        node: Node,
        sockets: Vec<Socket>,
    ) -> Result<(Self, Vec<Wire>), GraphError> {
        let old = self.node(&node.id)?.clone();
        check_socket_layout(&node, &sockets)?;
        self.check_duplicate_foreign_sockets(&old, &sockets)?;

        let invalidated: Vec<Wire> = self
            .wires_invalidated_by_reshape(&node.id, &sockets)?
            .into_iter()
            .cloned()
            .collect();

        let survivors: Vec<&Socket> = sockets
            .iter()
            .filter(|socket| {
                !invalidated
                    .iter()
                    .any(|wire| wire.from_socket_id == socket.id || wire.to_socket_id == socket.id)
            })
            .collect();
        check_caps_against_surviving(self, &survivors, &invalidated)?;

        let mut graph = self.clone();
        for wire in &invalidated {
            detach_wire(&mut graph, &wire.id)?;
        }
        swap_node_sockets(&mut graph, &old, node, sockets);

        Ok((graph, invalidated))
    }

    /// Incident wires that a reshape to the given socket layout would
    /// invalidate: their endpoint on this node is gone or changed sides.
    pub(crate) fn wires_invalidated_by_reshape(
        &self,
        node_id: &NodeId,
        sockets: &[Socket],
    ) -> Result<Vec<&Wire>, GraphError> {
        let new_by_id: HashMap<&SocketId, &Socket> =
            sockets.iter().map(|socket| (&socket.id, socket)).collect();

        let mut invalidated = Vec::new();
        for wire in self.incident_wires(node_id) {
            for (socket_id, expected) in [
                (&wire.from_socket_id, SocketDirection::Output),
                (&wire.to_socket_id, SocketDirection::Input),
            ] {
                if &self.socket(socket_id)?.node_id != node_id {
                    continue;
                }

                match new_by_id.get(socket_id) {
                    Some(replacement) if replacement.direction == expected => {}
                    _ => {
                        invalidated.push(wire);
                        break;
                    }
                }
            }
        }

        Ok(invalidated)
    }

    /// A reshape may not reuse a socket id that belongs to another node.
    fn check_duplicate_foreign_sockets(
        &self,
        old: &Node,
        sockets: &[Socket],
    ) -> Result<(), GraphError> {
        let previous: BTreeSet<&SocketId> = old.inputs.iter().chain(&old.outputs).collect();
        for socket in sockets {
            if self.sockets.contains_key(&socket.id) && !previous.contains(&socket.id) {
                return Err(GraphError::DuplicateSocket(socket.id.clone()));
            }
        }

        Ok(())
    }

    /// Depth-first reachability over `outgoing`, recording the route.
    /// `path` holds `current..=target` when the search succeeds.
    fn find_path(
        &self,
        current: &NodeId,
        target: &NodeId,
        visited: &mut BTreeSet<NodeId>,
        path: &mut Vec<NodeId>,
    ) -> bool {
        path.push(current.clone());
        if current == target {
            return true;
        }

        visited.insert(current.clone());
        for next in self.outgoing_neighbors(current) {
            if !visited.contains(next) && self.find_path(&next.clone(), target, visited, path) {
                return true;
            }
        }

        path.pop();
        false
    }
}

/// Check that a node's declared layout and a socket batch describe exactly
/// the same socket set, with per-socket sanity.
fn check_socket_layout(node: &Node, sockets: &[Socket]) -> Result<(), GraphError> {
    let mut by_id: HashMap<&SocketId, &Socket> = HashMap::new();
    for socket in sockets {
        if socket.node_id != node.id {
            return Err(GraphError::SocketNodeMismatch {
                socket_id: socket.id.clone(),
                expected: node.id.clone(),
                found: socket.node_id.clone(),
            });
        }

        if let (Some(min), Some(max)) = (socket.min_connections, socket.max_connections) {
            if min > max {
                return Err(GraphError::InvalidSocketConnectionLimit {
                    socket_id: socket.id.clone(),
                });
            }
        }

        if by_id.insert(&socket.id, socket).is_some() {
            return Err(GraphError::DuplicateSocket(socket.id.clone()));
        }
    }

    let mut mentioned = BTreeSet::new();
    for (layout, expected) in [
        (&node.inputs, SocketDirection::Input),
        (&node.outputs, SocketDirection::Output),
    ] {
        for socket_id in layout {
            let matching = by_id
                .get(socket_id)
                .filter(|socket| socket.direction == expected);
            if matching.is_none() || !mentioned.insert(socket_id) {
                return Err(GraphError::NodeSocketMismatch {
                    node_id: node.id.clone(),
                    socket_id: socket_id.clone(),
                });
            }
        }
    }

    if let Some(stray) = sockets.iter().find(|socket| !mentioned.contains(&socket.id)) {
        return Err(GraphError::NodeSocketMismatch {
            node_id: node.id.clone(),
            socket_id: stray.id.clone(),
        });
    }

    Ok(())
}

/// Existing connection counts must fit the caps of a reshaped socket set.
fn check_caps_against_existing(graph: &Graph, sockets: &[Socket]) -> Result<(), GraphError> {
    for socket in sockets {
        if let Some(cap) = socket.connection_cap() {
            if graph.connection_count(&socket.id) as u32 > cap {
                return Err(GraphError::SocketConnectionLimitExceeded {
                    socket_id: socket.id.clone(),
                    limit: cap,
                });
            }
        }
    }

    Ok(())
}

/// Cap check for a destructive reshape: wires already slated for removal do
/// not count against the surviving sockets.
fn check_caps_against_surviving(
    graph: &Graph,
    sockets: &[&Socket],
    removed: &[Wire],
) -> Result<(), GraphError> {
    for socket in sockets {
        if let Some(cap) = socket.connection_cap() {
            let count = graph
                .wires_at_socket(&socket.id)
                .filter(|wire| !removed.iter().any(|gone| gone.id == wire.id))
                .count();
            if count as u32 > cap {
                return Err(GraphError::SocketConnectionLimitExceeded {
                    socket_id: socket.id.clone(),
                    limit: cap,
                });
            }
        }
    }

    Ok(())
}

/// Swap a node's socket set for a new one and replace the node record.
fn swap_node_sockets(graph: &mut Graph, old: &Node, node: Node, sockets: Vec<Socket>) {
    for socket_id in old.inputs.iter().chain(&old.outputs) {
        graph.sockets.shift_remove(socket_id);
    }
    for socket in sockets {
        graph.sockets.insert(socket.id.clone(), socket);
    }
    graph.nodes.insert(node.id.clone(), node);
}

/// Remove a wire and prune the adjacency edge if it carried the last wire
/// between its ordered node pair.
fn detach_wire(graph: &mut Graph, wire_id: &WireId) -> Result<Wire, GraphError> {
    let wire = graph
        .wires
        .shift_remove(wire_id)
        .ok_or_else(|| GraphError::MissingWire(wire_id.clone()))?;
    let (from_node, to_node) = graph.wire_nodes(&wire)?;

    let still_connected = graph.wires.values().any(|other| {
        graph
            .wire_nodes(other)
            .is_ok_and(|(from, to)| from == from_node && to == to_node)
    });

    if !still_connected {
        if let Some(row) = graph.outgoing.get_mut(&from_node) {
            row.remove(&to_node);
            if row.is_empty() {
                graph.outgoing.remove(&from_node);
            }
        }
        if let Some(row) = graph.incoming.get_mut(&to_node) {
            row.remove(&from_node);
            if row.is_empty() {
                graph.incoming.remove(&to_node);
            }
        }
    }

    Ok(wire)
}

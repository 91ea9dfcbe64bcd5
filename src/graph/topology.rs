//! Graph traversals: cycle detection, topological order, closures,
//! components, and the execution subgraph handed to the engine.
//!
//! All traversals iterate neighbor sets in ascending identifier order so the
//! results are deterministic and reproducible across runs.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{Graph, GraphError, NodeId, SocketDirection, SocketId, WireId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Upstream,
    Downstream,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// The upstream slice of a graph that contributes to a set of output
/// sockets: the frontier the execution engine walks.
pub struct ExecutionSubgraph {
    /// Nodes in the upstream closure of the requested outputs.
    pub nodes: BTreeSet<NodeId>,
    /// Sockets belonging to closure nodes.
    pub sockets: BTreeSet<SocketId>,
    /// Wires with both endpoints inside the closure.
    pub wires: BTreeSet<WireId>,
    /// The requested output sockets, in request order.
    pub output_sockets: Vec<SocketId>,
}

impl Graph {
    /// Find a directed cycle, if any. The returned path starts and ends at
    /// the same node.
    pub fn detect_cycle(&self) -> Option<Vec<NodeId>> {
        let mut done = BTreeSet::new();
        let mut path = Vec::new();

        let mut starts: Vec<&NodeId> = self.nodes.keys().collect();
        starts.sort();

        for start in starts {
            if let Some(cycle) = self.cycle_from(start, &mut done, &mut path) {
                return Some(cycle);
            }
        }

        None
    }

    fn cycle_from(
        &self,
        current: &NodeId,
        done: &mut BTreeSet<NodeId>,
        path: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        if let Some(position) = path.iter().position(|id| id == current) {
            let mut cycle = path[position..].to_vec();
            cycle.push(current.clone());
            return Some(cycle);
        }

        if done.contains(current) {
            return None;
        }

        path.push(current.clone());
        for next in self.outgoing_neighbors(current) {
            if let Some(cycle) = self.cycle_from(&next.clone(), done, path) {
                return Some(cycle);
            }
        }
        path.pop();
        done.insert(current.clone());

        None
    }

    /// Order all nodes so that every wire's source precedes its destination,
    /// draining ready nodes in ascending identifier order.
    pub fn topo_sort(&self) -> Result<Vec<NodeId>, GraphError> {
        self.topo_sort_of(self.nodes.keys().cloned().collect())
    }

    /// [topo_sort](Self::topo_sort) restricted to a node set; edges leaving
    /// the set are ignored.
    pub fn topo_sort_subgraph(&self, set: &BTreeSet<NodeId>) -> Result<Vec<NodeId>, GraphError> {
        for id in set {
            self.node(id)?;
        }

        self.topo_sort_of(set.clone())
    }

    fn topo_sort_of(&self, set: BTreeSet<NodeId>) -> Result<Vec<NodeId>, GraphError> {
        let mut remaining: BTreeMap<NodeId, usize> = set
            .iter()
            .map(|id| {
                let degree = self
                    .incoming_neighbors(id)
                    .filter(|from| set.contains(*from))
                    .count();
                (id.clone(), degree)
            })
            .collect();

        let mut ready: BTreeSet<NodeId> = remaining
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| id.clone())
            .collect();

        let mut order = Vec::with_capacity(set.len());
        while let Some(id) = ready.pop_first() {
            for next in self.outgoing_neighbors(&id) {
                let Some(degree) = remaining.get_mut(next) else {
                    continue;
                };
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(next.clone());
                }
            }
            order.push(id);
        }

        if order.len() < set.len() {
            return Err(GraphError::CycleDetected {
                path: self.detect_cycle().unwrap_or_default(),
            });
        }

        Ok(order)
    }

    /// All nodes reaching the start set, start set included.
    pub fn upstream_closure(&self, starts: &[NodeId]) -> Result<BTreeSet<NodeId>, GraphError> {
        self.closure(starts, Direction::Upstream)
    }

    /// All nodes reachable from the start set, start set included.
    pub fn downstream_closure(&self, starts: &[NodeId]) -> Result<BTreeSet<NodeId>, GraphError> {
        self.closure(starts, Direction::Downstream)
    }

    fn closure(
        &self,
        starts: &[NodeId],
        direction: Direction,
    ) -> Result<BTreeSet<NodeId>, GraphError> {
        let mut result = BTreeSet::new();
        let mut queue = VecDeque::new();
        for start in starts {
            self.node(start)?;
            if result.insert(start.clone()) {
                queue.push_back(start.clone());
            }
        }

        while let Some(id) = queue.pop_front() {
            let neighbors: Box<dyn Iterator<Item = &NodeId> + '_> = match direction {
                Direction::Upstream => Box::new(self.incoming_neighbors(&id)),
                Direction::Downstream => Box::new(self.outgoing_neighbors(&id)),
            };
            for next in neighbors {
                if result.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }

        Ok(result)
    }

    /// Weakly-connected components, each as a sorted node list, ordered by
    /// their smallest member.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();

        let mut ids: Vec<&NodeId> = self.nodes.keys().collect();
        ids.sort();

        for id in ids {
            if seen.contains(id) {
                continue;
            }

            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([id.clone()]);
            component.insert(id.clone());
            while let Some(current) = queue.pop_front() {
                for next in self
                    .outgoing_neighbors(&current)
                    .chain(self.incoming_neighbors(&current))
                {
                    if component.insert(next.clone()) {
                        queue.push_back(next.clone());
                    }
                }
            }

            seen.extend(component.iter().cloned());
            components.push(component.into_iter().collect());
        }

        components
    }

    /// Restrict the graph to everything contributing to the given output
    /// sockets: the upstream closure of their owning nodes, those nodes'
    /// sockets, and the wires fully inside the closure.
    pub fn execution_subgraph_by_output_sockets(
        &self,
        outputs: &[SocketId],
    ) -> Result<ExecutionSubgraph, GraphError> {
        let mut roots = Vec::new();
        for socket_id in outputs {
            let socket = self.socket(socket_id)?;
            if socket.direction != SocketDirection::Output {
                return Err(GraphError::InvalidSocketDirection {
                    socket_id: socket_id.clone(),
                    expected: SocketDirection::Output,
                    found: socket.direction,
                });
            }
            roots.push(self.node(&socket.node_id)?.id.clone());
        }

        let nodes = self.upstream_closure(&roots)?;
        let sockets: BTreeSet<SocketId> = self
            .sockets
            .values()
            .filter(|socket| nodes.contains(&socket.node_id))
            .map(|socket| socket.id.clone())
            .collect();
        let wires: BTreeSet<WireId> = self
            .wires
            .values()
            .filter(|wire| {
                sockets.contains(&wire.from_socket_id) && sockets.contains(&wire.to_socket_id)
            })
            .map(|wire| wire.id.clone())
            .collect();

        Ok(ExecutionSubgraph {
            nodes,
            sockets,
            wires,
            output_sockets: outputs.to_vec(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::ops::test::{node, socket, two_node_graph, wire};
    use crate::types::SocketTypeId;

    /// a -> b -> d, a -> c -> d.
    fn diamond() -> Graph {
        Graph::new("g".into())
            .add_node(
                node("a", "const", &[], &["a.out"]),
                vec![socket("a.out", "a", "out", SocketDirection::Output, SocketTypeId::Float)],
            )
            .unwrap()
            .add_node(
                node("b", "pass", &["b.in"], &["b.out"]),
                vec![
                    socket("b.in", "b", "in", SocketDirection::Input, SocketTypeId::Float),
                    socket("b.out", "b", "out", SocketDirection::Output, SocketTypeId::Float),
                ],
            )
            .unwrap()
            .add_node(
                node("c", "pass", &["c.in"], &["c.out"]),
                vec![
                    socket("c.in", "c", "in", SocketDirection::Input, SocketTypeId::Float),
                    socket("c.out", "c", "out", SocketDirection::Output, SocketTypeId::Float),
                ],
            )
            .unwrap()
            .add_node(
                node("d", "sum", &["d.l", "d.r"], &["d.out"]),
                vec![
                    socket("d.l", "d", "left", SocketDirection::Input, SocketTypeId::Float),
                    socket("d.r", "d", "right", SocketDirection::Input, SocketTypeId::Float),
                    socket("d.out", "d", "out", SocketDirection::Output, SocketTypeId::Float),
                ],
            )
            .unwrap()
            .add_wire(wire("w1", "a.out", "b.in"))
            .unwrap()
            .add_wire(wire("w2", "a.out", "c.in"))
            .unwrap()
            .add_wire(wire("w3", "b.out", "d.l"))
            .unwrap()
            .add_wire(wire("w4", "c.out", "d.r"))
            .unwrap()
    }

    #[test]
    fn topo_sort_is_deterministic_and_respects_wires() {
        let graph = diamond();
        let order = graph.topo_sort().unwrap();

        assert_eq!(
            order,
            vec![
                NodeId::from("a"),
                NodeId::from("b"),
                NodeId::from("c"),
                NodeId::from("d"),
            ]
        );

        // Every wire's source node precedes its destination node.
        for wire in graph.wires.values() {
            let (from, to) = graph.wire_nodes(wire).unwrap();
            let position = |id: &NodeId| order.iter().position(|other| other == id).unwrap();
            assert!(position(&from) < position(&to));
        }
    }

    #[test]
    fn topo_sort_subgraph_ignores_outside_edges() {
        let graph = diamond();
        let set: BTreeSet<NodeId> = ["b".into(), "d".into()].into();

        // `d` still waits for `b`, but `a` and `c` are out of the picture.
        assert_eq!(
            graph.topo_sort_subgraph(&set).unwrap(),
            vec![NodeId::from("b"), NodeId::from("d")]
        );

        let missing: BTreeSet<NodeId> = ["z".into()].into();
        assert_eq!(
            graph.topo_sort_subgraph(&missing).unwrap_err(),
            GraphError::MissingNode("z".into())
        );
    }

    #[test]
    fn cycle_is_reported_on_a_corrupted_graph() {
        // Legal operations cannot produce a cycle, so corrupt the adjacency
        // by hand to exercise the reporting path.
        let mut graph = two_node_graph();
        graph
            .outgoing
            .entry("b".into())
            .or_default()
            .insert("a".into());
        graph
            .incoming
            .entry("a".into())
            .or_default()
            .insert("b".into());

        let cycle = graph.detect_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.len() >= 3);

        assert!(matches!(
            graph.topo_sort().unwrap_err(),
            GraphError::CycleDetected { path } if path.first() == path.last()
        ));
    }

    #[test]
    fn closures_walk_the_right_direction() {
        let graph = diamond();

        assert_eq!(
            graph.upstream_closure(&["d".into()]).unwrap(),
            ["a".into(), "b".into(), "c".into(), "d".into()].into()
        );
        assert_eq!(
            graph.upstream_closure(&["b".into()]).unwrap(),
            ["a".into(), "b".into()].into()
        );
        assert_eq!(
            graph.downstream_closure(&["b".into()]).unwrap(),
            ["b".into(), "d".into()].into()
        );
        assert_eq!(
            graph.upstream_closure(&["z".into()]).unwrap_err(),
            GraphError::MissingNode("z".into())
        );
    }

    #[test]
    fn components_treat_wires_as_undirected() {
        let graph = diamond()
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
            .unwrap();

        assert_eq!(
            graph.connected_components(),
            vec![
                vec![
                    NodeId::from("a"),
                    NodeId::from("b"),
                    NodeId::from("c"),
                    NodeId::from("d"),
                ],
                vec![NodeId::from("lone")],
            ]
        );
    }

    #[test]
    fn execution_subgraph_collects_contributing_pieces() {
        let graph = diamond()
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
            .unwrap();

        let sub = graph
            .execution_subgraph_by_output_sockets(&["b.out".into()])
            .unwrap();

        assert_eq!(sub.nodes, ["a".into(), "b".into()].into());
        assert_eq!(sub.sockets, ["a.out".into(), "b.in".into(), "b.out".into()].into());
        assert_eq!(sub.wires, ["w1".into()].into());
        assert_eq!(sub.output_sockets, vec![SocketId::from("b.out")]);

        // Requesting an input socket is a direction error.
        assert!(matches!(
            graph
                .execution_subgraph_by_output_sockets(&["b.in".into()])
                .unwrap_err(),
            GraphError::InvalidSocketDirection { .. }
        ));
    }
}

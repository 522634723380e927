//! Signal graph: nodes and the directed edges between them.
//!
//! The graph lives inside the engine's shared state, so the audio threads
//! consult the same edge list the control thread mutates. Every routing
//! decision made on an audio thread is a lookup here.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use super::analyser::AnalyserInput;
use crate::error::{GraphError, Result};

/// Stable identity of a node for the lifetime of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// The engine output. Present in every graph.
    pub const DESTINATION: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node is, and for analysers where their input window lives
#[derive(Clone)]
pub enum NodeKind {
    Destination,
    MonitorGain { gain: f32 },
    FileSource,
    MicSource,
    Analyser(AnalyserInput),
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            NodeKind::Destination => "destination",
            NodeKind::MonitorGain { .. } => "monitor-gain",
            NodeKind::FileSource => "file-source",
            NodeKind::MicSource => "mic-source",
            NodeKind::Analyser(_) => "analyser",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    from: NodeId,
    to: NodeId,
}

pub struct SignalGraph {
    nodes: HashMap<NodeId, NodeKind>,
    edges: Vec<Edge>,
    next_id: u64,
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGraph {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::DESTINATION, NodeKind::Destination);
        Self {
            nodes,
            edges: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        match &kind {
            NodeKind::MonitorGain { gain } => trace!("graph: add monitor-gain {} at gain {}", id, gain),
            other => trace!("graph: add {} {}", other.label(), id),
        }
        self.nodes.insert(id, kind);
        id
    }

    /// Drop a node together with every edge touching it.
    /// Removing an unknown node is a no-op.
    pub fn remove_node(&mut self, id: NodeId) {
        if id == NodeId::DESTINATION {
            return;
        }
        self.disconnect(id);
        self.edges.retain(|e| e.to != id);
        if let Some(kind) = self.nodes.remove(&id) {
            trace!("graph: remove {} {}", kind.label(), id);
        }
    }

    #[cfg(test)]
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[cfg(test)]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(&id)
    }

    /// Connect `from` to `to`. Connecting twice leaves a single edge.
    /// Any edge that would let a microphone reach the output is refused.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        for id in [from, to] {
            if !self.nodes.contains_key(&id) {
                return Err(GraphError::UnknownNode(id));
            }
        }

        let edge = Edge { from, to };
        if self.edges.contains(&edge) {
            return Ok(());
        }
        self.edges.push(edge);
        if self.mic_is_audible() {
            self.edges.pop();
            return Err(GraphError::FeedbackRoute);
        }
        trace!("graph: connect {} -> {}", from, to);
        Ok(())
    }

    /// Remove every outgoing edge of `from`. Returns how many were removed;
    /// zero means the node was already disconnected, which is fine.
    pub fn disconnect(&mut self, from: NodeId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| e.from != from);
        let removed = before - self.edges.len();
        if removed == 0 {
            trace!("graph: disconnect {} was a no-op", from);
        }
        removed
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.contains(&Edge { from, to })
    }

    #[cfg(test)]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether audio entering `from` ends up at the engine output.
    pub fn reaches_destination(&self, from: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = Vec::new();
        while let Some(node) = stack.pop() {
            if node == NodeId::DESTINATION {
                return true;
            }
            if seen.contains(&node) {
                continue;
            }
            seen.push(node);
            stack.extend(self.edges.iter().filter(|e| e.from == node).map(|e| e.to));
        }
        false
    }

    fn mic_is_audible(&self) -> bool {
        self.nodes
            .iter()
            .filter(|(_, kind)| matches!(kind, NodeKind::MicSource))
            .any(|(id, _)| self.reaches_destination(*id))
    }

    /// Input windows of the analysers directly downstream of `from`
    pub fn analyser_inputs(&self, from: NodeId) -> impl Iterator<Item = &AnalyserInput> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.from == from)
            .filter_map(|e| match self.nodes.get(&e.to) {
                Some(NodeKind::Analyser(input)) => Some(input),
                _ => None,
            })
    }
}

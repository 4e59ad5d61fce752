//! Arena of stat nodes linked by parent handles
//!
//! Nodes never hold references to each other: a parent is a [`NodeId`] into
//! the same arena, so moving a player to another team is a single handle
//! update. Applying an operation bumps the node's own counters and then walks
//! the parent chain, which gives team and round totals for free.

use serde::Serialize;

use super::counters::{Counters, StatOp};
use super::team::TeamColor;

/// Handle to a node inside one [`StatArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Round,
    Team(TeamColor),
    Player(String),
}

#[derive(Debug, Clone)]
struct StatNode {
    kind: NodeKind,
    counters: Counters,
    parent: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct StatArena {
    nodes: Vec<StatNode>,
}

impl StatArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(StatNode {
            kind,
            counters: Counters::default(),
            parent: parent.filter(|p| p.0 < self.nodes.len()),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Re-point `id` at a new parent. Past counters stay where they were;
    /// only later updates roll up to the new parent. Refuses links that
    /// would form a cycle.
    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> bool {
        if !self.contains(id) {
            return false;
        }
        if let Some(p) = parent {
            if !self.contains(p) || self.ancestors(p).any(|a| a == id) {
                return false;
            }
        }
        self.nodes[id.0].parent = parent;
        true
    }

    pub fn counters(&self, id: NodeId) -> Counters {
        self.nodes.get(id.0).map(|n| n.counters).unwrap_or_default()
    }

    /// Apply `op` to `id` and then to every ancestor.
    pub fn apply(&mut self, id: NodeId, op: StatOp) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.nodes.get_mut(node_id.0) else {
                break;
            };
            node.counters.apply(op);
            current = node.parent;
        }
    }

    /// `id` itself followed by its parent chain
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let limit = self.nodes.len();
        std::iter::successors(Some(id), move |current| self.parent(*current))
            .filter(move |n| n.0 < limit)
            .take(limit)
    }
}

//! Arena-based generic tree underlying both grouping trees and rhythm trees.
//!
//! Nodes live in a flat arena and reference each other by [NodeId], so the
//! parent back-references needed for ancestor walks never form real reference
//! cycles. Construction is two-phase: allocate a node with [`Tree::new_internal`]
//! or [`Tree::new_leaf`], then link it with [`Tree::attach`]. A node that is
//! never attached simply stays invisible to every root traversal, which lets
//! search code abandon scratch subtrees without unlinking anything.
//!
//! Structural equality is string equality of the canonical parenthesized
//! form produced by [`Tree::node_text`]: `label(child1,child2,...)`, with
//! leaves printing their label alone.

use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Index of a node in a tree arena.
pub type NodeId = usize;

/// Errors raised by structural queries on a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// A non-root node has no parent link, so its ancestor chain is broken.
    #[error("node {0} is not attached to the tree")]
    Detached(NodeId),

    /// The lowest common ancestor of a node and itself is undefined.
    #[error("lowest common ancestor requires two distinct nodes")]
    IdenticalNodes,

    /// A published tree contained an internal node without children.
    #[error("internal node {0} has no children")]
    ChildlessInternal(NodeId),
}

/// Closed set of node variants. Behavior that differs per variant is
/// dispatched by exhaustive matches on this enum.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind<L> {
    /// The tree's sole entry point; no parent, no label.
    Root,
    /// Carries a free-form grouping annotation (empty for beams, a tuplet
    /// ratio string for tuplets) and owns an ordered run of children.
    Internal { label: String },
    /// Carries the payload; never has children.
    Leaf { label: L },
}

#[derive(Debug, Clone)]
struct Node<L> {
    kind: NodeKind<L>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A tree of owned nodes referenced by index.
///
/// The root is allocated by [`Tree::new`] and is always id 0. All other
/// nodes are created detached and become part of the tree once attached to
/// an ancestor of the root.
#[derive(Debug, Clone)]
pub struct Tree<L> {
    arena: Vec<Node<L>>,
}

impl<L> Tree<L> {
    /// Creates a tree containing only the root node.
    pub fn new() -> Self {
        Tree {
            arena: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The root's id (always 0).
    pub fn root(&self) -> NodeId {
        0
    }

    /// Allocates a detached internal node and returns its id.
    pub fn new_internal(&mut self, label: String) -> NodeId {
        self.push(NodeKind::Internal { label })
    }

    /// Allocates a detached leaf node and returns its id.
    pub fn new_leaf(&mut self, label: L) -> NodeId {
        self.push(NodeKind::Leaf { label })
    }

    fn push(&mut self, kind: NodeKind<L>) -> NodeId {
        let id = self.arena.len();
        self.arena.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Links a detached node under `parent`, at the end of its child run.
    ///
    /// # Panics
    /// Panics if either id is out of bounds, if `child` is the root, if the
    /// child already has a parent, or if `parent` is a leaf. These are
    /// programming errors in build code, not recoverable conditions.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        assert!(parent < self.arena.len() && child < self.arena.len());
        assert!(child != self.root(), "the root cannot become a child");
        assert!(
            self.arena[child].parent.is_none(),
            "node {child} is already attached"
        );
        assert!(
            !matches!(self.arena[parent].kind, NodeKind::Leaf { .. }),
            "leaves cannot have children"
        );
        self.arena[child].parent = Some(parent);
        self.arena[parent].children.push(child);
    }

    /// The variant and label of a node.
    pub fn kind(&self, node: NodeId) -> &NodeKind<L> {
        &self.arena[node].kind
    }

    /// Ordered child ids of a node.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.arena[node].children
    }

    /// Parent id, or `None` for the root and for detached nodes.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].parent
    }

    /// Depth of a node: 0 for the root, else one more than its parent.
    ///
    /// Fails with [`StructureError::Detached`] when the chain from `node`
    /// does not reach the root.
    pub fn depth(&self, node: NodeId) -> Result<usize, StructureError> {
        Ok(self.ancestors(node)?.len())
    }

    /// The chain from `node`'s parent up to and including the root.
    pub fn ancestors(&self, node: NodeId) -> Result<Vec<NodeId>, StructureError> {
        let mut chain = Vec::new();
        let mut current = node;
        while !matches!(self.arena[current].kind, NodeKind::Root) {
            match self.arena[current].parent {
                Some(parent) => {
                    chain.push(parent);
                    current = parent;
                }
                None => return Err(StructureError::Detached(node)),
            }
        }
        Ok(chain)
    }

    /// The deepest node that is an ancestor of both inputs.
    ///
    /// Walks `a`'s ancestor chain (plus `a` itself) as a set, then climbs
    /// from `b` until a member of that set is found. Symmetric in its
    /// arguments. Fails if the nodes are identical or not both attached.
    pub fn lowest_common_ancestor(
        &self,
        a: NodeId,
        b: NodeId,
    ) -> Result<NodeId, StructureError> {
        if a == b {
            return Err(StructureError::IdenticalNodes);
        }
        let mut side: HashSet<NodeId> = self.ancestors(a)?.into_iter().collect();
        side.insert(a);
        let mut current = b;
        loop {
            if side.contains(&current) {
                return Ok(current);
            }
            match self.arena[current].parent {
                Some(parent) => current = parent,
                None => return Err(StructureError::Detached(b)),
            }
        }
    }

    /// All node ids reachable from `local_root`, in pre-order.
    pub fn nodes_under(&self, local_root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![local_root];
        while let Some(id) = stack.pop() {
            out.push(id);
            // push right-to-left so children come out left-to-right
            for &child in self.arena[id].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// All node ids reachable from the root, in pre-order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.nodes_under(self.root())
    }

    /// Leaf ids under `local_root`, left to right.
    pub fn leaves_under(&self, local_root: NodeId) -> Vec<NodeId> {
        self.nodes_under(local_root)
            .into_iter()
            .filter(|&id| matches!(self.arena[id].kind, NodeKind::Leaf { .. }))
            .collect()
    }

    /// Leaf ids of the whole tree, left to right.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.leaves_under(self.root())
    }

    /// Number of leaves in the subtree under `node` (a leaf counts itself).
    pub fn subtree_leaves(&self, node: NodeId) -> usize {
        match &self.arena[node].kind {
            NodeKind::Leaf { .. } => 1,
            NodeKind::Root | NodeKind::Internal { .. } => self.arena[node]
                .children
                .iter()
                .map(|&c| self.subtree_leaves(c))
                .sum(),
        }
    }

    /// Number of nodes in the subtree under `node`, counting `node` itself.
    pub fn subtree_size(&self, node: NodeId) -> usize {
        1 + self.arena[node]
            .children
            .iter()
            .map(|&c| self.subtree_size(c))
            .sum::<usize>()
    }

    /// Whether every node in the subtree either is a leaf or has at least
    /// one complete child.
    pub fn is_complete(&self, node: NodeId) -> bool {
        match &self.arena[node].kind {
            NodeKind::Leaf { .. } => true,
            NodeKind::Root | NodeKind::Internal { .. } => {
                let children = &self.arena[node].children;
                !children.is_empty() && children.iter().all(|&c| self.is_complete(c))
            }
        }
    }

    /// Checks the published-tree invariant: every node reachable from the
    /// root with zero children must be a leaf.
    pub fn validate(&self) -> Result<(), StructureError> {
        for id in self.nodes() {
            if self.arena[id].children.is_empty()
                && !matches!(self.arena[id].kind, NodeKind::Leaf { .. })
            {
                return Err(StructureError::ChildlessInternal(id));
            }
        }
        Ok(())
    }
}

impl<L> Default for Tree<L> {
    fn default() -> Self {
        Tree::new()
    }
}

impl<L: fmt::Display> Tree<L> {
    /// Canonical parenthesized form of the subtree under `node`.
    ///
    /// This string is the basis of structural equality and of uniqueness
    /// tests on tree shapes, so it must stay injective over structure.
    pub fn node_text(&self, node: NodeId) -> String {
        match &self.arena[node].kind {
            NodeKind::Leaf { label } => label.to_string(),
            NodeKind::Root => self.children_text(node),
            NodeKind::Internal { label } => format!("{label}{}", self.children_text(node)),
        }
    }

    fn children_text(&self, node: NodeId) -> String {
        let parts: Vec<String> = self.arena[node]
            .children
            .iter()
            .map(|&c| self.node_text(c))
            .collect();
        format!("({})", parts.join(","))
    }
}

impl<L: fmt::Display> fmt::Display for Tree<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.node_text(self.root()))
    }
}

impl<L: fmt::Display> PartialEq for Tree<L> {
    fn eq(&self, other: &Self) -> bool {
        self.node_text(self.root()) == other.node_text(other.root())
    }
}

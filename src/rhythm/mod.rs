//! Rhythm trees: subdivision structure synthesized from exact onsets.
//!
//! A rhythm tree encodes a measure's rhythm in its shape alone: every
//! internal node's children divide that node's span equally, so a node with
//! k children gives each child 1/k of the parent's duration. Durations and
//! onsets are never stored; they are derived from child counts.
//!
//! [`RhythmTree::quantize`] searches candidate equal subdivisions of a
//! [Timeline] and keeps the one yielding the fewest leaves — the least
//! rhythmically complex complete tree. The search is exact: split points and
//! onset comparisons use rational arithmetic throughout, since a binary
//! float cannot decide whether an onset sits on a boundary like 1/3 of 1/7.

use crate::timeline::{rational, Artifact, Event, Rational, Timeline};
use crate::tree::{NodeId, NodeKind, StructureError, Tree};
use num_bigint::BigInt;
use num_traits::One;
use std::fmt;
use thiserror::Error;

/// Leaf payload of a rhythm tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RhythmLeaf {
    /// Sound sustained from the previous leaf; no onset here.
    Continuation,
    /// The artifacts sounding from this leaf's start instant.
    Onsets(Vec<Artifact>),
}

impl fmt::Display for RhythmLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RhythmLeaf::Continuation => f.write_str("c"),
            RhythmLeaf::Onsets(artifacts) => {
                let inner: Vec<String> = artifacts.iter().map(|a| a.to_string()).collect();
                write!(f, "[{}]", inner.join(","))
            }
        }
    }
}

/// "No tree produced" outcomes of quantization. Both collapse to the same
/// caller-visible failure but stay distinguishable for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantizeError {
    /// Two or more minimal-leaf subdivisions remained and no tie-break
    /// policy resolved them.
    #[error("no unique quantization: multiple minimal-leaf subdivisions")]
    Ambiguous,

    /// No candidate subdivision aligned every onset within the depth bound.
    #[error("no subdivision aligned the timeline within depth {0}")]
    DepthExceeded(usize),
}

/// Search parameters for [`RhythmTree::quantize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizeOptions {
    /// Candidate divisors tried at every node, typically `{2, 3}`;
    /// extend with 5 and 7 for quintuplets and septuplets.
    pub divisions: Vec<u32>,
    /// Maximum subdivision depth before a branch gives up.
    pub max_depth: usize,
    /// Preferred divisor per depth, consulted only to break exact ties
    /// between minimal-leaf candidates. `None` propagates ambiguity.
    pub tie_breaks: Option<Vec<u32>>,
}

impl Default for QuantizeOptions {
    fn default() -> Self {
        QuantizeOptions {
            divisions: vec![2, 3],
            max_depth: 7,
            tie_breaks: None,
        }
    }
}

/// Why a branch of the search produced no subtree.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Unresolved {
    DepthExceeded,
    Ambiguous,
}

/// A measure's rhythm as an equal-subdivision tree.
///
/// The root always has exactly one child covering the whole span; leaves
/// carry [RhythmLeaf] payloads left to right in onset order.
#[derive(Debug, Clone)]
pub struct RhythmTree {
    tree: Tree<RhythmLeaf>,
}

impl RhythmTree {
    /// Wraps an already-built node structure, checking that no internal
    /// node is childless.
    pub fn new(tree: Tree<RhythmLeaf>) -> Result<Self, StructureError> {
        tree.validate()?;
        Ok(RhythmTree { tree })
    }

    /// Infers the simplest subdivision tree reproducing the timeline's
    /// exact onsets.
    ///
    /// The timeline is first rescaled onto `[0, 1)`. At each node the
    /// search stops on a span whose events all sit on its start boundary
    /// (a leaf), or tries every allowed divisor and keeps the complete
    /// candidate with the fewest leaves. Exact ties either fall to the
    /// per-depth preference in `options.tie_breaks` or surface as
    /// [`QuantizeError::Ambiguous`]; a branch that cannot align within
    /// `options.max_depth` surfaces as [`QuantizeError::DepthExceeded`].
    pub fn quantize(
        timeline: &Timeline,
        options: &QuantizeOptions,
    ) -> Result<RhythmTree, QuantizeError> {
        let unit = timeline.shift_and_rescale(rational(0, 1), rational(1, 1));
        let mut scratch = Tree::new();
        match quantize_span(&mut scratch, &unit, 0, options) {
            Ok(top) => {
                // the search arena holds every explored candidate; keep only
                // the winning subtree
                let mut tree = Tree::new();
                let root = tree.root();
                copy_subtree(&scratch, top, &mut tree, root);
                Ok(RhythmTree { tree })
            }
            Err(Unresolved::Ambiguous) => {
                log::warn!("multiple minimal-leaf subdivisions for timeline {timeline}");
                Err(QuantizeError::Ambiguous)
            }
            Err(Unresolved::DepthExceeded) => Err(QuantizeError::DepthExceeded(options.max_depth)),
        }
    }

    /// Duration of a node as a fraction of the whole measure: the product
    /// of `1 / child_count` over its ancestor chain. The root's own span
    /// is 1.
    pub fn node_duration(&self, node: NodeId) -> Result<Rational, StructureError> {
        let mut duration = Rational::one();
        for ancestor in self.tree.ancestors(node)? {
            let count = self.tree.children(ancestor).len();
            duration /= Rational::from_integer(BigInt::from(count));
        }
        Ok(duration)
    }

    /// Exact onset of each leaf in `[0, 1)`, left to right: at every level
    /// a child's onsets shrink by the child count and shift by its index.
    pub fn leaf_onsets(&self) -> Vec<Rational> {
        self.onsets_under(self.tree.root())
    }

    fn onsets_under(&self, node: NodeId) -> Vec<Rational> {
        match self.tree.kind(node) {
            NodeKind::Leaf { .. } => vec![rational(0, 1)],
            NodeKind::Root | NodeKind::Internal { .. } => {
                let children = self.tree.children(node);
                let count = children.len() as i64;
                children
                    .iter()
                    .enumerate()
                    .flat_map(|(i, &child)| {
                        let offset = rational(i as i64, count);
                        self.onsets_under(child)
                            .into_iter()
                            .map(move |onset| onset / rational(count, 1) + &offset)
                    })
                    .collect()
            }
        }
    }

    /// Reconstructs a timeline over `[start, end)` from the leaves,
    /// skipping continuations: the round-trip partner of
    /// [`RhythmTree::quantize`].
    pub fn to_timeline(&self, start: Rational, end: Rational) -> Timeline {
        let mut events = Vec::new();
        for (leaf, onset) in self.tree.leaves().into_iter().zip(self.leaf_onsets()) {
            let artifacts = match self.tree.kind(leaf) {
                NodeKind::Leaf {
                    label: RhythmLeaf::Onsets(artifacts),
                } => artifacts,
                NodeKind::Leaf {
                    label: RhythmLeaf::Continuation,
                } => continue,
                NodeKind::Root | NodeKind::Internal { .. } => {
                    unreachable!("leaves() only returns leaf nodes")
                }
            };
            for artifact in artifacts {
                if *artifact != Artifact::Continuation {
                    events.push(Event::new(onset.clone(), artifact.clone()));
                }
            }
        }
        Timeline::new(events, rational(0, 1), rational(1, 1)).shift_and_rescale(start, end)
    }

    /// The underlying node structure.
    pub fn tree(&self) -> &Tree<RhythmLeaf> {
        &self.tree
    }
}

impl fmt::Display for RhythmTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tree.fmt(f)
    }
}

impl PartialEq for RhythmTree {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

/// Recursive search over one span. Returns the id of a complete subtree in
/// the scratch arena, or why none exists. Abandoned candidates simply stay
/// detached in the arena.
fn quantize_span(
    tree: &mut Tree<RhythmLeaf>,
    span: &Timeline,
    depth: usize,
    options: &QuantizeOptions,
) -> Result<NodeId, Unresolved> {
    if depth >= options.max_depth {
        return Err(Unresolved::DepthExceeded);
    }
    if span.events().iter().all(|e| e.timestamp == *span.start()) {
        // no subdivision left to do: everything sounds at this span's start
        return Ok(tree.new_leaf(leaf_label(span)));
    }

    let mut candidates: Vec<(u32, NodeId, usize)> = Vec::new();
    let mut saw_ambiguous = false;
    for &divisor in &options.divisions {
        let parts = span.split(divisor);
        let children: Vec<Result<NodeId, Unresolved>> = parts
            .iter()
            .map(|part| quantize_span(tree, part, depth + 1, options))
            .collect();
        if children.iter().any(|c| c.is_err()) {
            saw_ambiguous |= children.iter().any(|c| *c == Err(Unresolved::Ambiguous));
            log::debug!("depth {depth}: division by {divisor} leaves an unresolved branch");
            continue;
        }
        let node = tree.new_internal(String::new());
        for child in children.into_iter().flatten() {
            tree.attach(node, child);
        }
        candidates.push((divisor, node, tree.subtree_leaves(node)));
    }

    let min_leaves = match candidates.iter().map(|&(_, _, leaves)| leaves).min() {
        Some(min) => min,
        None => {
            return Err(if saw_ambiguous {
                Unresolved::Ambiguous
            } else {
                Unresolved::DepthExceeded
            })
        }
    };
    let tied: Vec<&(u32, NodeId, usize)> = candidates
        .iter()
        .filter(|&&(_, _, leaves)| leaves == min_leaves)
        .collect();
    if let [(_, node, _)] = tied.as_slice() {
        return Ok(*node);
    }

    // several divisors reach the minimum; only an explicit per-depth
    // preference may decide
    let preferred = options
        .tie_breaks
        .as_ref()
        .and_then(|prefs| prefs.get(depth))
        .and_then(|&pref| tied.iter().find(|&&&(divisor, _, _)| divisor == pref));
    match preferred {
        Some(&&(_, node, _)) => Ok(node),
        None => {
            log::debug!(
                "depth {depth}: {} divisions tie at {min_leaves} leaves",
                tied.len()
            );
            Err(Unresolved::Ambiguous)
        }
    }
}

/// Leaf payload for a span whose events all sit on its start boundary.
fn leaf_label(span: &Timeline) -> RhythmLeaf {
    match span.events() {
        [only] if only.artifact == Artifact::Continuation => RhythmLeaf::Continuation,
        events => RhythmLeaf::Onsets(events.iter().map(|e| e.artifact.clone()).collect()),
    }
}

fn copy_subtree(
    source: &Tree<RhythmLeaf>,
    node: NodeId,
    target: &mut Tree<RhythmLeaf>,
    parent: NodeId,
) {
    match source.kind(node) {
        NodeKind::Leaf { label } => {
            let copy = target.new_leaf(label.clone());
            target.attach(parent, copy);
        }
        NodeKind::Internal { label } => {
            let copy = target.new_internal(label.clone());
            target.attach(parent, copy);
            for &child in source.children(node) {
                copy_subtree(source, child, target, copy);
            }
        }
        NodeKind::Root => {
            for &child in source.children(node) {
                copy_subtree(source, child, target, parent);
            }
        }
    }
}

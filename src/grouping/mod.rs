//! Beam/tuplet grouping structure: flat marker sequences <-> nested trees.
//!
//! # Encoding contract
//!
//! For a measure's ordered events, each event carries one grouping marker per
//! nesting level, read left to right. `start .. continue .. stop` at level
//! `d` across a contiguous run means those events are siblings under one
//! internal node at depth `d`; nested groups recurse into level `d + 1`
//! using only that run. `partial` marks an event grouped with nobody (a
//! lone beam flag with no partner): it manufactures a one-child internal
//! node and recurses into the remaining levels of that single event. An
//! event whose marker list is exhausted at the current depth becomes a leaf.
//!
//! Malformed sequences indicate an upstream extraction bug and fail fast as
//! [GroupingError]; nothing is silently repaired.

use crate::tree::{NodeId, NodeKind, StructureError, Tree};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Per-level grouping marker attached to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMarker {
    Start,
    Continue,
    Stop,
    Partial,
}

impl fmt::Display for GroupingMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingMarker::Start => f.write_str("start"),
            GroupingMarker::Continue => f.write_str("continue"),
            GroupingMarker::Stop => f.write_str("stop"),
            GroupingMarker::Partial => f.write_str("partial"),
        }
    }
}

/// Violations of the `start`/`continue`/`stop` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupingError {
    #[error("{markers} marker lists, {labels} label lists and {figures} figures differ in length")]
    LengthMismatch {
        markers: usize,
        labels: usize,
        figures: usize,
    },

    #[error("event {event}: '{marker}' at level {level} requires an open group")]
    NoOpenGroup {
        event: usize,
        level: usize,
        marker: GroupingMarker,
    },

    #[error("event {event}: '{marker}' at level {level} conflicts with the group open since event {open}")]
    GroupAlreadyOpen {
        event: usize,
        level: usize,
        marker: GroupingMarker,
        open: usize,
    },

    #[error("event {event}: markers end at level {level} inside the group open since event {open}")]
    LeafInsideGroup {
        event: usize,
        level: usize,
        open: usize,
    },

    #[error("group opened at event {open} (level {level}) is never closed")]
    UnclosedGroup { open: usize, level: usize },

    #[error("event {event}: no grouping label at level {level}")]
    MissingLevelLabel { event: usize, level: usize },
}

/// One pitch of a leaf record: natural pitch position (step and octave,
/// e.g. "E5"), chromatic alteration, and whether the note is tied to the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub step: String,
    pub alteration: Option<i32>,
    pub tied: bool,
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.step)?;
        match self.alteration {
            None => {}
            Some(0) => f.write_str("n")?,
            Some(a) if a > 0 => f.write_str(&"#".repeat(a as usize))?,
            Some(a) => f.write_str(&"b".repeat(a.unsigned_abs() as usize))?,
        }
        if self.tied {
            f.write_str("T")?;
        }
        Ok(())
    }
}

/// Rest marker or sounding pitches of a leaf record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FigureContent {
    Rest,
    Notes(Vec<Pitch>),
}

/// Fixed-shape leaf record of a grouping tree: what the event is, with the
/// note-head class (1 whole, 2 half, 4 quarter or shorter — shorter
/// durations live in the grouping structure, not the head), dot count, and
/// the grace flag (a grace note has no rhythmic duration of its own).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFigure {
    pub content: FigureContent,
    pub head: u8,
    pub dots: u8,
    pub grace: bool,
}

impl NoteFigure {
    pub fn rest(head: u8, dots: u8) -> Self {
        NoteFigure {
            content: FigureContent::Rest,
            head,
            dots,
            grace: false,
        }
    }

    pub fn notes(pitches: Vec<Pitch>, head: u8, dots: u8, grace: bool) -> Self {
        NoteFigure {
            content: FigureContent::Notes(pitches),
            head,
            dots,
            grace,
        }
    }
}

impl fmt::Display for NoteFigure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            FigureContent::Rest => f.write_str("R")?,
            FigureContent::Notes(pitches) => {
                let inner: Vec<String> = pitches.iter().map(|p| p.to_string()).collect();
                write!(f, "[{}]", inner.join(","))?;
            }
        }
        write!(f, "{}{}", self.head, "*".repeat(self.dots as usize))?;
        if self.grace {
            f.write_str("gn")?;
        }
        Ok(())
    }
}

/// A grouping tree (beaming or tuplet structure) over one measure's events.
///
/// Internal-node labels are free-form annotations: empty strings for beams,
/// tuplet ratio text (optionally suffixed to mark an explicit bracket) for
/// tuplets. Leaves carry [NoteFigure] records.
#[derive(Debug, Clone)]
pub struct GroupingTree {
    tree: Tree<NoteFigure>,
}

impl GroupingTree {
    /// Wraps an already-built node structure, checking that no internal
    /// node is childless.
    pub fn new(tree: Tree<NoteFigure>) -> Result<Self, StructureError> {
        tree.validate()?;
        Ok(GroupingTree { tree })
    }

    /// Builds the tree from the flat sequential encoding: per-event marker
    /// lists, per-event internal-label lists (one string per level), and
    /// one leaf record per event.
    pub fn from_markers(
        markers: &[Vec<GroupingMarker>],
        level_labels: &[Vec<String>],
        figures: &[NoteFigure],
    ) -> Result<Self, GroupingError> {
        if markers.len() != level_labels.len() || markers.len() != figures.len() {
            return Err(GroupingError::LengthMismatch {
                markers: markers.len(),
                labels: level_labels.len(),
                figures: figures.len(),
            });
        }
        let mut tree = Tree::new();
        let root = tree.root();
        build_run(&mut tree, root, markers, level_labels, figures, 0, 0)?;
        Ok(GroupingTree { tree })
    }

    /// Serializes the tree back into the flat encoding. Exact left inverse
    /// of [`GroupingTree::from_markers`] for any tree built by it.
    pub fn to_markers(&self) -> (Vec<Vec<GroupingMarker>>, Vec<Vec<String>>) {
        let mut structure = Vec::new();
        let mut info = Vec::new();
        for &child in self.tree.children(self.tree.root()) {
            let (sub_structure, sub_info) = self.serialize_subtree(child);
            structure.extend(sub_structure);
            info.extend(sub_info);
        }
        (structure, info)
    }

    fn serialize_subtree(&self, node: NodeId) -> (Vec<Vec<GroupingMarker>>, Vec<Vec<String>>) {
        let label = match self.tree.kind(node) {
            NodeKind::Leaf { .. } => return (vec![vec![]], vec![vec![]]),
            NodeKind::Internal { label } => label.clone(),
            NodeKind::Root => unreachable!("the root is never serialized as a subtree"),
        };
        let leaf_count = self.tree.subtree_leaves(node);
        let mut structure: Vec<Vec<GroupingMarker>> = if leaf_count > 1 {
            let mut run = vec![vec![GroupingMarker::Start]];
            run.extend(vec![vec![GroupingMarker::Continue]; leaf_count - 2]);
            run.push(vec![GroupingMarker::Stop]);
            run
        } else {
            vec![vec![GroupingMarker::Partial]]
        };
        let mut info = vec![vec![label]; leaf_count];

        let mut offset = 0;
        for &child in self.tree.children(node) {
            let (sub_structure, sub_info) = self.serialize_subtree(child);
            for (sub_markers, sub_labels) in sub_structure.into_iter().zip(sub_info) {
                structure[offset].extend(sub_markers);
                info[offset].extend(sub_labels);
                offset += 1;
            }
        }
        (structure, info)
    }

    /// Grouping depth between each pair of adjacent leaves: the depth of
    /// their lowest common ancestor. For beaming trees this is the number
    /// of beams connecting two adjacent notes.
    pub fn groupings_between(&self) -> Result<Vec<usize>, StructureError> {
        let leaves = self.tree.leaves();
        leaves
            .windows(2)
            .map(|pair| {
                let lca = self.tree.lowest_common_ancestor(pair[0], pair[1])?;
                self.tree.depth(lca)
            })
            .collect()
    }

    /// Grouping depth over each leaf: its depth minus one. For beaming
    /// trees this is the number of beams over each note.
    pub fn groupings_over(&self) -> Result<Vec<usize>, StructureError> {
        self.tree
            .leaves()
            .into_iter()
            .map(|leaf| Ok(self.tree.depth(leaf)? - 1))
            .collect()
    }

    /// The leaf records, left to right.
    pub fn figures(&self) -> Vec<&NoteFigure> {
        self.tree
            .leaves()
            .into_iter()
            .map(|leaf| match self.tree.kind(leaf) {
                NodeKind::Leaf { label } => label,
                NodeKind::Root | NodeKind::Internal { .. } => {
                    unreachable!("leaves() only returns leaf nodes")
                }
            })
            .collect()
    }

    /// The underlying node structure.
    pub fn tree(&self) -> &Tree<NoteFigure> {
        &self.tree
    }
}

impl fmt::Display for GroupingTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tree.fmt(f)
    }
}

impl PartialEq for GroupingTree {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

/// Recursive builder over one run of events at one nesting level.
/// `base` is the run's offset in the original sequence, for error reporting.
fn build_run(
    tree: &mut Tree<NoteFigure>,
    parent: NodeId,
    markers: &[Vec<GroupingMarker>],
    level_labels: &[Vec<String>],
    figures: &[NoteFigure],
    base: usize,
    depth: usize,
) -> Result<(), GroupingError> {
    let mut open: Option<usize> = None;
    for (i, levels) in markers.iter().enumerate() {
        let Some(&marker) = levels.get(depth) else {
            // markers exhausted: this event is a leaf at the current depth
            if let Some(open_at) = open {
                return Err(GroupingError::LeafInsideGroup {
                    event: base + i,
                    level: depth,
                    open: base + open_at,
                });
            }
            let leaf = tree.new_leaf(figures[i].clone());
            tree.attach(parent, leaf);
            continue;
        };
        match marker {
            GroupingMarker::Partial => {
                if let Some(open_at) = open {
                    return Err(GroupingError::GroupAlreadyOpen {
                        event: base + i,
                        level: depth,
                        marker,
                        open: base + open_at,
                    });
                }
                let label = level_label(level_labels, base, i, depth)?;
                let node = tree.new_internal(label);
                tree.attach(parent, node);
                build_run(
                    tree,
                    node,
                    &markers[i..=i],
                    &level_labels[i..=i],
                    &figures[i..=i],
                    base + i,
                    depth + 1,
                )?;
            }
            GroupingMarker::Start => {
                if let Some(open_at) = open {
                    return Err(GroupingError::GroupAlreadyOpen {
                        event: base + i,
                        level: depth,
                        marker,
                        open: base + open_at,
                    });
                }
                open = Some(i);
            }
            GroupingMarker::Continue => {
                if open.is_none() {
                    return Err(GroupingError::NoOpenGroup {
                        event: base + i,
                        level: depth,
                        marker,
                    });
                }
            }
            GroupingMarker::Stop => {
                let Some(open_at) = open else {
                    return Err(GroupingError::NoOpenGroup {
                        event: base + i,
                        level: depth,
                        marker,
                    });
                };
                // the internal node takes its label from the closing event
                let label = level_label(level_labels, base, i, depth)?;
                let node = tree.new_internal(label);
                tree.attach(parent, node);
                build_run(
                    tree,
                    node,
                    &markers[open_at..=i],
                    &level_labels[open_at..=i],
                    &figures[open_at..=i],
                    base + open_at,
                    depth + 1,
                )?;
                open = None;
            }
        }
    }
    if let Some(open_at) = open {
        return Err(GroupingError::UnclosedGroup {
            open: base + open_at,
            level: depth,
        });
    }
    Ok(())
}

fn level_label(
    level_labels: &[Vec<String>],
    base: usize,
    i: usize,
    depth: usize,
) -> Result<String, GroupingError> {
    level_labels[i]
        .get(depth)
        .cloned()
        .ok_or(GroupingError::MissingLevelLabel {
            event: base + i,
            level: depth,
        })
}

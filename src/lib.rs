//! Rhythm and grouping structure for measures of music notation.
//!
//! This crate converts between two representations of the rhythmic and
//! notational structure inside a measure:
//!
//! - a **flat sequential encoding**: one grouping marker per event
//!   (`start`/`continue`/`stop`/`partial` beam or tuplet markers), or a
//!   time-ordered list of exact-rational onsets;
//! - a **hierarchical tree encoding**: nested groups whose leaves are the
//!   musical events.
//!
//! [`grouping::GroupingTree`] losslessly re-expresses existing beaming and
//! tuplet markers as a tree, so structural questions (grouping depth,
//! lowest common ancestor, grouping span) become tree operations.
//! [`rhythm::RhythmTree`] goes the other way: it synthesizes a previously
//! unknown grouping from an ungrouped, exactly-timed [`timeline::Timeline`]
//! by searching candidate equal subdivisions and keeping the one with the
//! fewest leaves. Both sit on the arena tree in [`tree`].
//!
//! Score-library extraction, rendering, and score reconstruction are
//! external collaborators: they produce the marker sequences and leaf
//! records this crate consumes, and consume the sequences it reproduces.

pub mod grouping;
pub mod rhythm;
pub mod timeline;
pub mod tree;

// Re-export commonly used types
pub use grouping::{FigureContent, GroupingError, GroupingMarker, GroupingTree, NoteFigure, Pitch};
pub use rhythm::{QuantizeError, QuantizeOptions, RhythmLeaf, RhythmTree};
pub use timeline::{rational, Artifact, Event, Rational, TimeKind, Timeline, TimelineError, Voices};
pub use tree::{NodeId, NodeKind, StructureError, Tree};

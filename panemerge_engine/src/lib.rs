//! Two- and three-way diff reconciliation over line sources.
//!
//! This crate compares a middle pane against one or two outer panes, keeps
//! the comparison current under small edits, reconciles both sides into
//! ordered merge records with conflict detection, and writes merged text.
//!
//! Primary entrypoints:
//! - [`SequenceMatcher`] for raw two-sequence comparison
//! - [`Differ`] for pane comparisons, incremental updates and queries
//! - [`Merger`] for two- and three-way merged output
//! - [`summarize`] and [`format_markdown_report`] for reporting
//!
//! # Example
//!
//! ```rust
//! use panemerge_engine::{Merger, ThreeWayMerge};
//! use panemerge_text::LineSource;
//!
//! let local = vec!["a", "B", "c"];
//! let base = vec!["a", "b", "c"];
//! let remote = vec!["a", "b", "C"];
//! let panes: Vec<&dyn LineSource> = vec![&local, &base, &remote];
//!
//! let mut merger = Merger::new();
//! merger.initialize(&panes).unwrap();
//! let ThreeWayMerge { text, unresolved } = merger.merge_three(true, &panes).unwrap();
//! assert_eq!(text, "a\nB\nC");
//! assert!(unresolved.is_empty());
//! ```

mod automerge;
mod chunk;
mod differ;
mod error;
mod index;
mod inline;
mod intern;
mod matcher;
mod options;
mod reconcile;
mod report;

pub use automerge::{Merger, ThreeWayMerge};
pub use chunk::{Chunk, ChunkChanges, ChunkLocation, ChunkTag, LineWindow, MergeRecord, Side};
pub use differ::{DiffTask, Differ, SyncPoint};
pub use error::EngineError;
pub use inline::InlineMatchCache;
pub use matcher::{MatchHeuristic, MatchProgress, MatchingBlock, SequenceMatcher};
pub use options::{DEFAULT_CONFLICT_MARKER, EngineOptions, InlineOptions};
pub use reconcile::ConflictPolicy;
pub use report::{ComparisonSummary, DiffStats, format_markdown_report, summarize};

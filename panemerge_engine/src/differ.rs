//! Pairwise differ over up to three panes with incremental re-diffing.
//!
//! The middle pane (index 1) is compared against pane 0 and, with three
//! panes, against pane 2. Only difference chunks are stored; equal spans are
//! implicit between them. Every change to the pairwise lists is followed by a
//! full re-merge into [`MergeRecord`]s and a rebuild of the line index.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use panemerge_text::{FilteredLines, LineSource, TextFilter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::{
    Chunk, ChunkChanges, ChunkLocation, ChunkTag, LineWindow, MergeRecord, Side, shift,
};
use crate::error::EngineError;
use crate::index::LineIndex;
use crate::intern::{LineInterner, fingerprint};
use crate::matcher::{MatchProgress, SequenceMatcher};
use crate::options::EngineOptions;
use crate::reconcile::{consume_blank_lines, merge_diffs};

/// Lines pinned to each other across panes, indexed by pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPoint {
    pub lines: Vec<usize>,
}

impl SyncPoint {
    pub fn new(lines: impl Into<Vec<usize>>) -> Self {
        Self {
            lines: lines.into(),
        }
    }
}

type Listener = Box<dyn FnMut(&ChunkChanges) + Send>;

/// Snapshot of a full comparison, advanced with [`DiffTask::step`] and
/// installed with [`Differ::finish_set_sequences`].
#[derive(Debug, Clone)]
pub struct DiffTask {
    seq_lens: Vec<usize>,
    fingerprints: Vec<u64>,
    matchers: Vec<SequenceMatcher<u32>>,
    current: usize,
}

impl DiffTask {
    /// Advance the current pair by a bounded amount of work.
    pub fn step(&mut self) -> MatchProgress {
        let Some(matcher) = self.matchers.get_mut(self.current) else {
            return MatchProgress::Complete;
        };
        if matcher.step() == MatchProgress::Complete {
            self.current += 1;
        }
        if self.current >= self.matchers.len() {
            MatchProgress::Complete
        } else {
            MatchProgress::Pending
        }
    }

    pub fn run(&mut self) {
        while self.step() == MatchProgress::Pending {}
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.matchers.len()
    }
}

/// Pairwise comparison state for one editing session.
pub struct Differ {
    options: EngineOptions,
    filter: Arc<TextFilter>,
    seq_lens: Vec<usize>,
    diffs: Vec<Vec<Chunk>>,
    records: Vec<MergeRecord>,
    conflicts: Vec<usize>,
    mergeable: [bool; 4],
    index: LineIndex,
    sync_points: Vec<SyncPoint>,
    initialised: bool,
    listeners: Vec<Listener>,
}

impl fmt::Debug for Differ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Differ")
            .field("options", &self.options)
            .field("seq_lens", &self.seq_lens)
            .field("diffs", &self.diffs)
            .field("records", &self.records)
            .field("conflicts", &self.conflicts)
            .field("sync_points", &self.sync_points)
            .field("initialised", &self.initialised)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Differ {
    fn default() -> Self {
        Self::with_filter(EngineOptions::default(), TextFilter::default())
    }
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    /// Differ using `options`, compiling its filter rules.
    pub fn with_options(options: EngineOptions) -> Result<Self, EngineError> {
        let filter = TextFilter::compile(&options.filters)?;
        if !filter.is_empty() {
            debug!(filters = ?filter.labels().collect::<Vec<_>>(), "compiled line filters");
        }
        Ok(Self::with_filter(options, filter))
    }

    pub(crate) fn with_filter(options: EngineOptions, filter: TextFilter) -> Self {
        Self {
            options,
            filter: Arc::new(filter),
            seq_lens: Vec::new(),
            diffs: Vec::new(),
            records: Vec::new(),
            conflicts: Vec::new(),
            mergeable: [false; 4],
            index: LineIndex::default(),
            sync_points: Vec::new(),
            initialised: false,
            listeners: Vec::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Number of panes of the last comparison.
    pub fn pane_count(&self) -> usize {
        self.seq_lens.len()
    }

    /// Line count the differ currently assumes for `pane`.
    pub fn line_count(&self, pane: usize) -> Option<usize> {
        self.seq_lens.get(pane).copied()
    }

    /// Register a callback receiving the changes of every re-merge.
    pub fn subscribe(&mut self, listener: impl FnMut(&ChunkChanges) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Replace the synchronisation points used by the next full comparison.
    ///
    /// Points must be strictly increasing in every pane they cover.
    pub fn set_sync_points(&mut self, points: Vec<SyncPoint>) -> Result<(), EngineError> {
        for (index, pair) in points.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            for pane in 0..prev.lines.len().min(next.lines.len()) {
                if next.lines[pane] <= prev.lines[pane] {
                    return Err(EngineError::SyncPointOrder {
                        index: index + 1,
                        pane,
                    });
                }
            }
        }
        self.sync_points = points;
        Ok(())
    }

    pub fn sync_points(&self) -> &[SyncPoint] {
        &self.sync_points
    }

    /// Toggle blank-line suppression, re-merging when sequences are set.
    pub fn set_ignore_blank_lines(
        &mut self,
        ignore: bool,
        panes: &[&dyn LineSource],
    ) -> Result<ChunkChanges, EngineError> {
        self.options.ignore_blank_lines = ignore;
        if !self.initialised {
            return Ok(ChunkChanges::default());
        }
        self.check_panes(panes)?;

        let filter = Arc::clone(&self.filter);
        let views = filtered_views(&filter, panes);
        let sources = as_sources(&views);
        let old = self.records.clone();
        Ok(self.remerge(&sources, old, None))
    }

    /// Compare all panes from scratch.
    pub fn set_sequences(
        &mut self,
        panes: &[&dyn LineSource],
    ) -> Result<ChunkChanges, EngineError> {
        let mut task = self.begin_set_sequences(panes)?;
        task.run();
        self.finish_set_sequences(task, panes)
    }

    /// Snapshot `panes` into a resumable comparison without touching the
    /// current state.
    pub fn begin_set_sequences(&self, panes: &[&dyn LineSource]) -> Result<DiffTask, EngineError> {
        if panes.is_empty() || panes.len() > 3 {
            return Err(EngineError::PaneCount {
                actual: panes.len(),
            });
        }
        if let Some(point) = self
            .sync_points
            .iter()
            .find(|point| point.lines.len() < panes.len())
        {
            return Err(EngineError::PaneMismatch {
                expected: panes.len(),
                actual: point.lines.len(),
            });
        }

        let views = filtered_views(&self.filter, panes);
        let sources = as_sources(&views);
        let seq_lens = sources.iter().map(|pane| pane.line_count()).collect::<Vec<_>>();
        let fingerprints = sources.iter().map(|pane| fingerprint(*pane)).collect();

        let matchers = (0..panes.len() - 1)
            .map(|which| {
                let other = which * 2;
                let mut interner = LineInterner::default();
                let a = interner.intern_range(sources[1], 0..seq_lens[1]);
                let b = interner.intern_range(sources[other], 0..seq_lens[other]);
                let points = self
                    .sync_points
                    .iter()
                    .map(|point| (point.lines[1], point.lines[other]))
                    .collect::<Vec<_>>();
                SequenceMatcher::with_sync_points(a, b, &points)
            })
            .collect();

        Ok(DiffTask {
            seq_lens,
            fingerprints,
            matchers,
            current: 0,
        })
    }

    /// Install a finished (or finish an unfinished) [`DiffTask`].
    pub fn finish_set_sequences(
        &mut self,
        mut task: DiffTask,
        panes: &[&dyn LineSource],
    ) -> Result<ChunkChanges, EngineError> {
        if panes.len() != task.seq_lens.len() {
            return Err(EngineError::PaneMismatch {
                expected: task.seq_lens.len(),
                actual: panes.len(),
            });
        }
        let filter = Arc::clone(&self.filter);
        let views = filtered_views(&filter, panes);
        let sources = as_sources(&views);
        let snapshot = task.seq_lens.iter().zip(&task.fingerprints);
        for (pane, (source, (&len, &print))) in sources.iter().zip(snapshot).enumerate() {
            if source.line_count() != len || fingerprint(*source) != print {
                return Err(EngineError::StaleTask { pane });
            }
        }

        task.run();
        self.diffs = task
            .matchers
            .iter_mut()
            .map(SequenceMatcher::difference_opcodes)
            .collect();
        self.seq_lens = task.seq_lens;
        self.initialised = true;
        debug!(
            panes = self.seq_lens.len(),
            lines = ?self.seq_lens,
            chunks = ?self.diffs.iter().map(Vec::len).collect::<Vec<_>>(),
            "full comparison finished"
        );

        let old = self.records.clone();
        Ok(self.remerge(&sources, old, None))
    }

    /// Apply an edit notification: `delta` lines were added (or removed,
    /// when negative) at `start` in `pane`. `panes` must already reflect it.
    pub fn change_sequence(
        &mut self,
        pane: usize,
        start: usize,
        delta: isize,
        panes: &[&dyn LineSource],
    ) -> Result<ChunkChanges, EngineError> {
        if !self.initialised {
            return Err(EngineError::NotInitialised);
        }
        let count = self.seq_lens.len();
        if pane >= count {
            return Err(EngineError::PaneOutOfRange { pane, panes: count });
        }
        self.check_panes(panes)?;

        let filter = Arc::clone(&self.filter);
        let views = filtered_views(&filter, panes);
        let sources = as_sources(&views);

        self.shift_sync_points(pane, start, delta);
        if pane <= 1 && count > 1 {
            self.rediff_pair(0, pane, start, delta, &sources);
        }
        if count == 3 && pane >= 1 {
            self.rediff_pair(1, pane, start, delta, &sources);
        }
        self.seq_lens[pane] = shift(self.seq_lens[pane], delta);

        let (old, changed) = self.expected_records(pane, start, delta);
        Ok(self.remerge(&sources, old, changed))
    }

    /// Drop all comparison state, including panes and sync points.
    pub fn clear(&mut self) -> ChunkChanges {
        let removed = std::mem::take(&mut self.records);
        self.diffs.clear();
        self.seq_lens.clear();
        self.sync_points.clear();
        self.conflicts.clear();
        self.mergeable = [false; 4];
        self.index = LineIndex::default();
        self.initialised = false;

        let changes = ChunkChanges {
            removed,
            added: Vec::new(),
            modified: None,
        };
        self.notify(&changes);
        changes
    }

    pub fn all_changes(&self) -> &[MergeRecord] {
        &self.records
    }

    pub fn diff_count(&self) -> usize {
        self.records.len()
    }

    /// Indices of records where either side conflicts.
    pub fn conflicts(&self) -> &[usize] {
        &self.conflicts
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Whether every pairwise comparison found no differences.
    pub fn sequences_identical(&self) -> bool {
        self.initialised && self.diffs.iter().all(Vec::is_empty)
    }

    /// Record `index` as seen from `from` towards `to`.
    ///
    /// Chunks are reversed when `from` is an outer pane. Asking from the
    /// middle pane without a target falls back to the right side.
    pub fn get_chunk(&self, index: usize, from: usize, to: Option<usize>) -> Option<Chunk> {
        let record = self.records.get(index)?;
        let side = if from == 2 || to == Some(2) {
            Side::Right
        } else {
            Side::Left
        };
        let chunk = record.side(side);
        if from == 0 || from == 2 {
            return chunk.map(|c| c.reversed());
        }
        if to.is_none() && chunk.is_none() {
            return record.right;
        }
        chunk
    }

    /// Record containing `line` of `pane` and its neighbours.
    pub fn locate_chunk(&self, pane: usize, line: usize) -> Option<ChunkLocation> {
        self.index.locate(pane, line)
    }

    /// Next record touching `pane` after the one at `line`.
    pub fn next_chunk(&self, pane: usize, line: usize) -> Option<usize> {
        self.locate_chunk(pane, line)?.next
    }

    /// Previous record touching `pane` before the one at `line`.
    pub fn prev_chunk(&self, pane: usize, line: usize) -> Option<usize> {
        self.locate_chunk(pane, line)?.prev
    }

    /// Whether records touching `pane` can be pushed into its neighbours:
    /// `(towards the previous pane, towards the next pane)`.
    pub fn has_mergeable_changes(&self, pane: usize) -> (bool, bool) {
        let flag = |idx: usize| self.mergeable.get(idx).copied().unwrap_or(false);
        (flag(pane), flag(pane + 1))
    }

    /// Changes between panes `from` and `to`, with `a` ranges in `from`.
    ///
    /// One of the two panes must be the middle one. A window keeps chunks
    /// touching either of its line ranges.
    pub fn pair_changes(
        &self,
        from: usize,
        to: usize,
        window: Option<LineWindow>,
    ) -> Result<Vec<Chunk>, EngineError> {
        let count = self.seq_lens.len();
        let valid = matches!((from, to), (0, 1) | (1, 0) | (1, 2) | (2, 1))
            && from < count
            && to < count;
        if !valid {
            return Err(EngineError::InvalidPanePair { from, to });
        }

        let side = if from == 2 || to == 2 {
            Side::Right
        } else {
            Side::Left
        };
        let chunks = self
            .records
            .iter()
            .filter_map(|record| record.side(side))
            .map(|chunk| if from == 1 { chunk } else { chunk.reversed() })
            .filter(|chunk| {
                window.is_none_or(|w| {
                    overlaps(chunk.start_a, chunk.end_a, w.from_start, w.from_end)
                        || overlaps(chunk.start_b, chunk.end_b, w.to_start, w.to_end)
                })
            })
            .collect();
        Ok(chunks)
    }

    /// Changes touching `pane`, with `a` ranges in that pane.
    pub fn single_changes(&self, pane: usize, window: Option<Range<usize>>) -> Vec<Chunk> {
        self.records
            .iter()
            .filter_map(|record| match pane {
                0 => record.left.map(|c| c.reversed()),
                2 => record.right.map(|c| c.reversed()),
                _ => record.any(),
            })
            .filter(|chunk| {
                window
                    .as_ref()
                    .is_none_or(|w| overlaps(chunk.start_a, chunk.end_a, w.start, w.end))
            })
            .collect()
    }

    /// Whether `chunk` (middle-relative, towards `to_pane`) is a current record side.
    pub fn has_chunk(&self, to_pane: usize, chunk: &Chunk) -> bool {
        let side = if to_pane == 2 { Side::Right } else { Side::Left };
        self.locate_chunk(1, chunk.start_a)
            .and_then(|loc| loc.chunk)
            .and_then(|idx| self.records.get(idx))
            .is_some_and(|record| record.side(side) == Some(*chunk))
    }

    /// Start line of record `index` in each pane it touches.
    pub fn chunk_starts(&self, index: usize) -> Option<[Option<usize>; 3]> {
        let record = self.records.get(index)?;
        Some([
            record.left.map(|c| c.start_b),
            record.any().map(|c| c.start_a),
            record.right.map(|c| c.start_b),
        ])
    }

    fn check_panes(&self, panes: &[&dyn LineSource]) -> Result<(), EngineError> {
        if panes.len() != self.seq_lens.len() {
            return Err(EngineError::PaneMismatch {
                expected: self.seq_lens.len(),
                actual: panes.len(),
            });
        }
        Ok(())
    }

    fn shift_sync_points(&mut self, pane: usize, start: usize, delta: isize) {
        for point in &mut self.sync_points {
            if let Some(line) = point.lines.get_mut(pane)
                && *line > start
            {
                *line = shift(*line, delta).max(start);
            }
        }
    }

    /// Re-diff the region of pair `which` around an edit of `pane`.
    fn rediff_pair(
        &mut self,
        which: usize,
        pane: usize,
        start: usize,
        delta: isize,
        sources: &[&dyn LineSource],
    ) {
        let other = which * 2;
        let diffs = &self.diffs[which];
        let end_in_pane = |chunk: &Chunk| if pane == 1 { chunk.end_a } else { chunk.end_b };
        let locate = |line: usize| {
            diffs
                .iter()
                .position(|chunk| line < end_in_pane(chunk))
                .unwrap_or(diffs.len())
        };

        let mut lo = locate(start);
        let mut hi = if delta < 0 {
            locate(start + delta.unsigned_abs())
        } else {
            lo
        };
        let (lo_other, lo_mid) = if lo > 0 {
            lo -= 1;
            (diffs[lo].start_b, diffs[lo].start_a)
        } else {
            (0, 0)
        };
        let (hi_other, hi_mid) = if hi < diffs.len() {
            hi += 1;
            (diffs[hi - 1].end_b, diffs[hi - 1].end_a)
        } else {
            (self.seq_lens[other], self.seq_lens[1])
        };

        let mut added = [0isize; 3];
        added[pane] = delta;
        let range_mid = lo_mid..shift(hi_mid, added[1]).max(lo_mid);
        let range_other = lo_other..shift(hi_other, added[other]).max(lo_other);

        let points = self
            .sync_points
            .iter()
            .filter_map(|point| Some((*point.lines.get(1)?, *point.lines.get(other)?)))
            .filter(|&(mid, out)| {
                (range_mid.start..=range_mid.end).contains(&mid)
                    && (range_other.start..=range_other.end).contains(&out)
            })
            .map(|(mid, out)| (mid - range_mid.start, out - range_other.start))
            .collect::<Vec<_>>();

        let mut interner = LineInterner::default();
        let a = interner.intern_range(sources[1], range_mid.clone());
        let b = interner.intern_range(sources[other], range_other.clone());
        let fresh = SequenceMatcher::with_sync_points(a, b, &points)
            .difference_opcodes()
            .into_iter()
            .map(|chunk| chunk.offset_by(range_mid.start, range_other.start))
            .collect::<Vec<_>>();

        debug!(
            pair = which,
            pane,
            start,
            delta,
            middle = ?range_mid,
            other = ?range_other,
            replaced = hi - lo,
            fresh = fresh.len(),
            "incremental re-diff"
        );

        let diffs = &mut self.diffs[which];
        for chunk in &mut diffs[hi..] {
            *chunk = chunk.shifted(added[1], added[other]);
        }
        diffs.splice(lo..hi, fresh);
    }

    /// Previous records moved by the edit as if nothing else changed, and the
    /// record containing the edit location.
    fn expected_records(
        &self,
        pane: usize,
        start: usize,
        delta: isize,
    ) -> (Vec<MergeRecord>, Option<MergeRecord>) {
        let three = self.seq_lens.len() == 3;
        let mut changed = None;
        let old = self
            .records
            .iter()
            .map(|record| {
                let hit = match pane {
                    0 => record.left.is_some_and(|c| c.start_b <= start && start < c.end_b),
                    2 => record.right.is_some_and(|c| c.start_b <= start && start < c.end_b),
                    _ => record.left.is_some_and(|c| c.start_a <= start && start < c.end_a),
                };
                let moved = match pane {
                    0 => MergeRecord {
                        left: record.left.map(|c| c.offset_after(start, 0, delta)),
                        right: record.right,
                    },
                    2 => MergeRecord {
                        left: record.left,
                        right: record.right.map(|c| c.offset_after(start, 0, delta)),
                    },
                    _ => MergeRecord {
                        left: record.left.map(|c| c.offset_after(start, delta, 0)),
                        right: if three {
                            record.right.map(|c| c.offset_after(start, delta, 0))
                        } else {
                            record.right
                        },
                    },
                };
                if hit && changed.is_none() {
                    changed = Some(moved);
                }
                moved
            })
            .collect();
        (old, changed)
    }

    fn remerge(
        &mut self,
        sources: &[&dyn LineSource],
        old: Vec<MergeRecord>,
        changed: Option<MergeRecord>,
    ) -> ChunkChanges {
        let left = self.diffs.first().map_or(&[][..], Vec::as_slice);
        let right = self.diffs.get(1).map_or(&[][..], Vec::as_slice);
        let mut records = merge_diffs(left, right, sources, self.options.conflict_policy);
        if self.options.ignore_blank_lines {
            records = consume_blank_lines(records, sources);
        }

        let old_set = old.into_iter().collect::<BTreeSet<_>>();
        let new_set = records.iter().copied().collect::<BTreeSet<_>>();
        let removed = old_set.difference(&new_set).copied().collect::<Vec<_>>();
        let added = new_set.difference(&old_set).copied().collect::<Vec<_>>();
        let modified = changed.filter(|record| !removed.contains(record));

        self.conflicts = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_conflict())
            .map(|(idx, _)| idx)
            .collect();
        let mergeable_side = |side: Side| {
            records
                .iter()
                .filter_map(|record| record.side(side))
                .any(|chunk| chunk.tag != ChunkTag::Conflict)
        };
        self.mergeable = [false, mergeable_side(Side::Left), mergeable_side(Side::Right), false];
        self.index = LineIndex::build(&records, &self.seq_lens);
        self.records = records;

        debug!(
            records = self.records.len(),
            conflicts = self.conflicts.len(),
            removed = removed.len(),
            added = added.len(),
            "merge records rebuilt"
        );

        let changes = ChunkChanges {
            removed,
            added,
            modified,
        };
        self.notify(&changes);
        changes
    }

    fn notify(&mut self, changes: &ChunkChanges) {
        for listener in &mut self.listeners {
            listener(changes);
        }
    }
}

/// Closed-interval overlap, so empty ranges at a boundary still count.
fn overlaps(start: usize, end: usize, lo: usize, hi: usize) -> bool {
    start <= hi && lo <= end
}

fn filtered_views<'a>(
    filter: &'a TextFilter,
    panes: &[&'a dyn LineSource],
) -> Vec<FilteredLines<'a, dyn LineSource + 'a>> {
    panes.iter().map(|pane| filter.view(*pane)).collect()
}

fn as_sources<'a>(views: &'a [FilteredLines<'a, dyn LineSource + 'a>]) -> Vec<&'a dyn LineSource> {
    views.iter().map(|view| view as &dyn LineSource).collect()
}

//! Merged text production on top of a [`Differ`].

use panemerge_text::LineSource;
use serde::Serialize;
use tracing::debug;

use crate::chunk::{Chunk, ChunkChanges, ChunkTag, shift};
use crate::differ::Differ;
use crate::error::EngineError;
use crate::options::EngineOptions;
use crate::reconcile::ConflictPolicy;

/// Result of a three-way merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreeWayMerge {
    pub text: String,
    /// Output line numbers still holding conflict placeholders.
    pub unresolved: Vec<usize>,
}

/// Differ wrapper that writes merged text and tracks unresolved lines.
///
/// Conflicts are auto-resolved by default.
#[derive(Debug)]
pub struct Merger {
    differ: Differ,
    unresolved: Vec<usize>,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

impl Merger {
    pub fn new() -> Self {
        let options = EngineOptions::default().with_conflict_policy(ConflictPolicy::AutoResolve);
        Self {
            differ: Differ::with_filter(options, Default::default()),
            unresolved: Vec::new(),
        }
    }

    pub fn with_options(options: EngineOptions) -> Result<Self, EngineError> {
        Ok(Self {
            differ: Differ::with_options(options)?,
            unresolved: Vec::new(),
        })
    }

    pub fn differ(&self) -> &Differ {
        &self.differ
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ChunkChanges) + Send + 'static) {
        self.differ.subscribe(listener);
    }

    /// Compare `panes` from scratch, forgetting earlier unresolved lines.
    pub fn initialize(&mut self, panes: &[&dyn LineSource]) -> Result<ChunkChanges, EngineError> {
        self.unresolved.clear();
        self.differ.set_sequences(panes)
    }

    /// Forward an edit, keeping unresolved lines of the middle pane in place.
    ///
    /// Unresolved lines inside a deleted range, or on a line edited in place,
    /// are dropped; later ones move with the edit.
    pub fn change_sequence(
        &mut self,
        pane: usize,
        start: usize,
        delta: isize,
        panes: &[&dyn LineSource],
    ) -> Result<ChunkChanges, EngineError> {
        let changes = self.differ.change_sequence(pane, start, delta, panes)?;
        if pane == 1 {
            self.track_edit(start, delta);
        }
        Ok(changes)
    }

    pub fn unresolved(&self) -> &[usize] {
        &self.unresolved
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }

    /// Apply the changes of pane `from` onto pane `to`.
    ///
    /// Conflicting regions keep the content of `to`.
    pub fn merge_two(
        &self,
        from: usize,
        to: usize,
        panes: &[&dyn LineSource],
    ) -> Result<String, EngineError> {
        let Some(target) = panes.get(to) else {
            return Err(EngineError::InvalidPanePair { from, to });
        };
        let Some(source) = panes.get(from) else {
            return Err(EngineError::InvalidPanePair { from, to });
        };

        let mut merged = Vec::new();
        let mut lastline = 0;
        for change in self.differ.pair_changes(to, from, None)? {
            let low_mark = if change.tag == ChunkTag::Conflict {
                change.end_a
            } else {
                change.start_a
            };
            copy_lines(*target, lastline, low_mark, &mut merged);
            lastline = low_mark.max(lastline);
            if change.tag != ChunkTag::Conflict {
                lastline += apply_change(*source, change, &mut merged);
            }
        }
        copy_lines(*target, lastline, target.line_count(), &mut merged);
        Ok(merged.join("\n"))
    }

    /// Merge panes 0 and 2 into the middle pane.
    ///
    /// With `mark_conflicts`, each conflicting middle line becomes a
    /// placeholder recorded as unresolved; otherwise conflicts keep the
    /// middle content.
    pub fn merge_three(
        &mut self,
        mark_conflicts: bool,
        panes: &[&dyn LineSource],
    ) -> Result<ThreeWayMerge, EngineError> {
        if !self.differ.is_initialised() {
            return Err(EngineError::NotInitialised);
        }
        if panes.len() != 3 || self.differ.pane_count() != 3 {
            return Err(EngineError::PaneMismatch {
                expected: 3,
                actual: panes.len(),
            });
        }

        let marker = self.differ.options().conflict_marker.as_str();
        let base = panes[1];
        let mut merged = Vec::new();
        let mut unresolved = Vec::new();
        let mut lastline = 0;

        for record in self.differ.all_changes() {
            let low_mark = [record.left, record.right]
                .into_iter()
                .flatten()
                .map(|chunk| chunk.start_a)
                .fold(lastline, usize::max);
            copy_lines(base, lastline, low_mark, &mut merged);
            lastline = low_mark;

            match (record.left, record.right) {
                (Some(left), Some(right)) if record.is_conflict() => {
                    if !mark_conflicts {
                        continue;
                    }
                    let high_mark = left.end_a.max(right.end_a);
                    if low_mark < high_mark {
                        for line in base.lines(low_mark..high_mark) {
                            unresolved.push(merged.len());
                            merged.push(format!("{marker}{line}"));
                        }
                    } else {
                        unresolved.push(merged.len());
                        merged.push(marker.to_string());
                    }
                    lastline = high_mark;
                }
                (Some(chunk), _) => lastline += apply_change(panes[0], chunk, &mut merged),
                (None, Some(chunk)) => lastline += apply_change(panes[2], chunk, &mut merged),
                (None, None) => {}
            }
        }
        copy_lines(base, lastline, base.line_count(), &mut merged);

        debug!(
            lines = merged.len(),
            unresolved = unresolved.len(),
            "three-way merge written"
        );
        self.unresolved = unresolved.clone();
        Ok(ThreeWayMerge {
            text: merged.join("\n"),
            unresolved,
        })
    }

    fn track_edit(&mut self, start: usize, delta: isize) {
        let Some(lo) = self.unresolved.iter().position(|&line| start <= line) else {
            return;
        };
        let mut hi = lo;
        if delta < 0 {
            let end = start + delta.unsigned_abs();
            hi += self.unresolved[lo..]
                .iter()
                .take_while(|&&line| line < end)
                .count();
        } else if delta == 0 && self.unresolved[lo] == start {
            hi += 1;
        }

        for line in &mut self.unresolved[hi..] {
            *line = shift(*line, delta);
        }
        self.unresolved.drain(lo..hi);
    }
}

fn copy_lines(source: &dyn LineSource, from: usize, to: usize, out: &mut Vec<String>) {
    out.extend(source.lines(from..to).into_iter().map(|line| line.into_owned()));
}

/// Append the `b` lines of `chunk` from `source`; returns the number of
/// middle lines it consumes.
fn apply_change(source: &dyn LineSource, chunk: Chunk, out: &mut Vec<String>) -> usize {
    match chunk.tag {
        ChunkTag::Insert => {
            copy_lines(source, chunk.start_b, chunk.end_b, out);
            0
        }
        ChunkTag::Replace => {
            copy_lines(source, chunk.start_b, chunk.end_b, out);
            chunk.len_a()
        }
        _ => chunk.len_a(),
    }
}

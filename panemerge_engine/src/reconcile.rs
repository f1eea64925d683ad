//! Reconciliation of the two pairwise chunk lists into merge records.

use std::borrow::Cow;
use std::collections::BTreeSet;

use panemerge_text::LineSource;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkTag, MergeRecord};
use crate::matcher::SequenceMatcher;

/// How overlapping changes from both sides are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Identical edits merge, everything else conflicts.
    #[default]
    Plain,
    /// Additionally split conflicts into resolvable and conflicting sub-spans.
    AutoResolve,
}

/// Union of an overlapping group in all three panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GroupSpan {
    low: [usize; 2],
    high: [usize; 2],
    mid_low: usize,
    mid_high: usize,
}

impl GroupSpan {
    fn outer(&self, side: usize) -> (usize, usize) {
        (self.low[side], self.high[side])
    }

    fn chunks(&self, tag: ChunkTag) -> MergeRecord {
        MergeRecord::new(
            Some(Chunk::new(tag, self.mid_low, self.mid_high, self.low[0], self.high[0])),
            Some(Chunk::new(tag, self.mid_low, self.mid_high, self.low[1], self.high[1])),
        )
    }
}

/// Merge pane1-vs-pane0 and pane1-vs-pane2 difference chunks into ordered records.
///
/// `panes` are the live line sources in pane order; with fewer than three
/// panes every left chunk becomes its own record.
pub(crate) fn merge_diffs(
    left: &[Chunk],
    right: &[Chunk],
    panes: &[&dyn LineSource],
    policy: ConflictPolicy,
) -> Vec<MergeRecord> {
    if panes.len() < 3 {
        return left
            .iter()
            .map(|chunk| MergeRecord::new(Some(*chunk), None))
            .collect();
    }

    let seqs = [left, right];
    let mut pos = [0usize; 2];
    let mut out = Vec::new();

    loop {
        let heads = [seqs[0].get(pos[0]), seqs[1].get(pos[1])];
        let mut high_seq = match heads {
            [None, None] => break,
            [None, Some(_)] => 1,
            [Some(_), None] => 0,
            [Some(l), Some(r)] => {
                if l.start_a == r.start_a {
                    if l.tag == ChunkTag::Insert {
                        0
                    } else if r.tag == ChunkTag::Insert {
                        1
                    } else {
                        0
                    }
                } else {
                    usize::from(l.start_a > r.start_a)
                }
            }
        };

        let high_diff = seqs[high_seq][pos[high_seq]];
        pos[high_seq] += 1;
        let mut high_mark = high_diff.end_a;
        let mut other_seq = 1 - high_seq;

        let mut using: [Vec<Chunk>; 2] = [Vec::new(), Vec::new()];
        using[high_seq].push(high_diff);

        while let Some(other_diff) = seqs[other_seq].get(pos[other_seq]).copied() {
            if high_mark < other_diff.start_a {
                break;
            }
            let both_inserts =
                high_diff.tag == ChunkTag::Insert && other_diff.tag == ChunkTag::Insert;
            if high_mark == other_diff.start_a && !both_inserts {
                break;
            }

            using[other_seq].push(other_diff);
            pos[other_seq] += 1;

            if high_mark < other_diff.end_a {
                std::mem::swap(&mut high_seq, &mut other_seq);
                high_mark = other_diff.end_a;
            }
        }

        match (using[0].as_slice(), using[1].as_slice()) {
            ([], [only]) => out.push(MergeRecord::new(None, Some(*only))),
            ([only], []) => out.push(MergeRecord::new(Some(*only), None)),
            _ => resolve_group(&using, panes, policy, &mut out),
        }
    }

    out
}

fn merge_blocks(using: &[Vec<Chunk>; 2]) -> GroupSpan {
    let firsts = [using[0][0], using[1][0]];
    let lasts = [using[0][using[0].len() - 1], using[1][using[1].len() - 1]];

    let mid_low = firsts[0].start_a.min(firsts[1].start_a);
    let mid_high = lasts[0].end_a.max(lasts[1].end_a);

    let low = firsts.map(|first| first.start_b - (first.start_a - mid_low));
    let high = lasts.map(|last| last.end_b + (mid_high - last.end_a));

    GroupSpan {
        low,
        high,
        mid_low,
        mid_high,
    }
}

fn outer_text<'a>(
    panes: &'a [&dyn LineSource],
    side: usize,
    span: (usize, usize),
) -> Vec<Cow<'a, str>> {
    panes[side * 2].lines(span.0..span.1)
}

fn resolve_group(
    using: &[Vec<Chunk>; 2],
    panes: &[&dyn LineSource],
    policy: ConflictPolicy,
    out: &mut Vec<MergeRecord>,
) {
    let span = merge_blocks(using);
    let (l0, h0) = span.outer(0);
    let (l2, h2) = span.outer(1);

    let same_text = h0 - l0 == h2 - l2
        && outer_text(panes, 0, (l0, h0)) == outer_text(panes, 1, (l2, h2));
    let tag = if same_text {
        let middle_changed = span.mid_low != span.mid_high;
        if middle_changed && l0 == h0 {
            ChunkTag::Delete
        } else if middle_changed {
            ChunkTag::Replace
        } else {
            ChunkTag::Insert
        }
    } else {
        ChunkTag::Conflict
    };

    if tag == ChunkTag::Conflict
        && policy == ConflictPolicy::AutoResolve
        && auto_resolve(span, using, panes, out)
    {
        return;
    }
    out.push(span.chunks(tag));
}

/// Try to split a conflicting group into resolvable pieces. Returns `false`
/// when the group shape is not one that can be split.
fn auto_resolve(
    span: GroupSpan,
    using: &[Vec<Chunk>; 2],
    panes: &[&dyn LineSource],
    out: &mut Vec<MergeRecord>,
) -> bool {
    let (l0, h0) = span.outer(0);
    let (l2, h2) = span.outer(1);
    let l1 = span.mid_low;
    let (len0, len1, len2) = (h0 - l0, span.mid_high - l1, h2 - l2);

    if len0 > 0 && len2 > 0 && (len0 == len1 || len2 == len1 || len1 == 0) {
        let mut matcher = SequenceMatcher::new(
            outer_text(panes, 0, (l0, h0)),
            outer_text(panes, 1, (l2, h2)),
        );
        for op in matcher.opcodes() {
            let (s1, e1) = if len0 == len1 {
                (l1 + op.start_a, l1 + op.end_a)
            } else if len2 == len1 {
                (l1 + op.start_b, l1 + op.end_b)
            } else {
                (l1, l1)
            };
            let tag = match op.tag {
                ChunkTag::Equal if s1 == e1 => ChunkTag::Insert,
                ChunkTag::Equal => ChunkTag::Replace,
                _ => ChunkTag::Conflict,
            };
            out.push(MergeRecord::new(
                Some(Chunk::new(tag, s1, e1, l0 + op.start_a, l0 + op.end_a)),
                Some(Chunk::new(tag, s1, e1, l2 + op.start_b, l2 + op.end_b)),
            ));
        }
        return true;
    }

    let all_deletes = using
        .iter()
        .flatten()
        .all(|chunk| chunk.tag == ChunkTag::Delete);
    if all_deletes {
        split_concordant_deletes(span, using, out);
        return true;
    }

    false
}

/// Split overlapping deletions into lines both sides removed and lines only
/// one side removed.
fn split_concordant_deletes(span: GroupSpan, using: &[Vec<Chunk>; 2], out: &mut Vec<MergeRecord>) {
    let (lo, hi) = (span.mid_low, span.mid_high);
    let mut points = BTreeSet::from([lo, hi]);
    for chunk in using.iter().flatten() {
        points.insert(chunk.start_a.clamp(lo, hi));
        points.insert(chunk.end_a.clamp(lo, hi));
    }
    let points = points.into_iter().collect::<Vec<_>>();

    let deleted_at = |side: usize, line: usize| {
        using[side]
            .iter()
            .any(|chunk| chunk.start_a <= line && line < chunk.end_a)
    };
    let position = |side: usize, line: usize| {
        let removed: usize = using[side]
            .iter()
            .map(|chunk| {
                let end = chunk.end_a.min(line);
                let start = chunk.start_a.max(lo);
                end.saturating_sub(start)
            })
            .sum();
        span.low[side] + (line - lo) - removed
    };

    let mut pieces: Vec<(ChunkTag, usize, usize)> = Vec::new();
    for window in points.windows(2) {
        let (start, end) = (window[0], window[1]);
        let tag = match (deleted_at(0, start), deleted_at(1, start)) {
            (true, true) => ChunkTag::Delete,
            (false, false) => continue,
            _ => ChunkTag::Conflict,
        };
        match pieces.last_mut() {
            Some((last_tag, _, last_end)) if *last_tag == tag && *last_end == start => {
                *last_end = end;
            }
            _ => pieces.push((tag, start, end)),
        }
    }

    for (tag, start, end) in pieces {
        out.push(MergeRecord::new(
            Some(Chunk::new(tag, start, end, position(0, start), position(0, end))),
            Some(Chunk::new(tag, start, end, position(1, start), position(1, end))),
        ));
    }
}

/// Trim blank lines at both ends of every chunk, dropping chunks that only
/// touched blank lines and records left with no side.
pub(crate) fn consume_blank_lines(
    records: Vec<MergeRecord>,
    panes: &[&dyn LineSource],
) -> Vec<MergeRecord> {
    records
        .into_iter()
        .filter_map(|record| {
            let left = record.left.and_then(|chunk| trim_blanks(chunk, panes, 0));
            let right = record.right.and_then(|chunk| trim_blanks(chunk, panes, 2));
            (left.is_some() || right.is_some()).then(|| MergeRecord::new(left, right))
        })
        .collect()
}

fn trim_blanks(chunk: Chunk, panes: &[&dyn LineSource], other: usize) -> Option<Chunk> {
    let (a_lo, a_hi) = trim_range(panes[1], chunk.start_a, chunk.end_a);
    let (b_lo, b_hi) = trim_range(panes[other], chunk.start_b, chunk.end_b);

    if a_lo == a_hi && b_lo == b_hi {
        return None;
    }
    let tag = match chunk.tag {
        ChunkTag::Replace if a_lo == a_hi => ChunkTag::Insert,
        ChunkTag::Replace if b_lo == b_hi => ChunkTag::Delete,
        tag => tag,
    };
    Some(Chunk::new(tag, a_lo, a_hi, b_lo, b_hi))
}

fn trim_range(source: &dyn LineSource, mut lo: usize, mut hi: usize) -> (usize, usize) {
    while lo < hi && source.is_blank(lo) {
        lo += 1;
    }
    while lo < hi && source.is_blank(hi - 1) {
        hi -= 1;
    }
    (lo, hi)
}

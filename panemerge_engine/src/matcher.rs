//! O(NP) sequence comparison (Wu, Manber, Myers, Miller, 1989).
//!
//! The matcher strips the common prefix and suffix, optionally discards
//! elements with no counterpart on the other side, runs the furthest-point
//! search per diagonal, and merges fragmented matches in a backward pass.
//! Synchronisation points split the comparison into independent segments.
//!
//! The search is resumable: [`SequenceMatcher::step`] advances a bounded
//! number of rounds so long comparisons can be interleaved with other work.

use std::collections::HashSet;
use std::hash::Hash;

use serde::Serialize;

use crate::chunk::{Chunk, ChunkTag};

/// Search rounds performed per [`SequenceMatcher::step`] call.
const ROUNDS_PER_STEP: usize = 100;

/// Discarding only pays off above this many dropped elements.
const DISCARD_THRESHOLD: usize = 10;

/// Window length for inline discarding.
const KMER_LEN: usize = 3;

/// Run of `len` equal elements at `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchingBlock {
    pub a: usize,
    pub b: usize,
    pub len: usize,
}

impl MatchingBlock {
    fn new(a: usize, b: usize, len: usize) -> Self {
        Self { a, b, len }
    }
}

/// How elements with no counterpart are discarded before the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchHeuristic {
    /// Drop elements that never occur on the other side.
    #[default]
    Lines,
    /// Keep only elements covered by a 3-element window shared with the other side.
    Inline,
}

/// Whether a stepped computation has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchProgress {
    Pending,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    a_start: usize,
    a_end: usize,
    b_start: usize,
    b_end: usize,
}

/// Two-sequence matcher producing matching blocks and opcodes.
#[derive(Debug, Clone)]
pub struct SequenceMatcher<T> {
    a: Vec<T>,
    b: Vec<T>,
    heuristic: MatchHeuristic,
    segments: Vec<Segment>,
    next_segment: usize,
    search: Option<SegmentSearch<T>>,
    blocks: Vec<MatchingBlock>,
    split_blocks: Vec<Vec<MatchingBlock>>,
    finished: bool,
}

impl<T: Eq + Hash + Clone> SequenceMatcher<T> {
    /// Line matcher over `a` and `b`.
    pub fn new(a: Vec<T>, b: Vec<T>) -> Self {
        Self::build(a, b, MatchHeuristic::Lines, &[])
    }

    /// Character-level matcher using window-based discarding.
    pub fn inline(a: Vec<T>, b: Vec<T>) -> Self {
        Self::build(a, b, MatchHeuristic::Inline, &[])
    }

    /// Line matcher that never aligns across the given `(a, b)` points.
    ///
    /// Points past the end are clamped; points going backwards are ignored.
    pub fn with_sync_points(a: Vec<T>, b: Vec<T>, points: &[(usize, usize)]) -> Self {
        Self::build(a, b, MatchHeuristic::Lines, points)
    }

    fn build(a: Vec<T>, b: Vec<T>, heuristic: MatchHeuristic, points: &[(usize, usize)]) -> Self {
        let segments = split_segments(a.len(), b.len(), points);
        Self {
            a,
            b,
            heuristic,
            segments,
            next_segment: 0,
            search: None,
            blocks: Vec::new(),
            split_blocks: Vec::new(),
            finished: false,
        }
    }

    pub fn a(&self) -> &[T] {
        &self.a
    }

    pub fn b(&self) -> &[T] {
        &self.b
    }

    pub fn is_complete(&self) -> bool {
        self.finished
    }

    /// Advance the search by a bounded amount of work.
    pub fn step(&mut self) -> MatchProgress {
        if self.finished {
            return MatchProgress::Complete;
        }

        let Some(search) = self.search.as_mut() else {
            match self.segments.get(self.next_segment).copied() {
                Some(segment) => {
                    self.search = Some(self.start_segment(segment));
                    self.next_segment += 1;
                }
                None => {
                    self.blocks
                        .push(MatchingBlock::new(self.a.len(), self.b.len(), 0));
                    self.finished = true;
                    return MatchProgress::Complete;
                }
            }
            return MatchProgress::Pending;
        };

        if search.np.advance(ROUNDS_PER_STEP)
            && let Some(done) = self.search.take()
        {
            self.complete_segment(done);
        }
        MatchProgress::Pending
    }

    /// Drive the search to completion.
    pub fn run(&mut self) {
        while self.step() == MatchProgress::Pending {}
    }

    /// Matching blocks, strictly increasing, ending with `(len_a, len_b, 0)`.
    pub fn matching_blocks(&mut self) -> &[MatchingBlock] {
        self.run();
        &self.blocks
    }

    /// Opcodes tiling both sequences, `equal` spans included.
    ///
    /// Two empty sequences yield a single empty `equal` opcode.
    pub fn opcodes(&mut self) -> Vec<Chunk> {
        self.run();

        let mut out = Vec::new();
        let (mut i, mut j) = (0usize, 0usize);
        for blocks in &self.split_blocks {
            for block in blocks {
                let (ai, bj, size) = (block.a, block.b, block.len);
                let tag = if i < ai && j < bj {
                    Some(ChunkTag::Replace)
                } else if i < ai {
                    Some(ChunkTag::Delete)
                } else if j < bj {
                    Some(ChunkTag::Insert)
                } else {
                    None
                };
                if let Some(tag) = tag {
                    out.push(Chunk::new(tag, i, ai, j, bj));
                }
                i = ai + size;
                j = bj + size;
                if size > 0 {
                    out.push(Chunk::new(ChunkTag::Equal, ai, i, bj, j));
                }
            }
        }

        if out.is_empty() {
            out.push(Chunk::new(ChunkTag::Equal, 0, 0, 0, 0));
        }
        out
    }

    /// Opcodes without `equal` spans.
    pub fn difference_opcodes(&mut self) -> Vec<Chunk> {
        self.opcodes()
            .into_iter()
            .filter(|chunk| chunk.tag != ChunkTag::Equal)
            .collect()
    }

    /// Similarity `2 * matches / total`, `1.0` when both sequences are empty.
    pub fn ratio(&mut self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|block| block.len).sum();
        2.0 * matches as f64 / total as f64
    }

    fn start_segment(&self, segment: Segment) -> SegmentSearch<T> {
        let a = &self.a[segment.a_start..segment.a_end];
        let b = &self.b[segment.b_start..segment.b_end];

        let prefix = common_prefix_len(a, b);
        let suffix = common_suffix_len(&a[prefix..], &b[prefix..]);
        let a_core = &a[prefix..a.len() - suffix];
        let b_core = &b[prefix..b.len() - suffix];

        let discarded = match self.heuristic {
            MatchHeuristic::Lines => discard_unmatched(a_core, b_core),
            MatchHeuristic::Inline => discard_unmatched_kmers(a_core, b_core),
        };
        let (np, remap) = match discarded {
            Some(kept) => (
                NpSearch::new(kept.a_items, kept.b_items),
                Some((kept.a_index, kept.b_index)),
            ),
            None => (NpSearch::new(a_core.to_vec(), b_core.to_vec()), None),
        };

        SegmentSearch {
            segment,
            prefix,
            suffix,
            remap,
            np,
        }
    }

    fn complete_segment(&mut self, search: SegmentSearch<T>) {
        let segment = search.segment;
        let len_a = segment.a_end - segment.a_start;
        let len_b = segment.b_end - segment.b_start;

        let mut local = Vec::new();
        if search.prefix > 0 {
            local.push(MatchingBlock::new(0, 0, search.prefix));
        }
        for (x, y, len) in search.np.snakes() {
            match &search.remap {
                Some((a_index, b_index)) => {
                    for k in 0..len {
                        let ax = a_index[x + k] + search.prefix;
                        let by = b_index[y + k] + search.prefix;
                        match local.last_mut() {
                            Some(last) if last.a + last.len == ax && last.b + last.len == by => {
                                last.len += 1;
                            }
                            _ => local.push(MatchingBlock::new(ax, by, 1)),
                        }
                    }
                }
                None => local.push(MatchingBlock::new(x + search.prefix, y + search.prefix, len)),
            }
        }
        if search.suffix > 0 {
            local.push(MatchingBlock::new(
                len_a - search.suffix,
                len_b - search.suffix,
                search.suffix,
            ));
        }
        local.push(MatchingBlock::new(len_a, len_b, 0));

        let local = postprocess(
            local,
            &self.a[segment.a_start..segment.a_end],
            &self.b[segment.b_start..segment.b_end],
        );

        let global = local
            .iter()
            .filter(|block| block.len > 0)
            .map(|block| {
                MatchingBlock::new(
                    block.a + segment.a_start,
                    block.b + segment.b_start,
                    block.len,
                )
            })
            .collect::<Vec<_>>();

        let mut split = global.clone();
        split.push(MatchingBlock::new(segment.a_end, segment.b_end, 0));
        self.split_blocks.push(split);

        let mut rest = global.into_iter().peekable();
        if let (Some(last), Some(first)) = (self.blocks.last_mut(), rest.peek())
            && last.a + last.len == first.a
            && last.b + last.len == first.b
        {
            last.len += first.len;
            rest.next();
        }
        self.blocks.extend(rest);
    }
}

fn split_segments(len_a: usize, len_b: usize, points: &[(usize, usize)]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let (mut ai, mut bi) = (0usize, 0usize);
    for &(aj, bj) in points {
        let (aj, bj) = (aj.min(len_a), bj.min(len_b));
        if aj < ai || bj < bi {
            continue;
        }
        segments.push(Segment {
            a_start: ai,
            a_end: aj,
            b_start: bi,
            b_end: bj,
        });
        ai = aj;
        bi = bj;
    }
    if ai < len_a || bi < len_b || segments.is_empty() {
        segments.push(Segment {
            a_start: ai,
            a_end: len_a,
            b_start: bi,
            b_end: len_b,
        });
    }
    segments
}

#[derive(Debug, Clone)]
struct SegmentSearch<T> {
    segment: Segment,
    prefix: usize,
    suffix: usize,
    remap: Option<(Vec<usize>, Vec<usize>)>,
    np: NpSearch<T>,
}

fn common_prefix_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

struct Kept<T> {
    a_items: Vec<T>,
    a_index: Vec<usize>,
    b_items: Vec<T>,
    b_index: Vec<usize>,
}

impl<T> Kept<T> {
    fn worthwhile(self, len_a: usize, len_b: usize) -> Option<Self> {
        let dropped_a = len_a - self.a_items.len();
        let dropped_b = len_b - self.b_items.len();
        (dropped_a > DISCARD_THRESHOLD || dropped_b > DISCARD_THRESHOLD).then_some(self)
    }
}

fn discard_unmatched<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Option<Kept<T>> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let keep = |needles: &HashSet<&T>, haystack: &[T]| {
        let mut items = Vec::new();
        let mut index = Vec::new();
        for (idx, item) in haystack.iter().enumerate() {
            if needles.contains(item) {
                items.push(item.clone());
                index.push(idx);
            }
        }
        (items, index)
    };

    let a_set = a.iter().collect::<HashSet<_>>();
    let b_set = b.iter().collect::<HashSet<_>>();
    let (a_items, a_index) = keep(&b_set, a);
    let (b_items, b_index) = keep(&a_set, b);

    Kept {
        a_items,
        a_index,
        b_items,
        b_index,
    }
    .worthwhile(a.len(), b.len())
}

fn discard_unmatched_kmers<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Option<Kept<T>> {
    if a.len() < KMER_LEN && b.len() < KMER_LEN {
        return None;
    }

    let keep = |other: &[T], haystack: &[T]| {
        let windows = other.windows(KMER_LEN).collect::<HashSet<_>>();
        let mut items = Vec::new();
        let mut index = Vec::new();
        let mut next_possible = 0usize;
        for end in KMER_LEN - 1..haystack.len() {
            let start = end + 1 - KMER_LEN;
            if !windows.contains(&haystack[start..=end]) {
                continue;
            }
            for idx in next_possible.max(start)..=end {
                items.push(haystack[idx].clone());
                index.push(idx);
            }
            next_possible = end + 1;
        }
        (items, index)
    };

    let (a_items, a_index) = keep(b, a);
    let (b_items, b_index) = keep(a, b);

    Kept {
        a_items,
        a_index,
        b_items,
        b_index,
    }
    .worthwhile(a.len(), b.len())
}

/// Backward pass joining a block with the run right before it when that run
/// is equal on both sides.
fn postprocess<T: PartialEq>(blocks: Vec<MatchingBlock>, a: &[T], b: &[T]) -> Vec<MatchingBlock> {
    let Some(sentinel) = blocks.last().copied() else {
        return blocks;
    };

    let mut out = vec![sentinel];
    let mut idx = blocks.len() - 1;
    while idx > 0 {
        idx -= 1;
        let mut cur = blocks[idx];
        while idx > 0 {
            let prev = blocks[idx - 1];
            let adjacent = prev.b + prev.len == cur.b || prev.a + prev.len == cur.a;
            if adjacent
                && cur.a >= prev.len
                && cur.b >= prev.len
                && a[cur.a - prev.len..cur.a] == b[cur.b - prev.len..cur.b]
            {
                cur.a -= prev.len;
                cur.b -= prev.len;
                cur.len += prev.len;
                idx -= 1;
                continue;
            }
            break;
        }
        out.push(cur);
    }

    out.reverse();
    out
}

#[derive(Debug, Clone, Copy)]
struct Snake {
    prev: Option<usize>,
    x: usize,
    y: usize,
    len: usize,
}

/// Furthest-point search state. `a` is the shorter side; `swapped` records
/// whether that flipped the caller's order.
#[derive(Debug, Clone)]
struct NpSearch<T> {
    a: Vec<T>,
    b: Vec<T>,
    swapped: bool,
    offset: isize,
    fp: Vec<isize>,
    heads: Vec<Option<usize>>,
    arena: Vec<Snake>,
    p: isize,
    last: Option<Option<usize>>,
}

impl<T: PartialEq> NpSearch<T> {
    fn new(a: Vec<T>, b: Vec<T>) -> Self {
        let (a, b, swapped) = if a.len() > b.len() {
            (b, a, true)
        } else {
            (a, b, false)
        };
        let (m, n) = (a.len(), b.len());
        let size = m + n + 3;
        Self {
            last: (m == 0).then_some(None),
            a,
            b,
            swapped,
            offset: m as isize + 1,
            fp: vec![-1; size],
            heads: vec![None; size],
            arena: Vec::new(),
            p: -1,
        }
    }

    /// Run up to `rounds` values of `p`; `true` once the end is reached.
    fn advance(&mut self, rounds: usize) -> bool {
        if self.last.is_some() {
            return true;
        }

        let m = self.a.len() as isize;
        let n = self.b.len() as isize;
        let delta = n - m;
        for _ in 0..rounds {
            self.p += 1;
            let p = self.p;
            for k in -p..delta {
                self.extend(k);
            }
            for k in (delta + 1..=delta + p).rev() {
                self.extend(k);
            }
            self.extend(delta);

            let idx = (delta + self.offset) as usize;
            if self.fp[idx] >= n || p >= m {
                self.last = Some(self.heads[idx]);
                return true;
            }
        }
        false
    }

    fn extend(&mut self, k: isize) {
        let idx = (k + self.offset) as usize;
        let down = self.fp[idx - 1] + 1;
        let right = self.fp[idx + 1];
        let (mut y, mut node) = if down > right {
            (down, self.heads[idx - 1])
        } else {
            (right, self.heads[idx + 1])
        };

        let mut x = y - k;
        let (start_x, start_y) = (x, y);
        let (m, n) = (self.a.len() as isize, self.b.len() as isize);
        while x >= 0 && y >= 0 && x < m && y < n && self.a[x as usize] == self.b[y as usize] {
            x += 1;
            y += 1;
        }
        if x > start_x {
            self.arena.push(Snake {
                prev: node,
                x: start_x as usize,
                y: start_y as usize,
                len: (x - start_x) as usize,
            });
            node = Some(self.arena.len() - 1);
        }

        self.fp[idx] = y;
        self.heads[idx] = node;
    }

    /// Snakes `(x, y, len)` in increasing order, in the caller's orientation.
    fn snakes(&self) -> Vec<(usize, usize, usize)> {
        let mut out = Vec::new();
        let mut current = self.last.flatten();
        while let Some(idx) = current {
            let snake = self.arena[idx];
            out.push(if self.swapped {
                (snake.y, snake.x, snake.len)
            } else {
                (snake.x, snake.y, snake.len)
            });
            current = snake.prev;
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{MatchProgress, MatchingBlock, SequenceMatcher};
    use crate::chunk::{Chunk, ChunkTag};

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn both_empty_is_a_single_empty_equal() {
        let mut matcher = SequenceMatcher::<u32>::new(vec![], vec![]);

        assert_eq!(matcher.matching_blocks(), &[MatchingBlock::new(0, 0, 0)]);
        assert_eq!(
            matcher.opcodes(),
            vec![Chunk::new(ChunkTag::Equal, 0, 0, 0, 0)]
        );
        assert!(matcher.difference_opcodes().is_empty());
        assert_eq!(matcher.ratio(), 1.0);
    }

    #[test]
    fn one_empty_side_is_a_single_insert_or_delete() {
        let mut insert = SequenceMatcher::new(vec![], words("a b"));
        assert_eq!(
            insert.opcodes(),
            vec![Chunk::new(ChunkTag::Insert, 0, 0, 0, 2)]
        );

        let mut delete = SequenceMatcher::new(words("a b c"), vec![]);
        assert_eq!(
            delete.opcodes(),
            vec![Chunk::new(ChunkTag::Delete, 0, 3, 0, 0)]
        );
        assert_eq!(delete.ratio(), 0.0);
    }

    #[test]
    fn identical_sequences_are_one_block() {
        let mut matcher = SequenceMatcher::new(words("a b c"), words("a b c"));

        assert_eq!(
            matcher.matching_blocks(),
            &[MatchingBlock::new(0, 0, 3), MatchingBlock::new(3, 3, 0)]
        );
        assert_eq!(matcher.ratio(), 1.0);
    }

    #[test]
    fn single_replacement_in_the_middle() {
        let mut matcher = SequenceMatcher::new(words("a b c d"), words("a x c d"));

        assert_eq!(
            matcher.opcodes(),
            vec![
                Chunk::new(ChunkTag::Equal, 0, 1, 0, 1),
                Chunk::new(ChunkTag::Replace, 1, 2, 1, 2),
                Chunk::new(ChunkTag::Equal, 2, 4, 2, 4),
            ]
        );
        assert_eq!(matcher.ratio(), 0.75);
    }

    #[test]
    fn longer_first_sequence_is_handled() {
        let mut matcher = SequenceMatcher::new(words("p a b q c d r"), words("a b c d"));

        assert_eq!(
            matcher.difference_opcodes(),
            vec![
                Chunk::new(ChunkTag::Delete, 0, 1, 0, 0),
                Chunk::new(ChunkTag::Delete, 3, 4, 2, 2),
                Chunk::new(ChunkTag::Delete, 6, 7, 4, 4),
            ]
        );
    }

    #[test]
    fn discarding_keeps_block_coordinates_in_the_original_space() {
        let mut a = (0..15).map(|n| format!("left-{n}")).collect::<Vec<_>>();
        a.insert(5, "shared-1".to_string());
        a.insert(9, "shared-2".to_string());
        let mut b = (0..15).map(|n| format!("right-{n}")).collect::<Vec<_>>();
        b.insert(2, "shared-1".to_string());
        b.insert(3, "shared-2".to_string());

        let mut matcher = SequenceMatcher::new(a.clone(), b.clone());
        let blocks = matcher.matching_blocks().to_vec();

        assert_eq!(
            blocks,
            vec![
                MatchingBlock::new(5, 2, 1),
                MatchingBlock::new(9, 3, 1),
                MatchingBlock::new(17, 17, 0),
            ]
        );
        for block in &blocks {
            assert_eq!(
                a[block.a..block.a + block.len],
                b[block.b..block.b + block.len]
            );
        }
    }

    #[test]
    fn postprocess_joins_split_runs() {
        let mut matcher = SequenceMatcher::new(chars("abxcd"), chars("abcd"));
        let blocks = matcher.matching_blocks().to_vec();

        assert_eq!(
            blocks,
            vec![
                MatchingBlock::new(0, 0, 2),
                MatchingBlock::new(3, 2, 2),
                MatchingBlock::new(5, 4, 0),
            ]
        );
    }

    #[test]
    fn sync_points_split_the_comparison() {
        let a = words("a b c d");
        let b = words("c d a b");

        let mut free = SequenceMatcher::new(a.clone(), b.clone());
        let mut pinned = SequenceMatcher::with_sync_points(a, b, &[(2, 2)]);

        assert_eq!(free.ratio(), 0.5);
        assert_eq!(pinned.ratio(), 0.0);
        assert_eq!(
            pinned.opcodes(),
            vec![
                Chunk::new(ChunkTag::Replace, 0, 2, 0, 2),
                Chunk::new(ChunkTag::Replace, 2, 4, 2, 4),
            ]
        );
    }

    #[test]
    fn blocks_joined_across_a_sync_point_are_merged() {
        let mut matcher =
            SequenceMatcher::with_sync_points(words("a b c d"), words("a b c d"), &[(2, 2)]);

        assert_eq!(
            matcher.matching_blocks(),
            &[MatchingBlock::new(0, 0, 4), MatchingBlock::new(4, 4, 0)]
        );
        assert_eq!(
            matcher.opcodes(),
            vec![
                Chunk::new(ChunkTag::Equal, 0, 2, 0, 2),
                Chunk::new(ChunkTag::Equal, 2, 4, 2, 4),
            ]
        );
    }

    #[test]
    fn inline_matcher_finds_shared_words() {
        let mut matcher = SequenceMatcher::inline(chars("the quick fox"), chars("the slow fox"));
        let ops = matcher.difference_opcodes();

        assert!(!ops.is_empty());
        assert!(ops.iter().all(|op| op.start_a >= 4 && op.end_a <= 9));
        assert!(matcher.ratio() > 0.5);
    }

    #[test]
    fn stepping_reaches_completion() {
        let a = (0..500).map(|n| n % 7).collect::<Vec<u32>>();
        let b = (0..500).map(|n| n % 11).collect::<Vec<u32>>();
        let mut matcher = SequenceMatcher::new(a, b);

        let mut steps = 0;
        while matcher.step() == MatchProgress::Pending {
            steps += 1;
        }
        assert!(steps > 1);
        assert!(matcher.is_complete());
        assert_eq!(
            matcher.matching_blocks().last(),
            Some(&MatchingBlock::new(500, 500, 0))
        );
    }
}

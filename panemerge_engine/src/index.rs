use crate::chunk::{ChunkLocation, MergeRecord, Side};

/// Line-to-record lookup for every pane, rebuilt after each merge.
///
/// Each pane has one entry per line plus one for the position after the
/// last line.
#[derive(Debug, Clone, Default)]
pub(crate) struct LineIndex {
    panes: Vec<Vec<ChunkLocation>>,
}

impl LineIndex {
    pub(crate) fn build(records: &[MergeRecord], seq_lens: &[usize]) -> Self {
        let mut panes = seq_lens
            .iter()
            .map(|len| vec![ChunkLocation::default(); len + 1])
            .collect::<Vec<_>>();

        let mut prev: [Option<usize>; 3] = [None; 3];
        let mut next: [Option<usize>; 3] = [
            find_next(records, Side::Left, 0, None),
            find_next(records, Side::Left, 1, None),
            find_next(records, Side::Right, 2, None),
        ];
        let mut filled = [0usize; 3];

        for (i, record) in records.iter().enumerate() {
            for pane in 0..panes.len() {
                let Some((side, start, end)) = pane_range(record, pane) else {
                    continue;
                };
                let entries = &mut panes[pane];
                let limit = entries.len();

                let gap_end = start.min(limit);
                if gap_end > filled[pane] {
                    let gap = ChunkLocation {
                        chunk: None,
                        prev: prev[pane],
                        next: next[pane],
                    };
                    entries[filled[pane]..gap_end].fill(gap);
                }

                // Empty ranges claim the following line so inserts stay locatable.
                let end = if start == end { end + 1 } else { end };
                next[pane] = find_next(records, side, pane, Some(i));
                let claimed = ChunkLocation {
                    chunk: Some(i),
                    prev: prev[pane],
                    next: next[pane],
                };
                let (lo, hi) = (start.min(limit), end.min(limit));
                entries[lo..hi].fill(claimed);

                prev[pane] = Some(i);
                filled[pane] = hi.max(filled[pane]);
            }
        }

        for (pane, entries) in panes.iter_mut().enumerate() {
            let tail = ChunkLocation {
                chunk: None,
                prev: prev[pane],
                next: next[pane],
            };
            let start = filled[pane];
            entries[start..].fill(tail);
        }

        Self { panes }
    }

    pub(crate) fn locate(&self, pane: usize, line: usize) -> Option<ChunkLocation> {
        self.panes.get(pane)?.get(line).copied()
    }
}

/// Side and line range a record covers in `pane`, if it touches it.
fn pane_range(record: &MergeRecord, pane: usize) -> Option<(Side, usize, usize)> {
    match pane {
        0 => record.left.map(|c| (Side::Left, c.start_b, c.end_b)),
        1 => record
            .left
            .map(|c| (Side::Left, c.start_a, c.end_a))
            .or_else(|| record.right.map(|c| (Side::Right, c.start_a, c.end_a))),
        _ => record.right.map(|c| (Side::Right, c.start_b, c.end_b)),
    }
}

fn find_next(
    records: &[MergeRecord],
    side: Side,
    pane: usize,
    current: Option<usize>,
) -> Option<usize> {
    let from = current.map_or(0, |i| i + 1);
    if pane == 1 {
        return (from < records.len()).then_some(from);
    }
    (from..records.len()).find(|&j| records[j].side(side).is_some())
}

#[cfg(test)]
mod tests {
    use super::LineIndex;
    use crate::chunk::{Chunk, ChunkLocation, ChunkTag, MergeRecord};

    fn loc(chunk: Option<usize>, prev: Option<usize>, next: Option<usize>) -> ChunkLocation {
        ChunkLocation { chunk, prev, next }
    }

    #[test]
    fn two_pane_replace_maps_both_panes() {
        let records = vec![MergeRecord::new(
            Some(Chunk::new(ChunkTag::Replace, 1, 2, 1, 2)),
            None,
        )];
        let index = LineIndex::build(&records, &[3, 3]);

        assert_eq!(index.locate(0, 0), Some(loc(None, None, Some(0))));
        assert_eq!(index.locate(0, 1), Some(loc(Some(0), None, None)));
        assert_eq!(index.locate(1, 1), Some(loc(Some(0), None, None)));
        assert_eq!(index.locate(1, 2), Some(loc(None, Some(0), None)));
        assert_eq!(index.locate(1, 3), Some(loc(None, Some(0), None)));
        assert_eq!(index.locate(1, 4), None);
        assert_eq!(index.locate(2, 0), None);
    }

    #[test]
    fn inserts_claim_the_following_line() {
        let records = vec![MergeRecord::new(
            Some(Chunk::new(ChunkTag::Insert, 1, 1, 1, 3)),
            None,
        )];
        let index = LineIndex::build(&records, &[4, 2]);

        assert_eq!(index.locate(1, 1), Some(loc(Some(0), None, None)));
        assert_eq!(index.locate(0, 2), Some(loc(Some(0), None, None)));
        assert_eq!(index.locate(0, 3), Some(loc(None, Some(0), None)));
    }

    #[test]
    fn outer_panes_skip_records_for_the_other_side() {
        let records = vec![
            MergeRecord::new(Some(Chunk::new(ChunkTag::Replace, 0, 1, 0, 1)), None),
            MergeRecord::new(None, Some(Chunk::new(ChunkTag::Replace, 2, 3, 2, 3))),
            MergeRecord::new(Some(Chunk::new(ChunkTag::Delete, 4, 5, 4, 4)), None),
        ];
        let index = LineIndex::build(&records, &[4, 5, 5]);

        assert_eq!(index.locate(0, 0), Some(loc(Some(0), None, Some(2))));
        assert_eq!(index.locate(0, 2), Some(loc(None, Some(0), Some(2))));
        assert_eq!(index.locate(0, 4), Some(loc(Some(2), Some(0), None)));
        assert_eq!(index.locate(1, 0), Some(loc(Some(0), None, Some(1))));
        assert_eq!(index.locate(1, 2), Some(loc(Some(1), Some(0), Some(2))));
        assert_eq!(index.locate(2, 0), Some(loc(None, None, Some(1))));
        assert_eq!(index.locate(2, 4), Some(loc(None, Some(1), None)));
    }
}

use serde::{Deserialize, Serialize};

/// Kind of correspondence a [`Chunk`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkTag {
    Equal,
    Replace,
    Insert,
    Delete,
    Conflict,
}

impl ChunkTag {
    /// Tag seen from the other pane: insert and delete swap.
    pub fn reversed(self) -> Self {
        match self {
            ChunkTag::Insert => ChunkTag::Delete,
            ChunkTag::Delete => ChunkTag::Insert,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChunkTag::Equal => "equal",
            ChunkTag::Replace => "replace",
            ChunkTag::Insert => "insert",
            ChunkTag::Delete => "delete",
            ChunkTag::Conflict => "conflict",
        }
    }
}

/// Correspondence between `[start_a, end_a)` in the middle pane and
/// `[start_b, end_b)` in another pane.
///
/// An insert has an empty `a` range, a delete an empty `b` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chunk {
    pub tag: ChunkTag,
    pub start_a: usize,
    pub end_a: usize,
    pub start_b: usize,
    pub end_b: usize,
}

impl Chunk {
    pub fn new(tag: ChunkTag, start_a: usize, end_a: usize, start_b: usize, end_b: usize) -> Self {
        debug_assert!(start_a <= end_a && start_b <= end_b, "inverted chunk range");
        Self {
            tag,
            start_a,
            end_a,
            start_b,
            end_b,
        }
    }

    pub fn len_a(&self) -> usize {
        self.end_a - self.start_a
    }

    pub fn len_b(&self) -> usize {
        self.end_b - self.start_b
    }

    /// The same chunk seen from the `b` pane.
    pub fn reversed(&self) -> Self {
        Self {
            tag: self.tag.reversed(),
            start_a: self.start_b,
            end_a: self.end_b,
            start_b: self.start_a,
            end_b: self.end_a,
        }
    }

    /// Shift both ranges right by fixed offsets.
    pub(crate) fn offset_by(&self, a: usize, b: usize) -> Self {
        Self {
            tag: self.tag,
            start_a: self.start_a + a,
            end_a: self.end_a + a,
            start_b: self.start_b + b,
            end_b: self.end_b + b,
        }
    }

    /// Shift both ranges by signed deltas.
    pub(crate) fn shifted(&self, delta_a: isize, delta_b: isize) -> Self {
        Self {
            tag: self.tag,
            start_a: shift(self.start_a, delta_a),
            end_a: shift(self.end_a, delta_a),
            start_b: shift(self.start_b, delta_b),
            end_b: shift(self.end_b, delta_b),
        }
    }

    /// Shift every coordinate lying after `start` by the matching delta.
    pub(crate) fn offset_after(&self, start: usize, delta_a: isize, delta_b: isize) -> Self {
        let bump = |value: usize, delta: isize| {
            if value > start {
                shift(value, delta)
            } else {
                value
            }
        };
        Self {
            tag: self.tag,
            start_a: bump(self.start_a, delta_a),
            end_a: bump(self.end_a, delta_a),
            start_b: bump(self.start_b, delta_b),
            end_b: bump(self.end_b, delta_b),
        }
    }
}

pub(crate) fn shift(value: usize, delta: isize) -> usize {
    value.saturating_add_signed(delta)
}

/// Which outer pane a merge record side relates to the middle pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Pane index of the outer pane on this side.
    pub fn pane(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 2,
        }
    }
}

/// One aligned region: the middle pane against pane 0 (`left`) and pane 2 (`right`).
///
/// `None` means the side has no change in this region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MergeRecord {
    pub left: Option<Chunk>,
    pub right: Option<Chunk>,
}

impl MergeRecord {
    pub fn new(left: Option<Chunk>, right: Option<Chunk>) -> Self {
        debug_assert!(left.is_some() || right.is_some(), "empty merge record");
        Self { left, right }
    }

    pub fn side(&self, side: Side) -> Option<Chunk> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.left.is_some_and(|c| c.tag == ChunkTag::Conflict)
            || self.right.is_some_and(|c| c.tag == ChunkTag::Conflict)
    }

    /// First present side; every record has at least one.
    pub fn any(&self) -> Option<Chunk> {
        self.left.or(self.right)
    }

    /// Middle-pane start of the record.
    pub fn start_a(&self) -> usize {
        self.any().map_or(0, |c| c.start_a)
    }
}

/// Position of a line relative to the merge records touching its pane.
///
/// `chunk` is `None` for unchanged lines; `prev`/`next` are the nearest
/// records touching the pane before and after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkLocation {
    pub chunk: Option<usize>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// Record-set difference produced by a re-merge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ChunkChanges {
    pub removed: Vec<MergeRecord>,
    pub added: Vec<MergeRecord>,
    /// Record containing the edit location, when it survived the re-merge.
    pub modified: Option<MergeRecord>,
}

impl ChunkChanges {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.modified.is_none()
    }
}

/// Optional line window for [`crate::Differ::pair_changes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineWindow {
    pub from_start: usize,
    pub from_end: usize,
    pub to_start: usize,
    pub to_end: usize,
}

#[cfg(test)]
mod tests {
    use super::{Chunk, ChunkTag, MergeRecord};

    #[test]
    fn reversing_swaps_ranges_and_insert_delete() {
        let chunk = Chunk::new(ChunkTag::Insert, 3, 3, 4, 6);
        let reversed = chunk.reversed();

        assert_eq!(reversed, Chunk::new(ChunkTag::Delete, 4, 6, 3, 3));
        assert_eq!(reversed.reversed(), chunk);
    }

    #[test]
    fn conflict_on_either_side_marks_record() {
        let plain = Chunk::new(ChunkTag::Replace, 0, 1, 0, 1);
        let conflict = Chunk::new(ChunkTag::Conflict, 0, 1, 0, 2);

        assert!(!MergeRecord::new(Some(plain), None).is_conflict());
        assert!(MergeRecord::new(Some(plain), Some(conflict)).is_conflict());
        assert!(MergeRecord::new(None, Some(conflict)).is_conflict());
    }

    #[test]
    fn offsetting_only_moves_coordinates_after_the_edit() {
        let chunk = Chunk::new(ChunkTag::Replace, 2, 5, 2, 4);

        assert_eq!(
            chunk.offset_after(3, 2, 0),
            Chunk::new(ChunkTag::Replace, 2, 7, 2, 4)
        );
        assert_eq!(
            chunk.offset_after(1, 0, -1),
            Chunk::new(ChunkTag::Replace, 2, 5, 1, 3)
        );
    }
}

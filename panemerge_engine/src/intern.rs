use std::collections::HashMap;
use std::ops::Range;

use panemerge_text::LineSource;
use xxhash_rust::xxh3::{Xxh3, xxh3_64};

/// Dense ids for line texts, so the matcher compares integers.
///
/// Lines are bucketed by their xxh3 fingerprint and compared in full on
/// collision, so equal ids always mean equal text.
#[derive(Debug, Default)]
pub(crate) struct LineInterner {
    buckets: HashMap<u64, Vec<(String, u32)>>,
    next: u32,
}

impl LineInterner {
    pub(crate) fn intern(&mut self, text: &str) -> u32 {
        let bucket = self.buckets.entry(xxh3_64(text.as_bytes())).or_default();
        if let Some((_, id)) = bucket.iter().find(|(seen, _)| seen == text) {
            return *id;
        }
        let id = self.next;
        self.next += 1;
        bucket.push((text.to_string(), id));
        id
    }

    pub(crate) fn intern_range(
        &mut self,
        source: &dyn LineSource,
        range: Range<usize>,
    ) -> Vec<u32> {
        source
            .lines(range)
            .iter()
            .map(|line| self.intern(line))
            .collect()
    }
}

/// Content fingerprint of every line of `source`, length-prefixed so line
/// boundaries are part of the hash.
pub(crate) fn fingerprint(source: &dyn LineSource) -> u64 {
    let mut hasher = Xxh3::new();
    for line in source.lines(0..source.line_count()) {
        hasher.update(&(line.len() as u64).to_le_bytes());
        hasher.update(line.as_bytes());
    }
    hasher.digest()
}

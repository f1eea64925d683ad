//! Character-level matching of changed line pairs, memoised per session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::trace;

use crate::chunk::Chunk;
use crate::error::EngineError;
use crate::matcher::SequenceMatcher;
use crate::options::InlineOptions;

type TextPair = (String, String);

#[derive(Debug, Clone)]
struct CacheEntry {
    opcodes: Arc<[Chunk]>,
    last_access: Instant,
}

/// Memoised inline opcodes keyed by `(left_text, right_text)`.
///
/// Results are immutable and shared; batches compute their misses on a
/// fixed worker pool and install them together.
pub struct InlineMatchCache {
    entries: Mutex<HashMap<TextPair, CacheEntry>>,
    pool: ThreadPool,
    size_hint: usize,
}

impl std::fmt::Debug for InlineMatchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineMatchCache")
            .field("entries", &self.len())
            .field("workers", &self.pool.current_num_threads())
            .field("size_hint", &self.size_hint)
            .finish()
    }
}

impl InlineMatchCache {
    pub fn new(options: InlineOptions) -> Result<Self, EngineError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .thread_name(|idx| format!("panemerge-inline-{idx}"))
            .build()?;
        Ok(Self {
            entries: Mutex::new(HashMap::new()),
            pool,
            size_hint: options.cache_size_hint,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inline opcodes for one pair, computed on the calling thread on a miss.
    pub fn match_texts(&self, left: &str, right: &str) -> Arc<[Chunk]> {
        let key = (left.to_string(), right.to_string());
        if let Some(hit) = self.touch(&key) {
            trace!(left_len = left.len(), right_len = right.len(), "inline cache hit");
            return hit;
        }

        let opcodes = inline_opcodes(left, right);
        self.entries.lock().insert(
            key,
            CacheEntry {
                opcodes: Arc::clone(&opcodes),
                last_access: Instant::now(),
            },
        );
        opcodes
    }

    /// Inline opcodes for many pairs, in input order.
    pub fn match_batch(&self, pairs: &[(&str, &str)]) -> Vec<Arc<[Chunk]>> {
        let mut results: Vec<Option<Arc<[Chunk]>>> = pairs
            .iter()
            .map(|(left, right)| self.touch(&(left.to_string(), right.to_string())))
            .collect();

        let misses = results
            .iter()
            .enumerate()
            .filter(|(_, hit)| hit.is_none())
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        trace!(
            pairs = pairs.len(),
            misses = misses.len(),
            "inline batch lookup"
        );

        let computed: Vec<(usize, Arc<[Chunk]>)> = self.pool.install(|| {
            misses
                .par_iter()
                .map(|&idx| {
                    let (left, right) = pairs[idx];
                    (idx, inline_opcodes(left, right))
                })
                .collect()
        });

        let now = Instant::now();
        let mut entries = self.entries.lock();
        for (idx, opcodes) in computed {
            let (left, right) = pairs[idx];
            entries.insert(
                (left.to_string(), right.to_string()),
                CacheEntry {
                    opcodes: Arc::clone(&opcodes),
                    last_access: now,
                },
            );
            results[idx] = Some(opcodes);
        }
        drop(entries);

        results.into_iter().flatten().collect()
    }

    /// Evict down to the `2 * size_hint` most recent entries once the cache
    /// holds more than `3 * size_hint`.
    pub fn clean(&self, size_hint: usize) {
        let mut entries = self.entries.lock();
        if entries.len() <= 3 * size_hint {
            return;
        }

        let mut by_age = entries
            .iter()
            .map(|(key, entry)| (entry.last_access, key.clone()))
            .collect::<Vec<_>>();
        by_age.sort_by(|a, b| b.0.cmp(&a.0));
        let evicted = by_age.len() - 2 * size_hint;
        for (_, key) in by_age.into_iter().skip(2 * size_hint) {
            entries.remove(&key);
        }
        trace!(evicted, kept = entries.len(), "inline cache cleaned");
    }

    /// [`Self::clean`] with the configured size hint.
    pub fn clean_default(&self) {
        self.clean(self.size_hint);
    }

    fn touch(&self, key: &TextPair) -> Option<Arc<[Chunk]>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(Arc::clone(&entry.opcodes))
    }
}

fn inline_opcodes(left: &str, right: &str) -> Arc<[Chunk]> {
    let mut matcher = SequenceMatcher::inline(left.chars().collect(), right.chars().collect());
    matcher.opcodes().into()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::InlineMatchCache;
    use crate::chunk::{Chunk, ChunkTag};
    use crate::options::InlineOptions;

    fn cache() -> InlineMatchCache {
        InlineMatchCache::new(InlineOptions {
            workers: 2,
            cache_size_hint: 1,
        })
        .expect("pool")
    }

    #[test]
    fn repeated_pairs_share_results() {
        let cache = cache();
        let first = cache.match_texts("abc", "axc");
        let second = cache.match_texts("abc", "axc");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first[1], Chunk::new(ChunkTag::Replace, 1, 2, 1, 2));
    }

    #[test]
    fn batch_returns_results_in_input_order() {
        let cache = cache();
        let warm = cache.match_texts("same", "same");
        let results = cache.match_batch(&[("ab", "b"), ("same", "same"), ("", "x")]);

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref(),
            &[
                Chunk::new(ChunkTag::Delete, 0, 1, 0, 0),
                Chunk::new(ChunkTag::Equal, 1, 2, 0, 1),
            ]
        );
        assert!(Arc::ptr_eq(&results[1], &warm));
        assert_eq!(
            results[2].as_ref(),
            &[Chunk::new(ChunkTag::Insert, 0, 0, 0, 1)]
        );
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn clean_keeps_the_most_recent_entries() {
        let cache = cache();
        for text in ["a", "b", "c", "d"] {
            cache.match_texts(text, text);
        }
        cache.clean(1);
        assert_eq!(cache.len(), 2);

        cache.match_texts("e", "e");
        cache.clean_default();
        assert_eq!(cache.len(), 3);

        cache.match_texts("f", "f");
        cache.clean_default();
        assert_eq!(cache.len(), 2);
    }
}

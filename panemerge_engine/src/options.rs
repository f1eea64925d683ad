use panemerge_text::FilterRule;
use serde::{Deserialize, Serialize};

use crate::reconcile::ConflictPolicy;

/// Default placeholder prefix for unresolved conflict lines.
pub const DEFAULT_CONFLICT_MARKER: &str = "(??)";

/// Engine configuration, loadable from JSON with every field optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub ignore_blank_lines: bool,
    pub conflict_policy: ConflictPolicy,
    pub conflict_marker: String,
    pub filters: Vec<FilterRule>,
    pub inline: InlineOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            ignore_blank_lines: false,
            conflict_policy: ConflictPolicy::default(),
            conflict_marker: DEFAULT_CONFLICT_MARKER.to_string(),
            filters: Vec::new(),
            inline: InlineOptions::default(),
        }
    }
}

impl EngineOptions {
    /// Suppress changes that only touch blank lines.
    pub fn with_ignore_blank_lines(mut self, ignore: bool) -> Self {
        self.ignore_blank_lines = ignore;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_conflict_marker(mut self, marker: impl Into<String>) -> Self {
        self.conflict_marker = marker.into();
        self
    }

    /// Append a filter rule; rules apply in insertion order.
    pub fn with_filter(mut self, rule: FilterRule) -> Self {
        self.filters.push(rule);
        self
    }

    pub fn with_inline(mut self, inline: InlineOptions) -> Self {
        self.inline = inline;
        self
    }
}

/// Inline (character-level) matching settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineOptions {
    /// Worker threads for batch matching.
    pub workers: usize,
    /// Eviction keeps roughly twice this many entries.
    pub cache_size_hint: usize,
}

impl Default for InlineOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            cache_size_hint: 100,
        }
    }
}

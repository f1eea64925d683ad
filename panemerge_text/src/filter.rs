use std::borrow::Cow;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{LineSource, TextError};

/// User-configured pattern whose matches are ignored when comparing.
///
/// When the pattern has capture groups only the captured text is removed,
/// otherwise the whole match is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub label: String,
    pub pattern: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl FilterRule {
    pub fn new(label: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
            active: true,
        }
    }
}

/// Compiled set of active filter rules.
#[derive(Debug, Clone, Default)]
pub struct TextFilter {
    rules: Vec<(String, Regex)>,
}

impl TextFilter {
    /// Compile the active rules, in order. Inactive rules are skipped.
    pub fn compile(rules: &[FilterRule]) -> Result<Self, TextError> {
        let mut compiled = Vec::new();
        for rule in rules.iter().filter(|rule| rule.active) {
            let regex = Regex::new(&rule.pattern).map_err(|source| TextError::InvalidPattern {
                label: rule.label.clone(),
                source,
            })?;
            compiled.push((rule.label.clone(), regex));
        }
        Ok(Self { rules: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(label, _)| label.as_str())
    }

    /// Strip every rule's matches from `line`, borrowing when nothing matched.
    pub fn apply<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(line);
        for (_, regex) in &self.rules {
            if !regex.is_match(&out) {
                continue;
            }
            let stripped = regex.replace_all(&out, strip_match).into_owned();
            out = Cow::Owned(stripped);
        }
        out
    }

    /// Wrap `source` so every returned line is filtered.
    pub fn view<'a, S: LineSource + ?Sized>(&'a self, source: &'a S) -> FilteredLines<'a, S> {
        FilteredLines {
            source,
            filter: self,
        }
    }
}

fn strip_match(caps: &Captures<'_>) -> String {
    let Some(whole) = caps.get(0) else {
        return String::new();
    };
    if caps.len() == 1 {
        return String::new();
    }

    let mut spans = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|group| (group.start(), group.end()))
        .collect::<Vec<_>>();
    spans.sort_unstable();

    let text = whole.as_str();
    let base = whole.start();
    let mut kept = String::with_capacity(text.len());
    let mut cursor = base;
    for (start, end) in spans {
        if start > cursor {
            kept.push_str(&text[cursor - base..start - base]);
        }
        cursor = cursor.max(end);
    }
    if cursor < whole.end() {
        kept.push_str(&text[cursor - base..]);
    }
    kept
}

/// [`LineSource`] adapter applying a [`TextFilter`] on every access.
#[derive(Debug, Clone, Copy)]
pub struct FilteredLines<'a, S: ?Sized> {
    source: &'a S,
    filter: &'a TextFilter,
}

impl<S: LineSource + ?Sized> LineSource for FilteredLines<'_, S> {
    fn line_count(&self) -> usize {
        self.source.line_count()
    }

    fn line(&self, index: usize) -> Option<Cow<'_, str>> {
        let line = self.source.line(index)?;
        if self.filter.is_empty() {
            return Some(line);
        }
        Some(match line {
            Cow::Borrowed(text) => self.filter.apply(text),
            Cow::Owned(text) => Cow::Owned(self.filter.apply(&text).into_owned()),
        })
    }
}

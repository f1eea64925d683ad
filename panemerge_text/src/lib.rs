//! Lossless line documents and read-only line views for multi-pane comparison.
//!
//! This crate provides:
//! - a line model that keeps each line's ending (`LineDocument`, `Line`)
//! - line-level editing that reports `(start, size_delta)` notifications (`LineEdit`)
//! - the [`LineSource`] abstraction the comparison engine reads from
//! - count-preserving regex filters applied lazily per line (`TextFilter`, `FilteredLines`)
//!
//! Documents never drop or rewrite bytes on their own:
//! - `LineDocument::parse(text).render() == text` for every input
//! - filtering changes line content, never the number of lines
//!
//! # Example
//!
//! ```rust
//! use panemerge_text::{LineDocument, LineSource};
//!
//! let input = "alpha\r\nbeta\ngamma";
//! let mut doc = LineDocument::parse(input);
//! assert_eq!(doc.render(), input);
//! assert_eq!(doc.line_count(), 3);
//!
//! let edit = doc.insert_lines(1, &["inserted"]).unwrap();
//! assert_eq!((edit.start, edit.size_delta), (1, 1));
//! assert_eq!(doc.line(1).as_deref(), Some("inserted"));
//! ```

mod filter;
mod source;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use filter::{FilterRule, FilteredLines, TextFilter};
pub use source::LineSource;

/// Errors raised while compiling filters or editing documents.
#[derive(Debug, Error)]
pub enum TextError {
    /// A filter pattern failed to compile.
    #[error("filter `{label}` has an invalid pattern: {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: regex::Error,
    },
    /// An edit addressed lines outside the document.
    #[error("edit range {start}..{end} is outside a document of {line_count} line(s)")]
    EditOutOfRange {
        start: usize,
        end: usize,
        line_count: usize,
    },
}

/// One line of text with its original terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub line_ending: String,
}

/// Edit notification: `size_delta` lines were added (or removed, if negative) at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    pub start: usize,
    pub size_delta: isize,
}

/// Lossless, editable line container.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineDocument {
    pub source_name: Option<String>,
    lines: Vec<Line>,
}

impl LineDocument {
    /// Split `input` into lines, keeping `\n`, `\r\n`, or no terminator per line.
    pub fn parse(input: &str) -> Self {
        Self {
            source_name: None,
            lines: collect_lines(input),
        }
    }

    /// Same as [`LineDocument::parse`], recording where the text came from.
    pub fn parse_named(input: &str, source_name: impl Into<String>) -> Self {
        let mut doc = Self::parse(input);
        doc.source_name = Some(source_name.into());
        doc
    }

    /// Build a document from bare line texts joined by `\n`.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let count = lines.len();
        let lines = lines
            .iter()
            .enumerate()
            .map(|(idx, text)| Line {
                text: text.as_ref().to_string(),
                line_ending: if idx + 1 < count { "\n" } else { "" }.to_string(),
            })
            .collect();
        Self {
            source_name: None,
            lines,
        }
    }

    /// Lines with their terminators.
    pub fn entries(&self) -> &[Line] {
        &self.lines
    }

    /// Line texts without terminators.
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }

    /// Whether the last line carries a terminator.
    pub fn ends_with_newline(&self) -> bool {
        self.lines
            .last()
            .is_some_and(|line| !line.line_ending.is_empty())
    }

    /// Terminator used for newly inserted lines: the first one seen, else `\n`.
    pub fn default_line_ending(&self) -> &str {
        self.lines
            .iter()
            .map(|line| line.line_ending.as_str())
            .find(|ending| !ending.is_empty())
            .unwrap_or("\n")
    }

    /// Render the document as exact original bytes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(&line.line_ending);
        }
        out
    }

    /// Replace `remove` lines at `start` with `insert`.
    ///
    /// A missing final terminator stays missing: inserting after an
    /// unterminated last line terminates it and leaves the new last line bare.
    pub fn replace_lines<S: AsRef<str>>(
        &mut self,
        start: usize,
        remove: usize,
        insert: &[S],
    ) -> Result<LineEdit, TextError> {
        let end = start.saturating_add(remove);
        if start > self.lines.len() || end > self.lines.len() {
            return Err(TextError::EditOutOfRange {
                start,
                end,
                line_count: self.lines.len(),
            });
        }

        let ending = self.default_line_ending().to_string();
        let touches_end = end == self.lines.len();
        let bare_tail = touches_end && !self.lines.is_empty() && !self.ends_with_newline();

        let mut replacement = insert
            .iter()
            .map(|text| Line {
                text: text.as_ref().to_string(),
                line_ending: ending.clone(),
            })
            .collect::<Vec<_>>();

        if bare_tail || (touches_end && self.lines.is_empty()) {
            if let Some(last) = replacement.last_mut() {
                last.line_ending.clear();
            } else if start > 0 && remove > 0 {
                self.lines[start - 1].line_ending.clear();
            }
            if start > 0 && remove == 0 && !replacement.is_empty() {
                self.lines[start - 1].line_ending = ending;
            }
        }

        self.lines.splice(start..end, replacement);
        Ok(LineEdit {
            start,
            size_delta: insert.len() as isize - remove as isize,
        })
    }

    pub fn insert_lines<S: AsRef<str>>(
        &mut self,
        start: usize,
        insert: &[S],
    ) -> Result<LineEdit, TextError> {
        self.replace_lines(start, 0, insert)
    }

    pub fn delete_lines(&mut self, start: usize, count: usize) -> Result<LineEdit, TextError> {
        self.replace_lines::<&str>(start, count, &[])
    }

    /// Overwrite the text of one line, keeping its terminator.
    pub fn set_line(&mut self, index: usize, text: &str) -> Result<LineEdit, TextError> {
        let line_count = self.lines.len();
        let Some(line) = self.lines.get_mut(index) else {
            return Err(TextError::EditOutOfRange {
                start: index,
                end: index + 1,
                line_count,
            });
        };
        line.text = text.to_string();
        Ok(LineEdit {
            start: index,
            size_delta: 0,
        })
    }
}

impl fmt::Display for LineDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn collect_lines(input: &str) -> Vec<Line> {
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < input.len() {
        let next_lf = input[start..].find('\n').map(|idx| start + idx);
        let (segment, next_start) = if let Some(lf_idx) = next_lf {
            (&input[start..=lf_idx], lf_idx + 1)
        } else {
            (&input[start..], input.len())
        };

        let (text, line_ending) = split_line_ending(segment);
        out.push(Line {
            text: text.to_string(),
            line_ending: line_ending.to_string(),
        });
        start = next_start;
    }

    out
}

fn split_line_ending(segment: &str) -> (&str, &str) {
    if let Some(raw) = segment.strip_suffix("\r\n") {
        (raw, "\r\n")
    } else if let Some(raw) = segment.strip_suffix('\n') {
        (raw, "\n")
    } else {
        (segment, "")
    }
}

use std::borrow::Cow;
use std::ops::Range;

use crate::LineDocument;

/// Read-only, indexable view over the current lines of one pane.
///
/// Implementations return line text without terminators. Ranges past the end
/// are clamped rather than rejected.
pub trait LineSource {
    /// Current number of lines.
    fn line_count(&self) -> usize;

    /// Text of line `index`, or `None` past the end.
    fn line(&self, index: usize) -> Option<Cow<'_, str>>;

    /// Texts of the lines in `range`, clamped to the current line count.
    fn lines(&self, range: Range<usize>) -> Vec<Cow<'_, str>> {
        let end = range.end.min(self.line_count());
        let start = range.start.min(end);
        (start..end).filter_map(|idx| self.line(idx)).collect()
    }

    /// Whether line `index` exists and is empty.
    fn is_blank(&self, index: usize) -> bool {
        self.line(index).is_some_and(|line| line.is_empty())
    }
}

impl<T: LineSource + ?Sized> LineSource for &T {
    fn line_count(&self) -> usize {
        (**self).line_count()
    }

    fn line(&self, index: usize) -> Option<Cow<'_, str>> {
        (**self).line(index)
    }
}

impl<S: AsRef<str>> LineSource for [S] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> Option<Cow<'_, str>> {
        self.get(index).map(|line| Cow::Borrowed(line.as_ref()))
    }
}

impl<S: AsRef<str>> LineSource for Vec<S> {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line(&self, index: usize) -> Option<Cow<'_, str>> {
        self.as_slice().line(index)
    }
}

impl LineSource for LineDocument {
    fn line_count(&self) -> usize {
        self.entries().len()
    }

    fn line(&self, index: usize) -> Option<Cow<'_, str>> {
        self.entries()
            .get(index)
            .map(|line| Cow::Borrowed(line.text.as_str()))
    }
}

use serde::Serialize;

use crate::chunk::{Chunk, ChunkTag, MergeRecord, Side};
use crate::differ::Differ;

/// Change counters for one side of a comparison, in middle-pane terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DiffStats {
    pub inserts: usize,
    pub deletes: usize,
    pub replaces: usize,
    pub conflicts: usize,
    pub inserted_lines: usize,
    pub deleted_lines: usize,
    pub replaced_old_lines: usize,
    pub replaced_new_lines: usize,
}

impl DiffStats {
    fn record(&mut self, chunk: &Chunk) {
        match chunk.tag {
            ChunkTag::Insert => {
                self.inserts += 1;
                self.inserted_lines += chunk.len_b();
            }
            ChunkTag::Delete => {
                self.deletes += 1;
                self.deleted_lines += chunk.len_a();
            }
            ChunkTag::Replace => {
                self.replaces += 1;
                self.replaced_old_lines += chunk.len_a();
                self.replaced_new_lines += chunk.len_b();
            }
            ChunkTag::Conflict => self.conflicts += 1,
            ChunkTag::Equal => {}
        }
    }
}

/// Serializable snapshot of a differ's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonSummary {
    pub panes: usize,
    pub line_counts: Vec<usize>,
    pub identical: bool,
    pub records: Vec<MergeRecord>,
    pub conflicts: Vec<usize>,
    pub left: DiffStats,
    pub right: DiffStats,
}

/// Collect records and per-side counters from `differ`.
pub fn summarize(differ: &Differ) -> ComparisonSummary {
    let mut left = DiffStats::default();
    let mut right = DiffStats::default();
    for record in differ.all_changes() {
        if let Some(chunk) = &record.left {
            left.record(chunk);
        }
        if let Some(chunk) = &record.right {
            right.record(chunk);
        }
    }

    ComparisonSummary {
        panes: differ.pane_count(),
        line_counts: (0..differ.pane_count())
            .filter_map(|pane| differ.line_count(pane))
            .collect(),
        identical: differ.sequences_identical(),
        records: differ.all_changes().to_vec(),
        conflicts: differ.conflicts().to_vec(),
        left,
        right,
    }
}

/// Format a markdown-oriented human report. `labels` name the panes in order.
pub fn format_markdown_report(summary: &ComparisonSummary, labels: &[&str]) -> String {
    let label = |pane: usize| labels.get(pane).copied().unwrap_or("?");

    let mut out = String::new();
    out.push_str("# Comparison Report\n\n");
    for pane in 0..summary.panes {
        let lines = summary.line_counts.get(pane).copied().unwrap_or(0);
        out.push_str(&format!("- Pane {pane}: `{}` ({lines} lines)\n", label(pane)));
    }
    out.push('\n');

    let sides = if summary.panes == 3 {
        vec![("Left", &summary.left), ("Right", &summary.right)]
    } else {
        vec![("Changes", &summary.left)]
    };
    for (name, stats) in sides {
        out.push_str(&format!("## {name}\n\n"));
        push_stats(&mut out, stats);
    }

    out.push_str("## Records\n\n");
    if summary.records.is_empty() {
        out.push_str("No changes detected.\n");
    } else {
        for (idx, record) in summary.records.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", idx + 1, describe_record(record)));
        }
    }

    if !summary.conflicts.is_empty() {
        out.push_str(&format!(
            "\n## Conflicts\n\n- {} conflicting record(s): {}\n",
            summary.conflicts.len(),
            summary
                .conflicts
                .iter()
                .map(|idx| (idx + 1).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    out
}

fn push_stats(out: &mut String, stats: &DiffStats) {
    out.push_str(&format!(
        "- Inserts: {} ({} lines)\n",
        stats.inserts, stats.inserted_lines
    ));
    out.push_str(&format!(
        "- Deletes: {} ({} lines)\n",
        stats.deletes, stats.deleted_lines
    ));
    out.push_str(&format!(
        "- Replaces: {} ({} -> {} lines)\n",
        stats.replaces, stats.replaced_old_lines, stats.replaced_new_lines
    ));
    if stats.conflicts > 0 {
        out.push_str(&format!("- Conflicts: {}\n", stats.conflicts));
    }
    out.push('\n');
}

fn describe_record(record: &MergeRecord) -> String {
    let parts = [Side::Left, Side::Right]
        .into_iter()
        .filter_map(|side| {
            let chunk = record.side(side)?;
            Some(format!(
                "{} middle {}..{} / pane {} {}..{}",
                chunk.tag.as_str(),
                chunk.start_a,
                chunk.end_a,
                side.pane(),
                chunk.start_b,
                chunk.end_b
            ))
        })
        .collect::<Vec<_>>();
    if parts.is_empty() {
        String::from("empty")
    } else {
        parts.join("; ")
    }
}

use std::fs;
use std::path::Path;

use panemerge_engine::Merger;
use panemerge_text::{LineDocument, LineSource};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Fixture {
    name: String,
    left: String,
    base: String,
    right: String,
    #[serde(default = "default_mark_conflicts")]
    mark_conflicts: bool,
    expected: Expected,
}

#[derive(Debug, Deserialize)]
struct Expected {
    merged: String,
    unresolved: Vec<usize>,
    conflicts: usize,
}

fn default_mark_conflicts() -> bool {
    true
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
    let fixtures_dir = repo_root.join("fixtures");

    let mut entries = fs::read_dir(&fixtures_dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.path());

    let mut checked = 0usize;
    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }

        let raw = fs::read_to_string(&path)?;
        let fixture: Fixture = serde_json::from_str(&raw)?;

        let left = LineDocument::parse(&fixture.left);
        let base = LineDocument::parse(&fixture.base);
        let right = LineDocument::parse(&fixture.right);
        let panes: [&dyn LineSource; 3] = [&left, &base, &right];

        let mut merger = Merger::new();
        merger.initialize(&panes)?;

        let conflicts = merger.differ().conflicts().len();
        if conflicts != fixture.expected.conflicts {
            return Err(format!(
                "fixture {}: conflicts mismatch: expected {}, got {}",
                fixture.name, fixture.expected.conflicts, conflicts
            )
            .into());
        }

        let merged = merger.merge_three(fixture.mark_conflicts, &panes)?;
        if merged.text != fixture.expected.merged {
            return Err(format!(
                "fixture {}: merged mismatch: expected {:?}, got {:?}",
                fixture.name, fixture.expected.merged, merged.text
            )
            .into());
        }
        if merged.unresolved != fixture.expected.unresolved {
            return Err(format!(
                "fixture {}: unresolved mismatch: expected {:?}, got {:?}",
                fixture.name, fixture.expected.unresolved, merged.unresolved
            )
            .into());
        }

        checked += 1;
    }

    println!("replayed {checked} fixture(s)");
    Ok(())
}

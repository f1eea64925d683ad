use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use panemerge_engine::{
    ConflictPolicy, Differ, EngineOptions, Merger, format_markdown_report, summarize,
};
use panemerge_text::{FilterRule, LineDocument, LineSource};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "panemerge")]
#[command(about = "Compare two or three files and produce three-way merges")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compare files against the second (middle) file and print a report
    Diff {
        /// Two or three files; the second is the middle pane
        #[arg(num_args = 2..=3, required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        json: bool,

        #[arg(long)]
        ignore_blank_lines: bool,

        /// Regex whose matches are ignored when comparing; repeatable
        #[arg(long = "filter", value_name = "RE")]
        filters: Vec<String>,

        /// JSON file with engine options
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Merge LOCAL and REMOTE changes into BASE
    Merge {
        local: PathBuf,
        base: PathBuf,
        remote: PathBuf,

        /// Write the merged text here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep base content in conflicts instead of placeholder lines
        #[arg(long)]
        no_markers: bool,

        /// Do not split conflicts into resolvable parts
        #[arg(long)]
        plain: bool,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Diff {
            files,
            json,
            ignore_blank_lines,
            filters,
            config,
        } => {
            let mut options = load_options(config.as_deref())?.unwrap_or_default();
            if ignore_blank_lines {
                options.ignore_blank_lines = true;
            }
            for (idx, pattern) in filters.into_iter().enumerate() {
                options.filters.push(FilterRule::new(format!("cli-{}", idx + 1), pattern));
            }
            run_diff(&files, json, options)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Merge {
            local,
            base,
            remote,
            output,
            no_markers,
            plain,
            config,
        } => {
            let mut options = load_options(config.as_deref())?.unwrap_or_else(|| {
                EngineOptions::default().with_conflict_policy(ConflictPolicy::AutoResolve)
            });
            if plain {
                options.conflict_policy = ConflictPolicy::Plain;
            }
            let unresolved = run_merge(
                [&local, &base, &remote],
                output.as_deref(),
                !no_markers,
                options,
            )?;
            if unresolved > 0 {
                return Ok(ExitCode::from(1));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_options(path: Option<&Path>) -> Result<Option<EngineOptions>, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = fs::read_to_string(path)?;
    let options = serde_json::from_str(&raw)?;
    debug!(config = %path.display(), "loaded engine options");
    Ok(Some(options))
}

fn read_document(path: &Path) -> Result<LineDocument, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    Ok(LineDocument::parse_named(&text, path.display().to_string()))
}

fn run_diff(
    files: &[PathBuf],
    json: bool,
    options: EngineOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let docs = files
        .iter()
        .map(|path| read_document(path))
        .collect::<Result<Vec<_>, _>>()?;
    let panes = docs.iter().map(|doc| doc as &dyn LineSource).collect::<Vec<_>>();

    let mut differ = Differ::with_options(options)?;
    differ.set_sequences(&panes)?;
    let summary = summarize(&differ);
    info!(
        records = summary.records.len(),
        conflicts = summary.conflicts.len(),
        "comparison finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let labels = files
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>();
        let labels = labels.iter().map(String::as_str).collect::<Vec<_>>();
        println!("{}", format_markdown_report(&summary, &labels));
    }
    Ok(())
}

/// Returns the number of unresolved lines left in the output.
fn run_merge(
    files: [&PathBuf; 3],
    output: Option<&Path>,
    mark_conflicts: bool,
    options: EngineOptions,
) -> Result<usize, Box<dyn std::error::Error>> {
    let [local, base, remote] = files.map(|path| read_document(path));
    let (local, base, remote) = (local?, base?, remote?);
    let panes: [&dyn LineSource; 3] = [&local, &base, &remote];

    let mut merger = Merger::with_options(options)?;
    merger.initialize(&panes)?;
    let merged = merger.merge_three(mark_conflicts, &panes)?;

    let mut text = merged.text;
    if !text.is_empty() && base.ends_with_newline() {
        text.push('\n');
    }
    match output {
        Some(path) => fs::write(path, &text)?,
        None => print!("{text}"),
    }

    for line in &merged.unresolved {
        eprintln!("unresolved conflict at line {}", line + 1);
    }
    Ok(merged.unresolved.len())
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use walkdir::WalkDir;

use pyfmt::config::Settings;
use pyfmt::formatter::format_source;

#[derive(Parser, Debug)]
#[command(name = "pyfmt", version, about = "Canonical-layout Python formatter")]
struct Cli {
    /// Single file to reformat
    #[arg(short = 't', long, value_name = "FILE", conflicts_with = "directory")]
    target_file: Option<PathBuf>,
    /// Reformat all matching files under a directory (defaults to current dir)
    #[arg(short = 'd', long, value_name = "DIR")]
    directory: Option<PathBuf>,
    /// Configuration file with KEY=VALUE settings
    #[arg(long, value_name = "FILE")]
    configuration: Option<PathBuf>,
    /// Maximum line length
    #[arg(long, value_name = "COLUMNS")]
    max_line: Option<usize>,
    /// Empty lines between nested definitions
    #[arg(long, value_name = "LINES")]
    nested_lines: Option<usize>,
    /// Empty lines between top-level definitions
    #[arg(long, value_name = "LINES")]
    vertical_definition_lines: Option<usize>,
    /// Check if files are formatted; non-zero exit if changes are needed
    #[arg(short = 'c', long)]
    check_only: bool,
    /// Put spaces around `=` in defaults and keyword arguments
    #[arg(long)]
    space_between_arguments: bool,
    /// Allow importing multiple modules in a single line
    #[arg(long)]
    multiple_imports: bool,
    /// File suffix to include when walking a directory (repeatable)
    #[arg(long = "suffix", value_name = "SUFFIX")]
    suffixes: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let settings = build_settings(cli)?;
    let files = collect_files(cli, &settings);
    if files.is_empty() {
        warn!("no matching files found");
        return Ok(ExitCode::SUCCESS);
    }

    let mut changed = 0usize;
    let mut failed = 0usize;
    for path in &files {
        match process_file(path, &settings) {
            Ok(true) => {
                changed += 1;
                if settings.check_only {
                    println!("would reformat {}", path.display());
                }
            }
            Ok(false) => debug!("already formatted: {}", path.display()),
            Err(e) => {
                // One bad file must not abort the rest of the run.
                failed += 1;
                eprintln!("{}: {e:#}", path.display());
            }
        }
    }
    info!(
        "{} file(s) processed, {} changed, {} failed",
        files.len(),
        changed,
        failed
    );

    if failed > 0 || (settings.check_only && changed > 0) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Merge settings: configuration file first, command-line flags on top.
fn build_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.configuration {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(max_line) = cli.max_line {
        settings.max_line = max_line;
    }
    if let Some(nested_lines) = cli.nested_lines {
        settings.nested_lines = nested_lines;
    }
    if let Some(vertical) = cli.vertical_definition_lines {
        settings.vertical_definition_lines = vertical;
    }
    if cli.check_only {
        settings.check_only = true;
    }
    if cli.space_between_arguments {
        settings.space_between_arguments = true;
    }
    if cli.multiple_imports {
        settings.multiple_imports = true;
    }
    if !cli.suffixes.is_empty() {
        settings.allowed_suffixes = cli.suffixes.clone();
    }
    Ok(settings)
}

fn collect_files(cli: &Cli, settings: &Settings) -> Vec<PathBuf> {
    if let Some(target) = &cli.target_file {
        return vec![target.clone()];
    }
    let root = cli
        .directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .into_iter()
        .filter_entry(|entry| !is_venv_dir(entry));
    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && has_allowed_suffix(path, &settings.allowed_suffixes) {
            files.push(path.to_path_buf());
        }
    }
    files
}

fn is_venv_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.contains("venv"))
}

fn has_allowed_suffix(path: &Path, suffixes: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
}

/// Format one file. Returns whether the canonical form differs from the
/// current contents; in write mode a differing file is atomically replaced.
fn process_file(path: &Path, settings: &Settings) -> Result<bool> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let formatted = format_source(&content, settings)?;
    let changed = formatted != content;
    if changed && !settings.check_only {
        replace_file(path, &formatted)?;
        info!("reformatted {}", path.display());
    }
    Ok(changed)
}

/// Replace `path` by writing a sibling temp file and renaming it over the
/// original, so a crash mid-write never leaves a truncated source file.
fn replace_file(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid file name: {}", path.display()))?;
    let tmp = path.with_file_name(format!("{file_name}.pyfmt.tmp"));
    fs::write(&tmp, content)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("failed to replace {}", path.display()));
    }
    Ok(())
}

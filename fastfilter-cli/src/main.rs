// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fastfilter CLI
//!
//! Command-line interface for filtering git fast-export streams.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fastfilter_core::{
    FastExportFilter, FilterConfig, FilterStats, MarkRegistry, RecordKind, RewriteRules,
};
use fastfilter_git::{count_commits, ExportSource, ImportSink};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "fastfilter")]
#[command(
    about = "Fastfilter - rewrite git history through fast-export streams",
    long_about = None
)]
struct Cli {
    /// Verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter an interchange stream
    Filter {
        /// Rewrite rules (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Read the stream from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write the stream to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export SOURCE, filter it and import the result into TARGET
    Rewrite {
        /// Repository to read history from
        source: PathBuf,

        /// Repository to write history to (created if missing)
        target: PathBuf,

        /// Rewrite rules (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report commits rewritten so far on stderr
        #[arg(long)]
        progress: bool,

        /// Extra arguments for git fast-export
        #[arg(last = true)]
        export_args: Vec<String>,
    },

    /// Count the commits reachable from any ref
    Count {
        /// Repository to count
        repo: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout may carry the stream
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Filter {
            config,
            input,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let mut filter = build_filter(&config, None)?;

            let reader: Box<dyn BufRead> = match &input {
                Some(path) => Box::new(BufReader::new(
                    File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
                )),
                None => Box::new(std::io::stdin().lock()),
            };
            let writer: Box<dyn Write> = match &output {
                Some(path) => Box::new(
                    File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                ),
                None => Box::new(std::io::stdout().lock()),
            };

            filter.run(reader, writer).context("Filtering failed")?;
        }

        Commands::Rewrite {
            source,
            target,
            config,
            progress,
            export_args,
        } => {
            let config = load_config(config.as_deref())?;
            let total = if progress {
                let total = count_commits(&source)
                    .with_context(|| format!("Failed to count commits in {}", source.display()))?;
                Some(total)
            } else {
                None
            };
            let mut filter = build_filter(&config, total)?;

            let mut export = ExportSource::spawn(&source, &export_args)
                .with_context(|| format!("Failed to export {}", source.display()))?;
            let mut import = ImportSink::open(&target, &[])
                .with_context(|| format!("Failed to start import into {}", target.display()))?;

            let stats = match filter.run(export.reader(), import.writer()) {
                Ok(stats) => stats,
                Err(err) => {
                    // Keep a half-written history out of the target's refs
                    if let Err(abort_err) = import.abort() {
                        warn!(error = %abort_err, "failed to stop git fast-import");
                    }
                    return Err(err).context("Filtering failed");
                }
            };
            if progress {
                eprintln!();
            }

            export.finish().context("git fast-export failed")?;
            import.finish().context("git fast-import failed")?;
            report(&stats, &target);
        }

        Commands::Count { repo } => {
            let count = count_commits(&repo)
                .with_context(|| format!("Failed to count commits in {}", repo.display()))?;
            println!("{}", count);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<FilterConfig> {
    match path {
        Some(path) => FilterConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(FilterConfig::default()),
    }
}

/// Configured rewrites, plus a progress counter when `progress_total` is set
fn build_filter(
    config: &FilterConfig,
    progress_total: Option<u64>,
) -> Result<FastExportFilter<'static>> {
    let mut handlers = RewriteRules::from_config(config)
        .context("Invalid rewrite rules")?
        .into_handlers();
    if let Some(total) = progress_total {
        let mut seen = 0u64;
        handlers = handlers.on_every(move |kind, _element| {
            if kind == RecordKind::Commit {
                seen += 1;
                eprint!("\rRewrote {}/{} commits", seen, total);
            }
        });
    }
    if config.is_passthrough() {
        info!("no rewrite rules configured, passing the stream through");
    }
    let marks = MarkRegistry::with_validation(config.validation);
    Ok(FastExportFilter::with_registry(handlers, marks))
}

fn report(stats: &FilterStats, target: &Path) {
    info!(
        commits = stats.commits,
        blobs = stats.blobs,
        skipped = stats.skipped,
        target = %target.display(),
        "rewrite complete"
    );
    println!(
        "✓ Rewrote {} commits and {} blobs into {} ({} dropped)",
        stats.commits,
        stats.blobs,
        target.display(),
        stats.skipped
    );
}

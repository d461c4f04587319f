use std::ffi::OsStr;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use log::{info, warn, LevelFilter};
use ripper::error::RipError;
use ripper::pipeline::{BookPipeline, MediaPrompt};
use ripper::status::{BookStatus, DiscId, STATUS_FILE};
use ripper::tools::Toolbox;
use ripper::RipConfig;
use walkdir::WalkDir;

/// Multi-disc audiobook ripper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the destination directory for finished containers
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Combine all discs into a single container
    #[arg(long)]
    single_file: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .init();

    let mut cfg = RipConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = args.output_dir {
        cfg.dest_dir = dir;
    }
    if args.single_file {
        cfg.single_file = true;
    }

    fs::create_dir_all(&cfg.work_root).with_context(|| {
        format!("Failed to create work directory: {}", cfg.work_root.display())
    })?;

    // resume an interrupted job if its status document is still around
    let (mut status, workdir) = match find_resumable_job(&cfg.work_root)? {
        Some((status, workdir)) => {
            info!(
                "resuming \"{}\" by {} ({} discs)",
                status.title, status.author, status.disc_count
            );
            (status, workdir)
        }
        None => {
            let meta = prompt_metadata().context("Failed to gather book metadata")?;
            let mut status =
                BookStatus::new(&meta.title, &meta.author, meta.year, meta.disc_count);
            let workdir = cfg.work_root.join(sanitize(&status.title));
            fs::create_dir_all(&workdir).with_context(|| {
                format!("Failed to create job directory: {}", workdir.display())
            })?;
            status
                .save(&workdir)
                .context("Failed to write initial status document")?;
            info!("starting \"{}\" ({} discs)", status.title, status.disc_count);
            (status, workdir)
        }
    };

    let tools = Toolbox::from_config(&cfg);
    let pipeline = BookPipeline::new(cfg, tools, Arc::new(StdinPrompt));

    match pipeline.run(&mut status, &workdir).await {
        Ok(()) => {
            info!("\"{}\" finished", status.title);
            Ok(())
        }
        Err(e) => {
            // flush whatever durable progress was reached before exiting
            if workdir.exists() {
                if let Err(save_err) = status.save(&workdir) {
                    warn!("could not flush status document: {}", save_err);
                }
            }
            if e.is_interrupted() {
                warn!("aborted; re-run to resume from the last completed step");
            }
            Err(e).context("rip aborted")
        }
    }
}

/// Look for a status document under the work root. The first valid one wins;
/// unreadable documents are reported and skipped.
fn find_resumable_job(root: &Path) -> Result<Option<(BookStatus, PathBuf)>> {
    for entry in WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_name() != OsStr::new(STATUS_FILE) {
            continue;
        }
        let Some(workdir) = entry.path().parent() else {
            continue;
        };
        match BookStatus::load(workdir) {
            Ok(Some(status)) => return Ok(Some((status, workdir.to_path_buf()))),
            Ok(None) => {}
            Err(e) => warn!("ignoring unreadable job at {}: {}", workdir.display(), e),
        }
    }
    Ok(None)
}

struct BookMeta {
    title: String,
    author: String,
    year: i32,
    disc_count: u32,
}

/// Gather book metadata interactively on stdin.
fn prompt_metadata() -> Result<BookMeta> {
    let title = prompt_line("Title: ")?;
    anyhow::ensure!(!title.is_empty(), "title must not be empty");
    let author = prompt_line("Author: ")?;
    anyhow::ensure!(!author.is_empty(), "author must not be empty");
    let year: i32 = prompt_line("Year: ")?
        .parse()
        .context("year must be a number")?;
    let disc_count: u32 = prompt_line("Number of discs: ")?
        .parse()
        .context("disc count must be a number")?;
    anyhow::ensure!(disc_count > 0, "disc count must be at least 1");
    Ok(BookMeta {
        title,
        author,
        year,
        disc_count,
    })
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    let n = io::stdin().lock().read_line(&mut line)?;
    anyhow::ensure!(n > 0, "unexpected end of input");
    Ok(line.trim().to_string())
}

/// Stdin-backed media exchange prompt: Enter continues, `q` or EOF aborts.
struct StdinPrompt;

#[async_trait]
impl MediaPrompt for StdinPrompt {
    async fn confirm_exchange(&self, disc: DiscId, title: &str) -> Result<(), RipError> {
        println!("Insert disc {} of \"{}\" and press Enter (q to abort)", disc, title);
        let read = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            let n = io::stdin().lock().read_line(&mut line)?;
            Ok::<_, io::Error>((n, line))
        })
        .await
        .map_err(|e| RipError::Consistency(format!("prompt task died: {}", e)))?;
        let (n, line) = read.map_err(|e| RipError::io(Path::new("stdin"), e))?;
        if n == 0 || line.trim().eq_ignore_ascii_case("q") {
            return Err(RipError::Interrupted);
        }
        Ok(())
    }
}

/// Keep job directory names filesystem-safe.
fn sanitize(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

//! healthsync - collect health metrics and upload them to a oneM2M sink
//!
//! This tool provides commands for:
//! - Running the collect, chunk, persist and upload pipeline over a date range
//! - Listing chunk artifacts still waiting for upload
//! - Re-uploading those artifacts after a failed run
//! - Checking sink configuration
//!
//! Uses XDG Base Directory specification for file locations:
//! - Artifacts: $XDG_DATA_HOME/healthsync/healthCSVFolder (~/.local/share/healthsync/healthCSVFolder)
//! - Config: $XDG_CONFIG_HOME/healthsync/config.toml (~/.config/healthsync/config.toml)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Days, Local, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use healthsync_core::{
    Category, CategoryReport, ChunkStore, CollectOutcome, Config, ExportSource, PersistStatus,
    SyncPipeline, SyncUploader, UploadOutcome, Window,
};

#[derive(Parser)]
#[command(name = "healthsync")]
#[command(about = "Collect health metrics and upload them to a oneM2M sink")]
#[command(version)]
struct Args {
    /// Write a log file under $XDG_STATE_HOME/healthsync
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect and upload every category over a date range
    Run {
        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Only run these categories (repeatable; default: all)
        #[arg(short, long = "category")]
        categories: Vec<Category>,

        /// Directory holding <category>.jsonl exports (default: <data_root>/export)
        #[arg(short, long)]
        source: Option<PathBuf>,
    },

    /// List chunk artifacts waiting for upload
    Pending,

    /// Re-upload chunk artifacts left behind by failed runs
    Resume,

    /// Show sink configuration and status
    Status,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = if args.verbose {
        Some(
            healthsync_core::logging::init(&config.logging)
                .context("failed to initialize logging")?,
        )
    } else {
        None
    };

    match args.command {
        Command::Run {
            from,
            to,
            categories,
            source,
        } => cmd_run(&config, from, to, categories, source),
        Command::Pending => cmd_pending(&config),
        Command::Resume => cmd_resume(&config),
        Command::Status => cmd_status(&config),
    }
}

/// Local midnight of `date`, or the first instant after it on DST gaps
fn local_midnight(date: NaiveDate) -> Result<chrono::DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .context("invalid midnight")?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        })
        .with_context(|| format!("no local midnight on {}", date))?;
    Ok(local.with_timezone(&Utc))
}

/// Query window for a picked date range.
///
/// Starts at local midnight of the day before `from` and ends at local
/// midnight of `to`.
fn request_window(from: NaiveDate, to: NaiveDate) -> Result<Window> {
    if to < from {
        bail!("--to ({}) is before --from ({})", to, from);
    }
    let start_day = from
        .checked_sub_days(Days::new(1))
        .context("--from is out of range")?;
    Ok(Window::new(local_midnight(start_day)?, local_midnight(to)?))
}

fn default_source_dir(config: &Config) -> PathBuf {
    config.store.data_root().join("export")
}

fn cmd_run(
    config: &Config,
    from: NaiveDate,
    to: NaiveDate,
    categories: Vec<Category>,
    source: Option<PathBuf>,
) -> Result<()> {
    config
        .sink
        .validate()
        .context("sink is not configured. Run 'status' for details")?;

    let window = request_window(from, to)?;
    let source_dir = source.unwrap_or_else(|| default_source_dir(config));
    let categories = if categories.is_empty() {
        Category::ALL.to_vec()
    } else {
        categories
    };

    tracing::info!(
        %window,
        source = %source_dir.display(),
        categories = categories.len(),
        "Starting run"
    );

    let pipeline = SyncPipeline::new(config, Arc::new(ExportSource::new(&source_dir)))
        .context("failed to create pipeline")?;

    println!("Window: {}", window);
    println!("Source: {}", source_dir.display());
    println!();

    let reports = pipeline.run_categories(&categories, window);
    for report in &reports {
        print_report(report);
    }

    let incomplete = reports.iter().filter(|r| !r.is_complete()).count();
    println!();
    if incomplete > 0 {
        bail!(
            "{} categor{} did not fully upload; run 'resume' to retry",
            incomplete,
            if incomplete == 1 { "y" } else { "ies" }
        );
    }

    println!("Run complete");
    Ok(())
}

fn print_report(report: &CategoryReport) {
    let collect = match &report.collect {
        CollectOutcome::Samples(n) => format!("{} samples", n),
        CollectOutcome::Empty => "no samples".to_string(),
        CollectOutcome::Failed(reason) => format!("query failed ({})", reason),
    };

    println!(
        "{:<11} {:<28} chunks: {}  delivered: {}  failed: {}",
        report.category.as_str(),
        collect,
        report.chunks.len(),
        report.delivered(),
        report.failed()
    );

    for chunk in &report.chunks {
        if let PersistStatus::Failed(e) = &chunk.persist {
            println!("  chunk {}: not persisted: {}", chunk.index, e);
        }
        match &chunk.upload {
            UploadOutcome::Delivered { .. } => {}
            UploadOutcome::Rejected { status, body } => {
                println!("  chunk {}: rejected with {}: {}", chunk.index, status, body)
            }
            UploadOutcome::Transport(e) => {
                println!("  chunk {}: not sent: {}", chunk.index, e)
            }
        }
    }
}

fn cmd_pending(config: &Config) -> Result<()> {
    let store =
        ChunkStore::open(&config.store.data_root()).context("failed to open artifact store")?;
    let pending = store.pending().context("failed to list artifacts")?;

    if pending.is_empty() {
        println!("No pending artifacts.");
        return Ok(());
    }

    println!("Pending artifacts ({}):", pending.len());
    for artifact in &pending {
        println!(
            "  {:<11} chunk {:<4} {}",
            artifact.category.as_str(),
            artifact.index,
            artifact.path.display()
        );
    }

    Ok(())
}

fn cmd_resume(config: &Config) -> Result<()> {
    config
        .sink
        .validate()
        .context("sink is not configured. Run 'status' for details")?;

    let uploader = SyncUploader::new(config).context("failed to create uploader")?;

    println!("Checking for pending artifacts...");
    let reports = uploader.resume().context("failed to list artifacts")?;

    if reports.is_empty() {
        println!("No pending artifacts found.");
        return Ok(());
    }

    let mut failed = 0;
    for report in &reports {
        let status = match &report.outcome {
            UploadOutcome::Delivered { status, .. } => format!("delivered ({})", status),
            UploadOutcome::Rejected { status, .. } => {
                failed += 1;
                format!("rejected ({})", status)
            }
            UploadOutcome::Transport(e) => {
                failed += 1;
                format!("not sent: {}", e)
            }
        };
        println!(
            "  {:<11} chunk {:<4} {}",
            report.category.as_str(),
            report.index,
            status
        );
    }

    println!();
    println!("Delivered {} of {} artifact(s)", reports.len() - failed, reports.len());

    if failed > 0 {
        bail!("{} artifact(s) could not be uploaded", failed);
    }
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("healthsync Configuration");
    println!("========================");
    println!();

    let sink = &config.sink;
    println!("Config File:     {}", Config::config_path().display());
    println!("Server URL:      {}", sink.server_url);
    println!(
        "User ID:         {}",
        sink.user_id.as_deref().unwrap_or("<not set>")
    );
    println!("Origin:          {}", sink.origin);
    println!("Timeout:         {}s", sink.timeout_secs);
    println!(
        "Query Timeout:   {}s",
        config.pipeline.query_timeout_secs
    );
    println!("Data Root:       {}", config.store.data_root().display());
    println!(
        "Log File:        {}",
        healthsync_core::logging::log_file_path().display()
    );

    println!();
    match sink.validate() {
        Ok(()) => println!("Status: Ready to upload"),
        Err(e) => {
            println!("Status: Not ready ({})", e);
            println!();
            println!("Set the user id in config.toml:");
            println!();
            println!("  [sink]");
            println!("  user_id = \"your-user-id\"");
        }
    }

    Ok(())
}

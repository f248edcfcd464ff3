// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use podstation::{
    Config, NoopReporter, ProcessedEpisodes, ProgressEvent, ProgressReporter, ReqwestClient,
    RunContext, SharedProgressReporter, StationClient, SyncOptions, ensure_scratch_dir, run_sync,
    unknown_playlists,
};

// Emoji with fallback for terminals without Unicode support
static RADIO: Emoji<'_, '_> = Emoji("📻 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static UPLOAD: Emoji<'_, '_> = Emoji("📤 ", "[^] ");
static HOURGLASS: Emoji<'_, '_> = Emoji("⏳ ", "[.] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[-] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Exit status when uploads were attempted and every one failed
const EXIT_ALL_UPLOADS_FAILED: i32 = 2;

/// Ingest podcast episodes from RSS feeds into a radio station
#[derive(Parser, Debug)]
#[command(name = "podstation")]
#[command(about = "Ingest podcast episodes from RSS feeds into a radio station")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "podstation.json")]
    config: PathBuf,

    /// Show what would be uploaded, deleted and unassigned without doing it
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of episodes to upload this run
    #[arg(short, long)]
    limit: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - suppress progress output and all logs but errors
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    main_bar: ProgressBar,
    transfer_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_bar = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {wide_msg}")
        {
            main_bar.set_style(style);
        }
        main_bar.enable_steady_tick(Duration::from_millis(100));

        let transfer_bar = multi.add(ProgressBar::hidden());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  [{bar:30.cyan/blue}] {bytes}/{total_bytes}")
        {
            transfer_bar.set_style(style.progress_chars("█▓░"));
        }

        Self {
            main_bar,
            transfer_bar,
        }
    }

    fn line(&self, message: String) {
        self.main_bar.println(message);
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::OrphansReconciled { deleted, failed } => {
                self.line(format!(
                    "{BROOM}Orphans: {} deleted, {} failed",
                    deleted.to_string().cyan(),
                    failed.to_string().yellow()
                ));
            }

            ProgressEvent::FetchingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedParsed {
                show_title,
                total_episodes,
                new_episodes,
            } => {
                self.line(format!(
                    "{HEADPHONES}{} • {} episodes total, {} new",
                    show_title.bold().green(),
                    total_episodes.to_string().cyan(),
                    new_episodes.to_string().yellow()
                ));
            }

            ProgressEvent::FeedFailed { url, error } => {
                self.line(format!("{FAILURE}{} - {}", url.red(), error.dimmed()));
            }

            ProgressEvent::UploadStarting {
                episode_title,
                show_title,
                index,
                total,
            } => {
                self.transfer_bar.reset();
                self.transfer_bar.set_length(0);
                self.main_bar.set_message(format!(
                    "{UPLOAD}[{}/{}] {} {}",
                    (index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&episode_title, 40),
                    format!("({show_title})").dimmed()
                ));
            }

            ProgressEvent::TransferProgress {
                bytes_downloaded,
                total_bytes,
            } => {
                if let Some(total) = total_bytes {
                    self.transfer_bar.set_length(total);
                }
                self.transfer_bar.set_position(bytes_downloaded);
            }

            ProgressEvent::WaitingForIndexing {
                episode_title,
                attempt,
                max_attempts,
                delay,
            } => {
                self.main_bar.set_message(format!(
                    "{HOURGLASS}Waiting for {} to be indexed ({attempt}/{max_attempts}, {}s)",
                    truncate_title(&episode_title, 40),
                    delay.as_secs()
                ));
            }

            ProgressEvent::UploadCompleted { episode_title } => {
                self.line(format!(
                    "{SUCCESS}{}",
                    truncate_title(&episode_title, 60).green()
                ));
            }

            ProgressEvent::UploadFailed {
                episode_title,
                error,
            } => {
                self.line(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 40).red(),
                    error.red()
                ));
            }

            ProgressEvent::RetentionApplied {
                show_title,
                unassigned,
                failed,
            } => {
                self.line(format!(
                    "{BROOM}{}: {} unassigned, {} failed",
                    show_title.bold(),
                    unassigned.to_string().cyan(),
                    failed.to_string().yellow()
                ));
            }

            ProgressEvent::SyncCompleted {
                uploaded,
                already_present,
                failed,
            } => {
                self.transfer_bar.finish_and_clear();
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} uploaded, {} already on the station, {} failed",
                    "Run complete:".bold().green(),
                    uploaded.to_string().green().bold(),
                    already_present.to_string().yellow(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let head: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

fn init_tracing(args: &Args) {
    // RUST_LOG wins over the flags
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);
    debug!(?args, "CLI arguments parsed");

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            RADIO,
            "podstation".bold().magenta(),
            "- Podcast Ingestion".dimmed()
        );
    }

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    ensure_scratch_dir(&config.scratch_dir).context("Scratch directory unavailable")?;
    let processed =
        ProcessedEpisodes::load(&config.state_file).context("Failed to load processed episodes")?;

    let http = ReqwestClient::new().context("Failed to build HTTP client")?;
    let api = StationClient::new(&config.host, &config.station, &config.api_key);

    match unknown_playlists(&api, &config).await {
        Ok(missing) => {
            for id in missing {
                warn!(playlist = %id, "configured playlist does not exist on the station");
            }
        }
        Err(e) => warn!(error = %e, "could not list playlists"),
    }

    let mut ctx = RunContext::initialize(&api, processed)
        .await
        .context("Failed to fetch the remote file listing")?;

    let options = SyncOptions {
        limit: args.limit,
        dry_run: args.dry_run,
        ..SyncOptions::default()
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let report = run_sync(&http, &api, &config, &mut ctx, &options, reporter)
        .await
        .context("Ingestion run failed")?;

    if !args.quiet {
        if args.dry_run {
            println!("\n{}", "Dry run, would upload:".yellow().bold());
            for title in &report.planned {
                println!("  {UPLOAD}{title}");
            }
        }

        if !report.shows_failed.is_empty() {
            println!("\n{}", "Failed feeds:".red().bold());
            for (show, error) in &report.shows_failed {
                println!("  {}{} - {}", CROSS, show.yellow(), error.dimmed());
            }
        }

        if !report.failed_uploads.is_empty() {
            println!("\n{}", "Failed episodes:".red().bold());
            for (title, error) in &report.failed_uploads {
                println!("  {}{} - {}", CROSS, title.yellow(), error.dimmed());
            }
        }

        if report.deferred > 0 {
            println!(
                "\n{} episodes left for the next run",
                report.deferred.to_string().cyan()
            );
        }
        println!();
    }

    if report.all_uploads_failed() {
        std::process::exit(EXIT_ALL_UPLOADS_FAILED);
    }

    Ok(())
}

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tvshows::{
    EpisodeParser, EpisodeSelector, FeedConfig, JsonFile, Preferences, ProgressEvent,
    QualityClassifier, RetryConfig, ShowList, ShowRunner, TorrentDownloader, TvRssFeed,
    TvShowsError, check_connectivity, default_paths, fetch_catalog, load_run_documents,
    merge_catalog, run_cycle,
};

#[derive(Parser)]
#[command(name = "tvshows", version)]
#[command(about = "Download new episodes of your TV shows from torrent feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Preferences file (defaults to the platform configuration directory)
    #[arg(global = true, long)]
    preferences: Option<PathBuf>,

    /// Show list file (defaults to the platform configuration directory)
    #[arg(global = true, long)]
    shows: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(global = true, short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Check all subscribed shows and download new episodes (default)
    Run,

    /// Import the list of known shows from the feed site
    Catalog {
        /// Version recorded in the show list
        #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
        version: String,
    },
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::Started { show_count } => {
            println!("TVShows checking {} show(s)...", show_count);
        }
        ProgressEvent::CheckingShow {
            index,
            total,
            show_name,
        } => {
            println!("[{}/{}] {}", index + 1, total, show_name);
        }
        ProgressEvent::ShowSkipped { .. } => {}
        ProgressEvent::EpisodeDownloaded { key, path, .. } => {
            println!("  Downloaded {} to {}", key, path.display());
        }
        ProgressEvent::DownloadFailed { key, reason, .. } => {
            println!("  Failed to download {}: {}", key, reason);
        }
        ProgressEvent::ShowChecked {
            checkpoint,
            pending,
            ..
        } => {
            if pending > 0 {
                println!(
                    "  Up to {}, {} episode(s) waiting for better quality",
                    checkpoint, pending
                );
            } else {
                println!("  Up to {}", checkpoint);
            }
        }
        ProgressEvent::ShowFailed { reason, .. } => {
            println!("  Skipped: {}", reason);
        }
        ProgressEvent::Complete {
            downloaded,
            failed_shows,
        } => {
            println!(
                "\nDone! Downloaded {} episode(s), {} show(s) could not be checked.",
                downloaded, failed_shows
            );
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn document_paths(cli: &Cli) -> Result<(PathBuf, PathBuf), TvShowsError> {
    match (&cli.preferences, &cli.shows) {
        (Some(preferences), Some(shows)) => Ok((preferences.clone(), shows.clone())),
        (preferences, shows) => {
            let (default_preferences, default_shows) = default_paths()?;
            Ok((
                preferences.clone().unwrap_or(default_preferences),
                shows.clone().unwrap_or(default_shows),
            ))
        }
    }
}

fn run(preferences_path: PathBuf, shows_path: PathBuf) -> Result<(), TvShowsError> {
    let shows_file = JsonFile::<ShowList>::new(shows_path);
    let (preferences, mut show_list) =
        load_run_documents(&JsonFile::new(preferences_path), &shows_file)?;

    let classifier = QualityClassifier::new(&preferences.quality_tags)?;

    check_connectivity(
        &preferences.feed.url_template,
        preferences.feed.timeout(),
        &preferences.retry,
    )?;

    let feed = TvRssFeed::new(&preferences.feed, &preferences.retry)?;
    let downloader = TorrentDownloader::new(
        preferences.resolved_torrent_folder(),
        preferences.open_after_download,
        &preferences.feed.user_agent,
        preferences.feed.timeout(),
    )?;
    let runner = ShowRunner::new(
        feed,
        downloader,
        EpisodeParser::new(classifier),
        EpisodeSelector::default(),
        preferences.quality,
    );

    let report = run_cycle(&runner, &show_list.shows, Utc::now(), handle_progress_event);

    show_list.shows = report.shows;
    shows_file.save(&show_list)?;

    Ok(())
}

fn catalog(
    preferences_path: PathBuf,
    shows_path: PathBuf,
    version: &str,
) -> Result<(), TvShowsError> {
    let (feed, retry) = match JsonFile::<Preferences>::new(preferences_path).load_optional()? {
        Some(preferences) => (preferences.feed, preferences.retry),
        None => (FeedConfig::default(), RetryConfig::default()),
    };

    let shows_file = JsonFile::<ShowList>::new(shows_path);
    let mut show_list = shows_file.load_optional()?.unwrap_or_default();

    let entries = fetch_catalog(&feed, &retry)?;
    let added = merge_catalog(&mut show_list, entries, version);
    shows_file.save(&show_list)?;

    println!(
        "Added {} new show(s), {} known in total.",
        added,
        show_list.shows.len()
    );

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (preferences_path, shows_path) = match document_paths(&cli) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match &cli.command {
        None | Some(Command::Run) => run(preferences_path, shows_path),
        Some(Command::Catalog { version }) => catalog(preferences_path, shows_path, version),
    };

    if let Err(e) = result {
        eprintln!("\nError: {}", e);
        process::exit(1);
    }
}

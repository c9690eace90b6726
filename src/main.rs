use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use placecode::api::{Geocoder, GoogleGeocoder, NominatimGeocoder, lookup};
use placecode::batch::{BatchProgress, run_batch};
use placecode::config::{ApiKey, Backend, FileConfig, Overrides, Settings};
use placecode::demo::run_demo;
use placecode::domain::{GeocodeRecord, PlaceQuery};

/// Geocode place names with Google Maps or OpenStreetMap Nominatim
///
/// Examples:
///   # Geocode a few sample places and print the results
///   placecode
///
///   # Convert a CSV with a "place" column using Nominatim
///   placecode batch -i example_locations.csv -o geocoded_output.csv
///
///   # Same with Google (reads GOOGLE_API_KEY from the environment or .env)
///   placecode --backend google batch
///
///   # Look up a single place, or reverse geocode a "lat,lon" pair
///   placecode lookup "Kumasi, Ghana"
///   placecode lookup 37.7749,-122.4194
#[derive(Parser, Debug)]
#[command(name = "placecode")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches placecode.toml if not provided)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Geocoding backend
    #[arg(short = 'b', long, global = true)]
    backend: Option<Backend>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// User-Agent sent to Nominatim
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Geocode a small fixed list of places and print the results (default)
    Demo,

    /// Geocode every row of an input table and write an output table
    Batch {
        /// Input file with a "place" column (defaults to example_locations.csv)
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,

        /// Output file (defaults to geocoded_output.csv or geocoded_google_output.csv)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Input field delimiter: a single character, or "tab"
        #[arg(short = 'd', long)]
        delimiter: Option<String>,

        /// Minimum delay between requests in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Geocode one place name, or reverse geocode a "lat,lon" pair
    Lookup {
        #[arg(allow_hyphen_values = true)]
        query: String,
    },
}

fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();

    let (file_config, skipped) = match args.config {
        Some(ref path) => (Some(FileConfig::load_from(path)?), Vec::new()),
        None => FileConfig::load(),
    };

    let mut overrides = Overrides {
        backend: args.backend,
        timeout_secs: args.timeout_secs,
        user_agent: args.user_agent.clone(),
        verbose: args.verbose,
        ..Default::default()
    };
    if let Some(Command::Batch {
        input,
        output,
        delimiter,
        delay_ms,
    }) = &args.command
    {
        overrides.input = input.clone();
        overrides.output = output.clone();
        overrides.delimiter = delimiter.clone();
        overrides.delay_ms = *delay_ms;
    }

    let settings = Settings::resolve(overrides, file_config)?;
    init_logging(settings.verbose);

    if let Some(e) = dotenv_problem(&dotenv) {
        warn!("Failed to load .env: {e}");
    }
    for e in skipped {
        warn!("Skipping config file: {e}");
    }
    debug!(?settings, "resolved settings");

    // Credentials are checked here, before any input is read
    let geocoder = build_geocoder(&settings)?;
    let mut limiter = settings.rate_limiter();

    match args.command {
        None | Some(Command::Demo) => {
            let mut stdout = std::io::stdout().lock();
            run_demo(geocoder.as_ref(), &mut limiter, &mut stdout)?;
        }
        Some(Command::Lookup { query }) => {
            let query = PlaceQuery::parse(&query);
            match lookup(geocoder.as_ref(), &query) {
                Some(loc) => println!("{:.6},{:.6}\t{}", loc.lat, loc.lon, loc.address),
                None => println!("not found"),
            }
        }
        Some(Command::Batch { .. }) => {
            let start = Instant::now();
            let spinner = create_spinner(&format!("Geocoding {}...", settings.input.display()));
            let _logs = LogSpinnerGuard::attach(&spinner);

            let summary = run_batch(
                geocoder.as_ref(),
                &mut limiter,
                &settings.input,
                &settings.output,
                settings.delimiter,
                &mut SpinnerProgress(&spinner),
            )
            .context("Batch geocoding failed")?;

            spinner.finish_with_message(format!(
                "Geocoded {} places ({} resolved, {} failed) [{:.1}s]",
                summary.total,
                summary.resolved,
                summary.failed(),
                start.elapsed().as_secs_f32()
            ));
            println!("Wrote output to {}", settings.output.display());
        }
    }

    Ok(())
}

fn build_geocoder(settings: &Settings) -> Result<Box<dyn Geocoder>> {
    let geocoder: Box<dyn Geocoder> = match settings.backend {
        Backend::Google => {
            let key = ApiKey::from_env()?;
            Box::new(GoogleGeocoder::new(
                key,
                settings.timeout,
                settings.google_base_url.as_deref(),
            )?)
        }
        Backend::Nominatim => Box::new(NominatimGeocoder::new(
            &settings.user_agent,
            settings.timeout,
            settings.nominatim_base_url.as_deref(),
        )?),
    };
    Ok(geocoder)
}

/// A missing .env file is fine; anything else is worth reporting
fn dotenv_problem(result: &dotenvy::Result<PathBuf>) -> Option<&dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

/// Prints each row above the spinner as it is looked up
struct SpinnerProgress<'a>(&'a ProgressBar);

impl BatchProgress for SpinnerProgress<'_> {
    fn started(&mut self, _idx: usize, place: &str) {
        self.0.suspend(|| println!("Geocoding: {}", place));
    }

    fn finished(&mut self, idx: usize, record: &GeocodeRecord) {
        self.0.set_message(format!("[{}] {}", idx + 1, record.place));
    }
}

/// Spinner that log lines are drawn around, if one is running
static ACTIVE_SPINNER: Mutex<Option<ProgressBar>> = Mutex::new(None);

/// Keeps log output off the spinner line until dropped
struct LogSpinnerGuard;

impl LogSpinnerGuard {
    fn attach(spinner: &ProgressBar) -> Self {
        if let Ok(mut active) = ACTIVE_SPINNER.lock() {
            *active = Some(spinner.clone());
        }
        LogSpinnerGuard
    }
}

impl Drop for LogSpinnerGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = ACTIVE_SPINNER.lock() {
            *active = None;
        }
    }
}

/// stderr writer for tracing that suspends the active spinner while writing
struct LogWriter;

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let spinner = ACTIVE_SPINNER.lock().ok().and_then(|s| s.clone());
        match spinner {
            Some(pb) => pb.suspend(|| io::stderr().write_all(buf))?,
            None => io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("placecode={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(|| LogWriter)
        .with_target(false)
        .init();
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotenv_problem_ignores_only_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dotenvy::from_path(dir.path().join(".env"));
        assert!(missing.is_err());
        assert!(dotenv_problem(&missing.map(|_| PathBuf::new())).is_none());

        let broken = dir.path().join("broken.env");
        std::fs::write(&broken, "PLACECODE_TEST_BROKEN 'unterminated\n").unwrap();
        let loaded = dotenvy::from_path(&broken).map(|_| broken.clone());
        assert!(dotenv_problem(&loaded).is_some());

        let ok: dotenvy::Result<PathBuf> = Ok(broken);
        assert!(dotenv_problem(&ok).is_none());
    }

    #[test]
    fn test_log_writer_with_and_without_spinner() {
        let line = b"WARN geocode failed\n";
        assert_eq!(LogWriter.write(line).unwrap(), line.len());

        let spinner = ProgressBar::hidden();
        {
            let _logs = LogSpinnerGuard::attach(&spinner);
            assert!(ACTIVE_SPINNER.lock().unwrap().is_some());
            assert_eq!(LogWriter.write(line).unwrap(), line.len());
        }
        assert!(ACTIVE_SPINNER.lock().unwrap().is_none());
    }

    #[test]
    fn test_spinner_progress_tracks_rows() {
        let spinner = ProgressBar::hidden();
        let mut progress = SpinnerProgress(&spinner);

        progress.started(0, "Accra, Ghana");
        progress.finished(0, &GeocodeRecord::unresolved("Accra, Ghana"));
        assert_eq!(spinner.message(), "[1] Accra, Ghana");
    }

    #[test]
    fn test_args_batch_and_verbose() {
        let args = Args::try_parse_from([
            "placecode",
            "-v",
            "--backend",
            "google",
            "batch",
            "-i",
            "in.csv",
            "--delay-ms",
            "250",
        ])
        .unwrap();
        assert!(args.verbose);
        assert_eq!(args.backend, Some(Backend::Google));
        assert!(matches!(
            args.command,
            Some(Command::Batch { delay_ms: Some(250), .. })
        ));

        let lookup = Args::try_parse_from(["placecode", "lookup", "-33.86,151.21"]).unwrap();
        assert!(matches!(lookup.command, Some(Command::Lookup { ref query }) if query == "-33.86,151.21"));
    }
}

//! adsb1090: Mode S / ADS-B decoder CLI.
//!
//! Supports:
//! - Streaming hex frames from a file or stdin into aircraft records
//! - Decoding a single frame to JSON
//! - Querying an OpenSky registry CSV
//! - Showing and initializing the configuration file

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use adsb1090_core::config::{self, Config, OutputFormat};
use adsb1090_core::processor::{self, MessageStore, Processor};
use adsb1090_core::{
    classify, decode, AcceptAll, AircraftAddress, CrcTable, DecodeError, InMemoryRegistry,
    RawFrame, Registry, RegistryEntry, Result,
};

mod sink;
mod source;

/// Frames buffered between the reader and the decode loop.
const FRAME_CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "adsb1090", version, about = "Mode S / ADS-B decoder")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode hex frames and print aircraft records as they update
    Run {
        /// File of hex frames, one per line (stdin when omitted or `-`)
        file: Option<PathBuf>,

        /// OpenSky aircraft database CSV
        #[arg(long, env = "ADSB1090_REGISTRY")]
        registry: Option<PathBuf>,

        /// Output format: json or text
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Seconds a silent aircraft's history is kept
        #[arg(long)]
        lifetime: Option<u64>,

        /// Seconds between eviction passes
        #[arg(long)]
        cleanup: Option<u64>,
    },

    /// Classify, verify and decode one hex frame
    Decode {
        /// 14 or 28 hex characters, plain or `*hex;`
        hex: String,
    },

    /// Look up aircraft in a registry CSV
    Registry {
        /// OpenSky aircraft database CSV
        #[arg(long)]
        file: PathBuf,

        /// ICAO address (hex)
        #[arg(long, conflicts_with = "registration", required_unless_present = "registration")]
        address: Option<String>,

        /// Registration mark, case-insensitive
        #[arg(long)]
        registration: Option<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            registry,
            format,
            lifetime,
            cleanup,
        } => {
            cmd_run(RunArgs {
                file,
                registry,
                format,
                lifetime,
                cleanup,
            })
            .await
        }
        Commands::Decode { hex } => cmd_decode(&hex),
        Commands::Registry {
            file,
            address,
            registration,
        } => cmd_registry(file, address, registration),
        Commands::Config { action } => cmd_config(action),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

struct RunArgs {
    file: Option<PathBuf>,
    registry: Option<PathBuf>,
    format: Option<OutputFormat>,
    lifetime: Option<u64>,
    cleanup: Option<u64>,
}

/// Apply command-line overrides on top of the file configuration.
fn effective_config(mut config: Config, args: &RunArgs) -> Config {
    if let Some(path) = &args.registry {
        config.registry.path = Some(path.clone());
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(secs) = args.lifetime {
        config.store.lifetime_secs = secs;
        // Re-derive the interval from the new lifetime unless given explicitly
        if args.cleanup.is_none() {
            config.store.cleanup_interval_secs = 0;
        }
    }
    if let Some(secs) = args.cleanup {
        config.store.cleanup_interval_secs = secs;
    }
    config
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = effective_config(config::load_config()?, &args);
    if config.store_lifetime().is_zero() {
        return Err(DecodeError::Config("store lifetime must be positive".into()));
    }

    let registry: Arc<dyn Registry> = match &config.registry.path {
        Some(path) => {
            let registry = InMemoryRegistry::from_path(path)?;
            info!(path = %path.display(), entries = registry.len(), "registry loaded");
            Arc::new(registry)
        }
        None => {
            info!("no registry configured, accepting every address");
            Arc::new(AcceptAll)
        }
    };

    let cancel = CancellationToken::new();
    let store = Arc::new(MessageStore::new(config.store_lifetime()));
    let eviction = Arc::clone(&store).spawn_eviction(config.cleanup_interval(), cancel.clone());

    let mut decoder = Processor::new(CrcTable::mode_s(), store, registry, config.reference());
    decoder.add_sink(sink::for_format(config.output.format, std::io::stdout()));

    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let reader_cancel = cancel.clone();
    let file = frame_path(args.file);
    let from_stdin = file.is_none();
    let reader = tokio::spawn(async move {
        match file {
            Some(path) => {
                let f = tokio::fs::File::open(&path).await?;
                source::read_frames(BufReader::new(f), tx, reader_cancel).await
            }
            None => source::read_frames(BufReader::new(tokio::io::stdin()), tx, reader_cancel).await,
        }
    });

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            interrupt.cancel();
        }
    });

    info!(
        lifetime_secs = config.store_lifetime().as_secs(),
        cleanup_secs = config.cleanup_interval().as_secs(),
        format = %config.output.format,
        "decoding frames"
    );
    let stats = processor::run(&mut decoder, rx, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = eviction.await {
        warn!("eviction task failed: {e}");
    }
    match reader.await {
        Ok(Ok(frames)) => debug!(frames, "frame source finished"),
        Ok(Err(e)) => return Err(e.into()),
        Err(e) => warn!("frame reader task failed: {e}"),
    }

    eprintln!();
    eprintln!(
        "{} frames, {} decoded, {} unsupported, {} bad checksum, {} unknown aircraft",
        stats.received,
        stats.processed,
        stats.unsupported,
        stats.checksum_failures,
        stats.unknown_aircraft
    );

    if config.output.format == OutputFormat::Text {
        let aircraft = decoder.all_aircraft();
        if !aircraft.is_empty() {
            eprintln!("{}", sink::records_table(&aircraft));
        }
    }

    if from_stdin {
        // A pending stdin read runs on a blocking thread that cannot be
        // cancelled and would hold up runtime shutdown.
        let _ = std::io::Write::flush(&mut std::io::stdout());
        std::process::exit(0);
    }
    Ok(())
}

/// Frame file to read, or `None` for stdin (no path or `-`).
fn frame_path(file: Option<PathBuf>) -> Option<PathBuf> {
    file.filter(|p| p.as_os_str() != "-")
}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

fn cmd_decode(hex: &str) -> Result<()> {
    let clean = source::clean_hex_line(hex).ok_or_else(|| DecodeError::InvalidHex(hex.into()))?;
    let table = CrcTable::mode_s();

    let frame = classify(RawFrame::from_hex(&clean)?)?;
    frame.verify(&table)?;
    let address = frame.address(&table);
    let payload = decode(&frame)?;

    let out = serde_json::json!({
        "frame": clean,
        "downlinkFormat": frame.downlink_format(),
        "name": frame.name(),
        "address": address,
        "payload": payload,
    });
    let text = serde_json::to_string_pretty(&out).map_err(std::io::Error::from)?;
    println!("{text}");
    Ok(())
}

// ---------------------------------------------------------------------------
// registry
// ---------------------------------------------------------------------------

fn cmd_registry(
    file: PathBuf,
    address: Option<String>,
    registration: Option<String>,
) -> Result<()> {
    let registry = InMemoryRegistry::from_path(&file)?;

    let rows: Vec<(AircraftAddress, RegistryEntry)> = match (address, registration) {
        (Some(address), _) => {
            let address: AircraftAddress = address.parse()?;
            registry
                .lookup(address)
                .map(|e| vec![(address, e)])
                .unwrap_or_default()
        }
        (None, Some(registration)) => registry
            .search_registration(&registration)
            .into_iter()
            .map(|(a, e)| (a, e.clone()))
            .collect(),
        (None, None) => {
            return Err(DecodeError::Registry(
                "one of --address or --registration is required".into(),
            ))
        }
    };

    if rows.is_empty() {
        eprintln!("No matching aircraft in {} ({} entries)", file.display(), registry.len());
        return Ok(());
    }
    println!("{}", sink::registry_table(&rows));
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = config::load_config()?;
            eprintln!("# {}", config::config_file().display());
            print!("{}", config::to_toml(&config)?);
        }
        ConfigAction::Init { force } => {
            let path = config::config_file();
            if path.exists() && !force {
                return Err(DecodeError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            let path = config::save_config(&Config::default())?;
            eprintln!("Wrote {}", path.display());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    fn args() -> RunArgs {
        RunArgs {
            file: None,
            registry: None,
            format: None,
            lifetime: None,
            cleanup: None,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_frame_path_dash_is_stdin() {
        assert_eq!(frame_path(None), None);
        assert_eq!(frame_path(Some(PathBuf::from("-"))), None);
        assert_eq!(
            frame_path(Some(PathBuf::from("frames.txt"))),
            Some(PathBuf::from("frames.txt"))
        );
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "adsb1090", "run", "frames.txt", "--format", "json", "--lifetime", "90", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                file,
                format,
                lifetime,
                ..
            } => {
                assert_eq!(file, Some(PathBuf::from("frames.txt")));
                assert_eq!(format, Some(OutputFormat::Json));
                assert_eq!(lifetime, Some(90));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_registry_requires_query() {
        assert!(Cli::try_parse_from(["adsb1090", "registry", "--file", "a.csv"]).is_err());
        assert!(Cli::try_parse_from([
            "adsb1090", "registry", "--file", "a.csv", "--address", "4840D6", "--registration",
            "PH-BXA",
        ])
        .is_err());
        assert!(
            Cli::try_parse_from(["adsb1090", "registry", "--file", "a.csv", "--address", "4840D6"])
                .is_ok()
        );
    }

    #[test]
    fn test_effective_config_overrides() {
        let config = effective_config(
            Config::default(),
            &RunArgs {
                format: Some(OutputFormat::Json),
                lifetime: Some(90),
                ..args()
            },
        );
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.store_lifetime(), Duration::from_secs(90));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(30));

        let config = effective_config(
            Config::default(),
            &RunArgs {
                lifetime: Some(90),
                cleanup: Some(5),
                registry: Some("aircraft.csv".into()),
                ..args()
            },
        );
        assert_eq!(config.cleanup_interval(), Duration::from_secs(5));
        assert_eq!(config.registry.path, Some(PathBuf::from("aircraft.csv")));
    }

    #[test]
    fn test_effective_config_keeps_file_values() {
        let config = effective_config(Config::default(), &args());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_cmd_decode() {
        assert!(cmd_decode("8D4840D6202CC371C32CE0576098").is_ok());
        assert!(cmd_decode("*5D4CA92BF0802F;").is_ok());
        assert!(matches!(
            cmd_decode("8D40621D59C382D690C8AC2863A7"),
            Err(DecodeError::Checksum { .. })
        ));
        assert!(matches!(cmd_decode("xyz"), Err(DecodeError::InvalidHex(_))));
    }

    #[test]
    fn test_cmd_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aircraft.csv");
        std::fs::write(&path, "icao24,registration\n4840d6,PH-BXA\n").unwrap();
        assert!(cmd_registry(path.clone(), Some("4840D6".into()), None).is_ok());
        assert!(cmd_registry(path.clone(), None, Some("ph-bxa".into())).is_ok());
        assert!(matches!(
            cmd_registry(path, Some("not-hex".into()), None),
            Err(DecodeError::InvalidAddress(_))
        ));
    }
}

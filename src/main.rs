//! tracetime: convert trace timestamps, synchronize trace bundles and
//! summarize OTA payload operations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tracetime::config::render_rows;
use tracetime::{
    operated_block_statistics, operated_payload_statistics, Config, Manifest, Notifications,
    Session, TimestampConverter, TimezoneInfo, TracePosition,
};

#[derive(Debug, Parser)]
#[command(name = "tracetime")]
#[command(about = "Timestamp conversion, trace synchronization and payload statistics")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// IANA timezone for displaying real timestamps
    #[arg(long, global = true)]
    timezone: Option<String>,

    /// Explicit UTC offset in milliseconds, overrides the timezone database
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset_ms: Option<i64>,

    /// Output format: table, csv, json
    #[arg(short, long, default_value = "table", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClockArg {
    Boot,
    Monotonic,
    Real,
    Human,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Mint a timestamp from a raw clock reading or human input
    Convert {
        /// Nanosecond value, or human input with --clock human
        value: String,

        /// Clock the value was read from
        #[arg(short, long, value_enum, default_value = "human")]
        clock: ClockArg,

        /// Real-to-boot offset in nanoseconds
        #[arg(long, allow_hyphen_values = true)]
        real_to_boot: Option<i64>,

        /// Real-to-monotonic offset in nanoseconds
        #[arg(long, allow_hyphen_values = true)]
        real_to_monotonic: Option<i64>,
    },
    /// Show the entry of every trace at a given time
    Sync {
        /// Path to a JSON trace bundle
        #[arg(short, long)]
        bundle: PathBuf,

        /// Time to seek to (e.g. 1m30s, 2022-11-10T22:04:54.186, or ns)
        #[arg(short, long)]
        at: String,
    },
    /// Summarize install operations of an OTA payload manifest
    PayloadStats {
        /// Path to a JSON payload manifest
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

fn build_config(cli: &Cli) -> Result<Config> {
    let timezone = if cli.timezone.is_some() || cli.utc_offset_ms.is_some() {
        let defaults = TimezoneInfo::default();
        Some(TimezoneInfo {
            timezone: cli.timezone.clone().unwrap_or(defaults.timezone),
            locale: defaults.locale,
            utc_offset_ms: cli.utc_offset_ms,
        })
    } else {
        None
    };
    Ok(Config {
        verbosity: cli.verbose,
        timezone,
        format: cli.format.parse()?,
    })
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_convert(
    config: &Config,
    value: &str,
    clock: ClockArg,
    real_to_boot: Option<i64>,
    real_to_monotonic: Option<i64>,
) -> Result<()> {
    let mut converter = TimestampConverter::with_offsets(
        config.timezone.clone().unwrap_or_default(),
        real_to_monotonic,
        real_to_boot,
    )?;

    let parse_ns = || -> Result<i64> {
        value
            .trim()
            .parse::<i64>()
            .with_context(|| format!("Invalid nanosecond value '{value}'"))
    };
    let ts = match clock {
        ClockArg::Boot => converter.make_timestamp_from_boot_ns(parse_ns()?)?,
        ClockArg::Monotonic => converter.make_timestamp_from_monotonic_ns(parse_ns()?)?,
        ClockArg::Real => converter.make_timestamp_from_real_ns(parse_ns()?)?,
        ClockArg::Human => converter.make_timestamp_from_human(value)?,
    };
    converter.initialize_utc_offset(&ts)?;
    debug!("Minted {:?} from {:?} input", ts, clock);

    let headers = ["type", "value_ns", "formatted", "utc_offset"];
    let rows = vec![vec![
        ts.get_type().to_string(),
        ts.get_value_ns().to_string(),
        converter.format(&ts),
        converter.utc_offset().to_string(),
    ]];
    print!("{}", render_rows(config.format, &headers, &rows)?);
    Ok(())
}

fn run_sync(config: &Config, bundle: &Path, at: &str) -> Result<()> {
    let mut notifications = Notifications::new();
    let mut session = Session::load(bundle, config.timezone.clone(), &mut notifications)?;
    for notification in notifications.drain() {
        eprintln!("warning: {notification}");
    }

    let target = session.parse_time(at)?;
    let updates = session.seek(&TracePosition::from_timestamp(target))?;

    let headers = ["presenter", "trace", "index", "timestamp"];
    let mut rows = Vec::new();
    for update in &updates {
        for entry in &update.entries {
            rows.push(vec![
                update.kind.to_string(),
                entry.trace.clone(),
                entry
                    .index
                    .map_or("-".to_string(), |index| index.to_string()),
                entry
                    .timestamp
                    .map_or("-".to_string(), |ts| session.converter().format(&ts)),
            ]);
        }
    }
    print!("{}", render_rows(config.format, &headers, &rows)?);
    Ok(())
}

fn run_payload_stats(config: &Config, manifest: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest)?;
    let blocks = operated_block_statistics(&manifest.partitions)?;
    let payload = operated_payload_statistics(&manifest.partitions)?;
    debug!(
        "Aggregated {} operation types over {} partitions",
        blocks.len(),
        manifest.partitions.len()
    );

    let headers = ["operation", "blocks", "blocks_pct", "bytes", "bytes_pct"];
    let block_pct = blocks.percentages();
    let payload_pct = payload.percentages();
    let rows: Vec<Vec<String>> = blocks
        .iter()
        .zip(block_pct)
        .map(|((label, count), (_, pct))| {
            let bytes = payload.get(label).unwrap_or(0);
            let bytes_pct = payload_pct
                .iter()
                .find(|(l, _)| *l == label)
                .map_or(0, |(_, p)| *p);
            vec![
                label.to_string(),
                count.to_string(),
                pct.to_string(),
                bytes.to_string(),
                bytes_pct.to_string(),
            ]
        })
        .collect();
    print!("{}", render_rows(config.format, &headers, &rows)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_logging(&config);

    match &cli.command {
        Commands::Convert {
            value,
            clock,
            real_to_boot,
            real_to_monotonic,
        } => run_convert(&config, value, *clock, *real_to_boot, *real_to_monotonic),
        Commands::Sync { bundle, at } => run_sync(&config, bundle, at),
        Commands::PayloadStats { manifest } => run_payload_stats(&config, manifest),
    }
}

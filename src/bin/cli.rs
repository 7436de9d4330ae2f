//! Diatrend CLI
//!
//! Command-line interface for running windowed queries over a JSON file
//! of device events:
//! - Query a date range with per-type projections and stats
//! - Inspect a collection (counts, time bounds, metadata)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diatrend::{
    datetime, Config, DataSet, MetaData, Query, SortSpec, TimePrefs, TypeQuery,
};

#[derive(Parser)]
#[command(name = "diatrend")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query engine for diabetes device data")]
#[command(
    long_about = "Diatrend answers windowed queries over diabetes device events:\nfiltered, timezone-normalized records plus summary statistics for a date\nrange and its neighboring ranges."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a windowed query over an events file
    Query {
        /// Path to a JSON array of event records
        file: PathBuf,
        /// Window start (RFC 3339 or epoch milliseconds)
        #[arg(short, long)]
        start: String,
        /// Window end, exclusive (RFC 3339 or epoch milliseconds)
        #[arg(short, long)]
        end: String,
        /// Record types to project, as type[:field,field,...]
        #[arg(short, long)]
        types: Vec<String>,
        /// Sort spec for projected types, as field[,desc]
        #[arg(long)]
        sort: Option<String>,
        /// Stats to compute (comma-separated ids)
        #[arg(long)]
        stats: Option<String>,
        /// Active weekdays, 0=Sunday..6=Saturday (comma-separated)
        #[arg(long)]
        active_days: Option<String>,
        /// IANA timezone for display normalization
        #[arg(long)]
        timezone: Option<String>,
        /// Glucose display units (mg/dL or mmol/L)
        #[arg(long)]
        units: Option<String>,
        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },

    /// Summarize an events file
    Inspect {
        /// Path to a JSON array of event records
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default(),
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("diatrend={}", config.logging.level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Query {
            file,
            start,
            end,
            types,
            sort,
            stats,
            active_days,
            timezone,
            units,
            pretty,
        } => run_query(
            &config,
            QueryArgs {
                file,
                start,
                end,
                types,
                sort,
                stats,
                active_days,
                timezone,
                units,
                pretty,
            },
        ),
        Commands::Inspect { file } => run_inspect(&config, &file),
    }
}

struct QueryArgs {
    file: PathBuf,
    start: String,
    end: String,
    types: Vec<String>,
    sort: Option<String>,
    stats: Option<String>,
    active_days: Option<String>,
    timezone: Option<String>,
    units: Option<String>,
    pretty: bool,
}

fn run_query(config: &Config, args: QueryArgs) -> Result<()> {
    let data_set = load_data_set(config, &args.file)?;

    let start = parse_endpoint(&args.start)?;
    let end = parse_endpoint(&args.end)?;

    let mut query = Query::new().endpoints([start, end]);

    let sort = args.sort.as_deref().and_then(SortSpec::parse);
    for spec in &args.types {
        let mut type_query = parse_type_spec(spec)?;
        type_query.sort = sort.clone();
        query = query.with_type(type_query);
    }

    if let Some(stats) = &args.stats {
        query = query.stats_csv(stats);
    }
    if let Some(days) = &args.active_days {
        let days: Vec<u8> = days
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| d.parse().context("active day must be a number 0..=6"))
            .collect::<Result<_>>()?;
        query = query.active_days(days);
    }

    query = query.time_prefs(resolve_time_prefs(config, args.timezone.as_deref())?);

    let unit = match &args.units {
        Some(units) => diatrend::GlucoseUnit::parse(units)
            .with_context(|| format!("unknown glucose unit: {units}"))?,
        None => config.display.glucose_unit(),
    };
    query = query.bg_prefs(diatrend::BgPrefs::for_unit(unit));

    let output = data_set.query(&query)?;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(())
}

fn run_inspect(config: &Config, file: &PathBuf) -> Result<()> {
    let data_set = load_data_set(config, file)?;
    let store = data_set.store();

    let mut type_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut bounds: Option<(i64, i64)> = None;

    for event in store.events() {
        *type_counts.entry(event.event_type.tag().to_string()).or_default() += 1;
        bounds = Some(match bounds {
            Some((min, max)) => (min.min(event.time), max.max(event.time)),
            None => (event.time, event.time),
        });
    }

    let summary = serde_json::json!({
        "total": store.len(),
        "types": type_counts,
        "timeBounds": bounds.map(|(min, max)| serde_json::json!({
            "earliest": datetime::format_naive_seconds(min),
            "latest": datetime::format_naive_seconds(max),
        })),
        "metaData": MetaData::collect(store),
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn load_data_set(config: &Config, file: &PathBuf) -> Result<DataSet> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read events file {}", file.display()))?;
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(&content).context("events file must be a JSON array")?;

    let mut data_set = DataSet::with_dedup(config.engine.dedup);
    let (added, rejected) = data_set.add_raw(&raw);
    tracing::info!(added, rejected, "loaded events");

    Ok(data_set)
}

fn parse_endpoint(raw: &str) -> Result<i64> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    match datetime::parse_instant(raw) {
        Some(ms) => Ok(ms),
        None => bail!("cannot parse endpoint: {raw}"),
    }
}

/// Parse a "type" or "type:field,field" projection spec
fn parse_type_spec(spec: &str) -> Result<TypeQuery> {
    let (tag, fields) = match spec.split_once(':') {
        Some((tag, fields)) => (tag.trim(), Some(fields)),
        None => (spec.trim(), None),
    };
    if tag.is_empty() {
        bail!("empty type in spec: {spec}");
    }

    let mut type_query = TypeQuery::new(tag);
    if let Some(fields) = fields {
        type_query = type_query.select_csv(fields);
    }
    Ok(type_query)
}

fn resolve_time_prefs(config: &Config, timezone: Option<&str>) -> Result<TimePrefs> {
    match timezone {
        Some(name) => {
            let tz = name
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown timezone: {name}"))?;
            Ok(TimePrefs::aware(tz))
        }
        None => Ok(config.display.time_prefs()),
    }
}

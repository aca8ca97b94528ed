//! doorstep-warm: batch cache warmer.
//!
//! Pre-fetches registry records for a set of locations into the result
//! cache, so interactive retrievals over the same area start warm. Store
//! URLs and tuning come from the environment (see `Config::from_env`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doorstep_core::{BoundingBox, Config, JoinStrategy};
use doorstep_db::{
    FetchConfig, PgGeocodeCache, PgRegistryFetcher, PgResultCache, PgSpatialStore, StorePools,
};
use doorstep_engine::{CacheWarmer, IdSource, WarmOptions};
use doorstep_geocode::{CensusGeocoder, GeocodeResolver};

#[derive(Parser)]
#[command(name = "doorstep-warm")]
#[command(author, version, about = "Warm the record cache for a set of locations")]
struct Cli {
    /// Scope (administrative region) code to warm.
    #[arg(long)]
    scope: String,

    /// Category filter; ALL warms every category.
    #[arg(long, default_value = "ALL")]
    category: String,

    /// Re-fetch locations the cache already covers freshly.
    #[arg(long)]
    ignore_ttl: bool,

    /// Resolve the id set and report, but fetch and write nothing.
    #[arg(long)]
    dry_run: bool,

    /// Override the configured registry join strategy.
    #[arg(long)]
    strategy: Option<JoinStrategy>,

    /// Override the configured fetch chunk size.
    #[arg(long)]
    chunk_size: Option<usize>,

    #[command(subcommand)]
    source: Source,
}

#[derive(Subcommand)]
enum Source {
    /// Warm explicit location ids.
    Ids {
        /// Location ids, comma separated.
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<i64>,
    },
    /// Warm ids from a file, one per line (# comments allowed).
    File { path: PathBuf },
    /// Warm every location inside a bounding box.
    Bbox {
        #[arg(long)]
        lat_min: f64,
        #[arg(long)]
        lat_max: f64,
        #[arg(long)]
        lon_min: f64,
        #[arg(long)]
        lon_max: f64,
    },
    /// Warm every location within a radius of an address.
    Around {
        address: String,
        #[arg(long, default_value_t = 0.5)]
        radius: f64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> doorstep_core::Result<ExitCode> {
    let config = Config::from_env()?;

    let pools = StorePools::connect(&config).await?;

    let result_cache = PgResultCache::new(pools.geo.clone());
    result_cache.ensure_schema().await?;
    let geocode_cache = PgGeocodeCache::new(pools.geo.clone());
    geocode_cache.ensure_schema().await?;

    let resolver = GeocodeResolver::new(
        Arc::new(CensusGeocoder::with_config(
            config.geocoder_url.clone(),
            config.geocoder_benchmark.clone(),
            config.geocoder_timeout_secs,
        )),
        Arc::new(geocode_cache),
    );

    let fetch_config = FetchConfig::new()
        .with_strategy(cli.strategy.unwrap_or(config.join_strategy))
        .with_chunk_size(cli.chunk_size.unwrap_or(config.chunk_size))
        .with_concurrency(config.fetch_concurrency);
    let fetcher = PgRegistryFetcher::with_config(pools.registry, fetch_config);

    let warmer = CacheWarmer::new(
        resolver,
        Arc::new(PgSpatialStore::new(pools.geo)),
        Arc::new(result_cache),
        Arc::new(fetcher),
        config,
    );

    let source = match cli.source {
        Source::Ids { ids } => IdSource::Explicit(ids),
        Source::File { path } => IdSource::File(path),
        Source::Bbox {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        } => IdSource::Bbox(BoundingBox {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }),
        Source::Around { address, radius } => IdSource::Around {
            address,
            radius_miles: radius,
        },
    };

    let mut options = WarmOptions::new(&cli.scope).with_category(&cli.category);
    if cli.ignore_ttl {
        options = options.ignore_ttl();
    }
    if cli.dry_run {
        options = options.dry_run();
    }

    let report = warmer.run(&source, &options).await?;
    println!(
        "requested {} | skipped fresh {} | fetched {} | refreshed {}{}",
        report.requested,
        report.skipped_fresh,
        report.fetched,
        report.refreshed,
        if report.dry_run { " | dry run" } else { "" },
    );

    if report.requested == 0 {
        eprintln!("no location ids to warm");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

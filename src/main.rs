use anyhow::{Context, Result};
use clap::Parser;
use covid_ingest::{
    load::{MemoryTarget, PgTarget},
    pipeline::{log_summary, run_pipeline},
    settings::DbSettings,
    source::SourceManifest,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Load COVID-19 CSV exports into their PostgreSQL tables.
#[derive(Parser, Debug)]
struct Args {
    /// Source manifest (YAML)
    #[arg(long, default_value = "config/covid_19_dataset.yaml")]
    sources: PathBuf,

    /// Directory relative CSV paths are resolved against
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Load into an in-memory target instead of the database
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();

    let args = Args::parse();
    info!(sources = %args.sources.display(), dry_run = args.dry_run, "startup");

    // ─── 2) manifest ─────────────────────────────────────────────────
    let mut manifest = SourceManifest::load(&args.sources)
        .with_context(|| format!("loading manifest {}", args.sources.display()))?;
    if let Some(dir) = &args.data_dir {
        manifest = manifest.with_base_dir(dir);
    }
    info!("{} sources configured", manifest.sources.len());

    // ─── 3) run ──────────────────────────────────────────────────────
    if args.dry_run {
        let mut target = MemoryTarget::permissive();
        let reports = run_pipeline(&mut target, &manifest.sources).await;
        log_summary(&reports);
        return Ok(());
    }

    if dotenvy::dotenv().is_ok() {
        info!("loaded .env");
    }
    let settings = DbSettings::from_env().context("reading database settings")?;

    let mut target = match PgTarget::connect(&settings.connect_options()).await {
        Ok(t) => t,
        Err(e) => {
            error!(host = %settings.host, port = settings.port, "{}", e);
            std::process::exit(1);
        }
    };

    let reports = run_pipeline(&mut target, &manifest.sources).await;
    log_summary(&reports);

    target.close().await.context("closing database connection")?;
    Ok(())
}

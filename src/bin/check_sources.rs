use anyhow::{bail, Context, Result};
use clap::Parser;
use covid_ingest::{
    process::read_csv,
    source::{Mapping, SourceManifest},
};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Compare each source file's physical columns with its configured mapping.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "config/covid_19_dataset.yaml")]
    sources: PathBuf,

    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut manifest = SourceManifest::load(&args.sources)
        .with_context(|| format!("loading manifest {}", args.sources.display()))?;
    if let Some(dir) = &args.data_dir {
        manifest = manifest.with_base_dir(dir);
    }

    let mut problems = 0usize;
    for desc in &manifest.sources {
        let raw = match read_csv(&desc.file_path) {
            Ok(raw) => raw,
            Err(e) => {
                error!(table = %desc.table, "{}", e);
                problems += 1;
                continue;
            }
        };

        match desc.mapping() {
            Mapping::Positional(names) => {
                let physical = raw.width();
                if physical == names.len() {
                    info!(table = %desc.table, columns = physical, "ok");
                } else {
                    warn!(
                        table = %desc.table,
                        configured = names.len(),
                        physical,
                        headers = ?raw.headers,
                        "column count mismatch; rows would be mislabeled"
                    );
                    problems += 1;
                }
            }
            Mapping::ByHeader(pairs) => {
                let missing: Vec<&str> = pairs
                    .iter()
                    .map(|(_, h)| *h)
                    .filter(|h| !raw.headers.iter().any(|x| x.trim() == *h))
                    .collect();
                if missing.is_empty() {
                    info!(table = %desc.table, columns = pairs.len(), "ok");
                } else {
                    warn!(table = %desc.table, ?missing, "headers not found");
                    problems += 1;
                }
            }
        }
    }

    if problems > 0 {
        bail!("{} of {} sources need attention", problems, manifest.sources.len());
    }
    info!("all {} sources match their files", manifest.sources.len());
    Ok(())
}

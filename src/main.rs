use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csvetl::{
    config::{DEFAULT_CLEAN_DIR, DEFAULT_RAW_DIR},
    load::{self, default_mapping, read_mapping},
    DbConfig, LocalStorage, Loader, Normalizer,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "csvetl", about = "Normalize raw CSV files and bulk-load them into PostgreSQL")]
struct Cli {
    /// Directory holding the raw CSV files
    #[arg(long, default_value = DEFAULT_RAW_DIR)]
    raw_dir: PathBuf,

    /// Directory the clean CSV files are written to and loaded from
    #[arg(long, default_value = DEFAULT_CLEAN_DIR)]
    clean_dir: PathBuf,

    /// YAML list of `{ file, table }` entries replacing the built-in mapping
    #[arg(long)]
    mapping: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Rewrite every raw CSV into the clean directory
    Normalize,
    /// Copy the clean CSVs into their tables in one transaction
    Load,
    /// Normalize, then load
    Run,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);
    info!(
        ?command,
        raw = %cli.raw_dir.display(),
        clean = %cli.clean_dir.display(),
        "startup"
    );

    // ─── 2) normalize ────────────────────────────────────────────────
    if matches!(command, Command::Normalize | Command::Run) {
        let report = Normalizer::new(&cli.raw_dir, &cli.clean_dir, LocalStorage)
            .run()
            .context("normalizing raw CSV files")?;
        info!(files = report.files.len(), "normalized");
    }

    // ─── 3) load ─────────────────────────────────────────────────────
    if matches!(command, Command::Load | Command::Run) {
        let entries = match &cli.mapping {
            Some(path) => read_mapping(path)
                .with_context(|| format!("reading mapping {}", path.display()))?,
            None => default_mapping(),
        };
        let loader = Loader::new(entries, &cli.clean_dir, LocalStorage)?;

        dotenvy::dotenv().ok();
        let db = DbConfig::from_env().context("reading database settings")?;

        let report = load::load_into_postgres(&db, &loader)
            .await
            .context("loading clean CSV files")?;
        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "load finished"
        );
    }

    Ok(())
}

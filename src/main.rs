use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use songplay_etl::app::ports::TableSinkPort;
use songplay_etl::config::Config;
use songplay_etl::constants::DEFAULT_CONFIG_PATH;
use songplay_etl::infra::{FsSourceReader, ParquetTableWriter};
use songplay_etl::pipeline::storage::in_memory::InMemoryTableSink;
use songplay_etl::pipeline::{Pipeline, RunReport, Stage};
use songplay_etl::{logging, metrics};

#[derive(Parser)]
#[command(name = "songplay-etl")]
#[command(about = "Builds the songplay star schema from song catalog and event log JSON")]
#[command(version)]
struct Cli {
    /// TOML config file; missing file means defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Input root holding song_data/ and log_data/
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Output root for the Parquet tables
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Build every table but keep it in memory instead of writing Parquet
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild all five tables
    Run,
    /// Rebuild songs and artists from the catalog
    Songs,
    /// Rebuild songplays, users and time from the event logs
    Logs,
}

impl Commands {
    fn stage(&self) -> Stage {
        match self {
            Commands::Run => Stage::All,
            Commands::Songs => Stage::Songs,
            Commands::Logs => Stage::Logs,
        }
    }
}

/// File values, then `ETL_*` environment, then command-line flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    config.apply_env_overrides();
    if let Some(input) = &cli.input {
        config.input.root = input.clone();
    }
    if let Some(output) = &cli.output {
        config.output.root = output.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("\n📊 Run {} ({:?})", report.run_id, report.stage);
    println!(
        "   Catalog: {} files, {} rows ({} malformed)",
        report.catalog_stats.files, report.catalog_stats.rows, report.catalog_stats.malformed_rows
    );
    if let Some(stats) = &report.log_stats {
        println!(
            "   Events: {} partitions, {} rows ({} malformed), {} plays, {} unresolved",
            stats.partitions,
            stats.normalization.rows,
            stats.malformed_lines,
            stats.resolution.plays_considered,
            stats.resolution.unresolved_plays
        );
    }
    for table in &report.tables {
        println!(
            "   ✅ {:<10} {:>8} rows {:>4} files {}",
            table.table,
            table.rows,
            table.files,
            table.digest.as_deref().unwrap_or("")
        );
    }
    for failure in &report.failed_tables {
        println!("   ❌ {:<10} {}", failure.table, failure.error);
    }
    println!("   Duration: {:.2}s", report.duration_secs);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    metrics::init_metrics(config.metrics.listen_addr.as_deref());

    let stage = cli.command.stage();
    info!(
        ?stage,
        input = %config.input.root.display(),
        output = %config.output.root.display(),
        dry_run = cli.dry_run,
        "Starting songplay ETL"
    );

    let source = Arc::new(FsSourceReader::new(
        config.input.song_data_dir(),
        config.input.log_data_dir(),
    ));
    let sink: Arc<dyn TableSinkPort> = if cli.dry_run {
        Arc::new(InMemoryTableSink::new())
    } else {
        Arc::new(ParquetTableWriter::new(&config.output))
    };

    let pipeline =
        Pipeline::new(source, sink).with_pushgateway(config.metrics.pushgateway_url.clone());
    let report = pipeline
        .run(stage)
        .await
        .context("run aborted before any table was written")?;

    print_report(&report, cli.json)?;
    if let Err(e) = report.into_result() {
        error!("{}", e);
        return Err(e.into());
    }
    Ok(())
}

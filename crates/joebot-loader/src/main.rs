use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use joebot_loader::config::LoaderConfig;
use joebot_loader::importer::import_dir;
use joebot_loader::writer::JobWriter;

#[derive(Parser, Debug)]
#[command(
    name = "joebot-loader",
    about = "Import AEA JOE listing exports into the joebot jobs database"
)]
struct Cli {
    /// Path to loader configuration file
    #[arg(short, long, default_value = "config/joebot-loader.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config: LoaderConfig =
        toml::from_str(&config_str).with_context(|| "Failed to parse loader config")?;

    let mut writer = JobWriter::open(&config.store.sqlite_path)
        .with_context(|| format!("Failed to open jobs DB: {}", config.store.sqlite_path))?;

    let summary = tokio::task::spawn_blocking(move || {
        import_dir(&config.import, &mut writer)
            .with_context(|| format!("Failed to import from {}", config.import.data_dir))
    })
    .await
    .context("Import task panicked")??;

    println!(
        "Imported {} records from {} files ({} skipped)",
        summary.records, summary.files_imported, summary.files_skipped
    );
    Ok(())
}

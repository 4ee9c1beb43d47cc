use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use joebot_agents::{Orchestrator, QueryResponse};
use joebot_models::{JoebotConfig, Query, ResolutionPath};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "joebot", about = "Ask questions about AEA JOE job listings")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/joebot.toml")]
    config: String,

    /// Session identifier attached to every query
    #[arg(short, long, default_value = "cli")]
    session: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Copy charts into this directory
    #[arg(long, value_name = "DIR")]
    save_chart: Option<PathBuf>,

    /// Print each response as a JSON object
    #[arg(long)]
    json: bool,

    /// Question to answer. Reads one question per stdin line when absent.
    query: Vec<String>,
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    text: &'a str,
    path: &'a ResolutionPath,
    degraded: bool,
    tool_calls: usize,
    chart: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (respects RUST_LOG env var)
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    // API keys may live in .env
    dotenvy::dotenv().ok();

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config: JoebotConfig =
        toml::from_str(&config_str).with_context(|| "Failed to parse config")?;

    let orchestrator =
        joebot::build_orchestrator(&config).context("Failed to build orchestrator")?;

    if !cli.query.is_empty() {
        let text = cli.query.join(" ");
        return answer(&orchestrator, &cli, &text).await;
    }

    let interactive = std::io::stdin().is_terminal();
    if interactive {
        eprintln!("Ask about AEA JOE job postings. Type `help` for examples, `quit` to exit.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            eprint!("> ");
            std::io::stderr().flush().ok();
        }
        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if interactive && matches!(text, "quit" | "exit") {
            break;
        }
        answer(&orchestrator, &cli, text).await?;
    }

    Ok(())
}

async fn answer(orchestrator: &Orchestrator, cli: &Cli, text: &str) -> Result<()> {
    let response = joebot::ask(orchestrator, &Query::new(cli.session.as_str(), text)).await;
    let chart = save_chart(&response, cli.save_chart.as_ref());

    if cli.json {
        let output = ResponseOutput {
            text: &response.text,
            path: &response.path,
            degraded: response.degraded,
            tool_calls: response.tool_calls,
            chart: chart.as_ref().map(|p| p.display().to_string()),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", response.text);
        if let Some(path) = &chart {
            println!("Chart saved to {}", path.display());
        } else if response.chart.is_some() {
            eprintln!("(A chart was rendered; pass --save-chart DIR to keep it.)");
        }
        println!();
    }
    Ok(())
}

/// Copy the response's chart before the response drops and deletes it.
fn save_chart(response: &QueryResponse, dir: Option<&PathBuf>) -> Option<PathBuf> {
    let (chart, dir) = (response.chart.as_ref()?, dir?);
    match chart.persist_copy(dir) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(error = %e, dir = %dir.display(), "Failed to save chart");
            None
        }
    }
}

//! isotika CLI - extract metadata through a process-isolated Tika server
//!
//! Usage:
//!   isotika [--config <file>] [--jar <path>] [--output plain|csv] <FILES>...
//!
//! Examples:
//!   isotika doc.doc corrupt.mp3 v1.pdf
//!   isotika --jar lib/tika-server-1.5.jar --timeout 30 report.pdf
//!   ISOTIKA_LOG=isotika::worker=trace isotika --output csv scan.tif

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use isotika::logging::{self, LogConfig, LogFormat};
use isotika::{IsolatedTika, Metadata, Settings};
use tracing::Level;

#[derive(Parser)]
#[command(name = "isotika")]
#[command(about = "Extract document metadata through a process-isolated Tika server")]
#[command(version)]
struct Cli {
    /// Files to parse
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Config file (defaults to isotika.toml or ~/.config/isotika/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the Tika server jar
    #[arg(long)]
    jar: Option<String>,

    /// Runtime used to launch the jar
    #[arg(long)]
    runtime: Option<String>,

    /// Preferred worker port
    #[arg(short, long)]
    port: Option<u16>,

    /// Per-document timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Log format (pretty, compact, json)
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// `key: value` lines grouped per file
    Plain,
    /// `file,key,value` CSV rows
    Csv,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(
        LogConfig::default()
            .with_level(cli.log_level)
            .with_format(cli.log_format),
    );

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Settings::load().context("loading config")?,
    };

    if let Some(jar) = &cli.jar {
        settings.worker.artifact = Some(jar.clone());
    }
    if let Some(runtime) = &cli.runtime {
        settings.worker.runtime = runtime.clone();
    }
    if let Some(port) = cli.port {
        settings.worker.preferred_port = port;
    }
    if let Some(secs) = cli.timeout {
        settings.request.timeout_ms = secs.saturating_mul(1000);
    }
    settings.validate().context("invalid settings")?;
    Ok(settings)
}

/// Parse every file; returns whether all succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let settings = load_settings(&cli)?;
    let tika = IsolatedTika::start(settings)
        .await
        .context("starting Tika server")?;

    let mut csv_out = match cli.output {
        OutputFormat::Csv => Some(csv::Writer::from_writer(io::stdout())),
        OutputFormat::Plain => None,
    };

    let mut all_ok = true;
    for file in &cli.files {
        let mut metadata = Metadata::new();
        let ok = tika.parse_file(file, &mut metadata).await;
        all_ok &= ok;

        match csv_out.as_mut() {
            Some(writer) => {
                let name = file.to_string_lossy();
                for (key, value) in metadata.iter() {
                    writer.write_record([name.as_ref(), key, value])?;
                }
            }
            None => {
                println!("== {} ({})", file.display(), if ok { "ok" } else { "failed" });
                print!("{}", metadata);
            }
        }
    }

    if let Some(mut writer) = csv_out {
        writer.flush()?;
    }
    tika.stop().await;
    Ok(all_ok)
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use csv_deidentifier::api::start_server;
use csv_deidentifier::settings::AppConfig;
use csv_deidentifier::utils::deidentified_file_name;
use csv_deidentifier::utils::logger::init_logger;

#[derive(Parser, Debug)]
#[command(name = "deidentifier", version, about = "Mask PII in CSV files")]
struct Cli {
    /// Configuration file (defaults to ./deidentifier.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// De-identify a local CSV file
    File {
        /// CSV file to read
        input: PathBuf,

        /// Where to write the masked CSV; "-" for stdout.
        /// Defaults to deidentified_<name> next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Where to write the summary report (stderr when omitted)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(deidentified_file_name(&name))
}

fn run_file(config: &AppConfig, input: &Path, output: Option<PathBuf>, report: Option<PathBuf>) -> Result<()> {
    let deidentifier = config.build_deidentifier()?;
    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let result = deidentifier
        .deidentify_bytes(&bytes)
        .with_context(|| format!("Failed to de-identify {}", input.display()))?;

    let output = output.unwrap_or_else(|| default_output_path(input));
    if output.as_os_str() == "-" {
        std::io::stdout().write_all(result.csv.as_bytes())?;
    } else {
        fs::write(&output, &result.csv)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Wrote de-identified CSV to {}", output.display());
    }

    match report {
        Some(path) => fs::write(&path, &result.report)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => eprint!("{}", result.report),
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    // Initialize logger
    init_logger(config.logging.log_dir.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let deidentifier = config.build_deidentifier()?;
            start_server(config.server, deidentifier).await?;
        }
        Command::File {
            input,
            output,
            report,
        } => run_file(&config, &input, output, report)?,
    }

    Ok(())
}

//! Turkish bill OCR from the command line.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{analyze, extract, ocr};
use fatura_core::{telemetry, Settings};

/// Extract dates, items, amounts and totals from Turkish bills
#[derive(Parser)]
#[command(name = "fatura")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbosity: u8,

    /// Path to config file
    #[arg(short, long, global = true, env = "FATURA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run structured extraction on OCR text from a file or stdin
    Extract(extract::ExtractArgs),

    /// Run the OCR pipeline on a bill image
    Ocr(ocr::OcrArgs),

    /// Analyze a bill image with the vision model
    Analyze(analyze::AnalyzeArgs),
}

fn log_directive(verbosity: u8, configured: &str) -> String {
    match verbosity {
        0 => "warn".to_string(),
        1 => configured.to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    telemetry::init("fatura", settings.log_format, &log_directive(cli.verbosity, &settings.log_level))?;

    match cli.command {
        Commands::Extract(args) => extract::run(args, &settings).await,
        Commands::Ocr(args) => ocr::run(args, &settings).await,
        Commands::Analyze(args) => analyze::run(args, &settings).await,
    }
}

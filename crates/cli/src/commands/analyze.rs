//! Analyze command - send a bill image to the vision model.

use std::path::PathBuf;

use clap::Args;

use fatura_core::Settings;
use fatura_vision::{BillAnalyzer, VisionSummary};

use super::OutputArgs;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Bill image (jpg, png, bmp, tiff)
    pub image: PathBuf,

    /// Print a summary of what was found
    #[arg(long)]
    pub verbose: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub async fn run(args: AnalyzeArgs, settings: &Settings) -> anyhow::Result<()> {
    let analyzer = BillAnalyzer::from_settings(settings)?;
    eprintln!("Processing image: {}", args.image.display());

    let report = analyzer.analyze_file(&args.image).await?;
    args.output.emit(&report)?;

    if args.verbose {
        if let Some(summary) = VisionSummary::from_report(&report) {
            eprintln!("\n{summary}");
        }
    }
    if !report.success {
        anyhow::bail!(
            "Analysis failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

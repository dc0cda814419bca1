pub mod analyze;
pub mod extract;
pub mod ocr;

use std::fs;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

/// Where and how to print JSON results.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(short, long)]
    pub pretty: bool,
}

impl OutputArgs {
    pub fn render<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }

    /// Write to `--output` or print to stdout.
    pub fn emit<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let json = self.render(value)?;
        match &self.output {
            Some(path) => {
                fs::write(path, &json)?;
                eprintln!("Results saved to: {}", path.display());
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}

//! Extract command - structured extraction over text that is already recognized.

use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use fatura_core::Settings;
use fatura_ocr::{ExtractorOptions, StructuredExtractor};

use super::OutputArgs;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Text file to read (default: stdin)
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub async fn run(args: ExtractArgs, settings: &Settings) -> anyhow::Result<()> {
    let text = match &args.file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let extractor = StructuredExtractor::new(ExtractorOptions::from(settings.extraction));
    let result = extractor.process(&text);
    info!(items = result.item_count, total = ?result.total, "Extraction finished");

    args.output.emit(&result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extract_file_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fis.txt");
        let out = dir.path().join("out.json");
        std::fs::write(&input, "domates 2 kg 30,00 tl\n05.03.2024").unwrap();

        let args = ExtractArgs {
            file: Some(input),
            output: OutputArgs { output: Some(out.clone()), pretty: true },
        };
        run(args, &Settings::default()).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(json["dates"][0], "05.03.2024");
        assert_eq!(json["items"][0]["quantities"][0], "2 kg");
        assert_eq!(json["item_count"], 1);
    }

    #[tokio::test]
    async fn missing_input_file_fails() {
        let args = ExtractArgs {
            file: Some(PathBuf::from("/nonexistent/fis.txt")),
            output: OutputArgs { output: None, pretty: false },
        };
        assert!(run(args, &Settings::default()).await.is_err());
    }
}

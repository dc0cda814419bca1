//! OCR command - run the classical pipeline on a bill image.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use fatura_core::{Settings, UploadPolicy};
use fatura_ocr::BillPipeline;

use super::OutputArgs;

#[derive(Args, Debug)]
pub struct OcrArgs {
    /// Bill image (jpg, png, bmp, tiff)
    pub image: PathBuf,

    /// Print only the raw text of each engine
    #[arg(long)]
    pub text_only: bool,

    /// Skip grayscale/threshold preprocessing
    #[arg(long)]
    pub no_preprocess: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub async fn run(args: OcrArgs, settings: &Settings) -> anyhow::Result<()> {
    let filename = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let data = tokio::fs::read(&args.image).await?;
    UploadPolicy::from_section(&settings.upload).check(&filename, data.len())?;

    let pipeline = BillPipeline::from_settings(settings)?
        .with_preprocess(settings.ocr.preprocess && !args.no_preprocess);
    info!(image = %args.image.display(), engines = ?pipeline.engine_names(), "Running OCR");

    let text_only = args.text_only;
    let json = tokio::task::spawn_blocking(move || -> anyhow::Result<serde_json::Value> {
        if text_only {
            let text: std::collections::BTreeMap<String, String> = pipeline
                .recognize_bytes(&data)?
                .into_iter()
                .map(|o| (o.engine, o.text))
                .collect();
            return Ok(serde_json::to_value(text)?);
        }
        Ok(serde_json::to_value(pipeline.process_bytes(&data)?)?)
    })
    .await??;

    args.output.emit(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fis.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let args = OcrArgs {
            image: path,
            text_only: false,
            no_preprocess: false,
            output: OutputArgs { output: None, pretty: false },
        };
        let err = run(args, &Settings::default()).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported file format"));
    }
}

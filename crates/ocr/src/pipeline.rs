use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;

use fatura_core::Settings;

use crate::extract::{ExtractorOptions, StructuredExtractor};
use crate::preprocess::{self, ImageLimits};
use crate::recognizer::{build_engines, OcrBackend, OcrError};
use crate::types::{BillReport, EngineOutput, ExtractionResult, ProcessingInfo, RawText};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

/// Orchestrates: preprocess → every OCR engine → combine → extract → assemble.
pub struct BillPipeline {
    engines: Vec<Box<dyn OcrBackend>>,
    extractor: StructuredExtractor,
    preprocess: bool,
    limits: ImageLimits,
}

impl BillPipeline {
    pub fn new(engines: Vec<Box<dyn OcrBackend>>, extractor: StructuredExtractor) -> Self {
        Self { engines, extractor, preprocess: true, limits: ImageLimits::default() }
    }

    /// Build engines, extractor options and image limits from loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let engines = build_engines(&settings.ocr)?;
        let extractor = StructuredExtractor::new(ExtractorOptions::from(settings.extraction));
        Ok(Self::new(engines, extractor)
            .with_preprocess(settings.ocr.preprocess)
            .with_limits(ImageLimits::from(&settings.image)))
    }

    pub fn with_preprocess(mut self, enabled: bool) -> Self {
        self.preprocess = enabled;
        self
    }

    pub fn with_limits(mut self, limits: ImageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn extractor(&self) -> &StructuredExtractor {
        &self.extractor
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    /// Whether each configured engine can currently run.
    pub fn engine_availability(&self) -> BTreeMap<String, bool> {
        self.engines.iter().map(|e| (e.name().to_string(), e.is_available())).collect()
    }

    /// Run OCR and extraction over raw image bytes (JPEG / PNG / BMP / TIFF).
    pub fn process_bytes(&self, data: &[u8]) -> Result<BillReport, PipelineError> {
        let outputs = self.recognize_bytes(data)?;
        let combined = ResultAssembler::combine(&outputs);
        let extracted = self.extractor.process(&combined);

        tracing::info!(
            engines = outputs.len(),
            chars = combined.chars().count(),
            items = extracted.item_count,
            "Processed bill image"
        );

        Ok(ResultAssembler::assemble(outputs, combined, extracted, self.preprocess))
    }

    /// Raw text from each engine, in configured order. A failing engine is logged and
    /// contributes an empty string.
    pub fn recognize_bytes(&self, data: &[u8]) -> Result<Vec<EngineOutput>, PipelineError> {
        let image = if self.preprocess {
            preprocess::prepare_for_ocr_from_bytes(data, self.limits)?
        } else {
            preprocess::reencode_png(data)?
        };

        Ok(self
            .engines
            .iter()
            .map(|engine| {
                let text = match engine.recognize(&image) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(engine = engine.name(), error = %e, "OCR engine failed");
                        String::new()
                    }
                };
                EngineOutput { engine: engine.name().to_string(), text }
            })
            .collect())
    }
}

/// Packs engine text, extraction output and processing metadata into a [`BillReport`].
pub struct ResultAssembler;

impl ResultAssembler {
    /// Engine texts joined with `\n`, in engine order.
    pub fn combine(outputs: &[EngineOutput]) -> String {
        outputs.iter().map(|o| o.text.as_str()).collect::<Vec<_>>().join("\n")
    }

    pub fn assemble(
        outputs: Vec<EngineOutput>,
        combined: String,
        extracted: ExtractionResult,
        preprocessing_applied: bool,
    ) -> BillReport {
        let ocr_engines_used = outputs.iter().map(|o| o.engine.clone()).collect();
        let engines = outputs.into_iter().map(|o| (o.engine, o.text)).collect();
        BillReport {
            raw_text: RawText { engines, combined },
            extracted_data: extracted,
            processing_info: ProcessingInfo {
                timestamp: Utc::now(),
                ocr_engines_used,
                preprocessing_applied,
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

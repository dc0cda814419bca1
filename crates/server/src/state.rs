use std::sync::Arc;

use fatura_core::{Settings, UploadPolicy};
use fatura_ocr::{BillPipeline, StructuredExtractor};
use fatura_vision::{BillAnalyzer, DynBillAnalyzer, VisionError};

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<BillPipeline>,
    pub extractor: Arc<StructuredExtractor>,
    /// `None` when no vision API key is configured.
    pub analyzer: Option<Arc<DynBillAnalyzer>>,
    pub policy: UploadPolicy,
}

impl AppState {
    pub fn new(
        pipeline: BillPipeline,
        analyzer: Option<DynBillAnalyzer>,
        policy: UploadPolicy,
    ) -> Self {
        let extractor = Arc::new(pipeline.extractor().clone());
        Self {
            pipeline: Arc::new(pipeline),
            extractor,
            analyzer: analyzer.map(Arc::new),
            policy,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let pipeline = BillPipeline::from_settings(settings)?;
        let analyzer = match BillAnalyzer::from_settings(settings) {
            Ok(a) => Some(a.into_dyn()),
            Err(VisionError::MissingApiKey) => {
                tracing::warn!("OPENAI_API_KEY not set; /analyze-bill is disabled");
                None
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            engines = ?pipeline.engine_names(),
            vision = analyzer.is_some(),
            "Initialised bill processing"
        );
        Ok(Self::new(pipeline, analyzer, UploadPolicy::from_section(&settings.upload)))
    }
}

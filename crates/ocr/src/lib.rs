pub mod extract;
pub mod patterns;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use extract::{ExtractorOptions, StructuredExtractor};
pub use patterns::PatternLibrary;
pub use pipeline::{BillPipeline, PipelineError, ResultAssembler};
pub use preprocess::{prepare_for_ocr_from_bytes, ImageLimits, PreprocessError};
pub use recognizer::{build_engines, MockRecognizer, OcrBackend, OcrError, TesseractCommand};
pub use types::{
    AmountMatch, BillReport, EngineOutput, ExtractionResult, ItemLine, ProcessingInfo, RawText,
};

pub mod config;
pub mod telemetry;
pub mod upload;

pub use config::{
    ConfigError, ExtractionSection, ImageSection, KeywordMatch, LogFormat, OcrSection, ServerSection,
    Settings, TotalScope, UploadSection, VisionSection,
};
pub use upload::{UploadError, UploadPolicy};

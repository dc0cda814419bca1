//! Bill analysis through a vision-capable chat model.
//!
//! The image is downscaled and JPEG-encoded, sent alongside a JSON-schema prompt,
//! and the model's reply is parsed back into a [`VisionReport`].

pub mod analyzer;
pub mod client;
pub mod encode;
pub mod prompt;

use thiserror::Error;

pub use analyzer::{BillAnalyzer, DynBillAnalyzer, VisionReport, VisionSummary};
pub use client::{ChatCompletionsClient, MockVisionBackend, VisionBackend, VisionReply};
pub use encode::prepare_for_vision;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("OpenAI API key not configured (set OPENAI_API_KEY)")]
    MissingApiKey,
    #[error(transparent)]
    Upload(#[from] fatura_core::UploadError),
    #[error("Error processing image: {0}")]
    Image(#[from] image::ImageError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Vision API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Empty response from vision model")]
    EmptyResponse,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

use std::io::Write;
use std::process::Command;

use fatura_core::OcrSection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),
    #[error("Unknown OCR engine: '{0}'")]
    UnknownEngine(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes and return the recognized text.
pub trait OcrBackend: Send + Sync {
    /// Short engine name, used as the key for its raw text in results.
    fn name(&self) -> &str;

    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;

    fn is_available(&self) -> bool {
        true
    }
}

/// Build the engines listed in `ocr.engines`, in order.
pub fn build_engines(section: &OcrSection) -> Result<Vec<Box<dyn OcrBackend>>, OcrError> {
    section
        .engines
        .iter()
        .map(|name| -> Result<Box<dyn OcrBackend>, OcrError> {
            match name.as_str() {
                "tesseract" => Ok(Box::new(TesseractCommand::from_section(section))),
                #[cfg(feature = "tesseract")]
                "leptess" => Ok(Box::new(tesseract_backend::TesseractRecognizer::new(
                    section.data_path.clone(),
                    &section.languages,
                ))),
                #[cfg(not(feature = "tesseract"))]
                "leptess" => Err(OcrError::NotAvailable(
                    "leptess requires the `tesseract` feature".into(),
                )),
                other => Err(OcrError::UnknownEngine(other.to_string())),
            }
        })
        .collect()
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string (or error) regardless of the image.
pub struct MockRecognizer {
    name: String,
    result: Result<String, String>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { name: "mock".into(), result: Ok(text.into()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { name: "mock".into(), result: Err(message.into()) }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl OcrBackend for MockRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        self.result.clone().map_err(OcrError::Engine)
    }

    fn is_available(&self) -> bool {
        self.result.is_ok()
    }
}

// ── Tesseract via the system binary ───────────────────────────────────────────

/// Runs the `tesseract` executable on a temp copy of the image.
pub struct TesseractCommand {
    program: String,
    languages: String,
    oem: u8,
    psm: u8,
}

impl TesseractCommand {
    pub fn new(program: impl Into<String>, languages: impl Into<String>, oem: u8, psm: u8) -> Self {
        Self { program: program.into(), languages: languages.into(), oem, psm }
    }

    pub fn from_section(section: &OcrSection) -> Self {
        Self::new(&section.tesseract_cmd, &section.languages, section.oem, section.psm)
    }

    fn args(&self) -> Vec<String> {
        vec![
            "stdout".into(),
            "--oem".into(),
            self.oem.to_string(),
            "--psm".into(),
            self.psm.to_string(),
            "-l".into(),
            self.languages.clone(),
        ]
    }
}

impl OcrBackend for TesseractCommand {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        let mut file = tempfile::Builder::new().prefix("fatura-").suffix(".png").tempfile()?;
        file.write_all(image_bytes)?;
        file.flush()?;

        let output = match Command::new(&self.program).arg(file.path()).args(self.args()).output() {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::NotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.program
                )));
            }
            Err(e) => return Err(OcrError::Io(e)),
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OcrError::Engine(format!("tesseract failed: {}", stderr.trim())))
        }
    }

    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn name(&self) -> &str {
            "leptess"
        }

        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

use std::path::Path;
use thiserror::Error;

use crate::config::UploadSection;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("File must be an image")]
    NotAnImage,
    #[error("No file selected")]
    MissingFilename,
    #[error("Unsupported file format: {0}")]
    UnsupportedExtension(String),
    #[error("File too large: {:.1}MB (max: {:.1}MB)", mib(.size), mib(.max))]
    TooLarge { size: usize, max: usize },
    #[error("Empty file")]
    Empty,
}

fn mib(bytes: &usize) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

/// Accept/reject rules for bill images coming in over HTTP or from disk.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new(max_file_size: usize, allowed_extensions: Vec<String>) -> Self {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|e| {
                let e = e.to_lowercase();
                if e.starts_with('.') { e } else { format!(".{e}") }
            })
            .collect();
        Self { max_file_size, allowed_extensions }
    }

    pub fn from_section(section: &UploadSection) -> Self {
        Self::new(section.max_file_size, section.allowed_extensions.clone())
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Lowercased extension of `filename` with a leading dot, if any.
    pub fn extension_of(filename: &str) -> Option<String> {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
    }

    pub fn check_content_type(&self, content_type: Option<&str>) -> Result<(), UploadError> {
        match content_type {
            Some(ct) if ct.starts_with("image/") => Ok(()),
            _ => Err(UploadError::NotAnImage),
        }
    }

    pub fn check_filename(&self, filename: &str) -> Result<(), UploadError> {
        if filename.trim().is_empty() {
            return Err(UploadError::MissingFilename);
        }
        let ext = Self::extension_of(filename).unwrap_or_default();
        if self.allowed_extensions.iter().any(|a| *a == ext) {
            Ok(())
        } else {
            Err(UploadError::UnsupportedExtension(if ext.is_empty() {
                filename.to_string()
            } else {
                ext
            }))
        }
    }

    pub fn check_size(&self, size: usize) -> Result<(), UploadError> {
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > self.max_file_size {
            return Err(UploadError::TooLarge { size, max: self.max_file_size });
        }
        Ok(())
    }

    /// Filename + size checks together, as used for files read from disk.
    pub fn check(&self, filename: &str, size: usize) -> Result<(), UploadError> {
        self.check_filename(filename)?;
        self.check_size(size)
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_section(&UploadSection::default())
    }
}

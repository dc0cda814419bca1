use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A candidate monetary amount located in the source text, before numeric parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmountMatch {
    /// The matched substring, exactly as it appears.
    pub original: String,
    /// `original` with everything except digits, `.` and `,` removed.
    pub value: String,
    /// Character offsets `(start, end)` of `original` in the scanned text.
    pub position: (usize, usize),
}

impl AmountMatch {
    /// Numeric value with `,` read as a decimal point; `None` when it does not parse
    /// (e.g. `"1.234,56"` becomes `"1.234.56"`).
    pub fn parsed(&self) -> Option<f64> {
        self.value.replace(',', ".").parse::<f64>().ok()
    }
}

/// A bill line that mentions at least one known grocery item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemLine {
    /// Trimmed, lowercased line text.
    pub line: String,
    pub items: Vec<String>,
    pub quantities: Vec<String>,
    /// Amounts found on this line; positions are relative to `line`.
    pub amounts: Vec<AmountMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    pub dates: Vec<String>,
    pub amounts: Vec<AmountMatch>,
    pub items: Vec<ItemLine>,
    #[serde(rename = "total_calculated")]
    pub total: Option<f64>,
    pub item_count: usize,
}

/// Text produced by one OCR engine for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub engine: String,
    pub text: String,
}

/// Per-engine raw text plus the newline-joined combination fed to the extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawText {
    #[serde(flatten)]
    pub engines: BTreeMap<String, String>,
    pub combined: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingInfo {
    pub timestamp: DateTime<Utc>,
    pub ocr_engines_used: Vec<String>,
    pub preprocessing_applied: bool,
}

/// Everything the classical OCR pipeline returns for one bill image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillReport {
    pub raw_text: RawText,
    pub extracted_data: ExtractionResult,
    pub processing_info: ProcessingInfo,
}

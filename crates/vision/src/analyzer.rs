use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use fatura_core::{ImageSection, Settings, UploadPolicy};

use crate::client::{ChatCompletionsClient, VisionBackend};
use crate::encode::prepare_for_vision;
use crate::VisionError;

pub const PARSE_FAILURE: &str = "Failed to parse JSON response";

/// Outcome of one vision analysis. Failures after validation are reported here with
/// `success = false` rather than as an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisionReport {
    pub success: bool,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VisionReport {
    fn failure(filename: &str, error: impl Into<String>, raw_response: Option<String>) -> Self {
        Self {
            success: false,
            filename: filename.to_string(),
            timestamp: Utc::now(),
            model: None,
            tokens_used: None,
            extracted_data: None,
            raw_response,
            error: Some(error.into()),
        }
    }
}

/// Counts and headline values pulled from a successful report's `extracted_data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionSummary {
    pub items: usize,
    pub dates: usize,
    pub amounts: usize,
    pub total: Option<String>,
    pub currency: Option<String>,
    pub merchant: Option<String>,
}

impl VisionSummary {
    /// `None` for failed reports.
    pub fn from_report(report: &VisionReport) -> Option<Self> {
        if !report.success {
            return None;
        }
        let data = report.extracted_data.as_ref()?;
        let len = |key: &str| data.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        let totals = data.get("totals");
        Some(Self {
            items: len("items"),
            dates: len("dates"),
            amounts: len("amounts"),
            total: totals.and_then(|t| t.get("total")).and_then(scalar_text),
            currency: totals.and_then(|t| t.get("currency")).and_then(scalar_text),
            merchant: data.get("merchant_info").and_then(|m| m.get("name")).and_then(scalar_text),
        })
    }
}

impl fmt::Display for VisionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "- Items found: {}", self.items)?;
        writeln!(f, "- Dates found: {}", self.dates)?;
        write!(f, "- Amounts found: {}", self.amounts)?;
        if let Some(total) = &self.total {
            write!(f, "\n- Total amount: {} {}", total, self.currency.as_deref().unwrap_or(""))?;
        }
        if let Some(merchant) = &self.merchant {
            write!(f, "\n- Merchant: {merchant}")?;
        }
        Ok(())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Drop surrounding whitespace and a Markdown code fence, if the model added one.
pub fn strip_code_fences(reply: &str) -> &str {
    let s = reply.trim();
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

/// Parse a cleaned reply; if it has prose around the object, fall back to the outermost
/// `{...}` span.
fn parse_reply(cleaned: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(cleaned) {
        return Some(v);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

/// Analyzer over a boxed backend, for holders that pick the backend at runtime.
pub type DynBillAnalyzer = BillAnalyzer<Box<dyn VisionBackend>>;

/// Validates bill images and runs them through a [`VisionBackend`].
pub struct BillAnalyzer<B = ChatCompletionsClient> {
    backend: B,
    policy: UploadPolicy,
    image: ImageSection,
}

impl BillAnalyzer<ChatCompletionsClient> {
    /// Fails with [`VisionError::MissingApiKey`] when no key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, VisionError> {
        let backend = ChatCompletionsClient::from_section(&settings.vision)?;
        Ok(Self::new(backend, UploadPolicy::from_section(&settings.upload), settings.image.clone()))
    }
}

impl<B: VisionBackend> BillAnalyzer<B> {
    pub fn new(backend: B, policy: UploadPolicy, image: ImageSection) -> Self {
        Self { backend, policy, image }
    }

    pub fn into_dyn(self) -> DynBillAnalyzer
    where
        B: 'static,
    {
        let backend: Box<dyn VisionBackend> = Box::new(self.backend);
        BillAnalyzer { backend, policy: self.policy, image: self.image }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Read and analyze an image on disk. Missing files and rejected uploads are `Err`.
    pub async fn analyze_file(&self, path: &Path) -> Result<VisionReport, VisionError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size = tokio::fs::metadata(path).await?.len() as usize;
        self.policy.check(&filename, size)?;
        let data = tokio::fs::read(path).await?;
        self.analyze_bytes(&filename, &data).await
    }

    /// Validate `filename`/size, then analyze. Encoding, API and parse failures come
    /// back as a report with `success = false`.
    pub async fn analyze_bytes(
        &self,
        filename: &str,
        data: &[u8],
    ) -> Result<VisionReport, VisionError> {
        self.policy.check(filename, data.len())?;
        info!(filename, model = self.backend.model(), "Analyzing bill image");

        let report = match self.run(filename, data).await {
            Ok(report) => report,
            Err(e) => {
                warn!(filename, error = %e, "Vision analysis failed");
                VisionReport::failure(filename, e.to_string(), None)
            }
        };
        Ok(report)
    }

    async fn run(&self, filename: &str, data: &[u8]) -> Result<VisionReport, VisionError> {
        let owned = data.to_vec();
        let section = self.image.clone();
        let encoded =
            tokio::task::spawn_blocking(move || prepare_for_vision(&owned, &section)).await??;

        let reply = self.backend.complete(&encoded).await?;
        let cleaned = strip_code_fences(&reply.content).to_string();

        let Some(extracted) = parse_reply(&cleaned) else {
            warn!(filename, "Vision model reply is not valid JSON");
            return Ok(VisionReport::failure(filename, PARSE_FAILURE, Some(cleaned)));
        };

        Ok(VisionReport {
            success: true,
            filename: filename.to_string(),
            timestamp: Utc::now(),
            model: Some(self.backend.model().to_string()),
            tokens_used: reply.tokens_used,
            extracted_data: Some(extracted),
            raw_response: Some(cleaned),
            error: None,
        })
    }
}

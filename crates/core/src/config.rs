use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the config file when no explicit path is given.
pub const CONFIG_ENV: &str = "FATURA_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },
}

/// Which amount population `total_calculated` is summed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalScope {
    /// Every amount found anywhere in the text, overlapping pattern hits included.
    #[default]
    FullText,
    /// Only amounts found on recognised item lines.
    ItemLines,
}

/// How item keywords are tested against a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMatch {
    /// Keyword may appear anywhere, including inside longer words ("et" in "paket").
    #[default]
    Substring,
    WholeWord,
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Bunyan-style JSON lines.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" | "bunyan" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format: '{other}'")),
        }
    }
}

impl std::str::FromStr for TotalScope {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_text" => Ok(TotalScope::FullText),
            "item_lines" => Ok(TotalScope::ItemLines),
            other => Err(format!("Unknown total scope: '{other}'")),
        }
    }
}

impl std::str::FromStr for KeywordMatch {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "substring" => Ok(KeywordMatch::Substring),
            "whole_word" => Ok(KeywordMatch::WholeWord),
            other => Err(format!("Unknown keyword match mode: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".into(),
                "http://127.0.0.1:3000".into(),
                "http://localhost:8000".into(),
                "http://127.0.0.1:8000".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    /// Maximum accepted image size in bytes.
    pub max_file_size: usize,
    /// Lowercase extensions including the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: [".jpg", ".jpeg", ".png", ".bmp", ".tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    /// Engine names in the order their output is combined.
    pub engines: Vec<String>,
    pub tesseract_cmd: String,
    /// Tesseract language spec, e.g. `tur+eng`.
    pub languages: String,
    pub oem: u8,
    pub psm: u8,
    /// Grayscale + contrast stretch + binarisation before recognition.
    pub preprocess: bool,
    /// Tessdata directory for the in-process backend.
    pub data_path: Option<String>,
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            engines: vec!["tesseract".into()],
            tesseract_cmd: "tesseract".into(),
            languages: "tur+eng".into(),
            oem: 3,
            psm: 6,
            preprocess: true,
            data_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    pub total_scope: TotalScope,
    pub keyword_match: KeywordMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSection {
    pub max_width: u32,
    pub max_height: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self { max_width: 2048, max_height: 2048, jpeg_quality: 85 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSection {
    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for VisionSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_secs: 120,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub log_format: LogFormat,
    pub server: ServerSection,
    pub upload: UploadSection,
    pub ocr: OcrSection,
    pub extraction: ExtractionSection,
    pub image: ImageSection,
    pub vision: VisionSection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: LogFormat::default(),
            server: ServerSection::default(),
            upload: UploadSection::default(),
            ocr: OcrSection::default(),
            extraction: ExtractionSection::default(),
            image: ImageSection::default(),
            vision: VisionSection::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from `path` (or `$FATURA_CONFIG`), then apply environment overrides.
    /// With neither set, defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.map(Path::to_path_buf);
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);

        let mut settings = match explicit.or(from_env) {
            Some(p) => {
                let content = std::fs::read_to_string(&p)
                    .map_err(|source| ConfigError::Read { path: p.clone(), source })?;
                tracing::debug!(path = %p.display(), "Loaded config file");
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Override fields from environment-style lookups. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PORT") {
            self.server.port = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "PORT", value: v.clone() })?;
        }
        if let Some(v) = get("TESSERACT_CMD") {
            self.ocr.tesseract_cmd = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.log_format = v
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "LOG_FORMAT", value: v.clone() })?;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.vision.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.vision.model = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.vision.base_url = v;
        }
        if let Some(v) = get("FATURA_TOTAL_SCOPE") {
            self.extraction.total_scope = v
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "FATURA_TOTAL_SCOPE", value: v.clone() })?;
        }
        if let Some(v) = get("FATURA_KEYWORD_MATCH") {
            self.extraction.keyword_match = v
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "FATURA_KEYWORD_MATCH", value: v.clone() })?;
        }
        Ok(())
    }

    pub fn vision_configured(&self) -> bool {
        self.vision.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

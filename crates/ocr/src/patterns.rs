//! The rule set used to pull dates, amounts and grocery lines out of Turkish bill text.
//!
//! Every pattern is compiled once; a [`PatternLibrary`] is immutable after construction
//! and is shared between extractors through an `Arc`.

use regex::Regex;
use std::sync::{Arc, OnceLock};

use fatura_core::KeywordMatch;

/// Identifier of the built-in Turkish rule set. Bump when any table below changes.
pub const VERSION: &str = "tr-1";

pub const TURKISH_MONTHS: [&str; 12] = [
    "ocak", "şubat", "mart", "nisan", "mayıs", "haziran",
    "temmuz", "ağustos", "eylül", "ekim", "kasım", "aralık",
];

pub const ITEM_KEYWORDS: [&str; 30] = [
    "süt", "ekmek", "peynir", "domates", "patates", "soğan", "elma", "muz",
    "tavuk", "et", "balık", "yumurta", "yoğurt", "tereyağı", "zeytinyağı",
    "pirinç", "makarna", "fasulye", "mercimek", "bulgur", "şeker", "tuz",
    "çay", "kahve", "su", "meyve", "sebze", "karnabahar", "havuç", "biber",
];

pub const QUANTITY_UNITS: [&str; 6] = ["kg", "gr", "lt", "adet", "paket", "kutu"];

/// Amount forms in priority order: fraction + currency, currency only, fraction only.
const AMOUNT_PATTERNS: [&str; 3] = [
    r"(?i)\d+[.,]\d{2}\s*(?:tl|₺)",
    r"(?i)\d+\s*(?:tl|₺)",
    r"(?i)\d+[.,]\d{2}",
];

const NUMERIC_DATE_PATTERN: &str = r"(?i)\d{1,2}[./]\d{1,2}[./]\d{2,4}";

/// Every Turkish i-variant. `(?i)` alone never pairs `I` with `ı` or `İ` with `i`.
const ANY_I: &str = "[ıIiİ]";

/// Month-name alternation where each `i` or `ı` also matches its upper, lower and
/// dotless/dotted forms, so "MAYIS", "NİSAN" and "mayis" all match.
fn month_alternation(months: &[&str]) -> String {
    months
        .iter()
        .map(|month| {
            month
                .chars()
                .map(|c| match c {
                    'i' | 'ı' => ANY_I.to_string(),
                    c => regex::escape(&c.to_string()),
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// An item keyword with its whole-word matcher precompiled.
#[derive(Debug, Clone)]
pub struct ItemKeyword {
    keyword: String,
    whole_word: Regex,
}

impl ItemKeyword {
    fn new(keyword: &str) -> Result<Self, regex::Error> {
        let keyword = keyword.to_lowercase();
        let whole_word = Regex::new(&format!(r"\b{}\b", regex::escape(&keyword)))?;
        Ok(Self { keyword, whole_word })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// `line` is expected to be lowercased already.
    pub fn matches(&self, line: &str, mode: KeywordMatch) -> bool {
        match mode {
            KeywordMatch::Substring => line.contains(self.keyword.as_str()),
            KeywordMatch::WholeWord => self.whole_word.is_match(line),
        }
    }
}

/// A unit keyword compiled into `<digits>[.,]?<digits>*\s*<unit>`.
#[derive(Debug, Clone)]
pub struct QuantityPattern {
    unit: String,
    regex: Regex,
}

impl QuantityPattern {
    fn new(unit: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(r"(?i)\d+[.,]?\d*\s*{}", regex::escape(unit)))?;
        Ok(Self { unit: unit.to_string(), regex })
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

#[derive(Debug, Clone)]
pub struct PatternLibrary {
    version: String,
    date_patterns: Vec<Regex>,
    amount_patterns: Vec<Regex>,
    item_keywords: Vec<ItemKeyword>,
    quantity_patterns: Vec<QuantityPattern>,
}

impl PatternLibrary {
    /// Build a library from raw tables. Date and amount patterns are used verbatim
    /// (include `(?i)` for case-insensitive matching); keywords and units are escaped.
    pub fn new(
        version: &str,
        date_patterns: &[&str],
        amount_patterns: &[&str],
        item_keywords: &[&str],
        quantity_units: &[&str],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            version: version.to_string(),
            date_patterns: date_patterns.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?,
            amount_patterns: amount_patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<_, _>>()?,
            item_keywords: item_keywords
                .iter()
                .map(|k| ItemKeyword::new(k))
                .collect::<Result<_, _>>()?,
            quantity_patterns: quantity_units
                .iter()
                .map(|u| QuantityPattern::new(u))
                .collect::<Result<_, _>>()?,
        })
    }

    /// The built-in Turkish grocery rule set.
    pub fn turkish() -> Self {
        let month_date = format!(
            r"(?i)\d{{1,2}}\s*(?:{})\s*\d{{2,4}}",
            month_alternation(&TURKISH_MONTHS)
        );
        Self::new(
            VERSION,
            &[NUMERIC_DATE_PATTERN, month_date.as_str()],
            &AMOUNT_PATTERNS,
            &ITEM_KEYWORDS,
            &QUANTITY_UNITS,
        )
        .expect("invalid built-in pattern")
    }

    /// Process-wide copy of [`PatternLibrary::turkish`], compiled on first use.
    pub fn shared() -> Arc<PatternLibrary> {
        static LIB: OnceLock<Arc<PatternLibrary>> = OnceLock::new();
        LIB.get_or_init(|| Arc::new(Self::turkish())).clone()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn date_patterns(&self) -> &[Regex] {
        &self.date_patterns
    }

    pub fn amount_patterns(&self) -> &[Regex] {
        &self.amount_patterns
    }

    pub fn item_keywords(&self) -> &[ItemKeyword] {
        &self.item_keywords
    }

    pub fn quantity_patterns(&self) -> &[QuantityPattern] {
        &self.quantity_patterns
    }
}

use std::sync::{Arc, OnceLock};

use regex::Regex;

use fatura_core::{ExtractionSection, KeywordMatch, TotalScope};

use crate::patterns::PatternLibrary;
use crate::types::{AmountMatch, ExtractionResult, ItemLine};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_non_numeric, r"[^\d.,]");

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractorOptions {
    pub total_scope: TotalScope,
    pub keyword_match: KeywordMatch,
}

impl From<ExtractionSection> for ExtractorOptions {
    fn from(section: ExtractionSection) -> Self {
        Self { total_scope: section.total_scope, keyword_match: section.keyword_match }
    }
}

// ── Public extraction API ─────────────────────────────────────────────────────

/// Turns raw OCR text into dates, amounts, item lines and a total.
///
/// Holds no per-call state, so one instance can serve any number of threads.
#[derive(Debug, Clone)]
pub struct StructuredExtractor {
    patterns: Arc<PatternLibrary>,
    options: ExtractorOptions,
}

impl Default for StructuredExtractor {
    fn default() -> Self {
        Self::new(ExtractorOptions::default())
    }
}

impl StructuredExtractor {
    /// Extractor over the built-in Turkish rule set.
    pub fn new(options: ExtractorOptions) -> Self {
        Self::with_library(PatternLibrary::shared(), options)
    }

    pub fn with_library(patterns: Arc<PatternLibrary>, options: ExtractorOptions) -> Self {
        Self { patterns, options }
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    pub fn options(&self) -> ExtractorOptions {
        self.options
    }

    /// Run every extraction over `text`.
    ///
    /// `total` is computed from the full-text amount list by default, which counts a
    /// token once per amount pattern it matches. It is therefore not expected to agree
    /// with the amounts listed under `items`.
    pub fn process(&self, text: &str) -> ExtractionResult {
        let dates = self.extract_dates(text);
        let amounts = self.extract_amounts(text);
        let items = self.extract_items(text);

        let total = match self.options.total_scope {
            TotalScope::FullText => Self::calculate_total(&amounts),
            TotalScope::ItemLines => {
                let scoped: Vec<AmountMatch> =
                    items.iter().flat_map(|i| i.amounts.iter().cloned()).collect();
                Self::calculate_total(&scoped)
            }
        };

        tracing::debug!(
            dates = dates.len(),
            amounts = amounts.len(),
            items = items.len(),
            ?total,
            "Extracted bill fields"
        );

        let item_count = items.len();
        ExtractionResult { dates, amounts, items, total, item_count }
    }

    // ── Dates ────────────────────────────────────────────────────────────────

    /// Raw date strings, grouped by pattern then in order of appearance.
    pub fn extract_dates(&self, text: &str) -> Vec<String> {
        self.patterns
            .date_patterns()
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| m.as_str().to_string()))
            .collect()
    }

    // ── Amounts ───────────────────────────────────────────────────────────────

    /// Every amount-pattern hit, grouped by pattern. Hits from different patterns may
    /// cover the same characters; all of them are kept.
    pub fn extract_amounts(&self, text: &str) -> Vec<AmountMatch> {
        let mut amounts = Vec::new();
        for re in self.patterns.amount_patterns() {
            let mut offsets = CharOffsets::new(text);
            for m in re.find_iter(text) {
                let value = re_non_numeric().replace_all(m.as_str(), "").into_owned();
                if value.is_empty() {
                    continue;
                }
                let start = offsets.char_index(m.start());
                let end = offsets.char_index(m.end());
                amounts.push(AmountMatch {
                    original: m.as_str().to_string(),
                    value,
                    position: (start, end),
                });
            }
        }
        amounts
    }

    // ── Items ─────────────────────────────────────────────────────────────────

    /// Lines mentioning at least one item keyword, with their quantities and amounts.
    pub fn extract_items(&self, text: &str) -> Vec<ItemLine> {
        let mode = self.options.keyword_match;
        let mut items = Vec::new();

        for raw in text.split('\n') {
            let line = raw.trim().to_lowercase();
            if line.is_empty() {
                continue;
            }

            let found: Vec<String> = self
                .patterns
                .item_keywords()
                .iter()
                .filter(|k| k.matches(&line, mode))
                .map(|k| k.keyword().to_string())
                .collect();
            if found.is_empty() {
                continue;
            }

            let quantities = self
                .patterns
                .quantity_patterns()
                .iter()
                .flat_map(|q| q.regex().find_iter(&line).map(|m| m.as_str().to_string()))
                .collect();
            let amounts = self.extract_amounts(&line);

            items.push(ItemLine { line, items: found, quantities, amounts });
        }

        items
    }

    // ── Total ─────────────────────────────────────────────────────────────────

    /// Sum of every amount whose value parses; `None` unless the sum is positive.
    pub fn calculate_total(amounts: &[AmountMatch]) -> Option<f64> {
        let total: f64 = amounts.iter().filter_map(AmountMatch::parsed).sum();
        (total > 0.0).then_some(total)
    }
}

// ── Offset helpers ────────────────────────────────────────────────────────────

/// Converts ascending byte offsets into character offsets in a single pass.
struct CharOffsets<'t> {
    text: &'t str,
    byte: usize,
    chars: usize,
}

impl<'t> CharOffsets<'t> {
    fn new(text: &'t str) -> Self {
        Self { text, byte: 0, chars: 0 }
    }

    fn char_index(&mut self, byte: usize) -> usize {
        if byte < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> StructuredExtractor {
        StructuredExtractor::default()
    }

    fn values(amounts: &[AmountMatch]) -> Vec<&str> {
        amounts.iter().map(|a| a.value.as_str()).collect()
    }

    fn amount(value: &str) -> AmountMatch {
        AmountMatch { original: value.into(), value: value.into(), position: (0, 0) }
    }

    // ── Dates ────────────────────────────────────────────────────────────────

    #[test]
    fn numeric_date_without_invoice_number() {
        let dates = extractor().extract_dates("12.05.2024 fatura no: 123");
        assert_eq!(dates, vec!["12.05.2024"]);
    }

    #[test]
    fn month_name_date_returns_full_match() {
        let dates = extractor().extract_dates("Tarih: 3 Mart 2024\nKasa 1");
        assert_eq!(dates, vec!["3 Mart 2024"]);
    }

    #[test]
    fn uppercase_month_names_with_dotless_i() {
        let e = extractor();
        assert_eq!(e.extract_dates("TARİH: 5 MAYIS 2024"), vec!["5 MAYIS 2024"]);
        assert_eq!(e.extract_dates("12 NİSAN 2024 SAAT 14:02"), vec!["12 NİSAN 2024"]);
        assert_eq!(e.extract_dates("1 ARALIK 2023\nFIS NO 42"), vec!["1 ARALIK 2023"]);
    }

    #[test]
    fn dates_are_grouped_by_pattern() {
        let text = "5 Ocak 2024 ve 06/01/24 ve 7.1.2024";
        let dates = extractor().extract_dates(text);
        assert_eq!(dates, vec!["06/01/24", "7.1.2024", "5 Ocak 2024"]);
    }

    #[test]
    fn duplicate_dates_are_kept() {
        let dates = extractor().extract_dates("01.02.2024\n01.02.2024");
        assert_eq!(dates, vec!["01.02.2024", "01.02.2024"]);
    }

    // ── Amounts ───────────────────────────────────────────────────────────────

    #[test]
    fn overlapping_amount_patterns_are_all_reported() {
        let amounts = extractor().extract_amounts("12,50 tl");
        let originals: Vec<_> = amounts.iter().map(|a| a.original.as_str()).collect();
        assert_eq!(originals, vec!["12,50 tl", "50 tl", "12,50"]);
        assert_eq!(values(&amounts), vec!["12,50", "50", "12,50"]);
        assert_eq!(amounts[0].position, (0, 8));
        assert_eq!(amounts[1].position, (3, 8));
        assert_eq!(amounts[2].position, (0, 5));
    }

    #[test]
    fn overlapping_hits_inflate_the_full_text_total() {
        // One printed price, three pattern hits: 12.50 + 50 + 12.50.
        let result = extractor().process("12,50 tl");
        assert_eq!(result.amounts.len(), 3);
        assert_eq!(result.total, Some(75.0));
    }

    #[test]
    fn amount_positions_are_character_offsets() {
        let amounts = extractor().extract_amounts("şeker 9,90₺");
        assert_eq!(amounts[0].original, "9,90₺");
        assert_eq!(amounts[0].position, (6, 11));
        assert_eq!(amounts[0].value, "9,90");
    }

    #[test]
    fn currency_marker_is_case_insensitive() {
        let amounts = extractor().extract_amounts("TOPLAM 45 TL");
        assert_eq!(values(&amounts), vec!["45"]);
        assert_eq!(amounts[0].original, "45 TL");
    }

    #[test]
    fn no_amounts_in_plain_text() {
        assert!(extractor().extract_amounts("teşekkür ederiz").is_empty());
    }

    // ── Items ─────────────────────────────────────────────────────────────────

    #[test]
    fn item_line_with_quantity_and_amount() {
        let items = extractor().extract_items("2 kg domates 15,00 tl\nhello world");
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.line, "2 kg domates 15,00 tl");
        assert_eq!(item.items, vec!["domates"]);
        assert_eq!(item.quantities, vec!["2 kg"]);
        assert!(item.amounts.iter().any(|a| a.value == "15,00"));
        // "00 tl" is also picked up by the currency-only pattern.
        assert_eq!(values(&item.amounts), vec!["15,00", "00", "15,00"]);
    }

    #[test]
    fn item_lines_are_trimmed_and_lowercased() {
        let items = extractor().extract_items("   EKMEK 1 ADET 7,50 TL   \n");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line, "ekmek 1 adet 7,50 tl");
        assert_eq!(items[0].quantities, vec!["1 adet"]);
        assert_eq!(items[0].amounts[0].position, (13, 20));
    }

    #[test]
    fn every_keyword_on_a_line_is_listed_in_table_order() {
        let items = extractor().extract_items("domates peynir süt");
        assert_eq!(items[0].items, vec!["süt", "peynir", "domates"]);
    }

    #[test]
    fn substring_mode_matches_inside_longer_words() {
        // "et" inside "paket", "su" inside "sucuk".
        let items = extractor().extract_items("1 paket sucuk");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].items, vec!["et", "su"]);
    }

    #[test]
    fn whole_word_mode_ignores_embedded_keywords() {
        let ex = StructuredExtractor::new(ExtractorOptions {
            keyword_match: KeywordMatch::WholeWord,
            ..Default::default()
        });
        assert!(ex.extract_items("1 paket sucuk").is_empty());
        assert_eq!(ex.extract_items("1 kg et")[0].items, vec!["et"]);
    }

    #[test]
    fn quantities_follow_unit_order() {
        let items = extractor().extract_items("süt 1 lt 2 kg");
        assert_eq!(items[0].quantities, vec!["2 kg", "1 lt"]);
    }

    #[test]
    fn lines_without_keywords_are_dropped() {
        assert!(extractor().extract_items("KASA 3\nFIS NO 42\n\n").is_empty());
    }

    // ── Total ─────────────────────────────────────────────────────────────────

    #[test]
    fn total_of_nothing_is_absent() {
        assert_eq!(StructuredExtractor::calculate_total(&[]), None);
        assert_eq!(StructuredExtractor::calculate_total(&[amount("0")]), None);
    }

    #[test]
    fn total_reads_comma_and_dot_decimals() {
        let total = StructuredExtractor::calculate_total(&[amount("10,50"), amount("5.25")]);
        assert_eq!(total, Some(15.75));
    }

    #[test]
    fn unparsable_values_are_skipped() {
        let total = StructuredExtractor::calculate_total(&[amount("1.234,56"), amount("3,00")]);
        assert_eq!(total, Some(3.0));
    }

    #[test]
    fn item_line_scope_only_counts_item_amounts() {
        let text = "süt 1 lt 20,50\nfiş no 1234,25";
        let full = extractor().process(text);
        assert_eq!(full.total, Some(1254.75));

        let scoped = StructuredExtractor::new(ExtractorOptions {
            total_scope: TotalScope::ItemLines,
            ..Default::default()
        })
        .process(text);
        assert_eq!(scoped.total, Some(20.5));
        assert_eq!(scoped.amounts, full.amounts);
    }

    // ── Process ──────────────────────────────────────────────────────────────

    #[test]
    fn process_empty_text() {
        let r = extractor().process("");
        assert_eq!(r, ExtractionResult::default());
    }

    #[test]
    fn process_full_bill() {
        let text = "MİGROS\n12.05.2024 14:32\nSÜT 1 LT 24,50 TL\nEKMEK 2 ADET 10,00 TL\nTOPLAM 34,50 TL";
        let r = extractor().process(text);
        assert_eq!(r.dates, vec!["12.05.2024"]);
        assert_eq!(r.item_count, 2);
        assert_eq!(r.items.len(), r.item_count);
        assert_eq!(r.items[0].items, vec!["süt"]);
        // "adet" contains "et".
        assert_eq!(r.items[1].items, vec!["ekmek", "et"]);
        assert!(r.total.is_some());
    }

    #[test]
    fn process_is_deterministic() {
        let text = "domates 2 kg 30,00 tl\n5 Nisan 2024\nçay 1 paket 45 tl";
        assert_eq!(extractor().process(text), extractor().process(text));
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let _ = extractor().process("!@#$%^&*()\n\0\x01\x02₺₺,.,. tl 9");
        let _ = extractor().process("\u{0130}\u{0307}ÇĞÖŞÜ 1,\n,1 tl");
    }
}

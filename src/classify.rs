use crate::config::ExtractOptions;
use crate::models::{CleanedPage, Decision, PageRecord};
use crate::rules::{alternation_regex, CleanerRules};
use regex::Regex;

/// Decides whether a page is kept. The first matching rule wins:
/// namespace, redirect, empty text, disambiguation.
pub struct PageClassifier {
    redirect: Option<Regex>,
    disambiguation_title: Option<Regex>,
    disambiguation_template: Option<Regex>,
}

impl PageClassifier {
    pub fn new(rules: &CleanerRules) -> Result<Self, regex::Error> {
        Ok(Self {
            redirect: alternation_regex(r"(?i)^\s*(?:{})", &rules.redirect_markers)?,
            disambiguation_title: alternation_regex(
                r"(?i)\(\s*(?:{})\s*\)\s*$",
                &rules.disambiguation_title_words,
            )?,
            disambiguation_template: alternation_regex(
                r"(?i)\{\{\s*(?:{})\b",
                &rules.disambiguation_templates,
            )?,
        })
    }

    /// Checks that only need the raw page. `None` means cleaning is required
    /// before a decision can be made.
    pub fn pre_check(&self, record: &PageRecord, options: &ExtractOptions) -> Option<Decision> {
        if record.ns != 0 && !options.include_non_main {
            return Some(Decision::SkipNamespace);
        }
        if options.skip_redirects && self.is_redirect(&record.raw_text) {
            return Some(Decision::SkipRedirect);
        }
        None
    }

    pub fn classify(&self, record: &PageRecord, cleaned: &CleanedPage, options: &ExtractOptions) -> Decision {
        if let Some(decision) = self.pre_check(record, options) {
            return decision;
        }
        if cleaned.is_blank() {
            return Decision::SkipEmpty;
        }
        if !options.include_disambiguation && self.is_disambiguation(record) {
            return Decision::SkipDisambiguation;
        }
        Decision::Keep
    }

    pub fn is_redirect(&self, raw_text: &str) -> bool {
        self.redirect.as_ref().is_some_and(|re| re.is_match(raw_text))
    }

    pub fn is_disambiguation(&self, record: &PageRecord) -> bool {
        self.disambiguation_title
            .as_ref()
            .is_some_and(|re| re.is_match(&record.title))
            || self
                .disambiguation_template
                .as_ref()
                .is_some_and(|re| re.is_match(&record.raw_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PageClassifier {
        PageClassifier::new(&CleanerRules::default()).unwrap()
    }

    fn record(title: &str, ns: i32, raw_text: &str) -> PageRecord {
        PageRecord {
            title: title.into(),
            page_id: "1".into(),
            ns,
            raw_text: raw_text.into(),
        }
    }

    fn text(s: &str) -> CleanedPage {
        CleanedPage::from_sections(vec![s.to_string()])
    }

    fn decide(rec: &PageRecord, cleaned: &CleanedPage) -> Decision {
        classifier().classify(rec, cleaned, &ExtractOptions::default())
    }

    #[test]
    fn redirect_variants() {
        for raw in [
            "#REDIRECT [[Brasil]]",
            "#redirect [[Brasil]]",
            "  #Redirecionamento [[Brasil]]",
            "\n#REDIRECIONAMENTO[[Brasil]]",
        ] {
            let rec = record("B", 0, raw);
            assert_eq!(decide(&rec, &text("Brasil")), Decision::SkipRedirect, "{:?}", raw);
        }
    }

    #[test]
    fn redirect_marker_mid_text_is_not_redirect() {
        let rec = record("B", 0, "Texto sobre #REDIRECT.");
        assert_eq!(decide(&rec, &text("Texto")), Decision::Keep);
    }

    #[test]
    fn redirects_kept_when_not_skipped() {
        let options = ExtractOptions {
            skip_redirects: false,
            ..ExtractOptions::default()
        };
        let rec = record("B", 0, "#REDIRECT [[Brasil]]");
        assert_eq!(classifier().classify(&rec, &text("Brasil"), &options), Decision::Keep);
    }

    #[test]
    fn disambiguation_by_title() {
        let rec = record("Banco (desambiguação)", 0, "Banco pode referir-se a:");
        assert_eq!(decide(&rec, &text("Banco pode referir-se a:")), Decision::SkipDisambiguation);
    }

    #[test]
    fn disambiguation_title_is_case_insensitive() {
        let rec = record("Mercury (Disambiguation)", 0, "x");
        assert_eq!(decide(&rec, &text("x")), Decision::SkipDisambiguation);
    }

    #[test]
    fn disambiguation_word_outside_parentheses_is_kept() {
        let rec = record("Desambiguação", 0, "Artigo sobre o termo.");
        assert_eq!(decide(&rec, &text("Artigo sobre o termo.")), Decision::Keep);
    }

    #[test]
    fn disambiguation_by_template() {
        let rec = record("Banco", 0, "Banco pode ser:\n{{Desambiguação}}");
        assert_eq!(decide(&rec, &text("Banco pode ser:")), Decision::SkipDisambiguation);
    }

    #[test]
    fn disambiguation_template_needs_word_boundary() {
        let rec = record("X", 0, "{{Dabney}} texto");
        assert_eq!(decide(&rec, &text("texto")), Decision::Keep);
    }

    #[test]
    fn disambiguation_included_on_request() {
        let options = ExtractOptions {
            include_disambiguation: true,
            ..ExtractOptions::default()
        };
        let rec = record("Banco (desambiguação)", 0, "x");
        assert_eq!(classifier().classify(&rec, &text("x"), &options), Decision::Keep);
    }

    #[test]
    fn non_main_namespace_skipped() {
        let rec = record("Categoria:Brasil", 14, "Texto");
        assert_eq!(decide(&rec, &text("Texto")), Decision::SkipNamespace);
    }

    #[test]
    fn non_main_namespace_included_on_request() {
        let options = ExtractOptions {
            include_non_main: true,
            ..ExtractOptions::default()
        };
        let rec = record("Categoria:Brasil", 14, "Texto");
        assert_eq!(classifier().classify(&rec, &text("Texto"), &options), Decision::Keep);
    }

    #[test]
    fn namespace_checked_before_redirect() {
        let rec = record("Predefinição:X", 10, "#REDIRECT [[Y]]");
        assert_eq!(decide(&rec, &text("Y")), Decision::SkipNamespace);
    }

    #[test]
    fn empty_cleaned_text_skipped() {
        let rec = record("Brasil", 0, "{{Info/País}}");
        assert_eq!(decide(&rec, &CleanedPage::default()), Decision::SkipEmpty);
    }

    #[test]
    fn empty_checked_before_disambiguation() {
        let rec = record("Banco (desambiguação)", 0, "{{desambiguação}}");
        assert_eq!(decide(&rec, &CleanedPage::default()), Decision::SkipEmpty);
    }

    #[test]
    fn pre_check_agrees_with_classify() {
        let c = classifier();
        let options = ExtractOptions::default();
        let cases = [
            record("A", 0, "#REDIRECT [[B]]"),
            record("A", 4, "Texto"),
            record("A", 0, "Texto"),
        ];
        for rec in &cases {
            if let Some(decision) = c.pre_check(rec, &options) {
                assert_eq!(decision, c.classify(rec, &text("Texto"), &options));
            }
        }
        assert_eq!(c.pre_check(&cases[2], &options), None);
    }

    #[test]
    fn empty_marker_lists_never_match() {
        let rules = CleanerRules {
            redirect_markers: Vec::new(),
            disambiguation_title_words: Vec::new(),
            disambiguation_templates: Vec::new(),
            ..CleanerRules::default()
        };
        let c = PageClassifier::new(&rules).unwrap();
        let rec = record("Banco (desambiguação)", 0, "#REDIRECT {{dab}}");
        assert_eq!(c.classify(&rec, &text("x"), &ExtractOptions::default()), Decision::Keep);
    }
}

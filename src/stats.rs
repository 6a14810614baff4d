use crate::clean::{CleanReport, MalformedNode, NodeOutcome, Removed};
use crate::models::Decision;
use serde::Serialize;

/// Per-run page counters. Every page read lands in exactly one bucket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub seen: u64,
    pub written: u64,
    pub skipped_redirect: u64,
    pub skipped_empty: u64,
    pub skipped_namespace: u64,
    pub skipped_disambiguation: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_seen(&mut self) {
        self.seen += 1;
    }

    pub fn record(&mut self, decision: Decision) {
        match decision {
            Decision::Keep => self.written += 1,
            Decision::SkipRedirect => self.skipped_redirect += 1,
            Decision::SkipEmpty => self.skipped_empty += 1,
            Decision::SkipNamespace => self.skipped_namespace += 1,
            Decision::SkipDisambiguation => self.skipped_disambiguation += 1,
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_redirect + self.skipped_empty + self.skipped_namespace + self.skipped_disambiguation
    }

    /// `seen == written + skipped`; holds whenever no page is mid-flight.
    pub fn is_balanced(&self) -> bool {
        self.seen == self.written + self.skipped()
    }
}

/// Markup removals and problems, summed over every cleaned page.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanDiagnostics {
    pub pages_cleaned: u64,
    pub templates_removed: u64,
    pub media_links_removed: u64,
    pub category_links_removed: u64,
    pub tags_removed: u64,
    pub malformed_markup: u64,
    pub undecodable_entities: u64,
}

impl CleanDiagnostics {
    pub fn absorb(&mut self, report: &CleanReport) {
        self.pages_cleaned += 1;
        for outcome in &report.outcomes {
            match outcome {
                NodeOutcome::Removed { what, .. } => match what {
                    Removed::Template => self.templates_removed += 1,
                    Removed::MediaLink => self.media_links_removed += 1,
                    Removed::CategoryLink => self.category_links_removed += 1,
                    Removed::Tag => self.tags_removed += 1,
                },
                NodeOutcome::Malformed { issue, .. } => match issue {
                    MalformedNode::Markup(_) => self.malformed_markup += 1,
                    MalformedNode::UndecodableEntity(_) => self.undecodable_entities += 1,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::MarkupCleaner;
    use crate::rules::CleanerRules;

    #[test]
    fn default_values_are_zero() {
        let counters = RunCounters::new();
        assert_eq!(counters.seen, 0);
        assert_eq!(counters.written, 0);
        assert_eq!(counters.skipped(), 0);
        assert!(counters.is_balanced());
    }

    #[test]
    fn record_bumps_one_bucket() {
        let mut counters = RunCounters::new();
        counters.record(Decision::SkipRedirect);
        assert_eq!(counters.skipped_redirect, 1);
        assert_eq!(counters.written + counters.skipped_empty, 0);
        assert_eq!(counters.skipped(), 1);
    }

    #[test]
    fn mixed_operations() {
        let mut counters = RunCounters::new();
        let decisions = [
            Decision::Keep,
            Decision::Keep,
            Decision::SkipRedirect,
            Decision::SkipEmpty,
            Decision::SkipNamespace,
            Decision::SkipNamespace,
            Decision::SkipDisambiguation,
        ];
        for decision in decisions {
            counters.inc_seen();
            counters.record(decision);
        }

        assert_eq!(counters.seen, 7);
        assert_eq!(counters.written, 2);
        assert_eq!(counters.skipped_redirect, 1);
        assert_eq!(counters.skipped_empty, 1);
        assert_eq!(counters.skipped_namespace, 2);
        assert_eq!(counters.skipped_disambiguation, 1);
        assert!(counters.is_balanced());
    }

    #[test]
    fn unbalanced_while_page_in_flight() {
        let mut counters = RunCounters::new();
        counters.inc_seen();
        assert!(!counters.is_balanced());
    }

    #[test]
    fn serializes_all_buckets() {
        let json = serde_json::to_value(RunCounters::new()).unwrap();
        for key in [
            "seen",
            "written",
            "skipped_redirect",
            "skipped_empty",
            "skipped_namespace",
            "skipped_disambiguation",
        ] {
            assert_eq!(json[key], 0, "{}", key);
        }
    }

    #[test]
    fn diagnostics_absorb_reports() {
        let cleaner = MarkupCleaner::new(&CleanerRules::default()).unwrap();
        let mut diagnostics = CleanDiagnostics::default();

        let (_, report) = cleaner.clean_with_report("{{a}}[[File:x.png]]<ref>r</ref> &bogus; {{open", true, 0);
        diagnostics.absorb(&report);
        let (_, report) = cleaner.clean_with_report("[[Category:Y]]{{b}}", true, 0);
        diagnostics.absorb(&report);

        assert_eq!(diagnostics.pages_cleaned, 2);
        assert_eq!(diagnostics.templates_removed, 2);
        assert_eq!(diagnostics.media_links_removed, 1);
        assert_eq!(diagnostics.category_links_removed, 1);
        assert_eq!(diagnostics.tags_removed, 1);
        assert_eq!(diagnostics.malformed_markup, 1);
        assert_eq!(diagnostics.undecodable_entities, 1);
    }
}

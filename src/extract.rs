//! The page pipeline: pull a record, clean it, classify it, count it.
//!
//! [`run`] wraps any source of [`PageRecord`]s in an [`Extraction`] iterator
//! that yields only kept pages. Nothing is read ahead: the page cutoff is
//! checked before every pull, so a limited run never touches pages past it.

use crate::classify::PageClassifier;
use crate::clean::{MarkupCleaner, NodeOutcome};
use crate::config::ExtractOptions;
use crate::error::DumpError;
use crate::models::{CleanedPage, OutputRow, PageRecord};
use crate::rules::CleanerRules;
use crate::stats::{CleanDiagnostics, RunCounters};
use tracing::{debug, info};

pub fn run<I>(source: I, options: &ExtractOptions, rules: &CleanerRules) -> Result<Extraction<I::IntoIter>, regex::Error>
where
    I: IntoIterator<Item = Result<PageRecord, DumpError>>,
{
    Ok(Extraction {
        source: source.into_iter(),
        options: options.clone(),
        cleaner: MarkupCleaner::new(rules)?,
        classifier: PageClassifier::new(rules)?,
        counters: RunCounters::new(),
        diagnostics: CleanDiagnostics::default(),
        progress: None,
        done: false,
    })
}

struct Progress {
    every: u64,
    callback: Box<dyn FnMut(&RunCounters)>,
}

pub struct Extraction<I> {
    source: I,
    options: ExtractOptions,
    cleaner: MarkupCleaner,
    classifier: PageClassifier,
    counters: RunCounters,
    diagnostics: CleanDiagnostics,
    progress: Option<Progress>,
    done: bool,
}

impl<I> Extraction<I> {
    /// Calls `callback` every `every` pages seen, kept or skipped.
    pub fn with_progress<F>(mut self, every: u64, callback: F) -> Self
    where
        F: FnMut(&RunCounters) + 'static,
    {
        self.progress = Some(Progress {
            every: every.max(1),
            callback: Box::new(callback),
        });
        self
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn diagnostics(&self) -> CleanDiagnostics {
        self.diagnostics
    }

    fn limit_reached(&self) -> bool {
        self.options
            .max_pages
            .is_some_and(|limit| self.counters.seen >= limit)
    }

    fn process(&mut self, record: PageRecord) -> Option<OutputRow> {
        self.counters.inc_seen();

        let (decision, cleaned) = match self.classifier.pre_check(&record, &self.options) {
            Some(decision) => (decision, CleanedPage::default()),
            None => {
                let cleaned = self.clean(&record);
                (self.classifier.classify(&record, &cleaned, &self.options), cleaned)
            }
        };
        self.counters.record(decision);
        if let Some(progress) = self.progress.as_mut() {
            if self.counters.seen % progress.every == 0 {
                (progress.callback)(&self.counters);
            }
        }

        if decision.is_keep() {
            Some(OutputRow::new(record, cleaned))
        } else {
            debug!(title = %record.title, page_id = %record.page_id, decision = decision.as_str(), "Skipped page");
            None
        }
    }

    fn clean(&mut self, record: &PageRecord) -> CleanedPage {
        let (cleaned, report) =
            self.cleaner
                .clean_with_report(&record.raw_text, self.options.drop_lists, self.options.min_section_chars);

        for outcome in report.malformed_nodes() {
            if let NodeOutcome::Malformed { pass, issue, offset } = outcome {
                debug!(title = %record.title, ?pass, ?issue, ?offset, "Malformed markup");
            }
        }
        self.diagnostics.absorb(&report);
        cleaned
    }

    fn finish(&mut self) {
        self.done = true;
        let c = &self.counters;
        info!(
            seen = c.seen,
            written = c.written,
            skipped_redirect = c.skipped_redirect,
            skipped_empty = c.skipped_empty,
            skipped_namespace = c.skipped_namespace,
            skipped_disambiguation = c.skipped_disambiguation,
            "Extraction finished"
        );
    }
}

impl<I> Iterator for Extraction<I>
where
    I: Iterator<Item = Result<PageRecord, DumpError>>,
{
    type Item = Result<OutputRow, DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.limit_reached() {
                debug!(max_pages = self.counters.seen, "Page limit reached");
                self.finish();
                return None;
            }

            match self.source.next() {
                Some(Ok(record)) => {
                    if let Some(row) = self.process(record) {
                        return Some(Ok(row));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => self.finish(),
            }
        }
        None
    }
}

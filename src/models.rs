use serde::{Deserialize, Serialize};

/// One `<page>` element as read from the dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRecord {
    pub title: String,
    pub page_id: String,
    pub ns: i32,
    pub raw_text: String,
}

/// Plain text of a page, split at headings.
///
/// `text` is always `section_texts.join("\n\n")`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedPage {
    pub text: String,
    pub section_texts: Vec<String>,
}

impl CleanedPage {
    pub fn from_sections(section_texts: Vec<String>) -> Self {
        Self {
            text: section_texts.join("\n\n"),
            section_texts,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Record handed to the output sinks for every kept page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub title: String,
    pub page_id: String,
    pub ns: i32,
    pub text: String,
    pub section_texts: Vec<String>,
}

impl OutputRow {
    pub fn new(record: PageRecord, cleaned: CleanedPage) -> Self {
        Self {
            title: record.title,
            page_id: record.page_id,
            ns: record.ns,
            text: cleaned.text,
            section_texts: cleaned.section_texts,
        }
    }
}

/// Outcome of classifying one page. Every page gets exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Keep,
    SkipRedirect,
    SkipEmpty,
    SkipNamespace,
    SkipDisambiguation,
}

impl Decision {
    pub fn is_keep(self) -> bool {
        matches!(self, Decision::Keep)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Keep => "keep",
            Decision::SkipRedirect => "redirect",
            Decision::SkipEmpty => "empty",
            Decision::SkipNamespace => "namespace",
            Decision::SkipDisambiguation => "disambiguation",
        }
    }
}

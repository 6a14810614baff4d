/// Progress update interval (refresh the spinner every N pages seen)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Read buffer for the decompressed dump stream
pub const DUMP_BUFFER_SIZE: usize = 256 * 1024;

/// Write buffer for JSONL/CSV sinks
pub const SINK_BUFFER_SIZE: usize = 128 * 1024;

/// Sections shorter than this (in characters) are dropped; 0 keeps every non-empty section
pub const DEFAULT_MIN_SECTION_CHARS: usize = 0;

/// Caller-supplied switches for one extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Stop after this many pages have been read from the dump.
    pub max_pages: Option<u64>,
    pub skip_redirects: bool,
    pub include_non_main: bool,
    pub include_disambiguation: bool,
    /// Delete list/definition lines before parsing.
    pub drop_lists: bool,
    pub min_section_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            skip_redirects: true,
            include_non_main: false,
            include_disambiguation: false,
            drop_lists: true,
            min_section_chars: DEFAULT_MIN_SECTION_CHARS,
        }
    }
}

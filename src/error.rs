//! Fatal errors of the dump reader.
//!
//! Only stream-level failures live here: the dump cannot be opened, the
//! decompressor fails, or the XML is not well formed. Problems with a single
//! field (a missing `<ns>`) or a single markup node (an unclosed `{{`) are
//! absorbed where they happen and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("failed to open dump '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read dump stream: {0}")]
    Io(#[from] std::io::Error),

    /// The decompressed stream is not well-formed XML.
    #[error("malformed XML near byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    /// The stream ended while `<element>` was still open.
    #[error("dump ended inside <{element}> near byte {position}")]
    UnexpectedEof { element: String, position: usize },

    /// The stream ended before any root element was opened.
    #[error("dump contains no root element")]
    NoRoot,

    /// Non-whitespace text found outside the document's root element.
    #[error("unexpected content outside the root element near byte {position}")]
    StrayContent { position: usize },
}

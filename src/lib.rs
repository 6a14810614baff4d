//! Icarus: Wikipedia dump to plain-text corpus pipeline
//!
//! This crate streams a MediaWiki XML export (usually `pages-articles.xml.bz2`)
//! and turns every article into cleaned plain text split into sections, ready
//! for language-model corpora:
//!
//! 1. **Decoding** -- Detect bzip2 (multistream included) and decompress on the fly
//! 2. **Reading** -- Pull one page at a time from the XML event stream
//! 3. **Cleaning** -- Parse wikitext into a node tree, drop templates, media,
//!    references and tables, render the rest as text, split at headings
//! 4. **Classification** -- Skip redirects, disambiguation pages, empty pages and
//!    non-article namespaces
//! 5. **Output** -- Write kept pages as JSON Lines and/or CSV
//!
//! # Architecture
//!
//! - **Streaming** -- Never loads the dump into memory; pages are pulled lazily
//!   and a page cutoff stops reading immediately
//! - **Typed outcomes** -- Malformed markup never aborts a page; every removal and
//!   every problem is recorded in a [`clean::CleanReport`]
//! - **Conservation** -- Each page read lands in exactly one [`stats::RunCounters`] bucket
//! - **Injectable patterns** -- Prefixes, tag names and markers live in
//!   [`rules::CleanerRules`] and can be loaded from JSON
//!
//! # Key Modules
//!
//! - [`decoder`] -- Compression detection and bzip2 decompression
//! - [`parser`] -- Streaming XML reader producing [`models::PageRecord`]s
//! - [`markup`] -- Wikitext to node tree
//! - [`clean`] -- Node tree to sectioned plain text
//! - [`classify`] -- Keep/skip decision per page
//! - [`extract`] -- The lazy page pipeline and its counters
//! - [`output`] -- JSONL and CSV sinks
//! - [`rules`] -- Pattern tables with Portuguese/English defaults
//! - [`config`] -- Constants and per-run options
//!
//! # Example Usage
//!
//! ```bash
//! # Clean the first 1000 pages of a Portuguese dump
//! icarus extract -i ptwiki-latest-pages-articles.xml.bz2 --jsonl out/pt.jsonl --max-pages 1000
//!
//! # Inspect how one page is cleaned
//! icarus clean -i page.wiki
//! ```

pub mod classify;
pub mod clean;
pub mod config;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod markup;
pub mod models;
pub mod output;
pub mod parser;
pub mod rules;
pub mod stats;

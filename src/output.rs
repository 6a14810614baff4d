use crate::config::SINK_BUFFER_SIZE;
use crate::models::OutputRow;
use anyhow::{Context, Result};
use csv::Writer;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub const CSV_HEADER: [&str; 5] = ["title", "page_id", "ns", "text", "section_texts"];

/// Destination for kept pages. One extraction pass can feed several sinks.
pub trait RowSink {
    fn write_row(&mut self, row: &OutputRow) -> Result<()>;

    /// Flushes buffered rows. Must be called once after the last row.
    fn finish(&mut self) -> Result<()>;
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    Ok(BufWriter::with_capacity(SINK_BUFFER_SIZE, file))
}

/// One JSON object per line, UTF-8, non-ASCII written verbatim.
pub struct JsonlWriter<W: Write> {
    out: W,
}

impl JsonlWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(create_file(path)?))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RowSink for JsonlWriter<W> {
    fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        serde_json::to_writer(&mut self.out, row).context("Failed to serialize row")?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().context("Failed to flush JSONL output")
    }
}

/// `title,page_id,ns,text,section_texts`, with `section_texts` as a JSON array string.
pub struct CsvWriter<W: Write> {
    writer: Writer<W>,
}

impl CsvWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Self::new(create_file(path)?)
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W) -> Result<Self> {
        let mut writer = Writer::from_writer(out);
        writer.write_record(CSV_HEADER)?;
        Ok(Self { writer })
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))
    }
}

impl<W: Write> RowSink for CsvWriter<W> {
    fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        let sections = serde_json::to_string(&row.section_texts)?;
        let ns = row.ns.to_string();
        self.writer
            .write_record([
                row.title.as_str(),
                row.page_id.as_str(),
                ns.as_str(),
                row.text.as_str(),
                sections.as_str(),
            ])
            .with_context(|| format!("Failed to write CSV row for: {}", row.title))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush CSV output")
    }
}

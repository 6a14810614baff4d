use crate::decoder;
use crate::error::DumpError;
use crate::models::PageRecord;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::io::BufRead;
use std::mem;
use std::path::Path;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Id,
    Ns,
    Text,
}

/// State of the `<page>` currently being read. Dropped as soon as the page is
/// yielded, so at most one page is ever held in memory.
#[derive(Default)]
struct PageBuilder {
    record: PageRecord,
    depth: usize,
    in_revision: bool,
    field: Option<(Field, usize)>,
    value: String,
}

impl PageBuilder {
    /// Elements are matched by local name, so `mw:text` and `text` are the same.
    fn field_for(&self, depth: usize, name: &[u8]) -> Option<Field> {
        match (depth, name) {
            (1, b"title") => Some(Field::Title),
            (1, b"id") => Some(Field::Id),
            (1, b"ns") => Some(Field::Ns),
            (d, b"text") if d > 1 && self.in_revision => Some(Field::Text),
            _ => None,
        }
    }

    fn start(&mut self, name: &[u8]) {
        self.depth += 1;
        if self.depth == 1 && name == b"revision" {
            self.in_revision = true;
        }
        if self.field.is_none() {
            if let Some(field) = self.field_for(self.depth, name) {
                self.field = Some((field, self.depth));
                self.value.clear();
            }
        }
    }

    /// `<text/>` still counts as the latest text node, just an empty one.
    fn empty(&mut self, name: &[u8]) {
        if self.field.is_none() {
            if let Some(field) = self.field_for(self.depth + 1, name) {
                self.store(field, String::new());
            }
        }
    }

    fn capturing(&self) -> bool {
        self.field.is_some()
    }

    /// Returns true when this end tag closes the page itself.
    fn end(&mut self, name: &[u8]) -> bool {
        if self.depth == 0 {
            return true;
        }
        if let Some((field, depth)) = self.field {
            if depth == self.depth {
                let value = mem::take(&mut self.value);
                self.store(field, value);
                self.field = None;
            }
        }
        if self.depth == 1 && name == b"revision" {
            self.in_revision = false;
        }
        self.depth -= 1;
        false
    }

    fn store(&mut self, field: Field, value: String) {
        match field {
            Field::Title => self.record.title = value,
            Field::Id => self.record.page_id = value.trim().to_string(),
            Field::Ns => {
                self.record.ns = value.trim().parse().unwrap_or_else(|_| {
                    debug!(value = %value, "Unparsable namespace, defaulting to 0");
                    0
                });
            }
            Field::Text => self.record.raw_text = value,
        }
    }

    fn finish(self) -> PageRecord {
        self.record
    }
}

/// Streams `<page>` elements out of a MediaWiki XML export.
pub struct WikiReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Elements open outside of any page (`mediawiki`, `siteinfo`, ...).
    open: Vec<String>,
    seen_root: bool,
    finished: bool,
}

impl WikiReader<Box<dyn BufRead>> {
    /// Opens a dump file, decompressing bzip2 transparently.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DumpError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening dump");
        Ok(Self::new(decoder::open(path)?))
    }
}

impl<R: BufRead> WikiReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::with_capacity(64 * 1024),
            open: Vec::new(),
            seen_root: false,
            finished: false,
        }
    }

    /// Reads up to the end of the next page. `Ok(None)` once the document is done.
    pub fn next_page(&mut self) -> Result<Option<PageRecord>, DumpError> {
        if self.finished {
            return Ok(None);
        }

        let reader = &mut self.reader;
        let mut page: Option<PageBuilder> = None;

        loop {
            self.buf.clear();
            let event = reader
                .read_event_into(&mut self.buf)
                .map_err(|source| DumpError::Xml {
                    position: reader.buffer_position(),
                    source,
                })?;

            if matches!(event, Event::Start(_) | Event::Empty(_)) {
                self.seen_root = true;
            }

            match event {
                Event::Start(e) => {
                    let local = e.local_name();
                    match page.as_mut() {
                        Some(p) => p.start(local.as_ref()),
                        None if local.as_ref() == b"page" => page = Some(PageBuilder::default()),
                        None => self
                            .open
                            .push(String::from_utf8_lossy(local.as_ref()).into_owned()),
                    }
                }
                Event::Empty(e) => {
                    let local = e.local_name();
                    match page.as_mut() {
                        Some(p) => p.empty(local.as_ref()),
                        None if local.as_ref() == b"page" => {
                            trace!("Empty page element");
                            return Ok(Some(PageRecord::default()));
                        }
                        None => {}
                    }
                }
                Event::Text(t) => match page.as_mut() {
                    Some(p) if p.capturing() => {
                        let text = t.unescape().map_err(|source| DumpError::Xml {
                            position: reader.buffer_position(),
                            source,
                        })?;
                        p.value.push_str(&text);
                    }
                    Some(_) => {}
                    None => {
                        if self.open.is_empty() && !t.iter().all(u8::is_ascii_whitespace) {
                            return Err(DumpError::StrayContent {
                                position: reader.buffer_position(),
                            });
                        }
                    }
                },
                Event::CData(c) => {
                    if let Some(p) = page.as_mut().filter(|p| p.capturing()) {
                        let text = reader.decoder().decode(&c).map_err(|source| DumpError::Xml {
                            position: reader.buffer_position(),
                            source,
                        })?;
                        p.value.push_str(&text);
                    }
                }
                Event::End(e) => match page.take() {
                    Some(mut p) => {
                        if p.end(e.local_name().as_ref()) {
                            let record = p.finish();
                            trace!(title = %record.title, id = %record.page_id, "Page read");
                            return Ok(Some(record));
                        }
                        page = Some(p);
                    }
                    None => {
                        self.open.pop();
                    }
                },
                Event::Eof => {
                    self.finished = true;
                    let position = reader.buffer_position();
                    if page.is_some() {
                        return Err(DumpError::UnexpectedEof {
                            element: "page".to_string(),
                            position,
                        });
                    }
                    if let Some(element) = self.open.pop() {
                        return Err(DumpError::UnexpectedEof { element, position });
                    }
                    if !self.seen_root {
                        return Err(DumpError::NoRoot);
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for WikiReader<R> {
    type Item = Result<PageRecord, DumpError>;

    /// Yields a fatal error once, then ends.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_page() {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

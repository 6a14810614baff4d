use crate::config::DUMP_BUFFER_SIZE;
use crate::error::DumpError;
use bzip2::read::MultiBzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

const BZIP2_MAGIC: &[u8] = b"BZh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Bzip2,
    None,
}

/// Peeks at the first bytes without consuming them.
pub fn detect<R: BufRead>(reader: &mut R) -> io::Result<Compression> {
    let head = reader.fill_buf()?;
    if head.starts_with(BZIP2_MAGIC) {
        Ok(Compression::Bzip2)
    } else {
        Ok(Compression::None)
    }
}

/// Wraps a raw dump stream so callers always pull decompressed XML.
///
/// Multistream dumps are a concatenation of bzip2 streams, so the multi-stream
/// decoder is used; a plain decoder would stop after the first block group.
pub fn decode<R: Read + 'static>(inner: R) -> io::Result<Box<dyn BufRead>> {
    let mut reader = BufReader::with_capacity(DUMP_BUFFER_SIZE, inner);
    let compression = detect(&mut reader)?;
    debug!(?compression, "Detected dump compression");

    Ok(match compression {
        Compression::Bzip2 => Box::new(BufReader::with_capacity(
            DUMP_BUFFER_SIZE,
            MultiBzDecoder::new(reader),
        )),
        Compression::None => Box::new(reader),
    })
}

pub fn open(path: &Path) -> Result<Box<dyn BufRead>, DumpError> {
    let file = File::open(path).map_err(|source| DumpError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    decode(file).map_err(|source| DumpError::Open {
        path: path.to_path_buf(),
        source,
    })
}

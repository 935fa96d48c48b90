//! ZIP and GZIP support
//!
//! Game music collections are commonly shipped as ZIP files, and VGM rips are
//! usually GZIP-compressed (`.vgz`, `.nsf.gz`). Entries are extracted fully
//! into memory; size limits guard against decompression bombs.

use super::{read_limited, ByteStream, MAX_LOADED_SIZE};
use crate::{PlayerError, Result};
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use std::sync::Arc;
use zip::ZipArchive;

/// GZIP magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extract one entry of an in-memory ZIP archive.
///
/// The entry is looked up by exact name first, then case-insensitively.
pub fn extract_zip_entry(archive: Arc<[u8]>, entry: &str) -> Result<Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| PlayerError::Archive(format!("Not a valid ZIP file: {e}")))?;

    let name = resolve_entry_name(&zip, entry)?;
    let file = zip
        .by_name(&name)
        .map_err(|e| PlayerError::Archive(format!("Cannot read ZIP entry '{name}': {e}")))?;

    if file.size() > MAX_LOADED_SIZE as u64 {
        return Err(PlayerError::Archive(format!(
            "ZIP entry '{name}' is {} bytes, larger than the {MAX_LOADED_SIZE} byte limit",
            file.size()
        )));
    }

    read_limited(file, MAX_LOADED_SIZE)
}

fn resolve_entry_name<R: Read + std::io::Seek>(zip: &ZipArchive<R>, entry: &str) -> Result<String> {
    if zip.index_for_name(entry).is_some() {
        return Ok(entry.to_string());
    }
    zip.file_names()
        .find(|name| name.eq_ignore_ascii_case(entry))
        .map(str::to_string)
        .ok_or_else(|| {
            PlayerError::Archive(format!(
                "Entry '{entry}' not found in ZIP ({} entries)",
                zip.len()
            ))
        })
}

/// Wrap a stream in a GZIP decoder
pub fn gzip_reader(stream: ByteStream) -> ByteStream {
    Box::new(GzDecoder::new(stream))
}

/// Check for the GZIP header
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == GZIP_MAGIC
}

//! Byte sources
//!
//! Everything the player reads goes through [`ByteSource`]: local files, HTTP
//! downloads, ZIP entries and GZIP streams. [`DefaultByteSource`] covers the
//! usual cases; hosts with their own resource loading can supply another
//! implementation.

pub mod archive;
#[cfg(feature = "remote")]
pub mod remote;

use crate::locator::Origin;
use crate::{PlayerError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

/// Upper bound for any single file, archive or decompressed stream: 100MB.
/// Chiptune files are a few KB; collections rarely exceed a few MB.
pub const MAX_LOADED_SIZE: usize = 100 * 1024 * 1024;

/// Owned readable stream handed between source operations
pub type ByteStream = Box<dyn Read + Send>;

/// Capability that yields raw bytes for files, URLs and archive entries
pub trait ByteSource: Send + Sync {
    /// Open a file on the local filesystem
    fn open_local(&self, path: &Path) -> Result<ByteStream>;

    /// Open an HTTP(S) URL
    fn open_remote(&self, url: &str) -> Result<ByteStream>;

    /// Open one entry of an in-memory ZIP archive
    fn open_archive_entry(&self, archive: Arc<[u8]>, entry: &str) -> Result<ByteStream>;

    /// Wrap a GZIP-compressed stream
    fn open_decompressed(&self, stream: ByteStream) -> Result<ByteStream>;

    /// Drain a stream into memory, enforcing [`MAX_LOADED_SIZE`]
    fn read_all(&self, stream: ByteStream) -> Result<Vec<u8>> {
        read_limited(stream, MAX_LOADED_SIZE)
    }

    /// Open an origin, dispatching to the local or remote opener
    fn open(&self, origin: &Origin) -> Result<ByteStream> {
        match origin {
            Origin::Local(path) => self.open_local(path),
            Origin::Remote(url) => self.open_remote(url),
        }
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn open_local(&self, path: &Path) -> Result<ByteStream> {
        (**self).open_local(path)
    }

    fn open_remote(&self, url: &str) -> Result<ByteStream> {
        (**self).open_remote(url)
    }

    fn open_archive_entry(&self, archive: Arc<[u8]>, entry: &str) -> Result<ByteStream> {
        (**self).open_archive_entry(archive, entry)
    }

    fn open_decompressed(&self, stream: ByteStream) -> Result<ByteStream> {
        (**self).open_decompressed(stream)
    }

    fn read_all(&self, stream: ByteStream) -> Result<Vec<u8>> {
        (**self).read_all(stream)
    }
}

/// Filesystem, ZIP, GZIP and (with the `remote` feature) HTTP source
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultByteSource;

impl DefaultByteSource {
    /// Create a new default source
    pub fn new() -> Self {
        DefaultByteSource
    }
}

impl ByteSource for DefaultByteSource {
    fn open_local(&self, path: &Path) -> Result<ByteStream> {
        let file = File::open(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to open '{}': {e}", path.display()),
            )
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    #[cfg(feature = "remote")]
    fn open_remote(&self, url: &str) -> Result<ByteStream> {
        remote::open_url(url)
    }

    #[cfg(not(feature = "remote"))]
    fn open_remote(&self, url: &str) -> Result<ByteStream> {
        Err(PlayerError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("Cannot fetch '{url}': built without the `remote` feature"),
        )))
    }

    fn open_archive_entry(&self, archive: Arc<[u8]>, entry: &str) -> Result<ByteStream> {
        let data = archive::extract_zip_entry(archive, entry)?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    fn open_decompressed(&self, stream: ByteStream) -> Result<ByteStream> {
        Ok(archive::gzip_reader(stream))
    }
}

/// Read a stream to the end, failing if it exceeds `limit` bytes.
pub fn read_limited<R: Read>(stream: R, limit: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();

    // One extra byte tells an exact-limit file apart from a truncated one
    let mut limited = stream.take(limit as u64 + 1);
    limited.read_to_end(&mut data)?;

    if data.len() > limit {
        return Err(PlayerError::Archive(format!(
            "Data exceeded maximum safe size ({limit} bytes). \
             The file may be corrupted or an attempted decompression bomb."
        )));
    }
    Ok(data)
}

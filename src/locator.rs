//! Locators for loadable music files
//!
//! A locator is either a plain file (local path or HTTP URL) or an entry inside
//! a ZIP archive. The string form uses `#` to separate the archive from the
//! entry: `music/collection.zip#game/stage1.spc`.

use std::fmt;
use std::path::{Path, PathBuf};

/// Separator between an archive and the entry inside it
pub const ENTRY_SEPARATOR: char = '#';

/// Where a file or archive comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// File on the local filesystem
    Local(PathBuf),
    /// HTTP(S) URL
    Remote(String),
}

impl Origin {
    /// Classify a string as a URL or a local path.
    pub fn parse(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Origin::Remote(text.to_string())
        } else {
            Origin::Local(PathBuf::from(text))
        }
    }

    /// Final path component, used for extension matching
    pub fn file_name(&self) -> String {
        match self {
            Origin::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Origin::Remote(url) => {
                let path = url.split(['?', '#']).next().unwrap_or_default();
                path.rsplit('/').next().unwrap_or_default().to_string()
            }
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local(path) => write!(f, "{}", path.display()),
            Origin::Remote(url) => f.write_str(url),
        }
    }
}

impl From<&Path> for Origin {
    fn from(path: &Path) -> Self {
        Origin::Local(path.to_path_buf())
    }
}

/// Identifier for a loadable file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Standalone file
    File(Origin),
    /// Entry inside a ZIP archive
    ArchiveEntry {
        /// The archive itself
        archive: Origin,
        /// Path of the entry inside the archive
        entry: String,
    },
}

impl Locator {
    /// Locator for a local file
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Locator::File(Origin::Local(path.into()))
    }

    /// Locator for a remote file
    pub fn url(url: impl Into<String>) -> Self {
        Locator::File(Origin::Remote(url.into()))
    }

    /// Locator for an entry of an archive given as path or URL
    pub fn archive_entry(archive: &str, entry: impl Into<String>) -> Self {
        Locator::ArchiveEntry {
            archive: Origin::parse(archive),
            entry: entry.into(),
        }
    }

    /// Parse the string form.
    ///
    /// `a.zip#inner.nsf` is an archive entry when the part before `#` names a
    /// ZIP file; anything else is a plain file.
    pub fn parse(text: &str) -> Self {
        if let Some((archive, entry)) = text.split_once(ENTRY_SEPARATOR) {
            if archive.to_ascii_lowercase().ends_with(".zip") && !entry.is_empty() {
                return Locator::archive_entry(archive, entry);
            }
        }
        Locator::File(Origin::parse(text))
    }

    /// File name used to pick a decoder: the entry name for archive entries,
    /// otherwise the last component of the path or URL.
    pub fn file_name(&self) -> String {
        match self {
            Locator::File(origin) => origin.file_name(),
            Locator::ArchiveEntry { entry, .. } => {
                entry.rsplit(['/', '\\']).next().unwrap_or_default().to_string()
            }
        }
    }

    /// The archive this locator reads from, if any
    pub fn archive(&self) -> Option<&Origin> {
        match self {
            Locator::File(_) => None,
            Locator::ArchiveEntry { archive, .. } => Some(archive),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::File(origin) => write!(f, "{origin}"),
            Locator::ArchiveEntry { archive, entry } => {
                write!(f, "{archive}{ENTRY_SEPARATOR}{entry}")
            }
        }
    }
}

impl From<&str> for Locator {
    fn from(text: &str) -> Self {
        Locator::parse(text)
    }
}

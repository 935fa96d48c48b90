//! Format detection from file names

use crate::{PlayerError, Result};
use std::fmt;

/// Compression suffix stripped before extension matching
const GZIP_SUFFIX: &str = ".gz";

/// Supported music formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecoderKind {
    /// Video Game Music (Sega Master System, Genesis, ...)
    Vgm,
    /// Game Boy Sound
    Gbs,
    /// NES Sound Format
    Nsf,
    /// SNES SPC700 dump
    Spc,
}

impl DecoderKind {
    /// All kinds, in registration order
    pub const ALL: [DecoderKind; 4] = [
        DecoderKind::Vgm,
        DecoderKind::Gbs,
        DecoderKind::Nsf,
        DecoderKind::Spc,
    ];

    /// Match a bare extension (without dot, any case)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "vgm" | "vgz" => Some(DecoderKind::Vgm),
            "gbs" => Some(DecoderKind::Gbs),
            "nsf" => Some(DecoderKind::Nsf),
            "spc" => Some(DecoderKind::Spc),
            _ => None,
        }
    }

    /// File extensions handled by this kind
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            DecoderKind::Vgm => &["vgm", "vgz"],
            DecoderKind::Gbs => &["gbs"],
            DecoderKind::Nsf => &["nsf"],
            DecoderKind::Spc => &["spc"],
        }
    }

    /// Short uppercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DecoderKind::Vgm => "VGM",
            DecoderKind::Gbs => "GBS",
            DecoderKind::Nsf => "NSF",
            DecoderKind::Spc => "SPC",
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of inspecting a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatKey {
    /// Decoder to use
    pub kind: DecoderKind,
    /// Body must be GZIP-decompressed before decoding
    pub compressed: bool,
}

impl FormatKey {
    /// Derive the decoder and compression from a file name.
    ///
    /// A trailing `.gz` is stripped before matching, so `song.nsf.gz` is an
    /// NSF file. `.vgz` is GZIP-compressed VGM.
    pub fn detect(name: &str) -> Result<Self> {
        let lower = name.to_ascii_lowercase();
        let (stem, gz_suffix) = match lower.strip_suffix(GZIP_SUFFIX) {
            Some(stem) => (stem, true),
            None => (lower.as_str(), false),
        };

        let ext = stem.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
        let kind = DecoderKind::from_extension(ext).ok_or_else(|| {
            PlayerError::UnsupportedFormat(format!(
                "'{name}' (supported: .vgm, .vgz, .gbs, .nsf, .spc, optionally .gz)"
            ))
        })?;

        Ok(FormatKey {
            kind,
            compressed: gz_suffix || ext == "vgz",
        })
    }
}

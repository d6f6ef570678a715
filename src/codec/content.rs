//! Content kinds and their media types.

use std::path::Path;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// What a stored asset holds. Decides compression and the `data:` URI prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    RasterImage,
    VectorImage,
    Audio,
    Font,
    Binary,
}

impl ContentKind {
    /// Guess the kind from a file extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png" | "gif" | "jpg" | "jpeg" | "webp") => Self::RasterImage,
            Some("svg") => Self::VectorImage,
            Some("mp3" | "wav" | "ogg") => Self::Audio,
            Some("woff" | "woff2" | "ttf" | "otf") => Self::Font,
            _ => Self::Binary,
        }
    }

    /// Whether assets of this kind are deflated before chunking.
    #[inline]
    pub fn is_compressible(&self) -> bool {
        matches!(self, Self::VectorImage)
    }

    /// Generic media type for the kind.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::RasterImage => "image/png",
            Self::VectorImage => "image/svg+xml",
            Self::Audio => "audio/mpeg",
            Self::Font => "font/woff",
            Self::Binary => "application/octet-stream",
        }
    }

    /// Render decoded content as a base64 `data:` URI.
    pub fn data_uri(&self, bytes: &[u8]) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type(),
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    /// Stable one-byte tag used in the journal.
    pub(crate) fn code(&self) -> u8 {
        match self {
            Self::RasterImage => 0,
            Self::VectorImage => 1,
            Self::Audio => 2,
            Self::Font => 3,
            Self::Binary => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::RasterImage,
            1 => Self::VectorImage,
            2 => Self::Audio,
            3 => Self::Font,
            4 => Self::Binary,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RasterImage => "raster",
            Self::VectorImage => "vector",
            Self::Audio => "audio",
            Self::Font => "font",
            Self::Binary => "binary",
        };
        f.write_str(name)
    }
}

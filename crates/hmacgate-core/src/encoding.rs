//! Text encodings used to turn signing input into bytes.

use std::fmt;
use std::str::FromStr;

/// Character encoding applied to keys and canonical representations before hashing.
///
/// # Examples
///
/// ```
/// use hmacgate_core::CharacterEncoding;
///
/// let encoding: CharacterEncoding = "UTF-8".parse().unwrap();
/// assert_eq!(encoding.encode("abc"), b"abc".to_vec());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CharacterEncoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// 7-bit ASCII; characters outside the range are replaced by `?`.
    Ascii,
    /// ISO-8859-1; characters above U+00FF are replaced by `?`.
    Latin1,
    /// UTF-16, little endian, no byte order mark.
    Utf16Le,
    /// UTF-16, big endian, no byte order mark.
    Utf16Be,
}

impl CharacterEncoding {
    /// Canonical name of the encoding.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "us-ascii",
            Self::Latin1 => "iso-8859-1",
            Self::Utf16Le => "utf-16",
            Self::Utf16Be => "utf-16be",
        }
    }

    /// Encode `text` into bytes.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }
}

impl fmt::Display for CharacterEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an encoding name is not recognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown character encoding: {0}")]
pub struct ParseEncodingError(String);

impl FromStr for CharacterEncoding {
    type Err = ParseEncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "us-ascii" | "ascii" => Ok(Self::Ascii),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(Self::Latin1),
            "utf-16" | "utf16" | "utf-16le" | "unicode" => Ok(Self::Utf16Le),
            "utf-16be" | "unicodefffe" => Ok(Self::Utf16Be),
            _ => Err(ParseEncodingError(s.to_owned())),
        }
    }
}

//! HMAC variants selectable by name.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, KeyInit, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::error::AuthError;

/// Supported HMAC variants.
///
/// Names are matched case-insensitively, with or without the `HMAC` prefix and
/// with optional `-`/`_` separators, so `HMACSHA512`, `HmacSha512` and
/// `hmac-sha512` all resolve to [`HmacAlgorithm::Sha512`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmacAlgorithm {
    /// HMAC-MD5.
    Md5,
    /// HMAC-SHA1.
    Sha1,
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA384.
    Sha384,
    /// HMAC-SHA512.
    Sha512,
}

macro_rules! hmac_digest {
    ($hash:ty, $key:expr, $data:expr) => {{
        let mut mac = <Hmac<$hash>>::new_from_slice($key)
            .map_err(|_| AuthError::InvalidArgument("HMAC key rejected".to_owned()))?;
        mac.update($data);
        mac.finalize().into_bytes().to_vec()
    }};
}

impl HmacAlgorithm {
    /// Canonical name of the algorithm.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "HMACMD5",
            Self::Sha1 => "HMACSHA1",
            Self::Sha256 => "HMACSHA256",
            Self::Sha384 => "HMACSHA384",
            Self::Sha512 => "HMACSHA512",
        }
    }

    /// Compute the raw MAC of `data` under `key`.
    ///
    /// A fresh MAC state is built on every call, so the algorithm value can be
    /// shared freely between threads.
    pub fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, AuthError> {
        Ok(match self {
            Self::Md5 => hmac_digest!(Md5, key, data),
            Self::Sha1 => hmac_digest!(Sha1, key, data),
            Self::Sha256 => hmac_digest!(Sha256, key, data),
            Self::Sha384 => hmac_digest!(Sha384, key, data),
            Self::Sha512 => hmac_digest!(Sha512, key, data),
        })
    }
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HmacAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        let digest = normalized.strip_prefix("HMAC").unwrap_or(&normalized);
        match digest {
            "MD5" => Ok(Self::Md5),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(AuthError::UnsupportedAlgorithm(s.to_owned())),
        }
    }
}

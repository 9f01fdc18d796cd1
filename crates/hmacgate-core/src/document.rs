//! Declarative configuration documents.
//!
//! Parsing is split in two stages so that the store's swap machinery stays
//! format-agnostic:
//!
//! 1. A format-specific parser turns source text into a [`ConfigDocument`], an
//!    ordered list of raw [`ConfigEntry`] values.
//! 2. [`build_configuration_map`] validates the entries (names, duplicates,
//!    field values) and produces the map the store swaps in.
//!
//! # JSON
//!
//! ```json
//! {
//!   "configurations": [
//!     {
//!       "name": "Default",
//!       "userHeaderName": "X-Auth-User",
//!       "authorizationScheme": "HMAC",
//!       "signatureDataSeparator": "\n",
//!       "characterEncoding": "UTF-8",
//!       "hmacAlgorithm": "HMACSHA512",
//!       "maxRequestAge": 300,
//!       "signRequestUri": true,
//!       "validateContentMd5": true,
//!       "headers": ["X-Custom-Header"]
//!     }
//!   ]
//! }
//! ```
//!
//! Absent fields fall back to the built-in defaults. `"maxRequestAge": null`
//! disables the replay window and an empty `userHeaderName` disables the
//! username requirement.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::config::{
    Configuration, DEFAULT_AUTHORIZATION_SCHEME, DEFAULT_CONFIGURATION_NAME, DEFAULT_HMAC_ALGORITHM,
    DEFAULT_MAX_REQUEST_AGE, DEFAULT_SIGNATURE_DATA_SEPARATOR, DEFAULT_USER_HEADER_NAME,
    dedup_header_names,
};
use crate::encoding::CharacterEncoding;
use crate::error::{ConfigError, ConfigResult};
use crate::xml;

/// Source formats understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFormat {
    /// JSON document with a top-level `configurations` array.
    Json,
    /// XML document with `<configuration>` children under the root element.
    Xml,
}

impl ConfigFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        extension.parse()
    }

    /// Parse `text` in this format.
    pub fn parse(self, text: &str) -> ConfigResult<ConfigDocument> {
        match self {
            Self::Json => parse_json(text),
            Self::Xml => xml::parse_xml(text),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Xml => f.write_str("xml"),
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" | "config" => Ok(Self::Xml),
            _ => Err(ConfigError::UnsupportedFormat(s.to_owned())),
        }
    }
}

/// A parsed configuration source: entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigDocument {
    /// Raw configuration entries.
    #[serde(default)]
    pub configurations: Vec<ConfigEntry>,
}

/// One raw entry of a configuration document. Every field is optional; absent
/// fields take the built-in defaults when the entry is converted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    /// Configuration name.
    pub name: Option<String>,
    /// Username header; empty disables the username requirement.
    pub user_header_name: Option<String>,
    /// Authorization scheme token.
    pub authorization_scheme: Option<String>,
    /// Field separator.
    pub signature_data_separator: Option<String>,
    /// Character encoding name; empty leaves the encoding unset.
    pub character_encoding: Option<String>,
    /// HMAC algorithm name.
    pub hmac_algorithm: Option<String>,
    /// Replay window in seconds: absent means the default, `null` disables it.
    #[serde(default, deserialize_with = "deserialize_present")]
    pub max_request_age: Option<Option<u64>>,
    /// Whether the request URI is signed.
    pub sign_request_uri: Option<bool>,
    /// Whether the body is checked against `Content-MD5`.
    #[serde(rename = "validateContentMd5")]
    pub validate_content_md5: Option<bool>,
    /// Additional headers to canonicalize.
    pub headers: Option<Vec<String>>,
}

/// Distinguish an explicit `null` (`Some(None)`) from an absent field (`None`).
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TryFrom<ConfigEntry> for Configuration {
    type Error = ConfigError;

    fn try_from(entry: ConfigEntry) -> Result<Self, Self::Error> {
        let name = entry
            .name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .ok_or(ConfigError::MissingName)?;

        let authorization_scheme = entry
            .authorization_scheme
            .unwrap_or_else(|| DEFAULT_AUTHORIZATION_SCHEME.to_owned());
        if authorization_scheme.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "authorizationScheme",
                value: authorization_scheme,
            });
        }

        let character_encoding = match entry.character_encoding.as_deref().map(str::trim) {
            None => Some(CharacterEncoding::Utf8),
            Some("") => None,
            Some(value) => Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                field: "characterEncoding",
                value: value.to_owned(),
            })?),
        };

        let max_request_age = match entry.max_request_age {
            None => Some(DEFAULT_MAX_REQUEST_AGE),
            Some(seconds) => seconds.map(Duration::from_secs),
        };

        Ok(Self {
            name,
            user_header_name: Some(
                entry
                    .user_header_name
                    .unwrap_or_else(|| DEFAULT_USER_HEADER_NAME.to_owned()),
            ),
            authorization_scheme,
            signature_data_separator: entry
                .signature_data_separator
                .unwrap_or_else(|| DEFAULT_SIGNATURE_DATA_SEPARATOR.to_owned()),
            character_encoding,
            hmac_algorithm: entry
                .hmac_algorithm
                .unwrap_or_else(|| DEFAULT_HMAC_ALGORITHM.to_owned()),
            max_request_age,
            sign_request_uri: entry.sign_request_uri.unwrap_or(true),
            validate_content_md5: entry.validate_content_md5.unwrap_or(true),
            headers: dedup_header_names(entry.headers.unwrap_or_default()),
        })
    }
}

/// Parse a JSON configuration document.
pub fn parse_json(text: &str) -> ConfigResult<ConfigDocument> {
    Ok(serde_json::from_str(text)?)
}

/// Validate a document and turn it into a name → configuration map.
///
/// Fails on unnamed entries, duplicate names and more than one entry claiming
/// [`DEFAULT_CONFIGURATION_NAME`]. When no entry claims the default name, one
/// is synthesized with the built-in defaults.
pub fn build_configuration_map(
    document: ConfigDocument,
) -> ConfigResult<HashMap<String, Configuration>> {
    let mut map = HashMap::with_capacity(document.configurations.len() + 1);

    for entry in document.configurations {
        let config = Configuration::try_from(entry)?;
        if map.contains_key(&config.name) {
            return Err(if config.name == DEFAULT_CONFIGURATION_NAME {
                ConfigError::DuplicateDefault(config.name)
            } else {
                ConfigError::DuplicateName(config.name)
            });
        }
        map.insert(config.name.clone(), config);
    }

    map.entry(DEFAULT_CONFIGURATION_NAME.to_owned())
        .or_insert_with(Configuration::default);

    Ok(map)
}

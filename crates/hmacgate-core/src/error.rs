//! Error types for configuration loading and reloading.

use std::io;

/// Errors raised while reading or parsing a configuration source.
///
/// A reload that fails with any of these variants is discarded as a whole; the
/// previously active snapshot stays in place.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The JSON document is malformed.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// An error from the underlying quick-xml library.
    #[error("XML processing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The XML document is structurally invalid.
    #[error("invalid XML configuration: {0}")]
    XmlStructure(String),

    /// A field carries a value that cannot be interpreted.
    #[error("invalid value for `{field}`: {value}")]
    InvalidValue {
        /// Wire name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A configuration entry has no name.
    #[error("configuration entry without a name")]
    MissingName,

    /// Two entries in one source share a name.
    #[error("duplicate configuration name: {0}")]
    DuplicateName(String),

    /// More than one entry claims the default name.
    #[error("more than one configuration claims the default name `{0}`")]
    DuplicateDefault(String),

    /// The file extension does not map to a known document format.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// The file system watch could not be established.
    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Convenience result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

//! The signing/validation parameter set.
//!
//! A [`Configuration`] is a plain owned value: every clone is a deep copy, so a
//! snapshot handed out by the store can be mutated freely without touching the
//! store or any other caller.

use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::encoding::CharacterEncoding;

/// Name under which the default configuration is stored.
pub const DEFAULT_CONFIGURATION_NAME: &str = "Default";

/// Default header carrying the caller's username.
pub const DEFAULT_USER_HEADER_NAME: &str = "X-Auth-User";

/// Default token preceding the signature in the `Authorization` header.
pub const DEFAULT_AUTHORIZATION_SCHEME: &str = "HMAC";

/// Default separator between canonicalized fields.
pub const DEFAULT_SIGNATURE_DATA_SEPARATOR: &str = "\n";

/// Default HMAC variant.
pub const DEFAULT_HMAC_ALGORITHM: &str = "HMACSHA512";

/// Default replay window.
pub const DEFAULT_MAX_REQUEST_AGE: Duration = Duration::from_secs(300);

/// Parameters governing canonicalization, signing and validation.
///
/// # Examples
///
/// ```
/// use hmacgate_core::Configuration;
///
/// let config = Configuration::builder()
///     .name("api".to_owned())
///     .headers(vec!["X-Request-Id".to_owned()])
///     .build();
/// assert_eq!(config.authorization_scheme, "HMAC");
/// assert!(config.sign_request_uri);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Configuration {
    /// Identifier, unique within a store.
    #[builder(default = DEFAULT_CONFIGURATION_NAME.to_owned())]
    pub name: String,

    /// Header carrying the caller's username. `None` or empty means no username
    /// is required.
    #[builder(default = Some(DEFAULT_USER_HEADER_NAME.to_owned()))]
    pub user_header_name: Option<String>,

    /// Token preceding the signature in the `Authorization` header.
    #[builder(default = DEFAULT_AUTHORIZATION_SCHEME.to_owned())]
    pub authorization_scheme: String,

    /// Inserted between canonicalized fields before hashing. May be empty.
    #[builder(default = DEFAULT_SIGNATURE_DATA_SEPARATOR.to_owned())]
    pub signature_data_separator: String,

    /// Encoding used to turn the key and representation into bytes.
    #[builder(default = Some(CharacterEncoding::Utf8))]
    pub character_encoding: Option<CharacterEncoding>,

    /// Name of the HMAC variant, resolved when a signature is computed.
    #[builder(default = DEFAULT_HMAC_ALGORITHM.to_owned())]
    pub hmac_algorithm: String,

    /// Maximum tolerated request age; `None` disables the timestamp check.
    #[builder(default = Some(DEFAULT_MAX_REQUEST_AGE))]
    pub max_request_age: Option<Duration>,

    /// Whether the absolute request URI is part of the signed representation.
    #[builder(default = true)]
    pub sign_request_uri: bool,

    /// Whether the body is checked against the `Content-MD5` header.
    #[builder(default = true)]
    pub validate_content_md5: bool,

    /// Additional headers folded into the signature.
    #[builder(default, setter(transform = |names: Vec<String>| dedup_header_names(names)))]
    pub headers: Vec<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Configuration {
    /// A configuration with the built-in defaults under the given name.
    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self::builder().name(name.into()).build()
    }

    /// The username header, if one is configured and non-empty.
    #[must_use]
    pub fn user_header(&self) -> Option<&str> {
        self.user_header_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Add a header to the signed set unless an equal name (ignoring case) is
    /// already present. Returns whether the header was added.
    pub fn add_header(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            return false;
        }
        self.headers.push(name.to_owned());
        true
    }

    /// Remove a header from the signed set, ignoring case.
    pub fn remove_header(&mut self, name: &str) -> bool {
        let before = self.headers.len();
        self.headers.retain(|h| !h.eq_ignore_ascii_case(name.trim()));
        self.headers.len() != before
    }
}

/// Trim header names and drop empty names and case-insensitive repeats, keeping
/// the first occurrence of each.
#[must_use]
pub fn dedup_header_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !result.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            result.push(name.to_owned());
        }
    }
    result
}

//! Signature data extraction and HMAC signature computation.
//!
//! Signing is a two-step pipeline:
//!
//! 1. [`extract_signature_data`] projects a [`RequestView`] onto a
//!    [`SignatureData`] using the active [`Configuration`] and resolves the key
//!    through a [`KeyRepository`].
//! 2. [`compute_signature`] joins the fields into the representation string
//!    with the configured separator and returns the base64 HMAC of it.
//!
//! The representation has a fixed field order:
//!
//! ```text
//! METHOD
//! Content-MD5
//! Content-Type
//! Date
//! Username
//! canonical headers
//! absolute URI            (only when the URI is signed)
//! ```
//!
//! [`sign_request`] runs both steps over an outgoing [`http::Request`] and
//! attaches the `Date`, `Content-MD5` and `Authorization` headers.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmacgate_core::{CharacterEncoding, Configuration};
use http::header::{AUTHORIZATION, DATE, HeaderName, HeaderValue};
use md5::{Digest, Md5};
use tracing::debug;

use crate::algorithm::HmacAlgorithm;
use crate::canonical::canonicalize_headers;
use crate::error::{AuthError, AuthResult};
use crate::keys::KeyRepository;
use crate::request::{RequestView, format_http_date};

/// Name of the body digest header.
pub const CONTENT_MD5: &str = "content-md5";

/// The extracted, not yet hashed, request representation.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignatureData {
    /// Shared secret resolved for the caller.
    pub key: Option<String>,
    /// HTTP method, uppercased.
    pub http_method: String,
    /// Advertised base64 MD5 of the body.
    pub content_md5: Option<String>,
    /// Advertised content type.
    pub content_type: Option<String>,
    /// Request timestamp in the `Date` header wire format.
    pub date: Option<String>,
    /// Caller's username, taken from the configured user header.
    pub username: Option<String>,
    /// Absolute request URI, present only when the URI is signed.
    pub request_uri: Option<String>,
    /// Headers selected for canonicalization, with all their values.
    pub headers: Vec<(String, Vec<String>)>,
}

impl fmt::Debug for SignatureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureData")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("http_method", &self.http_method)
            .field("content_md5", &self.content_md5)
            .field("content_type", &self.content_type)
            .field("date", &self.date)
            .field("username", &self.username)
            .field("request_uri", &self.request_uri)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Populate [`SignatureData`] from a request.
///
/// # Errors
///
/// Returns [`AuthError::KeyRepository`] when the key lookup fails.
pub fn extract_signature_data<R: RequestView + ?Sized>(
    request: &R,
    config: &Configuration,
    keys: &dyn KeyRepository,
) -> AuthResult<SignatureData> {
    let username = config
        .user_header()
        .and_then(|header| request.header(header));

    let key = keys
        .get_key(username.as_deref())
        .map_err(|e| AuthError::KeyRepository(e.into()))?;

    let headers = config
        .headers
        .iter()
        .filter_map(|name| {
            request
                .header_values(name)
                .map(|values| (name.clone(), values))
        })
        .collect();

    Ok(SignatureData {
        key,
        http_method: request.method().to_uppercase(),
        content_md5: request.content_md5(),
        content_type: request.content_type(),
        date: request.date().map(|date| format_http_date(&date)),
        username,
        request_uri: if config.sign_request_uri {
            request.absolute_uri()
        } else {
            None
        },
        headers,
    })
}

/// Join the signature fields into the string that gets hashed.
#[must_use]
pub fn build_representation(data: &SignatureData, config: &Configuration) -> String {
    let separator = config.signature_data_separator.as_str();
    let canonical_headers = canonicalize_headers(&data.headers, separator);

    let mut fields: Vec<&str> = vec![
        data.http_method.as_str(),
        data.content_md5.as_deref().unwrap_or_default(),
        data.content_type.as_deref().unwrap_or_default(),
        data.date.as_deref().unwrap_or_default(),
        data.username.as_deref().unwrap_or_default(),
        canonical_headers.as_str(),
    ];
    if config.sign_request_uri {
        fields.push(data.request_uri.as_deref().unwrap_or_default());
    }
    fields.join(separator)
}

/// Compute the base64 HMAC signature of `data`.
///
/// # Errors
///
/// - [`AuthError::MissingKey`] if the key is absent or empty
/// - [`AuthError::Configuration`] if no character encoding is configured
/// - [`AuthError::UnsupportedAlgorithm`] if the algorithm name is unknown
///
/// # Examples
///
/// ```
/// use hmacgate_auth::signer::{SignatureData, compute_signature};
/// use hmacgate_core::Configuration;
///
/// let data = SignatureData {
///     key: Some("TestKey".to_owned()),
///     http_method: "GET".to_owned(),
///     ..SignatureData::default()
/// };
/// let signature = compute_signature(&data, &Configuration::default()).unwrap();
/// assert_eq!(signature.len(), 88);
/// ```
pub fn compute_signature(data: &SignatureData, config: &Configuration) -> AuthResult<String> {
    let key = data
        .key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or(AuthError::MissingKey)?;
    let encoding = config.character_encoding.ok_or_else(|| {
        AuthError::Configuration(format!(
            "character encoding is not set for configuration {}",
            config.name
        ))
    })?;
    let algorithm: HmacAlgorithm = config.hmac_algorithm.parse()?;

    let representation = build_representation(data, config);
    debug!(
        configuration = %config.name,
        algorithm = %algorithm,
        representation,
        "Built signature representation"
    );

    let mac = algorithm.compute(&encoding.encode(key), &encoding.encode(&representation))?;
    Ok(BASE64.encode(mac))
}

/// Format the `Authorization` header value.
#[must_use]
pub fn build_authorization_value(scheme: &str, signature: &str) -> String {
    format!("{scheme} {signature}")
}

/// Split an `Authorization` header value into scheme and signature on the
/// first space. Both parts must be non-empty; nothing else is trimmed, so any
/// extra whitespace stays part of the signature token.
#[must_use]
pub fn parse_authorization_value(value: &str) -> Option<(&str, &str)> {
    let (scheme, signature) = value.split_once(' ')?;
    if scheme.is_empty() || signature.is_empty() {
        return None;
    }
    Some((scheme, signature))
}

/// MD5 digest of a byte buffer.
#[must_use]
pub fn compute_content_hash(content: &[u8]) -> Vec<u8> {
    Md5::digest(content).to_vec()
}

/// Base64 MD5 digest of a byte buffer, as carried in `Content-MD5`.
///
/// # Examples
///
/// ```
/// use hmacgate_auth::signer::compute_content_hash_base64;
///
/// assert_eq!(compute_content_hash_base64(b"hello"), "XUFAKrxLKna5cZ2REBfFkg==");
/// ```
#[must_use]
pub fn compute_content_hash_base64(content: &[u8]) -> String {
    BASE64.encode(compute_content_hash(content))
}

/// MD5 digest of `text` converted to bytes with `encoding`.
#[must_use]
pub fn compute_content_hash_str(text: &str, encoding: CharacterEncoding) -> Vec<u8> {
    compute_content_hash(&encoding.encode(text))
}

/// MD5 digest of everything `reader` yields from its current position.
///
/// # Errors
///
/// Returns [`AuthError::Io`] if reading fails.
pub fn compute_content_hash_reader<R: Read>(reader: &mut R) -> AuthResult<Vec<u8>> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

/// MD5 digest of a seekable stream, hashed from its beginning.
///
/// # Errors
///
/// Returns [`AuthError::Io`] if seeking or reading fails.
pub fn compute_content_hash_seekable<R: Read + Seek>(reader: &mut R) -> AuthResult<Vec<u8>> {
    reader.seek(SeekFrom::Start(0))?;
    compute_content_hash_reader(reader)
}

/// Sign an outgoing request in place, using the current time for a missing
/// `Date` header. Returns the signature.
///
/// # Errors
///
/// See [`sign_request_at`].
pub fn sign_request<B: AsRef<[u8]>>(
    request: &mut http::Request<B>,
    config: &Configuration,
    keys: &dyn KeyRepository,
) -> AuthResult<String> {
    sign_request_at(request, config, keys, Utc::now())
}

/// Sign an outgoing request in place.
///
/// Adds `Date` (set to `now`) and, for non-empty bodies, `Content-MD5` when the
/// request does not carry them yet, then computes the signature and sets the
/// `Authorization` header.
///
/// # Errors
///
/// Returns an error if the key cannot be resolved, the configuration cannot
/// produce a signature, or a header value cannot be represented.
pub fn sign_request_at<B: AsRef<[u8]>>(
    request: &mut http::Request<B>,
    config: &Configuration,
    keys: &dyn KeyRepository,
    now: DateTime<Utc>,
) -> AuthResult<String> {
    if !request.headers().contains_key(DATE) {
        let date = header_value(&format_http_date(&now))?;
        request.headers_mut().insert(DATE, date);
    }
    if !request.body().as_ref().is_empty() && !request.headers().contains_key(CONTENT_MD5) {
        let md5 = header_value(&compute_content_hash_base64(request.body().as_ref()))?;
        request
            .headers_mut()
            .insert(HeaderName::from_static(CONTENT_MD5), md5);
    }

    let data = extract_signature_data(&*request, config, keys)?;
    let signature = compute_signature(&data, config)?;
    let authorization = header_value(&build_authorization_value(
        &config.authorization_scheme,
        &signature,
    ))?;
    request.headers_mut().insert(AUTHORIZATION, authorization);

    debug!(
        configuration = %config.name,
        method = %data.http_method,
        username = ?data.username,
        "Signed request"
    );
    Ok(signature)
}

fn header_value(value: &str) -> AuthResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AuthError::InvalidArgument(format!("invalid header value {value:?}: {e}")))
}

//! Request validation.
//!
//! [`Validator::validate`] runs a fixed sequence of checks and stops at the
//! first failure:
//!
//! 1. timestamp present and within the replay window
//! 2. username present (when a user header is configured)
//! 3. key resolved
//! 4. body matches `Content-MD5` (when enabled)
//! 5. `Authorization` header present and well formed
//! 6. signature matches
//!
//! A rejected request is an ordinary [`ValidationResult`]; only faults such as
//! an unusable configuration surface as [`AuthError`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use hmacgate_core::Configuration;
use http::StatusCode;
use http::header::WWW_AUTHENTICATE;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::keys::KeyRepository;
use crate::request::RequestView;
use crate::signer::{
    compute_content_hash_base64, compute_signature, extract_signature_data,
    parse_authorization_value,
};

/// Outcome of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationResultCode {
    /// The request is authentic.
    Ok,
    /// No usable `Date` header although a replay window is configured.
    DateMissing,
    /// The timestamp is older than the replay window allows.
    DateInvalid,
    /// The configured user header is absent or empty.
    UsernameMissing,
    /// No key is known for the caller.
    KeyMissing,
    /// The body is non-empty but no `Content-MD5` was sent.
    BodyHashMissing,
    /// The advertised `Content-MD5` does not match the body.
    BodyHashMismatch,
    /// No `Authorization` header.
    AuthorizationMissing,
    /// The `Authorization` header is malformed or uses another scheme.
    AuthorizationInvalid,
    /// The signature does not match the request.
    SignatureMismatch,
}

impl ValidationResultCode {
    /// Name of the code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::DateMissing => "DateMissing",
            Self::DateInvalid => "DateInvalid",
            Self::UsernameMissing => "UsernameMissing",
            Self::KeyMissing => "KeyMissing",
            Self::BodyHashMissing => "BodyHashMissing",
            Self::BodyHashMismatch => "BodyHashMismatch",
            Self::AuthorizationMissing => "AuthorizationMissing",
            Self::AuthorizationInvalid => "AuthorizationInvalid",
            Self::SignatureMismatch => "SignatureMismatch",
        }
    }
}

impl fmt::Display for ValidationResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result code plus an optional human-readable message. `Ok` carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    code: ValidationResultCode,
    message: Option<String>,
}

impl ValidationResult {
    /// A successful validation.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: ValidationResultCode::Ok,
            message: None,
        }
    }

    /// A failed validation.
    #[must_use]
    pub fn failure(code: ValidationResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// The result code.
    #[must_use]
    pub fn code(&self) -> ValidationResultCode {
        self.code
    }

    /// The failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether the request was accepted.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == ValidationResultCode::Ok
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Validates signed requests against a [`Configuration`].
#[derive(Clone)]
pub struct Validator {
    keys: Arc<dyn KeyRepository>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Validator {
    /// Create a validator resolving keys through `keys`.
    pub fn new(keys: Arc<dyn KeyRepository>) -> Self {
        Self { keys }
    }

    /// Validate `request` against `config` at the current time.
    ///
    /// # Errors
    ///
    /// Returns an error only for faults: a failing key repository or a
    /// configuration that cannot compute a signature.
    pub fn validate<R: RequestView + ?Sized>(
        &self,
        request: &R,
        config: &Configuration,
    ) -> AuthResult<ValidationResult> {
        self.validate_at(request, config, Utc::now())
    }

    /// Validate `request` against `config` as if the current time were `now`.
    ///
    /// The replay window only bounds staleness: a timestamp later than `now` is
    /// accepted.
    ///
    /// # Errors
    ///
    /// See [`Validator::validate`].
    pub fn validate_at<R: RequestView + ?Sized>(
        &self,
        request: &R,
        config: &Configuration,
        now: DateTime<Utc>,
    ) -> AuthResult<ValidationResult> {
        if let Some(max_age) = config.max_request_age {
            let Some(date) = request.date() else {
                return Ok(reject(
                    config,
                    ValidationResultCode::DateMissing,
                    "request has no valid Date header",
                ));
            };
            let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
            // An overflowing deadline lies beyond any representable `now`.
            if date.checked_add_signed(max_age).is_some_and(|deadline| now > deadline) {
                return Ok(reject(
                    config,
                    ValidationResultCode::DateInvalid,
                    format!("request date {date} is older than {}s", max_age.num_seconds()),
                ));
            }
        }

        let data = extract_signature_data(request, config, self.keys.as_ref())?;

        if config.user_header().is_some() && data.username.as_deref().is_none_or(str::is_empty) {
            return Ok(reject(
                config,
                ValidationResultCode::UsernameMissing,
                "request has no username",
            ));
        }

        if data.key.as_deref().is_none_or(str::is_empty) {
            return Ok(reject(
                config,
                ValidationResultCode::KeyMissing,
                "no key is known for the caller",
            ));
        }

        if config.validate_content_md5 {
            if let Some(result) = check_content_md5(request, config) {
                return Ok(result);
            }
        }

        if config.authorization_scheme.is_empty() {
            return Err(AuthError::Configuration(format!(
                "authorization scheme is not set for configuration {}",
                config.name
            )));
        }
        let Some(authorization) = request
            .header("authorization")
            .filter(|value| !value.trim().is_empty())
        else {
            return Ok(reject(
                config,
                ValidationResultCode::AuthorizationMissing,
                "request has no Authorization header",
            ));
        };
        let Some((scheme, signature)) = parse_authorization_value(&authorization) else {
            return Ok(reject(
                config,
                ValidationResultCode::AuthorizationInvalid,
                "Authorization header is malformed",
            ));
        };
        if scheme != config.authorization_scheme {
            return Ok(reject(
                config,
                ValidationResultCode::AuthorizationInvalid,
                format!("unexpected authorization scheme {scheme}"),
            ));
        }

        let expected = compute_signature(&data, config)?;
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return Ok(reject(
                config,
                ValidationResultCode::SignatureMismatch,
                "signature does not match the request",
            ));
        }

        debug!(
            configuration = %config.name,
            username = ?data.username,
            "Request signature verified"
        );
        Ok(ValidationResult::ok())
    }
}

fn check_content_md5<R: RequestView + ?Sized>(
    request: &R,
    config: &Configuration,
) -> Option<ValidationResult> {
    let advertised = request.content_md5().filter(|value| !value.is_empty());
    let content = request.content();

    match advertised {
        None if content.is_empty() => None,
        None => Some(reject(
            config,
            ValidationResultCode::BodyHashMissing,
            "request body has no Content-MD5",
        )),
        Some(_) if content.is_empty() => Some(reject(
            config,
            ValidationResultCode::BodyHashMismatch,
            "Content-MD5 sent for an empty body",
        )),
        Some(advertised) => {
            let actual = compute_content_hash_base64(content);
            (advertised != actual).then(|| {
                reject(
                    config,
                    ValidationResultCode::BodyHashMismatch,
                    "Content-MD5 does not match the request body",
                )
            })
        }
    }
}

fn reject(
    config: &Configuration,
    code: ValidationResultCode,
    message: impl Into<String>,
) -> ValidationResult {
    let result = ValidationResult::failure(code, message);
    debug!(
        configuration = %config.name,
        code = %code,
        message = result.message(),
        "Request rejected"
    );
    result
}

/// Build the `401 Unauthorized` response sent for a rejected request.
///
/// # Errors
///
/// Returns [`AuthError::InvalidArgument`] if `www_authenticate` is not a valid
/// header value.
pub fn unauthorized_response(www_authenticate: &str) -> AuthResult<http::Response<()>> {
    http::Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(WWW_AUTHENTICATE, www_authenticate)
        .body(())
        .map_err(|e| AuthError::InvalidArgument(format!("invalid WWW-Authenticate value: {e}")))
}

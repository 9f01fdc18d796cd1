//! HMAC request signing and signature validation.
//!
//! This crate signs outgoing HTTP requests and validates inbound ones against a
//! shared secret. The signed representation covers the method, body digest,
//! content type, timestamp, username, a canonical form of selected headers and
//! optionally the absolute URI; the behavior is driven by a
//! [`Configuration`](hmacgate_core::Configuration) from `hmacgate-core`.
//!
//! # Modules
//!
//! - [`algorithm`] - HMAC variants selectable by name
//! - [`canonical`] - Canonical header string
//! - [`error`] - Error types for signing and validation
//! - [`keys`] - Key repository trait and in-memory implementations
//! - [`request`] - The [`RequestView`] abstraction and `http` adapter
//! - [`signer`] - Signature data extraction, signature and content hashes
//! - [`validator`] - Ordered request validation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use hmacgate_auth::{SingleKeyRepository, Validator, sign_request};
//! use hmacgate_core::Configuration;
//!
//! let config = Configuration::builder().user_header_name(None).build();
//! let keys = Arc::new(SingleKeyRepository::new("secret"));
//!
//! let mut request = http::Request::builder()
//!     .method("PUT")
//!     .uri("http://api.example.com/items/1")
//!     .body(b"{\"id\":1}".to_vec())
//!     .unwrap();
//! sign_request(&mut request, &config, keys.as_ref()).unwrap();
//!
//! let result = Validator::new(keys).validate(&request, &config).unwrap();
//! assert!(result.is_ok());
//! ```

pub mod algorithm;
pub mod canonical;
pub mod error;
pub mod keys;
pub mod request;
pub mod signer;
pub mod validator;

pub use algorithm::HmacAlgorithm;
pub use canonical::canonicalize_headers;
pub use error::{AuthError, AuthResult};
pub use keys::{KeyRepository, SingleKeyRepository, SingleUserKeyRepository, StaticKeyRepository};
pub use request::RequestView;
pub use signer::{
    SignatureData, build_authorization_value, compute_content_hash, compute_content_hash_base64,
    compute_signature, extract_signature_data, sign_request, sign_request_at,
};
pub use validator::{ValidationResult, ValidationResultCode, Validator, unauthorized_response};

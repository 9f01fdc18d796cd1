//! Configuration model and hot-reloadable store for HMAC request signing.
//!
//! Every signing and validation decision is driven by a [`Configuration`]:
//! algorithm, character encoding, field separator, replay window and which
//! headers take part in the signature. This crate provides that model, the
//! declarative document formats it is loaded from, and [`ConfigStore`], which
//! serves snapshots to concurrent callers while being reloaded from a string,
//! a file, an already parsed section, or a watched file.
//!
//! # Modules
//!
//! - [`config`] - The [`Configuration`] type and its built-in defaults
//! - [`document`] - Source documents, JSON parsing and map construction
//! - [`encoding`] - Character encodings used to turn text into bytes
//! - [`error`] - Configuration error types
//! - [`store`] - The [`ConfigStore`] and its reload semantics
//! - [`watcher`] - Debounced file watch driving reloads
//! - [`xml`] - XML document parsing

pub mod config;
pub mod document;
pub mod encoding;
pub mod error;
pub mod store;
pub mod watcher;
pub mod xml;

pub use config::{Configuration, DEFAULT_CONFIGURATION_NAME};
pub use document::{ConfigDocument, ConfigEntry, ConfigFormat};
pub use encoding::CharacterEncoding;
pub use error::{ConfigError, ConfigResult};
pub use store::{ConfigStore, ErrorHandler};

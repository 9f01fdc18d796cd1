//! XML configuration documents.
//!
//! ```xml
//! <hmacAuthentication>
//!   <configuration>
//!     <name>Default</name>
//!     <authorizationScheme>HMAC</authorizationScheme>
//!     <signatureDataSeparator>&#10;</signatureDataSeparator>
//!     <maxRequestAge>300</maxRequestAge>
//!     <headers>
//!       <header>X-Custom-Header</header>
//!     </headers>
//!   </configuration>
//! </hmacAuthentication>
//! ```
//!
//! Child element names match the JSON field names; unknown elements are
//! skipped together with their children. Text content is trimmed for every
//! field except `signatureDataSeparator`, which is taken verbatim. An empty
//! `<maxRequestAge/>` disables the replay window.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::document::{ConfigDocument, ConfigEntry};
use crate::error::{ConfigError, ConfigResult};

/// Parse an XML configuration document.
pub fn parse_xml(text: &str) -> ConfigResult<ConfigDocument> {
    let mut reader = Reader::from_str(text);

    // Skip the XML declaration and find the root element.
    loop {
        match reader.read_event()? {
            Event::Start(_) => return read_document(&mut reader),
            Event::Empty(_) => return Ok(ConfigDocument::default()),
            Event::Eof => {
                return Err(ConfigError::XmlStructure("missing root element".to_owned()));
            }
            _ => {}
        }
    }
}

fn read_document(reader: &mut Reader<&[u8]>) -> ConfigResult<ConfigDocument> {
    let mut document = ConfigDocument::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if tag_name(e.name().as_ref())? == "configuration" {
                    document.configurations.push(read_entry(reader)?);
                } else {
                    skip_element(reader)?;
                }
            }
            Event::Empty(e) => {
                if tag_name(e.name().as_ref())? == "configuration" {
                    document.configurations.push(ConfigEntry::default());
                }
            }
            Event::End(_) => return Ok(document),
            Event::Eof => return Err(unexpected_eof("document")),
            _ => {}
        }
    }
}

fn read_entry(reader: &mut Reader<&[u8]>) -> ConfigResult<ConfigEntry> {
    let mut entry = ConfigEntry::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = tag_name(e.name().as_ref())?.to_owned();
                if name == "headers" {
                    entry.headers = Some(read_headers(reader)?);
                } else if FIELDS.contains(&name.as_str()) {
                    let text = read_text_content(reader)?;
                    apply_field(&mut entry, &name, text)?;
                } else {
                    tracing::debug!(element = %name, "Ignoring unknown configuration element");
                    skip_element(reader)?;
                }
            }
            Event::Empty(e) => {
                let name = tag_name(e.name().as_ref())?.to_owned();
                if name == "headers" {
                    entry.headers = Some(Vec::new());
                } else {
                    apply_field(&mut entry, &name, String::new())?;
                }
            }
            Event::End(_) => return Ok(entry),
            Event::Eof => return Err(unexpected_eof("configuration")),
            _ => {}
        }
    }
}

fn read_headers(reader: &mut Reader<&[u8]>) -> ConfigResult<Vec<String>> {
    let mut headers = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if tag_name(e.name().as_ref())? == "header" {
                    headers.push(read_text_content(reader)?.trim().to_owned());
                } else {
                    skip_element(reader)?;
                }
            }
            Event::End(_) => return Ok(headers),
            Event::Eof => return Err(unexpected_eof("headers")),
            _ => {}
        }
    }
}

/// Scalar child elements of `<configuration>`.
const FIELDS: &[&str] = &[
    "name",
    "userHeaderName",
    "authorizationScheme",
    "signatureDataSeparator",
    "characterEncoding",
    "hmacAlgorithm",
    "maxRequestAge",
    "signRequestUri",
    "validateContentMd5",
];

fn apply_field(entry: &mut ConfigEntry, name: &str, text: String) -> ConfigResult<()> {
    if name == "signatureDataSeparator" {
        entry.signature_data_separator = Some(text);
        return Ok(());
    }

    let text = text.trim().to_owned();
    match name {
        "name" => entry.name = Some(text),
        "userHeaderName" => entry.user_header_name = Some(text),
        "authorizationScheme" => entry.authorization_scheme = Some(text),
        "characterEncoding" => entry.character_encoding = Some(text),
        "hmacAlgorithm" => entry.hmac_algorithm = Some(text),
        "maxRequestAge" => {
            entry.max_request_age = Some(if text.is_empty() {
                None
            } else {
                Some(text.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "maxRequestAge",
                    value: text.clone(),
                })?)
            });
        }
        "signRequestUri" => entry.sign_request_uri = Some(parse_bool("signRequestUri", &text)?),
        "validateContentMd5" => {
            entry.validate_content_md5 = Some(parse_bool("validateContentMd5", &text)?);
        }
        _ => {}
    }
    Ok(())
}

/// Read the text content of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> ConfigResult<String> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| ConfigError::XmlStructure(err.to_string()))?;
                text.push_str(&decoded);
            }
            Event::CData(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| ConfigError::XmlStructure(err.to_string()))?;
                text.push_str(&decoded);
            }
            Event::GeneralRef(e) => {
                let resolved = e
                    .resolve_char_ref()
                    .map_err(|err| ConfigError::XmlStructure(err.to_string()))?;
                if let Some(ch) = resolved {
                    text.push(ch);
                } else {
                    let entity = e
                        .decode()
                        .map_err(|err| ConfigError::XmlStructure(err.to_string()))?;
                    let value = quick_xml::escape::resolve_predefined_entity(&entity)
                        .ok_or_else(|| {
                            ConfigError::XmlStructure(format!("unknown entity: &{entity};"))
                        })?;
                    text.push_str(value);
                }
            }
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(unexpected_eof("text content")),
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> ConfigResult<()> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => return Err(unexpected_eof("skipped element")),
            _ => {}
        }
    }
}

fn tag_name(raw: &[u8]) -> ConfigResult<&str> {
    std::str::from_utf8(raw).map_err(|e| ConfigError::XmlStructure(e.to_string()))
}

fn parse_bool(field: &'static str, text: &str) -> ConfigResult<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field,
            value: text.to_owned(),
        }),
    }
}

fn unexpected_eof(context: &str) -> ConfigError {
    ConfigError::XmlStructure(format!("unexpected EOF in {context}"))
}

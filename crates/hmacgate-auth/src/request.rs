//! Read-only view of a request for signing and validation.
//!
//! [`RequestView`] is the only thing the pipeline needs from a request: method,
//! absolute URI, headers, timestamp and content. It is implemented for
//! [`http::Request`] with any byte-like body, which covers both outgoing client
//! requests and inbound server requests built on the `http` crate; any other
//! request type can plug in by implementing the trait.

use chrono::{DateTime, Utc};

/// Wire format of the `Date` header (RFC 1123, English names, always GMT).
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Projection of a request onto the fields the signing pipeline reads.
pub trait RequestView {
    /// The HTTP method as sent.
    fn method(&self) -> &str;

    /// The absolute request URI, if it can be determined.
    fn absolute_uri(&self) -> Option<String>;

    /// All values of the header `name`, matched case-insensitively, in the
    /// order they appear. `None` when the header is absent.
    fn header_values(&self, name: &str) -> Option<Vec<String>>;

    /// The request body.
    fn content(&self) -> &[u8];

    /// The first value of the header `name`.
    fn header(&self, name: &str) -> Option<String> {
        self.header_values(name)
            .and_then(|values| values.into_iter().next())
    }

    /// The parsed `Date` header.
    fn date(&self) -> Option<DateTime<Utc>> {
        self.header("date").and_then(|value| parse_http_date(&value))
    }

    /// The `Content-Type` header.
    fn content_type(&self) -> Option<String> {
        self.header("content-type")
    }

    /// The `Content-MD5` header.
    fn content_md5(&self) -> Option<String> {
        self.header("content-md5")
    }
}

impl<B: AsRef<[u8]>> RequestView for http::Request<B> {
    fn method(&self) -> &str {
        self.method().as_str()
    }

    fn absolute_uri(&self) -> Option<String> {
        let uri = self.uri();
        if uri.scheme().is_some() && uri.authority().is_some() {
            return Some(uri.to_string());
        }

        // Server-side requests usually carry an origin-form target; rebuild the
        // absolute form from the Host header.
        let host = RequestView::header(self, "host")?;
        let path = uri.path_and_query().map_or("/", http::uri::PathAndQuery::as_str);
        let scheme = uri.scheme_str().unwrap_or("http");
        Some(format!("{scheme}://{host}{path}"))
    }

    fn header_values(&self, name: &str) -> Option<Vec<String>> {
        let values: Vec<String> = self
            .headers()
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        if values.is_empty() { None } else { Some(values) }
    }

    fn content(&self) -> &[u8] {
        self.body().as_ref()
    }
}

/// Format a timestamp for the `Date` header.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use hmacgate_auth::request::format_http_date;
///
/// let date = Utc.with_ymd_and_hms(2015, 12, 30, 12, 30, 45).unwrap();
/// assert_eq!(format_http_date(&date), "Wed, 30 Dec 2015 12:30:45 GMT");
/// ```
#[must_use]
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse a `Date` header value, normalizing to UTC.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

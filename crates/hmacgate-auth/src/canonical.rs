//! Canonical form of the signed header set.
//!
//! The canonical string is independent of transport-level noise: header name
//! case, header order, and runs of whitespace inside values. Each header is
//! rendered as `name:value1,value2`, the rendered lines are sorted ordinally
//! and joined with the configured separator.
//!
//! ```text
//! X-Custom-Test-Header-2:  Test2       x-custom-test-header-1:Test1
//! X-Custom-Test-Header-1: Test1   =>   x-custom-test-header-2: Test2
//! ```

use std::collections::BTreeMap;

/// Build the canonical string for a header multimap.
///
/// Header names are trimmed and lowercased; entries whose names normalize to
/// the same value are merged, keeping values in encounter order. Every value
/// has each run of whitespace (leading and trailing runs included) collapsed
/// into a single space. A header with no values renders as `name:`.
///
/// # Examples
///
/// ```
/// use hmacgate_auth::canonical::canonicalize_headers;
///
/// let headers = vec![
///     ("X-B".to_owned(), vec!["2".to_owned()]),
///     ("x-a".to_owned(), vec!["1".to_owned(), "one  more".to_owned()]),
/// ];
/// assert_eq!(canonicalize_headers(&headers, "\n"), "x-a:1,one more\nx-b:2");
/// ```
#[must_use]
pub fn canonicalize_headers<N, V>(headers: &[(N, Vec<V>)], separator: &str) -> String
where
    N: AsRef<str>,
    V: AsRef<str>,
{
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, values) in headers {
        let name = name.as_ref().trim().to_lowercase();
        merged
            .entry(name)
            .or_default()
            .extend(values.iter().map(|value| collapse_whitespace(value.as_ref())));
    }

    // Sort the rendered lines, not the names: `x-a-b:` orders before `x-a:`.
    let mut lines: Vec<String> = merged
        .into_iter()
        .map(|(name, values)| format!("{name}:{}", values.join(",")))
        .collect();
    lines.sort_unstable();
    lines.join(separator)
}

/// Collapse each run of whitespace characters into a single space.
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}

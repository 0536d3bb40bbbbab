//! Header maps as configured by users, and their merge rules.
//!
//! Names are case-insensitive. Inside one layer, names that differ only by
//! case are folded into one header whose values are joined with `", "`.
//! Across layers the call-site layer replaces the client layer.

use http::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;

use crate::error::Error;
use crate::fetch::CallOptions;

/// Header names to values, in insertion order.
pub type Headers = IndexMap<String, String>;

/// Copies the headers of `options`, or returns an empty map.
pub fn get_headers(options: Option<&CallOptions>) -> Headers {
    options
        .map(|options| options.headers.clone())
        .unwrap_or_default()
}

/// Folds several header maps into one with lowercased names.
///
/// A name present more than once, in any casing, keeps every value joined
/// with `", "` in the order given.
///
/// ```
/// use restbox::headers::{Headers, merge_headers};
///
/// let first = Headers::from([("message".to_owned(), "Hello".to_owned())]);
/// let second = Headers::from([("Message".to_owned(), "world!".to_owned())]);
///
/// let merged = merge_headers(&[&first, &second]);
/// assert_eq!(merged["message"], "Hello, world!");
/// ```
pub fn merge_headers(layers: &[&Headers]) -> Headers {
    let mut merged = Headers::new();
    for (name, value) in layers.iter().flat_map(|layer| layer.iter()) {
        merged
            .entry(name.to_ascii_lowercase())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }
    merged
}

/// Headers sent for a call: the folded client layer with every folded
/// call-site header replacing the client value of the same name.
pub fn effective_headers(client: &Headers, call: &Headers) -> Headers {
    let mut headers = merge_headers(&[client]);
    for (name, value) in merge_headers(&[call]) {
        headers.insert(name, value);
    }
    headers
}

/// Media type of the `content-type` header, without parameters.
pub(crate) fn media_type(headers: &Headers) -> Option<String> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(http::header::CONTENT_TYPE.as_str()))
        .map(|(_, value)| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
}

pub(crate) fn to_header_map(headers: &Headers) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let invalid = |source: http::Error| Error::InvalidHeader {
            name: name.clone(),
            source,
        };
        let header_name = HeaderName::try_from(name.as_str()).map_err(|e| invalid(e.into()))?;
        let header_value = HeaderValue::try_from(value.as_str()).map_err(|e| invalid(e.into()))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

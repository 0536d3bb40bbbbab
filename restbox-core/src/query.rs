//! Query parameter values and their query string encodings.
//!
//! Two array encodings are supported:
//!
//! | Encoding | Input | Output |
//! |----------|-------|--------|
//! | comma    | `a = ["1", "2"]` | `a=1%2C2` |
//! | repeat   | `a = ["1", "2"]` | `a=1&a=2` |
//!
//! Keys and values are percent-encoded with everything outside the RFC 3986
//! unreserved set escaped, so a space becomes `%20` rather than `+`.

use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A single query parameter value.
///
/// There is no variant for "undefined": a parameter without a value is simply
/// not inserted into [`QueryParameters`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Renders as `key=`.
    Null,
    /// Renders as `key=true` or `key=false`.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value, rendered in its shortest decimal form.
    Float(f64),
    /// String value, `""` renders as `key=`.
    String(String),
    /// List of values. An empty list renders nothing.
    List(Vec<String>),
}

impl QueryValue {
    /// Text of the value with lists comma-joined, `None` when nothing renders.
    fn joined(&self) -> Option<String> {
        match self {
            QueryValue::Null => Some(String::new()),
            QueryValue::Bool(value) => Some(value.to_string()),
            QueryValue::Int(value) => Some(value.to_string()),
            QueryValue::Float(value) => Some(value.to_string()),
            QueryValue::String(value) => Some(value.clone()),
            QueryValue::List(items) if items.is_empty() => None,
            QueryValue::List(items) => Some(items.join(",")),
        }
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Int(value.into())
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        QueryValue::Int(value.into())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::String(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::String(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(value: Vec<String>) -> Self {
        QueryValue::List(value)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(value: Vec<&str>) -> Self {
        QueryValue::List(value.into_iter().map(str::to_owned).collect())
    }
}

impl<const N: usize> From<[&str; N]> for QueryValue {
    fn from(value: [&str; N]) -> Self {
        QueryValue::List(value.iter().map(|item| (*item).to_owned()).collect())
    }
}

impl From<Vec<i64>> for QueryValue {
    fn from(value: Vec<i64>) -> Self {
        QueryValue::List(value.iter().map(ToString::to_string).collect())
    }
}

impl From<Vec<f64>> for QueryValue {
    fn from(value: Vec<f64>) -> Self {
        QueryValue::List(value.iter().map(ToString::to_string).collect())
    }
}

/// Ordered query parameters. Rendering keeps insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    inner: IndexMap<String, QueryValue>,
}

impl QueryParameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing any previous value for the key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds a parameter only when a value is given.
    ///
    /// Generated clients pass optional API parameters through here so that an
    /// unset parameter leaves no trace in the URL.
    pub fn with_optional<V>(mut self, key: impl Into<String>, value: Option<V>) -> Self
    where
        V: Into<QueryValue>,
    {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Inserts a parameter, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<QueryValue>,
    ) -> Option<QueryValue> {
        self.inner.insert(key.into(), value.into())
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.inner.get(key)
    }

    /// Returns `true` when no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.inner.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Encodes every parameter except `excluded` with comma-joined arrays.
    pub(crate) fn encode_comma_except(&self, excluded: &str) -> String {
        self.iter()
            .filter(|(key, _)| *key != excluded)
            .filter_map(|(key, value)| value.joined().map(|text| pair(key, &text)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParameters
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Encodes a single parameter with one `key=item` pair per list item.
pub(crate) fn encode_repeat(key: &str, value: &QueryValue) -> String {
    match value {
        QueryValue::List(items) => items
            .iter()
            .map(|item| pair(key, item))
            .collect::<Vec<_>>()
            .join("&"),
        scalar => scalar
            .joined()
            .map(|text| pair(key, &text))
            .unwrap_or_default(),
    }
}

fn pair(key: &str, value: &str) -> String {
    format!("{}={}", encode(key), encode(value))
}

fn encode(component: &str) -> String {
    utf8_percent_encode(component, QUERY_COMPONENT).to_string()
}

//! Rendering of request URLs from templated parts.
//!
//! A [`Resource`] holds an unrendered URL: a base URI template, a path
//! template, the parameters for both and the query parameters. Rendering
//! substitutes every `{name}` placeholder verbatim and appends the encoded
//! query string.
//!
//! Arrays in the query string are comma-joined (`{a: [1, 2]}` renders as
//! `a=1%2C2`), except for the `refine` parameter which the target APIs expect
//! in repeated form (`refine=1&refine=2`).
//!
//! ```
//! use restbox_core::{QueryParameters, Resource};
//!
//! let url = Resource::new("https://{host}/api/{version}")
//!     .base_uri_parameters([("host", "example.com"), ("version", "v1")])
//!     .path("/products/{id}")
//!     .path_parameters([("id", "42")])
//!     .query_parameters(QueryParameters::new().with("expand", ["images", "prices"]))
//!     .render()
//!     .unwrap();
//!
//! assert_eq!(url, "https://example.com/api/v1/products/42?expand=images%2Cprices");
//! ```

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ParameterError;
use crate::query::{QueryParameters, encode_repeat};

/// Query parameter rendered with repeated keys instead of a comma list.
const REFINE: &str = "refine";

lazy_static! {
    static ref TEMPLATE_PARAMETER: Regex =
        Regex::new(r"\{([^}]+)\}").expect("template parameter pattern must compile");
}

/// Values for `{name}` placeholders in a base URI or path template.
pub type PathParameters = HashMap<String, String>;

/// An unrendered URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    base_uri: String,
    base_uri_parameters: PathParameters,
    path: String,
    path_parameters: PathParameters,
    query_parameters: QueryParameters,
}

impl Resource {
    /// Creates a resource pointing at `base_uri` with no path and no parameters.
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            ..Self::default()
        }
    }

    /// Creates a resource from all of its parts at once.
    pub fn from_parts(
        base_uri: impl Into<String>,
        base_uri_parameters: PathParameters,
        path: impl Into<String>,
        path_parameters: PathParameters,
        query_parameters: QueryParameters,
    ) -> Self {
        Self {
            base_uri: base_uri.into(),
            base_uri_parameters,
            path: path.into(),
            path_parameters,
            query_parameters,
        }
    }

    /// Sets the parameters substituted into the base URI template.
    pub fn base_uri_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.base_uri_parameters = collect_parameters(parameters);
        self
    }

    /// Sets the path template appended to the base URI.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the parameters substituted into the path template.
    pub fn path_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.path_parameters = collect_parameters(parameters);
        self
    }

    /// Sets the query parameters.
    pub fn query_parameters(mut self, parameters: QueryParameters) -> Self {
        self.query_parameters = parameters;
        self
    }

    /// Renders the final URL.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::MissingPathParameter`] naming the first
    /// placeholder of the base URI or path that has no value.
    pub fn render(&self) -> Result<String, ParameterError> {
        let base_uri = substitute_path_parameters(&self.base_uri, &self.base_uri_parameters)?;
        let path = substitute_path_parameters(&self.path, &self.path_parameters)?;

        let query = [
            self.query_parameters.encode_comma_except(REFINE),
            self.query_parameters
                .get(REFINE)
                .map(|refine| encode_repeat(REFINE, refine))
                .unwrap_or_default(),
        ]
        .into_iter()
        .filter(|encoded| !encoded.is_empty())
        .collect::<Vec<_>>()
        .join("&");

        let mut url = base_uri + &path;
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        Ok(url)
    }

    /// Alias of [`render`](Self::render).
    pub fn to_url(&self) -> Result<String, ParameterError> {
        self.render()
    }
}

/// Replaces every `{name}` in `template` with the matching parameter value.
///
/// Values are inserted as given, without any escaping.
pub fn substitute_path_parameters(
    template: &str,
    parameters: &PathParameters,
) -> Result<String, ParameterError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for captures in TEMPLATE_PARAMETER.captures_iter(template) {
        let (Some(placeholder), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = parameters
            .get(name.as_str())
            .ok_or_else(|| ParameterError::MissingPathParameter(name.as_str().to_owned()))?;
        rendered.push_str(&template[last..placeholder.start()]);
        rendered.push_str(value);
        last = placeholder.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}

fn collect_parameters<I, K, V>(parameters: I) -> PathParameters
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    parameters
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

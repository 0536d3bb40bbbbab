//! Storage key derivation.
//!
//! Every stored request gets its own storage key: the namespace, the method
//! and the full URL, e.g. `restbox:GET https://somewhere/path?page=2`.
//! Responses carrying `Vary` are stored under a variant key, the request key
//! followed by the values of the varying request headers, while the request
//! key itself records which headers select the variant.
//!
//! Serialized URLs never contain a space, so `"<request key> "` is a prefix
//! shared by the variants of one request only.

use http::Method;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "restbox";

/// Storage key of a request.
pub fn storage_key(namespace: &str, method: &Method, url: &str) -> String {
    format!("{}{method} {url}", namespace_prefix(namespace))
}

/// Storage key of the variant of `key` selected by `vary` header values.
pub fn variant_key(key: &str, vary: &[(String, Option<String>)]) -> String {
    let mut variant = format!("{key} ");
    for (index, (name, value)) in vary.iter().enumerate() {
        if index > 0 {
            variant.push('&');
        }
        variant.push_str(name);
        if let Some(value) = value {
            variant.push('=');
            variant.push_str(value);
        }
    }
    variant
}

/// Prefix shared by every key of a namespace.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{namespace}:")
}

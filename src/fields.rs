//! Ordered candidate-key lookup for console responses.
//!
//! The console has renamed several response fields across releases, so each
//! call site lists the names it accepts, most current first. A value only
//! counts when it is present and non-empty.

use serde_json::Value;
use std::collections::BTreeMap;

/// Unique identifier returned by the package upload endpoint
pub const UNIQUE_IDENTIFIER_KEYS: &[&str] = &["unique_identifier", "plugin_unique_identifier"];

/// Installation list returned by the installations lookup endpoint
pub const INSTALLATION_LIST_KEYS: &[&str] = &["plugins", "installations", "data"];

/// Identifier of a single installation record
pub const INSTALLATION_ID_KEYS: &[&str] = &["id", "installation_id"];

/// Session cookie carrying the access token (plain, then `__Host-` secure variant)
pub const ACCESS_TOKEN_COOKIES: &[&str] = &["access_token", "__Host-access_token"];

/// Session cookie carrying the CSRF token
pub const CSRF_TOKEN_COOKIES: &[&str] = &["csrf_token", "__Host-csrf_token"];

/// Whether a JSON value carries anything worth using
fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

/// Return the value of the first candidate key that is present and non-empty.
///
/// Non-object values never match.
pub fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let object = value.as_object()?;
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|candidate| is_meaningful(candidate))
}

/// Like [`first_present`], but renders the match as an identifier string.
///
/// Numeric identifiers are accepted and stringified.
pub fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    match first_present(value, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Return the first cookie from `names` that is set to a non-empty value
pub fn first_cookie<'a>(cookies: &'a BTreeMap<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| cookies.get(*name))
        .map(String::as_str)
        .find(|value| !value.is_empty())
}

//! Field key normalization
//!
//! Backends speak camelCase; older configs were written in snake_case.
//! Normalized maps carry both spellings pointing at the same value so a
//! lookup by the server's field name always succeeds.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Convert a key to camelCase
///
/// Words are split on `_`, `-`, whitespace and case boundaries, so
/// `api_key`, `api-key` and `apiKey` all become `apiKey`, and `useSSL`
/// becomes `useSsl`.
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, word) in split_words(key).iter().enumerate() {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn split_words(key: &str) -> Vec<String> {
    let chars: Vec<char> = key.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // fooBar | FOOBar -> FOO + Bar
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Normalize a field map
///
/// Every key is present in camelCase. Keys that were not already camelCase
/// stay present too, as aliases of the same value. An explicit camelCase key
/// wins over a snake_case spelling of the same field. Values are not
/// touched, nested objects included.
pub fn normalize(fields: &Map<String, Value>) -> Map<String, Value> {
    let mut out = fields.clone();
    for (key, value) in fields {
        let camel = camel_case(key);
        if camel != *key && !fields.contains_key(&camel) {
            out.insert(camel, value.clone());
        }
    }
    out
}

/// Rewrite top-level scalar keys to camelCase
///
/// Unlike field maps, scalars are owned by this crate's adapters, so the
/// original spelling is not retained.
pub fn normalize_scalars(scalars: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    let (camel, snake): (Vec<_>, Vec<_>) = scalars
        .into_iter()
        .partition(|(key, _)| camel_case(key) == *key);
    for (key, value) in snake {
        out.insert(camel_case(&key), value);
    }
    // explicit camelCase keys take precedence
    out.extend(camel);
    out
}

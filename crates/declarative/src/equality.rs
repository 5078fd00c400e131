//! Omission-aware equality between desired and server resources
//!
//! The desired document is a partial source of truth, the server a full
//! one: only what both sides name is ever compared.

use crate::normalize::{camel_case, normalize};
use crate::types::{DesiredResource, MASKED_SECRET, ServerResource, TagRef};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(password|passkey|api_?key|secret|token)").expect("secret pattern is valid")
});

/// Whether a field name holds a credential the server masks
pub fn is_secret_field(name: &str) -> bool {
    SECRET.is_match(name)
}

/// Structural equality over JSON values
///
/// Numbers compare by value, so `8080` and `8080.0` are equal.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_eq(v, other)))
        }
        _ => a == b,
    }
}

/// Compare a desired resource against the server
///
/// `scalar_eq` decides each scalar the desired resource names; adapters use
/// it for scalars whose wire form is richer than the desired one.
pub fn resources_equal<F>(
    desired: &DesiredResource,
    server: &ServerResource,
    secrets_authoritative: bool,
    scalar_eq: F,
) -> bool
where
    F: Fn(&str, &Value, &Value) -> bool,
{
    if desired.name != server.name {
        return false;
    }

    for (name, wanted) in &desired.scalars {
        let current = server.scalars.get(name).unwrap_or(&Value::Null);
        if !scalar_eq(name, wanted, current) {
            log::debug!("{}: '{name}' differs ({current} -> {wanted})", server.name);
            return false;
        }
    }

    if !desired
        .implementation
        .eq_ignore_ascii_case(&server.implementation)
    {
        return false;
    }

    if let Some(fields) = &desired.fields {
        let normalized = normalize(fields);

        for field in &server.fields {
            let Some(wanted) = normalized.get(&field.name) else {
                continue;
            };
            if is_secret_field(&field.name)
                && field.value == Value::String(MASKED_SECRET.to_string())
                && !secrets_authoritative
            {
                continue;
            }
            if !json_eq(wanted, &field.value) {
                log::debug!("{}: field '{}' differs", server.name, field.name);
                return false;
            }
        }

        for key in fields.keys() {
            if !server.has_field(key) && !server.has_field(&camel_case(key)) {
                log::warn!(
                    "{}: field '{key}' is not known to the server (typo or renamed field?)",
                    server.name
                );
                return false;
            }
        }
    }

    if let Some(tags) = &desired.tags {
        if tags.iter().any(|t| matches!(t, TagRef::Name(_))) {
            log::error!("{}: unresolved tag label reached comparison", server.name);
            return false;
        }
        let mut wanted = desired.tag_ids();
        let mut current = server.tags.clone();
        wanted.sort_unstable();
        current.sort_unstable();
        if wanted != current {
            log::debug!("{}: tags differ ({current:?} -> {wanted:?})", server.name);
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn equal(desired: &DesiredResource, server: &ServerResource, secrets: bool) -> bool {
        resources_equal(desired, server, secrets, |_, d, s| json_eq(d, s))
    }

    fn server() -> ServerResource {
        ServerResource::new(1, "qb", "QBittorrent")
            .with_scalar("enable", true)
            .with_scalar("priority", 1)
            .with_field("host", "localhost")
            .with_field("port", 8080)
            .with_field("password", MASKED_SECRET)
            .with_tags([3, 1])
    }

    #[test]
    fn test_secret_field_names() {
        assert!(is_secret_field("password"));
        assert!(is_secret_field("apiKey"));
        assert!(is_secret_field("api_key"));
        assert!(is_secret_field("passKey"));
        assert!(!is_secret_field("host"));
    }

    #[test]
    fn test_json_eq_numbers() {
        assert!(json_eq(&json!(8080), &json!(8080.0)));
        assert!(json_eq(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!json_eq(&json!([1, 2]), &json!([2, 1])));
        assert!(!json_eq(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_names_must_match() {
        let desired = DesiredResource::new("other", "qBittorrent");
        assert!(!equal(&desired, &server(), false));
    }

    #[test]
    fn test_implementation_ignores_case() {
        let desired = DesiredResource::new("qb", "qbittorrent");
        assert!(equal(&desired, &server(), false));
    }

    #[test]
    fn test_omitted_scalars_never_differ() {
        let desired = DesiredResource::new("qb", "qBittorrent").with_scalar("enable", true);
        let a = server().with_scalar("priority", 1);
        let b = server().with_scalar("priority", 50);
        assert_eq!(equal(&desired, &a, false), equal(&desired, &b, false));
        assert!(equal(&desired, &a, false));

        let desired = desired.with_scalar("priority", 50);
        assert!(!equal(&desired, &a, false));
        assert!(equal(&desired, &b, false));
    }

    #[test]
    fn test_unmentioned_fields_are_unmanaged() {
        let desired = DesiredResource::new("qb", "qBittorrent").with_field("port", 8080);
        assert!(equal(&desired, &server(), false));

        let desired = DesiredResource::new("qb", "qBittorrent").with_field("port", 9090);
        assert!(!equal(&desired, &server(), false));
    }

    #[test]
    fn test_snake_case_fields_match_camel_server_fields() {
        let server = server().with_field("urlBase", "/qb");
        let desired = DesiredResource::new("qb", "qBittorrent").with_field("url_base", "/qb");
        assert!(equal(&desired, &server, false));
    }

    #[test]
    fn test_masked_secret() {
        let desired = DesiredResource::new("qb", "qBittorrent").with_field("password", "real");
        assert!(equal(&desired, &server(), false));
        assert!(!equal(&desired, &server(), true));
    }

    #[test]
    fn test_unknown_desired_field_is_mismatch() {
        let desired = DesiredResource::new("qb", "qBittorrent").with_field("hots", "localhost");
        assert!(!equal(&desired, &server(), false));
    }

    #[test]
    fn test_tag_order_independent() {
        let desired = DesiredResource::new("qb", "qBittorrent").with_tags([1_i64, 3]);
        assert!(equal(&desired, &server(), false));
        assert!(equal(&desired, &server().with_tags([1, 3]), false));

        let desired = DesiredResource::new("qb", "qBittorrent").with_tags([1_i64]);
        assert!(!equal(&desired, &server(), false));
    }

    #[test]
    fn test_absent_tags_unmanaged_but_empty_tags_managed() {
        let desired = DesiredResource::new("qb", "qBittorrent");
        assert!(equal(&desired, &server(), false));

        let desired = DesiredResource::new("qb", "qBittorrent").with_tags(Vec::<i64>::new());
        assert!(!equal(&desired, &server(), false));
    }

    #[test]
    fn test_unresolved_label_never_equal() {
        let desired = DesiredResource::new("qb", "qBittorrent").with_tags(["4K"]);
        assert!(!equal(&desired, &server(), false));
    }
}

//! Wire-format helpers
//!
//! Two resource shapes exist on the wire. Provider resources (download
//! clients) keep their settings in a `fields` array of `{name, value}`
//! entries selected by `implementation`. Flat resources (profiles, custom
//! formats, root folders, mappings) keep everything as top-level
//! properties.

use declarative::{Field, SchemaTemplate, TemplateField, camel_case};
use serde_json::{Map, Value};

/// String property, empty when absent
pub fn text(wire: &Value, key: &str) -> String {
    wire.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Integer ids under `key`
pub fn tag_ids(wire: &Value, key: &str) -> Vec<i64> {
    wire.get(key)
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

/// The `fields` array of a provider resource
pub fn provider_fields(wire: &Value) -> Vec<Field> {
    wire.get("fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| {
                    let name = f.get("name")?.as_str()?;
                    Some(Field::new(name, f.get("value").cloned().unwrap_or(Value::Null)))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Top-level properties of a flat resource, minus `reserved`
pub fn flat_fields(wire: &Value, reserved: &[&str]) -> Vec<Field> {
    wire.as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(k, _)| !reserved.contains(&k.as_str()))
                .map(|(k, v)| Field::new(k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// One template per entry of a provider schema list
pub fn provider_templates(schema: Vec<Value>) -> Vec<SchemaTemplate> {
    schema
        .into_iter()
        .filter_map(|raw| {
            let implementation = raw.get("implementation")?.as_str()?.to_string();
            let fields = raw
                .get("fields")
                .and_then(Value::as_array)
                .map(|fields| {
                    fields
                        .iter()
                        .filter_map(|f| {
                            let name = f.get("name")?.as_str()?;
                            Some(TemplateField::new(
                                name,
                                f.get("value").cloned().unwrap_or(Value::Null),
                            ))
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(SchemaTemplate {
                implementation,
                fields,
                raw,
            })
        })
        .collect()
}

/// Template for a flat kind from a blank resource
///
/// The implementation is empty; flat kinds have no type.
pub fn flat_template(raw: Value, reserved: &[&str]) -> SchemaTemplate {
    let fields = flat_fields(&raw, reserved)
        .into_iter()
        .map(|f| TemplateField {
            name: f.name,
            default: f.value,
            possibly_required: false,
        })
        .collect();
    SchemaTemplate {
        implementation: String::new(),
        fields,
        raw,
    }
}

/// Set the value of an existing entry of a provider `fields` array
///
/// Returns false when the resource has no such field.
pub fn set_provider_field(payload: &mut Map<String, Value>, name: &str, value: Value) -> bool {
    let Some(fields) = payload.get_mut("fields").and_then(Value::as_array_mut) else {
        return false;
    };
    match fields
        .iter_mut()
        .find(|f| f.get("name").and_then(Value::as_str) == Some(name))
    {
        Some(field) => {
            field["value"] = value;
            true
        }
        None => false,
    }
}

/// Desired field overrides keyed by wire name
///
/// snake_case keys are camelCased; an explicit camelCase key wins over a
/// converted one.
pub fn wire_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in fields {
        let camel = camel_case(key);
        if camel == *key || !fields.contains_key(&camel) {
            out.insert(camel, value.clone());
        }
    }
    out
}

/// Object view of a JSON value, empty for anything else
pub fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn qbittorrent() -> Value {
        json!({
            "id": 3,
            "name": "qb",
            "implementation": "QBittorrent",
            "tags": [1, 2, "x"],
            "fields": [
                {"name": "host", "value": "localhost"},
                {"name": "password", "value": "********"},
                {"name": "tvCategory"}
            ]
        })
    }

    #[test]
    fn test_provider_fields() {
        let fields = provider_fields(&qbittorrent());
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], Field::new("host", "localhost"));
        assert_eq!(fields[2].value, Value::Null);
        assert_eq!(tag_ids(&qbittorrent(), "tags"), vec![1, 2]);
        assert!(tag_ids(&qbittorrent(), "defaultTags").is_empty());
    }

    #[test]
    fn test_flat_fields_skip_reserved() {
        let wire = json!({"id": 1, "name": "Standard", "allowed": ["flac"], "minimum": 0});
        let fields = flat_fields(&wire, &["id", "name"]);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["allowed", "minimum"]);
    }

    #[test]
    fn test_provider_templates_mark_unset_fields() {
        let templates = provider_templates(vec![
            json!({
                "implementation": "Transmission",
                "fields": [{"name": "host", "value": "localhost"}, {"name": "urlBase"}]
            }),
            json!({"name": "no implementation"}),
        ]);
        assert_eq!(templates.len(), 1);
        let t = &templates[0];
        assert!(!t.field("host").unwrap().possibly_required);
        assert!(t.field("urlBase").unwrap().possibly_required);
    }

    fn provider_field<'a>(payload: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
        payload
            .get("fields")?
            .as_array()?
            .iter()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(name))?
            .get("value")
    }

    #[test]
    fn test_set_provider_field() {
        let mut payload = into_object(qbittorrent());
        assert!(set_provider_field(&mut payload, "host", json!("qbit")));
        assert!(!set_provider_field(&mut payload, "nope", json!(1)));
        assert_eq!(provider_field(&payload, "host"), Some(&json!("qbit")));
        assert_eq!(provider_field(&payload, "tvCategory"), None);
    }

    #[test]
    fn test_wire_fields_prefer_explicit_camel() {
        let mut fields = Map::new();
        fields.insert("url_base".into(), json!("/a"));
        fields.insert("urlBase".into(), json!("/b"));
        fields.insert("api_key".into(), json!("k"));
        let wire = wire_fields(&fields);
        assert_eq!(wire["urlBase"], json!("/b"));
        assert_eq!(wire["apiKey"], json!("k"));
        assert_eq!(wire.len(), 2);
    }
}

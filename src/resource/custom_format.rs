//! Custom formats
//!
//! A custom format is flat (`name`, `includeCustomFormatWhenRenaming`,
//! `specifications`), but each specification is provider-shaped and the
//! kind's schema endpoint answers with specification templates. Desired
//! specifications may give their fields as a plain table:
//!
//! ```toml
//! [[instances.tv.custom_formats.items]]
//! name = "x265"
//! specifications = [
//!   { name = "x265", type = "ReleaseTitleSpecification", fields = { value = "[xh]\\.?265" } },
//! ]
//! ```

use super::{KindSpec, shape};
use anyhow::{Context, Result};
use arrclient::{Backend, Dialect, ResourceKind};
use declarative::{DesiredResource, ScalarSpec, SchemaTemplate, ServerCache, camel_case, json_eq};
use serde_json::{Map, Value, json};

const SCALARS: &[ScalarSpec] = &[
    ScalarSpec::bool("includeCustomFormatWhenRenaming"),
    ScalarSpec::any("specifications"),
];

/// Cache schema key for specification templates
pub const SPECIFICATION_SCHEMA: &str = "custom format specification";

pub struct CustomFormats;

impl KindSpec for CustomFormats {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CustomFormat
    }

    fn scalars(&self, _dialect: Dialect) -> &'static [ScalarSpec] {
        SCALARS
    }

    fn templates(&self, _backend: &dyn Backend) -> Result<Vec<SchemaTemplate>> {
        Ok(vec![shape::flat_template(
            json!({"name": "", "includeCustomFormatWhenRenaming": false, "specifications": []}),
            &["id", "name"],
        )])
    }

    fn prepare(&self, backend: &dyn Backend, cache: &mut ServerCache) -> Result<()> {
        if cache.schema(SPECIFICATION_SCHEMA).is_none() {
            let templates = shape::provider_templates(backend.schema(self.kind())?);
            log::debug!("Cached {} specification template(s)", templates.len());
            cache.store_schema(SPECIFICATION_SCHEMA, templates);
        }
        Ok(())
    }

    fn normalize(&self, _dialect: Dialect, mut desired: DesiredResource, cache: &ServerCache) -> Result<DesiredResource> {
        if let Some(specs) = desired.scalars.get_mut("specifications") {
            let list = specs
                .as_array()
                .context("'specifications' must be a list")?;
            let normalized = list
                .iter()
                .enumerate()
                .map(|(i, spec)| {
                    normalize_specification(spec, cache)
                        .with_context(|| format!("specification #{}", i + 1))
                })
                .collect::<Result<Vec<_>>>()?;
            *specs = Value::Array(normalized);
        }
        Ok(desired)
    }

    fn write_scalar(
        &self,
        _dialect: Dialect,
        name: &str,
        value: &Value,
        payload: &mut Map<String, Value>,
        cache: &ServerCache,
    ) -> Result<()> {
        let value = match name {
            "specifications" => Value::Array(
                value
                    .as_array()
                    .map(|specs| specs.iter().map(|s| expand_specification(s, cache)).collect())
                    .unwrap_or_default(),
            ),
            _ => value.clone(),
        };
        payload.insert(name.to_string(), value);
        Ok(())
    }

    fn scalar_equal(&self, name: &str, desired: &Value, server: &Value) -> bool {
        match name {
            "specifications" => specifications_equal(desired, server),
            _ => json_eq(desired, server),
        }
    }
}

/// Bring one desired specification into canonical form
///
/// `{name, implementation, negate, required, fields: {camelName: value}}`
/// with the implementation spelled as the server spells it.
fn normalize_specification(spec: &Value, cache: &ServerCache) -> Result<Value> {
    let obj = spec.as_object().context("must be a table")?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty())
        .context("name is required")?;
    let implementation = obj
        .get("implementation")
        .or_else(|| obj.get("type"))
        .and_then(Value::as_str)
        .filter(|i| !i.trim().is_empty())
        .with_context(|| format!("'{name}': type is required"))?;

    let implementation = match cache.schema(SPECIFICATION_SCHEMA) {
        Some(templates) if !templates.is_empty() => templates
            .iter()
            .find(|t| t.implementation.eq_ignore_ascii_case(implementation))
            .map(|t| t.implementation.clone())
            .with_context(|| format!("'{name}': unknown specification type '{implementation}'"))?,
        _ => implementation.to_string(),
    };

    let flag = |key: &str| -> Result<bool> {
        match obj.get(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => anyhow::bail!("'{name}': '{key}' must be a boolean, got {other}"),
        }
    };

    let mut fields = Map::new();
    match obj.get("fields") {
        None | Some(Value::Null) => {}
        Some(Value::Object(table)) => {
            for (key, value) in table {
                fields.insert(camel_case(key), value.clone());
            }
        }
        Some(Value::Array(list)) => {
            for entry in list {
                let key = entry
                    .get("name")
                    .and_then(Value::as_str)
                    .with_context(|| format!("'{name}': field entries need a name"))?;
                fields.insert(key.to_string(), entry.get("value").cloned().unwrap_or(Value::Null));
            }
        }
        Some(other) => anyhow::bail!("'{name}': 'fields' must be a table, got {other}"),
    }

    Ok(json!({
        "name": name,
        "implementation": implementation,
        "negate": flag("negate")?,
        "required": flag("required")?,
        "fields": fields,
    }))
}

/// Wire form of a canonical specification, filled from its template
fn expand_specification(spec: &Value, cache: &ServerCache) -> Value {
    let implementation = spec["implementation"].as_str().unwrap_or_default();
    let mut out = cache
        .template(SPECIFICATION_SCHEMA, implementation)
        .map(|t| shape::into_object(t.raw.clone()))
        .unwrap_or_default();
    out.remove("id");
    out.remove("presets");

    for key in ["name", "implementation", "negate", "required"] {
        out.insert(key.to_string(), spec[key].clone());
    }

    let wanted = spec["fields"].as_object().cloned().unwrap_or_default();
    let mut fields = match out.remove("fields") {
        Some(Value::Array(fields)) => fields,
        _ => Vec::new(),
    };
    for (name, value) in wanted {
        match fields
            .iter_mut()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(name.as_str()))
        {
            Some(field) => field["value"] = value,
            None => fields.push(json!({"name": name, "value": value})),
        }
    }
    out.insert("fields".into(), Value::Array(fields));
    Value::Object(out)
}

/// Field value of a server specification
///
/// Older servers send `fields` as an object rather than a list.
fn server_field<'a>(spec: &'a Value, name: &str) -> Option<&'a Value> {
    match spec.get("fields")? {
        Value::Array(fields) => fields
            .iter()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(name))?
            .get("value"),
        Value::Object(fields) => fields.get(name),
        _ => None,
    }
}

/// Same specifications, matched by name; only named fields are compared
fn specifications_equal(desired: &Value, server: &Value) -> bool {
    let (Some(desired), Some(server)) = (desired.as_array(), server.as_array()) else {
        return desired.is_null() && server.is_null();
    };
    if desired.len() != server.len() {
        return false;
    }
    desired.iter().all(|d| {
        let Some(s) = server.iter().find(|s| s["name"] == d["name"]) else {
            return false;
        };
        let same_type = d["implementation"]
            .as_str()
            .zip(s["implementation"].as_str())
            .is_some_and(|(a, b)| a.eq_ignore_ascii_case(b));
        let flags = ["negate", "required"]
            .iter()
            .all(|k| d[*k].as_bool().unwrap_or(false) == s[*k].as_bool().unwrap_or(false));
        let fields = d["fields"].as_object().is_none_or(|fields| {
            fields
                .iter()
                .all(|(name, value)| json_eq(value, server_field(s, name).unwrap_or(&Value::Null)))
        });
        same_type && flags && fields
    })
}

//! Property-list schemas for structured generation.
//!
//! `/properties_gen` takes a comma-separated list of property names and asks
//! the model for an object with exactly those string properties.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Errors raised while preparing a property schema
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The property list contained no usable names
    #[error("no property names given")]
    NoProperties,
}

/// Split a comma-separated property list into trimmed, unique names.
///
/// Empty entries are dropped and duplicates keep their first position.
///
/// # Examples
///
/// ```
/// use oxide_relay::schema::parse_property_names;
///
/// let names = parse_property_names(" name, age,,name ").unwrap();
/// assert_eq!(names, vec!["name", "age"]);
/// ```
///
/// # Errors
///
/// Returns `SchemaError::NoProperties` if no names remain.
pub fn parse_property_names(input: &str) -> Result<Vec<String>, SchemaError> {
    let mut names: Vec<String> = Vec::new();
    for name in input.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }

    if names.is_empty() {
        return Err(SchemaError::NoProperties);
    }
    Ok(names)
}

/// Strict object schema with one required string property per name.
#[must_use]
pub fn build_properties_schema(names: &[String]) -> Value {
    let properties: Map<String, Value> = names
        .iter()
        .map(|name| (name.clone(), json!({"type": "string"})))
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": names,
        "additionalProperties": false
    })
}

/// Pretty-print a JSON value inside a ```` ```json ```` fence.
#[must_use]
pub fn render_json_block(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{pretty}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property_names_trims_and_dedupes() {
        let names = parse_property_names("title , author,year, author");
        assert_eq!(
            names,
            Ok(vec![
                "title".to_string(),
                "author".to_string(),
                "year".to_string()
            ])
        );
    }

    #[test]
    fn test_parse_property_names_empty() {
        assert_eq!(parse_property_names(" , ,"), Err(SchemaError::NoProperties));
        assert_eq!(parse_property_names(""), Err(SchemaError::NoProperties));
    }

    #[test]
    fn test_schema_shape() {
        let names = vec!["b".to_string(), "a".to_string()];
        let schema = build_properties_schema(&names);

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["b", "a"]));
        assert_eq!(schema["properties"]["a"], json!({"type": "string"}));
        assert_eq!(schema["properties"].as_object().map(Map::len), Some(2));
    }

    #[test]
    fn test_render_json_block() {
        let rendered = render_json_block(&json!({"name": "Ada"}));
        assert_eq!(rendered, "```json\n{\n  \"name\": \"Ada\"\n}\n```");
    }
}

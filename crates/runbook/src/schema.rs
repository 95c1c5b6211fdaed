//! The runbook parameter schema.
//!
//! A JSON-Schema-like subset: typed named properties with `required`,
//! `enum`, and `default`. Validation order matters: defaults are applied
//! first, then required, then types and enum membership, so an optional
//! boolean with a default satisfies `required` implicitly.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Allowed parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// A JSON string.
    String,
    /// A JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
}

impl ParameterType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// One typed property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// The type.
    #[serde(rename = "type")]
    pub kind: ParameterType,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Applied when the caller omits the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed values, when closed.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

/// The schema: properties plus the required-name list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParameterSchema {
    /// Named properties.
    #[serde(default)]
    pub properties: IndexMap<String, ParameterSpec>,
    /// Names that must be present after defaulting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ParameterSchema {
    /// Validate and normalize caller-supplied parameters.
    ///
    /// Returns the typed values with defaults applied, or one reason per
    /// offending field.
    pub fn validate(&self, params: &Map<String, Value>) -> Result<Map<String, Value>, Vec<(String, String)>> {
        let mut errors: Vec<(String, String)> = Vec::new();
        let mut normalized = params.clone();

        // Unknown parameters are rejected, not silently dropped.
        for name in params.keys() {
            if !self.properties.contains_key(name) {
                errors.push((name.clone(), "unknown parameter".into()));
            }
        }

        // Defaults fill gaps before the required check.
        for (name, spec) in &self.properties {
            if !normalized.contains_key(name)
                && let Some(default) = &spec.default
            {
                normalized.insert(name.clone(), default.clone());
            }
        }

        for name in &self.required {
            if !normalized.contains_key(name) {
                errors.push((name.clone(), "required parameter missing".into()));
            }
        }

        for (name, spec) in &self.properties {
            let Some(value) = normalized.get(name) else {
                continue;
            };
            if !spec.kind.accepts(value) {
                errors.push((
                    name.clone(),
                    format!("expected {:?}", spec.kind).to_lowercase(),
                ));
                continue;
            }
            if let Some(allowed) = &spec.enum_values
                && !allowed.contains(value)
            {
                errors.push((name.clone(), format!("must be one of {allowed:?}")));
            }
        }

        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> ParameterSchema {
        serde_json::from_value(json!({
            "properties": {
                "service": {"type": "string"},
                "dry_run": {"type": "boolean", "default": true},
                "replicas": {"type": "number", "enum": [1, 3, 5]}
            },
            "required": ["service", "dry_run"]
        }))
        .unwrap()
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn defaults_satisfy_required() {
        let normalized = schema().validate(&map(json!({"service": "api"}))).unwrap();
        assert_eq!(normalized["service"], "api");
        assert_eq!(normalized["dry_run"], true);
    }

    #[test]
    fn missing_required_without_default_is_reported() {
        let errors = schema().validate(&map(json!({"dry_run": true}))).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "service");
        assert!(errors[0].1.contains("required"));
    }

    #[test]
    fn type_mismatches_are_per_field() {
        let errors = schema()
            .validate(&map(json!({"service": 7, "dry_run": "yes"})))
            .unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields, vec!["service", "dry_run"]);
    }

    #[test]
    fn enum_membership_is_enforced() {
        let ok = schema().validate(&map(json!({"service": "api", "replicas": 3})));
        assert!(ok.is_ok());
        let errors = schema()
            .validate(&map(json!({"service": "api", "replicas": 2})))
            .unwrap_err();
        assert_eq!(errors[0].0, "replicas");
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let errors = schema()
            .validate(&map(json!({"service": "api", "force": true})))
            .unwrap_err();
        assert_eq!(errors[0].0, "force");
        assert!(errors[0].1.contains("unknown"));
    }

    #[test]
    fn schema_json_shape_roundtrips() {
        let s = schema();
        let json = serde_json::to_value(&s).unwrap();
        let back: ParameterSchema = serde_json::from_value(json).unwrap();
        assert_eq!(s, back);
    }
}

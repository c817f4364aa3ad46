//! Tool catalog cache plus schema-driven argument handling.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: ToolInputSchema,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tool {
    pub fn is_required(&self, param: &str) -> bool {
        self.input_schema.required.iter().any(|name| name == param)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaProp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn object_type() -> String {
    "object".to_string()
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: object_type(),
            properties: BTreeMap::new(),
            required: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaProp {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchemaProp {
    /// First non-null type name; `type` may be a string or a list.
    pub fn primary_type(&self) -> Option<&str> {
        match self.schema_type.as_ref()? {
            Value::String(name) => Some(name.as_str()),
            Value::Array(names) => names
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null"),
            _ => None,
        }
    }
}

/// Last fetched tool list. Replacement swaps the whole slice so readers never
/// see a partial catalog.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: Arc<[Tool]>,
    generation: u64,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self {
            tools: Arc::from(Vec::new()),
            generation: 0,
        }
    }
}

impl ToolCatalog {
    pub fn replace(&mut self, tools: Vec<Tool>) {
        self.tools = Arc::from(tools);
        self.generation += 1;
    }

    pub fn snapshot(&self) -> Arc<[Tool]> {
        Arc::clone(&self.tools)
    }

    pub fn find(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Number of successful replacements; zero until the first fetch lands.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Decodes `result.tools` entries, skipping the ones that do not look like a
/// tool. Returns the tools plus one warning per skipped entry.
pub fn decode_tools(entries: &[Value]) -> (Vec<Tool>, Vec<String>) {
    let mut tools = Vec::with_capacity(entries.len());
    let mut warnings = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<Tool>(entry.clone()) {
            Ok(tool) => tools.push(tool),
            Err(err) => warnings.push(format!("Skipping tool entry {index}: {err}")),
        }
    }
    (tools, warnings)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentError {
    pub key: String,
    pub expected: &'static str,
    pub value: String,
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Argument '{}' expects {}, got '{}'",
            self.key, self.expected, self.value
        )
    }
}

impl std::error::Error for ArgumentError {}

/// Turns raw operator input into typed JSON following the tool's schema.
/// Keys the schema does not describe are passed through as strings.
pub fn coerce_arguments(
    tool: &Tool,
    raw: &[(String, String)],
) -> Result<Map<String, Value>, ArgumentError> {
    let mut arguments = Map::new();
    for (key, value) in raw {
        let kind = tool
            .input_schema
            .properties
            .get(key)
            .and_then(SchemaProp::primary_type);
        let error = |expected| ArgumentError {
            key: key.clone(),
            expected,
            value: value.clone(),
        };

        let coerced = match kind {
            Some("integer") => value
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| error("an integer"))?,
            Some("number") => value
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| error("a number"))?,
            Some("boolean") => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(error("true or false")),
            },
            Some("object") | Some("array") => {
                serde_json::from_str::<Value>(value).map_err(|_| error("JSON"))?
            }
            _ => Value::String(value.clone()),
        };
        arguments.insert(key.clone(), coerced);
    }
    Ok(arguments)
}

/// Checks arguments against the tool's input schema. Returns every
/// violation found.
pub fn validate_arguments(tool: &Tool, arguments: &Value) -> Result<(), Vec<String>> {
    let schema = serde_json::to_value(&tool.input_schema)
        .map_err(|err| vec![format!("Invalid input schema: {err}")])?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|err| vec![format!("Invalid input schema: {err}")])?;

    let violations: Vec<String> = validator
        .iter_errors(arguments)
        .map(|err| err.to_string())
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

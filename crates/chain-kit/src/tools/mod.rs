//! Tool framework for model-driven function calls
//!
//! A tool is a named, described function the model can ask to run; the
//! registry looks tools up by name and renders their signatures into prompts.

pub mod builtin;
mod calculator;
pub mod registry;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub use calculator::evaluate;
pub use registry::ToolRegistry;

/// Result of tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,
    /// Output from the tool
    pub output: Value,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// Create a failed result
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Output as prompt text; strings are not re-quoted
    pub fn output_text(&self) -> String {
        match &self.output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Schema for a tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterProperty {
    /// Parameter type (string, number, integer, boolean, object)
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
}

impl ParameterProperty {
    fn typed(param_type: &str, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.to_string(),
            description: description.into(),
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::typed("number", description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::typed("integer", description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::typed("boolean", description)
    }

    pub fn object(description: impl Into<String>) -> Self {
        Self::typed("object", description)
    }
}

/// Schema describing tool parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Type is always "object"
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, ParameterProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        self.properties.insert(name.into(), prop);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), prop);
        self.required.push(name);
        self
    }

    /// `name: type` pairs, required parameters first
    pub fn signature(&self) -> String {
        let optional = self
            .properties
            .keys()
            .filter(|name| !self.required.contains(*name));
        self.required
            .iter()
            .chain(optional)
            .filter_map(|name| {
                self.properties
                    .get(name)
                    .map(|p| format!("{name}: {}", p.param_type))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Tool definition in the function-calling wire shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// The Tool trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> ParameterSchema;

    /// Run the tool
    ///
    /// Bad arguments are an `Err`; a failure the model should hear about is
    /// an `Ok` carrying [`ToolResult::error`].
    async fn execute(&self, args: &Value) -> Result<ToolResult>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters_schema())
    }
}

/// Fetch a numeric argument; numeric strings are accepted
pub(crate) fn number_arg(tool: &str, args: &Value, name: &str) -> Result<f64> {
    match args.get(name) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::tool_arguments(tool, format!("'{name}' is not a finite number"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| Error::tool_arguments(tool, format!("'{name}' is not a number: {s}"))),
        Some(other) => Err(Error::tool_arguments(
            tool,
            format!("'{name}' must be a number, got {other}"),
        )),
        None => Err(Error::tool_arguments(tool, format!("missing '{name}'"))),
    }
}

/// Fetch an integer argument; whole floats and numeric strings are accepted
pub(crate) fn integer_arg(tool: &str, args: &Value, name: &str) -> Result<i64> {
    if let Some(i) = args.get(name).and_then(Value::as_i64) {
        return Ok(i);
    }
    let value = number_arg(tool, args, name)?;
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(Error::tool_arguments(
            tool,
            format!("'{name}' must be a whole number, got {value}"),
        ));
    }
    Ok(value as i64)
}

pub(crate) fn string_arg<'a>(tool: &str, args: &'a Value, name: &str) -> Result<&'a str> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::tool_arguments(
            tool,
            format!("'{name}' must be a string, got {other}"),
        )),
        None => Err(Error::tool_arguments(tool, format!("missing '{name}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_orders_required_first() {
        let schema = ParameterSchema::new()
            .with_property("verbose", ParameterProperty::boolean("chatty"))
            .with_required("radius", ParameterProperty::number("circle radius"));
        assert_eq!(schema.signature(), "radius: number, verbose: boolean");
        assert_eq!(ParameterSchema::new().signature(), "");
    }

    #[test]
    fn test_definition_wire_shape() {
        let def = ToolDefinition::new(
            "get_weather",
            "Get the weather",
            ParameterSchema::new().with_required("city", ParameterProperty::string("City")),
        );
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["parameters"]["required"], json!(["city"]));
        assert_eq!(
            value["function"]["parameters"]["properties"]["city"]["type"],
            "string"
        );
    }

    #[test]
    fn test_argument_helpers() {
        let args = json!({"r": 5, "s": "2.5", "d": 3.0, "bad": "x", "name": "Tokyo"});
        assert_eq!(number_arg("t", &args, "r").unwrap(), 5.0);
        assert_eq!(number_arg("t", &args, "s").unwrap(), 2.5);
        assert_eq!(integer_arg("t", &args, "d").unwrap(), 3);
        assert!(integer_arg("t", &args, "s").is_err());
        assert!(number_arg("t", &args, "bad").is_err());
        assert!(matches!(
            number_arg("t", &args, "missing"),
            Err(Error::ToolArguments { .. })
        ));
        assert_eq!(string_arg("t", &args, "name").unwrap(), "Tokyo");
        assert!(string_arg("t", &args, "r").is_err());
    }

    #[test]
    fn test_output_text() {
        assert_eq!(ToolResult::success("plain").output_text(), "plain");
        assert_eq!(
            ToolResult::success(json!({"temp": 58})).output_text(),
            "{\"temp\":58}"
        );
    }
}

//! Built-in tools used by the tool, function-calling and agent lessons

use std::f64::consts::PI;

use async_trait::async_trait;
use chrono::{Duration, Local};
use serde_json::{json, Value};

use super::calculator::{evaluate, format_number};
use super::registry::ToolRegistry;
use super::{integer_arg, number_arg, string_arg, ParameterProperty, ParameterSchema, Tool, ToolResult};
use crate::error::{Error, Result};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Local wall-clock time
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn execute(&self, _args: &Value) -> Result<ToolResult> {
        Ok(ToolResult::success(
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        ))
    }
}

pub struct CircleAreaTool;

#[async_trait]
impl Tool for CircleAreaTool {
    fn name(&self) -> &str {
        "calculate_circle_area"
    }

    fn description(&self) -> &str {
        "Calculate the area of a circle given its radius."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required("radius", ParameterProperty::number("Circle radius"))
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let radius = number_arg(self.name(), args, "radius")?;
        if radius < 0.0 {
            return Err(Error::tool_arguments(
                self.name(),
                format!("radius must not be negative, got {radius}"),
            ));
        }
        Ok(ToolResult::success(PI * radius.powi(2)))
    }
}

pub struct TemperatureTool;

#[async_trait]
impl Tool for TemperatureTool {
    fn name(&self) -> &str {
        "convert_temperature"
    }

    fn description(&self) -> &str {
        "Convert Celsius to Fahrenheit and Kelvin."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("celsius", ParameterProperty::number("Temperature in degrees Celsius"))
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let celsius = number_arg(self.name(), args, "celsius")?;
        Ok(ToolResult::success(json!({
            "celsius": celsius,
            "fahrenheit": round2(celsius * 9.0 / 5.0 + 32.0),
            "kelvin": round2(celsius + 273.15),
        })))
    }
}

/// Canned weather for a handful of cities
pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city (mock data)."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required("city", ParameterProperty::string("City name"))
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let city = string_arg(self.name(), args, "city")?;
        let report = match city.trim().to_lowercase().as_str() {
            "london" => json!({"temp": 58, "condition": "cloudy"}),
            "tokyo" => json!({"temp": 68, "condition": "sunny"}),
            _ => json!({"temp": 65, "condition": "unknown"}),
        };
        Ok(ToolResult::success(report))
    }
}

pub struct DateOffsetTool;

#[async_trait]
impl Tool for DateOffsetTool {
    fn name(&self) -> &str {
        "calculate_date"
    }

    fn description(&self) -> &str {
        "Calculate a date by adding days to today."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required(
            "days_from_now",
            ParameterProperty::integer("Number of days to add, may be negative"),
        )
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let days = integer_arg(self.name(), args, "days_from_now")?;
        let target = Duration::try_days(days)
            .and_then(|offset| Local::now().checked_add_signed(offset))
            .ok_or_else(|| {
                Error::tool_arguments(self.name(), format!("{days} days is out of range"))
            })?;
        Ok(ToolResult::success(
            target.format("%A, %B %d, %Y").to_string(),
        ))
    }
}

/// Arithmetic over a restricted grammar; never evaluates code
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression like '2 + 2' or 'sqrt(16)'."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required(
            "expression",
            ParameterProperty::string("Arithmetic expression to evaluate"),
        )
    }

    async fn execute(&self, args: &Value) -> Result<ToolResult> {
        let expression = string_arg(self.name(), args, "expression")?;
        // Evaluation errors go back to the model as an observation
        Ok(match evaluate(expression) {
            Ok(value) => ToolResult::success(format_number(value)),
            Err(e) => ToolResult::error(format!("cannot evaluate '{expression}': {e}")),
        })
    }
}

pub struct DateInfoTool;

#[async_trait]
impl Tool for DateInfoTool {
    fn name(&self) -> &str {
        "get_date_info"
    }

    fn description(&self) -> &str {
        "Get current date and time information."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn execute(&self, _args: &Value) -> Result<ToolResult> {
        let now = Local::now();
        Ok(ToolResult::success(json!({
            "date": now.format("%Y-%m-%d").to_string(),
            "day": now.format("%A").to_string(),
        })))
    }
}

/// Time, circle area and temperature conversion
pub fn basic_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CurrentTimeTool);
    registry.register(CircleAreaTool);
    registry.register(TemperatureTool);
    registry
}

/// Functions the intent router may pick from
pub fn function_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(WeatherTool);
    registry.register(DateOffsetTool);
    registry
}

pub fn agent_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CalculatorTool);
    registry.register(DateInfoTool);
    registry
}

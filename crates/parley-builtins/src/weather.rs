use parley_core::{ParleyError, ParleyResult};
use parley_tools::{Tool, ToolDescriptor};
use tracing::debug;

/// Weather lookup. The forecast is canned; only the call contract is real.
pub struct GetWeatherTool {
    descriptor: ToolDescriptor,
}

impl GetWeatherTool {
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "get_weather",
                "Get weather of a location, the user should supply the location and date.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "location": { "type": "string", "description": "The city name" },
                        "date": {
                            "type": "string",
                            "description": "The date in format YYYY-mm-dd"
                        }
                    },
                    "required": ["location", "date"]
                }),
            ),
        }
    }
}

impl Default for GetWeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for GetWeatherTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn execute(&self, arguments: &serde_json::Value) -> ParleyResult<String> {
        let location = required_str(arguments, "location")?;
        let date = required_str(arguments, "date")?;
        debug!(location, date, "Weather lookup");
        Ok(format!("Cloudy 7~13°C at {location} on {date}"))
    }
}

fn required_str<'a>(arguments: &'a serde_json::Value, key: &str) -> ParleyResult<&'a str> {
    arguments[key]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParleyError::ToolExecution(format!("missing required argument '{key}'")))
}

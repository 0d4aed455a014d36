//! Weather lookup tool — returns mock weather data.
//!
//! The mock is deterministic per city so the conversation loop can be
//! exercised end-to-end without network access.

use async_trait::async_trait;
use salin_core::error::ToolError;
use salin_core::tool::{Tool, parse_arguments};
use serde::{Deserialize, Serialize};

pub struct WeatherLookupTool;

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    city: String,
    #[serde(default)]
    units: Units,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Units {
    #[default]
    Metric,
    Imperial,
}

#[async_trait]
impl Tool for WeatherLookupTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city. Returns conditions, temperature, humidity and wind."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The city to look up, e.g. 'Manila'"
                },
                "units": {
                    "type": "string",
                    "enum": ["metric", "imperial"],
                    "description": "Temperature units (default: metric)"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: WeatherArgs = parse_arguments(self.name(), arguments)?;
        let city = args.city.trim();
        if city.is_empty() {
            return Err(ToolError::InvalidArguments(
                "get_weather: 'city' must not be empty".into(),
            ));
        }

        let weather = generate_mock_weather(city, args.units);
        tracing::debug!(city = %weather.city, conditions = %weather.conditions, "Weather looked up");

        serde_json::to_value(&weather).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct WeatherData {
    city: String,
    conditions: String,
    temperature: f64,
    units: String,
    humidity: u32,
    wind_speed: f64,
    wind_direction: String,
}

/// Generate deterministic mock weather based on a hash of the city name.
fn generate_mock_weather(city: &str, units: Units) -> WeatherData {
    let hash: u32 = city
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    let conditions_list = [
        "Sunny",
        "Partly cloudy",
        "Overcast",
        "Light rain",
        "Heavy rain",
        "Thunderstorms",
        "Humid",
        "Foggy",
    ];

    let wind_dirs = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

    let base_temp_c = ((hash % 16) as f64) + 22.0; // 22 to 37°C
    let (temperature, unit_label) = match units {
        Units::Imperial => (base_temp_c * 9.0 / 5.0 + 32.0, "°F"),
        Units::Metric => (base_temp_c, "°C"),
    };

    WeatherData {
        city: city.to_string(),
        conditions: conditions_list[(hash as usize / 7) % conditions_list.len()].to_string(),
        temperature: (temperature * 10.0).round() / 10.0,
        units: unit_label.to_string(),
        humidity: 50 + (hash % 45),
        wind_speed: ((hash % 25) as f64) + 3.0,
        wind_direction: wind_dirs[(hash as usize / 3) % wind_dirs.len()].to_string(),
    }
}

//! Built-in tool implementations for Salin.
//!
//! These are the stateless tools the chat model can call directly. The
//! translation judge tool lives in `salin-agent` because it drives the
//! reflection pipeline.

pub mod style_check;
pub mod weather_lookup;

use salin_core::tool::ToolRegistry;

pub use style_check::{StyleCheckTool, StyleReport, check_style};
pub use weather_lookup::WeatherLookupTool;

/// Create a registry with the stateless built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(weather_lookup::WeatherLookupTool));
    registry.register(Box::new(style_check::StyleCheckTool));
    registry
}

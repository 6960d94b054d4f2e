//! Render configuration. A TOML file can override the built-in map
//! defaults and color schemes; with no file the defaults apply.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{FlightmapError, Result};
use crate::render::{Gradient, MapStyle, Rgba};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub map: MapSection,
    pub color_schemes: HashMap<String, ColorScheme>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapSection {
    pub width: u32,
    pub height: u32,
    pub line_width: f64,
    pub alpha: f64,
    pub power_norm_gamma: f64,
    pub color_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColorScheme {
    pub background: Rgba,
    pub grid: Rgba,
    pub gradient: Vec<Rgba>,
}

impl Default for MapSection {
    fn default() -> Self {
        Self {
            width: 4000,
            height: 2000,
            line_width: 1.0,
            alpha: 0.8,
            power_norm_gamma: 0.3,
            color_mode: "screen".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        let mut color_schemes = HashMap::new();
        // Dark scheme for screens: magenta routes over black.
        color_schemes.insert(
            "screen".to_string(),
            ColorScheme {
                background: [0.0, 0.0, 0.0, 1.0],
                grid: [0.8, 0.0, 0.6, 0.7],
                gradient: vec![
                    [0.0, 0.0, 0.0, 0.0],
                    [0.8, 0.0, 0.6, 0.6],
                    [1.0, 0.8, 0.902, 1.0],
                ],
            },
        );
        // Light scheme for paper: blue routes over white.
        color_schemes.insert(
            "print".to_string(),
            ColorScheme {
                background: [1.0, 1.0, 1.0, 1.0],
                grid: [0.85, 0.85, 0.85, 1.0],
                gradient: vec![
                    [0.8, 0.9, 1.0, 0.3],
                    [0.2, 0.4, 0.8, 0.8],
                    [0.0, 0.1, 0.4, 1.0],
                ],
            },
        );
        Self {
            map: MapSection::default(),
            color_schemes,
        }
    }
}

impl RenderConfig {
    /// Load from a TOML file, or fall back to the defaults when no path
    /// is given. A path that cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(toml::from_str(&text)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// Resolve the drawing style for a named color scheme.
    pub fn style(&self, color_mode: &str) -> Result<MapStyle> {
        let scheme = self.color_schemes.get(color_mode).ok_or_else(|| {
            FlightmapError::Parse(format!(
                "unknown color scheme '{}' (have: {})",
                color_mode,
                self.scheme_names().join(", ")
            ))
        })?;
        if scheme.gradient.is_empty() {
            return Err(FlightmapError::Parse(format!(
                "color scheme '{}' has an empty gradient",
                color_mode
            )));
        }
        Ok(MapStyle {
            width: self.map.width,
            height: self.map.height,
            line_width: self.map.line_width,
            alpha: self.map.alpha,
            power_norm_gamma: self.map.power_norm_gamma,
            background: scheme.background,
            grid: scheme.grid,
            gradient: Gradient::new(scheme.gradient.clone()),
        })
    }

    fn scheme_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.color_schemes.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.map.width, 4000);
        assert_eq!(config.map.height, 2000);
        assert_eq!(config.map.color_mode, "screen");
        assert!(config.color_schemes.contains_key("screen"));
        assert!(config.color_schemes.contains_key("print"));
    }

    #[test]
    fn test_style_resolution() {
        let config = RenderConfig::default();
        let style = config.style("screen").unwrap();
        assert_eq!(style.background, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(style.gradient.stops().len(), 3);
    }

    #[test]
    fn test_unknown_scheme_is_an_error() {
        let config = RenderConfig::default();
        assert!(config.style("neon").is_err());
    }

    #[test]
    fn test_parse_overrides() {
        let text = r#"
            [map]
            width = 800
            height = 400
            color_mode = "print"

            [color_schemes.custom]
            background = [0.1, 0.1, 0.1, 1.0]
            grid = [0.5, 0.5, 0.5, 0.5]
            gradient = [[0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]]
        "#;
        let config: RenderConfig = toml::from_str(text).unwrap();
        assert_eq!(config.map.width, 800);
        assert_eq!(config.map.height, 400);
        assert_eq!(config.map.color_mode, "print");
        // Partial [map] keeps the remaining defaults.
        assert_eq!(config.map.line_width, 1.0);
        let style = config.style("custom").unwrap();
        assert_eq!(style.gradient.stops().len(), 2);
    }

    #[test]
    fn test_empty_gradient_is_an_error() {
        let text = r#"
            [color_schemes.bare]
            background = [0.0, 0.0, 0.0, 1.0]
            grid = [0.5, 0.5, 0.5, 0.5]
            gradient = []
        "#;
        let config: RenderConfig = toml::from_str(text).unwrap();
        assert!(config.style("bare").is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = RenderConfig::load(Some(Path::new("/nonexistent/flightmap.toml")));
        assert!(result.is_err());
    }
}

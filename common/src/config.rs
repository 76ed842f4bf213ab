use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_WEATHER_PATH: &str = "/weather";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    pub interactive_update_rate_ms: u64,
    pub weather_path: String,
    pub high_temp_key: String,
    pub low_temp_key: String,
    pub weather_id_key: String,
    pub default_high_temp: String,
    pub default_low_temp: String,
    pub default_weather_id: i32,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            interactive_update_rate_ms: 1_000,
            weather_path: DEFAULT_WEATHER_PATH.to_string(),
            high_temp_key: "high_temp".to_string(),
            low_temp_key: "low_temp".to_string(),
            weather_id_key: "weather_id".to_string(),
            default_high_temp: "--".to_string(),
            default_low_temp: "--".to_string(),
            default_weather_id: 800,
        }
    }
}

impl FaceConfig {
    pub fn sanitize(&mut self) {
        self.interactive_update_rate_ms = self.interactive_update_rate_ms.clamp(100, 60_000);

        if self.weather_path.trim().is_empty() {
            self.weather_path = DEFAULT_WEATHER_PATH.to_string();
        } else if !self.weather_path.starts_with('/') {
            self.weather_path = format!("/{}", self.weather_path);
        }
    }
}

/// ARGB colour, `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    pub y_offset: f32,
    pub text_size: f32,
    pub text_size_round: f32,
    pub date_size: f32,
    pub date_size_round: f32,
    pub line_height: f32,
    pub icon_size: u32,
    pub background: Color,
    pub primary_text: Color,
    pub secondary_text: Color,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 320.0,
            height: 320.0,
            y_offset: 100.0,
            text_size: 40.0,
            text_size_round: 45.0,
            date_size: 18.0,
            date_size_round: 20.0,
            line_height: 40.0,
            icon_size: 40,
            background: Color(0xFF03_A9F4),
            primary_text: Color::WHITE,
            secondary_text: Color(0xB3FF_FFFF),
        }
    }
}

impl LayoutConfig {
    pub fn sanitize(&mut self) {
        self.width = self.width.max(1.0);
        self.height = self.height.max(1.0);
        self.line_height = self.line_height.max(1.0);
        self.icon_size = self.icon_size.max(1);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub face: FaceConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    pub timezone: String,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            face: FaceConfig::default(),
            layout: LayoutConfig::default(),
            timezone: "America/Los_Angeles".to_string(),
            network: NetworkConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.face.sanitize();
        self.layout.sanitize();
    }

    pub fn parsed_timezone(&self) -> Result<Tz, ConfigError> {
        parse_timezone(&self.timezone)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_update_rate_and_fixes_path() {
        let mut face = FaceConfig {
            interactive_update_rate_ms: 5,
            weather_path: "weather".to_string(),
            ..FaceConfig::default()
        };
        face.sanitize();

        assert_eq!(face.interactive_update_rate_ms, 100);
        assert_eq!(face.weather_path, "/weather");

        face.weather_path = "   ".to_string();
        face.sanitize();
        assert_eq!(face.weather_path, DEFAULT_WEATHER_PATH);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"timezone":"Europe/Berlin"}"#).unwrap();

        assert_eq!(config.face.interactive_update_rate_ms, 1_000);
        assert_eq!(config.network.mqtt_port, 1883);
        assert_eq!(config.parsed_timezone().unwrap(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn partial_sections_keep_their_other_defaults() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{"timezone":"UTC","face":{"weather_path":"/x"},"layout":{"icon_size":32},"network":{"mqtt_port":1884}}"#,
        )
        .unwrap();

        assert_eq!(config.face.weather_path, "/x");
        assert_eq!(config.face.interactive_update_rate_ms, 1_000);
        assert_eq!(config.face.default_weather_id, 800);
        assert_eq!(config.layout.icon_size, 32);
        assert_eq!(config.layout.width, 320.0);
        assert_eq!(config.network.mqtt_port, 1884);
        assert_eq!(config.network.mqtt_host, "127.0.0.1");
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = parse_timezone("Mars/Olympus").unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimezone("Mars/Olympus".to_string()));
    }
}

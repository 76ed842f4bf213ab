use serde::{Deserialize, Serialize};

use crate::config::FaceConfig;

/// Last weather report received from the companion. Always replaced whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    #[serde(rename = "highTemp")]
    pub high_temp: String,
    #[serde(rename = "lowTemp")]
    pub low_temp: String,
    #[serde(rename = "conditionId")]
    pub condition_id: i32,
}

impl WeatherSnapshot {
    pub fn new(high_temp: impl Into<String>, low_temp: impl Into<String>, condition_id: i32) -> Self {
        Self {
            high_temp: high_temp.into(),
            low_temp: low_temp.into(),
            condition_id,
        }
    }

    pub fn fallback(config: &FaceConfig) -> Self {
        Self::new(
            config.default_high_temp.clone(),
            config.default_low_temp.clone(),
            config.default_weather_id,
        )
    }

    pub fn icon(&self) -> WeatherIcon {
        WeatherIcon::from_condition(self.condition_id)
    }
}

/// Icon groups for OpenWeatherMap condition codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Storm,
    LightRain,
    Rain,
    Snow,
    Fog,
    Clear,
    LightClouds,
    Clouds,
    Unknown,
}

impl WeatherIcon {
    pub fn from_condition(id: i32) -> Self {
        match id {
            200..=232 => Self::Storm,
            300..=321 => Self::LightRain,
            500..=504 => Self::Rain,
            511 => Self::Snow,
            520..=531 => Self::Rain,
            600..=622 => Self::Snow,
            701..=761 => Self::Fog,
            781 => Self::Storm,
            800 => Self::Clear,
            801 => Self::LightClouds,
            802..=804 => Self::Clouds,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Storm => "storm",
            Self::LightRain => "light_rain",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Fog => "fog",
            Self::Clear => "clear",
            Self::LightClouds => "light_clouds",
            Self::Clouds => "clouds",
            Self::Unknown => "unknown",
        }
    }
}

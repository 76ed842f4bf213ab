use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{config::FaceConfig, error::PayloadError, weather::WeatherSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Changed,
    Deleted,
}

/// One data item change delivered by the companion channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: String,
    /// Normally an object; anything else at the weather path is rejected.
    #[serde(default)]
    pub payload: Value,
}

impl ChangeEvent {
    pub fn changed(path: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            kind: ChangeKind::Changed,
            path: path.into(),
            payload: Value::Object(payload),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Listening,
    Suspended { reason: i32 },
    Failed { result: String },
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Listening => "LISTENING",
            Self::Suspended { .. } => "SUSPENDED",
            Self::Failed { .. } => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    Connect,
    RegisterListener,
    Disconnect,
}

#[derive(Debug, Clone)]
pub struct WeatherSyncChannel {
    state: ChannelState,
    path: String,
    high_key: String,
    low_key: String,
    id_key: String,
    updates_applied: u64,
    events_rejected: u64,
}

impl WeatherSyncChannel {
    pub fn new(config: &FaceConfig) -> Self {
        Self {
            state: ChannelState::Disconnected,
            path: config.weather_path.clone(),
            high_key: config.high_temp_key.clone(),
            low_key: config.low_temp_key.clone(),
            id_key: config.weather_id_key.clone(),
            updates_applied: 0,
            events_rejected: 0,
        }
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn updates_applied(&self) -> u64 {
        self.updates_applied
    }

    pub fn events_rejected(&self) -> u64 {
        self.events_rejected
    }

    pub fn connect(&mut self) -> Option<ChannelAction> {
        match self.state {
            ChannelState::Disconnected | ChannelState::Failed { .. } => {
                self.state = ChannelState::Connecting;
                Some(ChannelAction::Connect)
            }
            _ => None,
        }
    }

    pub fn disconnect(&mut self) -> Option<ChannelAction> {
        if self.state == ChannelState::Disconnected {
            return None;
        }
        self.state = ChannelState::Disconnected;
        Some(ChannelAction::Disconnect)
    }

    pub fn on_connected(&mut self) -> Option<ChannelAction> {
        if self.state == ChannelState::Disconnected {
            debug!("ignoring connect callback after disconnect");
            return None;
        }
        info!("weather channel connected, registering data listener");
        self.state = ChannelState::Connected;
        Some(ChannelAction::RegisterListener)
    }

    pub fn on_listener_registered(&mut self) {
        if self.state == ChannelState::Connected {
            self.state = ChannelState::Listening;
        }
    }

    fn accepts_data(&self) -> bool {
        matches!(self.state, ChannelState::Connected | ChannelState::Listening)
    }

    pub fn on_connection_suspended(&mut self, reason: i32) {
        warn!("weather channel suspended, reason {reason}");
        if self.state != ChannelState::Disconnected {
            self.state = ChannelState::Suspended { reason };
        }
    }

    pub fn on_connection_failed(&mut self, result: &str) {
        warn!("weather channel connection failed: {result}");
        if self.state != ChannelState::Disconnected {
            self.state = ChannelState::Failed {
                result: result.to_string(),
            };
        }
    }

    /// Applies a batch in delivery order. Returns true when the snapshot was
    /// replaced at least once and the face should redraw.
    pub fn on_data_event(&mut self, events: &[ChangeEvent], snapshot: &mut WeatherSnapshot) -> bool {
        if !self.accepts_data() {
            debug!(
                "dropping {} data events while {}",
                events.len(),
                self.state.as_str()
            );
            return false;
        }

        let mut updated = false;
        for event in events {
            if event.kind != ChangeKind::Changed || event.path != self.path {
                continue;
            }

            let extracted = match event.payload.as_object() {
                Some(payload) => self.extract(payload),
                None => Err(PayloadError::WrongType {
                    key: "payload".to_string(),
                    expected: "object",
                }),
            };
            match extracted {
                Ok(next) => {
                    info!(
                        "weather update high={} low={} id={}",
                        next.high_temp, next.low_temp, next.condition_id
                    );
                    *snapshot = next;
                    self.updates_applied = self.updates_applied.saturating_add(1);
                    updated = true;
                }
                Err(err) => {
                    self.events_rejected = self.events_rejected.saturating_add(1);
                    warn!("discarding weather payload at {}: {err}", event.path);
                }
            }
        }
        updated
    }

    pub fn extract(&self, payload: &Map<String, Value>) -> Result<WeatherSnapshot, PayloadError> {
        let high = string_field(payload, &self.high_key)?;
        let low = string_field(payload, &self.low_key)?;
        let id = int_field(payload, &self.id_key)?;
        Ok(WeatherSnapshot::new(high, low, id))
    }
}

fn field<'a>(payload: &'a Map<String, Value>, key: &str) -> Result<&'a Value, PayloadError> {
    payload
        .get(key)
        .ok_or_else(|| PayloadError::MissingField(key.to_string()))
}

fn string_field(payload: &Map<String, Value>, key: &str) -> Result<String, PayloadError> {
    field(payload, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| PayloadError::WrongType {
            key: key.to_string(),
            expected: "string",
        })
}

fn int_field(payload: &Map<String, Value>, key: &str) -> Result<i32, PayloadError> {
    let raw = field(payload, key)?
        .as_i64()
        .ok_or_else(|| PayloadError::WrongType {
            key: key.to_string(),
            expected: "integer",
        })?;
    i32::try_from(raw).map_err(|_| PayloadError::OutOfRange {
        key: key.to_string(),
        value: raw,
    })
}

use serde::Serialize;

use crate::weather::WeatherSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct FaceStatus {
    pub visible: bool,
    pub ambient: bool,
    #[serde(rename = "lowBitAmbient")]
    pub low_bit_ambient: bool,
    #[serde(rename = "timerActive")]
    pub timer_active: bool,
    #[serde(rename = "pendingTick")]
    pub pending_tick: Option<u64>,
    pub round: bool,
    pub timezone: String,
    #[serde(rename = "timeText")]
    pub time_text: String,
    #[serde(rename = "dateText")]
    pub date_text: String,
    pub weather: WeatherSnapshot,
    pub icon: &'static str,
    pub channel: &'static str,
    #[serde(rename = "updatesApplied")]
    pub updates_applied: u64,
    #[serde(rename = "eventsRejected")]
    pub events_rejected: u64,
    #[serde(rename = "framesRendered")]
    pub frames_rendered: u64,
    pub destroyed: bool,
}

use chrono_tz::Tz;
use tracing::{debug, info};

use crate::{
    clock::{ClockState, WallClock},
    config::RuntimeConfig,
    display_mode::DisplayModeController,
    render::{DrawCommand, FaceRenderer, TextMeasure},
    scheduler::{RedrawScheduler, SchedulerAction},
    sync::{ChangeEvent, ChannelAction, WeatherSyncChannel},
    types::FaceStatus,
    weather::WeatherSnapshot,
};

/// Everything the platform can tell the face.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceEvent {
    Created,
    VisibilityChanged(bool),
    AmbientModeChanged(bool),
    /// The zone is re-read from the wall clock; the event carries nothing.
    TimezoneChanged,
    PropertiesChanged { low_bit_ambient: bool },
    InsetsApplied { round: bool },
    /// OS once-per-minute tick, delivered in every mode.
    TimeTick,
    TimerFired { generation: u64 },
    ChannelConnected,
    ListenerRegistered,
    ChannelSuspended(i32),
    ChannelFailed(String),
    DataChanged(Vec<ChangeEvent>),
    Destroyed,
}

/// Work the platform performs on the face's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceAction {
    Redraw,
    ScheduleTick { generation: u64, delay_ms: u64 },
    CancelTicks,
    ConnectChannel,
    RegisterDataListener,
    DisconnectChannel,
    RegisterTimezoneReceiver,
    UnregisterTimezoneReceiver,
}

impl From<SchedulerAction> for FaceAction {
    fn from(action: SchedulerAction) -> Self {
        match action {
            SchedulerAction::Redraw => Self::Redraw,
            SchedulerAction::Schedule {
                generation,
                delay_ms,
            } => Self::ScheduleTick {
                generation,
                delay_ms,
            },
            SchedulerAction::Cancel => Self::CancelTicks,
        }
    }
}

impl From<ChannelAction> for FaceAction {
    fn from(action: ChannelAction) -> Self {
        match action {
            ChannelAction::Connect => Self::ConnectChannel,
            ChannelAction::RegisterListener => Self::RegisterDataListener,
            ChannelAction::Disconnect => Self::DisconnectChannel,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaceEngine {
    clock: ClockState,
    weather: WeatherSnapshot,
    modes: DisplayModeController,
    scheduler: RedrawScheduler,
    channel: WeatherSyncChannel,
    renderer: FaceRenderer,
    timezone_receiver_registered: bool,
    destroyed: bool,
    frames_rendered: u64,
}

impl FaceEngine {
    pub fn new(config: &RuntimeConfig, now_ms: i64, timezone: Tz) -> Self {
        Self {
            clock: ClockState::new(now_ms, timezone),
            weather: WeatherSnapshot::fallback(&config.face),
            modes: DisplayModeController::new(),
            scheduler: RedrawScheduler::new(config.face.interactive_update_rate_ms),
            channel: WeatherSyncChannel::new(&config.face),
            renderer: FaceRenderer::new(config.layout.clone()),
            timezone_receiver_registered: false,
            destroyed: false,
            frames_rendered: 0,
        }
    }

    pub fn clock(&self) -> &ClockState {
        &self.clock
    }

    pub fn weather(&self) -> &WeatherSnapshot {
        &self.weather
    }

    pub fn modes(&self) -> &DisplayModeController {
        &self.modes
    }

    pub fn scheduler(&self) -> &RedrawScheduler {
        &self.scheduler
    }

    pub fn channel(&self) -> &WeatherSyncChannel {
        &self.channel
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn handle(&mut self, event: FaceEvent, wall: &impl WallClock) -> Vec<FaceAction> {
        if self.destroyed {
            debug!("face destroyed, ignoring {event:?}");
            return Vec::new();
        }

        let now_ms = wall.now_ms();
        let mut actions = Vec::new();

        match event {
            FaceEvent::Created => {
                actions.extend(self.channel.connect().map(FaceAction::from));
            }
            FaceEvent::VisibilityChanged(visible) => {
                self.on_visibility_changed(visible, wall, &mut actions);
            }
            FaceEvent::AmbientModeChanged(ambient) => {
                if self.modes.set_ambient(ambient) {
                    actions.push(FaceAction::Redraw);
                }
                self.update_timer(now_ms, &mut actions);
            }
            FaceEvent::TimezoneChanged => {
                if self.timezone_receiver_registered {
                    self.clock.set_timezone(wall.local_timezone());
                    actions.push(FaceAction::Redraw);
                } else {
                    debug!("timezone change while receiver unregistered");
                }
            }
            FaceEvent::PropertiesChanged { low_bit_ambient } => {
                self.modes.set_low_bit_ambient(low_bit_ambient);
            }
            FaceEvent::InsetsApplied { round } => {
                if self.renderer.set_round(round) {
                    actions.push(FaceAction::Redraw);
                }
            }
            FaceEvent::TimeTick => actions.push(FaceAction::Redraw),
            FaceEvent::TimerFired { generation } => {
                let active = self.modes.is_active_for_timer();
                actions.extend(
                    self.scheduler
                        .on_tick(generation, active, now_ms)
                        .into_iter()
                        .map(FaceAction::from),
                );
            }
            FaceEvent::ChannelConnected => {
                actions.extend(self.channel.on_connected().map(FaceAction::from));
            }
            FaceEvent::ListenerRegistered => self.channel.on_listener_registered(),
            FaceEvent::ChannelSuspended(reason) => self.channel.on_connection_suspended(reason),
            FaceEvent::ChannelFailed(result) => self.channel.on_connection_failed(&result),
            FaceEvent::DataChanged(events) => {
                if self.channel.on_data_event(&events, &mut self.weather) {
                    actions.push(FaceAction::Redraw);
                }
            }
            FaceEvent::Destroyed => {
                info!("face destroyed");
                actions.extend(self.scheduler.teardown().into_iter().map(FaceAction::from));
                self.unregister_timezone_receiver(&mut actions);
                actions.extend(self.channel.disconnect().map(FaceAction::from));
                self.destroyed = true;
            }
        }

        actions
    }

    /// Samples the wall clock and lays out one frame.
    pub fn frame(&mut self, wall: &impl WallClock, measure: &impl TextMeasure) -> Vec<DrawCommand> {
        self.clock.sample(wall.now_ms());
        self.frames_rendered = self.frames_rendered.saturating_add(1);
        self.renderer
            .render(&self.clock, &self.weather, self.modes.mode(), measure)
    }

    pub fn status(&self) -> FaceStatus {
        FaceStatus {
            visible: self.modes.is_visible(),
            ambient: self.modes.is_ambient(),
            low_bit_ambient: self.modes.is_low_bit_ambient(),
            timer_active: self.modes.is_active_for_timer(),
            pending_tick: self.scheduler.pending_generation(),
            round: self.renderer.is_round(),
            timezone: self.clock.timezone().name().to_string(),
            time_text: self.clock.time_text(),
            date_text: self.clock.date_text(),
            weather: self.weather.clone(),
            icon: self.weather.icon().as_str(),
            channel: self.channel.state().as_str(),
            updates_applied: self.channel.updates_applied(),
            events_rejected: self.channel.events_rejected(),
            frames_rendered: self.frames_rendered,
            destroyed: self.destroyed,
        }
    }

    fn on_visibility_changed(
        &mut self,
        visible: bool,
        wall: &impl WallClock,
        actions: &mut Vec<FaceAction>,
    ) {
        debug!("visibility changed: {visible}");
        self.modes.set_visible(visible);

        if visible {
            if !self.timezone_receiver_registered {
                self.timezone_receiver_registered = true;
                actions.push(FaceAction::RegisterTimezoneReceiver);
            }
            // The zone may have changed while nobody was listening.
            self.clock.set_timezone(wall.local_timezone());
            actions.push(FaceAction::Redraw);
            actions.extend(self.channel.connect().map(FaceAction::from));
        } else {
            self.unregister_timezone_receiver(actions);
            actions.extend(self.channel.disconnect().map(FaceAction::from));
        }

        self.update_timer(wall.now_ms(), actions);
    }

    fn unregister_timezone_receiver(&mut self, actions: &mut Vec<FaceAction>) {
        if self.timezone_receiver_registered {
            self.timezone_receiver_registered = false;
            actions.push(FaceAction::UnregisterTimezoneReceiver);
        }
    }

    fn update_timer(&mut self, now_ms: i64, actions: &mut Vec<FaceAction>) {
        let active = self.modes.is_active_for_timer();
        actions.extend(
            self.scheduler
                .start(active, now_ms)
                .into_iter()
                .map(FaceAction::from),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::FixedClock, render::MonospaceMeasure, weather::WeatherIcon};
    use chrono_tz::{America::New_York, UTC};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const T0: i64 = 1_760_781_600_000;

    fn engine() -> FaceEngine {
        FaceEngine::new(&RuntimeConfig::default(), T0, UTC)
    }

    fn wall(now_ms: i64) -> FixedClock {
        FixedClock::new(now_ms, UTC)
    }

    fn weather_event(path: &str, high: &str, low: &str, id: i64) -> ChangeEvent {
        let payload = json!({ "high_temp": high, "low_temp": low, "weather_id": id });
        ChangeEvent::changed(path, payload.as_object().cloned().unwrap_or_default())
    }

    fn connected(engine: &mut FaceEngine) {
        let clock = wall(T0);
        engine.handle(FaceEvent::Created, &clock);
        engine.handle(FaceEvent::ChannelConnected, &clock);
        engine.handle(FaceEvent::ListenerRegistered, &clock);
    }

    fn temperature_texts(frame: &[DrawCommand]) -> Vec<String> {
        frame
            .iter()
            .skip(3)
            .filter_map(|command| match command {
                DrawCommand::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn created_requests_channel_connection() {
        let mut engine = engine();
        let actions = engine.handle(FaceEvent::Created, &wall(T0));
        assert_eq!(actions, vec![FaceAction::ConnectChannel]);
    }

    #[test]
    fn becoming_visible_registers_receiver_and_starts_timer() {
        let mut engine = engine();
        engine.handle(FaceEvent::Created, &wall(T0));

        let actions = engine.handle(
            FaceEvent::VisibilityChanged(true),
            &FixedClock::new(T0 + 250, New_York),
        );

        assert_eq!(
            actions,
            vec![
                FaceAction::RegisterTimezoneReceiver,
                FaceAction::Redraw,
                FaceAction::ScheduleTick {
                    generation: 1,
                    delay_ms: 0
                },
            ]
        );
        assert_eq!(engine.clock().timezone(), New_York);
    }

    #[test]
    fn hiding_disconnects_and_stops_ticks() {
        let mut engine = engine();
        connected(&mut engine);
        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));

        let actions = engine.handle(FaceEvent::VisibilityChanged(false), &wall(T0 + 10));

        assert_eq!(
            actions,
            vec![
                FaceAction::UnregisterTimezoneReceiver,
                FaceAction::DisconnectChannel,
                FaceAction::CancelTicks,
            ]
        );
        assert!(!engine.scheduler().has_pending());
    }

    #[test]
    fn showing_again_reconnects_channel() {
        let mut engine = engine();
        connected(&mut engine);
        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));
        engine.handle(FaceEvent::VisibilityChanged(false), &wall(T0));

        let actions = engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));

        assert!(actions.contains(&FaceAction::ConnectChannel));
    }

    #[test]
    fn pending_tick_tracks_timer_predicate_for_all_sequences() {
        let events = [
            FaceEvent::VisibilityChanged(true),
            FaceEvent::VisibilityChanged(false),
            FaceEvent::AmbientModeChanged(true),
            FaceEvent::AmbientModeChanged(false),
        ];

        // Every sequence of length 5 over the four transitions.
        for mut code in 0..4_usize.pow(5) {
            let mut engine = engine();
            let mut now = T0;
            for _ in 0..5 {
                let event = events[code % 4].clone();
                code /= 4;
                now += 137;
                engine.handle(event, &wall(now));

                assert_eq!(
                    engine.scheduler().has_pending(),
                    engine.modes().is_active_for_timer()
                );
            }
        }
    }

    #[test]
    fn ticks_reschedule_on_second_boundaries_while_interactive() {
        let mut engine = engine();
        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));
        let first = engine.scheduler().pending_generation().unwrap();

        let actions = engine.handle(FaceEvent::TimerFired { generation: first }, &wall(T0 + 420));

        assert_eq!(
            actions,
            vec![
                FaceAction::Redraw,
                FaceAction::ScheduleTick {
                    generation: first + 1,
                    delay_ms: 580
                },
            ]
        );
        assert_eq!(engine.scheduler().pending_due_ms(), Some(T0 + 1_000));
    }

    #[test]
    fn ambient_stops_interactive_ticks_and_in_flight_tick_is_dropped() {
        let mut engine = engine();
        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));
        let in_flight = engine.scheduler().pending_generation().unwrap();

        let actions = engine.handle(FaceEvent::AmbientModeChanged(true), &wall(T0 + 5));
        assert_eq!(actions, vec![FaceAction::Redraw, FaceAction::CancelTicks]);

        let late = engine.handle(FaceEvent::TimerFired { generation: in_flight }, &wall(T0 + 1_000));
        assert!(late.is_empty());

        // Ambient still redraws on the OS minute tick.
        assert_eq!(
            engine.handle(FaceEvent::TimeTick, &wall(T0 + 60_000)),
            vec![FaceAction::Redraw]
        );
    }

    #[test]
    fn invisible_face_never_ticks_again_without_restart() {
        let mut engine = engine();
        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));
        let in_flight = engine.scheduler().pending_generation().unwrap();
        engine.handle(FaceEvent::VisibilityChanged(false), &wall(T0 + 1));

        for offset in [0, 1_000, 2_000] {
            let actions = engine.handle(
                FaceEvent::TimerFired {
                    generation: in_flight + offset as u64 / 1_000,
                },
                &wall(T0 + offset),
            );
            assert!(actions.is_empty());
        }
        assert!(!engine.scheduler().has_pending());
    }

    #[test]
    fn timezone_change_applies_only_while_registered() {
        let mut engine = engine();
        let tokyo = FixedClock::new(T0, chrono_tz::Asia::Tokyo);

        assert!(engine.handle(FaceEvent::TimezoneChanged, &tokyo).is_empty());
        assert_eq!(engine.clock().timezone(), UTC);

        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));
        assert_eq!(
            engine.handle(FaceEvent::TimezoneChanged, &tokyo),
            vec![FaceAction::Redraw]
        );
        assert_eq!(engine.clock().timezone(), chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn low_bit_property_is_learned_once() {
        let mut engine = engine();
        engine.handle(FaceEvent::PropertiesChanged { low_bit_ambient: true }, &wall(T0));
        engine.handle(FaceEvent::PropertiesChanged { low_bit_ambient: false }, &wall(T0));
        assert!(engine.modes().is_low_bit_ambient());
    }

    #[test]
    fn mismatched_path_never_overwrites_snapshot() {
        let mut engine = engine();
        connected(&mut engine);
        let before = engine.weather().clone();

        let actions = engine.handle(
            FaceEvent::DataChanged(vec![weather_event("/forecast", "90", "80", 200)]),
            &wall(T0),
        );

        assert!(actions.is_empty());
        assert_eq!(engine.weather(), &before);
    }

    #[test]
    fn defaults_then_remote_update_scenario() {
        let mut engine = engine();
        connected(&mut engine);
        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));
        let measure = MonospaceMeasure::default();

        let first = engine.frame(&wall(T0), &measure);
        assert_eq!(temperature_texts(&first), vec!["--", "--"]);
        assert!(matches!(
            first[3],
            DrawCommand::Icon {
                icon: WeatherIcon::Clear,
                size: 40,
                ..
            }
        ));

        let actions = engine.handle(
            FaceEvent::DataChanged(vec![weather_event("/weather", "75", "60", 801)]),
            &wall(T0 + 3),
        );
        assert_eq!(actions, vec![FaceAction::Redraw]);

        let next = engine.frame(&wall(T0 + 4), &measure);
        assert_eq!(temperature_texts(&next), vec!["75", "60"]);
        assert!(matches!(
            next[3],
            DrawCommand::Icon {
                icon: WeatherIcon::LightClouds,
                ..
            }
        ));
        assert_eq!(engine.status().updates_applied, 1);
    }

    #[test]
    fn ambient_frame_drops_weather_row() {
        let mut engine = engine();
        connected(&mut engine);
        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));
        engine.handle(
            FaceEvent::DataChanged(vec![weather_event("/weather", "75", "60", 801)]),
            &wall(T0),
        );
        engine.handle(FaceEvent::AmbientModeChanged(true), &wall(T0));

        let frame = engine.frame(&wall(T0), &MonospaceMeasure::default());

        assert_eq!(frame.len(), 3);
        assert!(temperature_texts(&frame).is_empty());
    }

    #[test]
    fn destroyed_engine_ignores_everything() {
        let mut engine = engine();
        connected(&mut engine);
        engine.handle(FaceEvent::VisibilityChanged(true), &wall(T0));
        let in_flight = engine.scheduler().pending_generation().unwrap();

        let actions = engine.handle(FaceEvent::Destroyed, &wall(T0));
        assert_eq!(
            actions,
            vec![
                FaceAction::CancelTicks,
                FaceAction::UnregisterTimezoneReceiver,
                FaceAction::DisconnectChannel,
            ]
        );

        assert!(engine
            .handle(FaceEvent::TimerFired { generation: in_flight }, &wall(T0))
            .is_empty());
        assert!(engine
            .handle(FaceEvent::VisibilityChanged(true), &wall(T0))
            .is_empty());
        assert!(engine.status().destroyed);
        assert!(engine.is_destroyed());
        assert!(engine.scheduler().is_torn_down());
    }
}

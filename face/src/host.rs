use std::{io::ErrorKind, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use chrono_tz::Tz;
use rumqttc::{AsyncClient, MqttOptions};
use tokio::{
    net::TcpListener,
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        watch,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use weatherface_common::{
    render::DrawCommand, scheduler::next_delay_ms, DrawSurface, FaceAction, FaceEngine, FaceEvent,
    FaceStatus, MonospaceMeasure, RuntimeConfig, SystemClock,
};

use crate::{
    api::{self, ApiState},
    channel::RemoteChannel,
    surface::RecordingSurface,
};

const MINUTE_MS: u64 = 60_000;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    runtime.sanitize();

    let timezone = runtime.parsed_timezone().unwrap_or_else(|err| {
        warn!("{err}, falling back to UTC");
        chrono_tz::UTC
    });
    let zone = Arc::new(watch::channel(timezone).0);

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("weatherface-face", mqtt_host, mqtt_port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    let channel = RemoteChannel::spawn(mqtt, eventloop, events_tx.clone());

    let engine = FaceEngine::new(&runtime, Utc::now().timestamp_millis(), timezone);
    let (face, status_rx, frame_rx) =
        FaceHost::new(engine, channel, zone.subscribe(), events_tx.clone());

    // Boot sequence a watch face sees from the OS.
    for event in [
        FaceEvent::Created,
        FaceEvent::PropertiesChanged {
            low_bit_ambient: false,
        },
        FaceEvent::VisibilityChanged(true),
    ] {
        events_tx
            .send(event)
            .context("face event queue closed during startup")?;
    }
    let face_task = tokio::spawn(face.run(events_rx));

    spawn_minute_ticks(events_tx.clone());

    let app = api::router(ApiState {
        events: events_tx.clone(),
        timezone: zone,
        status: status_rx,
        frame: frame_rx,
    });

    let port = std::env::var("FACE_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind face server at {addr}"))?;

    info!("face listening on http://{addr}");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!("face http server stopped: {err}");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    if events_tx.send(FaceEvent::Destroyed).is_err() {
        debug!("face loop already stopped");
    }
    face_task.await.context("face loop panicked")?;
    Ok(())
}

async fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let Ok(path) = std::env::var("WEATHERFACE_CONFIG").map(PathBuf::from) else {
        return Ok(RuntimeConfig::default());
    };

    match tokio::fs::read(&path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid config at {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("no config at {}, using defaults", path.display());
            Ok(RuntimeConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn spawn_minute_ticks(events: UnboundedSender<FaceEvent>) {
    tokio::spawn(async move {
        loop {
            let delay = next_delay_ms(Utc::now().timestamp_millis(), MINUTE_MS);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if events.send(FaceEvent::TimeTick).is_err() {
                return;
            }
        }
    });
}

/// Owns the engine and every platform handle it drives. All events, whether
/// from HTTP, MQTT or timers, are consumed here one at a time.
struct FaceHost {
    engine: FaceEngine,
    surface: RecordingSurface,
    measure: MonospaceMeasure,
    channel: RemoteChannel,
    zone: watch::Receiver<Tz>,
    events: UnboundedSender<FaceEvent>,
    pending_tick: Option<JoinHandle<()>>,
    status: watch::Sender<FaceStatus>,
    frame: watch::Sender<Vec<DrawCommand>>,
}

impl FaceHost {
    fn new(
        engine: FaceEngine,
        channel: RemoteChannel,
        zone: watch::Receiver<Tz>,
        events: UnboundedSender<FaceEvent>,
    ) -> (
        Self,
        watch::Receiver<FaceStatus>,
        watch::Receiver<Vec<DrawCommand>>,
    ) {
        let (status, status_rx) = watch::channel(engine.status());
        let (frame, frame_rx) = watch::channel(Vec::new());
        let host = Self {
            engine,
            surface: RecordingSurface::default(),
            measure: MonospaceMeasure::default(),
            channel,
            zone,
            events,
            pending_tick: None,
            status,
            frame,
        };
        (host, status_rx, frame_rx)
    }

    async fn run(mut self, mut events: UnboundedReceiver<FaceEvent>) {
        while let Some(event) = events.recv().await {
            let destroyed = matches!(event, FaceEvent::Destroyed);
            debug!("face event: {event:?}");

            let wall = self.wall_clock();
            let actions = self.engine.handle(event, &wall);
            self.execute(actions).await;
            self.status.send_replace(self.engine.status());

            if destroyed {
                break;
            }
        }
        info!("face loop stopped");
    }

    fn wall_clock(&self) -> SystemClock {
        SystemClock {
            timezone: *self.zone.borrow(),
        }
    }

    async fn execute(&mut self, actions: Vec<FaceAction>) {
        let mut redraw = false;

        for action in actions {
            match action {
                FaceAction::Redraw => redraw = true,
                FaceAction::ScheduleTick {
                    generation,
                    delay_ms,
                } => self.schedule_tick(generation, delay_ms),
                FaceAction::CancelTicks => {
                    if let Some(handle) = self.pending_tick.take() {
                        handle.abort();
                    }
                }
                FaceAction::ConnectChannel => self.channel.connect(),
                FaceAction::RegisterDataListener => {
                    if let Err(err) = self.channel.register_listener().await {
                        warn!("weather listener registration failed: {err:#}");
                    }
                }
                FaceAction::DisconnectChannel => self.channel.disconnect().await,
                FaceAction::RegisterTimezoneReceiver => debug!("timezone receiver registered"),
                FaceAction::UnregisterTimezoneReceiver => debug!("timezone receiver unregistered"),
            }
        }

        if redraw {
            let wall = self.wall_clock();
            let commands = self.engine.frame(&wall, &self.measure);
            self.surface.present(&commands);
            self.frame.send_replace(self.surface.last_frame().to_vec());
        }
    }

    fn schedule_tick(&mut self, generation: u64, delay_ms: u64) {
        if let Some(handle) = self.pending_tick.take() {
            handle.abort();
        }

        let events = self.events.clone();
        self.pending_tick = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = events.send(FaceEvent::TimerFired { generation });
        }));
    }
}

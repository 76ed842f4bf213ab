use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Incoming, Outgoing, QoS};
use serde_json::Value;
use tokio::sync::{mpsc::UnboundedSender, watch};
use tracing::{debug, info, warn};

use weatherface_common::{ChangeEvent, FaceEvent, TOPIC_DATA_EVENTS};

const MAX_MQTT_PAYLOAD_BYTES: usize = 4_096;

/// Suspension causes reported to the face.
pub const CAUSE_SERVICE_DISCONNECTED: i32 = 1;
pub const CAUSE_NETWORK_LOST: i32 = 2;

/// MQTT-backed companion link. The event loop only polls while the face
/// wants a connection, or while a requested disconnect is still being
/// flushed; everything it learns is queued as a `FaceEvent`.
pub struct RemoteChannel {
    mqtt: AsyncClient,
    wanted: watch::Sender<bool>,
    releasing: Arc<AtomicBool>,
}

impl RemoteChannel {
    pub fn spawn(mqtt: AsyncClient, eventloop: EventLoop, events: UnboundedSender<FaceEvent>) -> Self {
        let (wanted, wanted_rx) = watch::channel(false);
        let releasing = Arc::new(AtomicBool::new(false));
        tokio::spawn(poll_loop(eventloop, wanted_rx, releasing.clone(), events));
        Self {
            mqtt,
            wanted,
            releasing,
        }
    }

    pub fn connect(&self) {
        info!("connecting weather channel");
        self.wanted.send_replace(true);
    }

    /// Queues DISCONNECT; the poll loop keeps running until the session is
    /// closed, then parks.
    pub async fn disconnect(&self) {
        info!("disconnecting weather channel");
        match self.mqtt.disconnect().await {
            Ok(()) => self.releasing.store(true, Ordering::SeqCst),
            Err(err) => debug!("mqtt disconnect request failed: {err}"),
        }
        self.wanted.send_replace(false);
    }

    /// Completion arrives later as `ListenerRegistered` on SubAck.
    pub async fn register_listener(&self) -> anyhow::Result<()> {
        self.mqtt
            .subscribe(TOPIC_DATA_EVENTS, QoS::AtLeastOnce)
            .await
            .context("failed to subscribe to weather data events")
    }

    #[cfg(test)]
    fn is_releasing(&self) -> bool {
        self.releasing.load(Ordering::SeqCst)
    }
}

async fn poll_loop(
    mut eventloop: EventLoop,
    mut wanted: watch::Receiver<bool>,
    releasing: Arc<AtomicBool>,
    events: UnboundedSender<FaceEvent>,
) {
    // Set once DISCONNECT has gone out; the error that follows is the
    // session closing, not a fault.
    let mut closing = false;

    loop {
        if !*wanted.borrow_and_update() && !releasing.load(Ordering::SeqCst) {
            if wanted.changed().await.is_err() {
                return;
            }
            continue;
        }

        let event = match eventloop.poll().await {
            Ok(Event::Incoming(packet)) => incoming_event(packet),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("mqtt disconnect sent, waiting for the session to close");
                closing = true;
                None
            }
            Ok(_) => None,
            Err(err) => {
                let released = releasing.swap(false, Ordering::SeqCst);
                let event = error_event(&err, closing || released, *wanted.borrow());
                closing = false;
                if event.is_some() {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                } else {
                    debug!("mqtt session ended: {err}");
                }
                event
            }
        };

        if let Some(event) = event {
            if events.send(event).is_err() {
                return;
            }
        }
    }
}

fn incoming_event(packet: Incoming) -> Option<FaceEvent> {
    match packet {
        Incoming::ConnAck(_) => Some(FaceEvent::ChannelConnected),
        Incoming::SubAck(_) => Some(FaceEvent::ListenerRegistered),
        Incoming::Publish(message) if message.topic == TOPIC_DATA_EVENTS => {
            match decode_events(&message.payload) {
                Ok(batch) if batch.is_empty() => None,
                Ok(batch) => Some(FaceEvent::DataChanged(batch)),
                Err(err) => {
                    warn!("dropping undecodable data event batch: {err:#}");
                    None
                }
            }
        }
        _ => None,
    }
}

/// A poll error is only reported while the face wants the link and the
/// session was not closed on purpose.
fn error_event(err: &ConnectionError, closed_on_purpose: bool, wanted: bool) -> Option<FaceEvent> {
    if closed_on_purpose || !wanted {
        return None;
    }
    Some(connection_event(err))
}

fn connection_event(err: &ConnectionError) -> FaceEvent {
    match err {
        ConnectionError::ConnectionRefused(code) => FaceEvent::ChannelFailed(format!("{code:?}")),
        ConnectionError::Io(_) | ConnectionError::NetworkTimeout => {
            FaceEvent::ChannelSuspended(CAUSE_NETWORK_LOST)
        }
        _ => FaceEvent::ChannelSuspended(CAUSE_SERVICE_DISCONNECTED),
    }
}

/// Accepts either a JSON array of change events or a single event. Elements
/// are decoded one by one; an element that does not decode is skipped and
/// the rest of the batch still goes through.
pub fn decode_events(payload: &[u8]) -> anyhow::Result<Vec<ChangeEvent>> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        anyhow::bail!("payload too large ({} bytes)", payload.len());
    }

    let items = match serde_json::from_slice::<Value>(payload).context("payload is not JSON")? {
        Value::Array(items) => items,
        single @ Value::Object(_) => vec![single],
        other => anyhow::bail!("expected a change event or a batch, got {other}"),
    };

    let mut batch = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<ChangeEvent>(item) {
            Ok(event) => batch.push(event),
            Err(err) => warn!("skipping change event {index}: {err}"),
        }
    }
    Ok(batch)
}

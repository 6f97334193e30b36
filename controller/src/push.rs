use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use climate_common::{
    InboundMessage, OutboundMessage, PushConfig, SensorReading, TOPIC_COMMAND, TOPIC_SENSOR,
};

use crate::{
    control_client::ControlClient, dispatcher::SharedDispatcher, error::RemoteError,
    reconcile::apply_manual_command,
};

const REQUEST_CAPACITY: usize = 64;

pub fn connect(config: &PushConfig) -> (PushPublisher, EventLoop) {
    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.mqtt_host.clone(),
        config.mqtt_port,
    );
    options.set_keep_alive(Duration::from_secs(30));
    if !config.mqtt_user.is_empty() {
        options.set_credentials(config.mqtt_user.clone(), config.mqtt_pass.clone());
    }

    let (mqtt, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    (PushPublisher { mqtt }, eventloop)
}

/// Outbound half of the push channel. Publishing never waits on the broker: a
/// full request queue drops the message.
#[derive(Clone)]
pub struct PushPublisher {
    mqtt: AsyncClient,
}

impl PushPublisher {
    pub fn publish_reading(&self, reading: &SensorReading) {
        let body = match serde_json::to_vec(&OutboundMessage::Sensor(reading)) {
            Ok(body) => body,
            Err(err) => {
                warn!("sensor message serialization failed: {err}");
                return;
            }
        };

        if let Err(err) = self
            .mqtt
            .try_publish(TOPIC_SENSOR, QoS::AtMostOnce, false, body)
        {
            warn!("sensor publish dropped: {err}");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Applied,
    Dropped,
}

/// Handles one payload from the command topic. Anything that is not a
/// well-formed command within the size limit is dropped.
pub async fn handle_push_payload(
    payload: &[u8],
    max_payload_bytes: usize,
    client: &ControlClient,
    dispatcher: &SharedDispatcher,
) -> Result<PushOutcome, RemoteError> {
    if payload.len() > max_payload_bytes {
        debug!("dropping {} byte push payload", payload.len());
        return Ok(PushOutcome::Dropped);
    }

    let InboundMessage::Command(command) = match serde_json::from_slice(payload) {
        Ok(message) => message,
        Err(err) => {
            debug!("dropping push payload: {err}");
            return Ok(PushOutcome::Dropped);
        }
    };

    apply_manual_command(client, dispatcher, command).await?;
    info!("manual command applied: {command:?}");
    Ok(PushOutcome::Applied)
}

/// Drives the MQTT connection. Subscribes on every (re)connect and routes
/// command payloads to the control store and the device.
pub fn spawn_command_listener(
    publisher: PushPublisher,
    mut eventloop: EventLoop,
    config: PushConfig,
    client: ControlClient,
    dispatcher: SharedDispatcher,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if message.topic != TOPIC_COMMAND {
                        continue;
                    }
                    if let Err(err) = handle_push_payload(
                        &message.payload,
                        config.max_payload_bytes,
                        &client,
                        &dispatcher,
                    )
                    .await
                    {
                        warn!("manual command not applied: {err}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected to {}:{}", config.mqtt_host, config.mqtt_port);
                    if let Err(err) = publisher.mqtt.try_subscribe(TOPIC_COMMAND, QoS::AtMostOnce)
                    {
                        warn!("mqtt subscribe failed: {err}");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
                }
            }
        }
    })
}

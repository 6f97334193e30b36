use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Local;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use climate_common::{
    minute_of_day, parse_reading, ActuatorLevels, CommandTracker, ControlPatch, OverrideToken,
    RuntimeConfig, ThermostatEngine, ThermostatState, TIMESTAMP_FORMAT,
};

use crate::{
    control_client::ControlClient,
    dispatcher::SharedDispatcher,
    error::{LinkError, StoreError},
    link::{LinkOpener, LineSource},
    push::PushPublisher,
    reconcile::apply_token,
    store::TelemetryStore,
};

/// Snapshot of the loop for the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStatus {
    pub link_connected: bool,
    pub commanded: CommandTracker,
    pub applied: Option<ActuatorLevels>,
    pub thermostat_state: Option<ThermostatState>,
    pub last_decision: Option<String>,
    pub scheduled_setpoint: Option<f64>,
    pub readings_stored: u64,
}

pub type SharedStatus = Arc<Mutex<LoopStatus>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Control state could not be fetched; nothing was actuated.
    Skipped,
    NoReading,
    Applied(ActuatorLevels),
    /// The device did not take the decided levels; the link must be reopened.
    LinkFault,
}

pub struct ControlLoop {
    opener: Arc<dyn LinkOpener>,
    retry_delay: Duration,
    decision_interval: Duration,
    store: TelemetryStore,
    client: ControlClient,
    engine: ThermostatEngine,
    dispatcher: SharedDispatcher,
    publisher: Option<PushPublisher>,
    status: SharedStatus,
    last_decision: Option<Instant>,
    last_mirrored: Option<ActuatorLevels>,
}

impl ControlLoop {
    pub fn new(
        config: &RuntimeConfig,
        opener: Arc<dyn LinkOpener>,
        store: TelemetryStore,
        client: ControlClient,
        dispatcher: SharedDispatcher,
        publisher: Option<PushPublisher>,
        status: SharedStatus,
    ) -> Self {
        Self {
            opener,
            retry_delay: Duration::from_millis(config.serial.retry_delay_ms),
            decision_interval: Duration::from_millis(config.control.decision_interval_ms),
            store,
            client,
            engine: ThermostatEngine::new(config.thermostat.clone()),
            dispatcher,
            publisher,
            status,
            last_decision: None,
            last_mirrored: None,
        }
    }

    /// Runs until a persistence fault. Link faults only pause the loop.
    pub async fn run(&mut self) -> Result<(), StoreError> {
        loop {
            match self.open_link().await {
                Ok(reader) => self.pump(reader).await?,
                Err(err) => warn!("device link unavailable: {err}"),
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn open_link(&mut self) -> Result<Box<dyn LineSource>, LinkError> {
        let opener = self.opener.clone();
        let (reader, writer) = tokio::task::spawn_blocking(move || opener.open())
            .await
            .map_err(|err| LinkError::Io(std::io::Error::other(err)))??;

        self.dispatcher.lock().await.attach(writer);
        self.status.lock().await.link_connected = true;
        Ok(reader)
    }

    async fn drop_link(&mut self, reason: impl std::fmt::Display) {
        warn!("device link fault: {reason}");
        self.dispatcher.lock().await.detach();
        self.status.lock().await.link_connected = false;
    }

    /// Reads lines until the link faults, running decision cycles in between.
    pub async fn pump(&mut self, mut reader: Box<dyn LineSource>) -> Result<(), StoreError> {
        loop {
            let read = tokio::task::spawn_blocking(move || {
                let line = reader.read_line();
                (reader, line)
            })
            .await;

            let line = match read {
                Ok((returned, line)) => {
                    reader = returned;
                    line
                }
                Err(err) => {
                    self.drop_link(format!("line reader panicked: {err}")).await;
                    return Ok(());
                }
            };

            match line {
                Ok(Some(line)) => self.handle_line(&line).await?,
                Ok(None) => {}
                Err(err) => {
                    self.drop_link(err).await;
                    return Ok(());
                }
            }

            let now = Instant::now();
            if self.decision_due(now) {
                self.last_decision = Some(now);
                if self.run_decision_cycle().await? == CycleOutcome::LinkFault {
                    self.drop_link("device rejected actuator commands").await;
                    return Ok(());
                }
            }
        }
    }

    fn decision_due(&self, now: Instant) -> bool {
        self.last_decision
            .map_or(true, |last| now.duration_since(last) >= self.decision_interval)
    }

    /// Routes one device line: override tokens go to the control store,
    /// telemetry is stored and then published.
    pub async fn handle_line(&mut self, line: &str) -> Result<(), StoreError> {
        if let Some(token) = OverrideToken::parse(line) {
            if let Err(err) = apply_token(&self.client, token).await {
                warn!("override token {} not applied: {err}", token.as_wire());
            }
            return Ok(());
        }

        let fields = match parse_reading(line) {
            Ok(fields) => fields,
            Err(err) => {
                debug!("discarding device line: {err}");
                return Ok(());
            }
        };

        let reading = self.store.append(&fields).inspect_err(|err| {
            error!("failed to persist reading: {err}");
        })?;
        self.status.lock().await.readings_stored += 1;

        if let Some(publisher) = &self.publisher {
            publisher.publish_reading(&reading);
        }
        Ok(())
    }

    pub async fn run_decision_cycle(&mut self) -> Result<CycleOutcome, StoreError> {
        let control = match self.client.fetch().await {
            Ok(control) => control,
            Err(err) => {
                warn!("control state unavailable, skipping cycle: {err}");
                return Ok(CycleOutcome::Skipped);
            }
        };

        let Some(reading) = self.store.latest()? else {
            debug!("no reading stored yet");
            return Ok(CycleOutcome::NoReading);
        };

        let levels = self.engine.decide(&reading.fields, &control);
        let scheduled_setpoint = if control.use_schedule {
            control
                .schedule
                .scheduled_setpoint(minute_of_day(Local::now().time()))
        } else {
            None
        };

        let (dispatched, commanded) = {
            let mut dispatcher = self.dispatcher.lock().await;
            let dispatched = dispatcher.dispatch(&levels.into()).await;
            (dispatched, dispatcher.tracker())
        };
        self.status.lock().await.commanded = commanded;

        if let Err(err) = dispatched {
            warn!("actuator dispatch failed: {err}");
            return Ok(CycleOutcome::LinkFault);
        }

        if self.last_mirrored != Some(levels) {
            match self.client.patch(&ControlPatch::applied(levels)).await {
                Ok(()) => {
                    info!("applied levels changed: {levels:?}");
                    self.last_mirrored = Some(levels);
                }
                Err(err) => warn!("failed to mirror applied levels: {err}"),
            }
        }

        let mut status = self.status.lock().await;
        status.applied = Some(levels);
        status.thermostat_state = Some(self.engine.state());
        status.last_decision = Some(Local::now().format(TIMESTAMP_FORMAT).to_string());
        status.scheduled_setpoint = scheduled_setpoint;

        Ok(CycleOutcome::Applied(levels))
    }
}

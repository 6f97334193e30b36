use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use climate_common::RuntimeConfig;

use crate::{
    api::{self, ApiState},
    control_client::ControlClient,
    dispatcher::ActuatorDispatcher,
    link::SerialOpener,
    push,
    scheduler::{ControlLoop, SharedStatus},
    store::TelemetryStore,
};

const DEFAULT_CONFIG_PATH: &str = "./climate.json";

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("CLIMATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = load_config(&config_path).await.unwrap_or_else(|err| {
        warn!("failed to load config from {}: {err:#}", config_path.display());
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.sanitize();

    let store = TelemetryStore::open(&config.storage.db_path)
        .with_context(|| format!("failed to open telemetry store {}", config.storage.db_path))?;
    let client =
        ControlClient::new(&config.control).context("failed to build control store client")?;
    info!("control store at {}", client.url());

    let dispatcher = ActuatorDispatcher::new().shared();
    let status = SharedStatus::default();

    let publisher = if config.push.enabled {
        let (publisher, eventloop) = push::connect(&config.push);
        push::spawn_command_listener(
            publisher.clone(),
            eventloop,
            config.push.clone(),
            client.clone(),
            dispatcher.clone(),
        );
        Some(publisher)
    } else {
        info!("push channel disabled");
        None
    };

    if config.http.enabled {
        let addr: SocketAddr = ([0, 0, 0, 0], config.http.port).into();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind controller server at {addr}"))?;
        let app = api::router(ApiState {
            store: store.clone(),
            status: status.clone(),
        });

        info!("controller listening on http://{addr}");
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!("controller server stopped: {err}");
            }
        });
    }

    let opener = Arc::new(SerialOpener {
        config: config.serial.clone(),
    });
    let mut control_loop = ControlLoop::new(
        &config,
        opener,
        store,
        client,
        dispatcher,
        publisher,
        status,
    );

    tokio::select! {
        result = control_loop.run() => {
            result.context("control loop stopped on a persistence fault")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("shutdown requested");
        }
    }
    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

/// Environment variables take precedence over the config file. Unparseable
/// numeric values are ignored.
fn apply_env_overrides(config: &mut RuntimeConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(port) = var("SERIAL_PORT") {
        config.serial.port = port;
    }
    if let Some(baud) = var("SERIAL_BAUD").and_then(|value| value.parse().ok()) {
        config.serial.baud_rate = baud;
    }
    if let Some(url) = var("CONTROL_URL") {
        config.control.url = url;
    }
    if let Some(path) = var("CLIMATE_DB_PATH") {
        config.storage.db_path = path;
    }
    if let Some(host) = var("MQTT_HOST") {
        config.push.mqtt_host = host;
        config.push.enabled = true;
    }
    if let Some(port) = var("MQTT_PORT").and_then(|value| value.parse().ok()) {
        config.push.mqtt_port = port;
    }
    if let Some(user) = var("MQTT_USER") {
        config.push.mqtt_user = user;
    }
    if let Some(pass) = var("MQTT_PASS") {
        config.push.mqtt_pass = pass;
    }
    if let Some(port) = var("CONTROLLER_HTTP_PORT").and_then(|value| value.parse().ok()) {
        config.http.port = port;
    }
}

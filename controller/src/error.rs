use thiserror::Error;

/// Device link faults. Never fatal: the scheduler pauses and reopens the port.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial link is not connected")]
    Disconnected,
}

/// Control-state store faults. The caller skips the current cycle.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("control store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("control store responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// Telemetry persistence faults. Surfaced to the top of the control loop.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored timestamp {0:?} is malformed")]
    Timestamp(String),
    #[error("telemetry store lock poisoned")]
    Poisoned,
}

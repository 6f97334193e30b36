use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use climate_common::{ActuatorUpdate, CommandTracker};

use crate::{error::LinkError, link::CommandSink};

pub type SharedDispatcher = Arc<Mutex<ActuatorDispatcher>>;

/// Owns the write side of the device link. Commands are edge-triggered: only
/// actuators whose desired state differs from the last commanded one are
/// written.
pub struct ActuatorDispatcher {
    sink: Option<Box<dyn CommandSink>>,
    tracker: CommandTracker,
}

impl ActuatorDispatcher {
    pub fn new() -> Self {
        Self {
            sink: None,
            tracker: CommandTracker::default(),
        }
    }

    pub fn shared(self) -> SharedDispatcher {
        Arc::new(Mutex::new(self))
    }

    /// Installs a freshly opened link. The device resets on open, so every
    /// actuator is treated as unknown until commanded again.
    pub fn attach(&mut self, sink: Box<dyn CommandSink>) {
        self.sink = Some(sink);
        self.tracker.reset();
    }

    pub fn detach(&mut self) {
        self.sink = None;
    }

    pub fn tracker(&self) -> CommandTracker {
        self.tracker
    }

    /// Writes the commands needed to reach `update` and returns how many were
    /// sent. Stops at the first failed write; the failed actuator and any
    /// after it stay pending for the next dispatch.
    ///
    /// Serial writes block, so they run on the blocking pool. A panicked
    /// write loses the sink and leaves the dispatcher detached.
    pub async fn dispatch(&mut self, update: &ActuatorUpdate) -> Result<usize, LinkError> {
        let commands = self.tracker.pending(update);
        if commands.is_empty() {
            return Ok(0);
        }

        let mut sink = self.sink.take().ok_or(LinkError::Disconnected)?;
        let (sink, written, result) = tokio::task::spawn_blocking(move || {
            let mut written = Vec::with_capacity(commands.len());
            for command in commands {
                if let Err(err) = sink.write_command(&command.encode()) {
                    return (sink, written, Err(err));
                }
                written.push(command);
            }
            (sink, written, Ok(()))
        })
        .await
        .map_err(|err| LinkError::Io(std::io::Error::other(err)))?;
        self.sink = Some(sink);

        for command in &written {
            self.tracker.record(*command);
            debug!("actuator command sent: {command:?}");
        }
        result?;

        info!("dispatched {} actuator command(s)", written.len());
        Ok(written.len())
    }
}

impl Default for ActuatorDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

use tracing::{debug, info, warn};

use climate_common::{ControlPatch, ManualCommand, OverrideToken, ThermostatMode};

use crate::{control_client::ControlClient, dispatcher::SharedDispatcher, error::RemoteError};

/// Applies a device button press to the control store. Read-modify-write so
/// setpoint steps build on whatever the dashboard last wrote.
pub async fn apply_token(
    client: &ControlClient,
    token: OverrideToken,
) -> Result<ControlPatch, RemoteError> {
    let state = client.fetch().await?;
    let patch = token.reconcile(&state);
    client.patch(&patch).await?;

    info!("override token {} applied: {patch:?}", token.as_wire());
    Ok(patch)
}

/// Applies a dashboard command: recorded as manual overrides in the control
/// store, and written to the device without waiting for the next decision.
/// While the thermostat is OFF the overrides are only recorded.
pub async fn apply_manual_command(
    client: &ControlClient,
    dispatcher: &SharedDispatcher,
    command: ManualCommand,
) -> Result<(), RemoteError> {
    let update = command.update();
    if update.is_empty() {
        return Ok(());
    }

    let state = client.fetch().await?;
    client.patch(&command.patch()).await?;

    if state.mode == ThermostatMode::Off {
        debug!("thermostat is off; manual command stored without actuation");
        return Ok(());
    }

    let mut dispatcher = dispatcher.lock().await;
    if let Err(err) = dispatcher.dispatch(&update).await {
        warn!("manual command not written to device: {err}");
    }
    Ok(())
}

use std::time::Duration;

use climate_common::{ControlConfig, ControlPatch, ControlState};

use crate::error::RemoteError;

/// Client for the external control-state store. The store merges partial
/// POST bodies into its state and returns the full state on GET.
#[derive(Clone)]
pub struct ControlClient {
    http: reqwest::Client,
    url: String,
}

impl ControlClient {
    pub fn new(config: &ControlConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<ControlState, RemoteError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status));
        }

        let mut state = response.json::<ControlState>().await?;
        state.schedule.normalize();
        Ok(state)
    }

    pub async fn patch(&self, patch: &ControlPatch) -> Result<(), RemoteError> {
        let response = self.http.post(&self.url).json(patch).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use climate_common::ThermostatMode;

    use super::testing::{unreachable_client, FakeControlStore};
    use super::*;

    #[tokio::test]
    async fn fetch_decodes_store_state() {
        let store = FakeControlStore::start(json!({
            "mode": "HEAT",
            "setpoint": 21.0,
            "overrideMode": true,
            "overrideSetpoint": 23.5,
            "schedule": [{ "at": 540, "temp": 20.0 }, { "at": 360, "temp": 22.0 }],
            "led": false,
        }))
        .await;

        let state = store.client().fetch().await.unwrap();

        assert_eq!(state.mode, ThermostatMode::Heat);
        assert_eq!(state.effective_setpoint(), 23.5);
        assert_eq!(state.schedule.entries[0].at, 360);
    }

    #[tokio::test]
    async fn patch_sends_only_changed_fields() {
        let store = FakeControlStore::start(json!({ "mode": "HEAT", "setpoint": 22.0 })).await;

        store
            .client()
            .patch(&ControlPatch {
                manual_heater: Some(true),
                ..ControlPatch::default()
            })
            .await
            .unwrap();

        assert_eq!(store.patches().await, vec![json!({ "manualHeater": true })]);
        assert_eq!(store.get("setpoint").await, Some(json!(22.0)));
    }

    #[tokio::test]
    async fn malformed_body_is_unavailable() {
        let store = FakeControlStore::start(json!({ "mode": "COOL" })).await;
        assert!(matches!(
            store.client().fetch().await,
            Err(RemoteError::Request(_))
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let client = unreachable_client();
        assert!(client.fetch().await.is_err());
        assert!(client.patch(&ControlPatch::default()).await.is_err());
    }

    #[tokio::test]
    async fn malformed_schedule_does_not_fail_fetch() {
        let store = FakeControlStore::start(json!({
            "mode": "HEAT",
            "setpoint": 22,
            "useSchedule": true,
            "schedule": [{ "at": -1, "temp": 20 }, { "at": 420, "temp": null }],
        }))
        .await;

        let state = store.client().fetch().await.unwrap();

        assert_eq!(state.mode, ThermostatMode::Heat);
        assert_eq!(state.setpoint, 22.0);
        assert!(state.schedule.is_empty());
    }
}

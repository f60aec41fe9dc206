//! Device API
//!
//! The home-automation surface behind a trait so the controller can be
//! exercised without a live hub. The production impl speaks the Home
//! Assistant REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::HomeError;

/// Home-automation API surface used by the controller
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Call a service (`light.turn_on`, `lock.lock`, ...) with data.
    async fn call_service(&self, domain: &str, service: &str, data: Value)
        -> Result<(), HomeError>;

    /// Fetch all entity states.
    async fn get_states(&self) -> Result<Vec<Value>, HomeError>;
}

/// Home Assistant REST client
pub struct HaClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl HaClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            base_url: base_url.into(),
            token: token.into(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl DeviceApi for HaClient {
    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Value,
    ) -> Result<(), HomeError> {
        let response = self
            .http
            .post(self.url(&format!("/api/services/{domain}/{service}")))
            .bearer_auth(&self.token)
            .json(&data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HomeError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn get_states(&self) -> Result<Vec<Value>, HomeError> {
        let response = self
            .http
            .get(self.url("/api/states"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HomeError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| HomeError::Network(e.to_string()))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Records every service call; states are injectable.
    pub struct RecordingDeviceApi {
        pub calls: Mutex<Vec<(String, String, Value)>>,
        pub states: Mutex<Vec<Value>>,
    }

    impl RecordingDeviceApi {
        pub fn new(states: Vec<Value>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                states: Mutex::new(states),
            }
        }

        pub fn called_entities(&self) -> Vec<String> {
            self.calls
                .lock()
                .iter()
                .filter_map(|(_, _, data)| {
                    data.get("entity_id").and_then(Value::as_str).map(str::to_string)
                })
                .collect()
        }
    }

    #[async_trait]
    impl DeviceApi for RecordingDeviceApi {
        async fn call_service(
            &self,
            domain: &str,
            service: &str,
            data: Value,
        ) -> Result<(), HomeError> {
            self.calls
                .lock()
                .push((domain.to_string(), service.to_string(), data));
            Ok(())
        }

        async fn get_states(&self) -> Result<Vec<Value>, HomeError> {
            Ok(self.states.lock().clone())
        }
    }
}

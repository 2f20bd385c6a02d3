//! Client for the protected data service.

use std::time::Duration;

use serde_json::Value;

use crate::config::{DataServiceConfig, TimeoutConfig};
use crate::error::{BuildError, EdgeError};

/// Fetches the JSON document served behind `/data`.
#[derive(Debug, Clone)]
pub struct DataClient {
    client: reqwest::Client,
    url: String,
}

impl DataClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn from_config(config: &DataServiceConfig, timeouts: &TimeoutConfig) -> Result<Self, BuildError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.service_secs))
            .build()
            .map_err(|e| BuildError::Client(e.to_string()))?;
        Ok(Self::new(client, config.url.clone()))
    }

    pub async fn fetch(&self) -> Result<Value, EdgeError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| EdgeError::DataService(e.to_string()))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| EdgeError::DataService(e.to_string()))
    }
}

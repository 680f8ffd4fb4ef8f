//! Service registration with the Consul agent HTTP API.

use crate::utils::errors::{AgentError, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ConsulClient {
    base_url: String,
    client: Client,
}

impl ConsulClient {
    /// `host` is `host:port` or a full URL.
    pub fn new(host: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url(host),
            client,
        })
    }

    pub async fn register(&self, service: &ServiceRegistration) -> Result<()> {
        let url = format!("{}/v1/agent/service/register", self.base_url);
        let response = self.client.put(&url).json(service).send().await?;
        check(response, "register").await?;

        info!(
            "Registered service {} ({}:{}) in Consul",
            service.id, service.address, service.port
        );
        Ok(())
    }

    pub async fn deregister(&self, id: &str) -> Result<()> {
        let url = format!("{}/v1/agent/service/deregister/{}", self.base_url, id);
        let response = self.client.put(&url).send().await?;
        check(response, "deregister").await?;

        info!("Deregistered service {} from Consul", id);
        Ok(())
    }
}

fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

async fn check(response: reqwest::Response, action: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(AgentError::Registry(format!(
        "{} failed with {}: {}",
        action,
        status,
        body.trim()
    )))
}

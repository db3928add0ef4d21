use async_trait::async_trait;
use reqwest::Client;
use shared::{domain::OrganizationId, protocol::RevalidateRequest};
use tracing::{debug, warn};

pub fn products_cache_key(organization_id: OrganizationId) -> String {
    format!("products:{organization_id}")
}

/// Fire-and-forget cache invalidation. Implementations never report failure.
#[async_trait]
pub trait CacheRevalidator: Send + Sync {
    async fn revalidate(&self, key: &str);
}

pub struct NoopRevalidator;

#[async_trait]
impl CacheRevalidator for NoopRevalidator {
    async fn revalidate(&self, key: &str) {
        debug!(key, "revalidate: no endpoint configured");
    }
}

pub struct HttpRevalidator {
    http: Client,
    endpoint: String,
}

impl HttpRevalidator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CacheRevalidator for HttpRevalidator {
    async fn revalidate(&self, key: &str) {
        let result = self
            .http
            .post(&self.endpoint)
            .json(&RevalidateRequest {
                tag: key.to_string(),
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);
        match result {
            Ok(_) => debug!(key, "revalidate: signalled"),
            Err(err) => warn!(key, error = %err, "revalidate: signal failed"),
        }
    }
}

#[cfg(test)]
#[path = "tests/revalidate_tests.rs"]
mod tests;

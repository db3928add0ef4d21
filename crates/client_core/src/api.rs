//! Typed calls to the products and benefits endpoints.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{OrganizationId, ProductId},
    protocol::{Benefit, ListResource, Product, ProductBenefitsUpdate, ProductCreate},
};
use tracing::debug;
use url::Url;

use crate::error::ApiCallError;

const BENEFITS_PAGE_LIMIT: u64 = 100;

#[async_trait]
pub trait ProductsApi: Send + Sync {
    async fn create_product(&self, payload: &ProductCreate) -> Result<Product, ApiCallError>;
    async fn update_product_benefits(
        &self,
        product_id: ProductId,
        update: &ProductBenefitsUpdate,
    ) -> Result<Product, ApiCallError>;
    async fn list_benefits(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Benefit>, ApiCallError>;
}

pub struct HttpProductsApi {
    http: Client,
    server_url: String,
    access_token: Option<String>,
}

impl HttpProductsApi {
    pub fn new(server_url: &Url) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.as_str().trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiCallError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "api: request rejected");
            return Err(ApiCallError::Response {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiCallError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProductsApi for HttpProductsApi {
    async fn create_product(&self, payload: &ProductCreate) -> Result<Product, ApiCallError> {
        self.send_json(
            self.http
                .post(format!("{}/api/v1/products/", self.server_url))
                .json(payload),
        )
        .await
    }

    async fn update_product_benefits(
        &self,
        product_id: ProductId,
        update: &ProductBenefitsUpdate,
    ) -> Result<Product, ApiCallError> {
        self.send_json(
            self.http
                .post(format!(
                    "{}/api/v1/products/{product_id}/benefits",
                    self.server_url
                ))
                .json(update),
        )
        .await
    }

    async fn list_benefits(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Benefit>, ApiCallError> {
        let mut benefits = Vec::new();
        let mut page = 1;
        loop {
            let resource: ListResource<Benefit> = self
                .send_json(
                    self.http
                        .get(format!("{}/api/v1/benefits/search", self.server_url))
                        .query(&[
                            ("organization_id", organization_id.to_string()),
                            ("page", page.to_string()),
                            ("limit", BENEFITS_PAGE_LIMIT.to_string()),
                        ]),
                )
                .await?;
            benefits.extend(resource.items);
            if page >= resource.pagination.max_page {
                break;
            }
            page += 1;
        }
        Ok(benefits)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;

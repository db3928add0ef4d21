use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use shared::{
    domain::{BenefitId, BenefitType, FormType, OrganizationId, ProductId},
    protocol::{Benefit, Product, ProductBenefitsUpdate, ProductCreate},
};
use storage::{DraftStore, MemoryDraftStore};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::{
    api::ProductsApi, controller::FormServices, error::ApiCallError, lifecycle::PageLifecycle,
    revalidate::CacheRevalidator,
};

pub(crate) fn organization_id() -> OrganizationId {
    OrganizationId(Uuid::from_u128(0x0a11))
}

pub(crate) fn benefit(id: u128, benefit_type: BenefitType, selectable: bool) -> Benefit {
    Benefit {
        id: BenefitId(Uuid::from_u128(id)),
        created_at: Utc::now(),
        modified_at: None,
        benefit_type,
        description: format!("benefit {id}"),
        selectable,
        deletable: selectable,
        organization_id: organization_id(),
        properties: json!({}),
    }
}

pub(crate) fn premium_articles_benefit(id: u128) -> Benefit {
    let mut benefit = benefit(id, BenefitType::Articles, false);
    benefit.properties = json!({ "paid_articles": true });
    benefit
}

pub(crate) fn product_from(id: ProductId, payload: &ProductCreate) -> Product {
    Product {
        id,
        created_at: Utc::now(),
        modified_at: None,
        name: payload.name.clone(),
        description: payload.description.clone(),
        is_recurring: false,
        is_highlighted: payload.is_highlighted,
        is_archived: false,
        organization_id: payload.organization_id,
        prices: Vec::new(),
        benefits: Vec::new(),
    }
}

pub(crate) fn validation_failure(loc: serde_json::Value, msg: &str) -> ApiCallError {
    ApiCallError::Response {
        status: 422,
        body: json!({ "detail": [{ "loc": loc, "msg": msg, "type": "value_error" }] }).to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ApiCall {
    Create(ProductCreate),
    Attach {
        product_id: ProductId,
        benefits: Vec<BenefitId>,
    },
    ListBenefits(OrganizationId),
}

pub(crate) struct FakeProductsApi {
    pub product_id: ProductId,
    benefits: Vec<Benefit>,
    create_failure: Mutex<Option<ApiCallError>>,
    attach_failures: Mutex<VecDeque<ApiCallError>>,
    create_gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl FakeProductsApi {
    pub(crate) fn new() -> Self {
        Self {
            product_id: ProductId(Uuid::from_u128(0x9f)),
            benefits: Vec::new(),
            create_failure: Mutex::new(None),
            attach_failures: Mutex::new(VecDeque::new()),
            create_gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_benefits(mut self, benefits: Vec<Benefit>) -> Self {
        self.benefits = benefits;
        self
    }

    pub(crate) fn failing_create(self, err: ApiCallError) -> Self {
        *self.create_failure.try_lock().expect("unshared") = Some(err);
        self
    }

    pub(crate) fn failing_attach(self, err: ApiCallError) -> Self {
        self.attach_failures
            .try_lock()
            .expect("unshared")
            .push_back(err);
        self
    }

    /// Create calls wait until the returned gate is notified.
    pub(crate) fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.create_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub(crate) async fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn mutation_calls(&self) -> Vec<ApiCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| !matches!(call, ApiCall::ListBenefits(_)))
            .collect()
    }
}

#[async_trait]
impl ProductsApi for FakeProductsApi {
    async fn create_product(&self, payload: &ProductCreate) -> Result<Product, ApiCallError> {
        self.calls
            .lock()
            .await
            .push(ApiCall::Create(payload.clone()));
        if let Some(gate) = &self.create_gate {
            gate.notified().await;
        }
        if let Some(err) = self.create_failure.lock().await.clone() {
            return Err(err);
        }
        Ok(product_from(self.product_id, payload))
    }

    async fn update_product_benefits(
        &self,
        product_id: ProductId,
        update: &ProductBenefitsUpdate,
    ) -> Result<Product, ApiCallError> {
        self.calls.lock().await.push(ApiCall::Attach {
            product_id,
            benefits: update.benefits.clone(),
        });
        if let Some(err) = self.attach_failures.lock().await.pop_front() {
            return Err(err);
        }
        let mut product = product_from(product_id, &ProductCreate::new(organization_id()));
        product.benefits = self
            .benefits
            .iter()
            .filter(|benefit| update.benefits.contains(&benefit.id))
            .cloned()
            .collect();
        Ok(product)
    }

    async fn list_benefits(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Benefit>, ApiCallError> {
        self.calls
            .lock()
            .await
            .push(ApiCall::ListBenefits(organization_id));
        Ok(self.benefits.clone())
    }
}

/// Draft store whose saves wait for `release_save` after signalling `save_started`.
#[derive(Default)]
pub(crate) struct GatedDraftStore {
    pub inner: MemoryDraftStore,
    pub save_started: Notify,
    pub release_save: Notify,
}

#[async_trait]
impl DraftStore for GatedDraftStore {
    async fn save_draft(&self, form_type: FormType, values: &serde_json::Value) -> anyhow::Result<()> {
        self.save_started.notify_one();
        self.release_save.notified().await;
        self.inner.save_draft(form_type, values).await
    }

    async fn read_draft(&self, form_type: FormType) -> anyhow::Result<Option<serde_json::Value>> {
        self.inner.read_draft(form_type).await
    }

    async fn clear_draft(&self, form_type: FormType) -> anyhow::Result<()> {
        self.inner.clear_draft(form_type).await
    }
}

#[derive(Default)]
pub(crate) struct RecordingRevalidator {
    keys: Mutex<Vec<String>>,
}

impl RecordingRevalidator {
    pub(crate) async fn keys(&self) -> Vec<String> {
        self.keys.lock().await.clone()
    }
}

#[async_trait]
impl CacheRevalidator for RecordingRevalidator {
    async fn revalidate(&self, key: &str) {
        self.keys.lock().await.push(key.to_string());
    }
}

pub(crate) struct Harness {
    pub api: Arc<FakeProductsApi>,
    pub drafts: Arc<MemoryDraftStore>,
    pub revalidator: Arc<RecordingRevalidator>,
    pub lifecycle: PageLifecycle,
}

impl Harness {
    pub(crate) fn new(api: FakeProductsApi) -> Self {
        Self {
            api: Arc::new(api),
            drafts: Arc::new(MemoryDraftStore::new()),
            revalidator: Arc::new(RecordingRevalidator::default()),
            lifecycle: PageLifecycle::new(),
        }
    }

    pub(crate) fn services(&self) -> FormServices {
        FormServices {
            drafts: self.drafts.clone(),
            products: self.api.clone(),
            revalidator: self.revalidator.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

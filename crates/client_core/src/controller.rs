//! Product creation form: field values, benefit selection, draft persistence
//! and the submit lifecycle.

use std::sync::{Arc, Mutex as StdMutex};

use serde_json::Value;
use shared::{
    domain::{BenefitId, FormType, OrganizationId, ProductId},
    protocol::{Benefit, Product, ProductCreate},
};
use storage::DraftStore;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    api::ProductsApi,
    error::{FormError, MutationError},
    lifecycle::{LifecycleEvent, PageLifecycle},
    mutation::ProductCreation,
    revalidate::{products_cache_key, CacheRevalidator},
    selection::SelectionSet,
    validation::{apply_validation_errors, validate_product_create, FieldErrors, PRODUCT_CREATE_SCHEMA},
};

const FORM_TYPE: FormType = FormType::ProductCreate;

/// Collaborators a form controller is wired to.
#[derive(Clone)]
pub struct FormServices {
    pub drafts: Arc<dyn DraftStore>,
    pub products: Arc<dyn ProductsApi>,
    pub revalidator: Arc<dyn CacheRevalidator>,
    pub lifecycle: PageLifecycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStatus {
    Editing,
    Submitting,
    Succeeded,
}

#[derive(Debug, Clone)]
pub enum FormEvent {
    DraftSaved,
    SubmitFailed { reason: String },
    Dismissed,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Created(Box<Product>),
    /// Client-side checks failed; nothing was sent.
    InvalidInput,
    /// The server rejected the payload with field-level errors.
    ValidationFailed,
    /// Any other failure. `orphaned_product` is set when the product was
    /// created but its benefits were not attached.
    Failed {
        orphaned_product: Option<ProductId>,
    },
    AlreadySubmitting,
    NothingToRetry,
    Closed,
}

#[derive(Debug, Clone)]
pub struct FormSnapshot {
    pub values: ProductCreate,
    pub field_errors: FieldErrors,
    pub status: FormStatus,
    pub enabled_benefit_ids: Vec<BenefitId>,
    pub enabled_benefits: Vec<Benefit>,
    pub visible_benefits: Vec<Benefit>,
    pub orphaned_product: Option<ProductId>,
}

struct FormState {
    values: ProductCreate,
    field_errors: FieldErrors,
    status: FormStatus,
    selection: SelectionSet<BenefitId>,
    organization_benefits: Vec<Benefit>,
    orphaned_product: Option<ProductId>,
    disposed: bool,
}

impl FormState {
    fn accepts_changes(&self) -> bool {
        !self.disposed && self.status != FormStatus::Succeeded
    }

    fn enabled_benefits(&self) -> Vec<Benefit> {
        self.organization_benefits
            .iter()
            .filter(|benefit| self.selection.contains(&benefit.id))
            .cloned()
            .collect()
    }

    // Non-selectable benefits stay visible while enabled.
    fn visible_benefits(&self) -> Vec<Benefit> {
        self.organization_benefits
            .iter()
            .filter(|benefit| benefit.selectable || self.selection.contains(&benefit.id))
            .cloned()
            .collect()
    }
}

pub struct ProductCreateController {
    organization_id: OrganizationId,
    state: Arc<Mutex<FormState>>,
    drafts: Arc<dyn DraftStore>,
    creation: ProductCreation,
    revalidator: Arc<dyn CacheRevalidator>,
    events: broadcast::Sender<FormEvent>,
    draft_listener: StdMutex<Option<JoinHandle<()>>>,
}

impl ProductCreateController {
    /// Restores the stored draft, loads the organization's benefits and starts
    /// listening for page-hide signals.
    pub async fn open(services: FormServices, organization_id: OrganizationId) -> Self {
        let values = restore_values(services.drafts.as_ref(), organization_id).await;

        let organization_benefits = match services.products.list_benefits(organization_id).await {
            Ok(benefits) => benefits,
            Err(err) => {
                warn!(%organization_id, error = %err, "product form: failed to load benefits");
                Vec::new()
            }
        };
        let selection = organization_benefits
            .iter()
            .filter(|benefit| benefit.is_premium_articles())
            .map(|benefit| benefit.id)
            .collect();

        let state = Arc::new(Mutex::new(FormState {
            values,
            field_errors: FieldErrors::default(),
            status: FormStatus::Editing,
            selection,
            organization_benefits,
            orphaned_product: None,
            disposed: false,
        }));
        let (events, _) = broadcast::channel(64);

        let draft_listener = spawn_draft_listener(
            services.lifecycle.subscribe(),
            Arc::clone(&state),
            Arc::clone(&services.drafts),
            events.clone(),
        );

        Self {
            organization_id,
            state,
            drafts: services.drafts,
            creation: ProductCreation::new(services.products),
            revalidator: services.revalidator,
            events,
            draft_listener: StdMutex::new(Some(draft_listener)),
        }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FormEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> FormSnapshot {
        let state = self.state.lock().await;
        FormSnapshot {
            values: state.values.clone(),
            field_errors: state.field_errors.clone(),
            status: state.status,
            enabled_benefit_ids: state.selection.to_vec(),
            enabled_benefits: state.enabled_benefits(),
            visible_benefits: state.visible_benefits(),
            orphaned_product: state.orphaned_product,
        }
    }

    /// Edits field values in place. The organization is fixed for the lifetime of the form.
    pub async fn update<F>(&self, edit: F) -> Result<(), FormError>
    where
        F: FnOnce(&mut ProductCreate),
    {
        let mut state = self.state.lock().await;
        if !state.accepts_changes() {
            return Err(FormError::Closed);
        }
        edit(&mut state.values);
        state.values.organization_id = self.organization_id;
        Ok(())
    }

    pub async fn select_benefit(&self, benefit_id: BenefitId) -> Result<(), FormError> {
        let mut state = self.state.lock().await;
        if !state.accepts_changes() {
            return Err(FormError::Closed);
        }
        let Some(benefit) = state
            .organization_benefits
            .iter()
            .find(|benefit| benefit.id == benefit_id)
        else {
            return Err(FormError::UnknownBenefit(benefit_id));
        };
        // Hidden benefits can only stay enabled, never be picked.
        if !benefit.selectable && !state.selection.contains(&benefit_id) {
            return Err(FormError::NotSelectable(benefit_id));
        }
        state.selection.add(benefit_id);
        Ok(())
    }

    pub async fn remove_benefit(&self, benefit_id: BenefitId) -> Result<(), FormError> {
        let mut state = self.state.lock().await;
        if !state.accepts_changes() {
            return Err(FormError::Closed);
        }
        state.selection.remove(&benefit_id);
        Ok(())
    }

    pub async fn submit(&self) -> SubmitOutcome {
        let (payload, benefit_ids) = {
            let mut state = self.state.lock().await;
            if !state.accepts_changes() {
                return SubmitOutcome::Closed;
            }
            if state.status == FormStatus::Submitting {
                return SubmitOutcome::AlreadySubmitting;
            }

            let local_errors = validate_product_create(&state.values);
            if !local_errors.is_empty() {
                debug!(error_count = local_errors.len(), "product form: client-side validation failed");
                state.field_errors = local_errors;
                return SubmitOutcome::InvalidInput;
            }

            state.field_errors.clear();
            state.status = FormStatus::Submitting;
            (state.values.clone(), state.selection.to_vec())
        };

        let result = self.creation.submit(&payload, &benefit_ids).await;
        self.finish(result).await
    }

    /// Records a product created by an earlier session whose benefits were never
    /// attached, so `retry_attach_benefits` can finish it.
    pub async fn resume_orphaned_product(&self, product_id: ProductId) -> Result<(), FormError> {
        let mut state = self.state.lock().await;
        if !state.accepts_changes() || state.status == FormStatus::Submitting {
            return Err(FormError::Closed);
        }
        state.orphaned_product = Some(product_id);
        Ok(())
    }

    /// Attaches the current selection to a product whose earlier attach step failed.
    pub async fn retry_attach_benefits(&self) -> SubmitOutcome {
        let (product_id, benefit_ids) = {
            let mut state = self.state.lock().await;
            if !state.accepts_changes() {
                return SubmitOutcome::Closed;
            }
            if state.status == FormStatus::Submitting {
                return SubmitOutcome::AlreadySubmitting;
            }
            let Some(product_id) = state.orphaned_product else {
                return SubmitOutcome::NothingToRetry;
            };
            state.field_errors.clear();
            state.status = FormStatus::Submitting;
            (product_id, state.selection.to_vec())
        };

        let result = self
            .creation
            .attach_benefits(product_id, &benefit_ids)
            .await;
        self.finish(result).await
    }

    async fn finish(&self, result: Result<Product, MutationError>) -> SubmitOutcome {
        let mut state = self.state.lock().await;
        if state.disposed {
            debug!("product form: ignoring submission result for disposed form");
            return SubmitOutcome::Closed;
        }

        match result {
            Ok(product) => {
                state.status = FormStatus::Succeeded;
                state.orphaned_product = None;
                state.selection.clear();
                drop(state);

                if let Err(err) = self.drafts.clear_draft(FORM_TYPE).await {
                    warn!(error = %err, "product form: failed to clear draft");
                }
                self.revalidator
                    .revalidate(&products_cache_key(self.organization_id))
                    .await;
                self.detach_draft_listener();
                let _ = self.events.send(FormEvent::Dismissed);

                info!(product_id = %product.id, "product form: submitted");
                SubmitOutcome::Created(Box::new(product))
            }
            Err(err) => {
                state.status = FormStatus::Editing;
                if let Some(product_id) = err.orphaned_product() {
                    state.orphaned_product = Some(product_id);
                }

                // Attach errors describe the benefit list, not form fields.
                if let MutationError::CreateFailed(api_error) = &err {
                    if let Some(errors) = api_error.validation_errors() {
                        let applied = apply_validation_errors(
                            &errors,
                            &PRODUCT_CREATE_SCHEMA,
                            &mut state.field_errors,
                        );
                        debug!(applied, received = errors.len(), "product form: server validation failed");
                        return SubmitOutcome::ValidationFailed;
                    }
                }

                warn!(error = %err, "product form: submission failed");
                let orphaned_product = err.orphaned_product();
                drop(state);
                let reason = err.api_error().detail().unwrap_or_else(|| err.to_string());
                let _ = self.events.send(FormEvent::SubmitFailed { reason });
                SubmitOutcome::Failed { orphaned_product }
            }
        }
    }

    /// Closes the form without touching the stored draft.
    pub async fn cancel(&self) {
        self.dispose().await;
        let _ = self.events.send(FormEvent::Dismissed);
    }

    /// Stops listening for page-hide signals. Results of a submission still in
    /// flight are ignored.
    pub async fn dispose(&self) {
        self.state.lock().await.disposed = true;
        self.detach_draft_listener();
    }

    fn detach_draft_listener(&self) {
        if let Ok(mut listener) = self.draft_listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for ProductCreateController {
    fn drop(&mut self) {
        self.detach_draft_listener();
    }
}

async fn restore_values(drafts: &dyn DraftStore, organization_id: OrganizationId) -> ProductCreate {
    let draft = match drafts.read_draft(FORM_TYPE).await {
        Ok(draft) => draft,
        Err(err) => {
            warn!(error = %err, "product form: failed to read draft");
            None
        }
    };

    let Some(Value::Object(mut fields)) = draft else {
        return ProductCreate::new(organization_id);
    };

    fields.insert("organization_id".into(), Value::String(organization_id.to_string()));
    let has_prices = fields
        .get("prices")
        .and_then(Value::as_array)
        .is_some_and(|prices| !prices.is_empty());
    if !has_prices {
        fields.remove("prices");
    }

    match serde_json::from_value::<ProductCreate>(Value::Object(fields)) {
        Ok(mut values) => {
            if values.prices.is_empty() {
                values.prices = ProductCreate::new(organization_id).prices;
            }
            debug!(%organization_id, "product form: restored draft");
            values
        }
        Err(err) => {
            warn!(error = %err, "product form: stored draft does not match the form");
            ProductCreate::new(organization_id)
        }
    }
}

fn spawn_draft_listener(
    mut lifecycle: broadcast::Receiver<LifecycleEvent>,
    state: Arc<Mutex<FormState>>,
    drafts: Arc<dyn DraftStore>,
    events: broadcast::Sender<FormEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match lifecycle.recv().await {
                Ok(LifecycleEvent::PageHide) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }

            // The form lock spans the write; a finishing submission clears the
            // draft only after it.
            let form = state.lock().await;
            if !form.accepts_changes() {
                break;
            }
            let values = match serde_json::to_value(&form.values) {
                Ok(values) => values,
                Err(err) => {
                    warn!(error = %err, "product form: failed to encode draft");
                    continue;
                }
            };

            let saved = drafts.save_draft(FORM_TYPE, &values).await;
            drop(form);
            match saved {
                Ok(()) => {
                    debug!("product form: saved draft on page hide");
                    let _ = events.send(FormEvent::DraftSaved);
                }
                Err(err) => warn!(error = %err, "product form: failed to save draft"),
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

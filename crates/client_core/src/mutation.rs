use std::sync::Arc;

use shared::{
    domain::{BenefitId, ProductId},
    protocol::{Product, ProductBenefitsUpdate, ProductCreate},
};
use tracing::{info, warn};

use crate::{api::ProductsApi, error::MutationError};

/// Creates a product and then attaches its benefits.
///
/// The two calls are independent server-side: a failed attach leaves the
/// created product in place, reported through [`MutationError::AttachFailed`].
#[derive(Clone)]
pub struct ProductCreation {
    api: Arc<dyn ProductsApi>,
}

impl ProductCreation {
    pub fn new(api: Arc<dyn ProductsApi>) -> Self {
        Self { api }
    }

    pub async fn submit(
        &self,
        payload: &ProductCreate,
        benefits: &[BenefitId],
    ) -> Result<Product, MutationError> {
        let product = self
            .api
            .create_product(payload)
            .await
            .map_err(MutationError::CreateFailed)?;
        info!(
            product_id = %product.id,
            organization_id = %product.organization_id,
            "products: created product"
        );

        self.attach_benefits(product.id, benefits).await
    }

    pub async fn attach_benefits(
        &self,
        product_id: ProductId,
        benefits: &[BenefitId],
    ) -> Result<Product, MutationError> {
        let update = ProductBenefitsUpdate {
            benefits: benefits.to_vec(),
        };
        match self.api.update_product_benefits(product_id, &update).await {
            Ok(product) => {
                info!(
                    %product_id,
                    benefit_count = benefits.len(),
                    "products: attached benefits"
                );
                Ok(product)
            }
            Err(source) => {
                warn!(%product_id, error = %source, "products: attaching benefits failed");
                Err(MutationError::AttachFailed { product_id, source })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;

use shared::{
    domain::{BenefitId, ProductId},
    error::{ApiError, ErrorCode},
    protocol::ValidationError,
};
use thiserror::Error;

use crate::validation::parse_validation_body;

/// Failure of a single call to the products API.
#[derive(Debug, Clone, Error)]
pub enum ApiCallError {
    #[error("request could not be completed: {0}")]
    Transport(String),
    #[error("server responded with status {status}")]
    Response { status: u16, body: String },
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl ApiCallError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiCallError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.status().map(ErrorCode::from_status)
    }

    /// `detail` message of a non-validation error body.
    pub fn detail(&self) -> Option<String> {
        match self {
            ApiCallError::Response { body, .. } => serde_json::from_str::<ApiError>(body)
                .ok()
                .map(|error| error.detail),
            _ => None,
        }
    }

    /// Field-level errors carried by a 422 response, if this is one with a parseable body.
    pub fn validation_errors(&self) -> Option<Vec<ValidationError>> {
        match self {
            ApiCallError::Response { status, body } => parse_validation_body(*status, body),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiCallError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ApiCallError::Decode(value.to_string())
        } else {
            ApiCallError::Transport(value.to_string())
        }
    }
}

/// Failure of the create-then-attach product transaction.
#[derive(Debug, Clone, Error)]
pub enum MutationError {
    #[error("failed to create product: {0}")]
    CreateFailed(#[source] ApiCallError),
    #[error("product {product_id} was created but attaching benefits failed: {source}")]
    AttachFailed {
        product_id: ProductId,
        source: ApiCallError,
    },
}

impl MutationError {
    pub fn api_error(&self) -> &ApiCallError {
        match self {
            MutationError::CreateFailed(err) => err,
            MutationError::AttachFailed { source, .. } => source,
        }
    }

    /// Id of a product that exists server-side without its benefits.
    pub fn orphaned_product(&self) -> Option<ProductId> {
        match self {
            MutationError::CreateFailed(_) => None,
            MutationError::AttachFailed { product_id, .. } => Some(*product_id),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("benefit {0} is not available to this organization")]
    UnknownBenefit(BenefitId),
    #[error("benefit {0} cannot be selected")]
    NotSelectable(BenefitId),
    #[error("form is closed")]
    Closed,
}

//! Headless product-creation workflow: typed API calls, draft persistence,
//! validation-error mapping and the form controller that drives them.

pub mod api;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod mutation;
pub mod revalidate;
pub mod selection;
pub mod validation;

pub use api::{HttpProductsApi, ProductsApi};
pub use controller::{
    FormEvent, FormServices, FormSnapshot, FormStatus, ProductCreateController, SubmitOutcome,
};
pub use error::{ApiCallError, FormError, MutationError};
pub use lifecycle::{LifecycleEvent, PageLifecycle};
pub use mutation::ProductCreation;
pub use revalidate::{products_cache_key, CacheRevalidator, HttpRevalidator, NoopRevalidator};
pub use selection::SelectionSet;
pub use validation::{FieldErrors, FormSchema};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    BenefitId, BenefitType, OrganizationId, PriceType, ProductId, ProductPriceId,
    RecurringInterval,
};

pub const DEFAULT_PRICE_CURRENCY: &str = "usd";

fn default_price_currency() -> String {
    DEFAULT_PRICE_CURRENCY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPriceCreate {
    #[serde(rename = "type")]
    pub price_type: PriceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_amount: Option<i64>,
    #[serde(default = "default_price_currency")]
    pub price_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_interval: Option<RecurringInterval>,
}

impl ProductPriceCreate {
    pub fn one_time(price_amount: Option<i64>) -> Self {
        Self {
            price_type: PriceType::OneTime,
            price_amount,
            price_currency: default_price_currency(),
            recurring_interval: None,
        }
    }

    pub fn recurring(price_amount: Option<i64>, interval: RecurringInterval) -> Self {
        Self {
            price_type: PriceType::Recurring,
            price_amount,
            price_currency: default_price_currency(),
            recurring_interval: Some(interval),
        }
    }
}

/// Payload of the create-product request; also the shape of a stored product draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreate {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_highlighted: bool,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub prices: Vec<ProductPriceCreate>,
}

impl ProductCreate {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            name: String::new(),
            description: None,
            is_highlighted: false,
            organization_id,
            prices: vec![ProductPriceCreate::one_time(None)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub id: ProductPriceId,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub price_type: PriceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_interval: Option<RecurringInterval>,
    pub price_amount: i64,
    pub price_currency: String,
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub is_highlighted: bool,
    #[serde(default)]
    pub is_archived: bool,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub prices: Vec<ProductPrice>,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductBenefitsUpdate {
    pub benefits: Vec<BenefitId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benefit {
    pub id: BenefitId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub benefit_type: BenefitType,
    pub description: String,
    pub selectable: bool,
    pub deletable: bool,
    pub organization_id: OrganizationId,
    /// Type-specific settings, e.g. `paid_articles` for article benefits.
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Benefit {
    pub fn is_premium_articles(&self) -> bool {
        self.benefit_type == BenefitType::Articles
            && self
                .properties
                .get("paid_articles")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total_count: u64,
    pub max_page: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResource<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// One segment of a validation error location: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocSegment {
    Index(u64),
    Key(String),
}

impl fmt::Display for LocSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocSegment::Index(index) => write!(f, "{index}"),
            LocSegment::Key(key) => f.write_str(key),
        }
    }
}

impl From<&str> for LocSegment {
    fn from(value: &str) -> Self {
        LocSegment::Key(value.to_string())
    }
}

impl From<u64> for LocSegment {
    fn from(value: u64) -> Self {
        LocSegment::Index(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub loc: Vec<LocSegment>,
    pub msg: String,
    #[serde(rename = "type", default)]
    pub error_type: String,
}

/// Body of a 422 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpValidationError {
    pub detail: Vec<ValidationError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidateRequest {
    pub tag: String,
}

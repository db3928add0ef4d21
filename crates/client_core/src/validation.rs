//! Maps server-side validation errors onto form fields, plus the client-side
//! checks a product form must pass before it is sent.

use std::collections::BTreeMap;

use shared::{
    domain::PriceType,
    protocol::{HttpValidationError, LocSegment, ProductCreate, ValidationError, DEFAULT_PRICE_CURRENCY},
};

pub const VALIDATION_STATUS: u16 = 422;
pub const MAXIMUM_PRICE_AMOUNT: i64 = 99_999_999;

const REQUEST_PARTS: [&str; 5] = ["body", "query", "path", "header", "cookie"];

/// Decides which dotted field paths exist on a form.
pub trait FormSchema {
    fn has_field(&self, path: &str) -> bool;
}

/// Schema built from dotted patterns; a `*` segment matches any list index.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    patterns: &'static [&'static str],
}

impl FieldSchema {
    pub const fn new(patterns: &'static [&'static str]) -> Self {
        Self { patterns }
    }
}

impl FormSchema for FieldSchema {
    fn has_field(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern_matches(pattern, path))
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('.');
    let mut path_segments = path.split('.');
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some("*"), Some(segment)) => {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return false;
                }
            }
            (Some(expected), Some(segment)) if expected == segment => {}
            _ => return false,
        }
    }
}

pub const PRODUCT_CREATE_SCHEMA: FieldSchema = FieldSchema::new(&[
    "name",
    "description",
    "is_highlighted",
    "organization_id",
    "prices",
    "prices.*",
    "prices.*.type",
    "prices.*.price_amount",
    "prices.*.price_currency",
    "prices.*.recurring_interval",
    // single-price editor fields
    "price_amount",
    "price_currency",
    "recurring_interval",
]);

/// Receives per-field error messages.
pub trait FieldErrorSink {
    fn set_field_error(&mut self, field: &str, message: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, String>,
}

impl FieldErrors {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FieldErrorSink for FieldErrors {
    fn set_field_error(&mut self, field: &str, message: &str) {
        self.errors.insert(field.to_string(), message.to_string());
    }
}

/// Turns an error location into a dotted field path, dropping the request part prefix.
pub fn resolve_location(loc: &[LocSegment]) -> Option<String> {
    let fields = match loc.first() {
        Some(LocSegment::Key(part)) if REQUEST_PARTS.contains(&part.as_str()) => &loc[1..],
        _ => loc,
    };
    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("."),
    )
}

/// Registers each error whose location names a known field. Returns how many were applied;
/// errors outside the schema are dropped.
pub fn apply_validation_errors(
    errors: &[ValidationError],
    schema: &dyn FormSchema,
    sink: &mut dyn FieldErrorSink,
) -> usize {
    let mut applied = 0;
    for error in errors {
        let Some(path) = resolve_location(&error.loc) else {
            continue;
        };
        if !schema.has_field(&path) {
            tracing::debug!(field = %path, "validation: dropping error for unknown field");
            continue;
        }
        sink.set_field_error(&path, &error.msg);
        applied += 1;
    }
    applied
}

/// Extracts the `detail` list from a 422 body. Any other status, or a body of a
/// different shape, yields `None`.
pub fn parse_validation_body(status: u16, body: &str) -> Option<Vec<ValidationError>> {
    if status != VALIDATION_STATUS {
        return None;
    }
    serde_json::from_str::<HttpValidationError>(body)
        .ok()
        .map(|parsed| parsed.detail)
}

/// Checks a product payload before any request is made.
pub fn validate_product_create(values: &ProductCreate) -> FieldErrors {
    let mut errors = FieldErrors::default();

    if values.name.trim().is_empty() {
        errors.set_field_error("name", "This field is required");
    }

    if values.prices.is_empty() {
        errors.set_field_error("prices", "At least one price is required");
    }

    for (index, price) in values.prices.iter().enumerate() {
        match price.price_amount {
            None => errors.set_field_error(
                &format!("prices.{index}.price_amount"),
                "This field is required",
            ),
            Some(amount) if amount <= 0 => errors.set_field_error(
                &format!("prices.{index}.price_amount"),
                "Price must be greater than zero",
            ),
            Some(amount) if amount > MAXIMUM_PRICE_AMOUNT => errors.set_field_error(
                &format!("prices.{index}.price_amount"),
                "Price is too large",
            ),
            Some(_) => {}
        }

        if price.price_currency != DEFAULT_PRICE_CURRENCY {
            errors.set_field_error(
                &format!("prices.{index}.price_currency"),
                "Only USD is supported",
            );
        }

        if price.price_type == PriceType::Recurring && price.recurring_interval.is_none() {
            errors.set_field_error(
                &format!("prices.{index}.recurring_interval"),
                "Recurring prices need an interval",
            );
        }
    }

    errors
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;

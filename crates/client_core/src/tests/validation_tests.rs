use super::*;
use serde_json::json;
use shared::{
    domain::{OrganizationId, RecurringInterval},
    protocol::ProductPriceCreate,
};
use uuid::Uuid;

fn error_at(loc: serde_json::Value, msg: &str) -> ValidationError {
    serde_json::from_value(json!({ "loc": loc, "msg": msg, "type": "value_error" }))
        .expect("validation error")
}

#[test]
fn maps_body_location_to_single_field() {
    let mut errors = FieldErrors::default();

    let applied = apply_validation_errors(
        &[error_at(json!(["body", "price_amount"]), "required")],
        &PRODUCT_CREATE_SCHEMA,
        &mut errors,
    );

    assert_eq!(applied, 1);
    assert_eq!(errors.get("price_amount"), Some("required"));
    assert_eq!(errors.len(), 1);
}

#[test]
fn maps_nested_price_location_with_index() {
    let mut errors = FieldErrors::default();

    apply_validation_errors(
        &[error_at(
            json!(["body", "prices", 0, "price_amount"]),
            "ensure this value is greater than 0",
        )],
        &PRODUCT_CREATE_SCHEMA,
        &mut errors,
    );

    assert_eq!(
        errors.get("prices.0.price_amount"),
        Some("ensure this value is greater than 0")
    );
}

#[test]
fn drops_locations_outside_the_schema() {
    let mut errors = FieldErrors::default();

    let applied = apply_validation_errors(
        &[
            error_at(json!(["body", "benefits"]), "invalid benefit"),
            error_at(json!(["body"]), "malformed body"),
            error_at(json!(["query", "organization_id"]), "required"),
            error_at(json!(["body", "prices", "first", "price_amount"]), "bad index"),
        ],
        &PRODUCT_CREATE_SCHEMA,
        &mut errors,
    );

    assert_eq!(applied, 1);
    assert_eq!(errors.get("organization_id"), Some("required"));
    assert!(errors.get("benefits").is_none());
}

#[test]
fn later_message_for_same_field_replaces_earlier() {
    let mut errors = FieldErrors::default();

    apply_validation_errors(
        &[
            error_at(json!(["body", "name"]), "too short"),
            error_at(json!(["body", "name"]), "already taken"),
        ],
        &PRODUCT_CREATE_SCHEMA,
        &mut errors,
    );

    assert_eq!(errors.get("name"), Some("already taken"));
}

#[test]
fn resolves_locations_without_request_part_prefix() {
    assert_eq!(
        resolve_location(&[LocSegment::from("name")]),
        Some("name".to_string())
    );
    assert_eq!(resolve_location(&[LocSegment::from("body")]), None);
    assert_eq!(resolve_location(&[]), None);
}

#[test]
fn parses_detail_only_for_validation_status() {
    let body = json!({ "detail": [{ "loc": ["body", "name"], "msg": "required", "type": "missing" }] })
        .to_string();

    assert_eq!(parse_validation_body(422, &body).map(|d| d.len()), Some(1));
    assert_eq!(parse_validation_body(400, &body), None);
    assert_eq!(
        parse_validation_body(422, r#"{"detail":"Not permitted"}"#),
        None
    );
    assert_eq!(parse_validation_body(422, "<html>"), None);
}

fn valid_payload() -> ProductCreate {
    let mut payload = ProductCreate::new(OrganizationId(Uuid::nil()));
    payload.name = "Supporter".to_string();
    payload.prices = vec![ProductPriceCreate::one_time(Some(500))];
    payload
}

#[test]
fn accepts_complete_product() {
    assert!(validate_product_create(&valid_payload()).is_empty());
}

#[test]
fn requires_name_and_price_amount() {
    let mut payload = valid_payload();
    payload.name = "   ".to_string();
    payload.prices = vec![ProductPriceCreate::one_time(None)];

    let errors = validate_product_create(&payload);

    assert_eq!(errors.get("name"), Some("This field is required"));
    assert_eq!(
        errors.get("prices.0.price_amount"),
        Some("This field is required")
    );
    assert_eq!(errors.len(), 2);
}

#[test]
fn rejects_out_of_range_amounts_and_missing_interval() {
    let mut payload = valid_payload();
    payload.prices = vec![
        ProductPriceCreate::one_time(Some(0)),
        ProductPriceCreate::one_time(Some(MAXIMUM_PRICE_AMOUNT + 1)),
        ProductPriceCreate {
            recurring_interval: None,
            ..ProductPriceCreate::recurring(Some(1000), RecurringInterval::Month)
        },
    ];

    let errors = validate_product_create(&payload);

    assert!(errors.get("prices.0.price_amount").is_some());
    assert!(errors.get("prices.1.price_amount").is_some());
    assert!(errors.get("prices.2.recurring_interval").is_some());
}

#[test]
fn requires_at_least_one_price() {
    let mut payload = valid_payload();
    payload.prices.clear();

    assert_eq!(
        validate_product_create(&payload).get("prices"),
        Some("At least one price is required")
    );
}

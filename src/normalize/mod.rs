//! Payload normalizer.
//!
//! Turns loosely-typed server records into the canonical [`Order`] model.
//! Pure and infallible: a field that cannot be read degrades to its default
//! and never aborts the rest of the record or the batch.

mod events;
mod fields;
mod products;
mod timestamp;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub use events::{
    normalize_confirmation, normalize_status_change, normalize_status_change_at,
    ConnectionConfirmed, StatusChange,
};
pub use products::COMMENT_SEPARATOR;
pub use timestamp::{parse_timestamp, parse_timestamp_at, TimestampInput, EPOCH_MILLIS_THRESHOLD};

use crate::types::{Order, OrderStatus, ReceivingMethod};
use fields::{
    first_non_blank, first_present, first_text, value_to_string, CREATED_AT, NOTE, ORDER_ID,
    PHONE_NUMBER, PRODUCTS, RECEIVING_METHOD, STATUS, STORE_ID, UPDATED_AT,
};

/// Normalize one raw order record, using the wall clock for unusable timestamps.
pub fn normalize_order(raw: &Value) -> Order {
    normalize_order_at(raw, Utc::now())
}

/// Normalize one raw order record, using `now` for unusable timestamps.
pub fn normalize_order_at(raw: &Value, now: DateTime<Utc>) -> Order {
    let empty = Map::new();
    let record = raw.as_object().unwrap_or(&empty);

    let id = first_present(record, ORDER_ID)
        .and_then(value_to_string)
        .unwrap_or_default();

    let created_at = parse_timestamp_at(first_non_blank(record, CREATED_AT), now);
    let updated_at =
        first_non_blank(record, UPDATED_AT).map(|value| parse_timestamp_at(value, now));

    Order {
        display_number: id.clone(),
        items: products::normalize_items(first_present(record, PRODUCTS), &id),
        status: resolve_status(record),
        created_at,
        updated_at,
        receiving_method: resolve_receiving_method(record),
        note: first_text(record, NOTE).map(str::to_string),
        phone_number: first_present(record, PHONE_NUMBER).and_then(value_to_string),
        store_id: first_present(record, STORE_ID).and_then(value_to_string),
        id,
    }
}

/// Normalize a snapshot payload.
///
/// Returns `None` when the payload is not a list. Entries that are not
/// objects are skipped; every object entry yields exactly one order.
pub fn normalize_orders(raw: &Value) -> Option<Vec<Order>> {
    normalize_orders_at(raw, Utc::now())
}

pub fn normalize_orders_at(raw: &Value, now: DateTime<Utc>) -> Option<Vec<Order>> {
    let entries = raw.as_array()?;
    Some(
        entries
            .iter()
            .filter(|entry| entry.is_object())
            .map(|entry| normalize_order_at(entry, now))
            .collect(),
    )
}

fn resolve_status(record: &Map<String, Value>) -> OrderStatus {
    first_non_blank(record, STATUS)
        .and_then(value_to_string)
        .map(|raw| OrderStatus::parse(&raw))
        .unwrap_or_default()
}

fn resolve_receiving_method(record: &Map<String, Value>) -> ReceivingMethod {
    match first_present(record, RECEIVING_METHOD).and_then(Value::as_str) {
        Some(method) if method.trim().eq_ignore_ascii_case("delivery") => ReceivingMethod::Delivery,
        _ => ReceivingMethod::SelfService,
    }
}

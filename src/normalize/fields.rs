//! Field alias tables and lenient value accessors.
//!
//! Each logical field lists the server-side names it has been seen under, in
//! priority order. Lookups walk the list and take the first usable value.

use serde_json::{Map, Number, Value};

pub(crate) const ORDER_ID: &[&str] = &["id", "orderId", "order_id"];
pub(crate) const CREATED_AT: &[&str] = &["create_at", "created_at", "createdAt"];
pub(crate) const UPDATED_AT: &[&str] = &["updated_at", "updatedAt"];
pub(crate) const STATUS: &[&str] = &["status"];
pub(crate) const RECEIVING_METHOD: &[&str] = &["receiving_method", "receivingMethod"];
pub(crate) const PHONE_NUMBER: &[&str] = &["phoneNumber", "phone_number"];
pub(crate) const STORE_ID: &[&str] = &["idStore", "id_store", "storeId", "store_id"];
pub(crate) const NOTE: &[&str] = &["message", "note"];
pub(crate) const PRODUCTS: &[&str] = &["products", "items"];

pub(crate) const ITEM_ID: &[&str] = &["id"];
pub(crate) const ITEM_NAME: &[&str] = &["name_original", "nameOriginal", "name"];
pub(crate) const ITEM_QUANTITY: &[&str] = &["quantity", "qty", "count"];
pub(crate) const ITEM_EXCLUDE: &[&str] = &["exclude"];
pub(crate) const ITEM_COMMENT: &[&str] = &["comment"];
pub(crate) const ITEM_INCLUDE: &[&str] = &["include", "included"];

pub(crate) const ADDON_NAME: &[&str] = &["name", "name_original"];
pub(crate) const ADDON_COUNT: &[&str] = &["count", "quantity"];

pub(crate) const CHANGE_ORDER_ID: &[&str] = &["orderId", "order_id", "id"];
pub(crate) const CHANGE_UPDATED_BY: &[&str] = &["updatedBy", "updated_by"];
pub(crate) const CHANGE_TIMESTAMP: &[&str] = &["timestamp", "updatedAt", "updated_at"];

pub(crate) const CONFIRM_MESSAGE: &[&str] = &["message"];
pub(crate) const CONFIRM_CLIENT_ID: &[&str] = &["clientId", "client_id"];
pub(crate) const CONFIRM_TIMESTAMP: &[&str] = &["timestamp"];

/// First alias holding a non-null value.
pub(crate) fn first_present<'a>(record: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| record.get(*alias))
        .find(|value| !value.is_null())
}

/// First alias holding a value that is not null, `false`, or a blank string.
pub(crate) fn first_non_blank<'a>(
    record: &'a Map<String, Value>,
    aliases: &[&str],
) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| record.get(*alias))
        .find(|value| match value {
            Value::Null | Value::Bool(false) => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}

/// First alias holding a non-blank string. Non-string values are skipped.
pub(crate) fn first_text<'a>(record: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .filter_map(|alias| record.get(*alias))
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
}

/// Stringify scalars the way identifiers are displayed. Arrays and objects have no string form.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(format_number(n)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Numbers and numeric strings as `f64`.
pub(crate) fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) => format_count(f),
        None => n.to_string(),
    }
}

/// Whole numbers without a trailing `.0`.
pub(crate) fn format_count(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

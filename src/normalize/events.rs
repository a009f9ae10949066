//! Payloads of the non-order events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::fields::{
    first_non_blank, first_present, first_text, value_to_string, CHANGE_ORDER_ID,
    CHANGE_TIMESTAMP, CHANGE_UPDATED_BY, CONFIRM_CLIENT_ID, CONFIRM_MESSAGE, CONFIRM_TIMESTAMP,
    STATUS,
};
use super::timestamp::parse_timestamp_at;
use crate::types::OrderStatus;

/// Server-side status change of a single order.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub order_id: String,
    pub status: OrderStatus,
    pub updated_by: Option<String>,
    /// Server clock, when sent. The session stamps its own observation time.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Greeting the server sends after the namespace handshake.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfirmed {
    pub message: Option<String>,
    pub client_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Read an `order_status_updated` payload.
///
/// Returns `None` when the payload names no order or carries no status.
pub fn normalize_status_change(raw: &Value) -> Option<StatusChange> {
    normalize_status_change_at(raw, Utc::now())
}

pub fn normalize_status_change_at(raw: &Value, now: DateTime<Utc>) -> Option<StatusChange> {
    let record = raw.as_object()?;
    let order_id = first_non_blank(record, CHANGE_ORDER_ID).and_then(value_to_string)?;
    let status = first_non_blank(record, STATUS)
        .and_then(value_to_string)
        .map(|raw| OrderStatus::parse(&raw))?;

    Some(StatusChange {
        order_id: order_id.trim().to_string(),
        status,
        updated_by: first_text(record, CHANGE_UPDATED_BY).map(str::to_string),
        timestamp: optional_timestamp(record, CHANGE_TIMESTAMP, now),
    })
}

/// Read a `connection_confirmed` payload. Every field is optional.
pub fn normalize_confirmation(raw: &Value) -> ConnectionConfirmed {
    let Some(record) = raw.as_object() else {
        return ConnectionConfirmed::default();
    };
    ConnectionConfirmed {
        message: first_text(record, CONFIRM_MESSAGE).map(str::to_string),
        client_id: first_non_blank(record, CONFIRM_CLIENT_ID).and_then(value_to_string),
        timestamp: optional_timestamp(record, CONFIRM_TIMESTAMP, Utc::now()),
    }
}

fn optional_timestamp(
    record: &Map<String, Value>,
    aliases: &[&str],
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    first_present(record, aliases).map(|value| parse_timestamp_at(value, now))
}

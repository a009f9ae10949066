use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{prelude::*, Error};

pub const CONNECTION_CONFIRMED: &str = "connection_confirmed";
pub const ORDERS_LIST: &str = "orders_list";
pub const NEW_ORDER: &str = "new_order";
pub const ORDER_STATUS_UPDATED: &str = "order_status_updated";
pub const PONG: &str = "pong";

pub const GET_ORDERS: &str = "get_orders";
pub const UPDATE_ORDER_STATUS: &str = "update_order_status";
pub const PING: &str = "ping";

/// Inbound events a caller can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConnectionConfirmed,
    OrdersList,
    NewOrder,
    OrderStatusUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::ConnectionConfirmed,
        EventKind::OrdersList,
        EventKind::NewOrder,
        EventKind::OrderStatusUpdated,
    ];

    pub fn event_name(&self) -> &'static str {
        match self {
            EventKind::ConnectionConfirmed => CONNECTION_CONFIRMED,
            EventKind::OrdersList => ORDERS_LIST,
            EventKind::NewOrder => NEW_ORDER,
            EventKind::OrderStatusUpdated => ORDER_STATUS_UPDATED,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Event received from the orders namespace.
///
/// Payloads stay loosely typed here; the normalizer gives them shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    ConnectionConfirmed(Value),
    OrdersList(Value),
    NewOrder(Value),
    OrderStatusUpdated(Value),
    Pong,
    Other { name: String, payload: Value },
}

impl ServerEvent {
    pub fn from_named(name: &str, payload: Value) -> Self {
        match name {
            CONNECTION_CONFIRMED => ServerEvent::ConnectionConfirmed(payload),
            ORDERS_LIST => ServerEvent::OrdersList(payload),
            NEW_ORDER => ServerEvent::NewOrder(payload),
            ORDER_STATUS_UPDATED => ServerEvent::OrderStatusUpdated(payload),
            PONG => ServerEvent::Pong,
            _ => ServerEvent::Other {
                name: name.to_string(),
                payload,
            },
        }
    }

    pub fn kind(&self) -> Option<EventKind> {
        match self {
            ServerEvent::ConnectionConfirmed(_) => Some(EventKind::ConnectionConfirmed),
            ServerEvent::OrdersList(_) => Some(EventKind::OrdersList),
            ServerEvent::NewOrder(_) => Some(EventKind::NewOrder),
            ServerEvent::OrderStatusUpdated(_) => Some(EventKind::OrderStatusUpdated),
            ServerEvent::Pong | ServerEvent::Other { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ServerEvent::Pong => PONG,
            ServerEvent::Other { name, .. } => name,
            other => other.kind().map(|kind| kind.event_name()).unwrap_or_default(),
        }
    }
}

/// Payload of `update_order_status`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatus {
    pub order_id: u64,
    pub status: String,
}

/// Event sent to the orders namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    GetOrders,
    UpdateOrderStatus(UpdateOrderStatus),
    Ping,
}

impl ClientEvent {
    pub fn update_order_status(order_id: u64, status: impl Into<String>) -> Self {
        ClientEvent::UpdateOrderStatus(UpdateOrderStatus {
            order_id,
            status: status.into(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::GetOrders => GET_ORDERS,
            ClientEvent::UpdateOrderStatus(_) => UPDATE_ORDER_STATUS,
            ClientEvent::Ping => PING,
        }
    }

    /// JSON argument sent after the event name, if any.
    pub fn payload(&self) -> Result<Option<Value>> {
        match self {
            ClientEvent::UpdateOrderStatus(update) => serde_json::to_value(update)
                .map(Some)
                .map_err(|e| Error::json_parse(e.to_string())),
            ClientEvent::GetOrders | ClientEvent::Ping => Ok(None),
        }
    }
}

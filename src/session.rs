//! Order session state.
//!
//! [`OrderBook`] is the plain in-memory order set. [`KitchenSession`] owns one
//! book together with the connection, applies every inbound event to the book
//! and forwards local status changes to the server.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::{
    normalize::{
        normalize_confirmation, normalize_order_at, normalize_orders_at,
        normalize_status_change_at, ConnectionConfirmed,
    },
    prelude::*,
    types::{numeric_order_id, Order, OrderStatus},
    ws::{ConnectionManager, ConnectionStatus, EventKind, ServerEvent},
};

/// Outcome of [`OrderBook::upsert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Orders keyed by id, kept in arrival order.
#[derive(Clone, Debug, Default)]
pub struct OrderBook {
    orders: Vec<Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set. Repeated ids collapse into the first position,
    /// holding the last record.
    pub fn replace_all(&mut self, orders: Vec<Order>) {
        self.orders.clear();
        for order in orders {
            self.upsert(order);
        }
    }

    /// Replace the order with the same id in place, or append it.
    pub fn upsert(&mut self, order: Order) -> Upsert {
        match self.position(&order.id) {
            Some(index) => {
                self.orders[index] = order;
                Upsert::Replaced
            }
            None => {
                self.orders.push(order);
                Upsert::Inserted
            }
        }
    }

    /// Set the status of `id`, returning the previous one; `None` if unknown.
    pub fn apply_status(
        &mut self,
        id: &str,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Option<OrderStatus> {
        let index = self.position(id)?;
        let order = &mut self.orders[index];
        order.updated_at = Some(at);
        Some(std::mem::replace(&mut order.status, status))
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == id)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Orders still waiting on the kitchen or the courier.
    pub fn active(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|order| !order.status.is_terminal())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.orders.iter().position(|order| order.id == id)
    }
}

/// What an applied event changed.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    Confirmed(ConnectionConfirmed),
    Snapshot {
        count: usize,
    },
    NewOrder {
        id: String,
        inserted: bool,
    },
    StatusChanged {
        id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    /// Status change for an order this session does not hold
    UnknownOrder {
        id: String,
    },
    Ignored {
        event: String,
        reason: String,
    },
}

type NewOrderHook = Box<dyn FnMut(&Order) + Send>;

/// A kitchen display session: one connection, one order set.
pub struct KitchenSession {
    connection: ConnectionManager,
    book: OrderBook,
    events: UnboundedReceiver<ServerEvent>,
    on_new_order: Option<NewOrderHook>,
}

impl KitchenSession {
    /// Subscribe to every order event on `connection`.
    pub fn new(connection: ConnectionManager) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        for kind in EventKind::ALL {
            connection.on(kind, tx.clone())?;
        }
        Ok(Self {
            connection,
            book: OrderBook::new(),
            events,
            on_new_order: None,
        })
    }

    /// Called for every `new_order` after it is applied, e.g. to play a sound.
    pub fn on_new_order(&mut self, hook: impl FnMut(&Order) + Send + 'static) {
        self.on_new_order = Some(Box::new(hook));
    }

    pub async fn start(&self) -> Result<()> {
        self.connection.connect().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.connection.disconnect().await
    }

    /// Wait for the next inbound event and apply it.
    ///
    /// Returns `None` once the connection task has stopped.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let event = self.events.recv().await?;
        Some(self.apply(event))
    }

    pub fn apply(&mut self, event: ServerEvent) -> SessionUpdate {
        self.apply_at(event, Utc::now())
    }

    /// Apply one inbound event, using `now` as the observation time.
    pub fn apply_at(&mut self, event: ServerEvent, now: DateTime<Utc>) -> SessionUpdate {
        match event {
            ServerEvent::ConnectionConfirmed(raw) => {
                let confirmed = normalize_confirmation(&raw);
                info!(
                    message = confirmed.message.as_deref().unwrap_or_default(),
                    client_id = confirmed.client_id.as_deref().unwrap_or_default(),
                    "Connection confirmed"
                );
                SessionUpdate::Confirmed(confirmed)
            }
            ServerEvent::OrdersList(raw) => match normalize_orders_at(&raw, now) {
                Some(orders) => {
                    self.book.replace_all(orders);
                    info!(count = self.book.len(), "Received orders snapshot");
                    SessionUpdate::Snapshot {
                        count: self.book.len(),
                    }
                }
                None => {
                    warn!("Ignoring orders snapshot that is not a list");
                    ignored(&ServerEvent::OrdersList(raw), "payload is not a list")
                }
            },
            ServerEvent::NewOrder(raw) => {
                let order = normalize_order_at(&raw, now);
                let id = order.id.clone();
                let inserted = self.book.upsert(order) == Upsert::Inserted;
                info!(id = %id, inserted, "New order");
                if let (Some(hook), Some(order)) = (self.on_new_order.as_mut(), self.book.get(&id))
                {
                    hook(order);
                }
                SessionUpdate::NewOrder { id, inserted }
            }
            ServerEvent::OrderStatusUpdated(raw) => {
                let Some(change) = normalize_status_change_at(&raw, now) else {
                    warn!("Ignoring status update without order id or status");
                    return ignored(
                        &ServerEvent::OrderStatusUpdated(raw),
                        "missing order id or status",
                    );
                };
                let to = change.status.clone();
                match self.book.apply_status(&change.order_id, change.status, now) {
                    Some(from) => {
                        info!(
                            id = %change.order_id,
                            from = %from,
                            to = %to,
                            updated_by = change.updated_by.as_deref().unwrap_or_default(),
                            "Order status updated by server"
                        );
                        SessionUpdate::StatusChanged {
                            id: change.order_id,
                            from,
                            to,
                        }
                    }
                    None => {
                        warn!(id = %change.order_id, status = %to, "Status update for unknown order");
                        SessionUpdate::UnknownOrder {
                            id: change.order_id,
                        }
                    }
                }
            }
            other => {
                debug!(event = other.name(), "Ignoring event");
                ignored(&other, "not an order event")
            }
        }
    }

    /// Change an order's status locally and tell the server.
    ///
    /// The local change is applied first and kept even if the server never
    /// hears about it. Ids that are not numeric are not sent. Returns whether
    /// a local order matched.
    pub fn update_order_status(&mut self, id: &str, status: OrderStatus) -> Result<bool> {
        self.update_order_status_at(id, status, Utc::now())
    }

    pub fn update_order_status_at(
        &mut self,
        id: &str,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if let Some(current) = self.book.get(id).map(|order| order.status.clone()) {
            if !current.is_conventional_transition(&status) {
                warn!(id, from = %current, to = %status, "Unusual status transition");
            }
        }

        let wire_status = status.as_str().to_string();
        let matched = self.book.apply_status(id, status, now).is_some();
        if !matched {
            warn!(id, "Local status change for unknown order");
        }

        match numeric_order_id(id) {
            Some(order_id) => {
                debug!(order_id, status = %wire_status, "Sending status update");
                self.connection.update_order_status(order_id, &wire_status)?;
            }
            None => warn!(id, "Order id is not numeric, status change kept local"),
        }
        Ok(matched)
    }

    /// Ask the server for a fresh snapshot.
    pub fn refresh(&self) -> Result<()> {
        self.connection.request_orders()
    }

    pub fn orders(&self) -> &[Order] {
        self.book.orders()
    }

    pub fn order(&self, id: &str) -> Option<&Order> {
        self.book.get(id)
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.status()
    }
}

fn ignored(event: &ServerEvent, reason: &str) -> SessionUpdate {
    SessionUpdate::Ignored {
        event: event.name().to_string(),
        reason: reason.to_string(),
    }
}

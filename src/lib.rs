#![deny(unreachable_pub)]

// Core modules
mod errors;
mod prelude;

pub mod config;
pub mod logging;
pub mod normalize;
pub mod session;
pub mod types;
pub mod ws;

#[cfg(test)]
mod tests;

// Re-exports
pub use config::AppConfig;
pub use errors::{Error, WsError};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use normalize::{
    normalize_confirmation, normalize_order, normalize_orders, normalize_status_change,
    ConnectionConfirmed, StatusChange,
};
pub use prelude::Result;
pub use session::{KitchenSession, OrderBook, SessionUpdate, Upsert};
pub use types::*;
pub use ws::{
    ClientEvent, ConnectionConfig, ConnectionManager, ConnectionState, ConnectionStatus,
    Connector, Endpoint, EventKind, Link, ServerEvent,
};

//! Realtime orders channel: Socket.IO framing, transport and the connection task.

mod endpoint;
pub mod message_types;
pub mod protocol;
mod reconnection;
mod transport;
mod ws_manager;

pub use endpoint::{Endpoint, ORDERS_NAMESPACE};
pub use message_types::{ClientEvent, EventKind, ServerEvent, UpdateOrderStatus};
pub use reconnection::{
    calculate_backoff_delay, ConnectionState, ConnectionStatus, HeartbeatConfig, ReconnectConfig,
    ReconnectPolicy,
};
pub use transport::{Connector, Link, SocketIoConnector};
pub use ws_manager::{ConnectionConfig, ConnectionManager};

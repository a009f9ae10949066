use std::time::Duration;

use thiserror::Error;

/// WebSocket-specific errors
#[derive(Error, Debug, Clone)]
pub enum WsError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Send error: {0}")]
    Send(String),
    #[error("Handshake error: {0}")]
    Handshake(String),
    #[error("Namespace {namespace} rejected the connection: {message}")]
    Rejected { namespace: String, message: String },
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),
}

/// Main client error type
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Transport-level failure
    #[error("Websocket error: {0}")]
    Ws(#[from] WsError),

    /// The configured base endpoint could not be turned into a connection target
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// Config file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// JSON encode/decode error
    #[error("Json parse error: {0}")]
    JsonParse(String),

    /// Engine.IO / Socket.IO frame that could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The connection task has exited and no longer accepts commands
    #[error("Connection manager stopped")]
    ManagerStopped,
}

// Convenience constructors for common error patterns
impl Error {
    /// Create a WebSocket connection error
    pub fn ws_connection(msg: impl Into<String>) -> Self {
        Error::Ws(WsError::Connection(msg.into()))
    }

    /// Create a WebSocket send error
    pub fn ws_send(msg: impl Into<String>) -> Self {
        Error::Ws(WsError::Send(msg.into()))
    }

    /// Create a JSON parse error
    pub fn json_parse(msg: impl Into<String>) -> Self {
        Error::JsonParse(msg.into())
    }

    /// Create an invalid endpoint error
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

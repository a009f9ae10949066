use url::Url;

use super::protocol::ENGINE_IO_VERSION;
use crate::{prelude::*, Error};

pub const ORDERS_NAMESPACE: &str = "/orders";
const SOCKET_IO_PATH: &str = "/socket.io/";

/// Where the orders channel lives, derived from the base API URL.
///
/// `https://api.example.com/api` resolves to origin `wss://api.example.com`,
/// handshake path `/api/socket.io/` and namespace `/orders`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    origin: String,
    path: String,
    namespace: String,
}

impl Endpoint {
    pub fn resolve(base_url: &str, namespace: &str) -> Result<Self> {
        let url = Url::parse(base_url.trim())
            .map_err(|e| Error::invalid_endpoint(base_url, e.to_string()))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::invalid_endpoint(
                    base_url,
                    format!("unsupported scheme '{other}'"),
                ))
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::invalid_endpoint(base_url, "missing host"))?;
        let origin = match url.port() {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        };

        let base_path = url.path().trim_end_matches('/');
        Ok(Self {
            origin,
            path: format!("{base_path}{SOCKET_IO_PATH}"),
            namespace: normalize_namespace(namespace),
        })
    }

    /// Resolve against the `/orders` namespace.
    pub fn orders(base_url: &str) -> Result<Self> {
        Self::resolve(base_url, ORDERS_NAMESPACE)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn handshake_url(&self) -> String {
        format!(
            "{}{}?EIO={ENGINE_IO_VERSION}&transport=websocket",
            self.origin, self.path
        )
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{} ns={}", self.origin, self.path, self.namespace)
    }
}

fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim().trim_matches('/');
    format!("/{trimmed}")
}

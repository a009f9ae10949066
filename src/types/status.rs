//! Order status values and their conventional flow.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Order status as reported by the server or chosen by the operator.
///
/// The kitchen flow is `new → completed → delivered`, with `new → cancelled`
/// as the alternate terminal path. Strings outside that set are kept verbatim
/// in [`OrderStatus::Other`] so they stay visible instead of being coerced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum OrderStatus {
    #[default]
    New,
    Completed,
    Cancelled,
    Delivered,
    Other(String),
}

impl OrderStatus {
    /// Resolve a raw status string. Blank input resolves to `New`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "new" => OrderStatus::New,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "delivered" => OrderStatus::Delivered,
            _ => OrderStatus::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OrderStatus::Other(_))
    }

    /// `cancelled` and `delivered` end the flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Delivered)
    }

    /// Whether moving to `next` follows the kitchen flow.
    ///
    /// Advisory only: the session records every transition it is given.
    pub fn is_conventional_transition(&self, next: &OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::New, OrderStatus::Completed)
                | (OrderStatus::New, OrderStatus::Cancelled)
                | (OrderStatus::Completed, OrderStatus::Delivered)
        ) || self == next
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for OrderStatus {
    fn from(raw: &str) -> Self {
        OrderStatus::parse(raw)
    }
}

impl Serialize for OrderStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(OrderStatus::parse(&raw))
    }
}

//! Canonical order model shared by the normalizer, the session and the display layer.

mod orders;
mod status;

pub use orders::*;
pub use status::*;

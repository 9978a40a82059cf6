//! Common types shared by the session and request engine crates

mod error;
mod secret;
pub mod telemetry;

pub use error::{Error, Result};
pub use secret::{REDACTED, Secret};

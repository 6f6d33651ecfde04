//! Shared types for the music stats workspace
//!
//! `Secret` wraps token and verifier material so it never reaches logs;
//! `Error` covers configuration loading for binaries.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;

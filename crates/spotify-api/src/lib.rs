//! Spotify Web API access on top of a session
//!
//! `Gateway` attaches the session's bearer token to each call and classifies
//! failures into `UpstreamError`; `endpoints` wraps the handful of calls the
//! stats commands need and `models` holds their response shapes.

pub mod classify;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod gateway;
mod metrics;
pub mod models;

pub use config::ApiConfig;
pub use endpoints::{TimeRange, current_user, recently_played, top_artists, top_tracks};
pub use error::{UpstreamError, UpstreamErrorKind};
pub use gateway::{CredentialSource, Gateway};

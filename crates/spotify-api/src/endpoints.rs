//! Typed wrappers over the endpoints the stats commands use

use std::fmt;
use std::str::FromStr;

use crate::error::UpstreamError;
use crate::gateway::Gateway;
use crate::models::{Artist, Paging, PlayHistory, Track, UserProfile};

/// Largest page the Web API serves for these endpoints
pub const MAX_LIMIT: u32 = 50;

/// Window for top-items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeRange {
    /// About four weeks
    ShortTerm,
    /// About six months
    #[default]
    MediumTerm,
    /// Several years
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" | "short_term" => Ok(TimeRange::ShortTerm),
            "medium" | "medium_term" => Ok(TimeRange::MediumTerm),
            "long" | "long_term" => Ok(TimeRange::LongTerm),
            other => Err(format!(
                "unknown time range '{other}' (expected short, medium or long)"
            )),
        }
    }
}

fn clamp_limit(limit: u32) -> String {
    limit.clamp(1, MAX_LIMIT).to_string()
}

pub async fn current_user(gateway: &Gateway) -> Result<UserProfile, UpstreamError> {
    gateway.request("/me", &[]).await
}

pub async fn top_artists(
    gateway: &Gateway,
    range: TimeRange,
    limit: u32,
) -> Result<Paging<Artist>, UpstreamError> {
    gateway
        .request(
            "/me/top/artists",
            &[
                ("time_range", range.as_str().to_string()),
                ("limit", clamp_limit(limit)),
            ],
        )
        .await
}

pub async fn top_tracks(
    gateway: &Gateway,
    range: TimeRange,
    limit: u32,
) -> Result<Paging<Track>, UpstreamError> {
    gateway
        .request(
            "/me/top/tracks",
            &[
                ("time_range", range.as_str().to_string()),
                ("limit", clamp_limit(limit)),
            ],
        )
        .await
}

pub async fn recently_played(
    gateway: &Gateway,
    limit: u32,
) -> Result<Paging<PlayHistory>, UpstreamError> {
    gateway
        .request("/me/player/recently-played", &[("limit", clamp_limit(limit))])
        .await
}

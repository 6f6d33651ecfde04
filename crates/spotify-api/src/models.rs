//! Response shapes for the endpoints this crate calls
//!
//! Only the fields the CLI and aggregations read are modeled; serde ignores
//! the rest. Optional fields default so older or trimmed payloads decode.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

/// Artist as returned by top-items (full object, with genres).
#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u32,
}

/// Artist reference nested inside tracks and albums.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub album: Album,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub duration_ms: u64,
}

/// One entry of the recently-played history.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayHistory {
    pub track: Track,
    pub played_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_history_decodes_with_unknown_fields() {
        let json = r#"{
            "items": [{
                "track": {
                    "id": "t1", "name": "Song", "popularity": 61, "explicit": false,
                    "album": {"id": "a1", "name": "Record", "album_type": "album",
                              "artists": [{"id": "r1", "name": "Band"}]},
                    "artists": [{"id": "r1", "name": "Band"}]
                },
                "played_at": "2026-01-02T03:04:05.000Z",
                "context": null
            }],
            "next": null,
            "cursors": {"after": "1", "before": "0"}
        }"#;
        let page: Paging<PlayHistory> = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        let track = &page.items[0].track;
        assert_eq!(track.album.id, "a1");
        assert_eq!(track.popularity, 61);
        assert_eq!(track.album.artists[0].name, "Band");
    }

    #[test]
    fn artist_without_genres_decodes() {
        let artist: Artist = serde_json::from_str(r#"{"id":"x","name":"X"}"#).unwrap();
        assert!(artist.genres.is_empty());
    }
}

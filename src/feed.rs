/// Content feed client
///
/// The feed is a generic JSON endpoint keyed by content type. It answers
/// with either a bare array or `{ "data": [...] }`; anything else is
/// treated as an empty list.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

/// One playable item from the feed. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "ID", alias = "id", default, deserialize_with = "lenient_text")]
    pub id: String,

    #[serde(rename = "Title", alias = "title", default, deserialize_with = "lenient_text")]
    pub title: String,

    #[serde(rename = "Artist", alias = "artist", default, deserialize_with = "lenient_text")]
    pub artist: String,

    /// Raw source link, resolved before playback
    #[serde(
        rename = "AudioURL",
        alias = "audioUrl",
        default,
        deserialize_with = "lenient_text"
    )]
    pub audio_url: String,

    #[serde(
        rename = "ThumbnailURL",
        alias = "thumbnailUrl",
        default,
        deserialize_with = "lenient_text"
    )]
    pub thumbnail_url: String,
}

/// Spreadsheet-backed feeds send numbers where text is expected
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

impl Track {
    /// Stable key for list rows: id, else audio link, else position
    pub fn display_key(&self, index: usize) -> String {
        if !self.id.is_empty() {
            self.id.clone()
        } else if !self.audio_url.is_empty() {
            self.audio_url.clone()
        } else {
            index.to_string()
        }
    }
}

/// `<base>?type=<kind>`
pub fn feed_url(base_url: &str, kind: &str) -> Result<Url, FeedError> {
    if kind.trim().is_empty() {
        return Err(FeedError::MissingKind);
    }
    let mut url = Url::parse(base_url).map_err(|e| FeedError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    url.query_pairs_mut().append_pair("type", kind);
    Ok(url)
}

/// Fetch the ordered track list for `kind`.
///
/// A failed request is an error, distinct from an empty feed.
pub fn fetch_tracks(
    http: &dyn HttpClient,
    base_url: &str,
    kind: &str,
) -> Result<Vec<Track>, FeedError> {
    let url = feed_url(base_url, kind)?;
    let value = http
        .get_json(url.as_str())
        .map_err(|source| FeedError::FetchFailed {
            kind: kind.to_string(),
            source,
        })?;
    let tracks = tracks_from_value(value);
    tracing::info!("Fetched {} {} item(s)", tracks.len(), kind);
    Ok(tracks)
}

/// Extract tracks from a feed document, skipping malformed entries
pub fn tracks_from_value(value: Value) -> Vec<Track> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Track>(item) {
            Ok(track) => Some(track),
            Err(e) => {
                tracing::warn!("Skipping feed entry {}: {}", index, e);
                None
            }
        })
        .collect()
}

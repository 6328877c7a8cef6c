/// Audio link resolution
///
/// Turns a raw link from the content feed into a URL that can be fetched as
/// a single audio file. Cloud-drive share links are rewritten into their
/// direct-download form; drive folders are rejected because a folder cannot
/// be streamed as one file.
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Host of the recognized cloud-drive sharing service
pub const DRIVE_HOST: &str = "drive.google.com";

/// Message shown to the user when a track's link cannot be played
pub const INVALID_LINK_MESSAGE: &str = "Invalid audio link. Use a file link, not a folder.";

/// Why a link was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRejection {
    /// No link was supplied
    Empty,

    /// The link points at a drive folder rather than a single file
    Folder,

    /// A drive link with no recognizable file id
    MissingFileId,
}

impl fmt::Display for LinkRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRejection::Empty => write!(f, "link is empty"),
            LinkRejection::Folder => write!(f, "link is a folder, not a file"),
            LinkRejection::MissingFileId => write!(f, "link has no file id"),
        }
    }
}

/// Result of resolving a source link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLink {
    /// A URL that can be handed to the cache or the playback engine
    Playable(String),

    /// The link must never reach the playback engine
    Rejected(LinkRejection),
}

impl ResolvedLink {
    pub fn is_playable(&self) -> bool {
        matches!(self, ResolvedLink::Playable(_))
    }

    /// The playable URL, if any
    pub fn playable(&self) -> Option<&str> {
        match self {
            ResolvedLink::Playable(url) => Some(url),
            ResolvedLink::Rejected(_) => None,
        }
    }

    pub fn into_playable(self) -> Option<String> {
        match self {
            ResolvedLink::Playable(url) => Some(url),
            ResolvedLink::Rejected(_) => None,
        }
    }
}

fn file_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/file/d/([^/?#]+)").expect("valid file path regex"))
}

fn id_query_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[?&]id=([^&#]+)").expect("valid id query regex"))
}

/// Resolve a raw source link into a playable URL or a rejection.
///
/// Pure and cheap; callers recompute it on every access instead of storing it.
pub fn resolve(source_url: &str) -> ResolvedLink {
    let raw = source_url.trim();
    if raw.is_empty() {
        return ResolvedLink::Rejected(LinkRejection::Empty);
    }

    if !is_drive_link(raw) {
        return ResolvedLink::Playable(raw.to_string());
    }

    if raw.contains("/folders/") {
        tracing::debug!("Rejected drive folder link: {}", raw);
        return ResolvedLink::Rejected(LinkRejection::Folder);
    }

    match extract_drive_id(raw) {
        Some(id) => ResolvedLink::Playable(direct_download_url(id)),
        None => {
            tracing::debug!("Rejected drive link without file id: {}", raw);
            ResolvedLink::Rejected(LinkRejection::MissingFileId)
        }
    }
}

/// Build the direct-download URL for a drive file id
pub fn direct_download_url(file_id: &str) -> String {
    format!("https://{}/uc?export=download&id={}", DRIVE_HOST, file_id)
}

/// Extract the drive file id from either `/file/d/<id>` or `?id=<id>`
pub fn extract_drive_id(link: &str) -> Option<&str> {
    file_path_pattern()
        .captures(link)
        .or_else(|| id_query_pattern().captures(link))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
}

fn is_drive_link(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => url
            .host_str()
            .map(|host| host.eq_ignore_ascii_case(DRIVE_HOST))
            .unwrap_or(false),
        // Scheme-less links such as "drive.google.com/file/d/..."
        Err(_) => raw.contains(DRIVE_HOST),
    }
}

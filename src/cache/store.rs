/// Content-addressed audio cache
///
/// Maps a source URL to `<root>/audio_<hash>.<ext>` and downloads the file on
/// first use. The key is the resolved URL, so a drive sharing link and its
/// direct-download form share one file. The cache never evicts and has no
/// size cap.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::CacheError;
use crate::http::HttpClient;
use crate::link_resolver::{self, ResolvedLink};

/// Extension used when the URL does not carry one
pub const DEFAULT_EXTENSION: &str = "mp3";

static PART_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stable 32-bit string hash (`h = h * 31 + unit` over UTF-16 units).
///
/// Not collision resistant. Two URLs could share a path; tolerated at the
/// catalogue sizes this cache serves.
pub fn hash_url(value: &str) -> String {
    let hash = value
        .encode_utf16()
        .fold(0u32, |acc, unit| acc.wrapping_mul(31).wrapping_add(u32::from(unit)));
    format!("{:x}", hash)
}

/// Infer a file extension from the last path segment of a URL
pub fn infer_extension(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let path = match without_query.find("://") {
        Some(idx) => {
            let after_scheme = &without_query[idx + 3..];
            after_scheme.find('/').map(|p| &after_scheme[p..]).unwrap_or("")
        }
        None => without_query,
    };
    let last_segment = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");

    match last_segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Resolved URL for playable links; rejected links keep their raw text
fn cache_key(source_url: &str) -> String {
    link_resolver::resolve(source_url)
        .into_playable()
        .unwrap_or_else(|| source_url.to_string())
}

/// Audio cache rooted at a fixed directory
pub struct CacheStore {
    root: PathBuf,
    http: Arc<dyn HttpClient>,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            root: root.into(),
            http,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic local path for a source URL, keyed on its resolved form
    pub fn path_for(&self, source_url: &str) -> PathBuf {
        let key = cache_key(source_url);
        self.root
            .join(format!("audio_{}.{}", hash_url(&key), infer_extension(&key)))
    }

    /// Return the cached path if the file is already on disk (no network)
    pub fn lookup(&self, source_url: &str) -> Option<PathBuf> {
        if source_url.is_empty() {
            return None;
        }
        let path = self.path_for(source_url);
        path.is_file().then_some(path)
    }

    /// Return a local copy of `source_url`, downloading it when missing.
    ///
    /// Failures return `None`; the caller streams the resolved URL instead.
    pub fn ensure(&self, source_url: &str) -> Option<PathBuf> {
        match self.try_ensure(source_url) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Cache fill failed for {}: {}", source_url, e);
                None
            }
        }
    }

    /// Like [`CacheStore::ensure`] but reports why the cache could not be filled
    pub fn try_ensure(&self, source_url: &str) -> Result<PathBuf, CacheError> {
        let resolved = match link_resolver::resolve(source_url) {
            ResolvedLink::Playable(url) => url,
            ResolvedLink::Rejected(reason) => return Err(CacheError::Rejected(reason.to_string())),
        };

        let path = self.path_for(&resolved);
        if path.is_file() {
            tracing::debug!("Cache hit: {}", path.display());
            return Ok(path);
        }

        fs::create_dir_all(&self.root).map_err(|source| CacheError::DirectoryCreationFailed {
            path: self.root.display().to_string(),
            source,
        })?;

        let part = self.part_path(&path);
        if let Err(e) = self.http.download_to(&resolved, &part) {
            let _ = fs::remove_file(&part);
            return Err(CacheError::DownloadFailed(e));
        }

        // Concurrent fills of the same URL each use their own part file; the last rename wins.
        fs::rename(&part, &path).map_err(|source| {
            let _ = fs::remove_file(&part);
            CacheError::PersistFailed {
                path: path.display().to_string(),
                source,
            }
        })?;

        tracing::info!("Cached {} at {}", resolved, path.display());
        Ok(path)
    }

    fn part_path(&self, target: &Path) -> PathBuf {
        let n = PART_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}-{}.part", std::process::id(), n));
        target.with_file_name(name)
    }
}

/// Audio cache module
///
/// ```text
/// PrefetchScheduler ──warm(url)──> CacheStore ──download──> <root>/audio_<hash>.<ext>
///        │                              ▲
///        └── warmed map (url -> path)   └── ensure(url) / lookup(url)
/// ```
///
/// The cache is an optimization only: when a file is not available locally
/// the resolved URL is streamed directly.
pub mod prefetch;
pub mod store;

pub use prefetch::PrefetchScheduler;
pub use store::{hash_url, infer_extension, CacheStore, DEFAULT_EXTENSION};

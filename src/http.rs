/// HTTP access used by the feed, the cache and the download exporter
///
/// Everything goes through the [`HttpClient`] trait so the blocking ureq
/// agent can be swapped for an in-process fake in tests.
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use crate::error::HttpError;

/// Blocking HTTP operations. Callers run these on worker threads.
pub trait HttpClient: Send + Sync {
    /// Fetch a whole response body into memory
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError>;

    /// Fetch and parse a JSON document
    fn get_json(&self, url: &str) -> Result<serde_json::Value, HttpError>;

    /// Download a response body into `dest`, returning the number of bytes written
    fn download_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError>;
}

/// [`HttpClient`] backed by a shared `ureq::Agent`
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new(timeout: Duration) -> Self {
        let user_agent = format!("chapel-audio/{}", env!("CARGO_PKG_VERSION"));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .user_agent(&user_agent)
            .build();
        Self { agent }
    }

    fn call(&self, url: &str) -> Result<ureq::Response, HttpError> {
        match self.agent.get(url).call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, _)) => Err(HttpError::Status {
                url: url.to_string(),
                status,
            }),
            Err(e) => Err(HttpError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

impl HttpClient for UreqClient {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self.call(url)?;
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| HttpError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn get_json(&self, url: &str) -> Result<serde_json::Value, HttpError> {
        let response = self.call(url)?;
        response.into_json().map_err(|e| HttpError::Parse {
            url: url.to_string(),
            source: Box::new(e),
        })
    }

    fn download_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
        let response = self.call(url)?;
        let mut file = File::create(dest).map_err(|source| HttpError::Io {
            path: dest.display().to_string(),
            source,
        })?;
        let written = io::copy(&mut response.into_reader(), &mut file).map_err(|source| {
            HttpError::Io {
                path: dest.display().to_string(),
                source,
            }
        })?;
        tracing::debug!("Downloaded {} bytes from {} to {}", written, url, dest.display());
        Ok(written)
    }
}

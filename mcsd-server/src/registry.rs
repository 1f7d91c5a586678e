//! Directory Registry (§4.B): in-memory catalog of known source
//! directories, keyed by `(baseURL, authoritativeURA)`.

use mcsd_core::source::trim_one_trailing_slash;
use mcsd_core::SourceDirectory;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Ordered, mutex-guarded catalog of source directories. Iteration order is
/// insertion order; entries appended by discovery during a run are visited
/// within the same pass (§5, §9).
pub struct DirectoryRegistry {
    entries: Mutex<Vec<SourceDirectory>>,
    exclude: Vec<String>,
}

impl DirectoryRegistry {
    pub fn new(roots: Vec<SourceDirectory>, exclude: Vec<String>) -> Self {
        Self { entries: Mutex::new(roots), exclude }
    }

    /// Idempotent on `(baseURL, authoritativeURA)`. Validates the URL is
    /// absolute http(s). Silently skips (no error) URLs on the exclusion
    /// list, matched after trimming one trailing slash (§4.B, §6).
    pub async fn register(&self, candidate: SourceDirectory) {
        if !is_absolute_http_url(&candidate.base_url) {
            warn!(base_url = %candidate.base_url, "refusing to register non-absolute-http base URL");
            return;
        }

        let trimmed = trim_one_trailing_slash(&candidate.base_url);
        if self
            .exclude
            .iter()
            .any(|excluded| trim_one_trailing_slash(excluded) == trimmed)
        {
            return;
        }

        let mut entries = self.entries.lock().await;
        if entries.iter().any(|e| e.key() == candidate.key()) {
            return;
        }
        info!(base_url = %candidate.base_url, ura = %candidate.authoritative_ura, "registered source directory");
        entries.push(candidate);
    }

    /// Remove every entry whose `source_entry_url` equals `url` (§4.B, §4.I).
    pub async fn unregister_by_source_entry_url(&self, url: &str) {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.source_entry_url != url);
        if entries.len() != before {
            info!(source_entry_url = %url, "unregistered source directory");
        }
    }

    /// A snapshot of the registry taken at the current instant. Discovery
    /// during iteration appends to the live registry; callers that need to
    /// observe newly-discovered entries within the same run should index
    /// via [`Self::get_at`] / [`Self::len`] instead of relying on a single
    /// stale snapshot.
    pub async fn snapshot(&self) -> Vec<SourceDirectory> {
        self.entries.lock().await.clone()
    }

    pub async fn get_at(&self, index: usize) -> Option<SourceDirectory> {
        self.entries.lock().await.get(index).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn is_absolute_http_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && url.splitn(2, "://").nth(1).is_some_and(|rest| !rest.is_empty())
}

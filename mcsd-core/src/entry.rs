//! The Bundle Entry external model (§3): one entry pulled from a source's
//! `_history` or current-state feed.

use serde_json::Value;

use crate::resource::Resource;
use crate::source::parse_source_url;

/// A FHIR bundle entry as pulled from a source directory.
#[derive(Debug, Clone)]
pub struct PulledEntry {
    pub full_url: String,
    pub resource: Option<Value>,
    pub method: Method,
    /// `request.url` as returned by the source (history/snapshot feed);
    /// for snapshot-mode entries this is synthesized (§4.H step 3).
    pub request_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "PUT" => Some(Method::Put),
            "POST" => Some(Method::Post),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn is_delete(self) -> bool {
        matches!(self, Method::Delete)
    }
}

impl PulledEntry {
    pub fn resource_type(&self) -> Option<&str> {
        self.resource
            .as_ref()
            .and_then(Resource::resource_type)
            .or_else(|| self.request_url.split('/').next().filter(|s| !s.is_empty()))
    }

    /// Extract a resource ID per §4.D step 1: from `resource.id` for
    /// PUT/POST; from `request.url`'s second path segment for DELETE,
    /// falling back to the last path segment of `fullUrl`.
    pub fn extract_id(&self) -> Option<String> {
        if let Some(resource) = &self.resource {
            if let Some(id) = Resource::id_of(resource) {
                return Some(id.to_string());
            }
        }
        if self.method.is_delete() {
            if let Some((_, id)) = self
                .request_url
                .trim_start_matches('/')
                .split_once('/')
            {
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
            if let Some((_, id)) = parse_source_url(&self.full_url) {
                return Some(id);
            }
            return self
                .full_url
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
        }
        None
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.resource.as_ref().and_then(Resource::last_updated_of)
    }
}

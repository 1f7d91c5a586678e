//! Source Directory identity and the source-URL fingerprint (§3, §4.A, §9).

use serde::{Deserialize, Serialize};

use crate::constants::ROOT_RESOURCE_TYPES;
use crate::error::{CoreError, Result};

/// A remote FHIR directory to pull from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDirectory {
    pub base_url: String,
    /// Empty for root (administration) directories.
    #[serde(default)]
    pub authoritative_ura: String,
    pub resource_types: Vec<String>,
    pub discover: bool,
    /// `fullUrl` of the Endpoint that caused this entry to be registered;
    /// empty for configured roots.
    #[serde(default)]
    pub source_entry_url: String,
}

impl SourceDirectory {
    pub fn root(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            authoritative_ura: String::new(),
            resource_types: ROOT_RESOURCE_TYPES.iter().map(|s| s.to_string()).collect(),
            discover: true,
            source_entry_url: String::new(),
        }
    }

    /// Identity used for registry dedup and the cursor store composite key.
    pub fn key(&self) -> String {
        directory_key(&self.base_url, &self.authoritative_ura)
    }

    pub fn is_root(&self) -> bool {
        self.authoritative_ura.is_empty()
    }
}

/// Composite key: `"{baseURL}"` for roots, `"{baseURL}|{authoritativeURA}"`
/// for discovered directories (§4.C, §6).
pub fn directory_key(base_url: &str, authoritative_ura: &str) -> String {
    if authoritative_ura.is_empty() {
        base_url.to_string()
    } else {
        format!("{base_url}|{authoritative_ura}")
    }
}

/// Validate that a base URL is an absolute `http` or `https` URL, returning
/// it with exactly zero trailing slashes (callers compare against the
/// exclusion list "after trimming one trailing slash", §4.B).
pub fn trim_one_trailing_slash(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

fn validate_absolute_http_url(url: &str) -> Result<()> {
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(CoreError::InvalidBaseUrl(url.to_string()));
    }
    // A scheme with no host is not a usable absolute URL.
    let after_scheme = url.splitn(2, "://").nth(1).unwrap_or("");
    if after_scheme.trim_start_matches('/').is_empty() {
        return Err(CoreError::InvalidBaseUrl(url.to_string()));
    }
    Ok(())
}

/// `Build(baseURL, resourceType, id)` (§4.A): the deterministic, stable
/// source-URL fingerprint used for `meta.source` and `_source` conditionals.
pub fn build_source_url(base_url: &str, resource_type: &str, id: &str) -> Result<String> {
    validate_absolute_http_url(base_url)?;
    let base = base_url.trim_end_matches('/');
    Ok(format!("{base}/{resource_type}/{id}"))
}

/// `Build(baseURL, "ResourceType/id")` overload (§4.A).
pub fn build_source_url_from_ref(base_url: &str, type_and_id: &str) -> Result<String> {
    let (resource_type, id) = type_and_id
        .split_once('/')
        .ok_or_else(|| CoreError::InvalidSourceUrl(type_and_id.to_string()))?;
    build_source_url(base_url, resource_type, id)
}

/// Recover `(resourceType, id)` from a source URL built by
/// [`build_source_url`]. Used by the History Deduplicator to derive an ID
/// from a DELETE's `request.url` path (§4.D), and to support the round-trip
/// testable property in §8.
pub fn parse_source_url(source_url: &str) -> Option<(String, String)> {
    let mut segments: Vec<&str> = source_url.rsplitn(3, '/').collect();
    if segments.len() < 2 {
        return None;
    }
    let id = segments.remove(0);
    let resource_type = segments.first().copied()?;
    if id.is_empty() || resource_type.is_empty() {
        return None;
    }
    Some((resource_type.to_string(), id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_source_url_strips_trailing_slash() {
        let url = build_source_url("https://example.com/fhir/", "Organization", "123").unwrap();
        assert_eq!(url, "https://example.com/fhir/Organization/123");
    }

    #[test]
    fn build_source_url_rejects_relative_base() {
        assert!(build_source_url("not-a-url", "Organization", "1").is_err());
    }

    #[test]
    fn build_source_url_from_ref_splits_type_and_id() {
        let url = build_source_url_from_ref("https://example.com/fhir", "Endpoint/42").unwrap();
        assert_eq!(url, "https://example.com/fhir/Endpoint/42");
    }

    #[test]
    fn parse_source_url_round_trips() {
        let url = build_source_url("https://example.com/fhir", "Organization", "abc-1").unwrap();
        assert_eq!(
            parse_source_url(&url),
            Some(("Organization".to_string(), "abc-1".to_string()))
        );
    }

    #[test]
    fn directory_key_roots_vs_discovered() {
        assert_eq!(directory_key("https://root", ""), "https://root");
        assert_eq!(
            directory_key("https://provider", "12345678"),
            "https://provider|12345678"
        );
    }

    #[test]
    fn trim_one_trailing_slash_only_trims_once() {
        assert_eq!(trim_one_trailing_slash("https://example.com//"), "https://example.com/");
        assert_eq!(trim_one_trailing_slash("https://example.com"), "https://example.com");
    }
}

//! FHIR Access Layer (§4.A): history/current search with pagination, and
//! transaction-bundle submission.

use std::sync::Arc;

use mcsd_core::constants::{MAX_SEARCH_ENTRIES, SEARCH_PAGE_SIZE};
use mcsd_core::entry::{Method, PulledEntry};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::error::{ClientError, Result};

/// The result of a (possibly multi-page) search.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub entries: Vec<PulledEntry>,
    /// `Bundle.meta.lastUpdated` of the *first* page only (§4.H step 2).
    pub first_page_last_updated: Option<String>,
}

pub struct FhirAccess {
    http: reqwest::Client,
    token_provider: Arc<dyn TokenProvider>,
}

impl FhirAccess {
    pub fn new(http: reqwest::Client, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self { http, token_provider }
    }

    pub fn with_no_auth(http: reqwest::Client) -> Self {
        Self::new(http, Arc::new(crate::auth::NoAuthProvider))
    }

    /// `GET {base}/{ResourceType}/_history?_count=100[&_since=...]`.
    pub async fn search_history(
        &self,
        base: &str,
        resource_type: &str,
        since: Option<&str>,
    ) -> Result<SearchResult> {
        let mut url = format!(
            "{}/{}/_history?_count={}",
            base.trim_end_matches('/'),
            resource_type,
            SEARCH_PAGE_SIZE
        );
        if let Some(since) = since {
            url.push_str("&_since=");
            url.push_str(since);
        }
        self.paginate(url).await
    }

    /// `GET {base}/{ResourceType}?_count=100`.
    pub async fn search_current(&self, base: &str, resource_type: &str) -> Result<SearchResult> {
        let url = format!(
            "{}/{}?_count={}",
            base.trim_end_matches('/'),
            resource_type,
            SEARCH_PAGE_SIZE
        );
        self.paginate(url).await
    }

    async fn paginate(&self, first_url: String) -> Result<SearchResult> {
        let mut url = Some(first_url);
        let mut entries = Vec::new();
        let mut first_page_last_updated = None;
        let mut first_page = true;

        while let Some(current) = url.take() {
            let bundle = self.get_bundle(&current).await?;

            if first_page {
                first_page_last_updated = bundle
                    .get("meta")
                    .and_then(|m| m.get("lastUpdated"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                first_page = false;
            }

            for entry in bundle.get("entry").and_then(|e| e.as_array()).into_iter().flatten() {
                if let Some(parsed) = parse_history_entry(entry) {
                    entries.push(parsed);
                }
            }

            if entries.len() > MAX_SEARCH_ENTRIES {
                return Err(ClientError::TooManyEntries(entries.len()));
            }

            url = next_link(&bundle);
        }

        Ok(SearchResult { entries, first_page_last_updated })
    }

    async fn get_bundle(&self, url: &str) -> Result<Value> {
        let mut request = self.http.get(url).header("Accept", "application/fhir+json");
        if let Some(token) = self.token_provider.token().await? {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Request { url: url.to_string(), source: e })?;

        let status = response.status();
        if status.as_u16() == 410 {
            return Err(ClientError::Gone(url.to_string()));
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus(url.to_string(), status.as_u16()));
        }

        let bundle: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Request { url: url.to_string(), source: e })?;
        Ok(bundle)
    }

    /// `POST {base}/` with a `type=transaction` bundle (§4.A, §6).
    pub async fn submit_transaction(&self, base: &str, bundle: Value) -> Result<Value> {
        let url = format!("{}/", base.trim_end_matches('/'));
        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/fhir+json");
        if let Some(token) = self.token_provider.token().await? {
            request = request.bearer_auth(token);
        }

        let response = request
            .json(&bundle)
            .send()
            .await
            .map_err(|e| ClientError::Request { url: url.clone(), source: e })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "transaction submission failed");
            return Err(ClientError::UnexpectedStatus(url, status.as_u16()));
        }

        let response_bundle: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Request { url, source: e })?;
        debug!("transaction submitted successfully");
        Ok(response_bundle)
    }
}

fn next_link(bundle: &Value) -> Option<String> {
    bundle
        .get("link")
        .and_then(|l| l.as_array())
        .and_then(|links| {
            links.iter().find(|link| {
                link.get("relation").and_then(|r| r.as_str()) == Some("next")
            })
        })
        .and_then(|link| link.get("url"))
        .and_then(|u| u.as_str())
        .map(|s| s.to_string())
}

fn parse_history_entry(entry: &Value) -> Option<PulledEntry> {
    let full_url = entry.get("fullUrl").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let resource = entry.get("resource").cloned();
    let request = entry.get("request");
    let method_str = request.and_then(|r| r.get("method")).and_then(|m| m.as_str());
    let request_url = request
        .and_then(|r| r.get("url"))
        .and_then(|u| u.as_str())
        .unwrap_or_default()
        .to_string();

    let method = match method_str.and_then(Method::parse) {
        Some(m) => m,
        None if resource.is_some() => Method::Put,
        None => return None,
    };

    Some(PulledEntry { full_url, resource, method, request_url })
}

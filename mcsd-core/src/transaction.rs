//! Transaction Builder (§4.G): strip server-assigned identifiers, rewrite
//! references to source-qualified conditional references, set
//! `meta.source`, and produce transaction-bundle entries.

use serde_json::{json, Value};

use crate::constants::{MCSD_DIRECTORY_PAYLOAD_CODE, MCSD_PAYLOAD_TYPE_SYSTEM};
use crate::entry::{Method, PulledEntry};
use crate::error::Result;
use crate::resource::Resource;
use crate::source::build_source_url;

/// One entry of the FHIR transaction bundle submitted to the query
/// directory: either a conditional PUT with a body, or a conditional
/// DELETE with none.
#[derive(Debug, Clone)]
pub struct TransactionEntry {
    pub method: &'static str,
    pub url: String,
    pub resource: Option<Value>,
}

/// True if an Endpoint resource carries the mCSD-directory payload-type
/// coding (used both by the discoverability filter here and by the
/// Endpoint Discoverer).
pub fn is_mcsd_directory_endpoint(resource: &Value) -> bool {
    resource
        .get("payloadType")
        .and_then(|v| v.as_array())
        .is_some_and(|types| {
            types.iter().any(|ct| {
                ct.get("coding")
                    .and_then(|c| c.as_array())
                    .is_some_and(|codings| {
                        codings.iter().any(|coding| {
                            coding.get("system").and_then(|s| s.as_str())
                                == Some(MCSD_PAYLOAD_TYPE_SYSTEM)
                                && coding.get("code").and_then(|c| c.as_str())
                                    == Some(MCSD_DIRECTORY_PAYLOAD_CODE)
                        })
                    })
            })
        })
}

/// Build a transaction entry for one validated, deduplicated pulled entry.
///
/// `source_base` is the source directory's base URL. `is_discoverable_source`
/// is true when `entry` came from a root (discoverable) directory; it
/// drives both the discoverability filter (root content other than
/// directory Endpoints is dropped) and, inverted, the LRZa name-authority
/// rule (only a provider directory's Organization has its name stripped).
pub fn build_entry(
    entry: &PulledEntry,
    source_base: &str,
    is_discoverable_source: bool,
) -> Result<Option<TransactionEntry>> {
    if entry.method.is_delete() {
        let (resource_type, id) = match entry.extract_id().and_then(|id| {
            entry.resource_type().map(|rt| (rt.to_string(), id))
        }) {
            Some(pair) => pair,
            None => return Ok(None),
        };
        if is_discoverable_source && resource_type != "Endpoint" {
            return Ok(None);
        }
        let source_url = build_source_url(source_base, &resource_type, &id)?;
        let url = format!("{resource_type}?_source={}", urlencoding::encode(&source_url));
        return Ok(Some(TransactionEntry { method: "DELETE", url, resource: None }));
    }

    let Some(resource) = &entry.resource else { return Ok(None) };
    let resource_type = Resource::resource_type(resource).unwrap_or_default().to_string();
    let id = Resource::id_of(resource).unwrap_or_default().to_string();
    if id.is_empty() {
        return Ok(None);
    }

    let is_directory_endpoint = resource_type == "Endpoint" && is_mcsd_directory_endpoint(resource);
    if is_discoverable_source && !is_directory_endpoint {
        // Discoverable (root) directory content other than directory
        // Endpoints is never forwarded to the query directory (§4.G).
        return Ok(None);
    }

    let source_url = build_source_url(source_base, &resource_type, &id)?;
    let mut body = resource.clone();

    if let Some(obj) = body.as_object_mut() {
        obj.remove("id");
        let meta = obj.entry("meta").or_insert_with(|| json!({}));
        if let Some(meta_obj) = meta.as_object_mut() {
            meta_obj.remove("versionId");
            meta_obj.remove("lastUpdated");
            meta_obj.insert("source".to_string(), json!(source_url));
        }

        // LRZa name-authority rule: a discovered (non-root) provider
        // directory is not authoritative for the name of a URA-bearing
        // organization; the root registry owns that name instead.
        if !is_discoverable_source
            && resource_type == "Organization"
            && !Resource::ura_identifiers(&body).is_empty()
        {
            obj.remove("name");
        }
    }

    rewrite_references(&mut body, source_base)?;

    let url = format!("{resource_type}?_source={}", urlencoding::encode(&source_url));
    Ok(Some(TransactionEntry { method: "PUT", url, resource: Some(body) }))
}

/// Recursively rewrite every `reference` field of shape `"Type/id"` to the
/// `_source`-conditional form (§4.G step 4, §8 invariant 2).
fn rewrite_references(value: &mut Value, source_base: &str) -> Result<()> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("reference").and_then(|v| v.as_str()) {
                if let Some((rt, id)) = crate::resource::split_reference(reference) {
                    let source_url = build_source_url(source_base, rt, id)?;
                    let rewritten =
                        format!("{rt}?_source={}", urlencoding::encode(&source_url));
                    map.insert("reference".to_string(), json!(rewritten));
                }
            }
            for v in map.values_mut() {
                rewrite_references(v, source_base)?;
            }
        }
        Value::Array(arr) => {
            for item in arr {
                rewrite_references(item, source_base)?;
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn synthetic_put_entry(full_url: String, resource: Value) -> PulledEntry {
    let request_url = format!(
        "{}/{}",
        Resource::resource_type(&resource).unwrap_or_default(),
        Resource::id_of(&resource).unwrap_or_default(),
    );
    PulledEntry { full_url, resource: Some(resource), method: Method::Put, request_url }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put_entry(resource: Value) -> PulledEntry {
        let rt = Resource::resource_type(&resource).unwrap().to_string();
        let id = Resource::id_of(&resource).unwrap().to_string();
        PulledEntry {
            full_url: format!("https://src/{rt}/{id}"),
            resource: Some(resource),
            method: Method::Put,
            request_url: format!("{rt}/{id}"),
        }
    }

    #[test]
    fn strips_id_and_sets_meta_source() {
        let entry = put_entry(json!({
            "resourceType": "Organization",
            "id": "42",
            "meta": {"versionId": "3", "lastUpdated": "2024-01-01T00:00:00Z"},
            "name": "Example"
        }));
        let built = build_entry(&entry, "https://source.example/fhir", false)
            .unwrap()
            .unwrap();
        assert_eq!(built.method, "PUT");
        let resource = built.resource.unwrap();
        assert!(resource.get("id").is_none());
        assert_eq!(
            resource["meta"]["source"],
            "https://source.example/fhir/Organization/42"
        );
        assert!(resource["meta"].get("versionId").is_none());
        assert_eq!(
            built.url,
            format!(
                "Organization?_source={}",
                urlencoding::encode("https://source.example/fhir/Organization/42")
            )
        );
    }

    #[test]
    fn rewrites_bare_type_id_references() {
        let entry = put_entry(json!({
            "resourceType": "HealthcareService",
            "id": "hs1",
            "providedBy": {"reference": "Organization/org1"}
        }));
        let built = build_entry(&entry, "https://source.example/fhir", false)
            .unwrap()
            .unwrap();
        let resource = built.resource.unwrap();
        let expected_source = "https://source.example/fhir/Organization/org1";
        assert_eq!(
            resource["providedBy"]["reference"],
            format!("Organization?_source={}", urlencoding::encode(expected_source))
        );
    }

    #[test]
    fn discoverable_source_filters_non_directory_endpoints() {
        let entry = put_entry(json!({"resourceType": "Organization", "id": "1"}));
        assert!(build_entry(&entry, "https://root.example/fhir", true).unwrap().is_none());
    }

    #[test]
    fn discoverable_source_forwards_directory_endpoints() {
        let entry = put_entry(json!({
            "resourceType": "Endpoint",
            "id": "ep1",
            "payloadType": [{
                "coding": [{"system": MCSD_PAYLOAD_TYPE_SYSTEM, "code": MCSD_DIRECTORY_PAYLOAD_CODE}]
            }]
        }));
        let built = build_entry(&entry, "https://root.example/fhir", true).unwrap();
        assert!(built.is_some());
    }

    #[test]
    fn lrza_rule_strips_name_from_discovered_ura_organization() {
        use crate::constants::URA_NAMING_SYSTEM;
        let entry = put_entry(json!({
            "resourceType": "Organization",
            "id": "org1",
            "name": "Provider Hospital",
            "identifier": [{"system": URA_NAMING_SYSTEM, "value": "12345678"}]
        }));
        let built = build_entry(&entry, "https://provider.example/fhir", false)
            .unwrap()
            .unwrap();
        assert!(built.resource.unwrap().get("name").is_none());
    }

    #[test]
    fn delete_entry_builds_conditional_delete() {
        let entry = PulledEntry {
            full_url: "https://src/Organization/1".to_string(),
            resource: None,
            method: Method::Delete,
            request_url: "Organization/1".to_string(),
        };
        let built = build_entry(&entry, "https://source.example/fhir", false)
            .unwrap()
            .unwrap();
        assert_eq!(built.method, "DELETE");
        assert!(built.resource.is_none());
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::URA_NAMING_SYSTEM;

/// A FHIR resource, modeled loosely like the rest of the ecosystem: the
/// fields every component needs to inspect are typed, everything else is
/// kept as an opaque JSON blob so we never lose data we don't understand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,

    #[serde(flatten)]
    pub rest: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Meta {
    #[serde(rename = "versionId", skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,

    #[serde(rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Resource {
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    pub fn resource_type(value: &Value) -> Option<&str> {
        value.get("resourceType").and_then(|v| v.as_str())
    }

    pub fn id_of(value: &Value) -> Option<&str> {
        value.get("id").and_then(|v| v.as_str())
    }

    pub fn last_updated_of(value: &Value) -> Option<&str> {
        value
            .get("meta")
            .and_then(|m| m.get("lastUpdated"))
            .and_then(|v| v.as_str())
    }

    /// All `identifier[].value` entries whose `system` equals the URA
    /// naming system (there should be at most one per root, §4.F rule 1).
    pub fn ura_identifiers(value: &Value) -> Vec<&str> {
        value
            .get("identifier")
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter(|ident| {
                        ident.get("system").and_then(|s| s.as_str()) == Some(URA_NAMING_SYSTEM)
                    })
                    .filter_map(|ident| ident.get("value").and_then(|v| v.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `Organization.partOf.reference`, if present, as `(type, id)`.
    pub fn part_of_reference(value: &Value) -> Option<(&str, &str)> {
        let reference = value
            .get("partOf")
            .and_then(|p| p.get("reference"))
            .and_then(|r| r.as_str())?;
        split_reference(reference)
    }

    /// A simple reference field's `(type, id)`, e.g. `providedBy`,
    /// `managingOrganization`, `organization`.
    pub fn reference_field<'a>(value: &'a Value, field: &str) -> Option<(&'a str, &'a str)> {
        let reference = value
            .get(field)
            .and_then(|p| p.get("reference"))
            .and_then(|r| r.as_str())?;
        split_reference(reference)
    }

    /// `Organization.endpoint[].reference` / `HealthcareService.endpoint[].reference`.
    pub fn endpoint_references(value: &Value) -> Vec<(&str, &str)> {
        value
            .get("endpoint")
            .and_then(|v| v.as_array())
            .map(|eps| {
                eps.iter()
                    .filter_map(|ep| ep.get("reference").and_then(|r| r.as_str()))
                    .filter_map(split_reference)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Split a bare reference of shape `"Type/id"` into its parts. References
/// of any other shape (urn:uuid:, absolute URL, conditional `_source=`)
/// are not split references in this model and yield `None`.
pub fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let (rt, id) = reference.split_once('/')?;
    if rt.is_empty() || id.is_empty() || id.contains('/') {
        return None;
    }
    Some((rt, id))
}

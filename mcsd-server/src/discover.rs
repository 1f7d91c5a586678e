//! Endpoint Discoverer (§4.I, covered procedurally by §4.H steps 4 and 8).
//!
//! Pure helpers kept separate from [`crate::orchestrator`] so the
//! discovery logic — which entries trigger a registration or an
//! unregistration — is unit-testable without a live registry or network.

use mcsd_core::{is_mcsd_directory_endpoint, Method, OrganizationTree, PulledEntry, Resource, SourceDirectory};

/// `fullUrl`s of Endpoint DELETE entries in this window (§4.H step 4):
/// each one unregisters the matching registry entry by `source_entry_url`.
pub fn endpoint_deletes(entries: &[PulledEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.method == Method::Delete && e.resource_type() == Some("Endpoint"))
        .map(|e| e.full_url.clone())
        .collect()
}

/// One newly discovered source directory, ready to be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub address: String,
    pub source_entry_url: String,
    pub authoritative_ura: String,
}

/// For each root organization in `tree` whose `endpoint[]` references an
/// Endpoint present in `entries` that carries the mCSD-directory
/// payload-type coding, produce a [`Discovery`] (§4.H step 8).
pub fn find_new_directories(tree: &OrganizationTree, entries: &[PulledEntry]) -> Vec<Discovery> {
    let mut discoveries = Vec::new();

    for (root_id, ura) in &tree.roots {
        let Some(org) = tree.all.get(root_id) else { continue };
        for (ref_type, endpoint_id) in Resource::endpoint_references(org) {
            if ref_type != "Endpoint" {
                continue;
            }
            let Some(entry) = entries.iter().find(|e| {
                e.method != Method::Delete
                    && e.resource_type() == Some("Endpoint")
                    && e.resource.as_ref().and_then(Resource::id_of) == Some(endpoint_id)
            }) else {
                continue;
            };
            let Some(resource) = &entry.resource else { continue };
            if !is_mcsd_directory_endpoint(resource) {
                continue;
            }
            let Some(address) = resource.get("address").and_then(|v| v.as_str()) else { continue };
            discoveries.push(Discovery {
                address: address.to_string(),
                source_entry_url: entry.full_url.clone(),
                authoritative_ura: ura.clone(),
            });
        }
    }

    discoveries
}

pub fn discovery_to_source_directory(
    discovery: &Discovery,
    default_resource_types: &[String],
) -> SourceDirectory {
    SourceDirectory {
        base_url: discovery.address.clone(),
        authoritative_ura: discovery.authoritative_ura.clone(),
        resource_types: default_resource_types.to_vec(),
        discover: false,
        source_entry_url: discovery.source_entry_url.clone(),
    }
}

//! Validator (§4.F): URA authority, orphan rejection, endpoint reachability,
//! and tree well-formedness.

use serde_json::Value;

use crate::org_tree::OrganizationTree;
use crate::resource::Resource;

/// A validation failure. All of these are per-entry warnings except
/// [`ValidationError::MultipleRootUras`], which aborts the whole sync for
/// the source (§4.F rule 1, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MultipleRootUras { organization_id: String },
    NotAllowedResourceType { resource_type: String },
    OrganizationNoUraNotLinked { id: String },
    OrphanHealthcareService { id: String },
    OrphanLocation { id: String },
    OrphanPractitionerRole { id: String },
    UnownedEndpoint { id: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MultipleRootUras { organization_id } => write!(
                f,
                "organization '{organization_id}' carries more than one URA identifier"
            ),
            ValidationError::NotAllowedResourceType { resource_type } => {
                write!(f, "resource type '{resource_type}' is not allowed for this source")
            }
            ValidationError::OrganizationNoUraNotLinked { id } => write!(
                f,
                "organization '{id}' has no URA and its partOf chain does not reach the authoritative root"
            ),
            ValidationError::OrphanHealthcareService { id } => {
                write!(f, "HealthcareService '{id}' has no valid providedBy reference")
            }
            ValidationError::OrphanLocation { id } => {
                write!(f, "Location '{id}' has no valid managingOrganization reference")
            }
            ValidationError::OrphanPractitionerRole { id } => {
                write!(f, "PractitionerRole '{id}' has no valid organization reference")
            }
            ValidationError::UnownedEndpoint { id } => write!(
                f,
                "Endpoint '{id}' is not referenced by any accepted Organization or HealthcareService"
            ),
        }
    }
}

/// Runs once per sync, before per-resource validation (§4.F).
///
/// Enforces rule 1: a root organization in the tree must carry exactly one
/// URA identifier.
pub fn validate_tree_roots(tree: &OrganizationTree) -> Result<(), ValidationError> {
    for (id, org) in &tree.all {
        if !tree.is_root(id) {
            continue;
        }
        let uras = Resource::ura_identifiers(org);
        if uras.len() > 1 {
            return Err(ValidationError::MultipleRootUras { organization_id: id.clone() });
        }
    }
    Ok(())
}

/// Validate a single resource against the (already URA-filtered) tree and
/// the set of Endpoints known to be owned. `allowed_types` is the source's
/// configured resource-type whitelist (rule 7).
pub fn validate(
    resource: &Value,
    tree: &OrganizationTree,
    allowed_types: &[String],
    accepted_endpoint_owner_ids: &std::collections::HashSet<String>,
) -> Result<(), ValidationError> {
    let resource_type = Resource::resource_type(resource).unwrap_or_default();
    let id = Resource::id_of(resource).unwrap_or_default().to_string();

    if !allowed_types.iter().any(|t| t == resource_type) {
        return Err(ValidationError::NotAllowedResourceType {
            resource_type: resource_type.to_string(),
        });
    }

    match resource_type {
        "Organization" => validate_organization(resource, &id, tree),
        "HealthcareService" => {
            match Resource::reference_field(resource, "providedBy") {
                Some((rt, ref_id)) if rt == "Organization" && tree.all.contains_key(ref_id) => Ok(()),
                _ => Err(ValidationError::OrphanHealthcareService { id }),
            }
        }
        "Location" => match Resource::reference_field(resource, "managingOrganization") {
            Some((rt, ref_id)) if rt == "Organization" && tree.all.contains_key(ref_id) => Ok(()),
            _ => Err(ValidationError::OrphanLocation { id }),
        },
        "PractitionerRole" => match Resource::reference_field(resource, "organization") {
            Some((rt, ref_id)) if rt == "Organization" && tree.all.contains_key(ref_id) => Ok(()),
            _ => Err(ValidationError::OrphanPractitionerRole { id }),
        },
        "Endpoint" => {
            if accepted_endpoint_owner_ids.contains(&id) {
                Ok(())
            } else {
                Err(ValidationError::UnownedEndpoint { id })
            }
        }
        _ => Ok(()),
    }
}

fn validate_organization(
    resource: &Value,
    id: &str,
    tree: &OrganizationTree,
) -> Result<(), ValidationError> {
    let has_ura = !Resource::ura_identifiers(resource).is_empty();
    if has_ura {
        if tree.is_root(id) {
            Ok(())
        } else {
            // Carries a URA but is not the authoritative root of this
            // source: rejected (rule 2 accepts roots only via branch (a)).
            Err(ValidationError::OrganizationNoUraNotLinked { id: id.to_string() })
        }
    } else if tree.members.values().any(|members| members.contains(id)) {
        Ok(())
    } else {
        Err(ValidationError::OrganizationNoUraNotLinked { id: id.to_string() })
    }
}

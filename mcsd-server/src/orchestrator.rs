//! Sync Orchestrator (§4.H): the core per-source update algorithm, plus the
//! whole-run driver that walks the [`crate::registry::DirectoryRegistry`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use mcsd_core::{
    build_entry, deduplicate, validate, validate_tree_roots, OrganizationTree, PulledEntry,
    Resource, SourceDirectory,
};
use mcsd_client::FhirAccess;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::cursor::CursorStore;
use crate::discover;
use crate::registry::DirectoryRegistry;
use crate::report::{RunReport, SourceReport};

/// Everything a sync needs that isn't specific to one source.
pub struct Dependencies {
    pub registry: Arc<DirectoryRegistry>,
    pub cursor: Arc<CursorStore>,
    pub access: Arc<FhirAccess>,
    pub query_directory_base_url: String,
    pub default_resource_types: Vec<String>,
    pub snapshot_mode_support: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Delta,
    Snapshot,
    HistoryNoSince,
}

/// Walk the registry start to end, processing each source independently
/// and sequentially. Entries appended to the registry by discovery during
/// this same pass are visited before the run ends (§5, §9) because we
/// index by position rather than iterating a fixed snapshot.
#[instrument(skip_all)]
pub async fn run_update(deps: &Dependencies, cancel: CancellationToken) -> RunReport {
    let mut report = RunReport::new();
    let mut index = 0;
    loop {
        let Some(source) = deps.registry.get_at(index).await else { break };
        index += 1;

        if cancel.is_cancelled() {
            let mut source_report = SourceReport::default();
            source_report.push_error("run cancelled before this source could be processed");
            report.insert(source.key(), source_report);
            continue;
        }

        let source_report = sync_source(deps, &source, &cancel).await;
        report.insert(source.key(), source_report);
    }
    report
}

/// One source's full sync: pull, dedup, validate, build, submit, advance
/// the cursor. Returns as soon as any step is fatal for this source; prior
/// steps never partially mutate the registry or cursor on a fatal path.
async fn sync_source(
    deps: &Dependencies,
    source: &SourceDirectory,
    cancel: &CancellationToken,
) -> SourceReport {
    let mut report = SourceReport::default();
    let since = deps.cursor.get(&source.key()).await;
    let mut mode = if since.is_some() {
        Mode::Delta
    } else if deps.snapshot_mode_support {
        Mode::Snapshot
    } else {
        Mode::HistoryNoSince
    };

    let query_start_time = Utc::now();
    let mut entries: Vec<PulledEntry> = Vec::new();
    let mut first_bundle_last_updated: Option<String> = None;

    'pull: loop {
        entries.clear();
        first_bundle_last_updated = None;

        for resource_type in &source.resource_types {
            if cancel.is_cancelled() {
                report.push_error("run cancelled mid-pull");
                return report;
            }

            let result = match mode {
                Mode::Snapshot => deps.access.search_current(&source.base_url, resource_type).await,
                Mode::Delta => {
                    deps.access.search_history(&source.base_url, resource_type, since.as_deref()).await
                }
                Mode::HistoryNoSince => {
                    deps.access.search_history(&source.base_url, resource_type, None).await
                }
            };

            match result {
                Ok(mut search_result) => {
                    if first_bundle_last_updated.is_none() {
                        first_bundle_last_updated = search_result.first_page_last_updated.clone();
                    }
                    if mode == Mode::Snapshot {
                        // §4.H step 3: synthesize method=PUT, url={Type}/{id}
                        // so the rest of the pipeline sees a uniform shape.
                        search_result.entries = search_result
                            .entries
                            .into_iter()
                            .map(|e| match e.resource.clone() {
                                Some(resource) => {
                                    mcsd_core::synthetic_put_entry(e.full_url, resource)
                                }
                                None => e,
                            })
                            .collect();
                    }
                    entries.extend(search_result.entries);
                }
                Err(err)
                    if err.is_gone() && deps.snapshot_mode_support && mode != Mode::Snapshot =>
                {
                    // §4.H step 3: a 410 on the history feed abandons whatever
                    // this window has accumulated and restarts as a snapshot.
                    mode = Mode::Snapshot;
                    continue 'pull;
                }
                Err(err) => {
                    report.push_error(format!("failed to query {resource_type}: {err}"));
                    return report;
                }
            }
        }
        break;
    }

    // §4.H step 4: an Endpoint DELETE in a discoverable source's window
    // retires whatever provider directory it originally caused to register.
    if source.discover {
        for full_url in discover::endpoint_deletes(&entries) {
            deps.registry.unregister_by_source_entry_url(&full_url).await;
        }
    }

    let deduped = deduplicate(entries);

    // §4.H step 6: the authoritative tree is always built from a dedicated
    // current-state read of Organization, never from the (possibly
    // partial, possibly historical) window just pulled above.
    let all_organizations = match deps.access.search_current(&source.base_url, "Organization").await {
        Ok(result) => result.entries.into_iter().filter_map(|e| e.resource).collect::<Vec<Value>>(),
        Err(err) => {
            report.push_error(format!("failed to read organizations for tree build: {err}"));
            return report;
        }
    };
    let full_tree = OrganizationTree::build(&all_organizations);
    let tree = full_tree.filter_by_ura(&source.authoritative_ura);
    if let Err(err) = validate_tree_roots(&tree) {
        report.push_error(err.to_string());
        return report;
    }

    let allowed_types = &source.resource_types;
    let (accepted, owner_ids) = validate_entries(&deduped, &tree, allowed_types, &mut report);
    info!(
        source = %source.base_url,
        pulled = deduped.len(),
        accepted = accepted.len(),
        endpoint_owners = owner_ids.len(),
        "validated pulled entries"
    );

    // §4.H step 8 / §4.I: a discoverable source may introduce new provider
    // directories via Organization.endpoint references to directory
    // Endpoints present in this window, regardless of whether that
    // Endpoint itself passed validation.
    if source.discover {
        for discovery in discover::find_new_directories(&tree, &deduped) {
            let candidate =
                discover::discovery_to_source_directory(&discovery, &deps.default_resource_types);
            deps.registry.register(candidate).await;
        }
    }

    let mut bundle_entries = Vec::new();
    for entry in &accepted {
        match build_entry(entry, &source.base_url, source.discover) {
            Ok(Some(built)) => bundle_entries.push(built),
            Ok(None) => {}
            Err(err) => report.push_warning(format!("failed to build transaction entry: {err}")),
        }
    }

    if bundle_entries.is_empty() {
        advance_cursor(deps, source, mode, first_bundle_last_updated.as_deref(), query_start_time).await;
        return report;
    }

    if cancel.is_cancelled() {
        report.push_error("run cancelled before transaction submission");
        return report;
    }

    let bundle = json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "entry": bundle_entries
            .iter()
            .map(|e| {
                let mut value = json!({"request": {"method": e.method, "url": e.url}});
                if let Some(resource) = &e.resource {
                    value["resource"] = resource.clone();
                }
                value
            })
            .collect::<Vec<Value>>(),
    });

    match deps.access.submit_transaction(&deps.query_directory_base_url, bundle).await {
        Ok(response_bundle) => classify_response(&response_bundle, &mut report),
        Err(err) => {
            report.push_error(format!("transaction submission failed: {err}"));
            return report;
        }
    }

    advance_cursor(deps, source, mode, first_bundle_last_updated.as_deref(), query_start_time).await;
    report
}

/// §4.F rule 6 requires a two-pass validation: Endpoint ownership can only
/// be decided after we know which Organizations and HealthcareServices were
/// themselves accepted — only those two resource types count as an owner
/// (rule 6 names them specifically; `Location`/`PractitionerRole`/
/// `Practitioner` also carry an `endpoint[]` element but are not owners).
/// DELETE entries bypass resource-body validation (there is no body) but
/// still respect the resource-type allowlist. Acceptance flags are kept
/// indexed by `deduped` position so the final accepted list preserves
/// dedup order (§4.G) rather than trailing the Endpoint pass at the tail.
fn validate_entries<'a>(
    deduped: &'a [PulledEntry],
    tree: &OrganizationTree,
    allowed_types: &[String],
    report: &mut SourceReport,
) -> (Vec<&'a PulledEntry>, HashSet<String>) {
    let mut accepted_flags: Vec<bool> = vec![false; deduped.len()];
    let mut owner_ids: HashSet<String> = HashSet::new();
    let empty_owners = HashSet::new();

    for (index, entry) in deduped.iter().enumerate() {
        if entry.method.is_delete() {
            match entry.resource_type() {
                Some(rt) if allowed_types.iter().any(|t| t == rt) => accepted_flags[index] = true,
                _ => report.push_warning("delete entry for a disallowed or unrecognized resource type, skipped"),
            }
            continue;
        }
        let Some(resource) = &entry.resource else { continue };
        let resource_type = Resource::resource_type(resource);
        if resource_type == Some("Endpoint") {
            continue; // second pass, below
        }
        match validate(resource, tree, allowed_types, &empty_owners) {
            Ok(()) => {
                if matches!(resource_type, Some("Organization") | Some("HealthcareService")) {
                    for (ref_type, id) in Resource::endpoint_references(resource) {
                        if ref_type == "Endpoint" {
                            owner_ids.insert(id.to_string());
                        }
                    }
                }
                accepted_flags[index] = true;
            }
            Err(err) => report.push_warning(err.to_string()),
        }
    }

    for (index, entry) in deduped.iter().enumerate() {
        if entry.method.is_delete() {
            continue;
        }
        let Some(resource) = &entry.resource else { continue };
        if Resource::resource_type(resource) != Some("Endpoint") {
            continue;
        }
        match validate(resource, tree, allowed_types, &owner_ids) {
            Ok(()) => accepted_flags[index] = true,
            Err(err) => report.push_warning(err.to_string()),
        }
    }

    let accepted: Vec<&PulledEntry> = deduped
        .iter()
        .zip(accepted_flags)
        .filter_map(|(entry, accepted)| accepted.then_some(entry))
        .collect();

    (accepted, owner_ids)
}

fn classify_response(response_bundle: &Value, report: &mut SourceReport) {
    let Some(entries) = response_bundle.get("entry").and_then(|e| e.as_array()) else { return };
    for (i, response_entry) in entries.iter().enumerate() {
        let status = response_entry
            .get("response")
            .and_then(|r| r.get("status"))
            .and_then(|s| s.as_str())
            .and_then(|s| s.split_whitespace().next())
            .and_then(|s| s.parse::<u16>().ok());
        match status {
            Some(code) => report.record_status(code),
            None => report.push_warning(format!("transaction response entry {i} carried no parseable status")),
        }
    }
}

/// §4.H step 11: advance the cursor to `firstBundle.meta.lastUpdated`, or
/// `queryStartTime - 2s` when the window's first page carried no
/// timestamp. Forced-snapshot mode deletes the old cursor (there should
/// not have been one) before writing the fresh value, so a stale entry
/// from a prior bug can never survive a clean snapshot run.
async fn advance_cursor(
    deps: &Dependencies,
    source: &SourceDirectory,
    mode: Mode,
    first_bundle_last_updated: Option<&str>,
    query_start_time: DateTime<Utc>,
) {
    let next_cursor = match first_bundle_last_updated {
        Some(ts) => ts.to_string(),
        None => (query_start_time - Duration::seconds(2)).to_rfc3339_opts(SecondsFormat::Nanos, true),
    };
    let key = source.key();
    if mode == Mode::Snapshot {
        deps.cursor.delete(&key).await;
    }
    deps.cursor.set(key, next_cursor).await;
    deps.cursor.save().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcsd_core::constants::URA_NAMING_SYSTEM;
    use serde_json::json;

    fn put(resource: Value) -> PulledEntry {
        let rt = Resource::resource_type(&resource).unwrap().to_string();
        let id = Resource::id_of(&resource).unwrap().to_string();
        PulledEntry {
            full_url: format!("https://src/{rt}/{id}"),
            resource: Some(resource),
            method: mcsd_core::Method::Put,
            request_url: format!("{rt}/{id}"),
        }
    }

    fn tree_with_root(root_id: &str, ura: &str) -> OrganizationTree {
        OrganizationTree::build(&[json!({
            "resourceType": "Organization",
            "id": root_id,
            "identifier": [{"system": URA_NAMING_SYSTEM, "value": ura}]
        })])
    }

    #[test]
    fn endpoint_owned_only_by_location_or_practitioner_role_is_rejected() {
        let tree = tree_with_root("root", "100");
        let allowed = vec![
            "Organization".to_string(),
            "Location".to_string(),
            "PractitionerRole".to_string(),
            "Endpoint".to_string(),
        ];
        let mut report = SourceReport::default();

        let deduped = vec![
            put(json!({
                "resourceType": "Location",
                "id": "loc1",
                "managingOrganization": {"reference": "Organization/root"},
                "endpoint": [{"reference": "Endpoint/ep1"}]
            })),
            put(json!({
                "resourceType": "PractitionerRole",
                "id": "pr1",
                "organization": {"reference": "Organization/root"},
                "endpoint": [{"reference": "Endpoint/ep1"}]
            })),
            put(json!({"resourceType": "Endpoint", "id": "ep1"})),
        ];

        let (accepted, owner_ids) = validate_entries(&deduped, &tree, &allowed, &mut report);
        assert!(owner_ids.is_empty(), "Location/PractitionerRole must not count as Endpoint owners");
        assert!(
            !accepted.iter().any(|e| e.resource_type() == Some("Endpoint")),
            "Endpoint owned only by Location/PractitionerRole must be rejected"
        );
        assert_eq!(accepted.len(), 2, "the Location and PractitionerRole entries still pass on their own");
    }

    #[test]
    fn endpoint_owned_by_healthcare_service_is_accepted() {
        let tree = tree_with_root("root", "100");
        let allowed = vec!["HealthcareService".to_string(), "Endpoint".to_string()];
        let mut report = SourceReport::default();

        let deduped = vec![
            put(json!({
                "resourceType": "HealthcareService",
                "id": "hs1",
                "providedBy": {"reference": "Organization/root"},
                "endpoint": [{"reference": "Endpoint/ep1"}]
            })),
            put(json!({"resourceType": "Endpoint", "id": "ep1"})),
        ];

        let (accepted, owner_ids) = validate_entries(&deduped, &tree, &allowed, &mut report);
        assert!(owner_ids.contains("ep1"));
        assert_eq!(accepted.len(), 2);
    }

    #[test]
    fn accepted_entries_preserve_dedup_order_across_the_endpoint_pass() {
        let tree = tree_with_root("root", "100");
        let allowed = vec!["Organization".to_string(), "HealthcareService".to_string(), "Endpoint".to_string()];
        let mut report = SourceReport::default();

        // Endpoint listed first in dedup order, owner listed second: the
        // two-pass ownership decision must not move the endpoint to the
        // tail of the accepted list (§4.G: "the order the validated entries
        // arrive after deduplication").
        let deduped = vec![
            put(json!({"resourceType": "Endpoint", "id": "ep1"})),
            put(json!({
                "resourceType": "HealthcareService",
                "id": "hs1",
                "providedBy": {"reference": "Organization/root"},
                "endpoint": [{"reference": "Endpoint/ep1"}]
            })),
        ];

        let (accepted, _) = validate_entries(&deduped, &tree, &allowed, &mut report);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].resource_type(), Some("Endpoint"));
        assert_eq!(accepted[1].resource_type(), Some("HealthcareService"));
    }
}

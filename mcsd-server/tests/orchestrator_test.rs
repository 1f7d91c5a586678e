//! End-to-end coverage of the Sync Orchestrator (§4.H, §8 scenarios) against
//! fake source and query directories built with `wiremock`.

use std::sync::Arc;

use mcsd_core::constants::{MCSD_DIRECTORY_PAYLOAD_CODE, MCSD_PAYLOAD_TYPE_SYSTEM, URA_NAMING_SYSTEM};
use mcsd_server::{
    orchestrator::{self, Dependencies},
    CursorStore, DirectoryRegistry,
};
use mcsd_client::FhirAccess;
use mcsd_core::SourceDirectory;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn bundle(entries: Vec<Value>) -> Value {
    json!({"resourceType": "Bundle", "type": "searchset", "entry": entries})
}

fn empty_bundle() -> Value {
    bundle(vec![])
}

async fn mount_current(server: &MockServer, resource_type: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/{resource_type}")))
        .and(query_param("_count", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_empty_default_set(server: &MockServer, except: &[&str]) {
    for rt in ["Organization", "Endpoint", "Location", "HealthcareService", "PractitionerRole", "Practitioner"] {
        if except.contains(&rt) {
            continue;
        }
        mount_current(server, rt, empty_bundle()).await;
    }
}

/// Echoes back one "201 Created" response entry per request entry, so a
/// single mounted mock can correctly answer transactions of differing
/// sizes coming from different sources in the same run.
struct TransactionEchoResponder;

impl Respond for TransactionEchoResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(json!({}));
        let count = body.get("entry").and_then(|e| e.as_array()).map(|a| a.len()).unwrap_or(0);
        let entries: Vec<Value> =
            (0..count).map(|_| json!({"response": {"status": "201 Created"}})).collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "transaction-response",
            "entry": entries
        }))
    }
}

async fn mount_transaction_echo(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(TransactionEchoResponder)
        .mount(server)
        .await;
}

#[tokio::test]
async fn initial_snapshot_discovers_and_syncs_provider_directories() {
    let root = MockServer::start().await;
    let provider1 = MockServer::start().await;
    let provider2 = MockServer::start().await;
    let query_directory = MockServer::start().await;

    let root_organizations = bundle(vec![
        json!({
            "fullUrl": format!("{}/Organization/org-a", root.uri()),
            "resource": {
                "resourceType": "Organization",
                "id": "org-a",
                "identifier": [{"system": URA_NAMING_SYSTEM, "value": "100"}],
                "endpoint": [{"reference": "Endpoint/ep-a"}]
            }
        }),
        json!({
            "fullUrl": format!("{}/Organization/org-b", root.uri()),
            "resource": {
                "resourceType": "Organization",
                "id": "org-b",
                "identifier": [{"system": URA_NAMING_SYSTEM, "value": "200"}],
                "endpoint": [{"reference": "Endpoint/ep-b"}]
            }
        }),
    ]);
    let root_endpoints = bundle(vec![
        json!({
            "fullUrl": format!("{}/Endpoint/ep-a", root.uri()),
            "resource": {
                "resourceType": "Endpoint",
                "id": "ep-a",
                "address": provider1.uri(),
                "payloadType": [{"coding": [{"system": MCSD_PAYLOAD_TYPE_SYSTEM, "code": MCSD_DIRECTORY_PAYLOAD_CODE}]}]
            }
        }),
        json!({
            "fullUrl": format!("{}/Endpoint/ep-b", root.uri()),
            "resource": {
                "resourceType": "Endpoint",
                "id": "ep-b",
                "address": provider2.uri(),
                "payloadType": [{"coding": [{"system": MCSD_PAYLOAD_TYPE_SYSTEM, "code": MCSD_DIRECTORY_PAYLOAD_CODE}]}]
            }
        }),
    ]);
    mount_current(&root, "Organization", root_organizations).await;
    mount_current(&root, "Endpoint", root_endpoints).await;

    for (provider, org_id, ura) in [(&provider1, "self-a", "100"), (&provider2, "self-b", "200")] {
        let orgs = bundle(vec![json!({
            "fullUrl": format!("{}/Organization/{org_id}", provider.uri()),
            "resource": {
                "resourceType": "Organization",
                "id": org_id,
                "identifier": [{"system": URA_NAMING_SYSTEM, "value": ura}]
            }
        })]);
        mount_current(provider, "Organization", orgs).await;
        mount_empty_default_set(provider, &["Organization"]).await;
    }

    mount_transaction_echo(&query_directory).await;

    let registry = Arc::new(DirectoryRegistry::new(vec![SourceDirectory::root(root.uri())], vec![]));
    let cursor = Arc::new(CursorStore::new(None));
    let access = Arc::new(FhirAccess::with_no_auth(reqwest::Client::new()));

    let deps = Dependencies {
        registry: registry.clone(),
        cursor: cursor.clone(),
        access,
        query_directory_base_url: query_directory.uri(),
        default_resource_types: vec![
            "Organization".to_string(),
            "Endpoint".to_string(),
            "Location".to_string(),
            "HealthcareService".to_string(),
            "PractitionerRole".to_string(),
            "Practitioner".to_string(),
        ],
        snapshot_mode_support: true,
    };

    let report = orchestrator::run_update(&deps, CancellationToken::new()).await;

    assert_eq!(registry.len().await, 3, "root plus two discovered providers");
    assert_eq!(report.len(), 3);

    let root_report = report.get(&root.uri()).unwrap();
    assert!(root_report.errors.is_empty(), "root errors: {:?}", root_report.errors);
    assert_eq!(root_report.created, 2, "only the two directory endpoints are forwarded from a root");

    assert!(cursor.get(&root.uri()).await.is_some());
}

#[tokio::test]
async fn gone_without_snapshot_support_is_a_fatal_source_error() {
    let source = MockServer::start().await;
    let query_directory = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Organization/_history"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&source)
        .await;

    let registry = Arc::new(DirectoryRegistry::new(
        vec![SourceDirectory {
            base_url: source.uri(),
            authoritative_ura: "100".to_string(),
            resource_types: vec!["Organization".to_string()],
            discover: false,
            source_entry_url: String::new(),
        }],
        vec![],
    ));
    let cursor = Arc::new(CursorStore::new(None));
    let access = Arc::new(FhirAccess::with_no_auth(reqwest::Client::new()));

    let deps = Dependencies {
        registry: registry.clone(),
        cursor: cursor.clone(),
        access,
        query_directory_base_url: query_directory.uri(),
        default_resource_types: vec!["Organization".to_string()],
        snapshot_mode_support: false,
    };

    let report = orchestrator::run_update(&deps, CancellationToken::new()).await;
    let key = format!("{}|100", source.uri());
    let source_report = report.get(&key).unwrap();
    assert!(source_report.is_fatal());
    assert!(cursor.get(&key).await.is_none(), "cursor must not advance on a fatal source error");
}

#[tokio::test]
async fn empty_window_still_advances_cursor_without_submitting() {
    let source = MockServer::start().await;
    let query_directory = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Organization"))
        .and(query_param("_count", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_bundle()))
        .mount(&source)
        .await;

    // No transaction mock mounted: a submission here would fail the test.
    let registry = Arc::new(DirectoryRegistry::new(
        vec![SourceDirectory {
            base_url: source.uri(),
            authoritative_ura: "100".to_string(),
            resource_types: vec!["Organization".to_string()],
            discover: false,
            source_entry_url: String::new(),
        }],
        vec![],
    ));
    let cursor = Arc::new(CursorStore::new(None));
    let access = Arc::new(FhirAccess::with_no_auth(reqwest::Client::new()));

    let deps = Dependencies {
        registry: registry.clone(),
        cursor: cursor.clone(),
        access,
        query_directory_base_url: query_directory.uri(),
        default_resource_types: vec!["Organization".to_string()],
        snapshot_mode_support: true,
    };

    let report = orchestrator::run_update(&deps, CancellationToken::new()).await;
    let key = format!("{}|100", source.uri());
    let source_report = report.get(&key).unwrap();
    assert!(!source_report.is_fatal());
    assert_eq!(source_report.created + source_report.updated + source_report.deleted, 0);
    assert!(cursor.get(&key).await.is_some());
}

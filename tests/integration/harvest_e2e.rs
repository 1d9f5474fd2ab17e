//! Full harvesting sessions against the scripted client.

use serde_json::json;

use mock_harvest::config::Config;
use mock_harvest::endpoint::{Operation, OperationDescriptor};
use mock_harvest::Error;

use crate::fixtures::{shipped_catalog, FakeApiClient, Harness};

const EXPECTED_FIXTURES: [&str; 21] = [
    "GET-token.json",
    "GET-user.json",
    "POST-users.json",
    "POST-subcompanies.json",
    "POST-documents.json",
    "GET-documents.json",
    "GET-status.json",
    "GET-root.json",
    "GET-company.json",
    "GET-subcompanies.json",
    "POST-company-update.json",
    "GET-users.json",
    "GET-document_types.json",
    "GET-providers.json",
    "GET-subcompanies-id.json",
    "GET-documents-id.json",
    "GET-documents-identifier-identifier.json",
    "GET-users-id.json",
    "GET-documents-id-similar.json",
    "GET-documents-id-related.json",
    "GET-documents-id-raw.json",
];

fn expected_fixtures() -> Vec<String> {
    let mut names: Vec<String> = EXPECTED_FIXTURES.iter().map(|n| n.to_string()).collect();
    names.sort();
    names
}

/// Test: Complete session
/// Given a cooperative API
/// When a session runs
/// Then every non-empty response is recorded and everything created is deleted
#[tokio::test]
async fn test_session_records_every_endpoint() {
    let harness = Harness::new(FakeApiClient::new());

    let summary = harness.session.run().await.unwrap();

    assert_eq!(harness.fixture_files(), expected_fixtures());
    assert_eq!(summary.fixtures.len(), 21);
    // Twenty graph operations; the token is fetched before the graph runs.
    assert_eq!(summary.operations_completed, 20);
    assert_eq!(summary.cleaned.len(), 3);

    // Switched to the token after authenticating.
    assert_eq!(harness.client.token().as_deref(), Some("t0k3n"));
    assert_eq!(harness.client.calls()[0].operation, Operation::GetToken);
}

/// Test: Fake content wiring
/// Given five users to create
/// When the session seeds the account
/// Then each user gets its own e-mail and the first one administers the subcompany
#[tokio::test]
async fn test_seeding_wires_identifiers() {
    let harness = Harness::new(FakeApiClient::new());
    harness.session.run().await.unwrap();

    let users = harness.client.calls_to("postUsers");
    assert_eq!(users.len(), 5);
    let mut emails: Vec<String> = users
        .iter()
        .map(|call| call.args[0]["email"].as_str().unwrap().to_string())
        .collect();
    emails.sort();
    emails.dedup();
    assert_eq!(emails.len(), 5);
    assert!(emails.iter().all(|e| e.ends_with("@norris.com")));

    let chuck = harness.read_fixture("POST-users.json");
    let subcompany = harness.client.calls_to("postSubcompanies");
    assert_eq!(subcompany.len(), 1);
    assert_eq!(subcompany[0].args[0]["user"], chuck["id"]);
    assert_eq!(subcompany[0].args[0]["name"], json!("the_chuck_company"));

    assert_eq!(harness.client.calls_to("getSubcompaniesById")[0].args, vec![json!("sub-1")]);
    assert_eq!(harness.client.calls_to("getDocumentsById")[0].args, vec![json!("doc-1")]);
    assert_eq!(harness.client.calls_to("getUsersById")[0].args, vec![json!("me")]);
    for sub in ["getSimilar", "getRelated", "getRaw"] {
        let calls = harness.client.calls_to(&format!("getDocumentsById.{}", sub));
        assert_eq!(calls.len(), 1, "{} should be called once", sub);
        assert_eq!(calls[0].args, vec![json!("doc-1")]);
    }
}

/// Test: Cleanup targets
/// Given a successful session
/// When cleanup runs
/// Then the subcompany, the document and the four extra users are deleted once
#[tokio::test]
async fn test_cleanup_deletes_created_resources_once() {
    let harness = Harness::new(FakeApiClient::new());
    harness.session.run().await.unwrap();

    let subcompany = harness.client.calls_to("deleteSubcompanyById");
    assert_eq!(subcompany.len(), 1);
    assert_eq!(subcompany[0].args, vec![json!("sub-1"), json!({})]);

    let document = harness.client.calls_to("deleteDocumentsByIdentifier");
    assert_eq!(document.len(), 1);
    assert_eq!(
        document[0].args,
        vec![json!(Config::default().fake.document_identifier().unwrap())]
    );

    let chuck = harness.read_fixture("POST-users.json");
    let deleted: Vec<_> = harness
        .client
        .calls_to("deleteUserById")
        .into_iter()
        .map(|call| call.args[0].clone())
        .collect();
    assert_eq!(deleted.len(), 4);
    assert!(!deleted.contains(&chuck["id"]));

    // Deletions answer 204 and are never recorded.
    assert!(!harness.fixture_files().iter().any(|f| f.starts_with("DELETE-")));
}

/// Test: Stable fixture names
/// Given a mocks directory filled by a first run
/// When a second run writes into it
/// Then the set of files is unchanged
#[tokio::test]
async fn test_second_run_overwrites_same_files() {
    let first = Harness::new(FakeApiClient::new());
    first.session.run().await.unwrap();
    let names = first.fixture_files();

    let Harness { temp_dir, .. } = first;
    let second = Harness::in_dir(
        temp_dir,
        FakeApiClient::new().respond("getStatus", json!({ "status": "changed" })),
        shipped_catalog(),
        Config::default(),
    );
    second.session.run().await.unwrap();

    assert_eq!(second.fixture_files(), names);
    assert_eq!(second.read_fixture("GET-status.json"), json!({ "status": "changed" }));
}

/// Test: Failure isolation
/// Given postDocuments fails
/// When the session runs
/// Then its error surfaces, nothing waiting on it is called and cleanup still runs
#[tokio::test]
async fn test_failed_seed_surfaces_and_cleanup_runs() {
    let harness = Harness::new(FakeApiClient::new().fail("postDocuments", 500));

    let err = harness.session.run().await.unwrap_err();

    match err {
        Error::RemoteCall { operation, status, .. } => {
            assert_eq!(operation, "postDocuments");
            assert_eq!(status, Some(500));
        }
        other => panic!("unexpected error: {}", other),
    }
    for blocked in ["getDocuments", "getStatus", "getDocumentsById", "getDocumentsById.getRaw"] {
        assert_eq!(harness.client.count(blocked), 0, "{} must not be called", blocked);
    }
    assert!(!harness.fixture_files().contains(&"POST-documents.json".to_string()));

    assert_eq!(harness.client.count("deleteDocumentsByIdentifier"), 1);
    assert!(harness.client.count("deleteSubcompanyById") <= 1);
}

/// Test: Cleanup failure alone
/// Given every graph task succeeds but a user deletion fails
/// When the session runs
/// Then the cleanup error is surfaced and the fixtures are still written
#[tokio::test]
async fn test_cleanup_failure_surfaces_when_run_succeeded() {
    let harness = Harness::new(FakeApiClient::new().fail("deleteUserById", 404));

    let err = harness.session.run().await.unwrap_err();

    match err {
        Error::Cleanup(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].action, "deleteUsers");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(harness.fixture_files(), expected_fixtures());
    assert_eq!(harness.client.count("deleteUserById"), 4);
    assert_eq!(harness.client.count("deleteDocumentsByIdentifier"), 1);
}

/// Test: Main error precedence
/// Given a read endpoint and a cleanup action both fail
/// When the session runs
/// Then the read endpoint's error is the one surfaced
#[tokio::test]
async fn test_main_error_wins_over_cleanup_error() {
    let harness = Harness::new(
        FakeApiClient::new()
            .fail("getStatus", 503)
            .fail("deleteDocumentsByIdentifier", 500),
    );

    let err = harness.session.run().await.unwrap_err();

    assert!(matches!(err, Error::RemoteCall { ref operation, .. } if operation == "getStatus"));
    assert_eq!(harness.client.count("deleteDocumentsByIdentifier"), 1);
}

/// Test: Missing admin user
/// Given no user is created
/// When the subcompany task runs
/// Then it fails with a missing value and no subcompany deletion is attempted
#[tokio::test]
async fn test_no_users_means_no_subcompany() {
    let config = Config {
        user_count: 0,
        ..Config::default()
    };
    let harness = Harness::with(FakeApiClient::new(), shipped_catalog(), config);

    let err = harness.session.run().await.unwrap_err();

    assert!(matches!(err, Error::MissingValue { ref task, .. } if task == "postSubcompanies"));
    assert_eq!(harness.client.count("postSubcompanies"), 0);
    assert_eq!(harness.client.count("deleteSubcompanyById"), 0);
    assert_eq!(harness.client.count("deleteUserById"), 0);
}

/// Test: Unknown sub-operation
/// Given a catalog whose getDocumentsById has no sub-operations
/// When the session starts
/// Then it fails before any remote call or directory creation
#[tokio::test]
async fn test_unknown_operation_detected_before_any_call() {
    let mut catalog = shipped_catalog();
    catalog.insert(
        Operation::GetDocumentsById,
        OperationDescriptor::new("GET", "/documents/{id}", 200),
    );
    let harness = Harness::with(FakeApiClient::new(), catalog, Config::default());

    let err = harness.session.run().await.unwrap_err();

    assert!(matches!(
        err,
        Error::UnknownOperation(ref name) if name.starts_with("getDocumentsById.")
    ));
    assert!(harness.client.calls().is_empty());
    assert!(!harness.mocks_dir().exists());
}

/// Test: Capability missing from the client
#[tokio::test]
async fn test_unsupported_operation_detected_before_any_call() {
    let harness = Harness::new(FakeApiClient::new().without("getProviders"));

    let err = harness.session.run().await.unwrap_err();

    assert!(matches!(err, Error::UnknownOperation(ref name) if name == "getProviders"));
    assert!(harness.client.calls().is_empty());
}

/// Test: Authentication failure
/// Given the token endpoint rejects the credentials
/// When the session runs
/// Then nothing else is called
#[tokio::test]
async fn test_failed_authentication_stops_the_session() {
    let harness = Harness::new(FakeApiClient::new().fail("getToken", 401));

    let err = harness.session.run().await.unwrap_err();

    assert_eq!(err.remote_status(), Some(401));
    assert_eq!(harness.client.calls().len(), 1);
    assert!(harness.client.token().is_none());
}

/// Test: Offline validation
#[test]
fn test_validate_builds_the_full_graph() {
    let harness = Harness::new(FakeApiClient::new());

    let graph = harness.session.validate().unwrap();

    assert_eq!(graph.task_count(), 21);
    assert_eq!(
        graph.dependencies_of("seeded"),
        vec!["getUser", "postDocuments", "postSubcompanies"]
    );
    assert_eq!(graph.dependencies_of("getRaw"), vec!["getDocumentsById", "postDocuments"]);
    assert_eq!(graph.dependencies_of("getUsersById"), vec!["getUser", "seeded"]);
    assert!(harness.client.calls().is_empty());
}

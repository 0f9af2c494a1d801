//! Tests for StructureService against files in temporary directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use guardian_tree::application::services::{AddRequest, StructureOp, StructureService};
use guardian_tree::application::ApplicationError;
use guardian_tree::config::Settings;
use guardian_tree::domain::{ProviderKind, TreeError};
use guardian_tree::infrastructure::di::ServiceContainer;
use guardian_tree::infrastructure::traits::RealFileSystem;
use guardian_tree::util::testing;

fn service(provider: ProviderKind) -> StructureService {
    testing::init_test_setup();
    let settings = Settings {
        provider,
        ..Settings::default()
    };
    StructureService::new(Arc::new(RealFileSystem), Arc::new(settings))
}

fn write_structure(dir: &TempDir, doc: &Value) -> PathBuf {
    let path = dir.path().join("structure.json");
    fs::write(&path, serde_json::to_string(doc).unwrap()).unwrap();
    path
}

fn read_structure(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn generic_doc() -> Value {
    json!([
        {"id": "A", "type": "container", "info": {}, "children": [{"id": "A1", "type": "leaf"}]},
        {"id": "B", "type": "container", "info": {}, "children": []}
    ])
}

// ============================================================
// apply() tests
// ============================================================

#[test]
fn given_structure_file_when_moving_down_then_file_is_rewritten() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &generic_doc());

    // Act
    let outcome = service(ProviderKind::Generic)
        .apply(&path, "A", StructureOp::MoveDown, false)
        .unwrap();

    // Assert
    assert!(outcome.changed);
    let written = read_structure(&path);
    assert_eq!(written[0]["id"], json!("B"));
    assert_eq!(written[1]["id"], json!("A"));
    assert_eq!(written[1]["children"][0]["id"], json!("A1"));
}

#[test]
fn given_dry_run_when_making_child_then_file_is_unchanged_and_result_is_returned() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &generic_doc());
    let before = fs::read_to_string(&path).unwrap();

    // Act
    let outcome = service(ProviderKind::Generic)
        .apply(&path, "B", StructureOp::MakeChild, true)
        .unwrap();

    // Assert
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    let result: Value = serde_json::from_str(&outcome.document).unwrap();
    assert_eq!(result.as_array().unwrap().len(), 1);
    assert_eq!(result[0]["children"][0]["id"], json!("B"));
}

#[test]
fn given_report_fields_when_moving_unrelated_node_then_fields_are_kept() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let vulnerability = json!({
        "id": "v1", "type": "vulnerability", "title": "SQLi",
        "severity": "critical", "hasEvidence": true
    });
    let path = write_structure(
        &temp,
        &json!([
            {"id": "S", "type": "reportSection", "info": {"title": "Findings"}, "children": [vulnerability]},
            {"id": "T", "type": "reportSection", "info": {}, "children": []}
        ]),
    );

    // Act
    let outcome = service(ProviderKind::Report)
        .apply(&path, "T", StructureOp::MoveUp, false)
        .unwrap();

    // Assert
    assert!(outcome.changed);
    let written = read_structure(&path);
    assert_eq!(written[0]["id"], json!("T"));
    assert_eq!(written[1]["children"][0], vulnerability);
    assert_eq!(written[1]["info"], json!({"title": "Findings"}));
}

#[test]
fn given_unknown_id_when_deleting_then_fails_with_unknown_id() {
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &generic_doc());

    let err = service(ProviderKind::Generic)
        .apply(&path, "nope", StructureOp::Delete, false)
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Tree(TreeError::UnknownId(ref id)) if id == "nope"));
}

#[test]
fn given_refused_mutation_when_applying_then_file_is_untouched() {
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &generic_doc());
    let before = fs::read_to_string(&path).unwrap();

    let err = service(ProviderKind::Generic)
        .apply(&path, "A1", StructureOp::MakeParent, false)
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Tree(TreeError::InvalidOperation { .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn given_missing_file_when_loading_then_fails_with_path_context() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.json");

    let err = service(ProviderKind::Generic).load(&path).err().unwrap();

    match err {
        ApplicationError::OperationFailed { context, .. } => {
            assert!(context.contains("absent.json"), "{context}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn given_invalid_json_when_loading_then_fails_as_structure_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, "[{").unwrap();

    let err = service(ProviderKind::Generic).load(&path).err().unwrap();

    assert!(matches!(err, ApplicationError::Tree(TreeError::Json(_))));
}

// ============================================================
// add() tests
// ============================================================

#[test]
fn given_parent_when_adding_procedure_then_appended_to_its_leaves() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = write_structure(
        &temp,
        &json!([{"id": "pb", "type": "playbook", "info": {}, "children": [
            {"id": "p0", "type": "procedure"}
        ]}]),
    );
    let request = AddRequest {
        node_type: "procedure".into(),
        parent: Some("pb".into()),
        name: Some("Session handling".into()),
        id: Some("p1".into()),
    };

    // Act
    let outcome = service(ProviderKind::Report)
        .add(&path, &request, false)
        .unwrap();

    // Assert
    assert_eq!(outcome.id, "p1");
    let written = read_structure(&path);
    assert_eq!(
        written[0]["children"],
        json!([
            {"id": "p0", "type": "procedure"},
            {"id": "p1", "type": "procedure", "title": "Session handling"}
        ])
    );
}

#[test]
fn given_name_when_adding_leaf_then_name_survives_reload() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &generic_doc());
    let request = AddRequest {
        node_type: "leaf".into(),
        parent: Some("A".into()),
        name: Some("Login check".into()),
        id: Some("n1".into()),
    };
    let service = service(ProviderKind::Generic);

    // Act
    service.add(&path, &request, false).unwrap();

    // Assert
    assert_eq!(
        read_structure(&path)[0]["children"][1],
        json!({"id": "n1", "type": "leaf", "title": "Login check"})
    );
    let model = service.load(&path).unwrap();
    let n1 = model.lookup("n1").unwrap();
    assert_eq!(model.node(n1).unwrap().name, "Login check");
}

#[test]
fn given_no_parent_when_adding_container_then_appended_as_last_root_with_uuid() {
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &generic_doc());
    let request = AddRequest {
        node_type: "container".into(),
        name: Some("Scope".into()),
        ..AddRequest::default()
    };

    let outcome = service(ProviderKind::Generic)
        .add(&path, &request, false)
        .unwrap();

    assert!(uuid::Uuid::parse_str(&outcome.id).is_ok());
    let written = read_structure(&path);
    assert_eq!(written[2]["id"], json!(outcome.id));
    assert_eq!(written[2]["info"], json!({"title": "Scope"}));
}

#[test]
fn given_existing_id_when_adding_then_fails_with_duplicate() {
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &generic_doc());
    let request = AddRequest {
        node_type: "leaf".into(),
        parent: Some("A".into()),
        id: Some("A1".into()),
        ..AddRequest::default()
    };

    let err = service(ProviderKind::Generic)
        .add(&path, &request, false)
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Tree(TreeError::DuplicateId(_))));
}

#[test]
fn given_leaf_parent_when_adding_then_fails() {
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &generic_doc());
    let request = AddRequest {
        node_type: "leaf".into(),
        parent: Some("A1".into()),
        ..AddRequest::default()
    };

    let err = service(ProviderKind::Generic)
        .add(&path, &request, false)
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Tree(TreeError::InvalidOperation { .. })
    ));
}

// ============================================================
// ServiceContainer wiring
// ============================================================

#[test]
fn given_container_when_loading_then_uses_configured_provider() {
    let temp = TempDir::new().unwrap();
    let path = write_structure(&temp, &json!([{"id": "x", "type": "leaf"}]));
    let container = ServiceContainer::new(Settings {
        provider: ProviderKind::Report,
        ..Settings::default()
    });

    let err = container.structure_service().load(&path).err().unwrap();

    assert!(matches!(
        err,
        ApplicationError::Tree(TreeError::UnknownType { provider: "report", .. })
    ));
}

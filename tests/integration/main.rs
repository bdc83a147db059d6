//! Integration tests for Skyplan
//!
//! These tests drive the CLI binary and the server state against a real
//! storage directory.

use serde_json::{json, Value};
use skyplan_core::{DesignEngine, NodeData, NodeKind, StorageConfig, SCHEMA_VERSION};
use skyplan_server::{ServerConfig, SkyplanServer};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn skyplan(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skyplan"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to execute skyplan")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn node(id: &str, kind: &str, parent: Option<&str>) -> Value {
    let mut node = json!({
        "id": id,
        "type": kind,
        "position": { "x": 0.0, "y": 0.0 },
        "data": { "serviceId": format!("svc-{}", id), "serviceName": id },
    });
    if let Some(parent) = parent {
        node["parentId"] = json!(parent);
        node["extent"] = json!("parent");
    }
    node
}

fn write_design(dir: &Path, version: u32) -> std::path::PathBuf {
    let design = json!({
        "nodes": [
            node("A", "service", Some("B")),
            node("B", "service", Some("A")),
            node("V", "vpc-environment", None),
            node("S", "public-subnet", Some("V")),
            node("F", "service", Some("S")),
        ],
        "edges": [
            { "id": "e1", "source": "F", "target": "A", "type": "smoothstep" },
            { "id": "e2", "source": "F", "target": "ghost" },
        ],
        "designName": "Imported",
        "designId": "d-9",
        "languagePreference": "pulumi",
        "schemaVersion": version,
    });
    let path = dir.join("design.json");
    std::fs::write(&path, serde_json::to_string_pretty(&design).unwrap()).unwrap();
    path
}

#[test]
fn test_cli_version() {
    let temp_dir = TempDir::new().unwrap();
    let output = skyplan(temp_dir.path(), &["version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Skyplan v"));
}

#[test]
fn test_import_repairs_and_persists() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_design(temp_dir.path(), SCHEMA_VERSION);

    let report = stdout_json(&skyplan(temp_dir.path(), &["import", file.to_str().unwrap()]));
    assert_eq!(report["detachedParents"].as_array().unwrap().len(), 1);
    assert_eq!(report["detachedParents"][0]["node"], "A");
    assert_eq!(report["droppedEdges"][0]["reason"], "dangling-endpoint");
    assert!(temp_dir.path().join(".skyplan/design.json").exists());

    let outline = stdout_json(&skyplan(temp_dir.path(), &["hierarchy"]));
    assert_eq!(outline.as_array().unwrap().len(), 1);
    assert_eq!(outline[0]["vpc"]["id"], "V");
    assert_eq!(outline[0]["publicSubnets"][0]["subnet"]["id"], "S");
    assert_eq!(outline[0]["publicSubnets"][0]["services"][0]["id"], "F");
    assert_eq!(outline[0]["privateSubnets"], json!([]));

    // What import wrote back needs no further repair.
    let report = stdout_json(&skyplan(temp_dir.path(), &["repair", "--dry-run"]));
    assert_eq!(report["detachedParents"], json!([]));
    assert_eq!(report["droppedNodes"], json!([]));
    assert_eq!(report["normalizedEdges"], 0);
}

#[test]
fn test_export_writes_current_schema() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_design(temp_dir.path(), SCHEMA_VERSION);
    assert!(skyplan(temp_dir.path(), &["import", file.to_str().unwrap()]).status.success());

    let exported = temp_dir.path().join("out.json");
    assert!(skyplan(temp_dir.path(), &["export", exported.to_str().unwrap()]).status.success());

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&exported).unwrap()).unwrap();
    assert_eq!(json["schemaVersion"], SCHEMA_VERSION);
    assert_eq!(json["designName"], "Imported");
    assert_eq!(json["designId"], "d-9");
    assert_eq!(json["languagePreference"], "pulumi");
    assert_eq!(json["nodes"].as_array().unwrap().len(), 5);
    let edges = json["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 1);
    assert!(edges.iter().all(|e| e["type"] == "deletable"));
}

#[test]
fn test_import_rejects_old_schema() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_design(temp_dir.path(), SCHEMA_VERSION - 1);
    let output = skyplan(temp_dir.path(), &["import", file.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(!temp_dir.path().join(".skyplan/design.json").exists());
}

#[test]
fn test_clear_then_show_empty() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_design(temp_dir.path(), SCHEMA_VERSION);
    assert!(skyplan(temp_dir.path(), &["import", file.to_str().unwrap()]).status.success());

    assert!(skyplan(temp_dir.path(), &["clear"]).status.success());
    assert!(!temp_dir.path().join(".skyplan/design.json").exists());

    let output = skyplan(temp_dir.path(), &["show"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Untitled Design"));
    assert!(stdout.contains("Nodes:     0"));
}

/// Mutations made through the shared server state land on disk.
#[tokio::test]
async fn test_server_state_persists_to_file_storage() {
    let temp_dir = TempDir::new().unwrap();
    let storage = StorageConfig::new(temp_dir.path(), "design");

    let server = SkyplanServer::new(
        DesignEngine::with_store(storage.open()),
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
    );
    {
        let state = server.state();
        let mut engine = state.engine.write().await;
        engine.add_node(skyplan_core::Node::new("vpc", NodeKind::VpcEnvironment, NodeData::new("vpc", "VPC")));
        engine.set_design_name("From server");
    }

    let reopened = DesignEngine::with_store(storage.open());
    assert_eq!(reopened.document().name(), "From server");
    assert_eq!(reopened.graph().node_count(), 1);
    assert_eq!(server.state().engine.read().await.graph().node_count(), 1);
}

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::json;
use tempfile::TempDir;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_quartermaster")
}

fn write_json(path: &Path, value: serde_json::Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture dir should be created");
    }
    fs::write(path, value.to_string()).expect("fixture should be written");
}

fn commander(unit_id: &str, name: &str, health: f64) -> serde_json::Value {
    json!({
        "unit_id": unit_id,
        "faction_id": "arm",
        "name": name,
        "unit_types": ["commander"],
        "combat": { "health": health, "dps": 300.0 },
        "economy": { "metal_cost": 2700.0, "build_rate": 300.0 },
        "weapons": [
            { "safe_name": "armcomlaser", "name": "Light Laser", "dps": 75.0, "damage": 75.0, "range": 300.0, "target_layers": ["ground"] }
        ],
        "builds": ["armsolar", "armmex"]
    })
}

/// Faction tree with three commanders: two stat-identical, one tougher.
fn faction_fixture() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let arm = dir.path().join("arm");
    write_json(
        &arm.join("index.json"),
        json!({
            "data_version": "test",
            "units": [
                { "unit_id": "armcom", "name": "Armada Commander", "unit_types": ["commander"] },
                { "unit_id": "armpw", "name": "Pawn", "unit_types": ["bot"] },
                { "unit_id": "armcom_event", "name": "Event Commander", "unit_types": ["commander"] },
                { "unit_id": "armdecom", "name": "Decoy Commander", "unit_types": ["Commander"] }
            ]
        }),
    );
    write_json(&arm.join("units/armcom.json"), commander("armcom", "Armada Commander", 3700.0));
    write_json(
        &arm.join("units/armcom_event.json"),
        commander("armcom_event", "Event Commander", 3700.0),
    );
    write_json(&arm.join("units/armdecom.json"), commander("armdecom", "Decoy Commander", 4500.0));
    write_json(
        &arm.join("units/armpw.json"),
        json!({
            "unit_id": "armpw",
            "faction_id": "arm",
            "name": "Pawn",
            "combat": { "health": 300.0, "dps": 50.0 },
            "economy": { "metal_cost": 54.0, "energy_cost": 900.0 },
            "mobility": { "move_speed": 60.0 },
            "weapons": [
                { "safe_name": "armpw_gun", "dps": 25.0, "damage": 12.0, "range": 180.0, "count": 2, "target_layers": ["ground"] }
            ]
        }),
    );
    dir
}

fn run(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .env("QUARTERMASTER_DATA_DIR", data_dir)
        .env("QUARTERMASTER_LOG", "warn")
        .output()
        .expect("quartermaster should run")
}

#[test]
fn unknown_command_prints_usage() {
    let output = Command::new(bin())
        .arg("frobnicate")
        .output()
        .expect("quartermaster should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: quartermaster"));
}

#[test]
fn commanders_command_groups_identical_commanders() {
    let dir = faction_fixture();
    let output = run(dir.path(), &["commanders", "arm"]);

    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("commanders should emit json");
    let groups = payload.as_array().expect("array of groups");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["representative"]["unit_id"], "armcom");
    assert_eq!(groups[0]["variants"][0]["unit_id"], "armcom_event");
    assert_eq!(groups[1]["representative"]["unit_id"], "armdecom");
    assert_eq!(groups[1]["variants"].as_array().map(Vec::len), Some(0));
}

#[test]
fn commanders_command_fails_for_unknown_faction() {
    let dir = faction_fixture();
    let output = run(dir.path(), &["commanders", "cor"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to list faction 'cor'"));
}

#[test]
fn aggregate_command_sums_quantities() {
    let dir = faction_fixture();
    let output = run(dir.path(), &["aggregate", "arm:armpw x3", "arm:armcom"]);

    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("aggregate should emit json");
    assert_eq!(payload["unit_count"], 4);
    assert_eq!(payload["distinct_unit_types"], 2);
    assert_eq!(payload["sums"]["health"].as_f64(), Some(300.0 * 3.0 + 3700.0));
    assert_eq!(payload["mobility"]["move_speed"].as_f64(), Some(60.0));
}

#[test]
fn aggregate_command_reports_unresolved_refs() {
    let dir = faction_fixture();
    let output = run(dir.path(), &["aggregate", "arm:armpw", "arm:missing"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not resolve arm:missing"));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("partial stats are still emitted");
    assert_eq!(payload["unit_count"], 1);
}

#[test]
fn compare_command_emits_field_table() {
    let dir = faction_fixture();
    let output = run(dir.path(), &["compare", "arm:armdecom", "arm:armcom"]);

    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("compare should emit json");
    let fields = payload["fields"].as_array().expect("field rows");
    let health = fields
        .iter()
        .find(|row| row["field"] == "health")
        .expect("health row");
    assert_eq!(health["value"].as_f64(), Some(4500.0));
    assert_eq!(health["diff"].as_f64(), Some(800.0));
    assert_eq!(health["judgement"], "improved");
    assert_eq!(health["policy"], "higher-better");

    let cost = fields
        .iter()
        .find(|row| row["field"] == "metal_cost")
        .expect("cost row");
    assert!(cost.get("diff").is_none());
}

#[test]
fn compare_command_rejects_malformed_refs() {
    let dir = faction_fixture();
    let output = run(dir.path(), &["compare", "armcom", "arm:armpw"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expected faction:unit"));
}

#[test]
fn refs_cannot_escape_the_data_dir() {
    let dir = faction_fixture();
    let inner = dir.path().join("data");
    fs::create_dir_all(&inner).expect("inner data dir should be created");
    let output = run(&inner, &["compare", "../arm:armcom", "arm:armcom"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("faction '../arm' not found"));
}

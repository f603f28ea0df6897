use std::{path::PathBuf, process::Command};

fn reelforge_bin() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_reelforge")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("target").join("debug").join("reelforge"))
}

#[test]
fn estimate_prints_cost_breakdown_json() {
    let out = Command::new(reelforge_bin())
        .args(["estimate", "--duration", "30", "--fps", "30"])
        .output()
        .expect("binary runs");
    assert!(out.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(parsed["total_cost_usd"].as_f64().unwrap() > 0.0);
    assert_eq!(parsed["currency"], "USD");
    assert!(parsed["cost_per_frame"].as_f64().unwrap() > 0.0);
}

#[test]
fn sweep_reports_stats_for_empty_root() {
    let root = tempfile::tempdir().unwrap();
    let out = Command::new(reelforge_bin())
        .args(["sweep", "--root"])
        .arg(root.path())
        .output()
        .expect("binary runs");
    assert!(out.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(parsed["deleted_dirs"], 0);
}

#[test]
fn render_with_bad_spec_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("bad.json");
    std::fs::write(&spec, "{\"job_id\": \"x\"}").unwrap();

    let out = Command::new(reelforge_bin())
        .args(["render", "--spec"])
        .arg(&spec)
        .output()
        .expect("binary runs");
    assert!(!out.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(parsed["success"], false);
    assert!(
        parsed["error"]
            .as_str()
            .unwrap()
            .contains("validation error")
    );
}

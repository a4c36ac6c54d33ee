// CLI tests for the `ptl` binary.
//
// These tests verify that the tool produces byte-identical outputs for
// identical inputs, that every --emit stage works end to end, and that
// failures map to the documented exit codes.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn ptl_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ptl"))
}

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

fn gemm_trace() -> String {
    data_dir()
        .join("gemm_trace.json")
        .to_str()
        .unwrap()
        .to_string()
}

fn run_raw(args: &[&str]) -> Output {
    Command::new(ptl_binary())
        .args(args)
        .output()
        .expect("failed to run ptl")
}

fn run_ptl(args: &[&str]) -> String {
    let output = run_raw(args);
    assert!(
        output.status.success(),
        "ptl failed with args {:?}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("non-UTF8 output")
}

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("ptl-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

// ── Determinism ─────────────────────────────────────────────────────────────

/// Analyzing the same trace twice produces byte-identical JSON.
#[test]
fn same_trace_identical_json() {
    let trace = gemm_trace();
    let first = run_ptl(&["--emit", "json", &trace]);
    let second = run_ptl(&["--emit", "json", &trace]);
    assert_eq!(first, second, "JSON output should be byte-identical across runs");
}

#[test]
fn build_info_hash_tracks_trace_text() {
    let trace = gemm_trace();
    let info = run_ptl(&["--emit", "build-info", &trace]);
    let doc: serde_json::Value = serde_json::from_str(&info).unwrap();
    let hash = doc["trace_hash"].as_str().unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(doc["tool_version"], env!("CARGO_PKG_VERSION"));

    let json = run_ptl(&["--emit", "json", &trace]);
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(doc["provenance"]["trace_hash"], hash);
}

// ── Emit stages ─────────────────────────────────────────────────────────────

#[test]
fn emit_text_is_default() {
    let trace = gemm_trace();
    let default = run_ptl(&[&trace]);
    let text = run_ptl(&["--emit", "text", &trace]);
    assert_eq!(default, text);
    assert!(text.starts_with("timeline: 7 tasks, tracking {fused_multiply_accumulate}\n"));
    assert!(text.contains("  Vector Row 1: #5 [5, 9) vfmacc.vf v1, ft1, v8\n"));
}

#[test]
fn emit_json_render_contract() {
    let json = run_ptl(&["--emit", "json", &gemm_trace()]);
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    let tasks = doc["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 7);
    assert_eq!(tasks[3]["program_order"], 3);
    assert_eq!(tasks[3]["unit"], "vector");
    assert_eq!(tasks[3]["lane"], 0);
    assert_eq!(tasks[3]["start_cycle"], 4);
    assert_eq!(tasks[3]["end_cycle"], 8);
    assert_eq!(tasks[3]["mnemonic"], "vfmacc.vf v0, ft0, v8");
    assert_eq!(doc["lanes"]["fp"]["lanes"], 2);
    assert_eq!(doc["edges"].as_array().unwrap().len(), 4);
}

#[test]
fn emit_tasks_lanes_deps() {
    let trace = gemm_trace();

    let tasks = run_ptl(&["--emit", "tasks", &trace]);
    assert_eq!(tasks.lines().count(), 7);
    assert!(tasks.starts_with("#0 fp [0, 3) flw ft0, 0(a0) [indexed_load] def=ft0 use=a0\n"));

    let lanes = run_ptl(&["--emit", "lanes", &trace]);
    assert_eq!(
        lanes,
        "scalar: 2 tasks, 1 lanes, peak overlap 1\n\
         fp: 2 tasks, 2 lanes, peak overlap 2\n\
         vector: 3 tasks, 2 lanes, peak overlap 2\n"
    );

    let deps = run_ptl(&["--emit", "deps", &trace]);
    assert_eq!(
        deps,
        "#0 -> #3 (ft0)\n#1 -> #3 (v8)\n#4 -> #5 (ft1)\n#1 -> #5 (v8)\n"
    );
}

#[test]
fn track_flag_widens_consumers() {
    let trace = gemm_trace();
    let deps = run_ptl(&["--emit", "deps", "--track", "indexed-load", "--track", "fma", &trace]);
    assert_eq!(
        deps,
        "#0 -> #3 (ft0)\n#1 -> #3 (v8)\n#2 -> #4 (a0)\n#4 -> #5 (ft1)\n#1 -> #5 (v8)\n"
    );

    let all = run_ptl(&["--emit", "deps", "--track", "all", &trace]);
    assert_eq!(all.lines().count(), 6);
}

#[test]
fn verbose_reports_passes_on_stderr() {
    let output = run_raw(&["--verbose", &gemm_trace()]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ptl: loaded 7 rows (sorted by pc)"));
    assert!(stderr.contains("ptl: build_tasks complete"));
    assert!(stderr.contains("ptl: allocate_lanes complete"));
    assert!(stderr.contains("ptl: resolve_deps complete"));
}

// ── Diagnostics and exit codes ──────────────────────────────────────────────

#[test]
fn malformed_operand_warns_but_succeeds() {
    let path = write_temp(
        "malformed.json",
        r#"[{"inst": "beqz", "type": "scalar", "start cycle": 0, "end cycle": 1}]"#,
    );
    let output = run_raw(&["--emit", "tasks", path.to_str().unwrap()]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ptl: warning[W0100]: row 0: 'beqz': missing compared register"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn out_of_order_rows_warn_when_checked() {
    // One row has no pc, so the loader keeps file order.
    let path = write_temp(
        "unordered.json",
        r#"[
            {"inst": "addi a0,a1,1", "type": "scalar", "start cycle": 0, "end cycle": 1, "pc": 8},
            {"inst": "addi a0,a1,2", "type": "scalar", "start cycle": 1, "end cycle": 2, "pc": 4},
            {"inst": "addi a0,a1,3", "type": "scalar", "start cycle": 2, "end cycle": 3}
        ]"#,
    );
    let path_str = path.to_str().unwrap();

    let checked = run_raw(&["--check-order", "--emit", "tasks", path_str]);
    assert!(checked.status.success());
    assert!(String::from_utf8_lossy(&checked.stderr).contains("warning[W0101]: row 1"));

    let unchecked = run_raw(&["--no-check-order", "--emit", "tasks", path_str]);
    assert!(unchecked.status.success());
    assert!(!String::from_utf8_lossy(&unchecked.stderr).contains("W0101"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn empty_interval_exits_1() {
    let path = write_temp(
        "empty_interval.json",
        r#"[{"inst": "addi a0,a1,1", "type": "scalar", "start cycle": 3, "end cycle": 3}]"#,
    );
    let output = run_raw(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E0001]: row 0"));
    assert!(stderr.contains("ptl: error: build_tasks failed with 1 error(s)"));
    assert!(output.stdout.is_empty());
    let _ = std::fs::remove_file(path);
}

#[test]
fn bad_input_exits_2() {
    let output = run_raw(&["/nonexistent/trace.json"]);
    assert_eq!(output.status.code(), Some(2));

    let path = write_temp("bad.json", r#"{"not": "an array"}"#);
    let output = run_raw(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid trace"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn empty_trace_succeeds() {
    let path = write_temp("empty.json", "[]");
    let text = run_ptl(&["--emit", "lanes", path.to_str().unwrap()]);
    assert_eq!(
        text,
        "scalar: 0 tasks, 0 lanes, peak overlap 0\n\
         fp: 0 tasks, 0 lanes, peak overlap 0\n\
         vector: 0 tasks, 0 lanes, peak overlap 0\n"
    );
    let _ = std::fs::remove_file(path);
}

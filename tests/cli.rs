// End-to-end tests that drive the built `rusty-analyst` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use httpmock::prelude::*;
use serde_json::json;

fn analyst() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rusty-analyst"))
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run rusty-analyst")
}

fn write_sales(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("sales.csv");
    fs::write(
        &path,
        "date,region,amount\n2024-01-01,North,120.5\n2024-01-02,South,98.0\n2024-01-03,North,\n",
    )
    .unwrap();
    path
}

fn mock_ollama(server: &MockServer, answer: &str) {
    server.mock(|when, then| {
        when.method(GET).path("/api/tags");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "models": [{ "name": "codellama:7b" }] }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "response": answer, "done": true }));
    });
}

#[test]
fn unknown_template_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_sales(dir.path());
    let out = run(analyst().arg("analyze").arg(&data).arg("weekly"));

    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("weekly"), "stderr: {stderr}");
    assert!(stderr.contains("comprehensive"), "stderr: {stderr}");
}

#[test]
fn custom_without_questions_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_sales(dir.path());
    let out = run(analyst().arg("analyze").arg(&data).arg("custom"));
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(analyst()
        .args(["analyze", "does-not-exist.csv", "basic", "--skip-health-check"])
        .current_dir(dir.path()));

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("File not found"));
}

#[test]
fn unsupported_format_fails() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("notes.docx");
    fs::write(&doc, "hello").unwrap();
    let out = run(analyst().arg("analyze").arg(&doc).arg("--skip-health-check"));
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Unsupported file format"));
}

#[test]
fn unreachable_endpoint_fails_health_check() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_sales(dir.path());
    let out = run(analyst()
        .arg("analyze")
        .arg(&data)
        .args(["basic", "--base-url", "http://127.0.0.1:9", "--no-chart"])
        .arg("--output-dir")
        .arg(dir.path()));

    assert_eq!(out.status.code(), Some(1));
    assert!(!dir.path().join("report_basic_sales.txt").exists());
}

#[test]
fn analyze_writes_report_against_mock_ollama() {
    let server = MockServer::start();
    mock_ollama(&server, "Revenue is concentrated in the North.");

    let dir = tempfile::tempdir().unwrap();
    let data = write_sales(dir.path());
    let out_dir = dir.path().join("out");
    let out = run(analyst()
        .arg("analyze")
        .arg(&data)
        .arg("basic")
        .args(["--base-url", &server.base_url(), "--no-chart", "--json"])
        .arg("--output-dir")
        .arg(&out_dir));

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Shape: (3, 3)"), "stdout: {stdout}");
    assert!(stdout.contains("Columns: date, region, amount"), "stdout: {stdout}");
    assert!(stdout.contains("  date: datetime64[ns]\n  region: object\n  amount: float64\n"));

    let report = fs::read_to_string(out_dir.join("report_basic_sales.txt")).unwrap();
    assert!(report.starts_with("# BASIC DATA ANALYSIS REPORT\n"));
    assert_eq!(report.matches("## Analysis ").count(), 4);
    assert_eq!(report.matches("Revenue is concentrated in the North.").count(), 4);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("report_basic_sales.json")).unwrap())
            .unwrap();
    assert_eq!(json["shape"], json!([3, 3]));
    assert_eq!(json["dtypes"]["date"], "datetime64[ns]");
    assert_eq!(json["dtypes"]["amount"], "float64");
    assert!(json["chart_path"].is_null());
}

#[test]
fn custom_questions_and_chart() {
    let server = MockServer::start();
    mock_ollama(&server, "ok");

    let dir = tempfile::tempdir().unwrap();
    let data = write_sales(dir.path());
    let out = run(analyst()
        .arg("analyze")
        .arg(&data)
        .args(["custom", "Which region sells most?", "--base-url", &server.base_url()])
        .arg("--output-dir")
        .arg(dir.path()));

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let report = fs::read_to_string(dir.path().join("report_custom_sales.txt")).unwrap();
    assert!(report.contains("## Analysis 1: Which region sells most?"));

    let charts: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("analysis_sales_"))
        .collect();
    assert_eq!(charts.len(), 1);
}

#[test]
fn list_finds_supported_files() {
    let dir = tempfile::tempdir().unwrap();
    write_sales(dir.path());
    fs::create_dir(dir.path().join("more")).unwrap();
    fs::write(dir.path().join("more").join("data.json"), "[]").unwrap();
    fs::write(dir.path().join("readme.md"), "").unwrap();

    let out = run(analyst().arg("list").arg(dir.path()));
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("sales.csv"));
    assert!(stdout.contains("data.json"));
    assert!(!stdout.contains("readme.md"));
}

#[test]
fn templates_lists_every_name() {
    let out = run(analyst().arg("templates"));
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    for name in [
        "basic",
        "quality",
        "business",
        "statistical",
        "predictive",
        "correlation",
        "anomaly",
        "comprehensive",
        "custom",
    ] {
        assert!(stdout.contains(name), "missing {name}");
    }
}

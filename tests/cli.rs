use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ragline_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ragline"))
}

/// Temp workspace with a config whose providers point at `provider_url`.
fn setup_test_env(provider_url: &str, backend: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    let long: String = "Tuition and fees. ".chars().cycle().take(2500).collect();
    fs::write(files_dir.join("fees.txt"), long).unwrap();
    fs::write(
        files_dir.join("hours.md"),
        "# Office hours\n\nThe registrar is open 9 to 5 on weekdays.",
    )
    .unwrap();
    fs::write(files_dir.join("sheet.xlsx"), b"not really a spreadsheet").unwrap();

    let config_content = format!(
        r#"[chunking]
chunk_size = 1000
chunk_overlap = 100

[retrieval]
top_k = 4

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 3
url = "{url}"
max_retries = 0

[generation]
provider = "ollama"
url = "{url}"
max_retries = 0

[index]
backend = "{backend}"
path = "{root}/data/ragline.sqlite"
"#,
        url = provider_url,
        backend = backend,
        root = root.display(),
    );

    let config_path = config_dir.join("ragline.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ragline(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragline_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragline binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

// ============ Offline commands ============

#[test]
fn test_chunk_prints_plan() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9", "memory");
    let file = tmp.path().join("files/fees.txt");
    let (stdout, stderr, ok) = run_ragline(&config, &["chunk", file.to_str().unwrap()]);
    assert!(ok, "chunk failed: {}", stderr);
    assert!(stdout.contains("chunk fees.txt (2500 chars)"));
    assert!(stdout.contains("chunks: 3"));
    assert!(stdout.contains("[0] 0..1000"));
    assert!(stdout.contains("[1] 900..1900"));
    assert!(stdout.contains("[2] 1800..2500"));
}

#[test]
fn test_ingest_dry_run_needs_no_provider() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9", "memory");
    let file = tmp.path().join("files/hours.md");
    let (stdout, stderr, ok) = run_ragline(
        &config,
        &["ingest", file.to_str().unwrap(), "--id", "registrar", "--dry-run"],
    );
    assert!(ok, "dry run failed: {}", stderr);
    assert!(stdout.contains("chunk registrar"));
    assert!(stdout.contains("chunks: 1"));
}

#[test]
fn test_prompt_renders_template() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9", "memory");
    let (stdout, _, ok) = run_ragline(&config, &["prompt", "What is the tuition fee?"]);
    assert!(ok);
    assert!(stdout.contains("grounded-qa/v1"));
    assert!(stdout.contains("(no context)"));
    assert!(stdout.contains("Question: What is the tuition fee?"));
    assert!(stdout.contains("I could not find the answer in the provided documents."));
}

#[test]
fn test_init_creates_sqlite_index() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9", "sqlite");
    let (stdout, stderr, ok) = run_ragline(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Index initialized"));
    assert!(tmp.path().join("data/ragline.sqlite").exists());

    // Idempotent
    let (_, _, ok) = run_ragline(&config, &["init"]);
    assert!(ok);
}

// ============ Error reporting ============

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_ragline(&tmp.path().join("nope.toml"), &["prompt", "q"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_overlap_rejected_at_load() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(
        &config,
        "[chunking]\nchunk_size = 100\nchunk_overlap = 150\n[embedding]\nmodel = \"m\"\ndims = 3\n",
    )
    .unwrap();
    let (_, stderr, ok) = run_ragline(&config, &["prompt", "q"]);
    assert!(!ok);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_unsupported_file_type() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9", "memory");
    let file = tmp.path().join("files/sheet.xlsx");
    let (_, stderr, ok) = run_ragline(&config, &["chunk", file.to_str().unwrap()]);
    assert!(!ok);
    assert!(stderr.contains("unsupported file type: .xlsx"));
}

#[test]
fn test_missing_api_key_reported() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("gemini.toml");
    fs::write(
        &config,
        "[embedding]\nmodel = \"models/gemini-embedding-001\"\ndims = 3072\n[index]\nbackend = \"memory\"\n",
    )
    .unwrap();
    let output = Command::new(ragline_binary())
        .arg("--config")
        .arg(&config)
        .args(["ask", "What is the tuition fee?"])
        .env_remove("GOOGLE_API_KEY")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("GOOGLE_API_KEY"));
}

// ============ End to end against mock providers ============

async fn mock_ollama(vector: serde_json::Value, reply: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [vector] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": reply })))
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_with_empty_index_returns_not_found() {
    let server = mock_ollama(
        json!([1.0, 0.0, 0.0]),
        "I could not find the answer in the provided documents.",
    )
    .await;
    let (_tmp, config) = setup_test_env(&server.uri(), "memory");

    let (stdout, stderr, ok) = run_ragline(&config, &["ask", "What is the tuition fee?"]);
    assert!(ok, "ask failed: {}", stderr);
    assert_eq!(
        stdout.trim(),
        "I could not find the answer in the provided documents."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_then_retrieve_with_sqlite() {
    let server = mock_ollama(json!([0.6, 0.8, 0.0]), "The registrar is open 9 to 5.").await;
    let (tmp, config) = setup_test_env(&server.uri(), "sqlite");
    let file = tmp.path().join("files/hours.md");

    let (stdout, stderr, ok) = run_ragline(&config, &["ingest", file.to_str().unwrap()]);
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("ingest hours.md"));
    assert!(stdout.contains("records written: 1"));

    let (stdout, stderr, ok) = run_ragline(&config, &["retrieve", "When is the registrar open?"]);
    assert!(ok, "retrieve failed: {}", stderr);
    assert!(stdout.contains("hours.md#0"));
    assert!(stdout.contains("The registrar is open 9 to 5 on weekdays."));

    let (stdout, _, ok) = run_ragline(&config, &["ask", "When is the registrar open?", "--show-context"]);
    assert!(ok);
    assert!(stdout.starts_with("The registrar is open 9 to 5."));

    let (stdout, _, ok) = run_ragline(&config, &["purge", "hours.md"]);
    assert!(ok);
    assert!(stdout.contains("purged 1 records for hours.md"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_provider_failure_names_stage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;
    let (_tmp, config) = setup_test_env(&server.uri(), "memory");

    let (_, stderr, ok) = run_ragline(&config, &["retrieve", "When is the registrar open?"]);
    assert!(!ok);
    assert!(stderr.contains("Error: retrieval failed:"));
    assert!(stderr.contains("model not loaded"));
}

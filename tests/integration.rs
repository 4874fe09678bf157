use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pdfctx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pdfctx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    // Create config
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // Create test documents
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.txt"),
        "Alpha document about Rust programming.\n\nIt covers cargo, crates, and the borrow checker in some detail.",
    ).unwrap();
    fs::write(
        files_dir.join("beta.txt"),
        "Beta document about machine learning.\n\nDeep learning frameworks and neural networks are discussed here.",
    ).unwrap();

    // The hash embedding provider keeps the whole pipeline offline.
    let config_content = format!(
        r#"[store]
path = "{root}/data/pdfctx.sqlite"

[chunking]
chunk_size = 200
overlap = 50

[retrieval]
k = 5
chat_threshold = 2.0

[embedding]
provider = "hash"
dims = 256

[watch]
folder = "{root}/files"
poll_interval_secs = 1
"#,
        root = root.display()
    );

    let config_path = config_dir.join("pdfctx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pdfctx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pdfctx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pdfctx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn file_arg(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .join(name)
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_init_creates_store() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdfctx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_pdfctx(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_pdfctx(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_reports_accepted_files() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let alpha = file_arg(&config_path, "alpha.txt");
    let beta = file_arg(&config_path, "beta.txt");

    let (stdout, stderr, success) = run_pdfctx(&config_path, &["ingest", &alpha, &beta]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("accepted: 2"));
    assert!(stdout.contains("errors: 0"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_repeat_ingest_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let alpha = file_arg(&config_path, "alpha.txt");
    run_pdfctx(&config_path, &["ingest", &alpha]);

    let (stdout, _, success) = run_pdfctx(&config_path, &["ingest", &alpha]);
    assert!(success);
    assert!(stdout.contains("duplicates: 1"));
    assert!(stdout.contains("accepted: 0"));

    // The source count is unaffected by the repeat ingestion.
    let (stdout, _, _) = run_pdfctx(&config_path, &["sources"]);
    assert!(stdout.contains("1 document(s)"));
}

#[test]
fn test_unreadable_file_is_a_partial_failure() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let files_dir = config_path.parent().unwrap().parent().unwrap().join("files");
    fs::write(files_dir.join("broken.pdf"), b"not a real pdf").unwrap();
    fs::write(files_dir.join("blank.txt"), "   \n\t").unwrap();

    let alpha = file_arg(&config_path, "alpha.txt");
    let broken = file_arg(&config_path, "broken.pdf");
    let blank = file_arg(&config_path, "blank.txt");

    // Bad siblings never abort the batch.
    let (stdout, _, success) = run_pdfctx(&config_path, &["ingest", &broken, &blank, &alpha]);
    assert!(success);
    assert!(stdout.contains("accepted: 1"));
    assert!(stdout.contains("errors: 2"));
    assert!(stdout.contains("alpha.txt"));
}

#[test]
fn test_sources_lists_ingested_documents() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let (stdout, _, _) = run_pdfctx(&config_path, &["sources"]);
    assert!(stdout.contains("No documents stored."));

    let alpha = file_arg(&config_path, "alpha.txt");
    let beta = file_arg(&config_path, "beta.txt");
    run_pdfctx(&config_path, &["ingest", &alpha, &beta]);

    let (stdout, _, success) = run_pdfctx(&config_path, &["sources"]);
    assert!(success);
    assert!(stdout.contains("alpha.txt"));
    assert!(stdout.contains("beta.txt"));
    assert!(stdout.contains("2 document(s)"));
}

#[test]
fn test_delete_removes_document_and_results() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let alpha = file_arg(&config_path, "alpha.txt");
    let beta = file_arg(&config_path, "beta.txt");
    run_pdfctx(&config_path, &["ingest", &alpha, &beta]);

    let (stdout, _, success) = run_pdfctx(&config_path, &["delete", &alpha]);
    assert!(success);
    assert!(stdout.contains("Deleted"));

    let (stdout, _, _) = run_pdfctx(&config_path, &["sources"]);
    assert!(!stdout.contains("alpha.txt"));
    assert!(stdout.contains("beta.txt"));

    // No search result may come from the deleted source.
    let (stdout, _, _) = run_pdfctx(
        &config_path,
        &["search", "Rust programming cargo crates", "--threshold", "99"],
    );
    assert!(!stdout.contains("alpha.txt"));
}

#[test]
fn test_delete_unknown_source_is_a_noop() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_pdfctx(&config_path, &["delete", "/never/ingested.pdf"]);
    assert!(success, "delete errored: {}", stderr);
    assert!(stdout.contains("Not found"));
}

#[test]
fn test_search_on_empty_store_reports_no_results() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let (stdout, _, success) = run_pdfctx(&config_path, &["search", "anything at all"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_with_source_filter_stays_in_that_source() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let alpha = file_arg(&config_path, "alpha.txt");
    let beta = file_arg(&config_path, "beta.txt");
    run_pdfctx(&config_path, &["ingest", &alpha, &beta]);

    let (stdout, _, success) = run_pdfctx(
        &config_path,
        &[
            "search",
            "machine learning frameworks",
            "--source",
            &beta,
            "--threshold",
            "99",
        ],
    );
    assert!(success);
    assert!(stdout.contains("beta.txt"));
    assert!(!stdout.contains("alpha.txt"));
}

#[test]
fn test_boost_flag_improves_distance() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let alpha = file_arg(&config_path, "alpha.txt");
    run_pdfctx(&config_path, &["ingest", &alpha]);

    let query = "cargo and crates";
    let (plain, _, _) = run_pdfctx(
        &config_path,
        &["search", query, "--threshold", "99"],
    );
    let (boosted, _, _) = run_pdfctx(
        &config_path,
        &["search", query, "--threshold", "99", "--boost", "cargo=0.5"],
    );

    let parse_first_distance = |out: &str| -> f64 {
        let line = out.lines().find(|l| l.starts_with("1. [")).expect("no result line");
        line[4..line.find(']').unwrap()].parse().unwrap()
    };

    let d_plain = parse_first_distance(&plain);
    let d_boosted = parse_first_distance(&boosted);
    assert!(
        d_boosted < d_plain,
        "boosted {} not below unboosted {}",
        d_boosted,
        d_plain
    );
}

#[test]
fn test_extract_on_empty_store_skips_generation() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    // Must answer without touching the (absent) generation backend.
    let (stdout, stderr, success) = run_pdfctx(&config_path, &["extract"]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("no PDF documents uploaded"));
}

#[test]
fn test_stats_counts_documents_and_chunks() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfctx(&config_path, &["init"]);

    let alpha = file_arg(&config_path, "alpha.txt");
    run_pdfctx(&config_path, &["ingest", &alpha]);

    let (stdout, _, success) = run_pdfctx(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents:   1"));
    assert!(stdout.contains("alpha.txt"));
}

#[test]
fn test_missing_watch_section_fails_watch_command() {
    let (_tmp, config_path) = setup_test_env();

    // Rewrite the config without a [watch] section.
    let content = fs::read_to_string(&config_path).unwrap();
    let stripped: String = content.split("[watch]").next().unwrap().to_string();
    fs::write(&config_path, stripped).unwrap();

    let (_, stderr, success) = run_pdfctx(&config_path, &["watch"]);
    assert!(!success);
    assert!(stderr.contains("watch"));
}

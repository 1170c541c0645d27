//! CLI integration tests driving the `pchat` binary with the offline
//! hashing embedder and no completion backend.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pchat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("pchat");
    path
}

fn docx_with_text(text: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Temp workspace with `config/pchat.toml` and an `about_me/` corpus.
fn setup_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("about_me/projects")).unwrap();

    let config = format!(
        r#"[index]
path = "{root}/data/index.sqlite"

[corpus]
root = "{root}/about_me"

[chunking]
chunk_size = 40
overlap = 8

[embedding]
provider = "hashing"
dims = 256

[completion]
provider = "disabled"
{extra}
"#,
        root = root.display(),
        extra = extra_config
    );
    fs::write(root.join("config/pchat.toml"), config).unwrap();

    fs::write(
        root.join("about_me/bio.md"),
        "# Bio\n\nSam is a backend engineer who writes Rust and Go services.\n",
    )
    .unwrap();
    fs::write(
        root.join("about_me/projects/telescope.txt"),
        "Built a telescope mount controller for amateur astronomy.\n",
    )
    .unwrap();

    let config_path = root.join("config/pchat.toml");
    (tmp, config_path)
}

fn run_pchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(pchat_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pchat: {}", e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_creates_index_file() {
    let (tmp, config) = setup_env("");
    let (stdout, stderr, ok) = run_pchat(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Index initialized"));
    assert!(tmp.path().join("data/index.sqlite").exists());

    let (_, _, again) = run_pchat(&config, &["init"]);
    assert!(again, "init should be idempotent");
}

#[test]
fn test_index_then_search() {
    let (tmp, config) = setup_env("");
    fs::write(tmp.path().join("about_me/broken.pdf"), b"not a pdf").unwrap();

    let (stdout, stderr, ok) = run_pchat(&config, &["index"]);
    assert!(ok, "index failed: stdout={} stderr={}", stdout, stderr);
    assert!(stdout.contains("documents loaded: 2"), "{}", stdout);
    assert!(stdout.contains("documents skipped: 1"), "{}", stdout);
    assert!(stdout.contains("broken.pdf"), "{}", stdout);

    let (out, _, ok) = run_pchat(&config, &["search", "telescope astronomy", "--k", "1"]);
    assert!(ok);
    assert!(out.starts_with("1. ["), "{}", out);
    assert!(out.contains("projects/telescope.txt"), "{}", out);
    assert!(!out.contains("2. ["), "{}", out);
}

#[test]
fn test_reindex_reuses_embeddings() {
    let (_tmp, config) = setup_env("");
    let (first, _, ok) = run_pchat(&config, &["index"]);
    assert!(ok);
    assert!(first.contains("chunks embedded: 2"), "{}", first);

    let (second, _, ok) = run_pchat(&config, &["index"]);
    assert!(ok);
    assert!(second.contains("chunks embedded: 0"), "{}", second);
    assert!(second.contains("chunks reused: 2"), "{}", second);
}

#[test]
fn test_docx_is_indexed() {
    let (tmp, config) = setup_env("");
    fs::write(
        tmp.path().join("about_me/cv.docx"),
        docx_with_text("Certified kayak instructor"),
    )
    .unwrap();

    let (stdout, stderr, ok) = run_pchat(&config, &["index"]);
    assert!(ok, "{}", stderr);
    assert!(stdout.contains("documents loaded: 3"), "{}", stdout);

    let (out, _, _) = run_pchat(&config, &["search", "kayak instructor", "--k", "1"]);
    assert!(out.contains("cv.docx"), "{}", out);
    assert!(out.contains("Certified kayak instructor"), "{}", out);
}

#[test]
fn test_search_before_index_has_no_results() {
    let (_tmp, config) = setup_env("");
    let (out, stderr, ok) = run_pchat(&config, &["search", "anything"]);
    assert!(ok, "{}", stderr);
    assert!(out.contains("No results."));
}

#[test]
fn test_empty_corpus_fails_distinctly() {
    let (tmp, config) = setup_env("");
    fs::remove_file(tmp.path().join("about_me/bio.md")).unwrap();
    fs::remove_file(tmp.path().join("about_me/projects/telescope.txt")).unwrap();

    let (_, stderr, ok) = run_pchat(&config, &["index"]);
    assert!(!ok);
    assert!(stderr.contains("no usable documents"), "{}", stderr);
}

#[test]
fn test_health_reports_index() {
    let (_tmp, config) = setup_env("");
    run_pchat(&config, &["index"]);

    let (out, stderr, ok) = run_pchat(&config, &["health"]);
    assert!(ok, "{}", stderr);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["index_size"], 2);
    assert_eq!(json["embedding_model"], "hashing-256");
    assert_eq!(json["indexed_model"], "hashing-256");
}

#[test]
fn test_ask_with_disabled_completion_fails() {
    let (_tmp, config) = setup_env("");
    run_pchat(&config, &["index"]);

    let (_, stderr, ok) = run_pchat(&config, &["ask", "What does Sam build?"]);
    assert!(!ok);
    assert!(stderr.contains("completion"), "{}", stderr);
}

#[test]
fn test_invalid_chunking_rejected_at_startup() {
    let (tmp, _) = setup_env("");
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        format!(
            "[index]\npath = \"{}/x.sqlite\"\n[chunking]\nchunk_size = 10\noverlap = 10\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, ok) = run_pchat(&bad, &["init"]);
    assert!(!ok);
    assert!(stderr.contains("overlap"), "{}", stderr);
}

#[test]
fn test_completions_need_no_config() {
    let output = Command::new(pchat_binary())
        .args(["--config", "/nonexistent/pchat.toml", "completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("pchat"));
}

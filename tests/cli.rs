//! CLI integration tests
//!
//! Run the `gauntlet` binary against scenario files written into a
//! temporary directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Test context with an isolated config dir and a scratch directory
struct TestContext {
    dir: tempfile::TempDir,
    bin: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            bin: PathBuf::from(env!("CARGO_BIN_EXE_gauntlet")),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the scratch directory
    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(&self.bin)
            .args(args)
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to execute gauntlet")
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            output.status.success(),
            "gauntlet {:?} failed:\nstdout: {}\nstderr: {}",
            args,
            stdout,
            stderr
        );
        stdout.into_owned()
    }

    fn run_err(&self, args: &[&str]) -> (String, String) {
        let output = self.run(args);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        assert!(
            !output.status.success(),
            "gauntlet {:?} unexpectedly succeeded:\nstdout: {}",
            args,
            stdout
        );
        (stdout, stderr)
    }
}

const PASSING: &str = r#"
name: passing
tests:
  - name: remember
    var: { set: { V: 42 } }
  - name: recall
    var: { expect: { V: "42" } }
"#;

const FAILING: &str = r#"
name: failing
tests:
  - var: { set: { V: 42 } }
  - name: wrong
    var: { expect: { V: 41 } }
    retry: { attempts: 2, interval: 10ms }
"#;

#[test]
fn test_passing_scenario() {
    let ctx = TestContext::new();
    let file = ctx.write("passing.yaml", PASSING);

    let stdout = ctx.run_ok(&["run", file.to_str().unwrap()]);
    assert!(stdout.contains("passing/remember"), "stdout: {}", stdout);
    assert!(stdout.contains("passing/recall"), "stdout: {}", stdout);
    assert!(stdout.contains("2 passed, 0 failed, 0 skipped"), "stdout: {}", stdout);
}

#[test]
fn test_failing_scenario_exits_nonzero() {
    let ctx = TestContext::new();
    let file = ctx.write("failing.yaml", FAILING);

    let (stdout, _) = ctx.run_err(&["run", file.to_str().unwrap()]);
    assert!(
        stdout.contains("not equal: expected 41 but got 42"),
        "stdout: {}",
        stdout
    );
    assert!(stdout.contains("1 passed, 1 failed, 0 skipped"), "stdout: {}", stdout);
}

#[test]
fn test_json_output() {
    let ctx = TestContext::new();
    let file = ctx.write("failing.yaml", FAILING);

    let output = ctx.run(&["run", "--json", file.to_str().unwrap()]);
    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");

    let results = json
        .as_object()
        .and_then(|m| m.values().next())
        .and_then(|v| v.as_array())
        .expect("one scenario");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["name"], "failing/0");
    assert_eq!(results[1]["name"], "failing/wrong");
    assert_eq!(results[1]["failures"][0]["kind"], "not_equal");
    assert_eq!(results[1]["failures"][0]["detail"]["expected"], "41");
}

#[test]
fn test_directory_of_scenarios() {
    let ctx = TestContext::new();
    ctx.write("suite/a.yaml", PASSING);
    ctx.write("suite/b.yml", "tests:\n  - var: { set: { X: 1 } }\n");
    ctx.write("suite/notes.txt", "not a scenario");

    let stdout = ctx.run_ok(&["run", ctx.path().join("suite").to_str().unwrap()]);
    // b.yml has no name, so its units are named after the file
    assert!(stdout.contains("b/0"), "stdout: {}", stdout);
    assert!(stdout.contains("3 passed, 0 failed, 0 skipped"), "stdout: {}", stdout);
}

#[test]
fn test_skip_if_reports_skipped() {
    let ctx = TestContext::new();
    let file = ctx.write(
        "skipped.yaml",
        r#"
name: skipped
skip-if:
  - var: { set: { ALWAYS: true } }
tests:
  - var: { expect: { NEVER: 1 } }
"#,
    );

    let stdout = ctx.run_ok(&["run", file.to_str().unwrap()]);
    assert!(stdout.contains("0 passed, 0 failed, 1 skipped"), "stdout: {}", stdout);
}

#[test]
fn test_fixture_argument() {
    let ctx = TestContext::new();
    let data = ctx.write("books.json", r#"{"books": [{"title": "Dune"}]}"#);
    let file = ctx.write(
        "books.yaml",
        r#"
name: books
fixtures: [books]
tests:
  - var: { set: { TITLE: { fixture: books, path: /books/0/title } } }
  - var: { expect: { TITLE: Dune } }
"#,
    );

    let fixture = format!("books={}", data.display());
    ctx.run_ok(&["run", "--fixture", &fixture, file.to_str().unwrap()]);
}

#[test]
fn test_missing_fixture_is_error() {
    let ctx = TestContext::new();
    let file = ctx.write("books.yaml", "fixtures: [books]\ntests:\n  - var: { set: { A: 1 } }\n");

    let (_, stderr) = ctx.run_err(&["run", file.to_str().unwrap()]);
    assert!(stderr.contains("Required fixture missing: books"), "stderr: {}", stderr);
}

#[test]
fn test_missing_dependency_is_error() {
    let ctx = TestContext::new();
    let file = ctx.write(
        "deps.yaml",
        "depends:\n  - name: gauntlet-missing-tool-91c3\ntests:\n  - var: { set: { A: 1 } }\n",
    );

    let (_, stderr) = ctx.run_err(&["run", file.to_str().unwrap()]);
    assert!(stderr.contains("gauntlet-missing-tool-91c3"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_action_is_parse_error() {
    let ctx = TestContext::new();
    let file = ctx.write("bad.yaml", "tests:\n  - http: { get: /books }\n");

    let (_, stderr) = ctx.run_err(&["run", file.to_str().unwrap()]);
    assert!(stderr.contains("No plugin could parse action 0"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_fixture_argument() {
    let ctx = TestContext::new();
    let file = ctx.write("passing.yaml", PASSING);

    let (_, stderr) = ctx.run_err(&["run", "--fixture", "books", file.to_str().unwrap()]);
    assert!(stderr.contains("expected NAME=FILE"), "stderr: {}", stderr);
}

#[test]
#[cfg(target_os = "linux")]
fn test_config_file_is_read() {
    let ctx = TestContext::new();
    ctx.write("config/gauntlet/config.toml", "[retry]\ninterval_ms = \"soon\"\n");
    let file = ctx.write("passing.yaml", PASSING);

    let (_, stderr) = ctx.run_err(&["run", file.to_str().unwrap()]);
    assert!(stderr.contains("Invalid configuration file"), "stderr: {}", stderr);
}

#[test]
fn test_list_plugins() {
    let ctx = TestContext::new();

    let stdout = ctx.run_ok(&["plugins", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let plugins = json.as_array().expect("plugin list");
    assert!(plugins.iter().any(|p| p["name"] == "var"));
    assert!(plugins.iter().any(|p| p["aliases"][0] == "vars"));
}

//! End-to-end tests for the specrun CLI
//!
//! Each test builds a throwaway project (suites, fixtures, specrun.toml) and
//! runs the real binary against it. A shell one-liner stands in for the
//! external runner and records what it was handed in `runs.log`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Runner that appends its arguments to runs.log and exits with $EXIT_CODE
const RECORDING_RUNNER: &str = r#"
[runner]
program = "sh"
args = ["-c", "echo \"$@\" >> runs.log; exit ${EXIT_CODE:-0}", "runner"]
"#;

/// Test project with paths and cleanup
struct TestProject {
    dir: TempDir,
}

impl TestProject {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("tests")).expect("Failed to create tests dir");
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    fn suite(&self, name: &str) {
        self.write(
            &format!("tests/{name}.spec.yaml"),
            &format!("name: {name}\ncases: []\n"),
        );
    }

    fn settings(&self, content: &str) {
        self.write("specrun.toml", content);
    }

    /// Run specrun in the project root with a clean override environment
    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("Failed to run specrun")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_specrun"));
        cmd.args(args)
            .current_dir(self.root())
            .env_remove("SPECRUN_CUSTOM_DIR")
            .env_remove("SPECRUN_FIXTURES_DIR")
            .env_remove("SPECRUN_OVERRIDE_FIXTURES_DIR")
            .env_remove("SPECRUN_ENV")
            .env("RUST_LOG", "warn");
        cmd
    }

    /// Lines recorded by the runner, with paths reduced to file names
    fn runs(&self) -> Option<Vec<Vec<String>>> {
        let log = fs::read_to_string(self.root().join("runs.log")).ok()?;
        Some(
            log.lines()
                .map(|line| {
                    line.split_whitespace()
                        .map(|arg| {
                            Path::new(arg)
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default()
                        })
                        .collect()
                })
                .collect(),
        )
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_unknown_suite_runs_nothing() {
    let project = TestProject::new();
    project.settings(RECORDING_RUNNER);
    project.suite("a");

    let output = project.run(&["a", "nope"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("'nope' not found"), "stderr: {err}");
    assert!(err.contains("nope.spec.yaml"), "stderr: {err}");
    assert!(project.runs().is_none(), "runner must not be invoked");
}

#[test]
fn test_single_runner_invocation_in_order() {
    let project = TestProject::new();
    project.settings(RECORDING_RUNNER);
    for name in ["c", "a", "b"] {
        project.suite(name);
    }
    project.write("custom/tests/d.spec.yaml", "name: d\ncases: []\n");

    let output = project
        .command(&[])
        .env("SPECRUN_CUSTOM_DIR", project.root().join("custom"))
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        project.runs().unwrap(),
        vec![vec![
            "a.spec.yaml",
            "b.spec.yaml",
            "c.spec.yaml",
            "d.spec.yaml"
        ]]
    );
}

#[test]
fn test_run_subcommand_with_named_suites() {
    let project = TestProject::new();
    project.settings(RECORDING_RUNNER);
    project.suite("a");
    project.suite("b");

    let output = project.run(&["run", "b", "a"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        project.runs().unwrap(),
        vec![vec!["b.spec.yaml", "a.spec.yaml"]]
    );
}

#[test]
fn test_smoke_subset() {
    let project = TestProject::new();
    project.settings(RECORDING_RUNNER);
    project.suite("smoke");
    project.suite("other");

    let output = project.run(&["--smoke"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(project.runs().unwrap(), vec![vec!["smoke.spec.yaml"]]);
}

#[test]
fn test_smoke_and_import_conflict() {
    let project = TestProject::new();
    let output = project.run(&["--smoke", "--import-only"]);
    assert!(!output.status.success());
}

#[test]
fn test_runner_exit_code_is_propagated() {
    let project = TestProject::new();
    project.settings(RECORDING_RUNNER);
    project.suite("a");

    let output = project.command(&[]).env("EXIT_CODE", "3").output().unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(project.runs().unwrap().len(), 1);
}

#[test]
fn test_aggregate_list_is_removed() {
    let project = TestProject::new();
    project.settings(
        r#"
[runner]
program = "sh"
args = ["-c", "echo \"$1\" > list-path; cat \"$1\" >> runs.log", "runner"]
entry_mode = "aggregate"
"#,
    );
    project.suite("a");
    project.suite("b");

    let output = project.run(&[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        project.runs().unwrap(),
        vec![vec!["a.spec.yaml"], vec!["b.spec.yaml"]]
    );
    let list = fs::read_to_string(project.root().join("list-path")).unwrap();
    assert!(!Path::new(list.trim()).exists(), "list file left behind");
}

#[test]
fn test_missing_runner_program() {
    let project = TestProject::new();
    project.settings("[runner]\nprogram = \"specrun-no-such-runner\"\n");
    project.suite("a");

    let output = project.run(&[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("specrun-no-such-runner"));
}

#[test]
fn test_list_command() {
    let project = TestProject::new();
    project.suite("b");
    project.suite("a");

    let output = project.run(&["list"]);

    assert!(output.status.success());
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(lines, vec!["tests/a.spec.yaml", "tests/b.spec.yaml"]);
}

#[test]
fn test_drop_db_without_config() {
    let project = TestProject::new();
    let output = project.run(&["drop-db"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Nothing dropped for environment 'testing'"));
}

fn fixture_project() -> TestProject {
    let project = TestProject::new();
    project.write(
        "tests/fixtures/manifest.json",
        r#"{"greeting": "hello.txt", "course-export": "course.txt"}"#,
    );
    project.write("tests/fixtures/hello.txt", "hello\n");
    project.write("tests/fixtures/course.txt", "primary course\n");
    project
}

#[test]
fn test_fixtures_command() {
    let project = fixture_project();
    let output = project.run(&["fixtures"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("course-export"));
    assert!(out.contains("greeting"));
    assert!(out.contains("hello.txt"));
}

#[test]
fn test_fixtures_command_without_manifest() {
    let project = TestProject::new();
    let output = project.run(&["fixtures"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No fixture manifest found"));
}

#[test]
fn test_builtin_runner_uses_private_fixture_copies() {
    let project = fixture_project();
    project.write(
        "tests/copies.spec.yaml",
        r#"
name: Fixture copies
cases:
  - name: copy can be modified
    steps:
      - action: fixture
        key: greeting
        as: file
      - action: shell
        command: "grep -q hello ${file} && echo changed > ${file}"
  - name: next copy is pristine
    steps:
      - action: fixture
        key: greeting
        as: again
      - action: shell
        command: "grep -q hello ${again}"
"#,
    );

    let output = project.run(&[]);

    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        stdout(&output),
        stderr(&output)
    );
    assert_eq!(
        fs::read_to_string(project.root().join("tests/fixtures/hello.txt")).unwrap(),
        "hello\n"
    );
}

#[test]
fn test_builtin_runner_reports_failures() {
    let project = fixture_project();
    project.write(
        "tests/failing.spec.yaml",
        r#"
name: Failing
cases:
  - name: fails
    steps:
      - action: shell
        command: "false"
  - name: still runs
    steps:
      - action: shell
        command: "touch second-case-ran"
"#,
    );

    let output = project.run(&[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(project.root().join("second-case-ran").exists());
    assert!(stdout(&output).contains("1 failed"));
}

#[test]
fn test_override_fixture_wins_for_custom_suite() {
    let project = fixture_project();
    project.write(
        "custom/fixtures/manifest.json",
        r#"{"course-export": "course.txt"}"#,
    );
    project.write("custom/fixtures/course.txt", "custom course\n");
    project.write(
        "custom/tests/course.spec.yaml",
        r#"
name: Course export
cases:
  - name: uses the custom course
    steps:
      - action: fixture
        key: course-export
        as: course
      - action: shell
        command: "grep -q custom ${course}"
      - action: fixture
        key: greeting
        as: greeting
      - action: shell
        command: "grep -q hello ${greeting}"
"#,
    );

    let output = project
        .command(&[])
        .env("SPECRUN_CUSTOM_DIR", project.root().join("custom"))
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        stdout(&output),
        stderr(&output)
    );
}

#[test]
fn test_unreadable_spec_fails_run() {
    let project = TestProject::new();
    project.write("tests/broken.spec.yaml", "name: [unterminated\n");

    let output = project.run(&[]);

    assert_eq!(output.status.code(), Some(1));
}

//! Spec runner implementation
//!
//! Runs every spec file of a selection in this process, so all of them share
//! one booted application and one fixture workspace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::process::Command as TokioCommand;

use crate::app::{AppHandle, Application, HTTP_MODULE};
use crate::common::{Error, Result};
use crate::fixtures::FixtureResolver;

use super::config::{ResponseExpectation, SpecFile, Step, TestCase};

/// Result of one test case
#[derive(Debug)]
pub struct CaseResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// Result of one spec file
#[derive(Debug)]
pub struct SpecResult {
    pub name: String,
    pub path: PathBuf,
    pub cases: Vec<CaseResult>,
    /// Set when the file could not be loaded
    pub error: Option<String>,
}

impl SpecResult {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.cases.iter().all(|c| c.passed)
    }
}

/// Executes spec files against a shared application and fixture set
pub struct Runner<'a, A: Application> {
    fixtures: &'a FixtureResolver,
    app: &'a AppHandle<A>,
    verbose: bool,
}

impl<'a, A: Application> Runner<'a, A> {
    pub fn new(fixtures: &'a FixtureResolver, app: &'a AppHandle<A>, verbose: bool) -> Self {
        Self {
            fixtures,
            app,
            verbose,
        }
    }

    /// Run spec files in order
    pub async fn run_all(&self, files: &[PathBuf]) -> Vec<SpecResult> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.run_spec(file).await);
        }
        results
    }

    /// Run a single spec file
    pub async fn run_spec(&self, path: &Path) -> SpecResult {
        let spec = match SpecFile::load(path) {
            Ok(spec) => spec,
            Err(e) => {
                println!("\n{} {}", "✗".red(), e);
                return SpecResult {
                    name: path.display().to_string(),
                    path: path.to_path_buf(),
                    cases: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        println!(
            "\n{} {}",
            "Running Suite:".blue().bold(),
            spec.name.white().bold()
        );
        if let Some(desc) = &spec.description {
            println!("  {}", desc.dimmed());
        }

        let mut cases = Vec::with_capacity(spec.cases.len());
        for case in &spec.cases {
            cases.push(self.run_case(case).await);
        }

        SpecResult {
            name: spec.name,
            path: path.to_path_buf(),
            cases,
            error: None,
        }
    }

    async fn run_case(&self, case: &TestCase) -> CaseResult {
        let steps_total = case.steps.len();
        let mut vars = HashMap::new();

        for (i, step) in case.steps.iter().enumerate() {
            let step_num = i + 1;
            if let Err(e) = self.execute_step(step, &mut vars).await {
                println!("  {} {} (step {}: {})", "✗".red(), case.name, step_num, e);
                return CaseResult {
                    name: case.name.clone(),
                    passed: false,
                    steps_run: step_num,
                    steps_total,
                    error: Some(e.to_string()),
                };
            }
        }

        println!("  {} {}", "✓".green(), case.name);
        CaseResult {
            name: case.name.clone(),
            passed: true,
            steps_run: steps_total,
            steps_total,
            error: None,
        }
    }

    async fn execute_step(&self, step: &Step, vars: &mut HashMap<String, String>) -> Result<()> {
        match step {
            Step::CleanDb { collections } => {
                self.ensure_booted().await?;
                let report = self.app.clean_db(collections.as_slice()).await?;
                if !report.is_clean() {
                    let failed: Vec<String> = report
                        .failed
                        .iter()
                        .map(|(name, e)| format!("{name}: {e}"))
                        .collect();
                    return Err(Error::StepFailed(format!(
                        "could not clear collections ({})",
                        failed.join("; ")
                    )));
                }
                if self.verbose {
                    println!(
                        "    {} cleared {}, missing {}",
                        "db".dimmed(),
                        report.cleared.len(),
                        report.missing.len()
                    );
                }
                Ok(())
            }

            Step::Fixture { key, bind } => {
                let path = self.fixtures.fixture(&substitute(key, vars)?)?;
                if self.verbose {
                    println!("    {} {} -> {}", "fixture".dimmed(), key, path.display());
                }
                vars.insert(bind.clone(), path.display().to_string());
                Ok(())
            }

            Step::Unzip { path, bind } => {
                let archive = PathBuf::from(substitute(path, vars)?);
                let stem = archive
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "archive".to_string());
                let dest = self.fixtures.workspace()?.join(format!("{stem}-unzipped"));
                std::fs::create_dir_all(&dest)?;
                extract_zip(&archive, &dest)?;
                if let Some(bind) = bind {
                    vars.insert(bind.clone(), dest.display().to_string());
                }
                Ok(())
            }

            Step::Request {
                method,
                path,
                body,
                body_file,
                content_type,
                expect,
                bind,
            } => {
                self.ensure_booted().await?;
                let module = self.app.module(HTTP_MODULE).await?;
                let client = module.as_http().ok_or_else(|| {
                    Error::Config(format!("Module '{HTTP_MODULE}' does not provide HTTP access"))
                })?;

                let payload = match (body, body_file) {
                    (_, Some(file)) => Some(tokio::fs::read(substitute(file, vars)?).await?),
                    (Some(body), None) => Some(substitute(body, vars)?.into_bytes()),
                    (None, None) => None,
                };

                let path = substitute(path, vars)?;
                let response = client
                    .send(method, &path, payload, content_type.as_deref())
                    .await?;

                if self.verbose {
                    println!(
                        "    {} {} {} -> {}",
                        "http".dimmed(),
                        method,
                        path,
                        response.status
                    );
                }

                check_response(
                    expect.as_ref().unwrap_or(&ResponseExpectation::default()),
                    response.status,
                    &response.body,
                )?;

                if let Some(bind) = bind {
                    vars.insert(bind.clone(), response.body);
                }
                Ok(())
            }

            Step::Shell {
                command,
                expect_success,
            } => {
                let command = substitute(command, vars)?;
                if self.verbose {
                    println!("    $ {}", command.dimmed());
                }

                let status = TokioCommand::new("sh")
                    .arg("-c")
                    .arg(&command)
                    .stdin(Stdio::null())
                    .stdout(if self.verbose {
                        Stdio::inherit()
                    } else {
                        Stdio::null()
                    })
                    .stderr(if self.verbose {
                        Stdio::inherit()
                    } else {
                        Stdio::null()
                    })
                    .status()
                    .await
                    .map_err(|e| Error::StepFailed(format!("failed to run '{}': {}", command, e)))?;

                if status.success() != *expect_success {
                    return Err(Error::StepFailed(format!(
                        "command '{}' exited with code {:?}",
                        command,
                        status.code()
                    )));
                }
                Ok(())
            }
        }
    }

    /// Boot the application with a spinner if this is the first use
    async fn ensure_booted(&self) -> Result<()> {
        if self.app.is_booted() {
            return Ok(());
        }

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Booting application...");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let result = self.app.app().await;
        spinner.finish_and_clear();
        result.map(|_| ())
    }
}

fn check_response(expect: &ResponseExpectation, status: u16, body: &str) -> Result<()> {
    match expect.status {
        Some(expected) if expected != status => {
            return Err(Error::StepFailed(format!(
                "expected status {}, got {}",
                expected, status
            )));
        }
        None if !(200..300).contains(&status) => {
            return Err(Error::StepFailed(format!(
                "expected a success status, got {}",
                status
            )));
        }
        _ => {}
    }

    if let Some(needle) = &expect.body_contains {
        if !body.contains(needle.as_str()) {
            return Err(Error::StepFailed(format!(
                "response body does not contain '{}'",
                needle
            )));
        }
    }
    Ok(())
}

/// Replace `${name}` placeholders with bound values
fn substitute(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| Error::StepFailed(format!("unterminated placeholder in '{}'", template)))?;
        let name = &after[..end];
        let value = vars
            .get(name)
            .ok_or_else(|| Error::StepFailed(format!("'{}' is not bound", name)))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Extract a zip archive
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::StepFailed(format!("failed to open zip: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::StepFailed(format!("failed to read zip entry: {}", e)))?;

        let outpath = match entry.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => continue,
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = std::fs::File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;
        }
    }

    Ok(())
}

/// Print totals for a run; returns `true` if everything passed
pub fn print_summary(results: &[SpecResult]) -> bool {
    let cases: usize = results.iter().map(|r| r.cases.len()).sum();
    let failed_cases: usize = results
        .iter()
        .map(|r| r.cases.iter().filter(|c| !c.passed).count())
        .sum();
    let broken_files = results.iter().filter(|r| r.error.is_some()).count();
    let all_passed = failed_cases == 0 && broken_files == 0;

    println!();
    for result in results.iter().filter(|r| !r.passed()) {
        println!("{} {}", "✗".red(), result.path.display());
        if let Some(e) = &result.error {
            println!("    {}", e);
        }
        for case in result.cases.iter().filter(|c| !c.passed) {
            println!(
                "    {} (step {}/{}): {}",
                case.name,
                case.steps_run,
                case.steps_total,
                case.error.as_deref().unwrap_or("failed")
            );
        }
    }

    let line = format!(
        "{} suites, {} cases, {} failed",
        results.len(),
        cases,
        failed_cases + broken_files
    );
    if all_passed {
        println!("{} {}", "✓".green().bold(), line.green().bold());
    } else {
        println!("{} {}", "✗".red().bold(), line.red().bold());
    }
    all_passed
}

//! Version materialization
//!
//! Fetching a module at a pinned version into a scratch workspace goes
//! through the ecosystem's own resolver (`go mod download`,
//! `npm install`). All process invocation sits behind `CommandRunner` so
//! tests inject deterministic fakes; real network is never required for
//! unit tests. Scratch directories are owned by the caller (`tempfile`)
//! and vanish on every exit path.

use crate::errors::{GoriskError, Result};
use crate::shared::models::Language;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(&self) -> bool {
        self.status == 0
    }
}

/// External process abstraction.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput>;
}

/// Real subprocess execution with a polling timeout.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        use std::process::{Command, Stdio};

        debug!(%program, ?args, "running external command");
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GoriskError::external(format!("{program}: {e}")))?;

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(GoriskError::external(format!(
                            "{program} timed out after {}s",
                            timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    return Err(GoriskError::external(format!("{program}: {e}")));
                }
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|e| GoriskError::external(format!("{program}: {e}")))?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Deserialize)]
struct GoDownloadInfo {
    #[serde(rename = "Dir")]
    dir: Option<String>,
    #[serde(rename = "Error")]
    error: Option<String>,
}

/// Fetch `module@version` into `scratch`; returns the module source dir.
pub fn materialize(
    runner: &dyn CommandRunner,
    language: Language,
    module: &str,
    version: &str,
    scratch: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    match language {
        Language::Go => {
            // A synthesized module manifest makes the download reproducible
            // and keeps the real project untouched.
            std::fs::write(
                scratch.join("go.mod"),
                format!("module gorisk.scratch/materialize\n\ngo 1.21\n\nrequire {module} {version}\n"),
            )?;
            let spec = format!("{module}@{version}");
            let out = runner.run("go", &["mod", "download", "-json", &spec], scratch, timeout)?;
            if !out.ok() && out.stdout.trim().is_empty() {
                return Err(GoriskError::external(format!(
                    "go mod download failed: {}",
                    out.stderr.trim()
                )));
            }
            let info: GoDownloadInfo = serde_json::from_str(out.stdout.trim()).map_err(|e| {
                GoriskError::external(format!("go mod download output unparsable: {e}"))
            })?;
            if let Some(err) = info.error {
                return Err(GoriskError::external(err));
            }
            info.dir
                .map(PathBuf::from)
                .ok_or_else(|| GoriskError::external("go mod download returned no Dir"))
        }
        Language::JavaScript => {
            std::fs::write(
                scratch.join("package.json"),
                serde_json::to_string_pretty(&serde_json::json!({
                    "name": "gorisk-scratch",
                    "private": true,
                    "dependencies": { module: version }
                }))?,
            )?;
            let out = runner.run(
                "npm",
                &["install", "--ignore-scripts", "--no-audit", "--no-fund"],
                scratch,
                timeout,
            )?;
            if !out.ok() {
                return Err(GoriskError::external(format!(
                    "npm install failed: {}",
                    out.stderr.trim()
                )));
            }
            let dir = scratch.join("node_modules").join(module);
            dir.is_dir().then_some(dir).ok_or_else(|| {
                GoriskError::external(format!("npm did not install {module}@{version}"))
            })
        }
    }
}

/// Direct dependencies declared by a materialized module.
pub fn module_deps(language: Language, dir: &Path) -> Vec<String> {
    match language {
        Language::Go => {
            let Ok(content) = std::fs::read_to_string(dir.join("go.mod")) else {
                return Vec::new();
            };
            let mut deps = Vec::new();
            let mut in_block = false;
            for line in content.lines() {
                let line = line.trim();
                if line.starts_with("require (") {
                    in_block = true;
                } else if in_block && line.starts_with(')') {
                    in_block = false;
                } else if in_block || line.starts_with("require ") {
                    let body = line.strip_prefix("require ").unwrap_or(line);
                    if let Some(path) = body.split_whitespace().next() {
                        if path.contains('.') || path.contains('/') {
                            deps.push(path.to_string());
                        }
                    }
                }
            }
            deps.sort_unstable();
            deps.dedup();
            deps
        }
        Language::JavaScript => {
            #[derive(Deserialize)]
            struct Manifest {
                #[serde(default)]
                dependencies: std::collections::BTreeMap<String, String>,
            }
            std::fs::read_to_string(dir.join("package.json"))
                .ok()
                .and_then(|c| serde_json::from_str::<Manifest>(&c).ok())
                .map(|m| m.dependencies.into_keys().collect())
                .unwrap_or_default()
        }
    }
}

/// Fake runner for tests: pre-seeded directories, no subprocesses.
pub struct FakeRunner {
    /// `(module, version)` → source dir to report.
    pub fixtures: std::collections::BTreeMap<(String, String), PathBuf>,
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        _timeout: Duration,
    ) -> Result<CommandOutput> {
        match program {
            "go" => {
                // args: mod download -json module@version
                let spec = args.last().copied().unwrap_or_default();
                let (module, version) = spec.split_once('@').unwrap_or((spec, ""));
                match self.fixtures.get(&(module.to_string(), version.to_string())) {
                    Some(dir) => Ok(CommandOutput {
                        status: 0,
                        stdout: format!("{{\"Dir\": \"{}\"}}", dir.display()),
                        stderr: String::new(),
                    }),
                    None => Ok(CommandOutput {
                        status: 1,
                        stdout: format!(
                            "{{\"Error\": \"module {module}@{version} not in fixture set\"}}"
                        ),
                        stderr: String::new(),
                    }),
                }
            }
            "npm" => {
                // Copy the fixture into the scratch node_modules layout.
                for ((module, _), src) in &self.fixtures {
                    let dest = cwd.join("node_modules").join(module);
                    copy_tree(src, &dest)?;
                }
                Ok(CommandOutput {
                    status: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
            other => Err(GoriskError::external(format!("unexpected command {other}"))),
        }
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(|e| GoriskError::external(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| GoriskError::external(e.to_string()))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_runner_materializes_go() {
        let fixture = tempfile::tempdir().unwrap();
        std::fs::write(fixture.path().join("lib.go"), "package lib\n").unwrap();

        let mut fixtures = std::collections::BTreeMap::new();
        fixtures.insert(
            ("example.com/lib".to_string(), "v1.0.0".to_string()),
            fixture.path().to_path_buf(),
        );
        let runner = FakeRunner { fixtures };

        let scratch = tempfile::tempdir().unwrap();
        let dir = materialize(
            &runner,
            Language::Go,
            "example.com/lib",
            "v1.0.0",
            scratch.path(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(dir, fixture.path());
        // synthesized manifest exists
        assert!(scratch.path().join("go.mod").is_file());
    }

    #[test]
    fn test_unknown_version_fails() {
        let runner = FakeRunner {
            fixtures: Default::default(),
        };
        let scratch = tempfile::tempdir().unwrap();
        let result = materialize(
            &runner,
            Language::Go,
            "example.com/lib",
            "v9.9.9",
            scratch.path(),
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_go_module_deps() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("go.mod"),
            "module m\n\nrequire (\n\tgithub.com/a/b v1.0.0\n)\nrequire github.com/c/d v2.0.0\n",
        )
        .unwrap();
        assert_eq!(
            module_deps(Language::Go, tmp.path()),
            vec!["github.com/a/b", "github.com/c/d"]
        );
    }
}

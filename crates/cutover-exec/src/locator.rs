//! Tool resolution and capability probing.

use crate::config::ExecConfig;
use crate::error::{ExecError, Result};
use crate::process::ManagedProcess;
use crate::spec::ProcessSpec;
use serde::Serialize;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A tool a workflow needs before it starts any batch work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequirement {
    /// Logical name, also the file stem searched on the path.
    pub name: String,
    /// Command-line option that supplies an explicit path, named in the
    /// not-found message.
    pub option_hint: String,
    /// Explicit path given by the user, if any.
    pub supplied_path: Option<PathBuf>,
    /// Side-effect-free arguments that must exit 0 for the tool to count
    /// as supported.
    pub capability_probe: Option<Vec<String>>,
}

impl ToolRequirement {
    /// Require `name`, suggesting `option_hint` when it cannot be found.
    #[must_use]
    pub fn new(name: impl Into<String>, option_hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            option_hint: option_hint.into(),
            supplied_path: None,
            capability_probe: None,
        }
    }

    /// Prefer an explicit path over the search path.
    #[must_use]
    pub fn with_supplied_path(mut self, path: Option<PathBuf>) -> Self {
        self.supplied_path = path;
        self
    }

    /// Require the tool to accept these arguments.
    #[must_use]
    pub fn with_capability_probe<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capability_probe = Some(args.into_iter().map(Into::into).collect());
        self
    }
}

/// A tool that was found, and whether it passed its capability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTool {
    /// Logical name.
    pub name: String,
    /// Absolute path of the executable.
    pub path: PathBuf,
    /// `false` only when a capability probe ran and failed.
    pub supported: bool,
}

/// Resolves tool names to executable files.
#[derive(Debug, Clone, Default)]
pub struct ExecutableLocator {
    search_path: Option<OsString>,
}

impl ExecutableLocator {
    /// Search the directories of the `PATH` environment variable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            search_path: env::var_os("PATH"),
        }
    }

    /// Search an explicit path list (same syntax as `PATH`).
    #[must_use]
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    /// Resolve `tool` to an executable file.
    ///
    /// An existing `supplied` file is returned made absolute against the
    /// working directory. Otherwise every absolute search directory is
    /// tried in order for `tool` plus the platform's executable suffix;
    /// relative entries are skipped. `None` is a normal outcome.
    #[must_use]
    pub fn resolve(&self, supplied: Option<&Path>, tool: &str) -> Option<PathBuf> {
        if let Some(path) = supplied {
            if path.is_file() {
                match std::path::absolute(path) {
                    Ok(absolute) => return Some(absolute),
                    Err(e) => warn!(tool, path = %path.display(), error = %e, "cannot make supplied path absolute"),
                }
            } else {
                debug!(tool, path = %path.display(), "supplied path is not a file, searching PATH");
            }
        }

        let file_name = format!("{tool}{}", env::consts::EXE_SUFFIX);
        let dirs = self.search_path.as_ref()?;
        env::split_paths(dirs)
            .filter(|dir| {
                let absolute = dir.is_absolute();
                if !absolute && !dir.as_os_str().is_empty() {
                    debug!(tool, dir = %dir.display(), "skipping relative search directory");
                }
                absolute
            })
            .map(|dir| dir.join(&file_name))
            .find(|candidate| is_executable(candidate))
    }

    /// Run `path` once with `probe_args` under the probe ceiling and report
    /// whether it exited 0. Start failures and timeouts count as
    /// unsupported.
    pub async fn is_supported(path: &Path, probe_args: &[String], config: &ExecConfig) -> bool {
        let spec = ProcessSpec::new(path).args(probe_args.iter().cloned());
        match ManagedProcess::run(spec, config.for_probe()).await {
            Ok(result) => {
                debug!(
                    path = %path.display(),
                    exit_code = result.exit_code(),
                    timed_out = result.timed_out(),
                    "capability probe finished"
                );
                result.success()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "capability probe could not run");
                false
            }
        }
    }

    /// Resolve and probe a requirement.
    ///
    /// # Errors
    ///
    /// - [`ExecError::ToolNotFound`] if nothing matches
    /// - [`ExecError::ToolUnsupported`] if the capability probe fails
    pub async fn require(
        &self,
        requirement: &ToolRequirement,
        config: &ExecConfig,
    ) -> Result<ResolvedTool> {
        let resolved = self.check(requirement, config).await?;
        if !resolved.supported {
            let probe = requirement
                .capability_probe
                .as_deref()
                .map(|args| args.join(" "))
                .unwrap_or_default();
            return Err(ExecError::tool_unsupported(
                &resolved.name,
                resolved.path,
                format!("'{probe}' is not supported; upgrade the tool"),
            ));
        }
        Ok(resolved)
    }

    /// Like [`require`](Self::require) but reports an unsupported tool as
    /// `supported: false` instead of failing.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::ToolNotFound`] if nothing matches.
    pub async fn check(
        &self,
        requirement: &ToolRequirement,
        config: &ExecConfig,
    ) -> Result<ResolvedTool> {
        let path = self
            .resolve(requirement.supplied_path.as_deref(), &requirement.name)
            .ok_or_else(|| ExecError::tool_not_found(&requirement.name, &requirement.option_hint))?;

        let supported = match &requirement.capability_probe {
            Some(args) => Self::is_supported(&path, args, config).await,
            None => true,
        };
        info!(tool = %requirement.name, path = %path.display(), supported, "resolved tool");

        Ok(ResolvedTool {
            name: requirement.name.clone(),
            path,
            supported,
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

//! Tool resolution report.

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, write_footer, write_header};
use crate::settings::Context;

/// Handler for the tools command.
pub struct ToolsCommand<'a> {
    context: &'a Context,
}

impl<'a> ToolsCommand<'a> {
    /// Creates a new tools command handler.
    #[must_use]
    pub const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Resolves every tool and prints where it was found. A missing tool
    /// is a row, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if writing the output fails.
    pub async fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let requirements = [
            self.context.dig(),
            self.context.curl(true),
            self.context.kubectl(),
            self.context.oc(),
            self.context.mongo(),
        ];

        let mut tools = Vec::with_capacity(requirements.len());
        for requirement in &requirements {
            let status = match self.context.check(requirement).await {
                Ok(resolved) => ToolStatus {
                    name: resolved.name,
                    path: Some(resolved.path),
                    state: if resolved.supported {
                        ToolState::Ok
                    } else {
                        ToolState::Unsupported
                    },
                },
                Err(e) => {
                    warn!(tool = %requirement.name, error = %e, "tool not resolved");
                    ToolStatus {
                        name: requirement.name.clone(),
                        path: None,
                        state: ToolState::NotFound,
                    }
                }
            };
            tools.push(status);
        }

        format.write(out, &ToolReport { tools })
    }
}

/// Resolution state of one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    /// Found and passed its capability probe.
    Ok,
    /// Found but failed its capability probe.
    Unsupported,
    /// Not found.
    NotFound,
}

impl ToolState {
    const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unsupported => "unsupported",
            Self::NotFound => "not found",
        }
    }
}

/// One tool row.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    /// Tool name.
    pub name: String,
    /// Resolved path.
    pub path: Option<PathBuf>,
    /// Resolution state.
    pub state: ToolState,
}

/// All tool rows.
#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    /// Rows in check order.
    pub tools: Vec<ToolStatus>,
}

impl TableDisplay for ToolReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write_header(writer, &format!("{:<10} {:<12} {}", "TOOL", "STATUS", "PATH"))?;
        for tool in &self.tools {
            let path = tool
                .path
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string());
            writeln!(writer, "{:<10} {:<12} {}", tool.name, tool.state.label(), path)?;
        }
        let ready = self.tools.iter().filter(|t| t.state == ToolState::Ok).count();
        write_footer(writer, &format!("Ready: {ready}/{}", self.tools.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::cli::Format;
    use cutover_exec::ExecutableLocator;

    #[tokio::test]
    async fn test_missing_tools_are_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let context = Context::with_locator(Settings::default(), ExecutableLocator::with_search_path(dir.path()));

        let mut buf = Vec::new();
        ToolsCommand::new(&context)
            .execute(&mut buf, &OutputFormat::new(Format::Table))
            .await
            .expect("execute");
        let out = String::from_utf8(buf).expect("utf8");

        assert!(out.starts_with("TOOL"));
        assert_eq!(out.matches("not found").count(), 5);
        assert!(out.contains("Ready: 0/5"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_found_tool_json() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let dig = dir.path().join("dig");
        std::fs::write(&dig, "#!/bin/sh\nexit 0\n").expect("write");
        std::fs::set_permissions(&dig, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        let context = Context::with_locator(Settings::default(), ExecutableLocator::with_search_path(dir.path()));

        let mut buf = Vec::new();
        ToolsCommand::new(&context)
            .execute(&mut buf, &OutputFormat::new(Format::Json))
            .await
            .expect("execute");
        let report: serde_json::Value = serde_json::from_slice(&buf).expect("json");

        assert_eq!(report["tools"][0]["name"], "dig");
        assert_eq!(report["tools"][0]["state"], "ok");
        assert_eq!(report["tools"][1]["state"], "not_found");
    }
}

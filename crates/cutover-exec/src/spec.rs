//! Process specifications.
//!
//! A [`ProcessSpec`] is the immutable description of one child process:
//! executable, argument vector and working directory. Arguments are
//! validated as they are added; the first rejection is reported when the
//! spec is handed to a [`ManagedProcess`](crate::ManagedProcess).
//!
//! No shell is ever involved. An argument string such as
//! `--kubeconfig "C:\My Configs\kube" get pods` is split by
//! [`parse_arguments`] into a vector before spawning.

use crate::error::{ExecError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Characters that are never allowed in arguments.
const FORBIDDEN_CHARS: &[char] = &['\0', '\n', '\r'];

/// Validate a single argument.
///
/// # Errors
///
/// Returns [`ExecError::InvalidArgument`] for NUL, CR or LF.
pub fn validate_argument(arg: &str) -> Result<()> {
    if let Some(c) = arg.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(ExecError::invalid_argument(
            arg,
            format!("contains forbidden character {c:?}"),
        ));
    }
    Ok(())
}

/// Split an argument string into an argument vector.
///
/// Whitespace separates arguments; double quotes group text (including
/// whitespace) into one argument and are removed; `\"` yields a literal
/// quote. An unterminated quote runs to the end of the input.
#[must_use]
pub fn parse_arguments(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
                has_token = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if has_token {
        args.push(current);
    }
    args
}

/// Immutable description of a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    rejected: Option<(String, String)>,
}

impl ProcessSpec {
    /// Create a spec for the given executable with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            rejected: None,
        }
    }

    /// Create a spec from an executable and an argument string.
    #[must_use]
    pub fn from_command_line(program: impl Into<PathBuf>, arguments: &str) -> Self {
        Self::new(program).args(parse_arguments(arguments))
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        let arg = arg.into();
        match validate_argument(&arg) {
            Ok(()) => self.args.push(arg),
            Err(ExecError::InvalidArgument { argument, reason }) => {
                self.rejected.get_or_insert((argument, reason));
            }
            Err(_) => {}
        }
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(self, |spec, arg| spec.arg(arg))
    }

    /// Run the process in the given directory instead of the current one.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Executable path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Argument vector.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Working directory, `None` meaning the parent's.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Check that every argument was accepted.
    ///
    /// # Errors
    ///
    /// Returns the first rejected argument.
    pub fn validate(&self) -> Result<()> {
        match &self.rejected {
            Some((argument, reason)) => Err(ExecError::invalid_argument(argument, reason)),
            None => Ok(()),
        }
    }

    /// Human-readable command line for logs and error messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

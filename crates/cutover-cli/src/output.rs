//! Report rendering.
//!
//! Every command builds one report value and hands it to [`OutputFormat`]:
//! `--format json` serializes it as pretty JSON, `--format table` lets the
//! report lay itself out through [`TableDisplay`]. Tables share one shape,
//! a header row underlined with a rule, the rows, then a blank line and a
//! one-line summary.

use std::io::Write;

use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

const RULE: char = '─';

/// The `--format` chosen for this run.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Render reports as `format`.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Render `report` to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Format`] if the report does not serialize and
    /// [`CliError::Io`] if the writer fails.
    pub fn write<W, R>(&self, writer: &mut W, report: &R) -> Result<(), CliError>
    where
        W: Write,
        R: Serialize + TableDisplay,
    {
        match self.format {
            Format::Table => report.write_table(writer),
            Format::Json => write_json(writer, report),
        }
    }
}

/// A report with a human-readable layout.
pub trait TableDisplay {
    /// Lay the report out as text.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

fn write_json<W: Write, R: Serialize>(writer: &mut W, report: &R) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *writer, report).map_err(|e| CliError::Format(e.to_string()))?;
    writeln!(writer)?;
    Ok(())
}

/// Column header underlined to its visible width.
pub(crate) fn write_header<W: Write>(writer: &mut W, header: &str) -> Result<(), CliError> {
    let width = header.trim_end().chars().count();
    writeln!(writer, "{header}")?;
    writeln!(writer, "{}", RULE.to_string().repeat(width))?;
    Ok(())
}

/// Summary line after the rows, set off by a blank line.
pub(crate) fn write_footer<W: Write>(writer: &mut W, summary: &str) -> Result<(), CliError> {
    writeln!(writer)?;
    writeln!(writer, "{summary}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct HostCheck {
        host: String,
        up: bool,
    }

    impl TableDisplay for HostCheck {
        fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
            write_header(writer, &format!("{:<12} {}", "HOST", "UP"))?;
            writeln!(writer, "{:<12} {}", self.host, self.up)?;
            write_footer(writer, &format!("Up: {}/1", u8::from(self.up)))
        }
    }

    fn render(format: Format) -> String {
        let report = HostCheck {
            host: "shop.example".into(),
            up: true,
        };
        let mut buf = Vec::new();
        OutputFormat::new(format).write(&mut buf, &report).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn test_json_is_the_serialized_report() {
        let value: serde_json::Value = serde_json::from_str(&render(Format::Json)).expect("json");
        assert_eq!(value, serde_json::json!({"host": "shop.example", "up": true}));
    }

    #[test]
    fn test_table_rule_matches_header_width() {
        let out = render(Format::Table);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "HOST         UP");
        assert_eq!(lines[1].chars().count(), lines[0].len());
        assert!(lines[1].chars().all(|c| c == RULE));
        assert_eq!(lines[2], "shop.example true");
        assert_eq!(&lines[3..], ["", "Up: 1/1"]);
    }
}

//! Secret inspection command.

use std::io::Write;

use cutover_extract::truncate_display;
use serde::Serialize;

use crate::cli::SecretArgs;
use crate::client::KubectlClient;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, write_footer, write_header};
use crate::settings::Context;

/// Shown instead of a value unless values were asked for.
pub const MASK: &str = "***";

/// Handler for the secret command.
pub struct SecretCommand<'a> {
    context: &'a Context,
}

impl<'a> SecretCommand<'a> {
    /// Creates a new secret command handler.
    #[must_use]
    pub const fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Fetches, decodes and prints one secret.
    ///
    /// # Errors
    ///
    /// Returns error if `kubectl` is missing, the secret cannot be read, or
    /// output fails.
    pub async fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat, args: &SecretArgs) -> Result<(), CliError> {
        let kubectl = self.context.require(&self.context.kubectl()).await?;
        let client = KubectlClient::new(kubectl.path, args.namespace.as_str(), self.context.exec)
            .with_kubeconfig(self.context.tools.kubeconfig.clone());

        let payload = client.secret(&args.name).await?;
        let entries = payload
            .iter()
            .map(|(key, value)| SecretEntry {
                key: key.to_string(),
                value: if args.show_values { value.to_string() } else { MASK.to_string() },
            })
            .collect();

        let view = SecretView {
            name: args.name.clone(),
            namespace: args.namespace.clone(),
            entries,
        };
        format.write(out, &view)
    }
}

/// One decoded key.
#[derive(Debug, Clone, Serialize)]
pub struct SecretEntry {
    /// Key.
    pub key: String,
    /// Decoded or masked value.
    pub value: String,
}

/// A decoded secret.
#[derive(Debug, Clone, Serialize)]
pub struct SecretView {
    /// Secret name.
    pub name: String,
    /// Namespace.
    pub namespace: String,
    /// Keys in sorted order.
    pub entries: Vec<SecretEntry>,
}

impl TableDisplay for SecretView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Secret: {} (namespace {})", self.name, self.namespace)?;
        writeln!(writer)?;
        write_header(writer, &format!("{:<32} {}", "KEY", "VALUE"))?;
        for entry in &self.entries {
            writeln!(writer, "{:<32} {}", truncate_display(&entry.key, 32), entry.value)?;
        }
        write_footer(writer, &format!("Total: {} keys", self.entries.len()))
    }
}

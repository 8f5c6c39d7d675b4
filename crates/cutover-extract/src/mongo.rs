//! Records read from the `mongo` shell.

use crate::classify::MONGO_SHELL;
use crate::error::Result;
use crate::eval::{parse_int, parse_json, parse_string_list};
use crate::secret::SecretPayload;
use serde::{Deserialize, Serialize};

/// Databases the server creates for itself.
pub const INTERNAL_DATABASES: &[&str] = &["admin", "local", "config"];

/// Secret key holding the application user name.
pub const USER_KEY: &str = "MONGODB_USER";
/// Secret key holding the application user password.
pub const PASSWORD_KEY: &str = "MONGODB_PASSWORD";
/// Secret key holding the admin password.
pub const ADMIN_PASSWORD_KEY: &str = "MONGODB_ADMIN_PASSWORD";

/// Whether `database` is one of [`INTERNAL_DATABASES`].
#[must_use]
pub fn is_internal_database(database: &str) -> bool {
    INTERNAL_DATABASES.contains(&database)
}

/// Credentials for one database deployment.
#[derive(Clone, PartialEq, Eq)]
pub struct MongoSecret {
    /// Application user.
    pub username: String,
    /// Application password.
    pub password: String,
    /// Password of the `admin` user.
    pub admin_password: String,
}

impl std::fmt::Debug for MongoSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoSecret")
            .field("username", &self.username)
            .field("password", &"***")
            .field("admin_password", &"***")
            .finish()
    }
}

impl MongoSecret {
    /// Read the credentials from a decoded secret.
    ///
    /// # Errors
    ///
    /// [`ExtractError::Extraction`](crate::ExtractError::Extraction) if a
    /// key is missing.
    pub fn from_payload(payload: &SecretPayload) -> Result<Self> {
        Ok(Self {
            username: payload.require(USER_KEY)?.to_string(),
            password: payload.require(PASSWORD_KEY)?.to_string(),
            admin_password: payload.require(ADMIN_PASSWORD_KEY)?.to_string(),
        })
    }
}

/// `db.isMaster()` replica set view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoClusterInfo {
    /// Replica set name.
    #[serde(rename = "setName")]
    pub set_name: String,
    /// Whether the connected member is primary.
    #[serde(rename = "ismaster")]
    pub is_master: bool,
    /// Address of the primary.
    pub primary: String,
    /// Address of the connected member.
    pub me: String,
    /// Members of the set.
    pub hosts: Vec<String>,
}

/// Size figures for one collection, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStatistics {
    /// BSON size of one sample document.
    pub document_size: i64,
    /// `collection_size / document_count`, `0` for an empty collection.
    pub average_document_size: i64,
    /// Data size of the collection.
    pub collection_size: i64,
}

impl CollectionStatistics {
    /// Combine the three scalar eval outputs.
    ///
    /// # Errors
    ///
    /// Remote errors from the markers, or extraction errors for
    /// non-integer output.
    pub fn from_outputs(document_size: &str, document_count: &str, collection_size: &str) -> Result<Self> {
        let document_size = parse_shell_int(document_size)?;
        let document_count = parse_shell_int(document_count)?;
        let collection_size = parse_shell_int(collection_size)?;
        let average_document_size = if document_count == 0 {
            0
        } else {
            collection_size / document_count
        };

        Ok(Self {
            document_size,
            average_document_size,
            collection_size,
        })
    }
}

/// Classify, then parse a scalar integer.
///
/// # Errors
///
/// Remote errors from the shell markers, or extraction errors.
pub fn parse_shell_int(output: &str) -> Result<i64> {
    MONGO_SHELL.check(output)?;
    parse_int(output)
}

/// Classify, then parse a JSON string list.
///
/// # Errors
///
/// Remote errors from the shell markers, or JSON errors.
pub fn parse_shell_list(output: &str) -> Result<Vec<String>> {
    MONGO_SHELL.check(output)?;
    parse_string_list(output)
}

/// Classify, then parse replica set information.
///
/// # Errors
///
/// Remote errors from the shell markers, or JSON errors.
pub fn parse_cluster_info(output: &str) -> Result<MongoClusterInfo> {
    MONGO_SHELL.check(output)?;
    parse_json(output)
}

/// Non-internal database names, in shell order.
#[must_use]
pub fn user_databases(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !is_internal_database(name))
        .collect()
}

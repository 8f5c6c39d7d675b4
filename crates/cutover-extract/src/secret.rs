//! Cluster secret payloads (`kubectl get secret -o json`).

use crate::error::{ExtractError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Deserialize)]
struct SecretDocument {
    #[serde(default)]
    data: Option<BTreeMap<String, String>>,
}

/// Decoded secret values by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SecretPayload {
    values: BTreeMap<String, String>,
}

impl SecretPayload {
    /// Parse the JSON secret object and base64-decode every `data` value.
    ///
    /// A missing or `null` `data` field is an empty secret.
    ///
    /// # Errors
    ///
    /// [`ExtractError::Json`] for malformed JSON, [`ExtractError::Decode`]
    /// for a value that is not base64.
    pub fn from_json(output: &str) -> Result<Self> {
        let document: SecretDocument = serde_json::from_str(output)?;
        let values = document
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, encoded)| {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| ExtractError::decode(&key, e))?;
                Ok((key, String::from_utf8_lossy(&bytes).into_owned()))
            })
            .collect::<Result<_>>()?;

        Ok(Self { values })
    }

    /// Decoded value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Decoded value for `key`, failing when absent.
    ///
    /// # Errors
    ///
    /// [`ExtractError::Extraction`] naming the missing key.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| ExtractError::extraction(format!("secret key '{key}'"), "key not present"))
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the secret has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys and decoded values, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for SecretPayload {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

//! Credential resolution for storage backends

use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Structured credential record handed to a backend connector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials {
    fields: BTreeMap<String, Value>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value of `key`, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Resolves the credentials a store connects with.
///
/// `Ok(None)` means anonymous access; failures are reported as
/// [`StoreError::Authentication`].
pub trait CredentialProvider: Send + Sync {
    fn resolve(&self) -> Result<Option<Credentials>, StoreError>;
}

/// Anonymous access
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousCredentials;

impl CredentialProvider for AnonymousCredentials {
    fn resolve(&self) -> Result<Option<Credentials>, StoreError> {
        Ok(None)
    }
}

/// Credentials known up front
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
    fn resolve(&self) -> Result<Option<Credentials>, StoreError> {
        Ok(Some(self.0.clone()))
    }
}

/// Reads credentials from a YAML or JSON file
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    path: PathBuf,
    required: bool,
}

impl FileCredentialProvider {
    /// Provider for `path`; a missing file is an authentication error
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }

    /// Provider that falls back to anonymous access when the file is missing
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }

    /// `<config dir>/pipeline-launch/credentials.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pipeline-launch").join("credentials.yaml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn resolve(&self) -> Result<Option<Credentials>, StoreError> {
        if !self.path.exists() {
            if self.required {
                return Err(StoreError::Authentication(format!(
                    "credentials file {} does not exist",
                    self.path.display()
                )));
            }
            debug!("No credentials file at {}, using anonymous access", self.path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            StoreError::Authentication(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let credentials: Credentials = serde_yaml::from_str(&content).map_err(|e| {
            StoreError::Authentication(format!("invalid credentials in {}: {}", self.path.display(), e))
        })?;

        debug!("Loaded credentials from {}", self.path.display());
        Ok(Some(credentials))
    }
}

//! Plugin manifest input
//!
//! The installer hands the validator a parsed manifest. Only `name` and
//! `version` are required; the declared `permissions` block reuses the
//! typed capability shapes so the mapping into a [`PermissionSet`] is
//! lossless, and a fully absent block means "requests nothing".

use crate::permissions::PermissionSet;
use serde::Deserialize;
use thiserror::Error;

/// Manifest parsing errors
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest parse error: {0}")]
    Parse(String),
}

/// Declared plugin metadata and permission request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Entry point of the plugin's code unit, relative to its root
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub permissions: Option<PermissionSet>,
}

impl PluginManifest {
    /// Parse a manifest from its JSON source
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// The declared permission request; absent blocks yield the empty set
    pub fn requested_permissions(&self) -> PermissionSet {
        self.permissions.clone().unwrap_or_default()
    }
}

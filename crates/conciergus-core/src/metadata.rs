//! Plugin identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, PluginResult};

/// Author of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Author {
    /// Display name. Must be non-empty.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Author {
    /// Creates an author with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Immutable identity of a plugin.
///
/// `id` is the registry key and must be unique among registered plugins.
/// `name`, `version` and `author.name` must be non-empty; a plugin failing
/// [`validate`](Self::validate) is rejected before any side effect occurs.
///
/// # Example
///
/// ```rust
/// use conciergus_core::{Author, PluginMetadata};
///
/// let meta = PluginMetadata::new("profanity-filter", "Profanity Filter", "1.2.0", Author::new("Ada"))
///     .with_description("Masks profanity in incoming messages")
///     .with_keywords(["moderation"]);
/// assert!(meta.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PluginMetadata {
    pub id: String,
    pub name: String,
    /// Semver version string.
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub author: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Lowest host version this plugin runs on (semver).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_required_host_version: Option<String>,
    /// Plugin id → version requirement.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PluginMetadata {
    /// Creates metadata with the required fields; everything else is empty.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        author: Author,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            author,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_host_version(mut self, version: impl Into<String>) -> Self {
        self.min_required_host_version = Some(version.into());
        self
    }

    /// Declares a dependency on another plugin id.
    pub fn with_dependency(
        mut self,
        id: impl Into<String>,
        requirement: impl Into<String>,
    ) -> Self {
        self.dependencies.insert(id.into(), requirement.into());
        self
    }

    /// Checks the required-field invariants.
    ///
    /// Fields are checked in declaration order and the first violation is
    /// returned.
    pub fn validate(&self) -> PluginResult<()> {
        let required = [
            ("id", &self.id),
            ("name", &self.name),
            ("version", &self.version),
            ("author.name", &self.author.name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PluginError::validation(field, "must be a non-empty string"));
            }
        }
        Ok(())
    }
}

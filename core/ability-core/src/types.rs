//! Identity and descriptor types shared across the framework.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The declared kind of an ability. Drives kind-specific lifecycle behavior
/// (Data abilities skip the Inactive/Background states entirely).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    Page,
    Service,
    Data,
    #[serde(other)]
    Unknown,
}

impl AbilityKind {
    pub fn is_data(self) -> bool {
        matches!(self, AbilityKind::Data)
    }
}

/// Static description of one ability, as declared in the bundle manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityInfo {
    pub name: String,
    pub bundle_name: String,
    pub kind: AbilityKind,
    /// The `dataability://` locator served by a Data ability, if any.
    #[serde(default)]
    pub uri: Option<String>,
}

/// Static description of the hosting application bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub bundle_name: String,
    pub data_dir: PathBuf,
}

/// Opaque identity handed out by the ability manager service. One token
/// names one hosted ability instance for the lifetime of its record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Token(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token(value)
    }
}

/// Opaque connection handle returned by a Service ability's `on_connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteObject(u64);

impl RemoteObject {
    pub fn new(id: u64) -> Self {
        RemoteObject(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

//! The intent payload delivered with lifecycle transitions.

use crate::pac_map::PacMap;
use serde::{Deserialize, Serialize};

/// Parameter key carrying the permission names of a permission-grant result.
pub const PARAM_REQUESTED_PERMISSIONS: &str = "ohos.user.grant.permission";
/// Parameter key carrying the grant results matching the permission names.
pub const PARAM_PERMISSION_GRANT_RESULTS: &str = "ohos.user.grant.permission.result";

/// Fully-qualified target of a want.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementName {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub bundle_name: String,
    #[serde(default)]
    pub ability_name: String,
}

impl ElementName {
    pub fn new(
        device_id: impl Into<String>,
        bundle_name: impl Into<String>,
        ability_name: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            bundle_name: bundle_name.into(),
            ability_name: ability_name.into(),
        }
    }
}

/// The request payload a caller hands the framework when starting, resuming,
/// or connecting to an ability. All fields are optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Want {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub element: Option<ElementName>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub params: PacMap,
}

impl Want {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_element(mut self, element: ElementName) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn add_entity(mut self, entity: impl Into<String>) -> Self {
        self.entities.push(entity.into());
        self
    }
}

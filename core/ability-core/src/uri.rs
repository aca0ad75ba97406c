//! Locators for data abilities.
//!
//! Data abilities are addressed with `dataability://device_id/provider/path`
//! URIs; the device id (authority) is empty for the local device, giving the
//! common `dataability:///provider` triple-slash form.

use crate::error::{AbilityError, Result};
use std::fmt;

pub const DATA_ABILITY_SCHEME: &str = "dataability";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    scheme: String,
    authority: String,
    path: String,
}

impl Uri {
    /// Parses `scheme://authority/path`. The authority may be empty; the
    /// path keeps its leading slash.
    pub fn parse(input: &str) -> Result<Uri> {
        let trimmed = input.trim();
        let (scheme, rest) = trimmed.split_once("://").ok_or_else(|| {
            AbilityError::InvalidUri {
                uri: input.to_string(),
                reason: "missing '://' separator".to_string(),
            }
        })?;
        if scheme.is_empty() {
            return Err(AbilityError::InvalidUri {
                uri: input.to_string(),
                reason: "empty scheme".to_string(),
            });
        }
        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, ""),
        };
        if authority.is_empty() && path.is_empty() {
            return Err(AbilityError::InvalidUri {
                uri: input.to_string(),
                reason: "no authority or path".to_string(),
            });
        }
        Ok(Uri {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            path: path.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_data_ability(&self) -> bool {
        self.scheme == DATA_ABILITY_SCHEME
    }

    /// Whether `other` addresses this provider or something underneath it.
    pub fn covers(&self, other: &Uri) -> bool {
        self.scheme == other.scheme
            && self.authority == other.authority
            && other.path.starts_with(&self.path)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.path)
    }
}

//! Bundle manifest: which application this runtime hosts and which
//! abilities it declares.
//!
//! The manifest is TOML with one `[application]` table and any number of
//! `[[ability]]` entries. When no manifest is configured the runtime falls
//! back to the built-in demo bundle.

use ability_core::{AbilityInfo, AbilityKind, ApplicationInfo, Uri};
use fs_err as fs;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_MANIFEST_RELATIVE_PATH: &str = ".ability-runtime/bundle.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleManifest {
    pub application: ManifestApplication,
    #[serde(default, rename = "ability")]
    pub abilities: Vec<ManifestAbility>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestApplication {
    pub bundle_name: String,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestAbility {
    pub name: String,
    pub kind: AbilityKind,
    #[serde(default)]
    pub uri: Option<String>,
}

impl BundleManifest {
    pub fn application_info(&self) -> ApplicationInfo {
        let data_dir = self
            .application
            .data_dir
            .clone()
            .unwrap_or_else(|| default_data_dir(&self.application.bundle_name));
        ApplicationInfo {
            bundle_name: self.application.bundle_name.clone(),
            data_dir,
        }
    }

    pub fn ability(&self, name: &str) -> Option<AbilityInfo> {
        self.abilities
            .iter()
            .find(|ability| ability.name == name)
            .map(|ability| self.info_for(ability))
    }

    pub fn abilities(&self) -> Vec<AbilityInfo> {
        self.abilities
            .iter()
            .map(|ability| self.info_for(ability))
            .collect()
    }

    fn info_for(&self, ability: &ManifestAbility) -> AbilityInfo {
        AbilityInfo {
            name: ability.name.clone(),
            bundle_name: self.application.bundle_name.clone(),
            kind: ability.kind,
            uri: ability.uri.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.application.bundle_name.trim().is_empty() {
            return Err("Manifest bundle_name must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for ability in &self.abilities {
            if ability.name.trim().is_empty() {
                return Err("Manifest ability names must not be empty".to_string());
            }
            if !seen.insert(ability.name.as_str()) {
                return Err(format!("Duplicate ability name: {}", ability.name));
            }
            if ability.kind == AbilityKind::Unknown {
                return Err(format!("Ability {} has an unsupported kind", ability.name));
            }
            if ability.kind == AbilityKind::Data {
                let raw = ability
                    .uri
                    .as_deref()
                    .ok_or_else(|| format!("Data ability {} needs a uri", ability.name))?;
                let uri = Uri::parse(raw)
                    .map_err(|err| format!("Data ability {}: {}", ability.name, err))?;
                if !uri.is_data_ability() {
                    return Err(format!(
                        "Data ability {} must use the dataability scheme",
                        ability.name
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Loads the manifest at `path`, or the default one under the home
/// directory. A missing default manifest selects the demo bundle; a missing
/// explicit path is an error.
pub fn load_manifest(path: Option<&Path>) -> Result<BundleManifest, String> {
    match path {
        Some(path) => read_manifest(path),
        None => {
            let path = default_manifest_path()?;
            if !path.exists() {
                info!("No bundle manifest found; hosting the demo bundle");
                return Ok(crate::demo::demo_manifest());
            }
            read_manifest(&path)
        }
    }
}

fn read_manifest(path: &Path) -> Result<BundleManifest, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read bundle manifest: {}", err))?;
    let manifest: BundleManifest =
        toml::from_str(&raw).map_err(|err| format!("Failed to parse bundle manifest: {}", err))?;
    manifest.validate()?;
    Ok(manifest)
}

fn default_manifest_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(DEFAULT_MANIFEST_RELATIVE_PATH))
}

fn default_data_dir(bundle_name: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".ability-runtime")
        .join("data")
        .join(bundle_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [application]
        bundle_name = "com.example.notes"

        [[ability]]
        name = "NotesMainAbility"
        kind = "page"

        [[ability]]
        name = "NotesStoreAbility"
        kind = "data"
        uri = "dataability:///com.example.notes.store"
    "#;

    #[test]
    fn parses_a_bundle_manifest() {
        let manifest: BundleManifest = toml::from_str(SAMPLE).unwrap();
        manifest.validate().unwrap();
        assert_eq!(manifest.application.bundle_name, "com.example.notes");
        assert_eq!(manifest.abilities.len(), 2);

        let info = manifest.ability("NotesStoreAbility").unwrap();
        assert_eq!(info.kind, AbilityKind::Data);
        assert_eq!(info.bundle_name, "com.example.notes");
        assert_eq!(
            info.uri.as_deref(),
            Some("dataability:///com.example.notes.store")
        );
        assert!(manifest.ability("Missing").is_none());
    }

    #[test]
    fn rejects_duplicate_ability_names() {
        let manifest: BundleManifest = toml::from_str(
            r#"
            [application]
            bundle_name = "com.example.dup"

            [[ability]]
            name = "SameName"
            kind = "page"

            [[ability]]
            name = "SameName"
            kind = "service"
        "#,
        )
        .unwrap();
        let err = manifest.validate().unwrap_err();
        assert!(err.contains("Duplicate ability name"));
    }

    #[test]
    fn data_abilities_require_a_dataability_uri() {
        let missing: BundleManifest = toml::from_str(
            r#"
            [application]
            bundle_name = "com.example.data"

            [[ability]]
            name = "Store"
            kind = "data"
        "#,
        )
        .unwrap();
        assert!(missing.validate().unwrap_err().contains("needs a uri"));

        let foreign: BundleManifest = toml::from_str(
            r#"
            [application]
            bundle_name = "com.example.data"

            [[ability]]
            name = "Store"
            kind = "data"
            uri = "https://example.com/store"
        "#,
        )
        .unwrap();
        assert!(foreign
            .validate()
            .unwrap_err()
            .contains("dataability scheme"));
    }

    #[test]
    fn unknown_manifest_keys_are_rejected() {
        let result: Result<BundleManifest, _> = toml::from_str(
            r#"
            [application]
            bundle_name = "com.example.x"
            theme = "dark"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn application_info_defaults_the_data_dir() {
        let manifest: BundleManifest = toml::from_str(SAMPLE).unwrap();
        let info = manifest.application_info();
        assert_eq!(info.bundle_name, "com.example.notes");
        assert!(info.data_dir.ends_with("com.example.notes"));
    }

    #[test]
    fn explicit_data_dir_wins() {
        let manifest: BundleManifest = toml::from_str(
            r#"
            [application]
            bundle_name = "com.example.notes"
            data_dir = "/var/lib/notes"
        "#,
        )
        .unwrap();
        assert_eq!(
            manifest.application_info().data_dir,
            PathBuf::from("/var/lib/notes")
        );
    }
}

//! TOML manifests describing towers and maps.

use serde::Deserialize;

use crate::CatalogError;

/// Manifest version understood by this crate.
pub(crate) const SUPPORTED_MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
pub(crate) struct TowerManifest {
    pub(crate) version: u32,
    pub(crate) classifier_labels: Vec<String>,
    #[serde(rename = "tower")]
    pub(crate) towers: Vec<TowerEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TowerEntry {
    pub(crate) name: String,
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) abilities: Vec<AbilityEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AbilityEntry {
    pub(crate) letter: char,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) title: Option<String>,
    pub(crate) max_level: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MapManifest {
    pub(crate) version: u32,
    #[serde(rename = "map")]
    pub(crate) maps: Vec<MapEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MapEntry {
    pub(crate) id: String,
    pub(crate) positions: Vec<PositionEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PositionEntry {
    pub(crate) id: String,
    pub(crate) x: u32,
    pub(crate) y: u32,
}

pub(crate) fn parse_towers(contents: &str) -> Result<TowerManifest, CatalogError> {
    let manifest: TowerManifest = toml::from_str(contents).map_err(|source| CatalogError::Parse {
        manifest: "towers",
        source,
    })?;
    check_version("towers", manifest.version)?;
    Ok(manifest)
}

pub(crate) fn parse_maps(contents: &str) -> Result<MapManifest, CatalogError> {
    let manifest: MapManifest = toml::from_str(contents).map_err(|source| CatalogError::Parse {
        manifest: "maps",
        source,
    })?;
    check_version("maps", manifest.version)?;
    Ok(manifest)
}

fn check_version(manifest: &'static str, found: u32) -> Result<(), CatalogError> {
    if found == SUPPORTED_MANIFEST_VERSION {
        Ok(())
    } else {
        Err(CatalogError::UnsupportedVersion { manifest, found })
    }
}

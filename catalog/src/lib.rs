#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Static reference data for the build-order engine.
//!
//! The catalog lists every buildable tower with its family, rank and ability
//! tracks, and every map with its named positions. It is loaded once from
//! versioned TOML manifests, validated, and resolved into lookup tables so the
//! tracker and the plan grammar never slice names at runtime.

mod manifest;
pub mod rules;

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use build_order_core::{AbilityLetter, MapId, PositionId, TowerCode};
use thiserror::Error;

use crate::manifest::{MapManifest, TowerManifest};

/// Classifier label reported for an empty position.
pub const NONE_LABEL: &str = "None";
/// Classifier label reported for scenery that is not a position.
pub const MAP_LABEL: &str = "Map";

const BUILTIN_TOWERS: &str = include_str!("../data/towers.toml");
const BUILTIN_MAPS: &str = include_str!("../data/maps.toml");

const TOWERS_FILE: &str = "towers.toml";
const MAPS_FILE: &str = "maps.toml";

/// Textual form used when naming towers and upgrades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Notation {
    /// Long names such as `Barr2` or `Over3`.
    Verbose,
    /// Short codes such as `p2` or `y3`.
    Compact,
}

/// Errors raised while loading the catalog manifests.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A manifest file could not be read.
    #[error("could not read catalog manifest {path}: {source}")]
    Io {
        /// Path of the manifest.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A manifest was not valid TOML for its schema.
    #[error("could not parse {manifest} manifest: {source}")]
    Parse {
        /// Manifest being parsed.
        manifest: &'static str,
        /// Underlying TOML failure.
        #[source]
        source: toml::de::Error,
    },
    /// The manifest declared a version this crate does not understand.
    #[error("unsupported {manifest} manifest version {found}")]
    UnsupportedVersion {
        /// Manifest being parsed.
        manifest: &'static str,
        /// Version found in the manifest.
        found: u32,
    },
    /// A tower code was not a family letter followed by a rank digit.
    #[error("tower '{name}' has malformed code '{code}'")]
    InvalidTowerCode {
        /// Tower name.
        name: String,
        /// Offending code.
        code: String,
    },
    /// Two towers share a name or a code.
    #[error("tower '{0}' is declared more than once")]
    DuplicateTower(String),
    /// A tower used a sentinel label as its name.
    #[error("'{0}' is reserved and cannot name a tower")]
    SentinelTower(String),
    /// An ability letter was not one of `x`, `y` or `z`.
    #[error("tower '{tower}' declares unknown ability letter '{letter}'")]
    InvalidAbilityLetter {
        /// Tower name.
        tower: String,
        /// Offending letter.
        letter: char,
    },
    /// A tower declared the same ability letter twice.
    #[error("tower '{tower}' declares ability '{letter}' more than once")]
    DuplicateSlot {
        /// Tower name.
        tower: String,
        /// Repeated letter.
        letter: AbilityLetter,
    },
    /// An ability maximum level was outside `1..=3`.
    #[error("upgrade '{upgrade}' of '{tower}' has max level {max_level}, expected 1 to 3")]
    InvalidMaxLevel {
        /// Tower name.
        tower: String,
        /// Upgrade name.
        upgrade: String,
        /// Offending maximum.
        max_level: u8,
    },
    /// An upgrade name was used twice or collides with a tower name.
    #[error("upgrade name '{0}' is not unique")]
    DuplicateUpgrade(String),
    /// A classifier label is neither a tower nor a sentinel.
    #[error("classifier label '{0}' is not a known tower")]
    UnknownLabel(String),
    /// A family letter doubles as an ability letter.
    #[error("family letter '{0}' collides with an ability letter")]
    LetterCollision(char),
    /// A map identifier was not `L<digits>`.
    #[error("malformed map identifier '{0}'")]
    InvalidMapId(String),
    /// Two maps share an identifier.
    #[error("map {0} is declared more than once")]
    DuplicateMap(MapId),
    /// A position identifier was malformed or shadows an action letter.
    #[error("map {map} has invalid position '{position}'")]
    InvalidPosition {
        /// Map containing the position.
        map: MapId,
        /// Offending identifier.
        position: String,
    },
    /// A map declared the same position twice.
    #[error("map {map} declares position {position} more than once")]
    DuplicatePosition {
        /// Map containing the position.
        map: MapId,
        /// Repeated position.
        position: PositionId,
    },
}

/// Lookup of a tower name that the catalog does not contain.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown tower '{0}'")]
pub struct UnknownTowerError(pub String);

/// Lookup of an ability track that a tower does not carry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("tower {tower} has no ability '{letter}'")]
pub struct UnknownAbilityError {
    /// Tower that was queried.
    pub tower: TowerCode,
    /// Missing track.
    pub letter: AbilityLetter,
}

/// Resolved meaning of a tower classifier label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TowerLabel {
    /// The position is empty.
    None,
    /// The region is scenery rather than a position.
    Map,
    /// A buildable tower.
    Tower(TowerCode),
}

/// Upgrade track carried by a tower.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbilitySlot {
    letter: AbilityLetter,
    name: String,
    title: Option<String>,
    max_level: u8,
}

impl AbilitySlot {
    /// Letter of the track.
    #[must_use]
    pub const fn letter(&self) -> AbilityLetter {
        self.letter
    }

    /// Four letter upgrade name, e.g. `Over`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional human readable title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Highest level the track can reach.
    #[must_use]
    pub const fn max_level(&self) -> u8 {
        self.max_level
    }

    /// Name of the upgrade at the given level in the requested notation.
    #[must_use]
    pub fn level_name(&self, level: u8, notation: Notation) -> String {
        match notation {
            Notation::Verbose => format!("{}{level}", self.name),
            Notation::Compact => format!("{}{level}", self.letter),
        }
    }
}

/// Buildable tower entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TowerKind {
    name: String,
    title: Option<String>,
    code: TowerCode,
    abilities: Vec<AbilitySlot>,
}

impl TowerKind {
    /// Classifier label and verbose name, e.g. `Barr2`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional human readable title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Family letter and rank.
    #[must_use]
    pub const fn code(&self) -> TowerCode {
        self.code
    }

    /// Ability tracks in letter order.
    #[must_use]
    pub fn abilities(&self) -> &[AbilitySlot] {
        &self.abilities
    }

    /// Ability track with the given letter.
    #[must_use]
    pub fn slot(&self, letter: AbilityLetter) -> Option<&AbilitySlot> {
        self.abilities.iter().find(|slot| slot.letter == letter)
    }

    /// Ability track with the given upgrade name, ignoring case.
    #[must_use]
    pub fn slot_named(&self, name: &str) -> Option<&AbilitySlot> {
        self.abilities
            .iter()
            .find(|slot| slot.name.eq_ignore_ascii_case(name))
    }

    /// Name of the tower in the requested notation.
    #[must_use]
    pub fn display_name(&self, notation: Notation) -> String {
        match notation {
            Notation::Verbose => self.name.clone(),
            Notation::Compact => self.code.to_string(),
        }
    }
}

/// Pixel anchor of a position on a captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelAnchor {
    /// Horizontal coordinate.
    pub x: u32,
    /// Vertical coordinate.
    pub y: u32,
}

/// Named position on a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    id: PositionId,
    anchor: PixelAnchor,
}

impl Position {
    /// Identifier of the position.
    #[must_use]
    pub const fn id(&self) -> PositionId {
        self.id
    }

    /// Pixel anchor consumed by frame extraction.
    #[must_use]
    pub const fn anchor(&self) -> PixelAnchor {
        self.anchor
    }
}

/// Map with its positions in scan order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapLayout {
    id: MapId,
    positions: Vec<Position>,
}

impl MapLayout {
    /// Identifier of the map.
    #[must_use]
    pub const fn id(&self) -> MapId {
        self.id
    }

    /// Positions in scan order.
    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Position identifiers in scan order.
    pub fn position_ids(&self) -> impl Iterator<Item = PositionId> + '_ {
        self.positions.iter().map(Position::id)
    }

    /// Looks up a position by identifier.
    #[must_use]
    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|position| position.id == id)
    }

    /// Reports whether the map has the position.
    #[must_use]
    pub fn contains(&self, id: PositionId) -> bool {
        self.position(id).is_some()
    }

    /// First `count` positions, used to recognise the map from a frame.
    #[must_use]
    pub fn probe_positions(&self, count: usize) -> &[Position] {
        &self.positions[..count.min(self.positions.len())]
    }
}

/// Tower and map reference data resolved into lookup tables.
#[derive(Clone, Debug)]
pub struct Catalog {
    towers: Vec<TowerKind>,
    by_name: HashMap<String, usize>,
    by_code: HashMap<TowerCode, usize>,
    upgrades: HashMap<String, (usize, AbilityLetter)>,
    families: HashSet<char>,
    labels: Vec<String>,
    maps: Vec<MapLayout>,
}

impl Catalog {
    /// Loads the catalog embedded in the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_TOWERS, BUILTIN_MAPS)
    }

    /// Loads `towers.toml` and `maps.toml` from a directory.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let towers = read_manifest(&dir.join(TOWERS_FILE))?;
        let maps = read_manifest(&dir.join(MAPS_FILE))?;
        Self::from_toml_str(&towers, &maps)
    }

    /// Parses and validates the tower and map manifests.
    pub fn from_toml_str(towers: &str, maps: &str) -> Result<Self, CatalogError> {
        let towers = manifest::parse_towers(towers)?;
        let maps = manifest::parse_maps(maps)?;
        let mut catalog = Self::from_tower_manifest(towers)?;
        catalog.maps = catalog.resolve_maps(maps)?;
        Ok(catalog)
    }

    fn from_tower_manifest(manifest: TowerManifest) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            towers: Vec::with_capacity(manifest.towers.len()),
            by_name: HashMap::new(),
            by_code: HashMap::new(),
            upgrades: HashMap::new(),
            families: HashSet::new(),
            labels: Vec::new(),
            maps: Vec::new(),
        };

        for entry in manifest.towers {
            let code = TowerCode::parse(&entry.code).ok_or_else(|| {
                CatalogError::InvalidTowerCode {
                    name: entry.name.clone(),
                    code: entry.code.clone(),
                }
            })?;
            if is_sentinel(&entry.name) {
                return Err(CatalogError::SentinelTower(entry.name));
            }
            if AbilityLetter::from_char(code.family()).is_some() {
                return Err(CatalogError::LetterCollision(code.family()));
            }

            let index = catalog.towers.len();
            if catalog
                .by_name
                .insert(entry.name.to_ascii_lowercase(), index)
                .is_some()
            {
                return Err(CatalogError::DuplicateTower(entry.name));
            }
            if catalog.by_code.insert(code, index).is_some() {
                return Err(CatalogError::DuplicateTower(code.to_string()));
            }
            let _ = catalog.families.insert(code.family());

            let mut abilities: Vec<AbilitySlot> = Vec::with_capacity(entry.abilities.len());
            for ability in entry.abilities {
                let letter = AbilityLetter::from_char(ability.letter).ok_or_else(|| {
                    CatalogError::InvalidAbilityLetter {
                        tower: entry.name.clone(),
                        letter: ability.letter,
                    }
                })?;
                if abilities.iter().any(|slot| slot.letter == letter) {
                    return Err(CatalogError::DuplicateSlot {
                        tower: entry.name.clone(),
                        letter,
                    });
                }
                if !(1..=3).contains(&ability.max_level) {
                    return Err(CatalogError::InvalidMaxLevel {
                        tower: entry.name.clone(),
                        upgrade: ability.name,
                        max_level: ability.max_level,
                    });
                }
                if catalog
                    .upgrades
                    .insert(ability.name.to_ascii_lowercase(), (index, letter))
                    .is_some()
                {
                    return Err(CatalogError::DuplicateUpgrade(ability.name));
                }
                abilities.push(AbilitySlot {
                    letter,
                    name: ability.name,
                    title: ability.title,
                    max_level: ability.max_level,
                });
            }
            abilities.sort_by_key(AbilitySlot::letter);

            catalog.towers.push(TowerKind {
                name: entry.name,
                title: entry.title,
                code,
                abilities,
            });
        }

        if let Some(name) = catalog
            .upgrades
            .keys()
            .find(|name| catalog.by_name.contains_key(*name))
        {
            return Err(CatalogError::DuplicateUpgrade(name.clone()));
        }

        for label in &manifest.classifier_labels {
            if catalog.resolve_label(label).is_none() {
                return Err(CatalogError::UnknownLabel(label.clone()));
            }
        }
        catalog.labels = manifest.classifier_labels;

        Ok(catalog)
    }

    fn resolve_maps(&self, manifest: MapManifest) -> Result<Vec<MapLayout>, CatalogError> {
        let mut maps: Vec<MapLayout> = Vec::with_capacity(manifest.maps.len());
        for entry in manifest.maps {
            let id = MapId::parse(&entry.id).ok_or_else(|| CatalogError::InvalidMapId(entry.id))?;
            if maps.iter().any(|map| map.id == id) {
                return Err(CatalogError::DuplicateMap(id));
            }

            let mut positions: Vec<Position> = Vec::with_capacity(entry.positions.len());
            for position in entry.positions {
                let position_id = PositionId::parse(&position.id)
                    .filter(|parsed| !self.is_action_letter(parsed.column()))
                    .ok_or_else(|| CatalogError::InvalidPosition {
                        map: id,
                        position: position.id.clone(),
                    })?;
                if positions.iter().any(|existing| existing.id == position_id) {
                    return Err(CatalogError::DuplicatePosition {
                        map: id,
                        position: position_id,
                    });
                }
                positions.push(Position {
                    id: position_id,
                    anchor: PixelAnchor {
                        x: position.x,
                        y: position.y,
                    },
                });
            }

            maps.push(MapLayout { id, positions });
        }
        Ok(maps)
    }

    /// Every tower in manifest order.
    #[must_use]
    pub fn towers(&self) -> &[TowerKind] {
        &self.towers
    }

    /// Looks up a tower by its long name, ignoring case.
    pub fn tower_by_name(&self, name: &str) -> Result<&TowerKind, UnknownTowerError> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|index| &self.towers[*index])
            .ok_or_else(|| UnknownTowerError(name.to_owned()))
    }

    /// Looks up a tower by its code.
    pub fn tower_by_code(&self, code: TowerCode) -> Result<&TowerKind, UnknownTowerError> {
        self.by_code
            .get(&code)
            .map(|index| &self.towers[*index])
            .ok_or_else(|| UnknownTowerError(code.to_string()))
    }

    /// Looks up the tower of a family at the given rank.
    pub fn tower(&self, family: char, rank: u8) -> Result<&TowerKind, UnknownTowerError> {
        let code = TowerCode::new(family, rank)
            .ok_or_else(|| UnknownTowerError(format!("{family}{rank}")))?;
        self.tower_by_code(code)
    }

    /// Name of the tower with the given code, falling back to the code.
    #[must_use]
    pub fn tower_name(&self, code: TowerCode) -> String {
        self.tower_by_code(code)
            .map_or_else(|_| code.to_string(), |tower| tower.name.clone())
    }

    /// Looks up an upgrade name across every tower, ignoring case.
    #[must_use]
    pub fn upgrade_by_name(&self, name: &str) -> Option<(&TowerKind, &AbilitySlot)> {
        let (index, letter) = self.upgrades.get(&name.to_ascii_lowercase())?;
        let tower = &self.towers[*index];
        tower.slot(*letter).map(|slot| (tower, slot))
    }

    /// Name of a tower's upgrade at a level.
    pub fn upgrade_name(
        &self,
        tower: TowerCode,
        letter: AbilityLetter,
        level: u8,
        notation: Notation,
    ) -> Result<String, UnknownAbilityError> {
        self.tower_by_code(tower)
            .ok()
            .and_then(|kind| kind.slot(letter))
            .map(|slot| slot.level_name(level, notation))
            .ok_or(UnknownAbilityError { tower, letter })
    }

    /// Resolves a classifier label, ignoring case.
    #[must_use]
    pub fn resolve_label(&self, label: &str) -> Option<TowerLabel> {
        if label.eq_ignore_ascii_case(NONE_LABEL) {
            Some(TowerLabel::None)
        } else if label.eq_ignore_ascii_case(MAP_LABEL) {
            Some(TowerLabel::Map)
        } else {
            self.tower_by_name(label)
                .ok()
                .map(|tower| TowerLabel::Tower(tower.code))
        }
    }

    /// Output labels of the tower classifier in model order.
    #[must_use]
    pub fn tower_labels(&self) -> &[String] {
        &self.labels
    }

    /// Reports whether a letter starts an action token in compact plans.
    #[must_use]
    pub fn is_action_letter(&self, letter: char) -> bool {
        let letter = letter.to_ascii_lowercase();
        self.families.contains(&letter) || AbilityLetter::from_char(letter).is_some()
    }

    /// Every map in manifest order.
    #[must_use]
    pub fn maps(&self) -> &[MapLayout] {
        &self.maps
    }

    /// Looks up a map.
    #[must_use]
    pub fn map(&self, id: MapId) -> Option<&MapLayout> {
        self.maps.iter().find(|map| map.id == id)
    }
}

fn is_sentinel(name: &str) -> bool {
    name.eq_ignore_ascii_case(NONE_LABEL) || name.eq_ignore_ascii_case(MAP_LABEL)
}

fn read_manifest(path: &Path) -> Result<String, CatalogError> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

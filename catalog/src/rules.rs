//! Transition rules shared by the tracker and the plan grammar.
//!
//! A position starts empty. Any tower may be placed on an empty position;
//! afterwards only higher ranks of the same family may replace it. Ability
//! tracks only exist on towers that declare them and their level only ever
//! increases, up to the track's maximum.

use build_order_core::{
    AbilityLetter, Diagnostic, DiagnosticKind, Location, PositionId, PositionState, TowerCode,
};
use thiserror::Error;

use crate::{Catalog, Notation};

/// Build rule broken by a step.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// A tower of another family was placed over an existing tower.
    #[error("Can't build {tower} on {previous} at {position}.")]
    IllegalFamily {
        /// Position of the step.
        position: PositionId,
        /// Requested tower.
        tower: String,
        /// Tower already standing.
        previous: String,
    },
    /// The requested rank is not above the current one.
    #[error("Tower downgrade {tower} on {previous} at {position}.")]
    Downgrade {
        /// Position of the step.
        position: PositionId,
        /// Requested tower.
        tower: String,
        /// Tower already standing.
        previous: String,
    },
    /// An ability was upgraded on an empty position.
    #[error("Upgrade '{upgrade}' on nothing at {position}.")]
    UpgradeOnNothing {
        /// Position of the step.
        position: PositionId,
        /// Upgrade as written.
        upgrade: String,
    },
    /// The tower has no such ability track.
    #[error("There is no '{upgrade}' upgrade for {tower} at {position}.")]
    NoSuchUpgrade {
        /// Position of the step.
        position: PositionId,
        /// Upgrade as written.
        upgrade: String,
        /// Tower standing on the position.
        tower: String,
    },
    /// The requested level exceeds the track maximum.
    #[error(
        "Ability upgrade to level {level} when {} max level is {max} at {position}.",
        quoted(.upgrade, .notation)
    )]
    LevelOutOfRange {
        /// Position of the step.
        position: PositionId,
        /// Upgrade name.
        upgrade: String,
        /// Requested level.
        level: u8,
        /// Maximum level of the track.
        max: u8,
        /// Notation the message is written for.
        notation: Notation,
    },
    /// The requested level is not above the recorded one.
    #[error("Ability downgrade from '{from}' to '{to}' at {position}.")]
    AbilityDowngrade {
        /// Position of the step.
        position: PositionId,
        /// Current upgrade level name.
        from: String,
        /// Requested upgrade level name.
        to: String,
    },
}

impl RuleViolation {
    /// Diagnostic category of the violation.
    #[must_use]
    pub const fn kind(&self) -> DiagnosticKind {
        match self {
            Self::IllegalFamily { .. } => DiagnosticKind::IllegalFamily,
            Self::Downgrade { .. } => DiagnosticKind::Downgrade,
            Self::UpgradeOnNothing { .. } => DiagnosticKind::UpgradeOnNothing,
            Self::NoSuchUpgrade { .. } => DiagnosticKind::NoSuchUpgrade,
            Self::LevelOutOfRange { .. } => DiagnosticKind::LevelOutOfRange,
            Self::AbilityDowngrade { .. } => DiagnosticKind::AbilityDowngrade,
        }
    }

    /// Converts the violation into an error diagnostic at `location`.
    #[must_use]
    pub fn into_diagnostic(self, location: Location) -> Diagnostic {
        Diagnostic::error(self.kind(), location, self.to_string())
    }
}

/// Verbose plans quote upgrade names, compact plans print them bare.
fn quoted(name: &str, notation: &Notation) -> String {
    match notation {
        Notation::Verbose => format!("'{name}'"),
        Notation::Compact => name.to_owned(),
    }
}

/// Ability upgrade as requested by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbilityRequest<'a> {
    /// Upgrade addressed by track letter, as in compact plans and pip readings.
    Slot {
        /// Track letter.
        letter: AbilityLetter,
        /// Explicit level, or `None` for one above the current level.
        level: Option<u8>,
    },
    /// Upgrade addressed by name, as in verbose plans.
    Named {
        /// Upgrade name such as `Over`.
        name: &'a str,
        /// Explicit level, or `None` for one above the current level.
        level: Option<u8>,
    },
}

/// Checks that `next` may replace whatever stands on the position.
pub fn check_build(
    catalog: &Catalog,
    position: PositionId,
    previous: Option<TowerCode>,
    next: TowerCode,
) -> Result<(), RuleViolation> {
    let Some(previous) = previous else {
        return Ok(());
    };

    if !previous.same_family(next) {
        return Err(RuleViolation::IllegalFamily {
            position,
            tower: catalog.tower_name(next),
            previous: catalog.tower_name(previous),
        });
    }
    if next.rank() <= previous.rank() {
        return Err(RuleViolation::Downgrade {
            position,
            tower: catalog.tower_name(next),
            previous: catalog.tower_name(previous),
        });
    }
    Ok(())
}

/// Resolves an ability request against the position's state.
///
/// Returns the track letter and the level the step reaches.
pub fn check_ability(
    catalog: &Catalog,
    position: PositionId,
    state: &PositionState,
    request: AbilityRequest<'_>,
    notation: Notation,
) -> Result<(AbilityLetter, u8), RuleViolation> {
    let (requested, level) = match request {
        AbilityRequest::Slot { letter, level } => (letter.to_string(), level),
        AbilityRequest::Named { name, level } => (name.to_owned(), level),
    };

    let Some(tower) = state.tower().and_then(|code| catalog.tower_by_code(code).ok()) else {
        return Err(RuleViolation::UpgradeOnNothing {
            position,
            upgrade: requested,
        });
    };

    let slot = match request {
        AbilityRequest::Slot { letter, .. } => tower.slot(letter),
        AbilityRequest::Named { name, .. } => tower.slot_named(name),
    };
    let Some(slot) = slot else {
        return Err(RuleViolation::NoSuchUpgrade {
            position,
            upgrade: requested,
            tower: tower.name().to_owned(),
        });
    };

    let current = state.ability_level(slot.letter());
    let level = level.unwrap_or(current + 1);
    if level > slot.max_level() {
        return Err(RuleViolation::LevelOutOfRange {
            position,
            upgrade: slot.name().to_owned(),
            level,
            max: slot.max_level(),
            notation,
        });
    }
    if level <= current {
        return Err(RuleViolation::AbilityDowngrade {
            position,
            from: slot.level_name(current, notation),
            to: slot.level_name(level, notation),
        });
    }

    Ok((slot.letter(), level))
}

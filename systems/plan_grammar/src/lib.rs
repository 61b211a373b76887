#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Textual build plans in two interchangeable notations.
//!
//! The verbose notation writes one `<Position> <Action>` step per line using
//! long names and is what the tracker transcript emits. The compact notation
//! packs a whole plan into a single shareable string. Both parse into the same
//! [`BuildPlan`] and are validated against the catalog's build rules: a
//! rejected step is recorded as an error diagnostic and skipped, so one bad
//! step never hides the problems after it.

mod builder;
mod compact;
mod verbose;

use build_order_catalog::{Catalog, Notation};
use build_order_core::{BuildPlan, Location, StepAction, WorldState};
use thiserror::Error;

pub use compact::parse_compact;
pub use verbose::parse_verbose;

const LINE_BREAK: &str = "\r\n";

/// Structural problem that prevents a plan from being parsed at all.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The plan does not begin with a map identifier.
    #[error("Plan didn't start with map (ex: 'L26').")]
    NoMap,
    /// A compact plan's map identifier is not followed by `:`.
    #[error("Plan must have ':' after map name (ex: 'L26:').")]
    MissingMapTerminator,
    /// The map identifier does not name a catalog map.
    #[error("{}", unknown_map_message(.location, .name))]
    UnknownMap {
        /// Where the map identifier ended.
        location: Location,
        /// Identifier as written.
        name: String,
    },
}

fn unknown_map_message(location: &Location, name: &str) -> String {
    match location {
        Location::Line(line) => format!("Line {line}: Unknown map name {name}."),
        Location::Offset(offset) => {
            format!("@{offset}: Unknown map '{name}' at beginning of plan.")
        }
        Location::Position(position) => format!("{position}: Unknown map '{name}'."),
    }
}

/// Parses a plan in either notation.
///
/// Text whose first content after comments is `L<digits>:` is read as compact
/// notation, anything else as verbose notation.
pub fn parse(text: &str, catalog: &Catalog) -> Result<BuildPlan, PlanError> {
    let content: Vec<&str> = text
        .lines()
        .map(|line| strip_comment(line).trim())
        .filter(|line| !line.is_empty())
        .collect();

    match content.first() {
        Some(first) if has_compact_header(first) => parse_compact(&content.concat(), catalog),
        _ => parse_verbose(text, catalog),
    }
}

fn has_compact_header(line: &str) -> bool {
    let Some(rest) = line
        .strip_prefix('L')
        .or_else(|| line.strip_prefix('l'))
    else {
        return false;
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && rest[digits..].trim_start().starts_with(':')
}

pub(crate) fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(content, _)| content)
}

/// Renders the canonical compact form of a plan.
///
/// Positions are only written when they change and a level or rank of one
/// is implied rather than written.
#[must_use]
pub fn to_short_text(plan: &BuildPlan) -> String {
    let mut text = format!("{}:", plan.map());
    let mut previous = None;

    for step in plan.steps() {
        if previous != Some(step.position) {
            text.push_str(&step.position.to_string());
            previous = Some(step.position);
        }
        let (letter, value) = match step.action {
            StepAction::Build(tower) => (tower.family(), tower.rank()),
            StepAction::Ability { slot, level } => (slot.as_char(), level),
        };
        text.push(letter);
        if value != 1 {
            text.push_str(&value.to_string());
        }
    }

    text
}

/// Renders a plan in verbose notation with long tower and upgrade names.
#[must_use]
pub fn to_long_text(plan: &BuildPlan, catalog: &Catalog) -> String {
    let mut lines = vec![plan.map().to_string(), String::new()];
    let positions = catalog
        .map(plan.map())
        .map(|layout| layout.position_ids().collect::<Vec<_>>())
        .unwrap_or_default();
    let mut world = WorldState::new(positions);

    for step in plan.steps() {
        let name = match step.action {
            StepAction::Build(tower) => catalog.tower_name(tower),
            StepAction::Ability { slot, level } => world
                .tower(step.position)
                .and_then(|tower| {
                    catalog
                        .upgrade_name(tower, slot, level, Notation::Verbose)
                        .ok()
                })
                .unwrap_or_else(|| step.action.short_code()),
        };
        lines.push(format!("{} {name}", step.position));
        world.apply(step);
    }

    lines.join(LINE_BREAK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builtin().expect("builtin catalog loads")
    }

    #[test]
    fn comments_are_stripped_to_end_of_line() {
        assert_eq!(strip_comment("A8 Tesl # opener"), "A8 Tesl ");
        assert_eq!(strip_comment("# Southport"), "");
        assert_eq!(strip_comment("L1"), "L1");
    }

    #[test]
    fn compact_header_needs_digits_and_colon() {
        assert!(has_compact_header("L1:A8p"));
        assert!(has_compact_header("l26 : A8p"));
        assert!(!has_compact_header("L1"));
        assert!(!has_compact_header("L:A8p"));
        assert!(!has_compact_header("A8 Barr"));
    }

    #[test]
    fn parse_detects_the_notation() {
        let catalog = catalog();
        let compact = parse("# shared build\nL1:A8pB5t", &catalog).expect("compact plan");
        let verbose = parse("L1\n\nA8 Barr\nB5 Arti", &catalog).expect("verbose plan");
        assert_eq!(compact, verbose);
    }

    #[test]
    fn unknown_map_message_depends_on_notation() {
        let compact = PlanError::UnknownMap {
            location: Location::Offset(3),
            name: "L0".to_owned(),
        };
        assert_eq!(
            compact.to_string(),
            "@3: Unknown map 'L0' at beginning of plan."
        );

        let verbose = PlanError::UnknownMap {
            location: Location::Line(1),
            name: "L0".to_owned(),
        };
        assert_eq!(verbose.to_string(), "Line 1: Unknown map name L0.");
    }
}

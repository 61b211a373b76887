//! Line-oriented notation with long tower and upgrade names.
//!
//! ```text
//! # Southport
//! L1
//!
//! A8 Tesl
//! A8 Over3
//! ```

use build_order_catalog::{rules::AbilityRequest, Catalog, Notation};
use build_order_core::{BuildPlan, Diagnostic, DiagnosticKind, Location, MapId, PositionId};
use tracing::trace;

use crate::{builder::PlanBuilder, strip_comment, PlanError};

/// Parses a verbose plan.
///
/// Line numbers in diagnostics are one-based and count comment and blank
/// lines.
pub fn parse_verbose(text: &str, catalog: &Catalog) -> Result<BuildPlan, PlanError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, strip_comment(line).trim()))
        .filter(|(_, line)| !line.is_empty());

    let (map_line, map_name) = lines.next().ok_or(PlanError::NoMap)?;
    if !map_name.starts_with(|c: char| c.eq_ignore_ascii_case(&'L')) {
        return Err(PlanError::NoMap);
    }
    let layout = MapId::parse(map_name)
        .and_then(|map| catalog.map(map))
        .ok_or_else(|| PlanError::UnknownMap {
            location: Location::Line(map_line),
            name: map_name.to_owned(),
        })?;
    let mut builder = PlanBuilder::new(catalog, layout, Notation::Verbose);

    for (line, content) in lines {
        trace!(target: "build_order::grammar", line, content, "verbose line");
        let tokens: Vec<&str> = content.split_whitespace().collect();
        let [position, action] = tokens.as_slice() else {
            builder.reject(Diagnostic::error(
                DiagnosticKind::MalformedStep,
                Location::Line(line),
                "Did not have a position and action.",
            ));
            continue;
        };

        let Some(at) = PositionId::parse(position).filter(|at| layout.contains(*at)) else {
            builder.reject(Diagnostic::error(
                DiagnosticKind::UnknownPosition,
                Location::Line(line),
                format!(
                    "Unknown position '{}' on {}.",
                    position.to_ascii_uppercase(),
                    layout.id()
                ),
            ));
            continue;
        };

        apply_action(&mut builder, at, action, line);
    }

    Ok(builder.finish())
}

fn apply_action(builder: &mut PlanBuilder<'_>, at: PositionId, action: &str, line: usize) {
    let catalog = builder.catalog();
    let location = Location::Line(line);

    if let Ok(tower) = catalog.tower_by_name(action) {
        builder.build(at, tower.code(), location);
        return;
    }

    let Some((name, level)) = split_upgrade(catalog, action) else {
        let map = builder.layout().id();
        builder.reject(Diagnostic::error(
            DiagnosticKind::UnknownAction,
            location,
            format!(
                "Unknown action '{}' at {at} on {map}.",
                action.to_ascii_lowercase()
            ),
        ));
        return;
    };
    builder.ability(at, AbilityRequest::Named { name, level }, location);
}

/// Splits `Over3` into the catalog's upgrade name and an optional level.
fn split_upgrade<'c>(catalog: &'c Catalog, action: &str) -> Option<(&'c str, Option<u8>)> {
    let (name, level) = match action.char_indices().last() {
        Some((index, last)) if last.is_ascii_digit() => {
            let level = u8::try_from(last.to_digit(10)?).ok()?;
            (&action[..index], Some(level))
        }
        _ => (action, None),
    };
    if level == Some(0) {
        return None;
    }
    catalog
        .upgrade_by_name(name)
        .map(|(_, slot)| (slot.name(), level))
}

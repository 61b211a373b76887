//! Single-string notation such as `L1:A8pB5tA9p3x2`.
//!
//! Offsets reported in diagnostics count characters of the input after
//! separators were stripped.

use build_order_catalog::{rules::AbilityRequest, Catalog, Notation};
use build_order_core::{
    AbilityLetter, BuildPlan, Diagnostic, DiagnosticKind, Location, MapId, PositionId,
};
use tracing::trace;

use crate::{builder::PlanBuilder, PlanError};

const SEPARATORS: [char; 4] = ['.', ';', '\r', '\n'];

/// Parses a compact plan.
///
/// Structural problems with the map header abort parsing. Everything after
/// the header is reported as diagnostics on the returned plan.
pub fn parse_compact(text: &str, catalog: &Catalog) -> Result<BuildPlan, PlanError> {
    let chars: Vec<char> = text
        .chars()
        .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
        .collect();

    let (map, mut cursor) = parse_header(&chars)?;
    let layout = catalog.map(map).ok_or_else(|| PlanError::UnknownMap {
        location: Location::Offset(cursor),
        name: map.to_string(),
    })?;
    let mut builder = PlanBuilder::new(catalog, layout, Notation::Compact);

    let mut position: Option<PositionId> = None;
    let mut after_position = false;
    let mut skipping = false;

    while cursor < chars.len() {
        let start = cursor;
        let letter = chars[cursor];
        cursor += 1;
        let digit = chars
            .get(cursor)
            .and_then(|c| c.to_digit(10))
            .and_then(|d| u8::try_from(d).ok());
        if digit.is_some() {
            cursor += 1;
        }
        let token: String = chars[start..cursor].iter().collect();
        trace!(target: "build_order::grammar", offset = start, token = %token, "compact token");

        let is_action = after_position || catalog.is_action_letter(letter);
        if !is_action {
            match builder.resolve_position(letter, digit) {
                Some(resolved) => {
                    position = Some(resolved);
                    after_position = true;
                    skipping = false;
                }
                None => {
                    builder.reject(Diagnostic::error(
                        DiagnosticKind::UnknownPosition,
                        Location::Offset(cursor),
                        format!("Unknown position '{}'.", token.to_ascii_uppercase()),
                    ));
                    position = None;
                    after_position = false;
                    skipping = true;
                }
            }
            continue;
        }

        after_position = false;
        if skipping {
            continue;
        }
        let Some(at) = position else {
            builder.reject(Diagnostic::error(
                DiagnosticKind::MissingPosition,
                Location::Offset(start),
                "No position provided and no previous position to re-use.",
            ));
            continue;
        };

        apply_action(&mut builder, at, letter, digit, &token, start, cursor);
    }

    if after_position {
        builder.reject(Diagnostic::error(
            DiagnosticKind::IncompleteStep,
            Location::Offset(cursor),
            "Incomplete step at end of plan.",
        ));
    }

    Ok(builder.finish())
}

fn parse_header(chars: &[char]) -> Result<(MapId, usize), PlanError> {
    match chars.first() {
        Some('L' | 'l') => {}
        _ => return Err(PlanError::NoMap),
    }

    let digits = chars[1..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    let terminator = 1 + digits;
    if chars.get(terminator) != Some(&':') {
        return Err(PlanError::MissingMapTerminator);
    }

    let consumed = terminator + 1;
    let name: String = std::iter::once('L')
        .chain(chars[1..terminator].iter().copied())
        .collect();
    let map = MapId::parse(&name).ok_or(PlanError::UnknownMap {
        location: Location::Offset(consumed),
        name,
    })?;
    Ok((map, consumed))
}

fn apply_action(
    builder: &mut PlanBuilder<'_>,
    at: PositionId,
    letter: char,
    digit: Option<u8>,
    token: &str,
    start: usize,
    end: usize,
) {
    let catalog = builder.catalog();
    let family = letter.to_ascii_lowercase();

    if digit == Some(0) {
        unknown_action(builder, token, start);
        return;
    }

    if let Some(slot) = AbilityLetter::from_char(letter) {
        builder.ability(
            at,
            AbilityRequest::Slot {
                letter: slot,
                level: digit,
            },
            Location::Offset(end),
        );
        return;
    }

    if !catalog.is_action_letter(family) {
        unknown_action(builder, token, start);
        return;
    }

    let rank = digit.unwrap_or_else(|| builder.current_rank(at) + 1);
    match catalog.tower(family, rank) {
        Ok(tower) => builder.build(at, tower.code(), Location::Offset(end)),
        Err(_) => unknown_action(builder, &format!("{family}{rank}"), start),
    }
}

fn unknown_action(builder: &mut PlanBuilder<'_>, action: &str, offset: usize) {
    builder.reject(Diagnostic::error(
        DiagnosticKind::UnknownAction,
        Location::Offset(offset),
        format!("Unknown action {}.", action.to_ascii_lowercase()),
    ));
}

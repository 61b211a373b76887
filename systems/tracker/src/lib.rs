#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Streaming build tracker that turns per-tick classifier readings into a
//! build plan.
//!
//! A [`ScanSession`] is created once the map of a recording is known and fed
//! one [`TickObservation`] per sampled frame. Readings are trusted only when
//! they are confident and consistent with the build rules; everything else is
//! recorded as a diagnostic and leaves the believed world untouched, so noisy
//! frames can never corrupt the plan.

mod identify;

use std::time::Duration;

use build_order_catalog::{
    rules::{self, AbilityRequest, RuleViolation},
    Catalog, MapLayout, Notation, TowerLabel,
};
use build_order_core::{
    AbilityLetter, BuildPlan, Diagnostic, DiagnosticKind, ElapsedTime, Location, MapId,
    PositionId, Severity, Step, StepAction, TowerCode, WorldState,
};
use build_order_system_classification::Reduction;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, trace};

pub use identify::{identify_map, PROBE_POSITIONS};

const LINE_BREAK: &str = "\r\n";

/// Tunables of the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum confidence, inclusive, for a tower reading to be trusted.
    pub confidence_threshold: f32,
    /// Seconds of recording between two observed ticks.
    pub seconds_per_tick: f64,
    /// Quiet period after which the next change starts a new plan section.
    pub section_gap_seconds: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.95,
            seconds_per_tick: 5.0,
            section_gap_seconds: 40.0,
        }
    }
}

impl TrackerConfig {
    /// Quiet ticks needed before a section separator is written.
    #[must_use]
    pub fn gap_ticks(&self) -> u64 {
        if self.seconds_per_tick > 0.0 {
            (self.section_gap_seconds / self.seconds_per_tick).ceil().max(0.0) as u64
        } else {
            0
        }
    }

    /// Rejects tunables the tracker cannot work with.
    pub fn validate(&self) -> Result<(), TrackerError> {
        let threshold = f64::from(self.confidence_threshold);
        let checks = [
            ("confidence_threshold", threshold, (0.0..=1.0).contains(&threshold)),
            (
                "seconds_per_tick",
                self.seconds_per_tick,
                self.seconds_per_tick.is_finite() && self.seconds_per_tick > 0.0,
            ),
            (
                "section_gap_seconds",
                self.section_gap_seconds,
                self.section_gap_seconds.is_finite() && self.section_gap_seconds >= 0.0,
            ),
        ];
        match checks.into_iter().find(|(_, _, valid)| !valid) {
            Some((field, value, _)) => Err(TrackerError::InvalidTunable {
                field,
                value: value.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Recording time at which a tick was sampled.
    #[must_use]
    pub fn elapsed(&self, tick: u64) -> ElapsedTime {
        let seconds = (tick as f64 * self.seconds_per_tick).max(0.0);
        ElapsedTime::new(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
    }
}

/// Errors raised when starting a session.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The catalog does not contain the requested map.
    #[error("map {0} is not in the catalog")]
    UnknownMap(MapId),
    /// A tunable is outside the range the tracker supports.
    #[error("tracker setting {field} = {value} is out of range")]
    InvalidTunable {
        /// Name of the setting.
        field: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Reduced tower classification for one position.
#[derive(Clone, Debug, PartialEq)]
pub struct TowerReading {
    /// Position the region belongs to.
    pub position: PositionId,
    /// Best and second best labels.
    pub reduction: Reduction,
}

/// Decoded ability level for one track of the tower at a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbilityReading {
    /// Position of the tower.
    pub position: PositionId,
    /// Track the pips belong to.
    pub slot: AbilityLetter,
    /// Decoded level, `None` when the pips were indeterminate.
    pub level: Option<u8>,
}

/// Everything classified on one sampled frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickObservation {
    /// Tower readings, one per position.
    pub towers: Vec<TowerReading>,
    /// Ability readings for any tower whose circle was visible.
    pub abilities: Vec<AbilityReading>,
}

/// Outcome of comparing a tower reading with the believed state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Evaluation {
    /// Nothing changed.
    Steady,
    /// A new tower was confirmed.
    Confirmed(TowerCode),
    /// The reading was discarded.
    Rejected(Diagnostic),
}

/// Compares a tower reading with the tower believed to stand on the position.
#[must_use]
pub fn evaluate(
    catalog: &Catalog,
    config: &TrackerConfig,
    position: PositionId,
    reading: &Reduction,
    previous: Option<TowerCode>,
) -> Evaluation {
    let at = Location::Position(position);
    let Some(best) = reading.best.as_ref() else {
        return Evaluation::Rejected(Diagnostic::error(
            DiagnosticKind::NoDetections,
            at,
            "returned no detections.",
        ));
    };
    if let Some(second) = reading.second.as_ref() {
        trace!(
            target: "build_order::tracker",
            %position,
            best = %best.label,
            second = %second.label,
            second_confidence = second.confidence,
            "runner-up label"
        );
    }

    if best.confidence < config.confidence_threshold {
        return Evaluation::Rejected(Diagnostic::warning(
            DiagnosticKind::LowConfidence,
            at,
            format!(
                "ignored low confidence {} ({:.0}%)",
                best.label,
                best.confidence * 100.0
            ),
        ));
    }

    match catalog.resolve_label(&best.label) {
        None => Evaluation::Rejected(Diagnostic::error(
            DiagnosticKind::UnknownLabel,
            at,
            format!("returned unknown label {}.", best.label),
        )),
        Some(TowerLabel::Map) => Evaluation::Rejected(Diagnostic::warning(
            DiagnosticKind::MapSpace,
            at,
            "detection said non-position map space.",
        )),
        Some(TowerLabel::None) => match previous {
            Some(tower) => Evaluation::Rejected(Diagnostic::warning(
                DiagnosticKind::IgnoredNone,
                at,
                format!("ignored None where previously {}.", catalog.tower_name(tower)),
            )),
            None => Evaluation::Steady,
        },
        Some(TowerLabel::Tower(tower)) if previous == Some(tower) => Evaluation::Steady,
        Some(TowerLabel::Tower(tower)) => {
            match rules::check_build(catalog, position, previous, tower) {
                Ok(()) => Evaluation::Confirmed(tower),
                Err(violation) => Evaluation::Rejected(violation.into_diagnostic(at)),
            }
        }
    }
}

/// Tracking state for one recording of one map.
#[derive(Debug)]
pub struct ScanSession<'a> {
    catalog: &'a Catalog,
    layout: &'a MapLayout,
    config: TrackerConfig,
    world: WorldState,
    plan: BuildPlan,
    tick: u64,
    last_change: Option<u64>,
    transcript: Vec<String>,
    last_step_line: Option<usize>,
}

impl<'a> ScanSession<'a> {
    /// Starts tracking a recording of the given map.
    pub fn new(
        catalog: &'a Catalog,
        map: MapId,
        config: TrackerConfig,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let layout = catalog.map(map).ok_or(TrackerError::UnknownMap(map))?;
        info!(target: "build_order::tracker", %map, "scan started");
        Ok(Self {
            catalog,
            layout,
            config,
            world: WorldState::new(layout.position_ids()),
            plan: BuildPlan::new(map),
            tick: 0,
            last_change: None,
            transcript: vec![map.to_string(), String::new()],
            last_step_line: None,
        })
    }

    /// Map being tracked.
    #[must_use]
    pub fn map(&self) -> MapId {
        self.layout.id()
    }

    /// Number of ticks observed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Plan confirmed so far.
    #[must_use]
    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    /// Believed state of every position.
    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Plan output stream rendered in verbose notation.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.transcript.join(LINE_BREAK)
    }

    /// Ends the scan and hands back the plan.
    #[must_use]
    pub fn finish(self) -> BuildPlan {
        info!(
            target: "build_order::tracker",
            map = %self.map(),
            steps = self.plan.steps().len(),
            "scan finished"
        );
        self.plan
    }

    /// Processes the readings of one sampled frame.
    pub fn observe(&mut self, observation: &TickObservation) {
        let mut tick = TickLines::default();

        for reading in self.in_scan_order(&observation.towers) {
            if !self.layout.contains(reading.position) {
                self.reject(&mut tick, unknown_position(reading.position, self.map()));
                continue;
            }
            let previous = self.world.tower(reading.position);
            match evaluate(
                self.catalog,
                &self.config,
                reading.position,
                &reading.reduction,
                previous,
            ) {
                Evaluation::Steady => {}
                Evaluation::Confirmed(tower) => {
                    self.confirm(&mut tick, Step::build(reading.position, tower));
                }
                Evaluation::Rejected(diagnostic) => self.reject(&mut tick, diagnostic),
            }
        }

        for reading in &observation.abilities {
            self.observe_ability(&mut tick, reading);
        }

        if !tick.lines.is_empty() {
            if tick.section_break {
                self.transcript.push(String::new());
            }
            self.transcript
                .push(format!("# {}", self.config.elapsed(self.tick)));
            if let Some(index) = tick.step_line {
                self.last_step_line = Some(self.transcript.len() + index);
            }
            self.transcript.append(&mut tick.lines);
        }
        self.tick += 1;
    }

    fn in_scan_order<'r>(&self, readings: &'r [TowerReading]) -> Vec<&'r TowerReading> {
        let mut ordered: Vec<&TowerReading> = readings.iter().collect();
        ordered.sort_by_key(|reading| {
            self.layout
                .positions()
                .iter()
                .position(|position| position.id() == reading.position)
                .unwrap_or(usize::MAX)
        });
        ordered
    }

    fn observe_ability(&mut self, tick: &mut TickLines, reading: &AbilityReading) {
        let Some(level) = reading.level else {
            return;
        };
        let Some(state) = self.world.position(reading.position) else {
            self.reject(tick, unknown_position(reading.position, self.map()));
            return;
        };
        if level <= state.ability_level(reading.slot) {
            return;
        }

        let request = AbilityRequest::Slot {
            letter: reading.slot,
            level: Some(level),
        };
        match rules::check_ability(
            self.catalog,
            reading.position,
            state,
            request,
            Notation::Verbose,
        ) {
            Ok((slot, level)) => self.confirm(tick, Step::ability(reading.position, slot, level)),
            Err(violation) => {
                let at = Location::Position(reading.position);
                let diagnostic = match violation {
                    RuleViolation::UpgradeOnNothing { .. } => {
                        Diagnostic::warning(violation.kind(), at, violation.to_string())
                    }
                    other => other.into_diagnostic(at),
                };
                self.reject(tick, diagnostic);
            }
        }
    }

    fn confirm(&mut self, tick: &mut TickLines, step: Step) {
        let name = self.step_name(&step);
        let line = format!("{} {name}", step.position);
        let replaces = self.plan.last_step().is_some_and(|last| {
            last.position == step.position && last.action.same_track(&step.action)
        });

        if replaces {
            self.plan.replace_last_step(step);
            self.rewrite_step_line(tick, line);
        } else {
            let quiet = self
                .last_change
                .map_or(false, |last| self.tick - last >= self.config.gap_ticks());
            if !self.plan.steps().is_empty() && quiet {
                tick.section_break = true;
            }
            self.plan.push_step(step);
            tick.step_line = Some(tick.lines.len());
            tick.lines.push(line);
        }

        debug!(
            target: "build_order::tracker",
            tick = self.tick,
            position = %step.position,
            action = %name,
            replaced = replaces,
            "confirmed change"
        );
        self.world.apply(&step);
        self.last_change = Some(self.tick);
    }

    /// Overwrites the line of the step that was just replaced in the plan.
    fn rewrite_step_line(&mut self, tick: &mut TickLines, line: String) {
        let slot = match tick.step_line {
            Some(index) => tick.lines.get_mut(index),
            None => self
                .last_step_line
                .and_then(|index| self.transcript.get_mut(index)),
        };
        if let Some(slot) = slot {
            *slot = line;
        }
    }

    fn reject(&mut self, tick: &mut TickLines, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => debug!(
                target: "build_order::tracker",
                tick = self.tick,
                %diagnostic,
                "reading ignored"
            ),
            Severity::Error => info!(
                target: "build_order::tracker",
                tick = self.tick,
                %diagnostic,
                "reading rejected"
            ),
        }
        tick.lines.push(format!("# {diagnostic}"));
        self.plan.push_diagnostic(diagnostic);
    }

    fn step_name(&self, step: &Step) -> String {
        match step.action {
            StepAction::Build(tower) => self.catalog.tower_name(tower),
            StepAction::Ability { slot, level } => self
                .world
                .tower(step.position)
                .and_then(|tower| {
                    self.catalog
                        .upgrade_name(tower, slot, level, Notation::Verbose)
                        .ok()
                })
                .unwrap_or_else(|| step.action.short_code()),
        }
    }
}

/// Lines produced while processing a single tick.
#[derive(Default)]
struct TickLines {
    lines: Vec<String>,
    /// Index into `lines` of the step written this tick.
    step_line: Option<usize>,
    section_break: bool,
}

fn unknown_position(position: PositionId, map: MapId) -> Diagnostic {
    Diagnostic::warning(
        DiagnosticKind::UnknownPosition,
        Location::Position(position),
        format!("reading for a position {map} does not have."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builtin().expect("builtin catalog loads")
    }

    fn a8() -> PositionId {
        PositionId::parse("A8").expect("position")
    }

    fn code(text: &str) -> TowerCode {
        TowerCode::parse(text).expect("code")
    }

    fn check(reading: Reduction, previous: Option<&str>) -> Evaluation {
        evaluate(
            &catalog(),
            &TrackerConfig::default(),
            a8(),
            &reading,
            previous.map(code),
        )
    }

    fn message(evaluation: Evaluation) -> String {
        match evaluation {
            Evaluation::Rejected(diagnostic) => diagnostic.to_string(),
            other => panic!("expected a diagnostic, got {other:?}"),
        }
    }

    #[test]
    fn empty_reduction_has_no_detections() {
        assert_eq!(
            message(check(Reduction::default(), None)),
            "ERROR A8: returned no detections."
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(
            check(Reduction::of("Barr", 0.95), None),
            Evaluation::Confirmed(code("p1"))
        );
        assert_eq!(
            message(check(Reduction::of("Barr", 0.949), None)),
            "WARN A8: ignored low confidence Barr (95%)"
        );
        assert_eq!(
            message(check(Reduction::of("Barr", 0.80), None)),
            "WARN A8: ignored low confidence Barr (80%)"
        );
    }

    #[test]
    fn sentinel_labels_never_change_state() {
        assert_eq!(
            message(check(Reduction::of("Map", 0.99), None)),
            "WARN A8: detection said non-position map space."
        );
        assert_eq!(check(Reduction::of("None", 0.99), None), Evaluation::Steady);
        assert_eq!(
            message(check(Reduction::of("None", 0.99), Some("p2"))),
            "WARN A8: ignored None where previously Barr2."
        );
    }

    #[test]
    fn unknown_labels_are_errors() {
        assert_eq!(
            message(check(Reduction::of("Dragon", 0.99), None)),
            "ERROR A8: returned unknown label Dragon."
        );
    }

    #[test]
    fn build_rules_apply_to_readings() {
        assert_eq!(
            check(Reduction::of("Barr2", 0.99), Some("p2")),
            Evaluation::Steady
        );
        assert_eq!(
            check(Reduction::of("Barr3", 0.99), Some("p1")),
            Evaluation::Confirmed(code("p3"))
        );
        assert_eq!(
            message(check(Reduction::of("Barr", 0.99), Some("p2"))),
            "ERROR A8: Tower downgrade Barr on Barr2 at A8."
        );
        assert_eq!(
            message(check(Reduction::of("Mage", 0.99), Some("p1"))),
            "ERROR A8: Can't build Mage on Barr at A8."
        );
    }

    #[test]
    fn gap_ticks_round_up() {
        let config = TrackerConfig {
            seconds_per_tick: 3.0,
            ..TrackerConfig::default()
        };
        assert_eq!(config.gap_ticks(), 14);
        assert_eq!(TrackerConfig::default().gap_ticks(), 8);
        assert_eq!(TrackerConfig::default().elapsed(16).to_string(), "01:20");
    }

    #[test]
    fn unusable_tunables_are_rejected() {
        let catalog = catalog();
        for config in [
            TrackerConfig {
                seconds_per_tick: f64::INFINITY,
                ..TrackerConfig::default()
            },
            TrackerConfig {
                seconds_per_tick: 0.0,
                ..TrackerConfig::default()
            },
            TrackerConfig {
                section_gap_seconds: -5.0,
                ..TrackerConfig::default()
            },
            TrackerConfig {
                confidence_threshold: f32::NAN,
                ..TrackerConfig::default()
            },
        ] {
            assert!(matches!(
                ScanSession::new(&catalog, MapId::new(1), config),
                Err(TrackerError::InvalidTunable { .. })
            ));
        }
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn elapsed_time_saturates_instead_of_panicking() {
        let config = TrackerConfig {
            seconds_per_tick: f64::MAX,
            ..TrackerConfig::default()
        };
        assert_eq!(config.elapsed(2).duration(), Duration::MAX);
    }

    #[test]
    fn unknown_map_cannot_start_a_session() {
        let catalog = catalog();
        let error = ScanSession::new(&catalog, MapId::new(99), TrackerConfig::default())
            .expect_err("map 99 is not in the catalog");
        assert_eq!(error, TrackerError::UnknownMap(MapId::new(99)));
    }
}

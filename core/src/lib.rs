#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the build-order engine.
//!
//! This crate defines the vocabulary that connects the catalog, the pure
//! systems and the adapters. Identifiers name maps, positions, towers and
//! ability slots; a [`BuildPlan`] collects the [`Step`] values a scan or a
//! parsed plan produced together with the [`Diagnostic`] lines explaining
//! everything that was rejected along the way. [`WorldState`] holds the
//! per-position belief that both the tracker and the plan grammar advance.

use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Identifier of a playable map such as `L14`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(u16);

impl MapId {
    /// Creates a map identifier from its level number.
    #[must_use]
    pub const fn new(number: u16) -> Self {
        Self(number)
    }

    /// Level number carried by the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }

    /// Parses `L<digits>` ignoring letter case.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let digits = text
            .strip_prefix('L')
            .or_else(|| text.strip_prefix('l'))?;
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u16>().ok().map(Self)
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Named slot on a map where a single tower may be built, e.g. `A8`.
///
/// The column letter is stored upper-case so lookups are insensitive to the
/// case used by the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId {
    column: char,
    row: u8,
}

impl PositionId {
    /// Creates a position from a column letter and a row digit.
    ///
    /// Returns `None` unless the column is an ASCII letter and the row a
    /// single decimal digit.
    #[must_use]
    pub fn new(column: char, row: u8) -> Option<Self> {
        if column.is_ascii_alphabetic() && row <= 9 {
            Some(Self {
                column: column.to_ascii_uppercase(),
                row,
            })
        } else {
            None
        }
    }

    /// Parses a two character position code such as `a8` or `A8`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        let column = chars.next()?;
        let row = chars.next()?.to_digit(10)?;
        if chars.next().is_some() {
            return None;
        }
        Self::new(column, u8::try_from(row).ok()?)
    }

    /// Upper-case column letter of the position.
    #[must_use]
    pub const fn column(&self) -> char {
        self.column
    }

    /// Row digit of the position.
    #[must_use]
    pub const fn row(&self) -> u8 {
        self.row
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// Family letter plus rank digit identifying a buildable tower, e.g. `p2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerCode {
    family: char,
    rank: u8,
}

impl TowerCode {
    /// Creates a tower code; the family letter is normalised to lower-case.
    #[must_use]
    pub fn new(family: char, rank: u8) -> Option<Self> {
        if family.is_ascii_alphabetic() && (1..=9).contains(&rank) {
            Some(Self {
                family: family.to_ascii_lowercase(),
                rank,
            })
        } else {
            None
        }
    }

    /// Parses a two character code such as `p2`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        let family = chars.next()?;
        let rank = chars.next()?.to_digit(10)?;
        if chars.next().is_some() {
            return None;
        }
        Self::new(family, u8::try_from(rank).ok()?)
    }

    /// Lower-case letter shared by every tier of the tower line.
    #[must_use]
    pub const fn family(&self) -> char {
        self.family
    }

    /// Upgrade tier within the family, starting at one.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        self.rank
    }

    /// Reports whether both codes belong to the same tower line.
    #[must_use]
    pub const fn same_family(&self, other: TowerCode) -> bool {
        self.family == other.family
    }
}

impl fmt::Display for TowerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.family, self.rank)
    }
}

/// One of the upgrade tracks a tower may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbilityLetter {
    /// First ability track.
    X,
    /// Second ability track.
    Y,
    /// Third ability track.
    Z,
}

impl AbilityLetter {
    /// Every ability letter in display order.
    pub const ALL: [AbilityLetter; 3] = [Self::X, Self::Y, Self::Z];

    /// Resolves a letter ignoring case.
    #[must_use]
    pub fn from_char(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'x' => Some(Self::X),
            'y' => Some(Self::Y),
            'z' => Some(Self::Z),
            _ => None,
        }
    }

    /// Lower-case letter used by the compact notation.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Z => 'z',
        }
    }
}

impl fmt::Display for AbilityLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Build action applied to a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepAction {
    /// Places a tower or upgrades it to a higher rank of its family.
    Build(TowerCode),
    /// Raises one ability track of the tower to the given level.
    Ability {
        /// Track being upgraded.
        slot: AbilityLetter,
        /// Level reached after the upgrade.
        level: u8,
    },
}

impl StepAction {
    /// Short code of the action, e.g. `p2` or `y3`.
    #[must_use]
    pub fn short_code(&self) -> String {
        match self {
            Self::Build(code) => code.to_string(),
            Self::Ability { slot, level } => format!("{slot}{level}"),
        }
    }

    /// Reports whether two actions update the same part of a position.
    ///
    /// Tower placements share a track with each other, ability upgrades only
    /// with upgrades of the same slot.
    #[must_use]
    pub fn same_track(&self, other: &StepAction) -> bool {
        match (self, other) {
            (Self::Build(_), Self::Build(_)) => true,
            (Self::Ability { slot, .. }, Self::Ability { slot: other, .. }) => slot == other,
            _ => false,
        }
    }
}

/// Single entry of a build plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    /// Position the action applies to.
    pub position: PositionId,
    /// Action performed at the position.
    pub action: StepAction,
}

impl Step {
    /// Creates a tower placement step.
    #[must_use]
    pub const fn build(position: PositionId, tower: TowerCode) -> Self {
        Self {
            position,
            action: StepAction::Build(tower),
        }
    }

    /// Creates an ability upgrade step.
    #[must_use]
    pub const fn ability(position: PositionId, slot: AbilityLetter, level: u8) -> Self {
        Self {
            position,
            action: StepAction::Ability { slot, level },
        }
    }
}

/// Severity attached to a diagnostic line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// The input was discarded as noise.
    Warning,
    /// The input violated a build rule.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Category of a diagnostic, shared by the streaming and textual paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// The classifier produced no label at all.
    NoDetections,
    /// The best label fell below the confidence threshold.
    LowConfidence,
    /// The classifier produced a label the catalog does not know.
    UnknownLabel,
    /// The region was classified as map scenery rather than a position.
    MapSpace,
    /// A `None` reading contradicted a previously built tower.
    IgnoredNone,
    /// A reading referred to a position the map does not have.
    UnknownPosition,
    /// A tower from another family was placed on an existing tower.
    IllegalFamily,
    /// A tower rank did not increase.
    Downgrade,
    /// An ability upgrade targeted an empty position.
    UpgradeOnNothing,
    /// The tower at the position has no such ability track.
    NoSuchUpgrade,
    /// An ability level exceeded the track's maximum.
    LevelOutOfRange,
    /// An ability level did not increase.
    AbilityDowngrade,
    /// A plan action could not be resolved.
    UnknownAction,
    /// A compact action had no position to apply to.
    MissingPosition,
    /// A compact plan ended with a position and no action.
    IncompleteStep,
    /// A verbose line did not contain exactly a position and an action.
    MalformedStep,
}

/// Where a diagnostic originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    /// A map position observed by the tracker.
    Position(PositionId),
    /// One-based line of a verbose plan.
    Line(usize),
    /// Characters consumed from a stripped compact plan.
    Offset(usize),
}

/// Full-sentence report about rejected input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Warning or error.
    pub severity: Severity,
    /// Tagged category for programmatic inspection.
    pub kind: DiagnosticKind,
    /// Origin of the problem.
    pub location: Location,
    /// Human readable sentence, printed verbatim.
    pub message: String,
}

impl Diagnostic {
    /// Creates a warning diagnostic.
    #[must_use]
    pub fn warning(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            location,
            message: message.into(),
        }
    }

    /// Creates an error diagnostic.
    #[must_use]
    pub fn error(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            location,
            message: message.into(),
        }
    }

    /// Reports whether the diagnostic invalidates the plan.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Location::Position(position) => {
                write!(f, "{} {position}: {}", self.severity, self.message)
            }
            Location::Line(line) => write!(f, "Line {line}: {}", self.message),
            Location::Offset(offset) => write!(f, "@{offset}: {}", self.message),
        }
    }
}

/// Ordered build steps for a map plus the diagnostics gathered while
/// producing them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    map: MapId,
    steps: Vec<Step>,
    diagnostics: Vec<Diagnostic>,
}

impl BuildPlan {
    /// Creates an empty plan for the provided map.
    #[must_use]
    pub fn new(map: MapId) -> Self {
        Self {
            map,
            steps: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Map the plan was built for.
    #[must_use]
    pub const fn map(&self) -> MapId {
        self.map
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Diagnostics in the order they were raised.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Most recent step, if any.
    #[must_use]
    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Appends a step to the end of the plan.
    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Replaces the most recent step, appending when the plan is empty.
    pub fn replace_last_step(&mut self, step: Step) {
        match self.steps.last_mut() {
            Some(last) => *last = step,
            None => self.steps.push(step),
        }
    }

    /// Records a diagnostic.
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Iterator over error diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diagnostic| diagnostic.is_error())
    }

    /// A plan is valid when no error was raised while building it.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }
}

/// Believed state of a single position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionState {
    tower: Option<TowerCode>,
    abilities: BTreeMap<AbilityLetter, u8>,
}

impl PositionState {
    /// Tower standing on the position, `None` while empty.
    #[must_use]
    pub const fn tower(&self) -> Option<TowerCode> {
        self.tower
    }

    /// Recorded level of an ability track, zero when never upgraded.
    #[must_use]
    pub fn ability_level(&self, slot: AbilityLetter) -> u8 {
        self.abilities.get(&slot).copied().unwrap_or(0)
    }

    /// Replaces the tower; ability levels of the previous tower are dropped.
    pub fn set_tower(&mut self, tower: TowerCode) {
        if self.tower != Some(tower) {
            self.abilities.clear();
        }
        self.tower = Some(tower);
    }

    /// Records the level of an ability track.
    pub fn set_ability_level(&mut self, slot: AbilityLetter, level: u8) {
        let _ = self.abilities.insert(slot, level);
    }
}

/// Per-position belief for every position of a map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    positions: BTreeMap<PositionId, PositionState>,
}

impl WorldState {
    /// Creates an empty state for the provided positions.
    #[must_use]
    pub fn new(positions: impl IntoIterator<Item = PositionId>) -> Self {
        Self {
            positions: positions
                .into_iter()
                .map(|position| (position, PositionState::default()))
                .collect(),
        }
    }

    /// State of a position, `None` when the position is not tracked.
    #[must_use]
    pub fn position(&self, position: PositionId) -> Option<&PositionState> {
        self.positions.get(&position)
    }

    /// Mutable state of a position.
    pub fn position_mut(&mut self, position: PositionId) -> Option<&mut PositionState> {
        self.positions.get_mut(&position)
    }

    /// Tower currently believed to stand on the position.
    #[must_use]
    pub fn tower(&self, position: PositionId) -> Option<TowerCode> {
        self.position(position).and_then(PositionState::tower)
    }

    /// Applies a step without validation.
    ///
    /// Callers check the step against the build rules first; steps for
    /// untracked positions are ignored.
    pub fn apply(&mut self, step: &Step) {
        if let Some(state) = self.position_mut(step.position) {
            match step.action {
                StepAction::Build(tower) => state.set_tower(tower),
                StepAction::Ability { slot, level } => state.set_ability_level(slot, level),
            }
        }
    }
}

/// Elapsed scan time rendered the way plan transcripts stamp their ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElapsedTime(Duration);

impl ElapsedTime {
    /// Wraps an elapsed duration.
    #[must_use]
    pub const fn new(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    /// Underlying duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.0
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_seconds = self.0.as_secs();
        let millis = self.0.subsec_millis();

        if total_seconds == 0 && millis > 0 {
            return write!(f, "{millis}ms");
        }

        let hours = total_seconds / 3600;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            write!(f, "{hours:02}:")?;
        }
        write!(f, "{minutes:02}:{seconds:02}")?;
        if millis != 0 && total_seconds < 10 {
            write!(f, ".{millis:03}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    fn position(text: &str) -> PositionId {
        PositionId::parse(text).expect("valid position")
    }

    #[test]
    fn map_id_parses_case_insensitively() {
        assert_eq!(MapId::parse("L14"), Some(MapId::new(14)));
        assert_eq!(MapId::parse("l3"), Some(MapId::new(3)));
        assert_eq!(MapId::parse("L"), None);
        assert_eq!(MapId::parse("L1x"), None);
        assert_eq!(MapId::parse("A1"), None);
        assert_eq!(MapId::new(26).to_string(), "L26");
    }

    #[test]
    fn position_normalises_column_case() {
        assert_eq!(position("a8"), position("A8"));
        assert_eq!(position("a8").to_string(), "A8");
        assert_eq!(PositionId::parse("A"), None);
        assert_eq!(PositionId::parse("A10"), None);
        assert_eq!(PositionId::parse("88"), None);
    }

    #[test]
    fn tower_code_compares_families() {
        let barracks = TowerCode::parse("P1").expect("code");
        let veterans = TowerCode::parse("p3").expect("code");
        let mage = TowerCode::parse("s2").expect("code");
        assert_eq!(barracks.to_string(), "p1");
        assert!(barracks.same_family(veterans));
        assert!(!barracks.same_family(mage));
        assert_eq!(TowerCode::parse("p0"), None);
    }

    #[test]
    fn plan_validity_tracks_error_diagnostics() {
        let mut plan = BuildPlan::new(MapId::new(1));
        plan.push_diagnostic(Diagnostic::warning(
            DiagnosticKind::LowConfidence,
            Location::Position(position("A8")),
            "ignored low confidence Barr (80%)",
        ));
        assert!(plan.is_valid());

        plan.push_diagnostic(Diagnostic::error(
            DiagnosticKind::Downgrade,
            Location::Offset(11),
            "Tower downgrade Barr3 on Barr3 at A8.",
        ));
        assert!(!plan.is_valid());
        assert_eq!(plan.errors().count(), 1);
    }

    #[test]
    fn diagnostics_render_with_their_location() {
        let at = position("A8");
        let streaming = Diagnostic::warning(
            DiagnosticKind::IgnoredNone,
            Location::Position(at),
            "ignored None where previously Barr.",
        );
        assert_eq!(
            streaming.to_string(),
            "WARN A8: ignored None where previously Barr."
        );

        let verbose = Diagnostic::error(DiagnosticKind::Downgrade, Location::Line(3), "x.");
        assert_eq!(verbose.to_string(), "Line 3: x.");

        let compact = Diagnostic::error(DiagnosticKind::Downgrade, Location::Offset(9), "x.");
        assert_eq!(compact.to_string(), "@9: x.");
    }

    #[test]
    fn replacing_last_step_keeps_length() {
        let at = position("A8");
        let mut plan = BuildPlan::new(MapId::new(1));
        plan.push_step(Step::build(at, TowerCode::parse("p1").expect("code")));
        plan.replace_last_step(Step::build(at, TowerCode::parse("p2").expect("code")));
        assert_eq!(plan.steps().len(), 1);
        assert_eq!(plan.steps()[0].action.short_code(), "p2");
    }

    #[test]
    fn tower_change_resets_ability_levels() {
        let at = position("A8");
        let mut world = WorldState::new([at]);
        let tesla = TowerCode::parse("t5").expect("code");
        world.apply(&Step::build(at, tesla));
        world.apply(&Step::ability(at, AbilityLetter::Y, 2));
        assert_eq!(world.position(at).map(|s| s.ability_level(AbilityLetter::Y)), Some(2));

        world.apply(&Step::build(at, tesla));
        assert_eq!(world.position(at).map(|s| s.ability_level(AbilityLetter::Y)), Some(2));

        world.apply(&Step::build(at, TowerCode::parse("t4").expect("code")));
        assert_eq!(world.position(at).map(|s| s.ability_level(AbilityLetter::Y)), Some(0));
    }

    #[test]
    fn elapsed_time_formats_like_transcript_markers() {
        let render = |millis: u64| ElapsedTime::new(Duration::from_millis(millis)).to_string();
        assert_eq!(render(0), "00:00");
        assert_eq!(render(250), "250ms");
        assert_eq!(render(5_000), "00:05");
        assert_eq!(render(2_500), "00:02.500");
        assert_eq!(render(80_000), "01:20");
        assert_eq!(render(3_725_000), "01:02:05");
    }

    #[test]
    fn step_round_trips_through_bincode() {
        assert_round_trip(&Step::ability(position("B5"), AbilityLetter::Z, 3));
    }

    #[test]
    fn build_plan_round_trips_through_bincode() {
        let mut plan = BuildPlan::new(MapId::new(14));
        plan.push_step(Step::build(position("B4"), TowerCode::parse("s4").expect("code")));
        plan.push_diagnostic(Diagnostic::error(
            DiagnosticKind::NoSuchUpgrade,
            Location::Line(2),
            "There is no 'Poly' upgrade for Arca at B4.",
        ));
        assert_round_trip(&plan);
    }
}

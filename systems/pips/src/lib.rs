#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure decoder turning ability pip classifications into ability levels.
//!
//! The game draws the three pips of an ability track strictly in sequence:
//! level two only lights up once level one did. A reading that shows a blue
//! pip after a non-blue one is therefore sensor noise and decodes to no
//! reading at all instead of a guess.

use build_order_core::AbilityLetter;
use build_order_system_classification::{LabelSet, Reduction};
use serde::Deserialize;

/// Output labels of the pip classifier in model order.
pub const PIP_LABELS: [&str; 3] = ["black", "blue", "other"];

/// Confidence a pip label needs before its color is trusted.
pub const DEFAULT_PIP_FLOOR: f32 = 0.90;

/// Color of a single pip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipColor {
    /// Visible but not unlocked.
    Black,
    /// Unlocked.
    Blue,
    /// Anything else, including readings below the confidence floor.
    Other,
}

impl PipColor {
    /// Resolves a classifier label, ignoring case.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "black" => Some(Self::Black),
            "blue" => Some(Self::Blue),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Tunables of the pip decoder.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipConfig {
    /// Minimum confidence, inclusive, for a pip color to count.
    pub confidence_floor: f32,
}

impl Default for PipConfig {
    fn default() -> Self {
        Self {
            confidence_floor: DEFAULT_PIP_FLOOR,
        }
    }
}

/// Decodes the level of an ability track from its three pips.
///
/// Returns the length of the contiguous blue prefix, `Some(0)` when the
/// first pip is black and nothing after it is blue, and `None` when the
/// first pip is unreadable or a blue pip follows a non-blue one.
#[must_use]
pub fn decode(pips: [PipColor; 3]) -> Option<u8> {
    if pips[0] == PipColor::Other {
        return None;
    }

    let prefix = pips
        .iter()
        .take_while(|color| **color == PipColor::Blue)
        .count();
    if pips[prefix..].contains(&PipColor::Blue) {
        return None;
    }

    u8::try_from(prefix).ok()
}

/// Level decoded for one track of an ability circle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotLevel {
    /// Track the pips belong to.
    pub slot: AbilityLetter,
    /// Decoded level, `None` when indeterminate.
    pub level: Option<u8>,
}

/// Pip decoder configured with a confidence floor.
#[derive(Clone, Debug)]
pub struct PipDecoder {
    floor: f32,
    labels: LabelSet,
}

impl Default for PipDecoder {
    fn default() -> Self {
        Self::with_floor(DEFAULT_PIP_FLOOR)
    }
}

impl PipDecoder {
    /// Creates a decoder with the default floor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with a custom floor.
    #[must_use]
    pub fn with_floor(floor: f32) -> Self {
        Self {
            floor,
            labels: LabelSet::new(PIP_LABELS),
        }
    }

    /// Creates a decoder from configuration.
    #[must_use]
    pub fn from_config(config: &PipConfig) -> Self {
        Self::with_floor(config.confidence_floor)
    }

    /// Label set the pip classifier reports against.
    #[must_use]
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Color of a pip, forced to [`PipColor::Other`] below the floor.
    #[must_use]
    pub fn color(&self, reduction: &Reduction) -> PipColor {
        match reduction.best.as_ref() {
            Some(best) if best.confidence >= self.floor => {
                PipColor::from_label(&best.label).unwrap_or(PipColor::Other)
            }
            _ => PipColor::Other,
        }
    }

    /// Decodes one track from its level one, two and three pips.
    #[must_use]
    pub fn decode_slot(&self, pips: &[Reduction; 3]) -> Option<u8> {
        decode([
            self.color(&pips[0]),
            self.color(&pips[1]),
            self.color(&pips[2]),
        ])
    }

    /// Decodes every track of an ability circle.
    #[must_use]
    pub fn decode_circle(&self, slots: &[(AbilityLetter, [Reduction; 3])]) -> Vec<SlotLevel> {
        slots
            .iter()
            .map(|(slot, pips)| SlotLevel {
                slot: *slot,
                level: self.decode_slot(pips),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipColor::{Black, Blue, Other};

    fn pip(label: &str, confidence: f32) -> Reduction {
        Reduction::of(label, confidence)
    }

    #[test]
    fn full_blue_prefix_decodes_to_three() {
        assert_eq!(decode([Blue, Blue, Blue]), Some(3));
    }

    #[test]
    fn blue_then_black_decodes_to_one() {
        assert_eq!(decode([Blue, Black, Black]), Some(1));
        assert_eq!(decode([Blue, Blue, Black]), Some(2));
        assert_eq!(decode([Blue, Other, Other]), Some(1));
    }

    #[test]
    fn black_first_pip_is_level_zero() {
        assert_eq!(decode([Black, Black, Black]), Some(0));
        assert_eq!(decode([Black, Other, Other]), Some(0));
    }

    #[test]
    fn non_monotonic_readings_are_indeterminate() {
        assert_eq!(decode([Black, Blue, Blue]), None);
        assert_eq!(decode([Blue, Black, Blue]), None);
        assert_eq!(decode([Blue, Other, Blue]), None);
    }

    #[test]
    fn unreadable_first_pip_is_indeterminate() {
        assert_eq!(decode([Other, Black, Black]), None);
        assert_eq!(decode([Other, Blue, Blue]), None);
    }

    #[test]
    fn floor_is_inclusive() {
        let decoder = PipDecoder::new();
        assert_eq!(decoder.color(&pip("blue", 0.90)), Blue);
        assert_eq!(decoder.color(&pip("blue", 0.899)), Other);
        assert_eq!(decoder.color(&pip("purple", 0.99)), Other);
        assert_eq!(decoder.color(&Reduction::default()), Other);
    }

    #[test]
    fn low_confidence_pip_breaks_the_prefix() {
        let decoder = PipDecoder::new();
        let pips = [pip("blue", 0.99), pip("blue", 0.50), pip("black", 0.99)];
        assert_eq!(decoder.decode_slot(&pips), Some(1));
    }

    #[test]
    fn circle_decodes_each_track() {
        let decoder = PipDecoder::with_floor(0.8);
        let levels = decoder.decode_circle(&[
            (
                AbilityLetter::X,
                [pip("blue", 0.85), pip("blue", 0.95), pip("black", 0.9)],
            ),
            (
                AbilityLetter::Y,
                [pip("black", 0.99), pip("blue", 0.99), pip("black", 0.99)],
            ),
        ]);
        assert_eq!(
            levels,
            vec![
                SlotLevel {
                    slot: AbilityLetter::X,
                    level: Some(2),
                },
                SlotLevel {
                    slot: AbilityLetter::Y,
                    level: None,
                },
            ]
        );
    }

    #[test]
    fn labels_match_the_pip_classifier() {
        assert_eq!(PipDecoder::new().labels().labels(), PIP_LABELS);
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure reducer that ranks classifier confidences for a single region.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label paired with the confidence the classifier assigned to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scored {
    /// Label name from the label set.
    pub label: String,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f32,
}

impl Scored {
    /// Creates a scored label.
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Best and second best labels for one region.
///
/// `second` is kept for diagnostics only and never drives a decision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reduction {
    /// Highest scoring label, `None` only for an empty label set.
    pub best: Option<Scored>,
    /// Runner-up label.
    pub second: Option<Scored>,
}

impl Reduction {
    /// Reduction whose best label is known up front.
    #[must_use]
    pub fn of(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            best: Some(Scored::new(label, confidence)),
            second: None,
        }
    }

    /// Name of the best label.
    #[must_use]
    pub fn best_label(&self) -> Option<&str> {
        self.best.as_ref().map(|scored| scored.label.as_str())
    }

    /// Confidence of the best label, zero when there is none.
    #[must_use]
    pub fn confidence(&self) -> f32 {
        self.best.as_ref().map_or(0.0, |scored| scored.confidence)
    }
}

/// Fixed, ordered set of labels a classifier emits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Creates a label set in classifier output order.
    #[must_use]
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Labels in output order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Reports whether the set has no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Ranks scores aligned with the label order.
    ///
    /// Missing trailing scores count as zero and extra scores are ignored.
    /// Ties keep the label that appears first.
    #[must_use]
    pub fn reduce(&self, scores: &[f32]) -> Reduction {
        self.rank(|index, _| scores.get(index).copied().unwrap_or(0.0))
    }

    /// Ranks scores keyed by label name, ignoring case.
    ///
    /// Labels absent from the map count as zero.
    #[must_use]
    pub fn reduce_named(&self, scores: &BTreeMap<String, f32>) -> Reduction {
        self.rank(|_, label| {
            scores.get(label).copied().unwrap_or_else(|| {
                scores
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(label))
                    .map_or(0.0, |(_, score)| *score)
            })
        })
    }

    fn rank(&self, mut score_of: impl FnMut(usize, &str) -> f32) -> Reduction {
        let mut best: Option<Scored> = None;
        let mut second: Option<Scored> = None;

        for (index, label) in self.labels.iter().enumerate() {
            let mut confidence = score_of(index, label);
            if confidence.is_nan() {
                confidence = 0.0;
            }

            if best
                .as_ref()
                .map_or(true, |current| confidence > current.confidence)
            {
                second = best.take();
                best = Some(Scored::new(label.clone(), confidence));
            } else if second
                .as_ref()
                .map_or(true, |current| confidence > current.confidence)
            {
                second = Some(Scored::new(label.clone(), confidence));
            }
        }

        Reduction { best, second }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn towers() -> LabelSet {
        LabelSet::new(["Barr", "Mage", "Map", "None"])
    }

    #[test]
    fn best_and_second_follow_confidence() {
        let reduction = towers().reduce(&[0.10, 0.70, 0.05, 0.15]);
        assert_eq!(reduction.best, Some(Scored::new("Mage", 0.70)));
        assert_eq!(reduction.second, Some(Scored::new("None", 0.15)));
        assert_eq!(reduction.best_label(), Some("Mage"));
    }

    #[test]
    fn ties_keep_the_first_label() {
        let reduction = towers().reduce(&[0.40, 0.40, 0.10, 0.10]);
        assert_eq!(reduction.best_label(), Some("Barr"));
        assert_eq!(reduction.second, Some(Scored::new("Mage", 0.40)));
    }

    #[test]
    fn empty_label_set_has_no_best() {
        let reduction = LabelSet::new(Vec::<String>::new()).reduce(&[0.9]);
        assert_eq!(reduction, Reduction::default());
        assert!((reduction.confidence() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn all_zero_scores_still_pick_the_first_label() {
        let reduction = towers().reduce(&[]);
        assert_eq!(reduction.best, Some(Scored::new("Barr", 0.0)));
        assert_eq!(reduction.second, Some(Scored::new("Mage", 0.0)));
    }

    #[test]
    fn named_scores_ignore_case_and_default_to_zero() {
        let scores = BTreeMap::from([("none".to_owned(), 0.97_f32), ("Barr".to_owned(), 0.02)]);
        let reduction = towers().reduce_named(&scores);
        assert_eq!(reduction.best, Some(Scored::new("None", 0.97)));
        assert_eq!(reduction.second, Some(Scored::new("Barr", 0.02)));
    }

    #[test]
    fn nan_scores_count_as_zero() {
        let reduction = towers().reduce(&[f32::NAN, 0.3, 0.0, 0.0]);
        assert_eq!(reduction.best_label(), Some("Mage"));
    }
}

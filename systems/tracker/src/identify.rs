use build_order_catalog::{Catalog, MapLayout, MAP_LABEL};
use build_order_core::MapId;
use build_order_system_classification::Reduction;
use tracing::debug;

/// Number of leading positions probed per map.
pub const PROBE_POSITIONS: usize = 5;

/// Picks the catalog map whose probe positions the frame matches best.
///
/// `probe` classifies the first [`PROBE_POSITIONS`] positions of a candidate
/// map. Readings labelled as map scenery are ignored and the remaining
/// confidences are summed per map. The best map is returned when its sum
/// reaches `threshold`; ties keep the map listed first. `None` means the
/// frame should be retried later.
pub fn identify_map<F>(catalog: &Catalog, threshold: f32, mut probe: F) -> Option<MapId>
where
    F: FnMut(&MapLayout) -> Vec<Reduction>,
{
    let mut best: Option<(MapId, f32)> = None;

    for layout in catalog.maps() {
        let readings = probe(layout);
        let score: f32 = readings
            .iter()
            .take(layout.probe_positions(PROBE_POSITIONS).len())
            .filter(|reading| {
                reading
                    .best_label()
                    .is_some_and(|label| !label.eq_ignore_ascii_case(MAP_LABEL))
            })
            .map(Reduction::confidence)
            .sum();
        debug!(target: "build_order::tracker", map = %layout.id(), score, "map probe");

        if best.map_or(true, |(_, top)| score > top) {
            best = Some((layout.id(), score));
        }
    }

    best.filter(|(_, score)| *score >= threshold)
        .map(|(map, _)| map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builtin().expect("builtin catalog loads")
    }

    #[test]
    fn strongest_matching_map_wins() {
        let catalog = catalog();
        let found = identify_map(&catalog, 0.95, |layout| {
            let confidence = if layout.id() == MapId::new(14) { 0.9 } else { 0.1 };
            vec![Reduction::of("None", confidence); PROBE_POSITIONS]
        });
        assert_eq!(found, Some(MapId::new(14)));
    }

    #[test]
    fn scenery_readings_do_not_count() {
        let catalog = catalog();
        let found = identify_map(&catalog, 0.95, |_| {
            vec![Reduction::of("Map", 0.99); PROBE_POSITIONS]
        });
        assert_eq!(found, None);
    }

    #[test]
    fn weak_frames_are_retried() {
        let catalog = catalog();
        let found = identify_map(&catalog, 0.95, |layout| {
            if layout.id() == MapId::new(2) {
                vec![Reduction::of("Barr", 0.9)]
            } else {
                Vec::new()
            }
        });
        assert_eq!(found, None);
    }

    #[test]
    fn ties_keep_the_first_map() {
        let catalog = catalog();
        let found = identify_map(&catalog, 0.95, |_| {
            vec![Reduction::of("None", 0.5); PROBE_POSITIONS]
        });
        assert_eq!(found, catalog.maps().first().map(MapLayout::id));
    }
}

//! Replays a recorded observation log through the tracker.
//!
//! The log holds the raw classifier scores of every sampled frame:
//!
//! ```json
//! {
//!   "map": "L1",
//!   "ticks": [
//!     { "towers": { "A8": { "Barr": 0.99 } } },
//!     { "abilities": [
//!         { "position": "A8", "slot": "x",
//!           "pips": [{ "blue": 0.98 }, { "black": 0.97 }, { "black": 0.99 }] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! When `map` is omitted the map is identified from the tower scores of the
//! earliest frame that allows it, and the whole log is then replayed.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use build_order_catalog::Catalog;
use build_order_core::{AbilityLetter, BuildPlan, MapId, PositionId};
use build_order_system_classification::{LabelSet, Reduction};
use build_order_system_pips::PipDecoder;
use build_order_system_tracker::{
    identify_map, AbilityReading, ScanSession, TickObservation, TowerReading, PROBE_POSITIONS,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::AppConfig;

type Scores = BTreeMap<String, f32>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReplayLog {
    #[serde(default)]
    map: Option<String>,
    #[serde(default)]
    ticks: Vec<TickRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TickRecord {
    towers: BTreeMap<String, Scores>,
    abilities: Vec<AbilityRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AbilityRecord {
    position: String,
    slot: char,
    pips: [Scores; 3],
}

/// Result of a replay.
#[derive(Debug)]
pub(crate) struct Replay {
    pub(crate) transcript: String,
    pub(crate) plan: BuildPlan,
}

impl ReplayLog {
    pub(crate) fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("observation log is not valid JSON")
    }
}

/// Feeds every frame of the log through reducer, pip decoder and tracker.
///
/// Returns `None` when the map could never be identified.
pub(crate) fn replay(
    log: &ReplayLog,
    catalog: &Catalog,
    config: &AppConfig,
) -> Result<Option<Replay>> {
    let tower_labels = LabelSet::new(catalog.tower_labels());
    let decoder = PipDecoder::from_config(&config.pips);

    let mut frames = log.ticks.iter().enumerate();
    let map = match &log.map {
        Some(name) => {
            MapId::parse(name).with_context(|| format!("malformed map identifier '{name}'"))?
        }
        None => {
            let mut found = None;
            for (index, tick) in frames.by_ref() {
                found = identify(catalog, &tower_labels, tick, config)?;
                if found.is_some() {
                    info!(tick = index, "identified map");
                    break;
                }
                debug!(tick = index, "map not identified, will retry");
            }
            let Some(map) = found else {
                return Ok(None);
            };
            frames = log.ticks.iter().enumerate();
            map
        }
    };

    let mut session = ScanSession::new(catalog, map, config.tracker)?;
    for (index, tick) in frames {
        let observation = observation(tick, &tower_labels, &decoder)
            .with_context(|| format!("tick {index} is malformed"))?;
        session.observe(&observation);
    }

    Ok(Some(Replay {
        transcript: session.transcript(),
        plan: session.finish(),
    }))
}

fn identify(
    catalog: &Catalog,
    labels: &LabelSet,
    tick: &TickRecord,
    config: &AppConfig,
) -> Result<Option<MapId>> {
    let readings = tower_readings(tick, labels)?;
    Ok(identify_map(
        catalog,
        config.tracker.confidence_threshold,
        |layout| {
            layout
                .probe_positions(PROBE_POSITIONS)
                .iter()
                .map(|position| {
                    readings
                        .iter()
                        .find(|reading| reading.position == position.id())
                        .map(|reading| reading.reduction.clone())
                        .unwrap_or_default()
                })
                .collect()
        },
    ))
}

fn observation(
    tick: &TickRecord,
    labels: &LabelSet,
    decoder: &PipDecoder,
) -> Result<TickObservation> {
    let towers = tower_readings(tick, labels)?;

    let mut abilities = Vec::with_capacity(tick.abilities.len());
    for record in &tick.abilities {
        let position = parse_position(&record.position)?;
        let slot = AbilityLetter::from_char(record.slot)
            .with_context(|| format!("unknown ability slot '{}'", record.slot))?;
        let pips: [Reduction; 3] = [
            decoder.labels().reduce_named(&record.pips[0]),
            decoder.labels().reduce_named(&record.pips[1]),
            decoder.labels().reduce_named(&record.pips[2]),
        ];
        abilities.push(AbilityReading {
            position,
            slot,
            level: decoder.decode_slot(&pips),
        });
    }

    Ok(TickObservation { towers, abilities })
}

fn tower_readings(tick: &TickRecord, labels: &LabelSet) -> Result<Vec<TowerReading>> {
    tick.towers
        .iter()
        .map(|(position, scores)| {
            Ok(TowerReading {
                position: parse_position(position)?,
                reduction: labels.reduce_named(scores),
            })
        })
        .collect()
}

fn parse_position(text: &str) -> Result<PositionId> {
    PositionId::parse(text).with_context(|| format!("malformed position '{text}'"))
}

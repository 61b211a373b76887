use build_order_catalog::{
    rules::{self, AbilityRequest},
    Catalog, MapLayout, Notation,
};
use build_order_core::{
    BuildPlan, Diagnostic, Location, PositionId, PositionState, Step, TowerCode, WorldState,
};
use tracing::trace;

/// Accumulates validated steps for one plan while replaying world state.
pub(crate) struct PlanBuilder<'a> {
    catalog: &'a Catalog,
    layout: &'a MapLayout,
    world: WorldState,
    plan: BuildPlan,
    notation: Notation,
}

impl<'a> PlanBuilder<'a> {
    pub(crate) fn new(catalog: &'a Catalog, layout: &'a MapLayout, notation: Notation) -> Self {
        Self {
            catalog,
            layout,
            world: WorldState::new(layout.position_ids()),
            plan: BuildPlan::new(layout.id()),
            notation,
        }
    }

    pub(crate) fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub(crate) fn layout(&self) -> &'a MapLayout {
        self.layout
    }

    /// Resolves a position token against the map.
    pub(crate) fn resolve_position(&self, column: char, row: Option<u8>) -> Option<PositionId> {
        row.and_then(|row| PositionId::new(column, row))
            .filter(|position| self.layout.contains(*position))
    }

    pub(crate) fn current_rank(&self, position: PositionId) -> u8 {
        self.world.tower(position).map_or(0, |tower| tower.rank())
    }

    pub(crate) fn reject(&mut self, diagnostic: Diagnostic) {
        trace!(target: "build_order::grammar", %diagnostic, "rejected");
        self.plan.push_diagnostic(diagnostic);
    }

    /// Places or upgrades a tower when the build rules allow it.
    pub(crate) fn build(&mut self, position: PositionId, tower: TowerCode, location: Location) {
        let previous = self.world.tower(position);
        match rules::check_build(self.catalog, position, previous, tower) {
            Ok(()) => self.accept(Step::build(position, tower)),
            Err(violation) => self.reject(violation.into_diagnostic(location)),
        }
    }

    /// Raises an ability track when the build rules allow it.
    pub(crate) fn ability(
        &mut self,
        position: PositionId,
        request: AbilityRequest<'_>,
        location: Location,
    ) {
        let empty = PositionState::default();
        let state = self.world.position(position).unwrap_or(&empty);
        match rules::check_ability(self.catalog, position, state, request, self.notation) {
            Ok((slot, level)) => self.accept(Step::ability(position, slot, level)),
            Err(violation) => self.reject(violation.into_diagnostic(location)),
        }
    }

    fn accept(&mut self, step: Step) {
        trace!(
            target: "build_order::grammar",
            position = %step.position,
            action = %step.action.short_code(),
            "accepted step"
        );
        self.world.apply(&step);
        self.plan.push_step(step);
    }

    pub(crate) fn finish(self) -> BuildPlan {
        self.plan
    }
}

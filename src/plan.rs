//! Production plan layer
//!
//! A plan is the user's list of blueprints with requested runs and ME/PE.
//! It drives the calculator through the two-phase protocol: register
//! settings for every entry first, then add every entry's primary demand.
//! Registering everything up front matters - a configuration added after
//! demand has propagated would not re-plan past propagation.

use crate::calculator::{CalcError, MaterialCalculator};
use crate::catalog::RecipeCatalog;
use crate::models::Blueprint;

/// ME/PE ranges obtainable in-game; out-of-range input is clamped here,
/// never inside the calculator.
pub const MAX_ME: i32 = 10;
pub const MAX_PE: i32 = 20;

pub fn clamp_me(me: i32) -> i32 {
    me.clamp(0, MAX_ME)
}

pub fn clamp_pe(pe: i32) -> i32 {
    pe.clamp(0, MAX_PE)
}

#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub blueprint: Blueprint,
    /// Runs requested by the user. Secondary entries carry 0 and only mark
    /// their blueprint as selected for building.
    pub runs: i64,
    pub me: i32,
    pub pe: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ProductionPlan {
    entries: Vec<PlanEntry>,
}

impl ProductionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Add a blueprint to the plan. Duplicates by blueprint id are ignored.
    pub fn add_entry(&mut self, blueprint: Blueprint, runs: i64, me: i32, pe: i32) {
        if self.entries.iter().any(|e| e.blueprint.id == blueprint.id) {
            return;
        }

        self.entries.push(PlanEntry {
            blueprint,
            runs,
            me: clamp_me(me),
            pe: clamp_pe(pe),
        });
    }

    pub fn remove_entry(&mut self, blueprint_id: u64) {
        self.entries.retain(|e| e.blueprint.id != blueprint_id);
    }

    /// Build a calculator for the current plan: settings first, demand second.
    pub fn build_calculator<C: RecipeCatalog>(
        &self,
        catalog: C,
    ) -> Result<MaterialCalculator<C>, CalcError> {
        let mut calculator = MaterialCalculator::new(catalog);

        for entry in &self.entries {
            calculator.register_settings(entry.blueprint.id, entry.me, entry.pe)?;
        }

        for entry in &self.entries {
            calculator.add_quantity(
                entry.blueprint.product_id,
                &entry.blueprint.product_name,
                entry.runs * entry.blueprint.output_quantity,
                true,
            )?;
        }

        Ok(calculator)
    }

    /// Drop entries whose product ends up with zero manufacturing runs.
    ///
    /// A secondary entry only earns its place while some other entry's chain
    /// consumes its product; once nothing does, it is dead weight.
    pub fn purge_unbuilt<C: RecipeCatalog>(&mut self, catalog: C) -> Result<(), CalcError> {
        let calculator = self.build_calculator(catalog)?;

        self.entries.retain(|entry| {
            calculator
                .material(entry.blueprint.product_id)
                .is_some_and(|node| node.total_runs() > 0)
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::models::META_GROUP_TECH1;

    fn tech1(id: u64, product_id: u64, output_quantity: i64) -> Blueprint {
        Blueprint {
            id,
            name: format!("Blueprint {id}"),
            product_id,
            product_name: format!("Product {product_id}"),
            output_quantity,
            meta_group: META_GROUP_TECH1,
            max_runs: 0,
            reaction: false,
        }
    }

    /// Product 100 consumes Component 200; both have blueprints.
    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(2, 200, 1), &[(34, "Tritanium", 4)]);
        catalog.add_blueprint(tech1(1, 100, 1), &[(200, "Component", 3)]);
        catalog
    }

    #[test]
    fn entries_are_deduplicated_and_clamped() {
        let mut plan = ProductionPlan::new();
        plan.add_entry(tech1(1, 100, 1), 5, 99, -3);
        plan.add_entry(tech1(1, 100, 1), 7, 0, 0);

        assert_eq!(plan.entries().len(), 1);
        assert_eq!(plan.entries()[0].runs, 5);
        assert_eq!(plan.entries()[0].me, MAX_ME);
        assert_eq!(plan.entries()[0].pe, 0);
    }

    #[test]
    fn build_follows_the_two_phase_protocol() {
        let catalog = catalog();
        let mut plan = ProductionPlan::new();
        // Secondary entry listed after the primary that consumes it; the
        // settings-first phase makes the order irrelevant.
        plan.add_entry(tech1(1, 100, 1), 10, 0, 0);
        plan.add_entry(tech1(2, 200, 1), 0, 0, 0);

        let calculator = plan.build_calculator(&catalog).unwrap();

        let product = calculator.material(100).unwrap();
        assert_eq!(product.primary_quantity(), 10);
        assert_eq!(product.total_runs(), 10);

        // The component is built, not bought: 10 * 3 = 30 runs.
        let component = calculator.material(200).unwrap();
        assert_eq!(component.quantity(), 30);
        assert_eq!(component.total_runs(), 30);
        assert!(calculator.is_built(200));

        assert_eq!(calculator.material(34).unwrap().quantity(), 120);
    }

    #[test]
    fn purge_drops_entries_without_runs() {
        let catalog = catalog();
        let mut plan = ProductionPlan::new();
        plan.add_entry(tech1(1, 100, 1), 10, 0, 0);
        plan.add_entry(tech1(2, 200, 1), 0, 0, 0);

        // Component entry survives while the product entry consumes it.
        plan.purge_unbuilt(&catalog).unwrap();
        assert_eq!(plan.entries().len(), 2);

        // Without the product entry nothing demands the component.
        plan.remove_entry(1);
        plan.purge_unbuilt(&catalog).unwrap();
        assert!(plan.entries().is_empty());
    }
}

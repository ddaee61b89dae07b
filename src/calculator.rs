//! Material calculator: demand propagation over the blueprint graph
//!
//! The calculator owns one node per distinct material id and accumulates
//! demand into it. Adding demand to a material that is selected for building
//! re-plans its manufacturing jobs and pushes the resulting consumption
//! deltas into its submaterials, worklist-style, until the graph settles.
//!
//! Quantities only ever grow. Removing a plan entry means rebuilding the
//! calculator from scratch and replaying the remaining entries; there is no
//! decremental update.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::catalog::RecipeCatalog;
use crate::models::{Blueprint, BlueprintMaterial};

/// Propagation depth limit. The manufacturing chains in the reference data
/// are shallow; hitting this means the data contains a cycle.
const MAX_DEPTH: usize = 20;

#[derive(Debug, Error)]
pub enum CalcError {
    #[error("negative quantity {quantity} for material {material_id}")]
    NegativeQuantity { material_id: u64, quantity: i64 },

    #[error(
        "propagation depth {depth} exceeded at material {material_id} - \
         possible cycle in blueprint data"
    )]
    DepthExceeded { material_id: u64, depth: usize },

    #[error(transparent)]
    Catalog(#[from] anyhow::Error),
}

/// Per-blueprint build selection: a blueprint is "selected for building"
/// iff settings for it were registered.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub blueprint: Option<Blueprint>,
    pub me: i32,
    pub pe: i32,
}

/// One material in the demand graph.
#[derive(Debug)]
pub struct MaterialNode {
    material_id: u64,
    material_name: String,
    /// Total demand: primary demand plus everything propagated from parents.
    quantity: i64,
    /// Demand added directly by the caller as top-level plan entries.
    primary_quantity: i64,
    blueprint: Option<Blueprint>,
    submaterials: Vec<BlueprintMaterial>,
    /// Run counts per queued job, bounded by the blueprint's run cap.
    jobs: Vec<i64>,
    excess: i64,
    /// Quantity currently attributed to each submaterial by the jobs above.
    /// Diffing a recomputation against this yields the propagation delta.
    submaterial_quantities: HashMap<u64, i64>,
}

impl MaterialNode {
    pub fn material_id(&self) -> u64 {
        self.material_id
    }

    pub fn material_name(&self) -> &str {
        &self.material_name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn primary_quantity(&self) -> i64 {
        self.primary_quantity
    }

    pub fn blueprint(&self) -> Option<&Blueprint> {
        self.blueprint.as_ref()
    }

    pub fn jobs(&self) -> &[i64] {
        &self.jobs
    }

    pub fn excess(&self) -> i64 {
        self.excess
    }

    pub fn total_runs(&self) -> i64 {
        self.jobs.iter().sum()
    }

    /// The blueprint, if it is actually usable for manufacturing. Blueprints
    /// with a non-positive output quantity are bad reference data and the
    /// node stays a leaf.
    fn buildable_blueprint(&self) -> Option<&Blueprint> {
        self.blueprint.as_ref().filter(|bp| bp.output_quantity > 0)
    }

    /// Defensive: in every reachable call pattern quantity >= primary already
    /// holds, but job planning must never undershoot the primary request.
    fn needed_quantity(&self) -> i64 {
        self.quantity.max(self.primary_quantity)
    }
}

/// Job plan for one material: run counts per queued job plus the surplus
/// caused by rounding up to whole runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub jobs: Vec<i64>,
    pub excess: i64,
}

/// Split `needed_quantity` units into jobs of whole runs.
///
/// Each job queues `ceil(remaining / output_per_run)` runs, clamped to the
/// run cap when the blueprint is a limited-run copy. Only the final job can
/// overshoot, and by less than one run's output.
pub fn plan_runs(needed_quantity: i64, output_per_run: i64, run_cap: Option<i64>) -> RunPlan {
    debug_assert!(output_per_run > 0);

    let run_cap = run_cap.filter(|&cap| cap > 0);
    let mut jobs = Vec::new();
    let mut remaining = needed_quantity;

    while remaining > 0 {
        let runs_required = ((remaining + output_per_run - 1) / output_per_run).max(1);
        let runs_queued = match run_cap {
            Some(cap) => runs_required.min(cap),
            None => runs_required,
        };

        remaining -= runs_queued * output_per_run;
        jobs.push(runs_queued);
    }

    let produced: i64 = jobs.iter().sum::<i64>() * output_per_run;
    RunPlan {
        jobs,
        excess: produced - needed_quantity.max(0),
    }
}

/// Snapshot of one material for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialInfo {
    pub material_id: u64,
    pub material_name: String,
    pub quantity: i64,
    pub excess: i64,
    pub blueprint_id: Option<u64>,
    pub is_built: bool,
    pub runs: i64,
    pub me: i32,
    pub pe: i32,
}

/// Snapshot of one submaterial edge of a built material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmaterialInfo {
    pub material_id: u64,
    pub material_name: String,
    pub quantity: i64,
    pub blueprint_id: Option<u64>,
    pub is_built: bool,
}

/// Snapshot of one manufacturing job queue for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub blueprint_id: u64,
    pub blueprint_name: String,
    pub runs: i64,
    pub jobs: Vec<i64>,
    pub product_id: u64,
    pub product_quantity: i64,
    pub me: i32,
    pub pe: i32,
}

/// Internal propagation event: newly discovered demand for a material.
#[derive(Debug)]
struct Demand {
    material_id: u64,
    material_name: String,
    quantity: i64,
    is_primary: bool,
    depth: usize,
}

pub struct MaterialCalculator<C> {
    catalog: C,
    settings: HashMap<u64, BuildSettings>,
    materials: HashMap<u64, MaterialNode>,
}

impl<C: RecipeCatalog> MaterialCalculator<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            settings: HashMap::new(),
            materials: HashMap::new(),
        }
    }

    /// Select a blueprint for building. Idempotent upsert; ME/PE are taken
    /// as-is, clamping to sane ranges is the caller's job.
    pub fn register_settings(
        &mut self,
        blueprint_id: u64,
        me: i32,
        pe: i32,
    ) -> Result<(), CalcError> {
        let blueprint = self.catalog.blueprint(blueprint_id)?;
        self.settings
            .insert(blueprint_id, BuildSettings { blueprint, me, pe });
        Ok(())
    }

    pub fn settings(&self, blueprint_id: u64) -> Option<&BuildSettings> {
        self.settings.get(&blueprint_id)
    }

    pub fn material(&self, material_id: u64) -> Option<&MaterialNode> {
        self.materials.get(&material_id)
    }

    /// Whether a material is produced in-plan rather than acquired.
    pub fn is_built(&self, material_id: u64) -> bool {
        self.materials
            .get(&material_id)
            .and_then(|node| node.buildable_blueprint())
            .is_some_and(|bp| self.settings.contains_key(&bp.id))
    }

    /// Add newly discovered demand for a material.
    ///
    /// Creates the node on first reference, accumulates the quantity, and if
    /// the material is selected for building, re-plans its jobs and
    /// propagates consumption deltas into its submaterials.
    ///
    /// Adding demand in increments is equivalent to adding the sum at once:
    /// job and edge recomputation depends only on the accumulated totals,
    /// never on the order deltas arrived in.
    ///
    /// On error the graph may be partially updated; discard the calculator.
    pub fn add_quantity(
        &mut self,
        material_id: u64,
        material_name: &str,
        quantity: i64,
        is_primary: bool,
    ) -> Result<(), CalcError> {
        let mut worklist = VecDeque::new();
        worklist.push_back(Demand {
            material_id,
            material_name: material_name.to_string(),
            quantity,
            is_primary,
            depth: 0,
        });

        while let Some(demand) = worklist.pop_front() {
            self.apply_demand(demand, &mut worklist)?;
        }

        Ok(())
    }

    fn apply_demand(
        &mut self,
        demand: Demand,
        worklist: &mut VecDeque<Demand>,
    ) -> Result<(), CalcError> {
        if demand.quantity < 0 {
            return Err(CalcError::NegativeQuantity {
                material_id: demand.material_id,
                quantity: demand.quantity,
            });
        }

        if demand.depth > MAX_DEPTH {
            return Err(CalcError::DepthExceeded {
                material_id: demand.material_id,
                depth: demand.depth,
            });
        }

        if !self.materials.contains_key(&demand.material_id) {
            let node = self.create_node(demand.material_id, &demand.material_name)?;
            self.materials.insert(demand.material_id, node);
        }

        let node = self
            .materials
            .get_mut(&demand.material_id)
            .expect("node created above");

        node.quantity += demand.quantity;
        if demand.is_primary {
            node.primary_quantity += demand.quantity;
        }

        // Leaf: no blueprint, unusable blueprint, or not selected for
        // building. Demand accumulates and stops here.
        let (blueprint_id, output_quantity, run_cap) = match node.buildable_blueprint() {
            Some(bp) => (bp.id, bp.output_quantity, bp.run_cap()),
            None => return Ok(()),
        };
        let Some(settings) = self.settings.get(&blueprint_id) else {
            return Ok(());
        };
        let me = settings.me;

        let plan = plan_runs(node.needed_quantity(), output_quantity, run_cap);
        node.jobs = plan.jobs;
        node.excess = plan.excess;

        for submaterial in &node.submaterials {
            let new_quantity = edge_quantity(submaterial.quantity, &node.jobs, me);
            let old_quantity = node
                .submaterial_quantities
                .insert(submaterial.material_id, new_quantity)
                .unwrap_or(0);

            let delta = new_quantity - old_quantity;
            if delta != 0 {
                worklist.push_back(Demand {
                    material_id: submaterial.material_id,
                    material_name: submaterial.material_name.clone(),
                    quantity: delta,
                    is_primary: false,
                    depth: demand.depth + 1,
                });
            }
        }

        Ok(())
    }

    fn create_node(&self, material_id: u64, material_name: &str) -> Result<MaterialNode, CalcError> {
        let blueprint = self.catalog.blueprint_for_product(material_id)?;
        let submaterials = match &blueprint {
            Some(bp) => self.catalog.required_materials(bp.id)?,
            None => Vec::new(),
        };

        Ok(MaterialNode {
            material_id,
            material_name: material_name.to_string(),
            quantity: 0,
            primary_quantity: 0,
            blueprint,
            submaterials,
            jobs: Vec::new(),
            excess: 0,
            submaterial_quantities: HashMap::new(),
        })
    }

    /// Snapshot of every material, largest demand first.
    pub fn all_materials(&self) -> Vec<MaterialInfo> {
        let mut result: Vec<MaterialInfo> = self
            .materials
            .values()
            .map(|node| self.material_info(node))
            .collect();

        result.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(a.material_id.cmp(&b.material_id))
        });
        result
    }

    /// Materials with leftover production, largest surplus first. The
    /// `quantity` field carries the surplus.
    pub fn excess_materials(&self) -> Vec<MaterialInfo> {
        let mut result: Vec<MaterialInfo> = self
            .materials
            .values()
            .filter(|node| node.excess != 0)
            .map(|node| {
                let mut info = self.material_info(node);
                info.quantity = node.excess;
                info
            })
            .collect();

        result.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(a.material_id.cmp(&b.material_id))
        });
        result
    }

    /// Immediate submaterials of a built material with the quantities its
    /// current jobs attribute to them, largest first. Empty for leaves and
    /// unknown materials. Pure read.
    pub fn materials_for(&self, material_id: u64) -> Vec<SubmaterialInfo> {
        let Some(node) = self.materials.get(&material_id) else {
            return Vec::new();
        };
        if !self.is_built(material_id) {
            return Vec::new();
        }

        let mut result: Vec<SubmaterialInfo> = node
            .submaterials
            .iter()
            .map(|submaterial| SubmaterialInfo {
                material_id: submaterial.material_id,
                material_name: submaterial.material_name.clone(),
                quantity: node
                    .submaterial_quantities
                    .get(&submaterial.material_id)
                    .copied()
                    .unwrap_or(0),
                blueprint_id: submaterial.material_blueprint_id,
                is_built: submaterial
                    .material_blueprint_id
                    .is_some_and(|id| self.settings.contains_key(&id)),
            })
            .collect();

        result.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(a.material_id.cmp(&b.material_id))
        });
        result
    }

    /// Manufacturing job queues for every built material, largest product
    /// quantity first.
    pub fn jobs_info(&self) -> Vec<JobInfo> {
        let mut result: Vec<JobInfo> = self
            .materials
            .values()
            .filter_map(|node| {
                let blueprint = node.buildable_blueprint()?;
                let settings = self.settings.get(&blueprint.id)?;

                Some(JobInfo {
                    blueprint_id: blueprint.id,
                    blueprint_name: blueprint.name.clone(),
                    runs: node.total_runs(),
                    jobs: node.jobs.clone(),
                    product_id: node.material_id,
                    product_quantity: node.total_runs() * blueprint.output_quantity,
                    me: settings.me,
                    pe: settings.pe,
                })
            })
            .collect();

        result.sort_by(|a, b| {
            b.product_quantity
                .cmp(&a.product_quantity)
                .then(a.blueprint_id.cmp(&b.blueprint_id))
        });
        result
    }

    fn material_info(&self, node: &MaterialNode) -> MaterialInfo {
        let blueprint = node.blueprint.as_ref();
        let settings = node
            .buildable_blueprint()
            .and_then(|bp| self.settings.get(&bp.id));

        MaterialInfo {
            material_id: node.material_id,
            material_name: node.material_name.clone(),
            quantity: node.quantity,
            excess: node.excess,
            blueprint_id: blueprint.map(|bp| bp.id),
            is_built: settings.is_some(),
            runs: node.total_runs(),
            me: settings.map_or(0, |s| s.me),
            pe: settings.map_or(0, |s| s.pe),
        }
    }
}

/// Quantity of a submaterial consumed by the given jobs.
///
/// Material efficiency discounts consumption per run, rounded up per job,
/// but never below one unit per run.
fn edge_quantity(base_quantity: i64, jobs: &[i64], me: i32) -> i64 {
    let factor = 1.0 - f64::from(me) * 0.01;

    jobs.iter()
        .map(|&runs| {
            let discounted = (base_quantity as f64 * runs as f64 * factor).ceil() as i64;
            discounted.max(runs)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::models::{META_GROUP_TECH1, META_GROUP_TECH2};
    use proptest::prelude::*;

    const TRITANIUM: u64 = 34;
    const PYERITE: u64 = 35;

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

    fn tech2(id: u64, product_id: u64, output_quantity: i64, max_runs: i64) -> Blueprint {
        Blueprint {
            max_runs,
            meta_group: META_GROUP_TECH2,
            ..tech1(id, product_id, output_quantity)
        }
    }

    fn calculator(catalog: MemoryCatalog) -> MaterialCalculator<MemoryCatalog> {
        MaterialCalculator::new(catalog)
    }

    // -----------------------------------------------------------------
    // Run planner
    // -----------------------------------------------------------------

    #[test]
    fn plan_runs_uncapped_single_job() {
        let plan = plan_runs(50, 1, None);
        assert_eq!(plan.jobs, vec![50]);
        assert_eq!(plan.excess, 0);
    }

    #[test]
    fn plan_runs_rounds_up_partial_run() {
        let plan = plan_runs(25, 10, None);
        assert_eq!(plan.jobs, vec![3]);
        assert_eq!(plan.excess, 5);
    }

    #[test]
    fn plan_runs_capped_re_evaluates_each_job() {
        // 25 -> 15 -> 5 -> done, one run each.
        let plan = plan_runs(25, 10, Some(1));
        assert_eq!(plan.jobs, vec![1, 1, 1]);
        assert_eq!(plan.excess, 5);
    }

    #[test]
    fn plan_runs_zero_or_negative_need_is_empty() {
        assert_eq!(plan_runs(0, 10, None), RunPlan { jobs: vec![], excess: 0 });
        assert_eq!(plan_runs(-5, 10, Some(3)), RunPlan { jobs: vec![], excess: 0 });
    }

    #[test]
    fn plan_runs_nonpositive_cap_treated_as_uncapped() {
        let plan = plan_runs(25, 10, Some(0));
        assert_eq!(plan.jobs, vec![3]);
    }

    proptest! {
        #[test]
        fn plan_runs_is_minimal(needed in 1i64..100_000, output in 1i64..500, cap in proptest::option::of(1i64..50)) {
            let plan = plan_runs(needed, output, cap);
            let produced: i64 = plan.jobs.iter().sum::<i64>() * output;

            prop_assert!(produced >= needed);
            prop_assert!(plan.excess >= 0);
            prop_assert!(plan.excess < output);
            prop_assert_eq!(plan.excess, produced - needed);
            prop_assert!(plan.jobs.iter().all(|&runs| runs > 0));
            if let Some(cap) = cap {
                prop_assert!(plan.jobs.iter().all(|&runs| runs <= cap));
            }
        }
    }

    // -----------------------------------------------------------------
    // Demand accumulation
    // -----------------------------------------------------------------

    #[test]
    fn leaf_accumulates_without_propagation() {
        let mut calc = calculator(MemoryCatalog::new());
        calc.add_quantity(TRITANIUM, "Tritanium", 100, true).unwrap();
        calc.add_quantity(TRITANIUM, "Tritanium", 50, false).unwrap();

        let node = calc.material(TRITANIUM).unwrap();
        assert_eq!(node.quantity(), 150);
        assert_eq!(node.primary_quantity(), 100);
        assert_eq!(node.excess(), 0);
        assert!(node.jobs().is_empty());
        assert!(!calc.is_built(TRITANIUM));
        assert_eq!(calc.all_materials().len(), 1);
    }

    #[test]
    fn unconfigured_blueprint_stays_leaf() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(1, 100, 1), &[(TRITANIUM, "Tritanium", 10)]);

        let mut calc = calculator(catalog);
        calc.add_quantity(100, "Product 100", 5, true).unwrap();

        let node = calc.material(100).unwrap();
        assert!(node.blueprint().is_some());
        assert!(node.jobs().is_empty());
        assert!(!calc.is_built(100));
        // No demand reached the submaterial.
        assert!(calc.material(TRITANIUM).is_none());
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let mut calc = calculator(MemoryCatalog::new());
        let err = calc.add_quantity(TRITANIUM, "Tritanium", -1, true).unwrap_err();
        assert!(matches!(
            err,
            CalcError::NegativeQuantity { material_id: TRITANIUM, quantity: -1 }
        ));
    }

    #[test]
    fn zero_output_blueprint_is_demoted_to_leaf() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(1, 100, 0), &[(TRITANIUM, "Tritanium", 10)]);

        let mut calc = calculator(catalog);
        calc.register_settings(1, 0, 0).unwrap();
        calc.add_quantity(100, "Product 100", 5, true).unwrap();

        let node = calc.material(100).unwrap();
        assert!(node.jobs().is_empty());
        assert_eq!(node.excess(), 0);
        assert!(!calc.is_built(100));
        assert!(calc.material(TRITANIUM).is_none());
    }

    #[test]
    fn cyclic_blueprint_data_fails_fast() {
        // 100 is made from 200 and 200 is made from 100.
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(1, 100, 1), &[(200, "Product 200", 2)]);
        catalog.add_blueprint(tech1(2, 200, 1), &[(100, "Product 100", 2)]);

        let mut calc = calculator(catalog);
        calc.register_settings(1, 0, 0).unwrap();
        calc.register_settings(2, 0, 0).unwrap();

        let err = calc.add_quantity(100, "Product 100", 1, true).unwrap_err();
        assert!(matches!(err, CalcError::DepthExceeded { .. }));
    }

    // -----------------------------------------------------------------
    // Propagation scenarios
    // -----------------------------------------------------------------

    #[test]
    fn uncapped_tech1_without_discount() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(1, 100, 1), &[(TRITANIUM, "Tritanium", 3)]);

        let mut calc = calculator(catalog);
        calc.register_settings(1, 0, 0).unwrap();
        calc.add_quantity(100, "Product 100", 50, true).unwrap();

        let node = calc.material(100).unwrap();
        assert_eq!(node.jobs(), &[50]);
        assert_eq!(node.excess(), 0);

        assert_eq!(calc.material(TRITANIUM).unwrap().quantity(), 150);

        let subs = calc.materials_for(100);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].quantity, 150);
        assert!(!subs[0].is_built);
    }

    #[test]
    fn capped_copy_with_discount() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech2(1, 100, 10, 1), &[(TRITANIUM, "Tritanium", 5)]);

        let mut calc = calculator(catalog);
        calc.register_settings(1, 10, 0).unwrap();
        calc.add_quantity(100, "Product 100", 25, true).unwrap();

        let node = calc.material(100).unwrap();
        assert_eq!(node.jobs(), &[1, 1, 1]);
        assert_eq!(node.total_runs(), 3);
        assert_eq!(node.excess(), 5);

        // Per single-run job: max(ceil(5 * 1 * 0.9), 1) = 5, three jobs.
        assert_eq!(calc.material(TRITANIUM).unwrap().quantity(), 15);
    }

    #[test]
    fn discount_never_drops_below_one_unit_per_run() {
        // Base quantity 1 with ME 10 would discount to 0.9 per run;
        // consumption must stay at one unit per run.
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(1, 100, 1), &[(TRITANIUM, "Tritanium", 1)]);

        let mut calc = calculator(catalog);
        calc.register_settings(1, 10, 0).unwrap();
        calc.add_quantity(100, "Product 100", 40, true).unwrap();

        assert_eq!(calc.material(TRITANIUM).unwrap().quantity(), 40);
    }

    #[test]
    fn shared_consumers_aggregate() {
        // Two products both consume Tritanium, at 5/run and 3/run.
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(1, 100, 1), &[(TRITANIUM, "Tritanium", 5)]);
        catalog.add_blueprint(tech1(2, 200, 1), &[(TRITANIUM, "Tritanium", 3)]);

        let mut calc = calculator(catalog);
        calc.register_settings(1, 0, 0).unwrap();
        calc.register_settings(2, 0, 0).unwrap();
        calc.add_quantity(100, "Product 100", 10, true).unwrap();
        calc.add_quantity(200, "Product 200", 7, true).unwrap();

        let edge_one = calc.materials_for(100)[0].quantity;
        let edge_two = calc.materials_for(200)[0].quantity;
        assert_eq!(edge_one, 50);
        assert_eq!(edge_two, 21);
        assert_eq!(calc.material(TRITANIUM).unwrap().quantity(), edge_one + edge_two);
    }

    #[test]
    fn multi_level_chain_propagates_through_intermediates() {
        // Product 100 <- Component 200 <- Tritanium.
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(2, 200, 5), &[(TRITANIUM, "Tritanium", 4)]);
        catalog.add_blueprint(tech1(1, 100, 1), &[(200, "Component", 12)]);

        let mut calc = calculator(catalog);
        calc.register_settings(1, 0, 0).unwrap();
        calc.register_settings(2, 0, 0).unwrap();
        calc.add_quantity(100, "Product 100", 10, true).unwrap();

        // 10 runs * 12 = 120 components; 120 / 5 per run = 24 runs.
        let component = calc.material(200).unwrap();
        assert_eq!(component.quantity(), 120);
        assert_eq!(component.jobs(), &[24]);
        assert_eq!(component.excess(), 0);

        assert_eq!(calc.material(TRITANIUM).unwrap().quantity(), 96);
    }

    type NodeSnapshot = (u64, i64, i64, Vec<i64>, i64, Vec<(u64, i64)>);

    fn graph_snapshot(calc: &MaterialCalculator<MemoryCatalog>) -> Vec<NodeSnapshot> {
        let mut nodes: Vec<NodeSnapshot> = calc
            .materials
            .values()
            .map(|n| {
                let mut edges: Vec<(u64, i64)> =
                    n.submaterial_quantities.iter().map(|(&id, &q)| (id, q)).collect();
                edges.sort_by_key(|&(id, _)| id);

                (
                    n.material_id(),
                    n.quantity(),
                    n.primary_quantity(),
                    n.jobs().to_vec(),
                    n.excess(),
                    edges,
                )
            })
            .collect();
        nodes.sort_by_key(|entry| entry.0);
        nodes
    }

    fn confluence_catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(2, 200, 5), &[(TRITANIUM, "Tritanium", 4), (PYERITE, "Pyerite", 7)]);
        catalog.add_blueprint(tech2(1, 100, 3, 10), &[(200, "Component", 12), (PYERITE, "Pyerite", 2)]);
        catalog
    }

    #[test]
    fn incremental_demand_is_confluent() {
        let mut split = calculator(confluence_catalog());
        split.register_settings(1, 5, 0).unwrap();
        split.register_settings(2, 10, 0).unwrap();
        split.add_quantity(100, "Product 100", 10, true).unwrap();
        split.add_quantity(100, "Product 100", 15, true).unwrap();

        let mut whole = calculator(confluence_catalog());
        whole.register_settings(1, 5, 0).unwrap();
        whole.register_settings(2, 10, 0).unwrap();
        whole.add_quantity(100, "Product 100", 25, true).unwrap();

        assert_eq!(graph_snapshot(&split), graph_snapshot(&whole));
    }

    proptest! {
        #[test]
        fn demand_splits_are_confluent(x in 0i64..5_000, y in 0i64..5_000, me in 0i32..10) {
            let mut split = calculator(confluence_catalog());
            split.register_settings(1, me, 0).unwrap();
            split.register_settings(2, me, 0).unwrap();
            split.add_quantity(100, "Product 100", x, true).unwrap();
            split.add_quantity(100, "Product 100", y, true).unwrap();

            let mut whole = calculator(confluence_catalog());
            whole.register_settings(1, me, 0).unwrap();
            whole.register_settings(2, me, 0).unwrap();
            whole.add_quantity(100, "Product 100", x + y, true).unwrap();

            prop_assert_eq!(graph_snapshot(&split), graph_snapshot(&whole));
        }

        #[test]
        fn built_nodes_cover_demand_minimally(quantity in 1i64..50_000, output in 1i64..200, cap in proptest::option::of(1i64..20), me in 0i32..10) {
            let mut catalog = MemoryCatalog::new();
            let blueprint = Blueprint {
                max_runs: cap.unwrap_or(0),
                meta_group: if cap.is_some() { META_GROUP_TECH2 } else { META_GROUP_TECH1 },
                ..tech1(1, 100, output)
            };
            catalog.add_blueprint(blueprint, &[(TRITANIUM, "Tritanium", 3)]);

            let mut calc = calculator(catalog);
            calc.register_settings(1, me, 0).unwrap();
            calc.add_quantity(100, "Product 100", quantity, true).unwrap();

            let node = calc.material(100).unwrap();
            let produced = node.total_runs() * output;
            prop_assert!(produced >= quantity);
            prop_assert_eq!(node.excess(), produced - quantity);
            prop_assert!(node.excess() < output);
        }
    }

    // -----------------------------------------------------------------
    // Projections
    // -----------------------------------------------------------------

    fn projection_calculator() -> MaterialCalculator<MemoryCatalog> {
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(2, 200, 5), &[(TRITANIUM, "Tritanium", 4)]);
        catalog.add_blueprint(
            tech1(1, 100, 1),
            &[(200, "Component", 12), (PYERITE, "Pyerite", 8)],
        );

        let mut calc = calculator(catalog);
        calc.register_settings(1, 0, 5).unwrap();
        calc.register_settings(2, 0, 0).unwrap();
        calc.add_quantity(100, "Product 100", 10, true).unwrap();
        calc
    }

    #[test]
    fn all_materials_sorted_by_quantity_then_id() {
        let calc = projection_calculator();
        let materials = calc.all_materials();

        let order: Vec<(i64, u64)> = materials
            .iter()
            .map(|m| (m.quantity, m.material_id))
            .collect();
        let mut expected = order.clone();
        expected.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        assert_eq!(order, expected);

        let product = materials.iter().find(|m| m.material_id == 100).unwrap();
        assert!(product.is_built);
        assert_eq!(product.runs, 10);
        assert_eq!(product.blueprint_id, Some(1));
        assert_eq!(product.pe, 5);

        let tritanium = materials.iter().find(|m| m.material_id == TRITANIUM).unwrap();
        assert!(!tritanium.is_built);
        assert_eq!(tritanium.blueprint_id, None);
        assert_eq!(tritanium.runs, 0);
    }

    #[test]
    fn materials_for_reports_edges_and_built_flags() {
        let calc = projection_calculator();
        let subs = calc.materials_for(100);
        assert_eq!(subs.len(), 2);

        // 120 components vs 80 pyerite: descending by quantity.
        assert_eq!(subs[0].material_id, 200);
        assert_eq!(subs[0].quantity, 120);
        assert!(subs[0].is_built);
        assert_eq!(subs[1].material_id, PYERITE);
        assert_eq!(subs[1].quantity, 80);
        assert!(!subs[1].is_built);

        // Leaves and unknown ids have no breakdown.
        assert!(calc.materials_for(TRITANIUM).is_empty());
        assert!(calc.materials_for(9999).is_empty());
    }

    #[test]
    fn projections_do_not_mutate_the_graph() {
        let calc = projection_calculator();
        let before = graph_snapshot(&calc);

        let _ = calc.all_materials();
        let _ = calc.materials_for(100);
        let _ = calc.jobs_info();
        let _ = calc.excess_materials();

        assert_eq!(graph_snapshot(&calc), before);
    }

    #[test]
    fn jobs_info_lists_built_materials() {
        let calc = projection_calculator();
        let jobs = calc.jobs_info();
        assert_eq!(jobs.len(), 2);

        // Component job produces 120, product job produces 10.
        assert_eq!(jobs[0].blueprint_id, 2);
        assert_eq!(jobs[0].runs, 24);
        assert_eq!(jobs[0].product_quantity, 120);
        assert_eq!(jobs[1].blueprint_id, 1);
        assert_eq!(jobs[1].jobs, vec![10]);
        assert_eq!(jobs[1].pe, 5);
    }

    #[test]
    fn excess_materials_reports_surplus_only() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_blueprint(tech1(1, 100, 10), &[(TRITANIUM, "Tritanium", 5)]);

        let mut calc = calculator(catalog);
        calc.register_settings(1, 0, 0).unwrap();
        calc.add_quantity(100, "Product 100", 25, true).unwrap();

        let excess = calc.excess_materials();
        assert_eq!(excess.len(), 1);
        assert_eq!(excess[0].material_id, 100);
        assert_eq!(excess[0].quantity, 5);
    }
}

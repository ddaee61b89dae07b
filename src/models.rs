//! Data models for blueprints and their material requirements

/// Meta group ids from the reference data, used to classify blueprints.
pub const META_GROUP_TECH1: u32 = 1;
pub const META_GROUP_TECH2: u32 = 2;

#[derive(Debug, Clone)]
pub struct Blueprint {
    pub id: u64,
    pub name: String,
    pub product_id: u64,
    pub product_name: String,
    /// Units of product per manufacturing run. Non-positive values are
    /// bad reference data; such blueprints are treated as unbuildable.
    pub output_quantity: i64,
    pub meta_group: u32,
    /// Maximum runs per blueprint copy, from the reference data.
    pub max_runs: i64,
    /// Reaction formulas have no run limit and no ME/PE research.
    pub reaction: bool,
}

impl Blueprint {
    pub fn is_tech1(&self) -> bool {
        self.meta_group == META_GROUP_TECH1
    }

    pub fn is_tech2(&self) -> bool {
        self.meta_group == META_GROUP_TECH2
    }

    pub fn is_reaction(&self) -> bool {
        self.reaction
    }

    /// Runs obtainable from a single blueprint instance.
    ///
    /// Tech 1 originals and reactions can be queued without limit; everything
    /// else is assumed to be a limited-run copy.
    pub fn run_cap(&self) -> Option<i64> {
        if self.reaction || self.is_tech1() {
            None
        } else {
            Some(self.max_runs)
        }
    }

    /// Default material efficiency assumed for this blueprint.
    pub fn default_me(&self) -> i32 {
        if self.reaction {
            0
        } else if self.is_tech1() {
            10
        } else if self.is_tech2() {
            2
        } else {
            0
        }
    }

    /// Default time efficiency assumed for this blueprint.
    pub fn default_pe(&self) -> i32 {
        if self.reaction {
            0
        } else if self.is_tech1() {
            10
        } else if self.is_tech2() {
            4
        } else {
            0
        }
    }
}

/// One required input material of a blueprint, base quantity per run.
#[derive(Debug, Clone)]
pub struct BlueprintMaterial {
    pub blueprint_id: u64,
    pub material_id: u64,
    pub material_name: String,
    pub quantity: i64,
    /// Blueprint that manufactures this material, if one exists.
    pub material_blueprint_id: Option<u64>,
}

//! Blueprint catalog abstraction
//!
//! The calculator resolves blueprints and their material lists through this
//! trait, so the engine works the same over the SQLite reference database or
//! an in-memory catalog.

use std::collections::HashMap;

use anyhow::Result;

use crate::models::{Blueprint, BlueprintMaterial};

pub trait RecipeCatalog {
    /// Find the blueprint whose manufacturing product is `product_id`.
    fn blueprint_for_product(&self, product_id: u64) -> Result<Option<Blueprint>>;

    /// Fetch a blueprint by its own id.
    fn blueprint(&self, blueprint_id: u64) -> Result<Option<Blueprint>>;

    /// Required input materials of a blueprint, ordered by material id.
    fn required_materials(&self, blueprint_id: u64) -> Result<Vec<BlueprintMaterial>>;
}

impl<C: RecipeCatalog + ?Sized> RecipeCatalog for &C {
    fn blueprint_for_product(&self, product_id: u64) -> Result<Option<Blueprint>> {
        (**self).blueprint_for_product(product_id)
    }

    fn blueprint(&self, blueprint_id: u64) -> Result<Option<Blueprint>> {
        (**self).blueprint(blueprint_id)
    }

    fn required_materials(&self, blueprint_id: u64) -> Result<Vec<BlueprintMaterial>> {
        (**self).required_materials(blueprint_id)
    }
}

/// In-memory catalog, used for tests and the bundled sample data.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    blueprints: HashMap<u64, Blueprint>,
    materials: HashMap<u64, Vec<BlueprintMaterial>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a blueprint together with its (material_id, name, quantity) inputs.
    pub fn add_blueprint(&mut self, blueprint: Blueprint, inputs: &[(u64, &str, i64)]) {
        let materials = inputs
            .iter()
            .map(|&(material_id, name, quantity)| BlueprintMaterial {
                blueprint_id: blueprint.id,
                material_id,
                material_name: name.to_string(),
                quantity,
                material_blueprint_id: None,
            })
            .collect();

        self.materials.insert(blueprint.id, materials);
        self.blueprints.insert(blueprint.id, blueprint);
        self.refresh_material_links();
    }

    /// Re-resolve material -> producing-blueprint links after insertions, so
    /// registration order does not matter.
    fn refresh_material_links(&mut self) {
        let producers: HashMap<u64, u64> = self
            .blueprints
            .values()
            .map(|bp| (bp.product_id, bp.id))
            .collect();

        for materials in self.materials.values_mut() {
            for material in materials.iter_mut() {
                material.material_blueprint_id = producers.get(&material.material_id).copied();
            }
        }
    }
}

impl RecipeCatalog for MemoryCatalog {
    fn blueprint_for_product(&self, product_id: u64) -> Result<Option<Blueprint>> {
        Ok(self
            .blueprints
            .values()
            .find(|bp| bp.product_id == product_id)
            .cloned())
    }

    fn blueprint(&self, blueprint_id: u64) -> Result<Option<Blueprint>> {
        Ok(self.blueprints.get(&blueprint_id).cloned())
    }

    fn required_materials(&self, blueprint_id: u64) -> Result<Vec<BlueprintMaterial>> {
        let mut materials = self.materials.get(&blueprint_id).cloned().unwrap_or_default();
        materials.sort_by_key(|m| m.material_id);
        Ok(materials)
    }
}

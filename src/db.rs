//! Local database schema and operations
//!
//! The local database is a cooked-down copy of the game reference data:
//! one row per manufacturable blueprint plus its input materials. It is
//! written once by `import` (or `load-sample`) and read-only afterwards.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::catalog::RecipeCatalog;
use crate::models::{Blueprint, BlueprintMaterial};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Manufacturing and reaction blueprints
        CREATE TABLE IF NOT EXISTS blueprints (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            product_id INTEGER NOT NULL,
            product_name TEXT NOT NULL,
            output_quantity INTEGER NOT NULL,
            meta_group INTEGER NOT NULL,
            max_runs INTEGER NOT NULL,
            reaction INTEGER NOT NULL DEFAULT 0
        );

        -- Input materials per blueprint, base quantity per run
        CREATE TABLE IF NOT EXISTS blueprint_materials (
            blueprint_id INTEGER NOT NULL,
            material_id INTEGER NOT NULL,
            material_name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            material_blueprint_id INTEGER,
            PRIMARY KEY (blueprint_id, material_id)
        );

        CREATE INDEX IF NOT EXISTS idx_blueprints_product ON blueprints(product_id);
        CREATE INDEX IF NOT EXISTS idx_blueprints_name ON blueprints(name);
        CREATE INDEX IF NOT EXISTS idx_blueprint_materials_blueprint
            ON blueprint_materials(blueprint_id);
        "#,
    )?;
    Ok(())
}

/// Clear all reference data (for re-import)
pub fn clear_reference_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM blueprint_materials;
        DELETE FROM blueprints;
        "#,
    )?;
    Ok(())
}

/// Insert or replace a blueprint
pub fn upsert_blueprint(conn: &Connection, blueprint: &Blueprint) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO blueprints
            (id, name, product_id, product_name, output_quantity, meta_group, max_runs, reaction)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            blueprint.id,
            &blueprint.name,
            blueprint.product_id,
            &blueprint.product_name,
            blueprint.output_quantity,
            blueprint.meta_group,
            blueprint.max_runs,
            blueprint.reaction,
        ),
    )?;
    Ok(())
}

/// Insert or replace one input material of a blueprint
pub fn upsert_blueprint_material(conn: &Connection, material: &BlueprintMaterial) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO blueprint_materials
            (blueprint_id, material_id, material_name, quantity, material_blueprint_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            material.blueprint_id,
            material.material_id,
            &material.material_name,
            material.quantity,
            material.material_blueprint_id,
        ),
    )?;
    Ok(())
}

const BLUEPRINT_COLUMNS: &str =
    "id, name, product_id, product_name, output_quantity, meta_group, max_runs, reaction";

fn blueprint_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Blueprint> {
    Ok(Blueprint {
        id: row.get(0)?,
        name: row.get(1)?,
        product_id: row.get(2)?,
        product_name: row.get(3)?,
        output_quantity: row.get(4)?,
        meta_group: row.get(5)?,
        max_runs: row.get(6)?,
        reaction: row.get(7)?,
    })
}

/// Fetch a blueprint by id
pub fn blueprint_by_id(conn: &Connection, blueprint_id: u64) -> Result<Option<Blueprint>> {
    let query = format!("SELECT {BLUEPRINT_COLUMNS} FROM blueprints WHERE id = ?1");
    let blueprint = conn
        .query_row(&query, [blueprint_id], blueprint_from_row)
        .optional()?;
    Ok(blueprint)
}

/// Fetch a blueprint by its exact name
pub fn blueprint_by_name(conn: &Connection, name: &str) -> Result<Option<Blueprint>> {
    let query = format!("SELECT {BLUEPRINT_COLUMNS} FROM blueprints WHERE name = ?1");
    let blueprint = conn
        .query_row(&query, [name], blueprint_from_row)
        .optional()?;
    Ok(blueprint)
}

/// Find the blueprint producing a given material
pub fn blueprint_for_product(conn: &Connection, product_id: u64) -> Result<Option<Blueprint>> {
    let query = format!(
        "SELECT {BLUEPRINT_COLUMNS} FROM blueprints WHERE product_id = ?1 ORDER BY id LIMIT 1"
    );
    let blueprint = conn
        .query_row(&query, [product_id], blueprint_from_row)
        .optional()?;
    Ok(blueprint)
}

/// List all blueprints ordered by name
pub fn list_blueprints(conn: &Connection) -> Result<Vec<Blueprint>> {
    let query = format!("SELECT {BLUEPRINT_COLUMNS} FROM blueprints ORDER BY name");
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], blueprint_from_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Input materials of a blueprint, ordered by material id
pub fn required_materials(conn: &Connection, blueprint_id: u64) -> Result<Vec<BlueprintMaterial>> {
    let mut stmt = conn.prepare(
        "SELECT blueprint_id, material_id, material_name, quantity, material_blueprint_id
         FROM blueprint_materials
         WHERE blueprint_id = ?1
         ORDER BY material_id",
    )?;

    let rows = stmt.query_map([blueprint_id], |row| {
        Ok(BlueprintMaterial {
            blueprint_id: row.get(0)?,
            material_id: row.get(1)?,
            material_name: row.get(2)?,
            quantity: row.get(3)?,
            material_blueprint_id: row.get(4)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Catalog view over the local database
pub struct SqliteCatalog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCatalog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl RecipeCatalog for SqliteCatalog<'_> {
    fn blueprint_for_product(&self, product_id: u64) -> Result<Option<Blueprint>> {
        blueprint_for_product(self.conn, product_id)
    }

    fn blueprint(&self, blueprint_id: u64) -> Result<Option<Blueprint>> {
        blueprint_by_id(self.conn, blueprint_id)
    }

    fn required_materials(&self, blueprint_id: u64) -> Result<Vec<BlueprintMaterial>> {
        required_materials(self.conn, blueprint_id)
    }
}

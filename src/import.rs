//! Reference data import
//!
//! Cooks a game static-data SQLite dump into the local schema: one row per
//! manufacturing or reaction blueprint plus its input materials. Everything
//! else in the dump (market data, map data, ...) is ignored.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::db;
use crate::models::{Blueprint, BlueprintMaterial};

/// Manufacturing and reaction activity ids in the static data.
const ACTIVITY_MANUFACTURING: u32 = 1;
const ACTIVITY_REACTION: u32 = 11;

#[derive(Debug, Default)]
pub struct ImportStats {
    pub blueprints: usize,
    pub materials: usize,
    pub skipped: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} blueprints ({} material rows). Skipped: {}",
            self.blueprints, self.materials, self.skipped
        )
    }
}

/// Import blueprints and their materials from a static-data dump.
pub fn import_reference_data(conn: &Connection, sde_path: &Path) -> Result<ImportStats> {
    let source = Connection::open(sde_path)
        .with_context(|| format!("Failed to open static data dump {}", sde_path.display()))?;

    let mut stats = ImportStats::default();
    let tx = conn.unchecked_transaction()?;

    import_blueprints(conn, &source, &mut stats)?;
    import_materials(conn, &source, &mut stats)?;

    tx.commit()?;
    Ok(stats)
}

fn import_blueprints(conn: &Connection, source: &Connection, stats: &mut ImportStats) -> Result<()> {
    // One row per published blueprint type; product columns are NULL for
    // types without a manufacturing or reaction product.
    let mut stmt = source
        .prepare(
            "SELECT DISTINCT ia.typeID AS id,
                it.typeName AS name,
                (SELECT productTypeID FROM industryActivityProducts
                    WHERE typeID = ia.typeID AND activityID IN (?1, ?2)) AS product_id,
                (SELECT typeName FROM invTypes WHERE published = '1' AND typeID IN
                    (SELECT productTypeID FROM industryActivityProducts
                        WHERE typeID = ia.typeID AND activityID IN (?1, ?2))) AS product_name,
                (SELECT quantity FROM industryActivityProducts
                    WHERE typeID = ia.typeID AND activityID IN (?1, ?2)) AS output_quantity,
                COALESCE((SELECT metaGroupID FROM invMetaTypes WHERE typeID =
                    (SELECT productTypeID FROM industryActivityProducts
                        WHERE typeID = ia.typeID AND activityID IN (?1, ?2))), 1) AS meta_group,
                COALESCE((SELECT maxProductionLimit FROM industryBlueprints
                    WHERE typeID = ia.typeID), 0) AS max_runs,
                COALESCE((SELECT time FROM industryActivity
                    WHERE typeID = ia.typeID AND activityID = ?2), 0) AS reaction_time
             FROM industryActivity ia LEFT JOIN invTypes it USING (typeID)
             WHERE it.published = '1'",
        )
        .context("Static data dump is missing the industryActivity tables")?;

    let rows = stmt.query_map([ACTIVITY_MANUFACTURING, ACTIVITY_REACTION], |row| {
        let product_id: Option<u64> = row.get(2)?;
        let product_name: Option<String> = row.get(3)?;
        let output_quantity: Option<i64> = row.get(4)?;
        let reaction_time: i64 = row.get(7)?;

        Ok((
            product_id,
            product_name,
            output_quantity,
            Blueprint {
                id: row.get(0)?,
                name: row.get(1)?,
                product_id: 0,
                product_name: String::new(),
                output_quantity: 0,
                meta_group: row.get(5)?,
                max_runs: row.get(6)?,
                reaction: reaction_time > 0,
            },
        ))
    })?;

    for row in rows {
        let (product_id, product_name, output_quantity, mut blueprint) = row?;

        // Blueprints without a product can't feed the calculator.
        let (Some(product_id), Some(product_name), Some(output_quantity)) =
            (product_id, product_name, output_quantity)
        else {
            stats.skipped += 1;
            continue;
        };

        blueprint.product_id = product_id;
        blueprint.product_name = product_name;
        blueprint.output_quantity = output_quantity;

        db::upsert_blueprint(conn, &blueprint)?;
        stats.blueprints += 1;
    }

    Ok(())
}

fn import_materials(conn: &Connection, source: &Connection, stats: &mut ImportStats) -> Result<()> {
    let mut stmt = source
        .prepare(
            "SELECT iam.typeID AS blueprint_id,
                iam.materialTypeID AS material_id,
                it.typeName AS material_name,
                iam.quantity AS quantity,
                (SELECT iap.typeID FROM industryActivityProducts iap
                    LEFT JOIN invTypes it2 ON (iap.typeID = it2.typeID)
                    WHERE it2.published = '1' AND iap.activityID IN (?1, ?2)
                        AND iap.productTypeID = iam.materialTypeID) AS material_blueprint_id
             FROM industryActivityMaterials iam
                LEFT JOIN invTypes it ON (iam.materialTypeID = it.typeID)
             WHERE it.published = '1' AND iam.activityID IN (?1, ?2)",
        )
        .context("Static data dump is missing the industryActivityMaterials table")?;

    let rows = stmt.query_map([ACTIVITY_MANUFACTURING, ACTIVITY_REACTION], |row| {
        Ok(BlueprintMaterial {
            blueprint_id: row.get(0)?,
            material_id: row.get(1)?,
            material_name: row.get(2)?,
            quantity: row.get(3)?,
            material_blueprint_id: row.get(4)?,
        })
    })?;

    for row in rows {
        let material = row?;

        // Material rows for blueprints we skipped above are dropped too.
        if db::blueprint_by_id(conn, material.blueprint_id)?.is_none() {
            stats.skipped += 1;
            continue;
        }

        db::upsert_blueprint_material(conn, &material)?;
        stats.materials += 1;
    }

    Ok(())
}

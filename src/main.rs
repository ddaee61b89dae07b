//! Industry material calculator
//!
//! Computes total material requirements, manufacturing jobs and production
//! surplus for a plan of blueprints, expanding the bill of materials
//! recursively with ME discounts and per-copy run caps.

mod calculator;
mod catalog;
mod db;
mod import;
mod models;
mod plan;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use regex::RegexBuilder;
use rusqlite::Connection;

use crate::calculator::MaterialCalculator;
use crate::db::SqliteCatalog;
use crate::models::{Blueprint, BlueprintMaterial, META_GROUP_TECH1, META_GROUP_TECH2};
use crate::plan::ProductionPlan;

#[derive(Parser)]
#[command(name = "industry-calculator")]
#[command(about = "Manufacturing material calculator for EVE Online industry")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "industry.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import blueprints from a static data export dump
    Import {
        /// Path to the static data SQLite dump
        sde: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// Calculate materials and jobs for a production plan
    Calc {
        /// Plan entry as "NAME=RUNS[:ME[:PE]]"; repeat for more blueprints.
        /// RUNS of 0 marks the blueprint as built-in-plan without its own
        /// production target.
        #[arg(short, long = "entry", required = true)]
        entries: Vec<String>,

        /// Show the submaterial breakdown per plan entry
        #[arg(short, long)]
        verbose: bool,
    },

    /// List all blueprints in the database
    ListBlueprints,

    /// Search blueprints by name (regular expression, case-insensitive)
    Search {
        /// Pattern to match against blueprint names
        pattern: String,
    },

    /// Show details for a specific blueprint
    Blueprint {
        /// Exact blueprint name
        name: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without a static data dump)
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Import { sde, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_reference_data(&conn)?;
            }

            let stats = import::import_reference_data(&conn, &sde)?;
            println!("{}", stats);
        }

        Commands::Calc { entries, verbose } => {
            run_calc(&conn, &entries, verbose)?;
        }

        Commands::ListBlueprints => {
            let blueprints = db::list_blueprints(&conn)?;
            if blueprints.is_empty() {
                println!("No blueprints in database. Run 'import' or 'load-sample' first.");
            } else {
                print_blueprint_table(&blueprints);
            }
        }

        Commands::Search { pattern } => {
            let re = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid pattern '{}'", pattern))?;

            let matches: Vec<Blueprint> = db::list_blueprints(&conn)?
                .into_iter()
                .filter(|b| re.is_match(&b.name))
                .collect();

            if matches.is_empty() {
                println!("No blueprints matching '{}'", pattern);
            } else {
                print_blueprint_table(&matches);
            }
        }

        Commands::Blueprint { name } => {
            let Some(blueprint) = db::blueprint_by_name(&conn, &name)? else {
                println!("Blueprint '{}' not found", name);
                return Ok(());
            };

            print_blueprint_details(&conn, &blueprint)?;
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

/// Parsed form of one --entry argument.
fn parse_entry(spec: &str) -> Result<(String, i64, Option<i32>, Option<i32>)> {
    let (name, rest) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected NAME=RUNS[:ME[:PE]], got '{}'", spec))?;

    let mut parts = rest.split(':');
    let runs = parts
        .next()
        .unwrap_or_default()
        .trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid run count in '{}'", spec))?;
    if runs < 0 {
        bail!("Run count must not be negative in '{}'", spec);
    }

    let me = parts
        .next()
        .map(|s| s.trim().parse::<i32>())
        .transpose()
        .with_context(|| format!("Invalid ME in '{}'", spec))?;
    let pe = parts
        .next()
        .map(|s| s.trim().parse::<i32>())
        .transpose()
        .with_context(|| format!("Invalid PE in '{}'", spec))?;

    if parts.next().is_some() {
        bail!("Too many fields in '{}', expected NAME=RUNS[:ME[:PE]]", spec);
    }

    Ok((name.trim().to_string(), runs, me, pe))
}

fn run_calc(conn: &Connection, entries: &[String], verbose: bool) -> Result<()> {
    let mut plan = ProductionPlan::new();

    for spec in entries {
        let (name, runs, me, pe) = parse_entry(spec)?;
        let blueprint = db::blueprint_by_name(conn, &name)?
            .ok_or_else(|| anyhow!("Blueprint '{}' not found", name))?;

        let me = me.unwrap_or_else(|| blueprint.default_me());
        let pe = pe.unwrap_or_else(|| blueprint.default_pe());
        plan.add_entry(blueprint, runs, me, pe);
    }

    let catalog = SqliteCatalog::new(conn);
    let calculator = plan.build_calculator(&catalog)?;

    println!("Materials:");
    println!("{:<30} {:>12} {:>8} {:>6}", "Material", "Quantity", "Runs", "Built");
    println!("{}", "-".repeat(60));
    for material in calculator.all_materials() {
        println!(
            "{:<30} {:>12} {:>8} {:>6}",
            material.material_name,
            material.quantity,
            material.runs,
            if material.is_built { "yes" } else { "-" }
        );
    }

    let jobs = calculator.jobs_info();
    if !jobs.is_empty() {
        println!();
        println!("Manufacturing jobs:");
        println!(
            "{:<30} {:>6} {:>4} {:>4} {:>10}  {}",
            "Blueprint", "Runs", "ME", "PE", "Produces", "Job queue"
        );
        println!("{}", "-".repeat(80));
        for job in &jobs {
            println!(
                "{:<30} {:>6} {:>4} {:>4} {:>10}  {}",
                job.blueprint_name,
                job.runs,
                job.me,
                job.pe,
                job.product_quantity,
                format_jobs(&job.jobs)
            );
        }
    }

    let excess = calculator.excess_materials();
    if !excess.is_empty() {
        println!();
        println!("Excess production:");
        for material in &excess {
            println!("  {:<30} {:>12}", material.material_name, material.quantity);
        }
    }

    if verbose {
        for entry in plan.entries() {
            print_submaterials(&calculator, entry.blueprint.product_id, &entry.blueprint.product_name);
        }
    }

    Ok(())
}

fn print_submaterials<C: catalog::RecipeCatalog>(
    calculator: &MaterialCalculator<C>,
    product_id: u64,
    product_name: &str,
) {
    let submaterials = calculator.materials_for(product_id);
    if submaterials.is_empty() {
        return;
    }

    println!();
    println!("Materials for {}:", product_name);
    for sub in submaterials {
        println!(
            "  {:<30} {:>12} {}",
            sub.material_name,
            sub.quantity,
            if sub.is_built { "(built)" } else { "" }
        );
    }
}

/// Job queue as "3x50 + 1x20" style text.
fn format_jobs(jobs: &[i64]) -> String {
    let mut groups: Vec<(i64, usize)> = Vec::new();
    for &runs in jobs {
        match groups.last_mut() {
            Some((r, count)) if *r == runs => *count += 1,
            _ => groups.push((runs, 1)),
        }
    }

    groups
        .iter()
        .map(|(runs, count)| format!("{}x{}", count, runs))
        .collect::<Vec<_>>()
        .join(" + ")
}

fn print_blueprint_table(blueprints: &[Blueprint]) {
    println!("{:<40} {:<30} {:>8} {:>8}", "Blueprint", "Product", "Output", "Cap");
    println!("{}", "-".repeat(90));
    for b in blueprints {
        let cap = match b.run_cap() {
            Some(cap) => cap.to_string(),
            None => "-".to_string(),
        };
        println!(
            "{:<40} {:<30} {:>8} {:>8}",
            b.name, b.product_name, b.output_quantity, cap
        );
    }
}

fn print_blueprint_details(conn: &Connection, blueprint: &Blueprint) -> Result<()> {
    println!("Blueprint: {}", blueprint.name);
    println!("  ID: {}", blueprint.id);
    println!(
        "  Product: {} x{} (id {})",
        blueprint.product_name, blueprint.output_quantity, blueprint.product_id
    );

    let kind = if blueprint.is_reaction() {
        "reaction"
    } else if blueprint.is_tech2() {
        "tech 2"
    } else if blueprint.is_tech1() {
        "tech 1"
    } else {
        "other"
    };
    println!("  Kind: {}", kind);

    match blueprint.run_cap() {
        Some(cap) => println!("  Run cap: {} per copy", cap),
        None => println!("  Run cap: unlimited"),
    }
    println!(
        "  Defaults: ME {} / PE {}",
        blueprint.default_me(),
        blueprint.default_pe()
    );

    let materials = db::required_materials(conn, blueprint.id)?;
    if !materials.is_empty() {
        println!("  Materials per run:");
        for m in materials {
            println!(
                "    {:<30} {:>10} {}",
                m.material_name,
                m.quantity,
                if m.material_blueprint_id.is_some() { "(buildable)" } else { "" }
            );
        }
    }

    Ok(())
}

/// Load a small blueprint chain for trying out the calculator without a
/// static data dump.
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_reference_data(conn)?;

    // Rifter: tech 1 hull built from minerals and construction blocks
    let rifter = Blueprint {
        id: 1001,
        name: "Rifter Blueprint".to_string(),
        product_id: 2001,
        product_name: "Rifter".to_string(),
        output_quantity: 1,
        meta_group: META_GROUP_TECH1,
        max_runs: 300,
        reaction: false,
    };
    db::upsert_blueprint(conn, &rifter)?;
    for (material_id, name, quantity, material_blueprint_id) in [
        (34u64, "Tritanium", 28000i64, None),
        (35, "Pyerite", 5200, None),
        (36, "Mexallon", 1800, None),
        (3828, "Construction Blocks", 60, Some(1002)),
    ] {
        db::upsert_blueprint_material(
            conn,
            &BlueprintMaterial {
                blueprint_id: 1001,
                material_id,
                material_name: name.to_string(),
                quantity,
                material_blueprint_id,
            },
        )?;
    }

    // Construction Blocks: buildable intermediate consumed by both hulls
    let blocks = Blueprint {
        id: 1002,
        name: "Construction Blocks Blueprint".to_string(),
        product_id: 3828,
        product_name: "Construction Blocks".to_string(),
        output_quantity: 1,
        meta_group: META_GROUP_TECH1,
        max_runs: 600,
        reaction: false,
    };
    db::upsert_blueprint(conn, &blocks)?;
    for (material_id, name, quantity) in [(34u64, "Tritanium", 120i64), (35, "Pyerite", 36)] {
        db::upsert_blueprint_material(
            conn,
            &BlueprintMaterial {
                blueprint_id: 1002,
                material_id,
                material_name: name.to_string(),
                quantity,
                material_blueprint_id: None,
            },
        )?;
    }

    // Hobgoblin II: tech 2 copy with a run cap, to exercise job splitting
    let hobgoblin = Blueprint {
        id: 1003,
        name: "Hobgoblin II Blueprint".to_string(),
        product_id: 2002,
        product_name: "Hobgoblin II".to_string(),
        output_quantity: 1,
        meta_group: META_GROUP_TECH2,
        max_runs: 10,
        reaction: false,
    };
    db::upsert_blueprint(conn, &hobgoblin)?;
    for (material_id, name, quantity, material_blueprint_id) in [
        (34u64, "Tritanium", 4200i64, None),
        (3828, "Construction Blocks", 15, Some(1002)),
        (11399, "Morphite", 4, None),
    ] {
        db::upsert_blueprint_material(
            conn,
            &BlueprintMaterial {
                blueprint_id: 1003,
                material_id,
                material_name: name.to_string(),
                quantity,
                material_blueprint_id,
            },
        )?;
    }

    println!("Loaded {} sample blueprints", 3);
    Ok(())
}

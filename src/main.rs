//! Planetary Colony Simulator
//!
//! Replays a planetary colony from its installed facilities.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use pi_colony::catalog::TypeCatalog;
use pi_colony::config::SimConfig;
use pi_colony::description::ColonyDescription;
use pi_colony::models::{Colony, FacilityRole, TypeId};
use pi_colony::{build_colony, db, extraction, import, report, simulate, timespec};

#[derive(Parser)]
#[command(name = "pi-colony")]
#[command(about = "Replay planetary colonies from their installed facilities")]
struct Cli {
    /// Path to the SQLite reference database
    #[arg(short, long, default_value = "pi_reference.db")]
    database: PathBuf,

    /// Simulation config (JSON); falls back to $PI_COLONY_CONFIG, then defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import types and planetary schematics from the static data export
    Import {
        /// Directory containing types.jsonl and planetSchematics.jsonl
        export_dir: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// Simulate a colony and show its current state
    Simulate {
        /// Colony description as returned by the planets API
        colony: PathBuf,

        /// Target time: "now", RFC 3339, or a span from install such as +36h
        #[arg(short, long, default_value = "now")]
        until: String,

        /// List every simulated step
        #[arg(short, long)]
        verbose: bool,

        /// Print the full report as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Show the yield history of one extractor
    Yield {
        /// Colony description as returned by the planets API
        colony: PathBuf,

        /// Extractor pin id
        pin: i64,

        /// Target time: "now", RFC 3339, or a span from install such as +36h
        #[arg(short, long, default_value = "now")]
        until: String,
    },

    /// List all planetary schematics in the database
    ListSchematics,

    /// List all planetary facility types
    ListFacilities,

    /// Show details for a specific schematic
    Schematic {
        /// Schematic ID
        id: i32,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without the export)
    LoadSample,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Import { export_dir, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_reference_data(&conn)?;
            }

            let stats = import::import_to_database(&conn, &export_dir)?;
            println!("{}", stats);
        }

        Commands::Simulate {
            colony,
            until,
            verbose,
            json,
        } => {
            let config = SimConfig::load(cli.config.as_deref())?;
            let colony = load_colony(&conn, &colony)?;
            let until = timespec::parse_until(&until, colony.install_time, Utc::now())?;
            let result = simulate(&colony, until, &config);

            if json {
                println!("{}", serde_json::to_string_pretty(&result.snapshots)?);
                return Ok(());
            }

            for warning in &result.warnings {
                println!("warning: {}", warning);
            }

            let names = type_names(&conn, &colony)?;
            if verbose {
                println!("{} steps:", result.snapshots.len());
                for snapshot in &result.snapshots {
                    let totals = report::colony_totals(snapshot);
                    let summary: Vec<String> = totals
                        .iter()
                        .map(|(id, qty)| format!("{} {}", qty, name_of(&names, *id)))
                        .collect();
                    println!("  {}  {}", snapshot.timestamp.to_rfc3339(), summary.join(", "));
                }
                println!();
            }

            let current = result.current();
            println!(
                "Planet {} at {} ({} steps since {})",
                colony.planet_id,
                current.timestamp.to_rfc3339(),
                result.snapshots.len(),
                colony.install_time.to_rfc3339()
            );
            println!("{:<14} {:<28} {:<11} {:>6}  Contents", "Pin", "Facility", "Status", "Fill");
            println!("{}", "-".repeat(76));
            for pin in &colony.pins {
                let fill = report::fill_ratio(&colony, current, pin.id)
                    .map(|r| format!("{:.0}%", r * 100.0))
                    .unwrap_or_else(|| "-".to_string());
                let contents = current
                    .pin(pin.id)
                    .map(|state| {
                        state
                            .contents
                            .iter()
                            .map(|(id, qty)| format!("{} {}", qty, name_of(&names, *id)))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                println!(
                    "{:<14} {:<28} {:<11} {:>6}  {}",
                    pin.id,
                    name_of(&names, pin.type_id),
                    report::pin_status(current, pin.id),
                    fill,
                    contents
                );
            }
        }

        Commands::Yield { colony, pin, until } => {
            let config = SimConfig::load(cli.config.as_deref())?;
            let colony = load_colony(&conn, &colony)?;
            let Some((extractor_pin, extractor)) =
                colony.pin(pin).and_then(|p| p.extractor().map(|e| (p, e)))
            else {
                let extractors = report::pins_with_role(&colony, FacilityRole::Extractor);
                bail!(
                    "pin {} is not an extractor in this colony (extractors: {:?})",
                    pin,
                    extractors
                );
            };
            let until = timespec::parse_until(&until, colony.install_time, Utc::now())?;
            let result = simulate(&colony, until, &config);

            let history = report::yield_history(&result.snapshots, pin);
            for point in &history {
                println!("{}  {:>8}", point.timestamp.to_rfc3339(), point.quantity);
            }

            let cycles = extractor.program_cycles(extractor_pin.install_time);
            let expected =
                extraction::program_total(extractor.base_value, extractor.cycle_time, cycles);
            let produced: u64 = history.iter().map(|p| p.quantity).sum();
            println!();
            println!(
                "{} of {} cycles complete, {} units so far ({:.0}/h), {} expected over the program",
                history.len(),
                cycles,
                produced,
                report::hourly_rate(&history, extractor.cycle_time),
                expected
            );
        }

        Commands::ListSchematics => {
            let schematics = db::list_schematics(&conn)?;
            if schematics.is_empty() {
                println!("No schematics in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:>6} {:<32} {:>10}", "ID", "Schematic", "Cycle (s)");
                println!("{}", "-".repeat(50));
                for (id, name, cycle_time) in schematics {
                    println!("{:>6} {:<32} {:>10}", id, name, cycle_time);
                }
            }
        }

        Commands::ListFacilities => {
            let facilities = db::list_facilities(&conn)?;
            if facilities.is_empty() {
                println!("No facilities in database. Run 'import' or 'load-sample' first.");
            } else {
                for f in facilities {
                    let role = FacilityRole::from_group(f.group_id)
                        .map(|r| format!("{:?}", r))
                        .unwrap_or_default();
                    let capacity = f
                        .capacity
                        .map(|c| format!("{} m3", c))
                        .unwrap_or_default();
                    println!("{:>6} {:<40} {:<14} {}", f.type_id, f.name, role, capacity);
                }
            }
        }

        Commands::Schematic { id } => match db::get_schematic(&conn, id)? {
            Some(s) => {
                let mut ids: Vec<TypeId> = s.inputs.iter().map(|(t, _)| *t).collect();
                ids.push(s.output_type_id);
                ids.extend(&s.facility_type_ids);
                let names: HashMap<TypeId, String> = conn
                    .types(&ids)?
                    .into_iter()
                    .map(|t| (t.type_id, t.name))
                    .collect();

                println!("Schematic: {}", s.name);
                println!("  ID: {}", s.id);
                println!("  Cycle: {}s", s.cycle_time);
                println!("  Inputs:");
                for (type_id, qty) in &s.inputs {
                    println!("    {} x {}", qty, name_of(&names, *type_id));
                }
                println!(
                    "  Output: {} x {}",
                    s.output_quantity,
                    name_of(&names, s.output_type_id)
                );
                if !s.facility_type_ids.is_empty() {
                    println!("  Facilities:");
                    for type_id in &s.facility_type_ids {
                        println!("    {}", name_of(&names, *type_id));
                    }
                }
            }
            None => println!("Schematic '{}' not found", id),
        },

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let stats = import::load_sample_data(&conn)?;
            println!("Sample data loaded successfully! {}", stats);
        }
    }

    Ok(())
}

fn load_colony(conn: &Connection, path: &Path) -> Result<Colony> {
    let description = ColonyDescription::from_file(path)?;
    let colony = build_colony(&description, conn, Utc::now())
        .with_context(|| format!("Failed to build colony from {}", path.display()))?;
    Ok(colony)
}

fn type_names(conn: &Connection, colony: &Colony) -> Result<HashMap<TypeId, String>> {
    // Commodities, extractor products included, are already resolved by the builder
    let mut ids: Vec<TypeId> = colony.unit_volumes.keys().copied().collect();
    ids.extend(colony.pins.iter().map(|p| p.type_id));
    Ok(conn
        .types(&ids)?
        .into_iter()
        .map(|t| (t.type_id, t.name))
        .collect())
}

fn name_of(names: &HashMap<TypeId, String>, type_id: TypeId) -> String {
    names
        .get(&type_id)
        .cloned()
        .unwrap_or_else(|| format!("#{}", type_id))
}

//! Reference-data import from the static data export
//!
//! Walks a directory for `types.jsonl` and `planetSchematics.jsonl` (one JSON
//! object per line) and loads the planetary subset into the SQLite store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::db;
use crate::models::{Schematic, TypeId, TypeInfo};

const TYPES_FILE: &str = "types.jsonl";
const SCHEMATICS_FILE: &str = "planetSchematics.jsonl";

/// Display name, either plain or localized
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Name {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl Name {
    fn english(&self) -> String {
        match self {
            Name::Plain(name) => name.clone(),
            Name::Localized(names) => names
                .get("en")
                .or_else(|| names.values().next())
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeRecord {
    #[serde(rename = "_key")]
    key: TypeId,
    #[serde(rename = "groupID")]
    group_id: i32,
    name: Option<Name>,
    #[serde(rename = "iconID")]
    icon_id: Option<i32>,
    volume: Option<f64>,
    capacity: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchematicTypeRecord {
    #[serde(rename = "_key")]
    key: TypeId,
    is_input: bool,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchematicRecord {
    #[serde(rename = "_key")]
    key: i32,
    cycle_time: i64,
    name: Option<Name>,
    #[serde(default)]
    pins: Vec<TypeId>,
    #[serde(default)]
    types: Vec<SchematicTypeRecord>,
}

impl SchematicRecord {
    fn into_schematic(self) -> Option<Schematic> {
        let (outputs, inputs): (Vec<_>, Vec<_>) =
            self.types.into_iter().partition(|t| !t.is_input);
        let output = outputs.into_iter().next()?;
        Some(Schematic {
            id: self.key,
            name: self.name.map(|n| n.english()).unwrap_or_default(),
            output_type_id: output.key,
            output_quantity: output.quantity.max(0) as u64,
            cycle_time: self.cycle_time,
            inputs: inputs
                .into_iter()
                .map(|t| (t.key, t.quantity.max(0) as u64))
                .collect(),
            facility_type_ids: self.pins,
        })
    }
}

/// Find the export files under `export_dir`
pub fn find_export_files(export_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(export_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if filename == TYPES_FILE || filename == SCHEMATICS_FILE {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn import_lines<T, F>(path: &Path, stats: &mut ImportStats, mut handle: F) -> Result<()>
where
    T: for<'de> Deserialize<'de>,
    F: FnMut(T, &mut ImportStats) -> Result<()>,
{
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) => handle(record, stats)?,
            Err(e) => {
                tracing::warn!(file = %path.display(), line = line_no + 1, error = %e, "skipping record");
                stats.errors += 1;
            }
        }
    }
    Ok(())
}

/// Import all export files found under `export_dir`
pub fn import_to_database(conn: &Connection, export_dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    tracing::info!(dir = %export_dir.display(), "scanning for export files");
    let files = find_export_files(export_dir)?;
    if files.is_empty() {
        anyhow::bail!(
            "no {} or {} found under {}",
            TYPES_FILE,
            SCHEMATICS_FILE,
            export_dir.display()
        );
    }

    let tx = conn.unchecked_transaction()?;
    for path in &files {
        let is_types = path.file_name().is_some_and(|n| n == TYPES_FILE);
        if is_types {
            import_lines(path, &mut stats, |record: TypeRecord, stats| {
                db::upsert_type(
                    &tx,
                    &TypeInfo {
                        type_id: record.key,
                        name: record.name.map(|n| n.english()).unwrap_or_default(),
                        group_id: record.group_id,
                        icon_id: record.icon_id,
                        volume: record.volume.unwrap_or(0.0),
                        capacity: record.capacity,
                    },
                )?;
                stats.types += 1;
                Ok(())
            })?;
        } else {
            import_lines(path, &mut stats, |record: SchematicRecord, stats| {
                let key = record.key;
                match record.into_schematic() {
                    Some(schematic) => {
                        db::upsert_schematic(&tx, &schematic)?;
                        stats.schematics += 1;
                    }
                    None => {
                        tracing::warn!(schematic_id = key, "schematic has no output, skipping");
                        stats.skipped += 1;
                    }
                }
                Ok(())
            })?;
        }
        tracing::info!(file = %path.display(), "imported");
    }
    tx.commit()?;

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub types: usize,
    pub schematics: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} types and {} schematics. Skipped: {}, Errors: {}",
            self.types, self.schematics, self.skipped, self.errors
        )
    }
}

fn facility(type_id: TypeId, name: &str, group_id: i32, capacity: Option<f64>) -> TypeInfo {
    TypeInfo {
        type_id,
        name: name.to_string(),
        group_id,
        icon_id: None,
        volume: 0.0,
        capacity,
    }
}

fn commodity(type_id: TypeId, name: &str, group_id: i32, volume: f64) -> TypeInfo {
    TypeInfo {
        type_id,
        name: name.to_string(),
        group_id,
        icon_id: None,
        volume,
        capacity: None,
    }
}

fn schematic(
    id: i32,
    name: &str,
    cycle_time: i64,
    output: (TypeId, u64),
    inputs: &[(TypeId, u64)],
    facility_type_ids: &[TypeId],
) -> Schematic {
    Schematic {
        id,
        name: name.to_string(),
        output_type_id: output.0,
        output_quantity: output.1,
        cycle_time,
        inputs: inputs.to_vec(),
        facility_type_ids: facility_type_ids.to_vec(),
    }
}

/// Load a small barren-planet data set for testing without the export
pub fn load_sample_data(conn: &Connection) -> Result<ImportStats> {
    db::clear_reference_data(conn)?;

    let types = [
        facility(2524, "Barren Command Center", 1027, Some(500.0)),
        facility(2848, "Barren Extractor Control Unit", 1063, None),
        facility(2473, "Barren Basic Industry Facility", 1028, None),
        facility(2474, "Barren Advanced Industry Facility", 1028, None),
        facility(2541, "Barren Storage Facility", 1029, Some(12000.0)),
        facility(2544, "Barren Launchpad", 1030, Some(10000.0)),
        commodity(2267, "Base Metals", 1032, 0.01),
        commodity(2268, "Aqueous Liquids", 1032, 0.01),
        commodity(2270, "Noble Metals", 1032, 0.01),
        commodity(2073, "Microorganisms", 1032, 0.01),
        commodity(3645, "Water", 1042, 0.38),
        commodity(2398, "Reactive Metals", 1042, 0.38),
        commodity(2399, "Precious Metals", 1042, 0.38),
        commodity(2393, "Bacteria", 1042, 0.38),
        commodity(3689, "Mechanical Parts", 1034, 1.5),
    ];
    for info in &types {
        db::upsert_type(conn, info)?;
    }

    let basic = [2473];
    let advanced = [2474];
    let schematics = [
        schematic(121, "Water", 1800, (3645, 20), &[(2268, 3000)], &basic),
        schematic(126, "Reactive Metals", 1800, (2398, 20), &[(2267, 3000)], &basic),
        schematic(127, "Precious Metals", 1800, (2399, 20), &[(2270, 3000)], &basic),
        schematic(131, "Bacteria", 1800, (2393, 20), &[(2073, 3000)], &basic),
        schematic(
            73,
            "Mechanical Parts",
            3600,
            (3689, 5),
            &[(2398, 40), (2399, 40)],
            &advanced,
        ),
    ];
    for s in &schematics {
        db::upsert_schematic(conn, s)?;
    }

    Ok(ImportStats {
        types: types.len(),
        schematics: schematics.len(),
        ..ImportStats::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FacilityCatalog, SchematicCatalog};
    use crate::models::FacilityRole;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_schematic_record_from_export_line() {
        let line = r#"{"_key": 121, "cycleTime": 1800, "name": {"en": "Water", "de": "Wasser"},
            "pins": [2469, 2473],
            "types": [{"_key": 2268, "isInput": true, "quantity": 3000},
                      {"_key": 3645, "isInput": false, "quantity": 20}]}"#;
        let record: SchematicRecord = serde_json::from_str(line).unwrap();
        let schematic = record.into_schematic().unwrap();
        assert_eq!(schematic.name, "Water");
        assert_eq!(schematic.output_type_id, 3645);
        assert_eq!(schematic.output_quantity, 20);
        assert_eq!(schematic.inputs, vec![(2268, 3000)]);
        assert_eq!(schematic.facility_type_ids, vec![2469, 2473]);
    }

    #[test]
    fn test_import_directory() {
        let dir = std::env::temp_dir().join(format!("pi-colony-import-{}", std::process::id()));
        fs::create_dir_all(dir.join("fsd")).unwrap();
        fs::write(
            dir.join("fsd").join(TYPES_FILE),
            concat!(
                r#"{"_key": 2541, "groupID": 1029, "name": {"en": "Barren Storage Facility"}, "capacity": 12000.0, "volume": 0}"#,
                "\n",
                "not json\n",
                r#"{"_key": 3645, "groupID": 1042, "name": "Water", "volume": 0.38}"#,
                "\n"
            ),
        )
        .unwrap();
        fs::write(
            dir.join("fsd").join(SCHEMATICS_FILE),
            r#"{"_key": 121, "cycleTime": 1800, "name": "Water", "pins": [2473], "types": [{"_key": 2268, "isInput": true, "quantity": 3000}, {"_key": 3645, "isInput": false, "quantity": 20}]}"#,
        )
        .unwrap();

        let conn = memory_db();
        let stats = import_to_database(&conn, &dir).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(stats.types, 2);
        assert_eq!(stats.schematics, 1);
        assert_eq!(stats.errors, 1);
        let storage = conn.facility(2541).unwrap().unwrap();
        assert_eq!(storage.role, FacilityRole::Storage);
        assert_eq!(conn.lookup(121).unwrap().unwrap().cycle_time, 1800);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = std::env::temp_dir().join(format!("pi-colony-empty-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let conn = memory_db();
        assert!(import_to_database(&conn, &dir).is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sample_data_loads() {
        let conn = memory_db();
        let stats = load_sample_data(&conn).unwrap();
        assert_eq!(stats.schematics, 5);
        let parts = conn.lookup(73).unwrap().unwrap();
        assert_eq!(parts.inputs, vec![(2398, 40), (2399, 40)]);
    }
}

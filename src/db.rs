//! Reference-data schema and operations

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::{Schematic, SchematicId, TypeId, TypeInfo};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Item and facility types
        CREATE TABLE IF NOT EXISTS types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            group_id INTEGER NOT NULL,
            icon_id INTEGER,
            volume REAL NOT NULL DEFAULT 0,
            capacity REAL
        );

        -- Planetary production recipes
        CREATE TABLE IF NOT EXISTS planet_schematics (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            cycle_time INTEGER NOT NULL
        );

        -- Inputs and the single output of each schematic
        CREATE TABLE IF NOT EXISTS schematic_types (
            schematic_id INTEGER,
            type_id INTEGER,
            quantity INTEGER NOT NULL,
            is_input INTEGER NOT NULL,
            PRIMARY KEY (schematic_id, type_id)
        );

        -- Facility types allowed to run a schematic
        CREATE TABLE IF NOT EXISTS schematic_pins (
            schematic_id INTEGER,
            pin_type_id INTEGER,
            PRIMARY KEY (schematic_id, pin_type_id)
        );

        CREATE INDEX IF NOT EXISTS idx_types_group ON types(group_id);
        CREATE INDEX IF NOT EXISTS idx_schematic_types_type ON schematic_types(type_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a type
pub fn upsert_type(conn: &Connection, info: &TypeInfo) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO types (id, name, group_id, icon_id, volume, capacity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            info.type_id,
            &info.name,
            info.group_id,
            info.icon_id,
            info.volume,
            info.capacity,
        ),
    )?;
    Ok(())
}

/// Insert or replace a schematic with its inputs, output and allowed facilities
pub fn upsert_schematic(conn: &Connection, schematic: &Schematic) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO planet_schematics (id, name, cycle_time) VALUES (?1, ?2, ?3)",
        (schematic.id, &schematic.name, schematic.cycle_time),
    )?;
    conn.execute(
        "DELETE FROM schematic_types WHERE schematic_id = ?1",
        [schematic.id],
    )?;
    conn.execute(
        "DELETE FROM schematic_pins WHERE schematic_id = ?1",
        [schematic.id],
    )?;

    conn.execute(
        "INSERT INTO schematic_types (schematic_id, type_id, quantity, is_input)
         VALUES (?1, ?2, ?3, 0)",
        (
            schematic.id,
            schematic.output_type_id,
            schematic.output_quantity as i64,
        ),
    )?;
    for (type_id, quantity) in &schematic.inputs {
        conn.execute(
            "INSERT INTO schematic_types (schematic_id, type_id, quantity, is_input)
             VALUES (?1, ?2, ?3, 1)",
            (schematic.id, type_id, *quantity as i64),
        )?;
    }
    for pin_type_id in &schematic.facility_type_ids {
        conn.execute(
            "INSERT OR IGNORE INTO schematic_pins (schematic_id, pin_type_id) VALUES (?1, ?2)",
            (schematic.id, pin_type_id),
        )?;
    }
    Ok(())
}

/// Clear all imported data (for re-import)
pub fn clear_reference_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM schematic_pins;
        DELETE FROM schematic_types;
        DELETE FROM planet_schematics;
        DELETE FROM types;
        "#,
    )?;
    Ok(())
}

fn row_to_type(row: &rusqlite::Row<'_>) -> rusqlite::Result<TypeInfo> {
    Ok(TypeInfo {
        type_id: row.get(0)?,
        name: row.get(1)?,
        group_id: row.get(2)?,
        icon_id: row.get(3)?,
        volume: row.get(4)?,
        capacity: row.get(5)?,
    })
}

/// Get a single type by id
pub fn get_type(conn: &Connection, type_id: TypeId) -> rusqlite::Result<Option<TypeInfo>> {
    conn.query_row(
        "SELECT id, name, group_id, icon_id, volume, capacity FROM types WHERE id = ?1",
        [type_id],
        row_to_type,
    )
    .optional()
}

/// Get all known types among `type_ids`, in id order
pub fn get_types(conn: &Connection, type_ids: &[TypeId]) -> rusqlite::Result<Vec<TypeInfo>> {
    let mut ids = type_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut stmt = conn.prepare_cached(
        "SELECT id, name, group_id, icon_id, volume, capacity FROM types WHERE id = ?1",
    )?;
    let mut results = Vec::new();
    for id in ids {
        if let Some(info) = stmt.query_row([id], row_to_type).optional()? {
            results.push(info);
        }
    }
    Ok(results)
}

/// Get a schematic with its inputs, output and allowed facilities
pub fn get_schematic(
    conn: &Connection,
    schematic_id: SchematicId,
) -> rusqlite::Result<Option<Schematic>> {
    let header: Option<(String, i64)> = conn
        .query_row(
            "SELECT name, cycle_time FROM planet_schematics WHERE id = ?1",
            [schematic_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((name, cycle_time)) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT type_id, quantity, is_input FROM schematic_types
         WHERE schematic_id = ?1 ORDER BY is_input, type_id",
    )?;
    let rows = stmt.query_map([schematic_id], |row| {
        Ok((
            row.get::<_, TypeId>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, bool>(2)?,
        ))
    })?;

    let mut output = None;
    let mut inputs = Vec::new();
    for row in rows {
        let (type_id, quantity, is_input) = row?;
        let quantity = quantity.max(0) as u64;
        if is_input {
            inputs.push((type_id, quantity));
        } else if output.is_none() {
            output = Some((type_id, quantity));
        }
    }
    // A schematic without an output is treated as absent
    let Some((output_type_id, output_quantity)) = output else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT pin_type_id FROM schematic_pins WHERE schematic_id = ?1 ORDER BY pin_type_id",
    )?;
    let facility_type_ids = stmt
        .query_map([schematic_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<TypeId>>>()?;

    Ok(Some(Schematic {
        id: schematic_id,
        name,
        output_type_id,
        output_quantity,
        cycle_time,
        inputs,
        facility_type_ids,
    }))
}

/// List all schematics as (id, name, cycle_time)
pub fn list_schematics(conn: &Connection) -> Result<Vec<(SchematicId, String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT id, name, cycle_time FROM planet_schematics ORDER BY name")?;

    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all facility types (planetary structures), ordered by name
pub fn list_facilities(conn: &Connection) -> Result<Vec<TypeInfo>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, group_id, icon_id, volume, capacity FROM types
         WHERE group_id IN (1026, 1027, 1028, 1029, 1030, 1063) ORDER BY name",
    )?;

    let rows = stmt.query_map([], row_to_type)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

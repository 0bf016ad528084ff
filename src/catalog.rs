//! Lookup seams over the reference data
//!
//! The colony builder only needs three questions answered: what recipe does a
//! schematic id describe, what role and capacity does a facility type have, and
//! how large is one unit of a commodity. The bundled SQLite store answers them
//! through [`rusqlite::Connection`]; [`MemoryCatalog`] answers them from maps.

use std::collections::HashMap;

use rusqlite::Connection;

use crate::db;
use crate::error::CatalogError;
use crate::models::{Facility, FacilityRole, Schematic, SchematicId, TypeId, TypeInfo};

pub trait SchematicCatalog {
    fn lookup(&self, schematic_id: SchematicId) -> Result<Option<Schematic>, CatalogError>;
}

pub trait FacilityCatalog {
    fn facility(&self, type_id: TypeId) -> Result<Option<Facility>, CatalogError>;
}

pub trait TypeCatalog {
    /// Batched metadata lookup; unknown ids are left out of the result
    fn types(&self, type_ids: &[TypeId]) -> Result<Vec<TypeInfo>, CatalogError>;
}

/// Everything the colony builder needs from the reference data
pub trait ReferenceData: SchematicCatalog + FacilityCatalog + TypeCatalog {}

impl<T: SchematicCatalog + FacilityCatalog + TypeCatalog> ReferenceData for T {}

fn facility_from_type(info: TypeInfo) -> Option<Facility> {
    let role = FacilityRole::from_group(info.group_id)?;
    Some(Facility {
        type_id: info.type_id,
        name: info.name,
        role,
        capacity_m3: info.capacity,
    })
}

impl SchematicCatalog for Connection {
    fn lookup(&self, schematic_id: SchematicId) -> Result<Option<Schematic>, CatalogError> {
        match db::get_schematic(self, schematic_id)? {
            Some(schematic) if schematic.cycle_time <= 0 => Err(CatalogError::Malformed(format!(
                "schematic {} has cycle time {}",
                schematic_id, schematic.cycle_time
            ))),
            found => Ok(found),
        }
    }
}

impl FacilityCatalog for Connection {
    fn facility(&self, type_id: TypeId) -> Result<Option<Facility>, CatalogError> {
        Ok(db::get_type(self, type_id)?.and_then(facility_from_type))
    }
}

impl TypeCatalog for Connection {
    fn types(&self, type_ids: &[TypeId]) -> Result<Vec<TypeInfo>, CatalogError> {
        Ok(db::get_types(self, type_ids)?)
    }
}

/// In-memory reference data
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    types: HashMap<TypeId, TypeInfo>,
    schematics: HashMap<SchematicId, Schematic>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_type(&mut self, info: TypeInfo) {
        self.types.insert(info.type_id, info);
    }

    pub fn insert_schematic(&mut self, schematic: Schematic) {
        self.schematics.insert(schematic.id, schematic);
    }

    /// Convenience for commodities: only the unit volume matters
    pub fn with_commodity(mut self, type_id: TypeId, name: &str, volume: f64) -> Self {
        self.insert_type(TypeInfo {
            type_id,
            name: name.to_string(),
            group_id: 0,
            icon_id: None,
            volume,
            capacity: None,
        });
        self
    }

    pub fn with_facility(
        mut self,
        type_id: TypeId,
        name: &str,
        group_id: i32,
        capacity: Option<f64>,
    ) -> Self {
        self.insert_type(TypeInfo {
            type_id,
            name: name.to_string(),
            group_id,
            icon_id: None,
            volume: 0.0,
            capacity,
        });
        self
    }

    pub fn with_schematic(mut self, schematic: Schematic) -> Self {
        self.insert_schematic(schematic);
        self
    }
}

impl SchematicCatalog for MemoryCatalog {
    fn lookup(&self, schematic_id: SchematicId) -> Result<Option<Schematic>, CatalogError> {
        Ok(self.schematics.get(&schematic_id).cloned())
    }
}

impl FacilityCatalog for MemoryCatalog {
    fn facility(&self, type_id: TypeId) -> Result<Option<Facility>, CatalogError> {
        Ok(self.types.get(&type_id).cloned().and_then(facility_from_type))
    }
}

impl TypeCatalog for MemoryCatalog {
    fn types(&self, type_ids: &[TypeId]) -> Result<Vec<TypeInfo>, CatalogError> {
        let mut ids = type_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.types.get(&id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_and_memory_agree_on_facility_roles() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let storage = TypeInfo {
            type_id: 2541,
            name: "Barren Storage Facility".to_string(),
            group_id: 1029,
            icon_id: None,
            volume: 0.0,
            capacity: Some(12000.0),
        };
        db::upsert_type(&conn, &storage).unwrap();
        let mut memory = MemoryCatalog::new();
        memory.insert_type(storage);

        let from_db = conn.facility(2541).unwrap().unwrap();
        let from_memory = memory.facility(2541).unwrap().unwrap();
        assert_eq!(from_db, from_memory);
        assert_eq!(from_db.role, FacilityRole::Storage);
        assert_eq!(from_db.capacity_m3, Some(12000.0));
    }

    #[test]
    fn test_commodity_is_not_a_facility() {
        let catalog = MemoryCatalog::new().with_commodity(2268, "Aqueous Liquids", 0.01);
        assert!(catalog.facility(2268).unwrap().is_none());
        assert_eq!(catalog.types(&[2268, 5]).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_cycle_schematic_is_malformed() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let schematic = Schematic {
            id: 65,
            name: "Broken".to_string(),
            output_type_id: 3645,
            output_quantity: 20,
            cycle_time: 0,
            inputs: vec![(2268, 3000)],
            facility_type_ids: Vec::new(),
        };
        db::upsert_schematic(&conn, &schematic).unwrap();
        assert!(matches!(conn.lookup(65), Err(CatalogError::Malformed(_))));
    }

    #[test]
    fn test_unknown_schematic_is_none() {
        let catalog = MemoryCatalog::new();
        assert!(catalog.lookup(65).unwrap().is_none());
    }
}

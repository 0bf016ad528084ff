//! Data models for planetary colonies, reference data and simulation output

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub type PinId = i64;
pub type TypeId = i32;
pub type SchematicId = i32;

/// Commodity quantities held by a pin, keyed by commodity type
pub type Contents = BTreeMap<TypeId, u64>;

/// Type metadata from the reference store
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub name: String,
    pub group_id: i32,
    pub icon_id: Option<i32>,
    pub volume: f64, // m3 per unit
    pub capacity: Option<f64>,
}

/// Production recipe run by a factory
#[derive(Debug, Clone, PartialEq)]
pub struct Schematic {
    pub id: SchematicId,
    pub name: String,
    pub output_type_id: TypeId,
    pub output_quantity: u64,
    pub cycle_time: i64, // seconds
    pub inputs: Vec<(TypeId, u64)>,
    pub facility_type_ids: Vec<TypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FacilityRole {
    Extractor,
    Factory,
    Storage,
    CommandCenter,
    Spaceport,
}

impl FacilityRole {
    /// Map a facility type's group id to its role
    pub fn from_group(group_id: i32) -> Option<Self> {
        match group_id {
            1026 | 1063 => Some(FacilityRole::Extractor),
            1027 => Some(FacilityRole::CommandCenter),
            1028 => Some(FacilityRole::Factory),
            1029 => Some(FacilityRole::Storage),
            1030 => Some(FacilityRole::Spaceport),
            _ => None,
        }
    }

    /// Roles whose volume comes from the facility type rather than a buffer
    pub fn has_bulk_storage(self) -> bool {
        matches!(
            self,
            FacilityRole::Storage | FacilityRole::CommandCenter | FacilityRole::Spaceport
        )
    }
}

/// Facility type resolved from the reference store
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub type_id: TypeId,
    pub name: String,
    pub role: FacilityRole,
    pub capacity_m3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorInstall {
    pub expiry_time: DateTime<Utc>,
    pub cycle_time: i64, // seconds, always > 0
    pub base_value: f64,
    pub qty_per_cycle: u64,
    pub product_type_id: TypeId,
    pub head_radius: f64,
    pub head_count: usize,
}

impl ExtractorInstall {
    /// Number of whole cycles between install and expiry
    pub fn program_cycles(&self, install_time: DateTime<Utc>) -> u64 {
        let span = (self.expiry_time - install_time).num_seconds();
        if span <= 0 {
            0
        } else {
            (span / self.cycle_time) as u64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactoryInstall {
    pub schematic_id: Option<SchematicId>,
    pub last_cycle_start: Option<DateTime<Utc>>,
}

/// Role-specific installation parameters
#[derive(Debug, Clone, PartialEq)]
pub enum PinKind {
    Extractor(ExtractorInstall),
    Factory(FactoryInstall),
    Storage,
    CommandCenter,
    Spaceport,
}

impl PinKind {
    pub fn role(&self) -> FacilityRole {
        match self {
            PinKind::Extractor(_) => FacilityRole::Extractor,
            PinKind::Factory(_) => FacilityRole::Factory,
            PinKind::Storage => FacilityRole::Storage,
            PinKind::CommandCenter => FacilityRole::CommandCenter,
            PinKind::Spaceport => FacilityRole::Spaceport,
        }
    }
}

/// One installed facility
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub id: PinId,
    pub type_id: TypeId,
    pub install_time: DateTime<Utc>,
    pub storage_capacity_m3: Option<f64>,
    pub contents: Contents,
    pub kind: PinKind,
}

impl Pin {
    pub fn role(&self) -> FacilityRole {
        self.kind.role()
    }

    pub fn extractor(&self) -> Option<&ExtractorInstall> {
        match &self.kind {
            PinKind::Extractor(install) => Some(install),
            _ => None,
        }
    }

    pub fn factory(&self) -> Option<&FactoryInstall> {
        match &self.kind {
            PinKind::Factory(install) => Some(install),
            _ => None,
        }
    }
}

/// Routed transfer of one commodity between two pins
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub source_pin_id: PinId,
    pub destination_pin_id: PinId,
    pub commodity_type_id: TypeId,
    pub quantity_per_transfer: u64,
}

/// Physical connection between two pins
#[derive(Debug, Clone, PartialEq)]
pub struct PlanetLink {
    pub source_pin_id: PinId,
    pub destination_pin_id: PinId,
    pub link_level: i32,
}

/// A validated colony: installation facts plus initial storage
#[derive(Debug, Clone, PartialEq)]
pub struct Colony {
    pub character_id: i64,
    pub planet_id: i64,
    pub install_time: DateTime<Utc>,
    pub pins: Vec<Pin>,
    pub links: Vec<Link>,
    pub planet_links: Vec<PlanetLink>,
    pub schematics: BTreeMap<SchematicId, Schematic>,
    pub unit_volumes: BTreeMap<TypeId, f64>,
}

impl Colony {
    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.iter().find(|p| p.id == id)
    }

    pub fn unit_volume(&self, type_id: TypeId) -> Option<f64> {
        self.unit_volumes.get(&type_id).copied()
    }

    /// Volume occupied by a set of contents, `None` if any commodity has no known unit volume
    pub fn volume_of(&self, contents: &Contents) -> Option<f64> {
        contents
            .iter()
            .map(|(type_id, qty)| Some(*qty as f64 * self.unit_volume(*type_id)?))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FactoryStatus {
    Idle,
    Running,
    Stalled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractorState {
    pub cycles_completed: u64,
    pub last_cycle_output: Option<u64>,
    pub last_cycle_end: Option<DateTime<Utc>>,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactoryState {
    pub status: FactoryStatus,
    pub cycle_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PinActivity {
    Extractor(ExtractorState),
    Factory(FactoryState),
    Passive,
}

/// Mutable state of one pin at a simulated instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinState {
    pub pin_id: PinId,
    pub contents: Contents,
    pub activity: PinActivity,
}

impl PinState {
    pub fn extractor(&self) -> Option<&ExtractorState> {
        match &self.activity {
            PinActivity::Extractor(state) => Some(state),
            _ => None,
        }
    }

    pub fn factory(&self) -> Option<&FactoryState> {
        match &self.activity {
            PinActivity::Factory(state) => Some(state),
            _ => None,
        }
    }
}

/// Full colony state at one simulated instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub pins: Vec<PinState>,
}

impl Snapshot {
    pub fn pin(&self, id: PinId) -> Option<&PinState> {
        self.pins.iter().find(|p| p.pin_id == id)
    }
}

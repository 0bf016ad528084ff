//! Error types for colony construction and simulation

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{PinId, SchematicId, TypeId};

/// Malformed installation data, rejected before any simulation work
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("pin {0} is declared more than once")]
    DuplicatePin(PinId),
    #[error("{context} references unknown pin {pin_id}")]
    UnknownPin { context: &'static str, pin_id: PinId },
    #[error("pin {pin_id} has unknown facility type {type_id}")]
    UnknownFacility { pin_id: PinId, type_id: TypeId },
    #[error("extractor pin {0} has no extractor details")]
    MissingExtractorDetails(PinId),
    #[error("extractor pin {0} has no {1}")]
    MissingTimestamp(PinId, &'static str),
    #[error("extractor pin {pin_id} has non-positive cycle time {cycle_time}")]
    InvalidCycleTime { pin_id: PinId, cycle_time: i64 },
    #[error("schematic {schematic_id} has non-positive cycle time {cycle_time}")]
    InvalidSchematicCycle {
        schematic_id: SchematicId,
        cycle_time: i64,
    },
    #[error("extractor pin {0} expires before it was installed")]
    ExpiryBeforeInstall(PinId),
    #[error("route from pin {source_pin_id} to pin {destination_pin_id} moves zero units")]
    EmptyRoute {
        source_pin_id: PinId,
        destination_pin_id: PinId,
    },
    #[error("pin {pin_id} was installed at {install_time}, after {now}")]
    InstalledInFuture {
        pin_id: PinId,
        install_time: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("colony has no pin with an install time")]
    NoInstallTime,
    #[error("pin {pin_id} holds a negative amount of commodity {type_id}")]
    NegativeAmount { pin_id: PinId, type_id: TypeId },
    #[error("commodity {0} has no unit volume in the reference data")]
    UnknownCommodity(TypeId),
    #[error("pin {pin_id} holds {used_m3:.2} m3 but can store only {capacity_m3:.2} m3")]
    OverCapacity {
        pin_id: PinId,
        used_m3: f64,
        capacity_m3: f64,
    },
}

/// Failure reading from the reference-data store
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reference data query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("reference data is malformed: {0}")]
    Malformed(String),
}

/// Colony description or reference data unavailable
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read colony description {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse colony description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid colony: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] FetchError),
}

impl From<CatalogError> for BuildError {
    fn from(err: CatalogError) -> Self {
        BuildError::Upstream(FetchError::Catalog(err))
    }
}

/// Non-fatal problems found while simulating, attached to the result
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimulationWarning {
    #[error("factory pin {pin_id} runs unknown schematic {schematic_id} and is stalled")]
    UnknownSchematic {
        pin_id: PinId,
        schematic_id: SchematicId,
    },
    #[error("simulation stopped after {steps} steps before reaching the target time")]
    Truncated { steps: usize },
}

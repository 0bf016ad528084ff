//! Colony description as returned by the game API
//!
//! Field names follow the API's JSON. Everything the API may omit is optional
//! here; the builder decides what is required.

use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::models::{PinId, SchematicId, TypeId};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ColonyDescription {
    #[serde(default)]
    pub character_id: i64,
    #[serde(default)]
    pub planet_id: i64,
    pub pins: Vec<PinDescription>,
    #[serde(default)]
    pub links: Vec<LinkDescription>,
    #[serde(default)]
    pub routes: Vec<RouteDescription>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PinDescription {
    pub pin_id: PinId,
    pub type_id: TypeId,
    #[serde(default)]
    pub install_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_cycle_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub schematic_id: Option<SchematicId>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub extractor_details: Option<ExtractorDetails>,
    #[serde(default)]
    pub factory_details: Option<FactoryDetails>,
    #[serde(default)]
    pub contents: Vec<ContentDescription>,
}

impl PinDescription {
    /// Schematic from the factory details, falling back to the pin itself
    pub fn schematic(&self) -> Option<SchematicId> {
        self.factory_details
            .as_ref()
            .map(|details| details.schematic_id)
            .or(self.schematic_id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractorDetails {
    #[serde(default)]
    pub cycle_time: Option<i64>,
    #[serde(default)]
    pub product_type_id: Option<TypeId>,
    #[serde(default)]
    pub qty_per_cycle: Option<i64>,
    #[serde(default)]
    pub head_radius: Option<f64>,
    #[serde(default)]
    pub heads: Vec<HeadDescription>,
    /// Richness constant; the API's `qty_per_cycle` when absent
    #[serde(default)]
    pub base_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeadDescription {
    pub head_id: i32,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FactoryDetails {
    pub schematic_id: SchematicId,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContentDescription {
    pub type_id: TypeId,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LinkDescription {
    pub source_pin_id: PinId,
    pub destination_pin_id: PinId,
    #[serde(default)]
    pub link_level: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RouteDescription {
    #[serde(default)]
    pub route_id: Option<i64>,
    pub source_pin_id: PinId,
    pub destination_pin_id: PinId,
    pub content_type_id: TypeId,
    pub quantity: i64,
    #[serde(default)]
    pub waypoints: Vec<PinId>,
}

impl ColonyDescription {
    pub fn from_json_str(json: &str) -> Result<Self, FetchError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, FetchError> {
        let contents = fs::read_to_string(path).map_err(|source| FetchError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ColonyDescription::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_SAMPLE: &str = r#"{
        "links": [{"destination_pin_id": 2, "link_level": 0, "source_pin_id": 1}],
        "pins": [
            {
                "pin_id": 1,
                "type_id": 3060,
                "install_time": "2026-10-01T12:00:00Z",
                "expiry_time": "2026-10-03T12:00:00Z",
                "last_cycle_start": "2026-10-01T12:00:00Z",
                "latitude": 1.2,
                "longitude": 0.4,
                "extractor_details": {
                    "cycle_time": 1800,
                    "head_radius": 0.012,
                    "heads": [{"head_id": 0, "latitude": 1.21, "longitude": 0.41}],
                    "product_type_id": 2268,
                    "qty_per_cycle": 4200
                },
                "contents": [{"type_id": 2268, "amount": 12}]
            },
            {"pin_id": 2, "type_id": 2473, "schematic_id": 121}
        ],
        "routes": [{
            "route_id": 7,
            "source_pin_id": 1,
            "destination_pin_id": 2,
            "content_type_id": 2268,
            "quantity": 3000,
            "waypoints": []
        }]
    }"#;

    #[test]
    fn test_parses_api_shape() {
        let description = ColonyDescription::from_json_str(API_SAMPLE).unwrap();
        assert_eq!(description.pins.len(), 2);
        assert_eq!(description.character_id, 0);

        let extractor = &description.pins[0];
        let details = extractor.extractor_details.as_ref().unwrap();
        assert_eq!(details.cycle_time, Some(1800));
        assert_eq!(details.heads.len(), 1);
        assert_eq!(details.base_value, None);
        assert_eq!(extractor.contents[0].amount, 12);

        assert_eq!(description.pins[1].schematic(), Some(121));
        assert_eq!(description.routes[0].quantity, 3000);
    }

    #[test]
    fn test_factory_details_take_precedence() {
        let mut description = ColonyDescription::from_json_str(API_SAMPLE).unwrap();
        description.pins[1].factory_details = Some(FactoryDetails { schematic_id: 65 });
        assert_eq!(description.pins[1].schematic(), Some(65));
    }

    #[test]
    fn test_malformed_json_is_a_fetch_error() {
        let err = ColonyDescription::from_json_str("{\"pins\": 3}").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}

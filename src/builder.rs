//! Colony construction from an API description
//!
//! All validation happens here so the simulator can assume a well-formed
//! colony: pins are unique, every referenced pin exists, extractor programs
//! and schematics have a positive cycle time and every commodity has a unit
//! volume.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use crate::catalog::ReferenceData;
use crate::description::{ColonyDescription, PinDescription};
use crate::error::{BuildError, ValidationError};
use crate::models::{
    Colony, Contents, ExtractorInstall, FacilityRole, FactoryInstall, Link, Pin, PinKind,
    PlanetLink, TypeId,
};

/// Build a validated colony from an API description
pub fn build_colony<R: ReferenceData + ?Sized>(
    description: &ColonyDescription,
    reference: &R,
    now: DateTime<Utc>,
) -> Result<Colony, BuildError> {
    let mut seen = HashSet::new();
    for pin in &description.pins {
        if !seen.insert(pin.pin_id) {
            return Err(ValidationError::DuplicatePin(pin.pin_id).into());
        }
    }

    let install_time = description
        .pins
        .iter()
        .filter_map(|pin| pin.install_time)
        .min()
        .ok_or(ValidationError::NoInstallTime)?;

    let mut pins = Vec::with_capacity(description.pins.len());
    for pin in &description.pins {
        pins.push(build_pin(pin, reference, install_time, now)?);
    }

    let mut planet_links = Vec::with_capacity(description.links.len());
    for link in &description.links {
        require_pin(&seen, "planet link", link.source_pin_id)?;
        require_pin(&seen, "planet link", link.destination_pin_id)?;
        planet_links.push(PlanetLink {
            source_pin_id: link.source_pin_id,
            destination_pin_id: link.destination_pin_id,
            link_level: link.link_level,
        });
    }

    let mut links = Vec::with_capacity(description.routes.len());
    for route in &description.routes {
        require_pin(&seen, "route", route.source_pin_id)?;
        require_pin(&seen, "route", route.destination_pin_id)?;
        for waypoint in &route.waypoints {
            require_pin(&seen, "route waypoint", *waypoint)?;
        }
        if route.quantity <= 0 {
            return Err(ValidationError::EmptyRoute {
                source_pin_id: route.source_pin_id,
                destination_pin_id: route.destination_pin_id,
            }
            .into());
        }
        links.push(Link {
            source_pin_id: route.source_pin_id,
            destination_pin_id: route.destination_pin_id,
            commodity_type_id: route.content_type_id,
            quantity_per_transfer: route.quantity as u64,
        });
    }

    // Each schematic is looked up once; unknown ones stay out of the map and
    // are reported by the simulator.
    let mut schematics = BTreeMap::new();
    let schematic_ids: BTreeSet<_> = pins
        .iter()
        .filter_map(|pin| pin.factory().and_then(|f| f.schematic_id))
        .collect();
    for schematic_id in schematic_ids {
        match reference.lookup(schematic_id)? {
            Some(schematic) if schematic.cycle_time <= 0 => {
                return Err(ValidationError::InvalidSchematicCycle {
                    schematic_id,
                    cycle_time: schematic.cycle_time,
                }
                .into());
            }
            Some(schematic) => {
                schematics.insert(schematic_id, schematic);
            }
            None => tracing::debug!(schematic_id, "schematic missing from reference data"),
        }
    }

    let mut commodities = BTreeSet::new();
    for pin in &pins {
        commodities.extend(pin.contents.keys().copied());
        if let Some(extractor) = pin.extractor() {
            commodities.insert(extractor.product_type_id);
        }
    }
    commodities.extend(links.iter().map(|link| link.commodity_type_id));
    for schematic in schematics.values() {
        commodities.insert(schematic.output_type_id);
        commodities.extend(schematic.inputs.iter().map(|(type_id, _)| *type_id));
    }
    let unit_volumes = resolve_volumes(reference, &commodities)?;

    let colony = Colony {
        character_id: description.character_id,
        planet_id: description.planet_id,
        install_time,
        pins,
        links,
        planet_links,
        schematics,
        unit_volumes,
    };

    for pin in &colony.pins {
        if let Some(capacity_m3) = pin.storage_capacity_m3 {
            let used_m3 = colony
                .volume_of(&pin.contents)
                .ok_or_else(|| missing_volume(&colony, &pin.contents))?;
            if used_m3 > capacity_m3 + crate::VOLUME_EPSILON {
                return Err(ValidationError::OverCapacity {
                    pin_id: pin.id,
                    used_m3,
                    capacity_m3,
                }
                .into());
            }
        }
    }

    tracing::debug!(
        planet_id = colony.planet_id,
        pins = colony.pins.len(),
        links = colony.links.len(),
        schematics = colony.schematics.len(),
        "colony built"
    );
    Ok(colony)
}

fn require_pin(
    pins: &HashSet<i64>,
    context: &'static str,
    pin_id: i64,
) -> Result<(), ValidationError> {
    if pins.contains(&pin_id) {
        Ok(())
    } else {
        Err(ValidationError::UnknownPin { context, pin_id })
    }
}

fn build_pin<R: ReferenceData + ?Sized>(
    pin: &PinDescription,
    reference: &R,
    colony_install: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Pin, BuildError> {
    let facility = reference
        .facility(pin.type_id)?
        .ok_or(ValidationError::UnknownFacility {
            pin_id: pin.pin_id,
            type_id: pin.type_id,
        })?;

    let install_time = pin.install_time.unwrap_or(colony_install);
    if install_time > now {
        return Err(ValidationError::InstalledInFuture {
            pin_id: pin.pin_id,
            install_time,
            now,
        }
        .into());
    }

    let mut contents = Contents::new();
    for content in &pin.contents {
        let amount = u64::try_from(content.amount).map_err(|_| ValidationError::NegativeAmount {
            pin_id: pin.pin_id,
            type_id: content.type_id,
        })?;
        *contents.entry(content.type_id).or_default() += amount;
    }

    let kind = match facility.role {
        FacilityRole::Extractor => PinKind::Extractor(extractor_install(pin)?),
        FacilityRole::Factory => PinKind::Factory(FactoryInstall {
            schematic_id: pin.schematic(),
            last_cycle_start: pin.last_cycle_start,
        }),
        FacilityRole::Storage => PinKind::Storage,
        FacilityRole::CommandCenter => PinKind::CommandCenter,
        FacilityRole::Spaceport => PinKind::Spaceport,
    };

    let storage_capacity_m3 = if facility.role.has_bulk_storage() {
        facility.capacity_m3
    } else {
        None
    };

    Ok(Pin {
        id: pin.pin_id,
        type_id: pin.type_id,
        install_time,
        storage_capacity_m3,
        contents,
        kind,
    })
}

fn extractor_install(pin: &PinDescription) -> Result<ExtractorInstall, ValidationError> {
    let details = pin
        .extractor_details
        .as_ref()
        .ok_or(ValidationError::MissingExtractorDetails(pin.pin_id))?;
    let product_type_id = details
        .product_type_id
        .ok_or(ValidationError::MissingExtractorDetails(pin.pin_id))?;

    let cycle_time = details.cycle_time.unwrap_or(0);
    if cycle_time <= 0 {
        return Err(ValidationError::InvalidCycleTime {
            pin_id: pin.pin_id,
            cycle_time,
        });
    }

    let install_time = pin
        .install_time
        .ok_or(ValidationError::MissingTimestamp(pin.pin_id, "install time"))?;
    let expiry_time = pin
        .expiry_time
        .ok_or(ValidationError::MissingTimestamp(pin.pin_id, "expiry time"))?;
    if expiry_time < install_time {
        return Err(ValidationError::ExpiryBeforeInstall(pin.pin_id));
    }

    let qty_per_cycle = details.qty_per_cycle.unwrap_or(0).max(0) as u64;
    Ok(ExtractorInstall {
        expiry_time,
        cycle_time,
        base_value: details.base_value.unwrap_or(qty_per_cycle as f64),
        qty_per_cycle,
        product_type_id,
        head_radius: details.head_radius.unwrap_or(0.0),
        head_count: details.heads.len(),
    })
}

fn resolve_volumes<R: ReferenceData + ?Sized>(
    reference: &R,
    commodities: &BTreeSet<TypeId>,
) -> Result<BTreeMap<TypeId, f64>, BuildError> {
    let ids: Vec<TypeId> = commodities.iter().copied().collect();
    let unit_volumes: BTreeMap<TypeId, f64> = reference
        .types(&ids)?
        .into_iter()
        .map(|info| (info.type_id, info.volume))
        .collect();

    if let Some(missing) = ids.iter().find(|id| !unit_volumes.contains_key(id)) {
        return Err(ValidationError::UnknownCommodity(*missing).into());
    }
    Ok(unit_volumes)
}

fn missing_volume(colony: &Colony, contents: &Contents) -> ValidationError {
    let type_id = contents
        .keys()
        .copied()
        .find(|type_id| colony.unit_volume(*type_id).is_none())
        .unwrap_or_default();
    ValidationError::UnknownCommodity(type_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::description::{
        ContentDescription, ExtractorDetails, FactoryDetails, LinkDescription, RouteDescription,
    };
    use crate::models::Schematic;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with_facility(3060, "Barren Extractor Control Unit", 1063, None)
            .with_facility(2473, "Barren Basic Industry Facility", 1028, None)
            .with_facility(2541, "Barren Storage Facility", 1029, Some(12000.0))
            .with_commodity(2268, "Aqueous Liquids", 0.01)
            .with_commodity(3645, "Water", 0.38)
            .with_schematic(Schematic {
                id: 121,
                name: "Water".to_string(),
                output_type_id: 3645,
                output_quantity: 20,
                cycle_time: 1800,
                inputs: vec![(2268, 3000)],
                facility_type_ids: vec![2473],
            })
    }

    fn extractor(pin_id: i64) -> PinDescription {
        PinDescription {
            pin_id,
            type_id: 3060,
            install_time: Some(t0()),
            expiry_time: Some(t0() + chrono::Duration::days(2)),
            last_cycle_start: Some(t0()),
            schematic_id: None,
            latitude: None,
            longitude: None,
            extractor_details: Some(ExtractorDetails {
                cycle_time: Some(1800),
                product_type_id: Some(2268),
                qty_per_cycle: Some(4200),
                head_radius: Some(0.01),
                heads: Vec::new(),
                base_value: None,
            }),
            factory_details: None,
            contents: Vec::new(),
        }
    }

    fn plain(pin_id: i64, type_id: i32) -> PinDescription {
        PinDescription {
            pin_id,
            type_id,
            install_time: Some(t0()),
            expiry_time: None,
            last_cycle_start: None,
            schematic_id: None,
            latitude: None,
            longitude: None,
            extractor_details: None,
            factory_details: None,
            contents: Vec::new(),
        }
    }

    fn route(source: i64, destination: i64, type_id: i32, quantity: i64) -> RouteDescription {
        RouteDescription {
            route_id: None,
            source_pin_id: source,
            destination_pin_id: destination,
            content_type_id: type_id,
            quantity,
            waypoints: Vec::new(),
        }
    }

    fn description(pins: Vec<PinDescription>, routes: Vec<RouteDescription>) -> ColonyDescription {
        ColonyDescription {
            character_id: 90000001,
            planet_id: 40000001,
            pins,
            links: Vec::new(),
            routes,
        }
    }

    fn validation(result: Result<Colony, BuildError>) -> ValidationError {
        match result {
            Err(BuildError::Validation(err)) => err,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_builds_roles_schematics_and_volumes() {
        let mut factory = plain(2, 2473);
        factory.factory_details = Some(FactoryDetails { schematic_id: 121 });
        let desc = description(
            vec![extractor(1), factory, plain(3, 2541)],
            vec![route(1, 2, 2268, 3000), route(2, 3, 3645, 20)],
        );

        let colony = build_colony(&desc, &catalog(), t0() + chrono::Duration::hours(1)).unwrap();
        assert_eq!(colony.install_time, t0());
        assert_eq!(colony.pins[0].role(), FacilityRole::Extractor);
        assert_eq!(colony.pins[1].role(), FacilityRole::Factory);
        assert_eq!(colony.pins[2].storage_capacity_m3, Some(12000.0));
        assert_eq!(colony.pins[0].storage_capacity_m3, None);
        assert!(colony.schematics.contains_key(&121));
        assert_eq!(colony.unit_volume(3645), Some(0.38));
        assert_eq!(colony.links[1].quantity_per_transfer, 20);

        let install = colony.pins[0].extractor().unwrap();
        assert_eq!(install.base_value, 4200.0);
    }

    #[test]
    fn test_rejects_schematic_without_cycle_time() {
        let catalog = catalog().with_schematic(Schematic {
            id: 121,
            name: "Water".to_string(),
            output_type_id: 3645,
            output_quantity: 20,
            cycle_time: 0,
            inputs: vec![(2268, 3000)],
            facility_type_ids: vec![2473],
        });
        let mut factory = plain(2, 2473);
        factory.factory_details = Some(FactoryDetails { schematic_id: 121 });
        let mut silo = plain(3, 2541);
        silo.contents = vec![ContentDescription {
            type_id: 2268,
            amount: 9000,
        }];
        let desc = description(vec![silo, factory], vec![route(3, 2, 2268, 3000)]);

        assert_eq!(
            validation(build_colony(&desc, &catalog, t0())),
            ValidationError::InvalidSchematicCycle {
                schematic_id: 121,
                cycle_time: 0
            }
        );
    }

    #[test]
    fn test_rejects_duplicate_pins() {
        let desc = description(vec![extractor(1), extractor(1)], Vec::new());
        assert_eq!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::DuplicatePin(1)
        );
    }

    #[test]
    fn test_rejects_route_to_missing_pin() {
        let desc = description(vec![extractor(1)], vec![route(1, 9, 2268, 10)]);
        assert_eq!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::UnknownPin {
                context: "route",
                pin_id: 9
            }
        );
    }

    #[test]
    fn test_rejects_planet_link_to_missing_pin() {
        let mut desc = description(vec![extractor(1)], Vec::new());
        desc.links.push(LinkDescription {
            source_pin_id: 4,
            destination_pin_id: 1,
            link_level: 0,
        });
        assert!(matches!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::UnknownPin { pin_id: 4, .. }
        ));
    }

    #[test]
    fn test_rejects_non_positive_cycle_time() {
        let mut pin = extractor(1);
        pin.extractor_details.as_mut().unwrap().cycle_time = Some(0);
        let desc = description(vec![pin], Vec::new());
        assert_eq!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::InvalidCycleTime {
                pin_id: 1,
                cycle_time: 0
            }
        );
    }

    #[test]
    fn test_rejects_install_in_future() {
        let desc = description(vec![extractor(1)], Vec::new());
        let now = t0() - chrono::Duration::seconds(1);
        assert!(matches!(
            validation(build_colony(&desc, &catalog(), now)),
            ValidationError::InstalledInFuture { pin_id: 1, .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_facility_and_commodity() {
        let desc = description(vec![plain(1, 9999)], Vec::new());
        assert_eq!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::UnknownFacility {
                pin_id: 1,
                type_id: 9999
            }
        );

        let mut storage = plain(1, 2541);
        storage.contents.push(ContentDescription {
            type_id: 777,
            amount: 1,
        });
        let desc = description(vec![storage], Vec::new());
        assert_eq!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::UnknownCommodity(777)
        );
    }

    #[test]
    fn test_rejects_overfull_storage() {
        let mut storage = plain(1, 2541);
        storage.contents.push(ContentDescription {
            type_id: 3645,
            amount: 40_000,
        });
        let desc = description(vec![storage], Vec::new());
        assert!(matches!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::OverCapacity { pin_id: 1, .. }
        ));
    }

    #[test]
    fn test_rejects_zero_quantity_route() {
        let desc = description(vec![extractor(1), plain(2, 2541)], vec![route(1, 2, 2268, 0)]);
        assert!(matches!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::EmptyRoute { .. }
        ));
    }

    #[test]
    fn test_unknown_schematic_is_not_a_build_error() {
        let mut factory = plain(2, 2473);
        factory.schematic_id = Some(4242);
        let desc = description(vec![factory], Vec::new());
        let colony = build_colony(&desc, &catalog(), t0()).unwrap();
        assert!(colony.schematics.is_empty());
        assert_eq!(colony.pins[0].factory().unwrap().schematic_id, Some(4242));
    }

    #[test]
    fn test_requires_some_install_time() {
        let mut storage = plain(1, 2541);
        storage.install_time = None;
        let desc = description(vec![storage], Vec::new());
        assert_eq!(
            validation(build_colony(&desc, &catalog(), t0())),
            ValidationError::NoInstallTime
        );
    }
}

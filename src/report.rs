//! Views over simulation output: current totals and yield history

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{Colony, FacilityRole, FactoryStatus, PinActivity, PinId, Snapshot, TypeId};

/// Quantity produced by one extractor cycle, at the time the cycle completed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldPoint {
    pub timestamp: DateTime<Utc>,
    pub quantity: u64,
}

/// Yield curve of one extractor, taken from the snapshots where it cycled
pub fn yield_history(snapshots: &[Snapshot], pin_id: PinId) -> Vec<YieldPoint> {
    snapshots
        .iter()
        .filter_map(|snapshot| {
            let state = snapshot.pin(pin_id)?.extractor()?;
            if state.last_cycle_end != Some(snapshot.timestamp) {
                return None;
            }
            Some(YieldPoint {
                timestamp: snapshot.timestamp,
                quantity: state.last_cycle_output?,
            })
        })
        .collect()
}

/// Contents of every pin summed per commodity
pub fn colony_totals(snapshot: &Snapshot) -> BTreeMap<TypeId, u64> {
    let mut totals = BTreeMap::new();
    for pin in &snapshot.pins {
        for (type_id, quantity) in &pin.contents {
            *totals.entry(*type_id).or_default() += quantity;
        }
    }
    totals
}

/// Short status label for one pin
pub fn pin_status(snapshot: &Snapshot, pin_id: PinId) -> &'static str {
    match snapshot.pin(pin_id).map(|p| &p.activity) {
        Some(PinActivity::Extractor(state)) if state.expired => "expired",
        Some(PinActivity::Extractor(_)) => "extracting",
        Some(PinActivity::Factory(state)) => match state.status {
            FactoryStatus::Idle => "idle",
            FactoryStatus::Running => "running",
            FactoryStatus::Stalled => "stalled",
        },
        Some(PinActivity::Passive) => "storing",
        None => "unknown",
    }
}

/// Fraction of a pin's storage in use, for pins with finite capacity
pub fn fill_ratio(colony: &Colony, snapshot: &Snapshot, pin_id: PinId) -> Option<f64> {
    let pin = colony.pin(pin_id)?;
    let capacity = pin.storage_capacity_m3.filter(|c| *c > 0.0)?;
    let state = snapshot.pin(pin_id)?;
    Some((colony.volume_of(&state.contents)? / capacity).clamp(0.0, 1.0))
}

/// Average extraction rate in units per hour over the recorded history
pub fn hourly_rate(history: &[YieldPoint], cycle_time: i64) -> f64 {
    if history.is_empty() || cycle_time <= 0 {
        return 0.0;
    }
    let total: u64 = history.iter().map(|p| p.quantity).sum();
    total as f64 / history.len() as f64 * 3600.0 / cycle_time as f64
}

/// Pins of a role, in colony order
pub fn pins_with_role(colony: &Colony, role: FacilityRole) -> Vec<PinId> {
    colony
        .pins
        .iter()
        .filter(|pin| pin.role() == role)
        .map(|pin| pin.id)
        .collect()
}

//! Event-driven replay of a colony
//!
//! The simulation keeps one mutable runtime record per pin and repeatedly
//! jumps to the earliest pending event (an extraction cycle or a factory cycle
//! finishing). Events sharing a timestamp are applied extractors first, then
//! factories, each group by pin id. After the events, each transfer route
//! moves at most one batch in declaration order, idle factories try to start,
//! and one [`Snapshot`] is emitted for that timestamp. Routes and factory
//! starts also run once at the install time, without a snapshot.
//!
//! Routes into a factory that carry one of its recipe inputs do not move
//! goods: they mark the source pin as storage the factory draws from.

use chrono::{DateTime, Duration, Utc};

use crate::VOLUME_EPSILON;
use crate::config::SimConfig;
use crate::error::SimulationWarning;
use crate::extraction::YieldCurve;
use crate::models::{
    Colony, Contents, ExtractorState, FactoryState, FactoryStatus, PinActivity, PinKind, PinState,
    Schematic, Snapshot, TypeId,
};

/// Result of a full run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// State at the colony's install time, after its first routes and factory starts
    pub initial: Snapshot,
    pub snapshots: Vec<Snapshot>,
    pub warnings: Vec<SimulationWarning>,
}

impl SimulationReport {
    /// Latest known state
    pub fn current(&self) -> &Snapshot {
        self.snapshots.last().unwrap_or(&self.initial)
    }
}

/// Replay `colony` from its install time up to and including `until`
pub fn simulate(colony: &Colony, until: DateTime<Utc>, config: &SimConfig) -> SimulationReport {
    let mut simulation = Simulation::new(colony, until, config.clone());
    let initial = simulation.snapshot();
    let snapshots: Vec<Snapshot> = simulation.by_ref().collect();
    tracing::debug!(
        planet_id = colony.planet_id,
        snapshots = snapshots.len(),
        warnings = simulation.warnings().len(),
        "simulation finished"
    );
    SimulationReport {
        initial,
        snapshots,
        warnings: simulation.warnings,
    }
}

#[derive(Debug)]
struct ExtractorRuntime {
    curve: YieldCurve,
    install: i64,
    cycle_time: i64,
    expiry: i64,
    product: TypeId,
    cycles_completed: u64,
    last_output: Option<u64>,
    last_end: Option<i64>,
}

impl ExtractorRuntime {
    fn next_event(&self) -> Option<i64> {
        let cycle_index = i64::try_from(self.cycles_completed).ok()?;
        let end = self
            .install
            .checked_add(self.cycle_time.checked_mul(cycle_index.checked_add(1)?)?)?;
        (end <= self.expiry).then_some(end)
    }
}

#[derive(Debug)]
struct FactoryRuntime<'a> {
    schematic: Option<&'a Schematic>,
    unknown_schematic: bool,
    install: i64,
    status: FactoryStatus,
    cycle_start: Option<i64>,
    /// Pin indices this factory draws inputs from, in route order
    input_pins: Vec<usize>,
}

impl FactoryRuntime<'_> {
    fn next_event(&self) -> Option<i64> {
        match (self.status, self.cycle_start, self.schematic) {
            (FactoryStatus::Running, Some(start), Some(schematic)) => {
                start.checked_add(schematic.cycle_time)
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Runtime<'a> {
    Extractor(ExtractorRuntime),
    Factory(FactoryRuntime<'a>),
    Passive,
}

/// Lazily produced snapshot sequence for one colony
#[derive(Debug)]
pub struct Simulation<'a> {
    colony: &'a Colony,
    config: SimConfig,
    origin: i64,
    until: i64,
    now: i64,
    contents: Vec<Contents>,
    runtimes: Vec<Runtime<'a>>,
    /// Pin indices in tie-break order: extractors, then factories, by pin id
    event_order: Vec<usize>,
    /// (source index, destination index, commodity, quantity) of routes that move goods
    transfers: Vec<(usize, usize, TypeId, u64)>,
    warnings: Vec<SimulationWarning>,
    steps: usize,
    finished: bool,
}

impl<'a> Simulation<'a> {
    pub fn new(colony: &'a Colony, until: DateTime<Utc>, config: SimConfig) -> Self {
        let origin = colony.install_time.timestamp();
        let index_of = |pin_id: i64| colony.pins.iter().position(|p| p.id == pin_id);

        let mut warnings = Vec::new();
        let mut runtimes = Vec::with_capacity(colony.pins.len());
        for pin in &colony.pins {
            let runtime = match &pin.kind {
                PinKind::Extractor(install) => Runtime::Extractor(ExtractorRuntime {
                    curve: YieldCurve::new(install.base_value, install.cycle_time),
                    install: pin.install_time.timestamp(),
                    cycle_time: install.cycle_time,
                    expiry: install.expiry_time.timestamp(),
                    product: install.product_type_id,
                    cycles_completed: 0,
                    last_output: None,
                    last_end: None,
                }),
                PinKind::Factory(install) => {
                    let schematic = install
                        .schematic_id
                        .and_then(|id| colony.schematics.get(&id));
                    let unknown_schematic = install.schematic_id.is_some() && schematic.is_none();
                    if let Some(schematic_id) = install.schematic_id.filter(|_| unknown_schematic) {
                        tracing::warn!(
                            pin_id = pin.id,
                            schematic_id,
                            "factory runs an unknown schematic, marking it stalled"
                        );
                        warnings.push(SimulationWarning::UnknownSchematic {
                            pin_id: pin.id,
                            schematic_id,
                        });
                    }

                    let mut input_pins = Vec::new();
                    if let Some(schematic) = schematic {
                        for link in &colony.links {
                            let feeds_recipe = link.destination_pin_id == pin.id
                                && schematic
                                    .inputs
                                    .iter()
                                    .any(|(type_id, _)| *type_id == link.commodity_type_id);
                            if !feeds_recipe {
                                continue;
                            }
                            if let Some(source) = index_of(link.source_pin_id) {
                                if !input_pins.contains(&source) {
                                    input_pins.push(source);
                                }
                            }
                        }
                    }

                    Runtime::Factory(FactoryRuntime {
                        schematic,
                        unknown_schematic,
                        install: pin.install_time.timestamp(),
                        status: if unknown_schematic {
                            FactoryStatus::Stalled
                        } else {
                            FactoryStatus::Idle
                        },
                        cycle_start: None,
                        input_pins,
                    })
                }
                PinKind::Storage | PinKind::CommandCenter | PinKind::Spaceport => Runtime::Passive,
            };
            runtimes.push(runtime);
        }

        let mut transfers = Vec::new();
        for link in &colony.links {
            let (Some(source), Some(destination)) = (
                index_of(link.source_pin_id),
                index_of(link.destination_pin_id),
            ) else {
                continue;
            };
            if source == destination || link.quantity_per_transfer == 0 {
                continue;
            }
            let supplies_factory = match &runtimes[destination] {
                Runtime::Factory(factory) => factory.schematic.is_some_and(|s| {
                    s.inputs
                        .iter()
                        .any(|(type_id, _)| *type_id == link.commodity_type_id)
                }),
                _ => false,
            };
            if !supplies_factory {
                transfers.push((
                    source,
                    destination,
                    link.commodity_type_id,
                    link.quantity_per_transfer,
                ));
            }
        }

        let mut event_order: Vec<usize> = (0..colony.pins.len())
            .filter(|&i| !matches!(runtimes[i], Runtime::Passive))
            .collect();
        event_order.sort_by_key(|&i| {
            let rank = match runtimes[i] {
                Runtime::Extractor(_) => 0,
                _ => 1,
            };
            (rank, colony.pins[i].id)
        });

        let mut simulation = Self {
            colony,
            config,
            origin,
            until: until.timestamp(),
            now: origin,
            contents: colony.pins.iter().map(|p| p.contents.clone()).collect(),
            runtimes,
            event_order,
            transfers,
            warnings,
            steps: 0,
            finished: false,
        };
        simulation.run_transfers();
        simulation.start_factories(origin);
        simulation
    }

    pub fn warnings(&self) -> &[SimulationWarning] {
        &self.warnings
    }

    /// Timestamp of the last processed step, or the install time before the first
    pub fn now(&self) -> DateTime<Utc> {
        self.datetime(self.now)
    }

    /// Capture the current state of every pin
    pub fn snapshot(&self) -> Snapshot {
        let pins = self
            .colony
            .pins
            .iter()
            .zip(&self.runtimes)
            .zip(&self.contents)
            .map(|((pin, runtime), contents)| PinState {
                pin_id: pin.id,
                contents: contents.clone(),
                activity: match runtime {
                    Runtime::Extractor(extractor) => PinActivity::Extractor(ExtractorState {
                        cycles_completed: extractor.cycles_completed,
                        last_cycle_output: extractor.last_output,
                        last_cycle_end: extractor.last_end.map(|t| self.datetime(t)),
                        expired: self.now >= extractor.expiry,
                    }),
                    Runtime::Factory(factory) => PinActivity::Factory(FactoryState {
                        status: factory.status,
                        cycle_start: factory.cycle_start.map(|t| self.datetime(t)),
                    }),
                    Runtime::Passive => PinActivity::Passive,
                },
            })
            .collect();
        Snapshot {
            timestamp: self.now(),
            pins,
        }
    }

    fn datetime(&self, secs: i64) -> DateTime<Utc> {
        self.colony.install_time + Duration::seconds(secs - self.origin)
    }

    fn next_event_time(&self) -> Option<i64> {
        self.runtimes
            .iter()
            .filter_map(|runtime| match runtime {
                Runtime::Extractor(extractor) => extractor.next_event(),
                Runtime::Factory(factory) => factory.next_event(),
                Runtime::Passive => None,
            })
            .min()
    }

    fn capacity_m3(&self, index: usize) -> f64 {
        match &self.runtimes[index] {
            Runtime::Extractor(_) => self.config.extractor_buffer_m3,
            Runtime::Factory(_) => self.config.factory_buffer_m3,
            Runtime::Passive => self.colony.pins[index]
                .storage_capacity_m3
                .unwrap_or(f64::INFINITY),
        }
    }

    /// How many units of `type_id` pin `index` can still accept
    ///
    /// Commodities without a known unit volume never fit anywhere.
    fn room_for(&self, index: usize, type_id: TypeId, wanted: u64) -> u64 {
        let Some(unit_volume) = self.colony.unit_volume(type_id) else {
            return 0;
        };
        if unit_volume <= 0.0 {
            return wanted;
        }
        let Some(used) = self.colony.volume_of(&self.contents[index]) else {
            return 0;
        };
        let free = self.capacity_m3(index) - used;
        if free <= 0.0 {
            return 0;
        }
        let fits = ((free + VOLUME_EPSILON) / unit_volume).floor();
        if fits >= wanted as f64 {
            wanted
        } else {
            fits as u64
        }
    }

    /// Add output to a pin's own buffer; whatever does not fit is lost
    fn store_output(&mut self, index: usize, type_id: TypeId, quantity: u64) {
        let accepted = self.room_for(index, type_id, quantity);
        if accepted < quantity {
            tracing::trace!(
                pin_id = self.colony.pins[index].id,
                type_id,
                discarded = quantity - accepted,
                "output buffer full"
            );
        }
        if accepted > 0 {
            *self.contents[index].entry(type_id).or_default() += accepted;
        }
    }

    fn take(&mut self, index: usize, type_id: TypeId, quantity: u64) -> u64 {
        let Some(held) = self.contents[index].get_mut(&type_id) else {
            return 0;
        };
        let taken = (*held).min(quantity);
        *held -= taken;
        if *held == 0 {
            self.contents[index].remove(&type_id);
        }
        taken
    }

    fn held(&self, index: usize, type_id: TypeId) -> u64 {
        self.contents[index].get(&type_id).copied().unwrap_or(0)
    }

    fn complete_extraction(&mut self, index: usize, at: i64) {
        let Runtime::Extractor(extractor) = &mut self.runtimes[index] else {
            return;
        };
        let quantity = extractor.curve.get(extractor.cycles_completed);
        extractor.cycles_completed += 1;
        extractor.last_output = Some(quantity);
        extractor.last_end = Some(at);
        let product = extractor.product;
        self.store_output(index, product, quantity);
    }

    fn complete_factory_cycle(&mut self, index: usize) {
        let Runtime::Factory(factory) = &mut self.runtimes[index] else {
            return;
        };
        let Some(schematic) = factory.schematic else {
            return;
        };
        factory.status = FactoryStatus::Idle;
        factory.cycle_start = None;
        let input_pins = factory.input_pins.clone();

        // Inputs were checked at start; consume what is left
        for &(type_id, required) in &schematic.inputs {
            let mut remaining = required;
            for &source in &input_pins {
                if remaining == 0 {
                    break;
                }
                remaining -= self.take(source, type_id, remaining);
            }
        }
        self.store_output(index, schematic.output_type_id, schematic.output_quantity);
    }

    fn run_transfers(&mut self) {
        for i in 0..self.transfers.len() {
            let (source, destination, type_id, quantity) = self.transfers[i];
            // One whole batch per route per step; the rest waits for the next event
            if self.held(source, type_id) < quantity
                || self.room_for(destination, type_id, quantity) < quantity
            {
                continue;
            }
            self.take(source, type_id, quantity);
            *self.contents[destination].entry(type_id).or_default() += quantity;
        }
    }

    fn start_factories(&mut self, at: i64) {
        for index in 0..self.runtimes.len() {
            let Runtime::Factory(factory) = &self.runtimes[index] else {
                continue;
            };
            if factory.unknown_schematic
                || factory.status == FactoryStatus::Running
                || factory.install > at
            {
                continue;
            }
            let Some(schematic) = factory.schematic else {
                continue;
            };
            let ready = schematic.inputs.iter().all(|&(type_id, required)| {
                let available: u64 = factory
                    .input_pins
                    .iter()
                    .map(|&source| self.held(source, type_id))
                    .sum();
                available >= required
            });

            if let Runtime::Factory(factory) = &mut self.runtimes[index] {
                if ready {
                    factory.status = FactoryStatus::Running;
                    factory.cycle_start = Some(at);
                } else {
                    factory.status = FactoryStatus::Stalled;
                }
            }
        }
    }

    fn step(&mut self, at: i64) {
        for position in 0..self.event_order.len() {
            let index = self.event_order[position];
            let (extraction_due, cycle_due) = match &self.runtimes[index] {
                Runtime::Extractor(extractor) => (extractor.next_event() == Some(at), false),
                Runtime::Factory(factory) => (false, factory.next_event() == Some(at)),
                Runtime::Passive => (false, false),
            };
            if extraction_due {
                self.complete_extraction(index, at);
            } else if cycle_due {
                self.complete_factory_cycle(index);
            }
        }
        self.now = at;
        self.run_transfers();
        self.start_factories(at);
    }
}

impl Iterator for Simulation<'_> {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        if self.finished {
            return None;
        }
        let Some(at) = self.next_event_time().filter(|&t| t <= self.until) else {
            self.finished = true;
            return None;
        };
        if self.steps >= self.config.max_steps {
            tracing::warn!(steps = self.steps, "simulation step limit reached");
            self.warnings
                .push(SimulationWarning::Truncated { steps: self.steps });
            self.finished = true;
            return None;
        }

        self.steps += 1;
        self.step(at);
        Some(self.snapshot())
    }
}

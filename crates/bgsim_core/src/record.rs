//! Vessel record builder: classifies module snapshots into production and
//! consumption records and indexes flow-enabled containers.
//!
//! Records are built once per vessel when it goes off-rails and stay
//! immutable until the vessel is released; part-state changes are picked up
//! by the rebuild on the next off-rails transition, never by patching a
//! live record.

use std::collections::BTreeMap;

use glam::{DQuat, DVec3};

use crate::raytrace::Visibility;
use crate::registry::{HookState, ModuleRegistry};
use crate::resources::{self, ContainerRef, ModifiedSet, StorageIndex};
use crate::solar::SolarPanelRecord;
use crate::{
    BodyState, Event, EventSink, ModuleBehaviorDef, ModuleDef, ModuleSnapshot, PartId,
    PartSnapshot, PhysicsConstants, RateEntry, SimConfig, SystemContent, VesselId, VesselState,
};

/// Deterministic invocation order for host callbacks: module type name
/// first, then part id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackKey {
    pub module_type: String,
    pub part: PartId,
}

/// Cache entry for one off-rails vessel.
pub struct VesselRecord {
    /// Resource name to flow-enabled containers, in part/slot walk order.
    pub storage: StorageIndex,
    /// Classified module records in build order.
    pub modules: Vec<ModuleRecord>,
    /// One state slot per (hooked module type, part) pair.
    pub callbacks: BTreeMap<CallbackKey, HookState>,
}

/// One classified production/consumption behavior.
#[derive(Debug, Clone)]
pub enum ModuleRecord {
    /// Flat per-second rates attached by the host registry.
    FixedRate {
        module_type: String,
        rates: Vec<RateEntry>,
    },
    /// Command module crew/avionics draw (rates already negated).
    CommandDraw { rates: Vec<RateEntry> },
    /// Input-less generator running at full throttle.
    GeneratorOutput { rates: Vec<RateEntry> },
    SolarPanel(SolarPanelRecord),
    /// Rates produced by a host classifier closure.
    HostCustom {
        module_type: String,
        rates: Vec<RateEntry>,
    },
}

/// Shared per-vessel inputs for [`ModuleRecord::apply`], computed once per
/// vessel per tick.
pub(crate) struct ModuleTickContext<'a> {
    pub vessel_id: &'a VesselId,
    pub vessel_position: DVec3,
    pub vessel_orientation: DQuat,
    pub main_body: &'a BodyState,
    pub physics: &'a PhysicsConstants,
    pub config: &'a SimConfig,
    pub vis: Visibility,
    pub dt_s: f64,
}

impl ModuleRecord {
    /// Mutate the vessel's containers for one tick, reporting touched
    /// containers into `modified`.
    pub(crate) fn apply(
        &self,
        parts: &mut [PartSnapshot],
        storage: &StorageIndex,
        ctx: &ModuleTickContext<'_>,
        modified: &mut ModifiedSet,
        sink: &mut EventSink<'_>,
    ) {
        match self {
            ModuleRecord::FixedRate { rates, .. }
            | ModuleRecord::CommandDraw { rates }
            | ModuleRecord::GeneratorOutput { rates }
            | ModuleRecord::HostCustom { rates, .. } => {
                for entry in rates {
                    resources::add_resource(
                        parts,
                        storage,
                        entry.rate * ctx.dt_s,
                        &entry.resource_name,
                        modified,
                    );
                }
            }
            ModuleRecord::SolarPanel(panel) => panel.apply(parts, storage, ctx, modified, sink),
        }
    }
}

/// Build the cache entry for a vessel, or `None` when the host has no
/// snapshot for it yet.
///
/// Per-part and per-module problems degrade to skips with a warning event;
/// the rest of the vessel is still processed.
pub(crate) fn build_vessel_record(
    vessel: &VesselState,
    content: &SystemContent,
    registry: &ModuleRegistry,
    sink: &mut EventSink<'_>,
) -> Option<VesselRecord> {
    let snapshot = vessel.snapshot.as_ref()?;

    let mut storage = StorageIndex::new();
    let mut modules = Vec::new();
    let mut callbacks = BTreeMap::new();

    for (part_index, part) in snapshot.parts.iter().enumerate() {
        for module in &part.modules {
            if registry.has_hooks(&module.type_name) {
                callbacks.insert(
                    CallbackKey {
                        module_type: module.type_name.clone(),
                        part: part.flight_id,
                    },
                    None,
                );
            }
        }

        index_containers(vessel, part, part_index, &mut storage, sink);

        let Some(def) = content.parts.get(&part.part_name) else {
            sink.push(Event::PartDefMissing {
                vessel_id: vessel.id.clone(),
                part_name: part.part_name.clone(),
            });
            continue;
        };

        for (index, module) in part.modules.iter().enumerate() {
            let def_module = match def.modules.get(index) {
                Some(candidate) if candidate.type_name == module.type_name => Some(candidate),
                _ => search_def_by_name(vessel, def.modules.as_slice(), module, index, sink),
            };

            let record = match def_module {
                Some(def_module) => classify(part, module, def_module, registry),
                // No definition to lean on: registry data only.
                None => classify_registry_only(part, module, registry),
            };
            if let Some(record) = record {
                modules.push(record);
            }
        }
    }

    Some(VesselRecord {
        storage,
        modules,
        callbacks,
    })
}

/// Index this part's flow-enabled containers. An unreadable flow state is
/// reported but the container is still indexed.
fn index_containers(
    vessel: &VesselState,
    part: &PartSnapshot,
    part_index: usize,
    storage: &mut StorageIndex,
    sink: &mut EventSink<'_>,
) {
    for (slot, container) in part.resources.iter().enumerate() {
        // host saves capitalize booleans, so compare case-insensitively
        match container.flow_state.trim().to_ascii_lowercase().parse::<bool>() {
            Ok(false) => continue,
            Ok(true) => {}
            Err(_) => sink.push(Event::FlowStateUnreadable {
                vessel_id: vessel.id.clone(),
                resource_name: container.resource_name.clone(),
            }),
        }
        storage
            .entry(container.resource_name.clone())
            .or_default()
            .push(ContainerRef {
                part: part_index,
                slot,
            });
    }
}

/// Best-effort recovery when the snapshot module list is out of step with
/// the part definition: find the definition by type name in the remaining
/// def list. Searching only forward keeps duplicate type names from
/// rebinding a definition an earlier snapshot module already consumed.
fn search_def_by_name<'a>(
    vessel: &VesselState,
    def_modules: &'a [ModuleDef],
    module: &ModuleSnapshot,
    expected_index: usize,
    sink: &mut EventSink<'_>,
) -> Option<&'a ModuleDef> {
    let found = def_modules
        .iter()
        .enumerate()
        .skip(expected_index)
        .find(|(_, candidate)| candidate.type_name == module.type_name);

    sink.push(Event::ModuleIndexMismatch {
        vessel_id: vessel.id.clone(),
        module_type: module.type_name.clone(),
        expected_index,
        found_index: found.map(|(i, _)| i),
    });
    if found.is_none() {
        sink.push(Event::ModuleUnmatched {
            vessel_id: vessel.id.clone(),
            module_type: module.type_name.clone(),
        });
    }
    found.map(|(_, candidate)| candidate)
}

/// Classify one snapshot module against its matched definition. Host
/// classifiers run first, then the built-in rules, then flat registry
/// rates.
fn classify(
    part: &PartSnapshot,
    module: &ModuleSnapshot,
    def_module: &ModuleDef,
    registry: &ModuleRegistry,
) -> Option<ModuleRecord> {
    if let Some(rates) = registry.classify_custom(&module.type_name, module, part) {
        if !rates.is_empty() {
            return Some(ModuleRecord::HostCustom {
                module_type: module.type_name.clone(),
                rates,
            });
        }
    }

    match &def_module.behavior {
        ModuleBehaviorDef::SolarPanel(panel) => {
            let deployed = module.values.get("deployState").map(String::as_str) == Some("EXTENDED");
            if !deployed || !registry.is_interesting(&panel.resource_name) {
                return flat_rates(module, registry);
            }
            Some(ModuleRecord::SolarPanel(SolarPanelRecord {
                resource_name: panel.resource_name.clone(),
                charge_rate: panel.charge_rate,
                power_curve: panel.power_curve.clone(),
                temperature_curve: panel.temperature_curve.clone(),
                position: part.position,
                orientation: part.rotation,
                solar_normal: panel.solar_normal,
                pivot_axis: panel.pivot_axis,
                tracks: panel.sun_tracking,
                temperature_k: part.temperature_k,
            }))
        }
        ModuleBehaviorDef::Command(command) => {
            let rates: Vec<RateEntry> = command
                .input_resources
                .iter()
                .filter(|entry| registry.is_interesting(&entry.resource_name))
                .map(|entry| RateEntry {
                    resource_name: entry.resource_name.clone(),
                    rate: -entry.rate,
                })
                .collect();
            if rates.is_empty() {
                return flat_rates(module, registry);
            }
            Some(ModuleRecord::CommandDraw { rates })
        }
        ModuleBehaviorDef::Generator(generator) => {
            let active = module
                .values
                .get("generatorIsActive")
                .map(|v| v.trim().to_ascii_lowercase().parse::<bool>().unwrap_or(false))
                .unwrap_or(false);
            // Generators with inputs depend on throttle state the snapshot
            // cannot express; only free-running ones are simulated.
            if !active || !generator.inputs.is_empty() {
                return flat_rates(module, registry);
            }
            let rates: Vec<RateEntry> = generator
                .outputs
                .iter()
                .filter(|entry| registry.is_interesting(&entry.resource_name))
                .cloned()
                .collect();
            if rates.is_empty() {
                return flat_rates(module, registry);
            }
            Some(ModuleRecord::GeneratorOutput { rates })
        }
        ModuleBehaviorDef::Inert => flat_rates(module, registry),
    }
}

/// Classification with no usable definition: host classifier, then flat
/// registry rates.
fn classify_registry_only(
    part: &PartSnapshot,
    module: &ModuleSnapshot,
    registry: &ModuleRegistry,
) -> Option<ModuleRecord> {
    if let Some(rates) = registry.classify_custom(&module.type_name, module, part) {
        if !rates.is_empty() {
            return Some(ModuleRecord::HostCustom {
                module_type: module.type_name.clone(),
                rates,
            });
        }
    }
    flat_rates(module, registry)
}

/// Flat per-second rates registered for this module type, if any.
fn flat_rates(module: &ModuleSnapshot, registry: &ModuleRegistry) -> Option<ModuleRecord> {
    let rates = registry.rates_for(&module.type_name)?;
    if rates.is_empty() {
        return None;
    }
    Some(ModuleRecord::FixedRate {
        module_type: module.type_name.clone(),
        rates: rates.to_vec(),
    })
}

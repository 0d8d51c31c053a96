//! Background tick engine.
//!
//! [`BackgroundSim`] owns the off-rails vessel cache. Each call to
//! [`BackgroundSim::tick`] walks every inactive vessel in id order, builds
//! or drops its cache entry as it crosses the off-rails boundary, and runs
//! the classified module records plus any registered host callbacks.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::record::{self, CallbackKey, ModuleTickContext, VesselRecord};
use crate::registry::{HookState, ModuleRegistry, UpdateHook};
use crate::resources::{self, ModifiedSet};
use crate::{
    raytrace, Event, EventEnvelope, EventSink, FleetState, SimConfig, Situation, SystemContent,
    VesselId, VesselState,
};

/// One process-wide slot for a claimed engine. A second claimant gets a
/// disabled instance instead of double-ticking the same fleet.
static PROCESS_SLOT: AtomicBool = AtomicBool::new(false);

pub struct BackgroundSim {
    config: SimConfig,
    registry: ModuleRegistry,
    records: HashMap<VesselId, VesselRecord>,
    enabled: bool,
    claimed: bool,
}

/// Resource access handed to `WithResources` update hooks: scoped to one
/// vessel, routed through its flow-enabled container index.
pub struct ResourceBroker<'a> {
    vessel: &'a mut VesselState,
    storage: &'a resources::StorageIndex,
}

impl ResourceBroker<'_> {
    pub fn vessel(&self) -> &VesselState {
        self.vessel
    }

    /// Drain `amount` of `resource_name` from the vessel; returns `amount`
    /// minus the clamp loss. Negative `amount` deposits instead.
    pub fn request(&mut self, amount: f64, resource_name: &str) -> f64 {
        let Some(snapshot) = self.vessel.snapshot.as_mut() else {
            return 0.0;
        };
        resources::request_resource(&mut snapshot.parts, self.storage, amount, resource_name)
    }
}

impl BackgroundSim {
    /// Engine without a process-slot claim, for hosts that manage their own
    /// instance lifetime (and for tests).
    pub fn new(config: SimConfig, registry: ModuleRegistry) -> Self {
        Self {
            config,
            registry,
            records: HashMap::new(),
            enabled: true,
            claimed: false,
        }
    }

    /// Engine holding the process-wide slot. If another claimed engine is
    /// alive, the returned instance is permanently disabled and every tick
    /// is a no-op.
    pub fn claim(config: SimConfig, registry: ModuleRegistry) -> Self {
        let first = !PROCESS_SLOT.swap(true, Ordering::AcqRel);
        let mut sim = Self::new(config, registry);
        sim.enabled = first;
        sim.claimed = first;
        sim
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn cached_vessels(&self) -> usize {
        self.records.len()
    }

    /// Advance every eligible off-rails vessel by `dt_s` seconds and bump
    /// the fleet tick. Returns the events this tick emitted.
    pub fn tick(
        &mut self,
        state: &mut FleetState,
        content: &SystemContent,
        dt_s: f64,
    ) -> Vec<EventEnvelope> {
        let mut out = Vec::new();
        if !self.enabled {
            return out;
        }
        let Self {
            config,
            registry,
            records,
            ..
        } = self;
        let config: &SimConfig = config;
        let FleetState {
            tick,
            active_vessel,
            vessels,
            bodies,
            star,
            counters,
        } = state;
        let mut sink = EventSink::new(config, counters, *tick, &mut out);

        let mut ids: Vec<VesselId> = vessels.keys().cloned().collect();
        ids.sort();

        for vessel_id in ids {
            if active_vessel.as_ref() == Some(&vessel_id) {
                continue;
            }
            let Some(vessel) = vessels.get_mut(&vessel_id) else {
                continue;
            };
            if !eligible(vessel, config) {
                continue;
            }

            let off_rails = !vessel.loaded || vessel.packed;
            if !off_rails {
                if let Some(record) = records.remove(&vessel_id) {
                    run_save_hooks(registry, &record, vessel);
                    sink.push(Event::VesselReleased {
                        vessel_id: vessel_id.clone(),
                    });
                }
                continue;
            }

            let record = match records.entry(vessel_id.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let Some(mut record) =
                        record::build_vessel_record(vessel, content, registry, &mut sink)
                    else {
                        continue;
                    };
                    sink.push(Event::VesselCached {
                        vessel_id: vessel_id.clone(),
                        module_records: record.modules.len(),
                        resource_names: record.storage.len(),
                    });
                    for (key, slot) in record.callbacks.iter_mut() {
                        if let Some(hooks) = registry.hooks_for_mut(&key.module_type) {
                            hooks.invoke_load(vessel, key.part, slot);
                        }
                    }
                    entry.insert(record)
                }
            };

            let Some(main_body) = bodies.get(&vessel.main_body) else {
                continue;
            };
            // One visibility trace per vessel per tick, shared by every
            // panel on board.
            let vis = raytrace::star_visibility(bodies, vessel.position, &vessel.main_body, star);

            let vessel_position = vessel.position;
            let vessel_orientation = vessel.orientation;
            let VesselRecord {
                storage,
                modules,
                callbacks,
            } = record;

            if let Some(snapshot) = vessel.snapshot.as_mut() {
                let ctx = ModuleTickContext {
                    vessel_id: &vessel_id,
                    vessel_position,
                    vessel_orientation,
                    main_body,
                    physics: &content.physics,
                    config,
                    vis,
                    dt_s,
                };
                let mut modified = ModifiedSet::default();
                for module in modules.iter() {
                    module.apply(&mut snapshot.parts, storage, &ctx, &mut modified, &mut sink);
                }
                if !modified.is_empty() {
                    let loss = resources::clamp_resource(&mut snapshot.parts, &modified);
                    if loss.abs() > 0.0 {
                        sink.push(Event::ClampLoss {
                            vessel_id: vessel_id.clone(),
                            loss,
                        });
                    }
                }
            }

            run_update_hooks(registry, callbacks, storage, vessel);
        }

        // Vessels that vanished from the fleet while cached.
        let mut stale: Vec<VesselId> = records
            .keys()
            .filter(|id| !vessels.contains_key(*id))
            .cloned()
            .collect();
        stale.sort();
        for vessel_id in stale {
            records.remove(&vessel_id);
            sink.push(Event::VesselReleased { vessel_id });
        }

        *tick += 1;
        out
    }

    /// Run save hooks for every cached vessel without dropping the cache.
    /// Called by the host before it serializes its own state.
    pub fn flush(&mut self, state: &FleetState) {
        if !self.enabled {
            return;
        }
        let mut ids: Vec<&VesselId> = self.records.keys().collect();
        ids.sort();
        for vessel_id in ids {
            let Some(record) = self.records.get(vessel_id) else {
                continue;
            };
            let Some(vessel) = state.vessels.get(vessel_id) else {
                continue;
            };
            run_save_hooks(&mut self.registry, record, vessel);
        }
    }

    /// Flush save hooks, then drop every cache entry. Used on scene-level
    /// resets where all records must be rebuilt from fresh snapshots.
    pub fn clear(&mut self, state: &mut FleetState) -> Vec<EventEnvelope> {
        if !self.enabled {
            return Vec::new();
        }
        self.flush(state);
        let dropped = self.records.len();
        self.records.clear();
        let mut out = Vec::new();
        let mut sink = EventSink::new(
            &self.config,
            &mut state.counters,
            state.tick,
            &mut out,
        );
        sink.push(Event::CacheCleared { vessels: dropped });
        drop(sink);
        out
    }

    /// Drain `amount` of `resource_name` from a cached vessel, outside the
    /// tick loop. Returns `amount` minus the clamp loss; `0.0` for vessels
    /// without a cache entry.
    pub fn request_resource(
        &self,
        state: &mut FleetState,
        vessel_id: &VesselId,
        amount: f64,
        resource_name: &str,
    ) -> f64 {
        let Some(record) = self.records.get(vessel_id) else {
            return 0.0;
        };
        let Some(vessel) = state.vessels.get_mut(vessel_id) else {
            return 0.0;
        };
        let Some(snapshot) = vessel.snapshot.as_mut() else {
            return 0.0;
        };
        resources::request_resource(&mut snapshot.parts, &record.storage, amount, resource_name)
    }
}

impl Drop for BackgroundSim {
    fn drop(&mut self) {
        if self.claimed {
            PROCESS_SLOT.store(false, Ordering::Release);
        }
    }
}

/// Simulation eligibility independent of the off-rails check. Prelaunch
/// vessels sitting on the pad are excluded unless configured in.
fn eligible(vessel: &VesselState, config: &SimConfig) -> bool {
    config.simulate_prelaunch || vessel.situation != Situation::Prelaunch
}

fn run_save_hooks(registry: &mut ModuleRegistry, record: &VesselRecord, vessel: &VesselState) {
    for (key, slot) in &record.callbacks {
        if let Some(hooks) = registry.hooks_for_mut(&key.module_type) {
            hooks.invoke_save(vessel, key.part, slot);
        }
    }
}

fn run_update_hooks(
    registry: &mut ModuleRegistry,
    callbacks: &mut BTreeMap<CallbackKey, HookState>,
    storage: &resources::StorageIndex,
    vessel: &mut VesselState,
) {
    for (key, slot) in callbacks.iter_mut() {
        let Some(hooks) = registry.hooks_for_mut(&key.module_type) else {
            continue;
        };
        match &mut hooks.update {
            Some(UpdateHook::Plain(update)) => update(vessel, key.part, slot),
            Some(UpdateHook::WithResources(update)) => {
                let mut broker = ResourceBroker {
                    vessel: &mut *vessel,
                    storage,
                };
                update(&mut broker, key.part, slot);
            }
            None => {}
        }
    }
}

//! `bgsim_core` — background resource simulation for off-rails vessels.
//!
//! No IO, no clocks. The host feeds in fleet snapshots and a fixed `dt`;
//! given the same inputs the tick is bit-for-bit deterministic.

mod config;
mod curve;
mod engine;
pub mod raytrace;
mod record;
mod registry;
mod resources;
mod solar;
mod types;

pub use config::SimConfig;
pub use curve::FloatCurve;
pub use engine::{BackgroundSim, ResourceBroker};
pub use raytrace::Visibility;
pub use record::{CallbackKey, ModuleRecord, VesselRecord};
pub use registry::{ClassifierFn, HookSet, HookState, LoadFn, ModuleRegistry, SaveFn, UpdateHook};
pub use resources::{ContainerRef, ModifiedSet, StorageIndex};
pub use solar::{atmosphere_factor, orientation_factor, SolarPanelRecord};
pub use types::*;

/// Verbosity-gated event collector threaded through one tick.
pub(crate) struct EventSink<'a> {
    config: &'a SimConfig,
    counters: &'a mut Counters,
    tick: u64,
    out: &'a mut Vec<EventEnvelope>,
}

impl<'a> EventSink<'a> {
    pub(crate) fn new(
        config: &'a SimConfig,
        counters: &'a mut Counters,
        tick: u64,
        out: &'a mut Vec<EventEnvelope>,
    ) -> Self {
        Self {
            config,
            counters,
            tick,
            out,
        }
    }

    /// Emit `event` if the configured verbosity admits its level.
    pub(crate) fn push(&mut self, event: Event) {
        if event.level() > self.config.verbosity {
            return;
        }
        let id = EventId(format!("evt_{:06}", self.counters.next_event_id));
        self.counters.next_event_id += 1;
        self.out.push(EventEnvelope {
            id,
            tick: self.tick,
            event,
        });
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

//! Type definitions for `bgsim_core`.
//!
//! Host-observed state (vessels, bodies), static content (part catalog,
//! physics constants), and the event stream. The host owns every vessel
//! and body; this crate mutates nothing but resource container amounts
//! and the tick counter.

use std::collections::HashMap;

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::FloatCurve;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(VesselId);
string_id!(BodyId);
string_id!(EventId);

/// Stable per-part flight id, assigned by the host when the part launches.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct PartId(pub u32);

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Host-observed state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Situation {
    Prelaunch,
    Landed,
    Splashed,
    Orbiting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
}

/// Everything the host exposes for one tick: vessels, celestial bodies,
/// and which vessel (if any) is under full simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetState {
    pub tick: u64,
    /// The player-controlled vessel — always excluded from background ticks.
    pub active_vessel: Option<VesselId>,
    pub vessels: HashMap<VesselId, VesselState>,
    pub bodies: HashMap<BodyId, BodyState>,
    pub star: BodyId,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselState {
    pub id: VesselId,
    pub name: String,
    pub loaded: bool,
    pub packed: bool,
    pub situation: Situation,
    pub main_body: BodyId,
    /// World position, evaluated by the host each tick.
    pub position: DVec3,
    /// World orientation of the vessel root, evaluated by the host each tick.
    pub orientation: DQuat,
    /// `None` while the host has no snapshot data — the vessel is skipped
    /// and naturally retried next tick.
    pub snapshot: Option<VesselSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselSnapshot {
    pub parts: Vec<PartSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartSnapshot {
    pub flight_id: PartId,
    /// Keys into the `SystemContent` part catalog.
    pub part_name: String,
    /// Sampled once when the snapshot was taken; not re-sampled off-rails.
    pub temperature_k: f64,
    /// Mount offset from the vessel root.
    pub position: DVec3,
    /// Mount rotation relative to the vessel root.
    pub rotation: DQuat,
    pub modules: Vec<ModuleSnapshot>,
    pub resources: Vec<ResourceContainer>,
}

/// A module instance as the host serialized it: a type name plus loose
/// string fields (`deployState`, `generatorIsActive`, ...). Fields are
/// parsed defensively wherever they are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub type_name: String,
    #[serde(default)]
    pub values: HashMap<String, String>,
}

/// One resource store inside a part snapshot.
///
/// `amount` and `max_amount` stay in the host's decimal-text form; a value
/// that fails to parse means "skip this container for this tick", never an
/// error. `flow_state` is parsed once at record-build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContainer {
    pub resource_name: String,
    pub amount: String,
    pub max_amount: String,
    pub flow_state: String,
}

impl ResourceContainer {
    /// Parse `(amount, max_amount)`. `None` when either field is unreadable.
    pub fn read(&self) -> Option<(f64, f64)> {
        let amount = self.amount.trim().parse().ok()?;
        let max = self.max_amount.trim().parse().ok()?;
        Some((amount, max))
    }

    pub fn write_amount(&mut self, value: f64) {
        self.amount = format!("{value}");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyState {
    pub id: BodyId,
    pub name: String,
    pub position: DVec3,
    pub radius_m: f64,
    /// The body this body orbits; `None` for the star.
    pub reference_body: Option<BodyId>,
    /// Bodies orbiting this one, used as occluders.
    pub satellites: Vec<BodyId>,
    pub atmosphere: Option<AtmosphereDef>,
}

/// Coarse atmosphere parameters. The derived pressure/density/attenuation
/// formulas live in `solar.rs` and are legacy approximations, not a
/// physical model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtmosphereDef {
    pub sea_level_pressure_kpa: f64,
    pub scale_height_m: f64,
    /// Altitude above which static pressure is exactly zero.
    pub depth_m: f64,
    pub molar_mass_kg_per_mol: f64,
    /// Legacy path-length knob for the attenuation branch; roughly
    /// body radius over scale height.
    pub radius_atmo_factor: f64,
}

// ---------------------------------------------------------------------------
// Static content
// ---------------------------------------------------------------------------

/// Static catalog data gathered once at startup — the part definitions the
/// host loaded and the star physics values it exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemContent {
    pub content_version: String,
    pub parts: HashMap<String, PartDef>,
    pub physics: PhysicsConstants,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartDef {
    pub name: String,
    /// Ordered as the host defines them; snapshot module lists are aligned
    /// against this order at record-build time.
    pub modules: Vec<ModuleDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDef {
    pub type_name: String,
    pub behavior: ModuleBehaviorDef,
}

/// Built-in classifier data per module kind. Anything the engine has no
/// built-in knowledge of is `Inert` and only matters to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModuleBehaviorDef {
    SolarPanel(SolarPanelDef),
    Command(CommandDef),
    Generator(GeneratorDef),
    Inert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolarPanelDef {
    pub resource_name: String,
    /// Output rate at reference flux, perfect orientation, unit temperature
    /// efficiency.
    pub charge_rate: f64,
    /// Optional output multiplier keyed on star distance; when absent the
    /// flux ratio against `luminosity_at_home` is used instead.
    pub power_curve: Option<FloatCurve>,
    pub temperature_curve: FloatCurve,
    /// Panel face normal in part space.
    pub solar_normal: DVec3,
    /// Tracking pivot axis in part space.
    pub pivot_axis: DVec3,
    pub sun_tracking: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDef {
    pub input_resources: Vec<RateEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorDef {
    pub inputs: Vec<RateEntry>,
    pub outputs: Vec<RateEntry>,
}

/// A (resource, rate) pair; rate is per second, sign = produce/consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateEntry {
    pub resource_name: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConstants {
    /// Star luminosity in W. The host initializes this lazily; `0.0` means
    /// "not yet available" and triggers the analytic fallback.
    pub solar_luminosity: f64,
    /// Reference flux (W/m²) at the home body's orbital distance.
    pub luminosity_at_home: f64,
    pub home_semi_major_axis_m: f64,
}

impl PhysicsConstants {
    /// Star luminosity, substituting `A² · 4π · flux_home` while the host
    /// value is still zero so flux math never divides by (near-)zero.
    pub fn effective_luminosity(&self) -> f64 {
        if self.solar_luminosity <= f64::EPSILON {
            let a = self.home_semi_major_axis_m;
            a * a * 4.0 * std::f64::consts::PI * self.luminosity_at_home
        } else {
            self.solar_luminosity
        }
    }
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

/// Event gate. Quieter levels come first so `level <= configured` decides
/// emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verbosity {
    Silent,
    Normal,
    Warning,
    Debug,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    VesselCached {
        vessel_id: VesselId,
        module_records: usize,
        resource_names: usize,
    },
    VesselReleased {
        vessel_id: VesselId,
    },
    CacheCleared {
        vessels: usize,
    },
    PartDefMissing {
        vessel_id: VesselId,
        part_name: String,
    },
    /// Snapshot module list out of step with the part definition.
    ModuleIndexMismatch {
        vessel_id: VesselId,
        module_type: String,
        expected_index: usize,
        found_index: Option<usize>,
    },
    /// No matching definition module remained; only this module is skipped.
    ModuleUnmatched {
        vessel_id: VesselId,
        module_type: String,
    },
    FlowStateUnreadable {
        vessel_id: VesselId,
        resource_name: String,
    },
    /// Only emitted at `Verbosity::Debug`.
    StarOccluded {
        vessel_id: VesselId,
    },
    /// Only emitted at `Verbosity::Debug`.
    PanelOutput {
        vessel_id: VesselId,
        resource_name: String,
        rate: f64,
    },
    /// Nonzero clamp loss after a vessel's distribution pass. Positive =
    /// resource created to cover an empty-container draw, negative =
    /// overflow destroyed.
    ClampLoss {
        vessel_id: VesselId,
        loss: f64,
    },
}

impl Event {
    pub fn level(&self) -> Verbosity {
        match self {
            Event::VesselCached { .. }
            | Event::VesselReleased { .. }
            | Event::CacheCleared { .. } => Verbosity::Normal,
            Event::PartDefMissing { .. }
            | Event::ModuleIndexMismatch { .. }
            | Event::ModuleUnmatched { .. }
            | Event::FlowStateUnreadable { .. } => Verbosity::Warning,
            Event::StarOccluded { .. } | Event::PanelOutput { .. } | Event::ClampLoss { .. } => {
                Verbosity::Debug
            }
        }
    }
}

//! Solar panel power model: orientation, flux, atmospheric attenuation,
//! temperature efficiency.

use std::f64::consts::{FRAC_PI_2, PI};

use glam::{DQuat, DVec3};

use crate::record::ModuleTickContext;
use crate::resources::{self, ModifiedSet, StorageIndex};
use crate::{AtmosphereDef, BodyState, Event, EventSink, FloatCurve, PartSnapshot};

/// Sea-level air density (kg/m³) of the reference home atmosphere.
const ASL_DENSITY: f64 = 1.225;

/// Legacy attenuation constant: fraction of insolation lost through one
/// reference atmosphere at zenith. Fixed for parity, not derived.
const SOLAR_INSOLATION_AT_HOME: f64 = 0.15;

/// Universal gas constant, J/(mol·K).
const GAS_CONSTANT: f64 = 8.314_462_618_153_24;

impl BodyState {
    /// Static pressure (kPa) at `altitude_m`; zero with no atmosphere or
    /// above the atmosphere depth.
    pub fn static_pressure_kpa(&self, altitude_m: f64) -> f64 {
        let Some(atmo) = &self.atmosphere else {
            return 0.0;
        };
        if altitude_m > atmo.depth_m {
            return 0.0;
        }
        atmo.sea_level_pressure_kpa * (-altitude_m / atmo.scale_height_m).exp()
    }
}

impl AtmosphereDef {
    /// Ideal-gas air density (kg/m³) from pressure and temperature.
    pub fn density(&self, pressure_kpa: f64, temperature_k: f64) -> f64 {
        if temperature_k <= 0.0 {
            return 0.0;
        }
        pressure_kpa * 1000.0 * self.molar_mass_kg_per_mol / (GAS_CONSTANT * temperature_k)
    }

    /// Zenith flux attenuation as a function of local air density. Rational
    /// legacy form; 1 at vacuum, falling toward 0 as density grows.
    pub fn solar_power_factor(&self, density: f64) -> f64 {
        let k = (1.0 - SOLAR_INSOLATION_AT_HOME) * ASL_DENSITY;
        k / (k + density * SOLAR_INSOLATION_AT_HOME)
    }
}

/// Per-panel data captured once at record-build time. Temperature and
/// curves are not re-sampled while the vessel stays off-rails.
#[derive(Debug, Clone)]
pub struct SolarPanelRecord {
    pub resource_name: String,
    pub charge_rate: f64,
    pub power_curve: Option<FloatCurve>,
    pub temperature_curve: FloatCurve,
    /// Mount offset from the vessel root (panel position is approximated by
    /// the vessel position — no intra-vessel occlusion off-rails).
    pub position: DVec3,
    /// Mount rotation relative to the vessel root.
    pub orientation: DQuat,
    pub solar_normal: DVec3,
    pub pivot_axis: DVec3,
    pub tracks: bool,
    pub temperature_k: f64,
}

/// Unitless [0, ∞) efficiency of the panel's facing relative to the sun.
///
/// Tracking panels sweep the pivot toward the sun: efficiency is the cosine
/// of the deviation from perpendicular-to-pivot, i.e. `cos(π/2 − acos(pivot
/// · sun))`. Fixed panels use the plain normal/sun dot product. Never
/// negative, never NaN.
pub fn orientation_factor(
    panel: &SolarPanelRecord,
    vessel_orientation: DQuat,
    sun_dir: DVec3,
) -> f64 {
    let mount = vessel_orientation * panel.orientation;
    let factor = if panel.tracks {
        let pivot = mount.mul_vec3(panel.pivot_axis).normalize();
        // clamp keeps acos finite when the dot drifts past ±1
        let d = pivot.dot(sun_dir).clamp(-1.0, 1.0);
        (FRAC_PI_2 - d.acos()).cos()
    } else {
        mount.mul_vec3(panel.solar_normal).normalize().dot(sun_dir)
    };
    factor.max(0.0)
}

/// Flux attenuation through the main body's atmosphere, 1.0 when there is
/// none. Two closed-form branches on the sign of the sun's elevation,
/// preserved as a fixed legacy formula.
pub fn atmosphere_factor(
    body: &BodyState,
    altitude_m: f64,
    up: DVec3,
    sun_dir: DVec3,
    temperature_k: f64,
) -> f64 {
    let Some(atmo) = &body.atmosphere else {
        return 1.0;
    };
    let pressure = body.static_pressure_kpa(altitude_m);
    if pressure <= 0.0 {
        return 1.0;
    }

    let density = atmo.density(pressure, temperature_k);
    let raf = atmo.radius_atmo_factor;
    let sun_power = raf * up.dot(sun_dir);
    let mut factor = atmo.solar_power_factor(density);
    if sun_power < 0.0 {
        factor /= (2.0 * raf + 1.0).sqrt();
    } else {
        factor /= (sun_power * sun_power + 2.0 * raf + 1.0).sqrt() - sun_power;
    }
    factor
}

impl SolarPanelRecord {
    /// Produce this tick's output into the vessel's containers. No-op while
    /// the star is occluded.
    pub(crate) fn apply(
        &self,
        parts: &mut [PartSnapshot],
        storage: &StorageIndex,
        ctx: &ModuleTickContext<'_>,
        modified: &mut ModifiedSet,
        sink: &mut EventSink<'_>,
    ) {
        if !ctx.vis.visible {
            sink.push(Event::StarOccluded {
                vessel_id: ctx.vessel_id.clone(),
            });
            return;
        }

        let orientation = if ctx.config.solar_orientation_matters {
            orientation_factor(self, ctx.vessel_orientation, ctx.vis.direction)
        } else {
            1.0
        };

        let d = ctx.vis.distance;
        let mut flux = ctx.physics.effective_luminosity() / (4.0 * PI * d * d);

        let from_center = ctx.vessel_position - ctx.main_body.position;
        let altitude_m = from_center.length() - ctx.main_body.radius_m;
        flux *= atmosphere_factor(
            ctx.main_body,
            altitude_m,
            from_center.normalize(),
            ctx.vis.direction,
            self.temperature_k,
        );

        let multiplier = match &self.power_curve {
            Some(curve) => curve.evaluate(d),
            None => flux / ctx.physics.luminosity_at_home,
        };
        let temp_factor = if ctx.config.solar_temperature_matters {
            self.temperature_curve.evaluate(self.temperature_k)
        } else {
            1.0
        };

        let rate = self.charge_rate * orientation * temp_factor * multiplier;
        sink.push(Event::PanelOutput {
            vessel_id: ctx.vessel_id.clone(),
            resource_name: self.resource_name.clone(),
            rate,
        });
        resources::add_resource(parts, storage, rate * ctx.dt_s, &self.resource_name, modified);
    }
}

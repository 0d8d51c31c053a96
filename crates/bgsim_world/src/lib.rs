//! Content loading, scenario setup and fleet generation shared by the CLI
//! and any other host frontend.

use anyhow::{Context, Result};
use bgsim_core::{
    BodyId, FleetState, ModuleBehaviorDef, PartDef, PartId, PartSnapshot, PhysicsConstants,
    RateEntry, ResourceContainer, SimConfig, Situation, SystemContent, VesselId, VesselSnapshot,
    VesselState,
};
use glam::{DQuat, DVec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Deserialize)]
struct PhysicsFile {
    content_version: String,
    physics: PhysicsConstants,
}

#[derive(Deserialize)]
struct PartsFile {
    parts: Vec<PartDef>,
}

#[derive(Deserialize)]
struct RatesFile {
    rates: HashMap<String, Vec<RateEntry>>,
}

/// A saved fleet plus the circular orbits the runner uses to move it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub state: FleetState,
    pub orbits: HashMap<VesselId, CircularOrbit>,
}

/// Planar circular orbit, enough to exercise day/night and moon-shadow
/// geometry without a real propagator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularOrbit {
    pub body: BodyId,
    pub radius_m: f64,
    pub angular_rate_rad_s: f64,
    pub phase_rad: f64,
}

/// Load `physics.json` and `parts.json` from `dir`.
pub fn load_content(dir: &Path) -> Result<SystemContent> {
    let physics_file: PhysicsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("physics.json")).context("reading physics.json")?,
    )
    .context("parsing physics.json")?;
    let parts_file: PartsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("parts.json")).context("reading parts.json")?,
    )
    .context("parsing parts.json")?;

    let content = SystemContent {
        content_version: physics_file.content_version,
        parts: parts_file
            .parts
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect(),
        physics: physics_file.physics,
    };
    validate_content(&content);
    Ok(content)
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let scenario: Scenario = serde_json::from_str(
        &std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
    )
    .with_context(|| format!("parsing {}", path.display()))?;
    validate_scenario(&scenario);
    Ok(scenario)
}

/// Load `rates.json`: flat per-second rate tables keyed by module type
/// name, fed into the registry by the host. The file is optional; absent
/// means no custom rates.
pub fn load_rates(dir: &Path) -> Result<HashMap<String, Vec<RateEntry>>> {
    let path = dir.join("rates.json");
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let rates_file: RatesFile = serde_json::from_str(
        &std::fs::read_to_string(&path).context("reading rates.json")?,
    )
    .context("parsing rates.json")?;
    for (type_name, entries) in &rates_file.rates {
        for entry in entries {
            assert!(
                entry.rate.is_finite(),
                "module type '{type_name}': non-finite rate for '{}'",
                entry.resource_name,
            );
        }
    }
    Ok(rates_file.rates)
}

/// Engine configuration is optional and defensive: a missing or unreadable
/// file falls back to the defaults rather than failing the run.
pub fn load_config(path: &Path) -> SimConfig {
    let Ok(text) = std::fs::read_to_string(path) else {
        return SimConfig::default();
    };
    serde_json::from_str(&text).unwrap_or_default()
}

/// Validates the part catalog and physics block, panicking on any authoring
/// error.
///
/// Catches mistakes like: a part whose map key disagrees with its name, a
/// solar panel producing an unnamed resource, or non-positive reference
/// luminosity.
pub fn validate_content(content: &SystemContent) {
    assert!(
        content.physics.luminosity_at_home > 0.0,
        "luminosity_at_home must be positive",
    );
    assert!(
        content.physics.home_semi_major_axis_m > 0.0,
        "home_semi_major_axis_m must be positive",
    );
    assert!(
        content.physics.solar_luminosity >= 0.0,
        "solar_luminosity may be zero (fallback) but never negative",
    );

    for (key, part) in &content.parts {
        assert_eq!(
            key, &part.name,
            "part catalog key '{key}' disagrees with part name '{}'",
            part.name,
        );
        for module in &part.modules {
            match &module.behavior {
                ModuleBehaviorDef::SolarPanel(panel) => {
                    assert!(
                        !panel.resource_name.is_empty(),
                        "part '{key}': solar panel with an empty resource name",
                    );
                    assert!(
                        panel.charge_rate.is_finite(),
                        "part '{key}': non-finite charge rate",
                    );
                }
                ModuleBehaviorDef::Command(command) => {
                    for entry in &command.input_resources {
                        assert!(
                            !entry.resource_name.is_empty(),
                            "part '{key}': command draw with an empty resource name",
                        );
                    }
                }
                ModuleBehaviorDef::Generator(generator) => {
                    for entry in generator.inputs.iter().chain(&generator.outputs) {
                        assert!(
                            entry.rate.is_finite(),
                            "part '{key}': non-finite generator rate for '{}'",
                            entry.resource_name,
                        );
                    }
                }
                ModuleBehaviorDef::Inert => {}
            }
        }
    }
}

/// Validates cross-references in a scenario, panicking on authoring errors:
/// orbits around unknown bodies, vessels on unknown bodies, dangling
/// satellite/reference links.
pub fn validate_scenario(scenario: &Scenario) {
    let state = &scenario.state;
    assert!(
        state.bodies.contains_key(&state.star),
        "star '{}' is not a known body",
        state.star,
    );
    for body in state.bodies.values() {
        if let Some(reference) = &body.reference_body {
            assert!(
                state.bodies.contains_key(reference),
                "body '{}' references unknown body '{reference}'",
                body.id,
            );
        }
        for satellite in &body.satellites {
            assert!(
                state.bodies.contains_key(satellite),
                "body '{}' lists unknown satellite '{satellite}'",
                body.id,
            );
        }
    }
    for vessel in state.vessels.values() {
        assert!(
            state.bodies.contains_key(&vessel.main_body),
            "vessel '{}' orbits unknown body '{}'",
            vessel.id,
            vessel.main_body,
        );
    }
    for (vessel_id, orbit) in &scenario.orbits {
        assert!(
            state.vessels.contains_key(vessel_id),
            "orbit for unknown vessel '{vessel_id}'",
        );
        assert!(
            state.bodies.contains_key(&orbit.body),
            "vessel '{vessel_id}' orbit around unknown body '{}'",
            orbit.body,
        );
        assert!(
            orbit.radius_m > 0.0,
            "vessel '{vessel_id}' orbit radius must be positive",
        );
    }
}

/// Advance every orbit by `dt_s` and rewrite the vessels' world positions.
/// Orbits are planar, so shadows sweep past every vessel once per period.
pub fn advance_positions(
    state: &mut FleetState,
    orbits: &mut HashMap<VesselId, CircularOrbit>,
    dt_s: f64,
) {
    for (vessel_id, orbit) in orbits.iter_mut() {
        orbit.phase_rad = (orbit.phase_rad + orbit.angular_rate_rad_s * dt_s)
            % std::f64::consts::TAU;
        let Some(body) = state.bodies.get(&orbit.body) else {
            continue;
        };
        let offset = DVec3::new(
            orbit.radius_m * orbit.phase_rad.cos(),
            orbit.radius_m * orbit.phase_rad.sin(),
            0.0,
        );
        let position = body.position + offset;
        if let Some(vessel) = state.vessels.get_mut(vessel_id) {
            vessel.position = position;
        }
    }
}

fn container(resource_name: &str, amount: f64, max_amount: f64) -> ResourceContainer {
    ResourceContainer {
        resource_name: resource_name.to_string(),
        amount: format!("{amount}"),
        max_amount: format!("{max_amount}"),
        flow_state: "True".to_string(),
    }
}

fn snapshot_part(flight_id: u32, part_name: &str, module_type: Option<(&str, &[(&str, &str)])>) -> PartSnapshot {
    PartSnapshot {
        flight_id: PartId(flight_id),
        part_name: part_name.to_string(),
        temperature_k: 290.0,
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        modules: module_type
            .map(|(type_name, values)| {
                vec![bgsim_core::ModuleSnapshot {
                    type_name: type_name.to_string(),
                    values: values
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                }]
            })
            .unwrap_or_default(),
        resources: vec![],
    }
}

/// Generate `count` probes on circular orbits around the non-star bodies.
/// Each probe carries a pod, a deployed panel, a battery and a transmitter;
/// every third one gets an RTG for the shadowed stretches.
pub fn generate_fleet(
    state: &mut FleetState,
    count: usize,
    rng: &mut impl Rng,
) -> HashMap<VesselId, CircularOrbit> {
    let mut hosts: Vec<BodyId> = state
        .bodies
        .values()
        .filter(|b| b.id != state.star)
        .map(|b| b.id.clone())
        .collect();
    hosts.sort();
    assert!(!hosts.is_empty(), "fleet generation needs a non-star body");

    let mut orbits = HashMap::new();
    for i in 0..count {
        let vessel_id = VesselId(format!("probe-{i:03}"));
        let body_id = hosts[rng.gen_range(0..hosts.len())].clone();
        let body = &state.bodies[&body_id];

        let radius_m = body.radius_m * rng.gen_range(1.2..4.0);
        let phase_rad = rng.gen_range(0.0..std::f64::consts::TAU);
        // circular orbit rate is arbitrary here; scaled so low orbits move faster
        let angular_rate_rad_s = 1.0e-3 * (body.radius_m / radius_m).powf(1.5);
        let position = body.position
            + DVec3::new(radius_m * phase_rad.cos(), radius_m * phase_rad.sin(), 0.0);

        let mut parts = vec![
            snapshot_part(1, "probeCore", Some(("CommandPod", &[]))),
            snapshot_part(2, "solarPanel", Some(("DeployableSolarPanel", &[("deployState", "EXTENDED")]))),
            snapshot_part(4, "transmitter", Some(("Transmitter", &[]))),
        ];
        if i % 3 == 0 {
            parts.push(snapshot_part(
                3,
                "rtg",
                Some(("RadioisotopeGenerator", &[("generatorIsActive", "True")])),
            ));
        }
        let mut battery = snapshot_part(5, "battery", None);
        battery
            .resources
            .push(container("ElectricCharge", rng.gen_range(20.0..180.0), 200.0));
        parts.push(battery);

        state.vessels.insert(
            vessel_id.clone(),
            VesselState {
                id: vessel_id.clone(),
                name: format!("Probe {i:03}"),
                loaded: false,
                packed: false,
                situation: Situation::Orbiting,
                main_body: body_id.clone(),
                position,
                orientation: DQuat::IDENTITY,
                snapshot: Some(VesselSnapshot { parts }),
            },
        );
        orbits.insert(
            vessel_id,
            CircularOrbit {
                body: body_id,
                radius_m,
                angular_rate_rad_s,
                phase_rad,
            },
        );
    }
    orbits
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgsim_core::test_fixtures as fx;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Write;

    #[test]
    fn fixture_content_passes_validation() {
        validate_content(&fx::base_content()); // should not panic
    }

    #[test]
    #[should_panic(expected = "disagrees with part name")]
    fn mismatched_catalog_key_panics() {
        let mut content = fx::base_content();
        let battery = content.parts.remove("battery").unwrap();
        content.parts.insert("accumulator".to_string(), battery);
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "luminosity_at_home")]
    fn zero_home_luminosity_panics() {
        let mut content = fx::base_content();
        content.physics.luminosity_at_home = 0.0;
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "unknown satellite")]
    fn dangling_satellite_link_panics() {
        let mut state = fx::base_state();
        state
            .bodies
            .get_mut(&BodyId("gaia".to_string()))
            .unwrap()
            .satellites
            .push(BodyId("phantom".to_string()));
        validate_scenario(&Scenario {
            state,
            orbits: HashMap::new(),
        });
    }

    #[test]
    #[should_panic(expected = "orbit for unknown vessel")]
    fn orbit_without_a_vessel_panics() {
        let state = fx::base_state();
        let orbits = HashMap::from([(
            VesselId("ghost".to_string()),
            CircularOrbit {
                body: BodyId("gaia".to_string()),
                radius_m: 1.0e6,
                angular_rate_rad_s: 1.0e-3,
                phase_rad: 0.0,
            },
        )]);
        validate_scenario(&Scenario { state, orbits });
    }

    #[test]
    fn generated_fleet_is_seed_deterministic() {
        let mut state_a = fx::base_state();
        let mut state_b = fx::base_state();
        let orbits_a = generate_fleet(&mut state_a, 8, &mut ChaCha8Rng::seed_from_u64(42));
        let orbits_b = generate_fleet(&mut state_b, 8, &mut ChaCha8Rng::seed_from_u64(42));

        assert_eq!(state_a.vessels.len(), 8);
        // value-level comparison: map key order is not part of the contract
        assert_eq!(
            serde_json::to_value(&state_a).unwrap(),
            serde_json::to_value(&state_b).unwrap()
        );
        assert_eq!(
            serde_json::to_value(&orbits_a).unwrap(),
            serde_json::to_value(&orbits_b).unwrap()
        );
        validate_scenario(&Scenario {
            state: state_a,
            orbits: orbits_a,
        });
    }

    #[test]
    fn advance_positions_keeps_orbit_radius() {
        let mut state = fx::base_state();
        let mut orbits = generate_fleet(&mut state, 3, &mut ChaCha8Rng::seed_from_u64(7));

        for _ in 0..100 {
            advance_positions(&mut state, &mut orbits, 60.0);
        }
        for (vessel_id, orbit) in &orbits {
            let body = &state.bodies[&orbit.body];
            let r = (state.vessels[vessel_id].position - body.position).length();
            assert!((r - orbit.radius_m).abs() < 1e-3);
        }
    }

    #[test]
    fn absent_rates_file_means_no_custom_rates() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_rates(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn rates_file_round_trips_by_module_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rates.json"),
            r#"{"rates":{"Transmitter":[{"resource_name":"ElectricCharge","rate":-0.02}]}}"#,
        )
        .unwrap();

        let rates = load_rates(dir.path()).unwrap();
        let entries = &rates["Transmitter"];
        assert_eq!(entries.len(), 1);
        assert!((entries[0].rate + 0.02).abs() < 1e-12);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/no/such/config.json"));
        assert_eq!(config.verbosity, bgsim_core::Verbosity::Silent);
    }

    #[test]
    fn scenario_round_trips_through_disk() {
        let mut state = fx::base_state();
        let orbits = generate_fleet(&mut state, 4, &mut ChaCha8Rng::seed_from_u64(3));
        let scenario = Scenario { state, orbits };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string_pretty(&scenario).unwrap().as_bytes())
            .unwrap();

        let loaded = load_scenario(&path).unwrap();
        assert_eq!(
            serde_json::to_value(&loaded).unwrap(),
            serde_json::to_value(&scenario).unwrap()
        );
    }
}

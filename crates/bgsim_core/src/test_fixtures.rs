//! Shared test fixtures for bgsim_core and downstream crates.
//!
//! `base_content()` provides a small part catalog (probe core, tracking
//! panel, RTG, battery, transmitter) around a sun/gaia/mun system from
//! `base_state()`. Vessels start empty; tests add what they need with the
//! `vessel`/`part`/`container` builders.

use std::collections::HashMap;

use glam::{DQuat, DVec3};

use crate::{
    AtmosphereDef, BodyId, BodyState, CommandDef, Counters, FleetState, FloatCurve, GeneratorDef,
    ModuleBehaviorDef, ModuleDef, ModuleSnapshot, PartDef, PartId, PartSnapshot, PhysicsConstants,
    RateEntry, ResourceContainer, Situation, SolarPanelDef, SystemContent, VesselId,
    VesselSnapshot, VesselState,
};

pub const HOME_SMA_M: f64 = 13_599_840_256.0;

fn ec(rate: f64) -> RateEntry {
    RateEntry {
        resource_name: "ElectricCharge".to_string(),
        rate,
    }
}

fn part_def(name: &str, modules: Vec<ModuleDef>) -> PartDef {
    PartDef {
        name: name.to_string(),
        modules,
    }
}

/// Catalog with one part per built-in classifier plus an inert transmitter
/// for callback tests.
pub fn base_content() -> SystemContent {
    let mut parts = HashMap::new();
    parts.insert(
        "probeCore".to_string(),
        part_def(
            "probeCore",
            vec![ModuleDef {
                type_name: "CommandPod".to_string(),
                behavior: ModuleBehaviorDef::Command(CommandDef {
                    input_resources: vec![ec(1.0)],
                }),
            }],
        ),
    );
    parts.insert(
        "solarPanel".to_string(),
        part_def(
            "solarPanel",
            vec![ModuleDef {
                type_name: "DeployableSolarPanel".to_string(),
                behavior: ModuleBehaviorDef::SolarPanel(SolarPanelDef {
                    resource_name: "ElectricCharge".to_string(),
                    charge_rate: 10.0,
                    power_curve: None,
                    temperature_curve: FloatCurve::constant(1.0),
                    solar_normal: DVec3::Z,
                    pivot_axis: DVec3::Y,
                    sun_tracking: true,
                }),
            }],
        ),
    );
    parts.insert(
        "rtg".to_string(),
        part_def(
            "rtg",
            vec![ModuleDef {
                type_name: "RadioisotopeGenerator".to_string(),
                behavior: ModuleBehaviorDef::Generator(GeneratorDef {
                    inputs: vec![],
                    outputs: vec![ec(0.75)],
                }),
            }],
        ),
    );
    parts.insert("battery".to_string(), part_def("battery", vec![]));
    parts.insert(
        "transmitter".to_string(),
        part_def(
            "transmitter",
            vec![ModuleDef {
                type_name: "Transmitter".to_string(),
                behavior: ModuleBehaviorDef::Inert,
            }],
        ),
    );

    SystemContent {
        content_version: "test".to_string(),
        parts,
        physics: PhysicsConstants {
            solar_luminosity: 3.160_940_978_621_3e24,
            luminosity_at_home: 1360.0,
            home_semi_major_axis_m: HOME_SMA_M,
        },
    }
}

/// Sun at the origin, home planet "gaia" (with atmosphere and one moon
/// "mun") at the home semi-major axis along +X. No vessels.
pub fn base_state() -> FleetState {
    let mut bodies = HashMap::new();
    let gaia_pos = DVec3::new(HOME_SMA_M, 0.0, 0.0);
    bodies.insert(
        BodyId("sun".to_string()),
        BodyState {
            id: BodyId("sun".to_string()),
            name: "Sun".to_string(),
            position: DVec3::ZERO,
            radius_m: 261_600_000.0,
            reference_body: None,
            satellites: vec![BodyId("gaia".to_string())],
            atmosphere: None,
        },
    );
    bodies.insert(
        BodyId("gaia".to_string()),
        BodyState {
            id: BodyId("gaia".to_string()),
            name: "Gaia".to_string(),
            position: gaia_pos,
            radius_m: 600_000.0,
            reference_body: Some(BodyId("sun".to_string())),
            satellites: vec![BodyId("mun".to_string())],
            atmosphere: Some(AtmosphereDef {
                sea_level_pressure_kpa: 101.325,
                scale_height_m: 5600.0,
                depth_m: 70_000.0,
                molar_mass_kg_per_mol: 0.028_964_4,
                radius_atmo_factor: 107.14,
            }),
        },
    );
    bodies.insert(
        BodyId("mun".to_string()),
        BodyState {
            id: BodyId("mun".to_string()),
            name: "Mun".to_string(),
            position: gaia_pos + DVec3::new(0.0, 12_000_000.0, 0.0),
            radius_m: 200_000.0,
            reference_body: Some(BodyId("gaia".to_string())),
            satellites: vec![],
            atmosphere: None,
        },
    );

    FleetState {
        tick: 0,
        active_vessel: None,
        vessels: HashMap::new(),
        bodies,
        star: BodyId("sun".to_string()),
        counters: Counters { next_event_id: 0 },
    }
}

/// An unloaded, orbiting vessel with an empty snapshot.
pub fn vessel(id: &str, main_body: &str, position: DVec3) -> VesselState {
    VesselState {
        id: VesselId(id.to_string()),
        name: id.to_string(),
        loaded: false,
        packed: false,
        situation: Situation::Orbiting,
        main_body: BodyId(main_body.to_string()),
        position,
        orientation: DQuat::IDENTITY,
        snapshot: Some(VesselSnapshot { parts: vec![] }),
    }
}

pub fn part(flight_id: u32, part_name: &str) -> PartSnapshot {
    PartSnapshot {
        flight_id: PartId(flight_id),
        part_name: part_name.to_string(),
        temperature_k: 290.0,
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        modules: vec![],
        resources: vec![],
    }
}

pub fn module(type_name: &str, values: &[(&str, &str)]) -> ModuleSnapshot {
    ModuleSnapshot {
        type_name: type_name.to_string(),
        values: values
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

pub fn container(resource_name: &str, amount: &str, max_amount: &str) -> ResourceContainer {
    ResourceContainer {
        resource_name: resource_name.to_string(),
        amount: amount.to_string(),
        max_amount: max_amount.to_string(),
        flow_state: "True".to_string(),
    }
}

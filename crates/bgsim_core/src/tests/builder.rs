use crate::record::{build_vessel_record, CallbackKey, ModuleRecord, VesselRecord};
use crate::test_fixtures as fx;
use crate::{
    ContainerRef, Counters, Event, EventEnvelope, EventSink, HookSet, ModuleRegistry, PartId,
    SimConfig, Verbosity, VesselState,
};

fn build(
    vessel: &VesselState,
    registry: &ModuleRegistry,
) -> (Option<VesselRecord>, Vec<EventEnvelope>) {
    build_with(vessel, registry, &fx::base_content())
}

fn build_with(
    vessel: &VesselState,
    registry: &ModuleRegistry,
    content: &crate::SystemContent,
) -> (Option<VesselRecord>, Vec<EventEnvelope>) {
    let config = SimConfig {
        verbosity: Verbosity::Debug,
        ..SimConfig::default()
    };
    let mut counters = Counters { next_event_id: 0 };
    let mut out = Vec::new();
    let mut sink = EventSink::new(&config, &mut counters, 0, &mut out);
    let record = build_vessel_record(vessel, content, registry, &mut sink);
    drop(sink);
    (record, out)
}

fn count(events: &[EventEnvelope], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| pred(&e.event)).count()
}

#[test]
fn vessel_without_snapshot_builds_nothing() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    vessel.snapshot = None;
    let (record, events) = build(&vessel, &ModuleRegistry::new());
    assert!(record.is_none());
    assert!(events.is_empty());
}

#[test]
fn storage_index_follows_part_walk_order() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    let mut first = fx::part(7, "battery");
    first
        .resources
        .push(fx::container("ElectricCharge", "1", "10"));
    let mut second = fx::part(3, "battery");
    second
        .resources
        .push(fx::container("MonoPropellant", "4", "8"));
    second
        .resources
        .push(fx::container("ElectricCharge", "2", "10"));
    vessel.snapshot.as_mut().unwrap().parts = vec![first, second];

    let (record, _) = build(&vessel, &ModuleRegistry::new());
    let record = record.unwrap();

    assert_eq!(
        record.storage["ElectricCharge"].as_slice(),
        &[
            ContainerRef { part: 0, slot: 0 },
            ContainerRef { part: 1, slot: 1 }
        ]
    );
    assert_eq!(
        record.storage["MonoPropellant"].as_slice(),
        &[ContainerRef { part: 1, slot: 0 }]
    );
}

#[test]
fn flow_disabled_containers_are_not_indexed() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    let mut part = fx::part(1, "battery");
    let mut off = fx::container("ElectricCharge", "5", "10");
    off.flow_state = "False".to_string();
    part.resources.push(off);
    part.resources
        .push(fx::container("ElectricCharge", "5", "10"));
    vessel.snapshot.as_mut().unwrap().parts = vec![part];

    let (record, events) = build(&vessel, &ModuleRegistry::new());
    let record = record.unwrap();

    assert_eq!(
        record.storage["ElectricCharge"].as_slice(),
        &[ContainerRef { part: 0, slot: 1 }]
    );
    assert_eq!(
        count(&events, |e| matches!(e, Event::FlowStateUnreadable { .. })),
        0
    );
}

#[test]
fn unreadable_flow_state_warns_but_indexes_the_container() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    let mut part = fx::part(1, "battery");
    let mut odd = fx::container("ElectricCharge", "5", "10");
    odd.flow_state = "Both".to_string();
    part.resources.push(odd);
    vessel.snapshot.as_mut().unwrap().parts = vec![part];

    let (record, events) = build(&vessel, &ModuleRegistry::new());
    let record = record.unwrap();

    assert_eq!(record.storage["ElectricCharge"].len(), 1);
    assert_eq!(
        count(&events, |e| matches!(e, Event::FlowStateUnreadable { .. })),
        1
    );
}

#[test]
fn classifies_one_record_per_built_in_kind() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    let mut panel = fx::part(1, "solarPanel");
    panel
        .modules
        .push(fx::module("DeployableSolarPanel", &[("deployState", "EXTENDED")]));
    let mut pod = fx::part(2, "probeCore");
    pod.modules.push(fx::module("CommandPod", &[]));
    let mut rtg = fx::part(3, "rtg");
    rtg.modules
        .push(fx::module("RadioisotopeGenerator", &[("generatorIsActive", "True")]));
    vessel.snapshot.as_mut().unwrap().parts = vec![panel, pod, rtg];

    let (record, _) = build(&vessel, &ModuleRegistry::new());
    let record = record.unwrap();

    assert_eq!(record.modules.len(), 3);
    assert!(matches!(record.modules[0], ModuleRecord::SolarPanel(_)));
    match &record.modules[1] {
        ModuleRecord::CommandDraw { rates } => {
            assert_eq!(rates.len(), 1);
            assert!(rates[0].rate < 0.0);
        }
        other => panic!("expected command draw, got {other:?}"),
    }
    assert!(matches!(
        record.modules[2],
        ModuleRecord::GeneratorOutput { .. }
    ));
}

#[test]
fn retracted_panel_and_idle_generator_classify_to_nothing() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    let mut panel = fx::part(1, "solarPanel");
    panel
        .modules
        .push(fx::module("DeployableSolarPanel", &[("deployState", "RETRACTED")]));
    let mut rtg = fx::part(2, "rtg");
    rtg.modules.push(fx::module("RadioisotopeGenerator", &[]));
    vessel.snapshot.as_mut().unwrap().parts = vec![panel, rtg];

    let (record, _) = build(&vessel, &ModuleRegistry::new());
    assert!(record.unwrap().modules.is_empty());
}

#[test]
fn index_mismatch_recovers_by_name_with_a_warning() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    // snapshot carries only the transmitter, but the catalog lists a
    // stowage bay ahead of it, shifting the expected index
    let mut content = fx::base_content();
    let def = content.parts.get_mut("transmitter").unwrap();
    def.modules.insert(0, crate::ModuleDef {
        type_name: "StowageBay".to_string(),
        behavior: crate::ModuleBehaviorDef::Inert,
    });
    let mut part = fx::part(1, "transmitter");
    part.modules.push(fx::module("Transmitter", &[]));
    vessel.snapshot.as_mut().unwrap().parts = vec![part];

    let mut registry = ModuleRegistry::new();
    registry.register_rates("Transmitter", vec![crate::RateEntry {
        resource_name: "ElectricCharge".to_string(),
        rate: -0.5,
    }]);

    let (record, events) = build_with(&vessel, &registry, &content);
    let record = record.unwrap();

    // the shifted transmitter still classifies via its relocated definition
    assert_eq!(record.modules.len(), 1);
    assert!(matches!(record.modules[0], ModuleRecord::FixedRate { .. }));
    assert_eq!(
        count(&events, |e| matches!(
            e,
            Event::ModuleIndexMismatch {
                found_index: Some(1),
                ..
            }
        )),
        1
    );
    assert_eq!(
        count(&events, |e| matches!(e, Event::ModuleUnmatched { .. })),
        0
    );
}

#[test]
fn duplicate_module_type_never_rebinds_a_consumed_definition() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    // two snapshot transmitters against a catalog that defines only one:
    // the first consumes the definition, the second must not find it again
    let mut part = fx::part(1, "transmitter");
    part.modules.push(fx::module("Transmitter", &[]));
    part.modules.push(fx::module("Transmitter", &[]));
    vessel.snapshot.as_mut().unwrap().parts = vec![part];

    let (_, events) = build(&vessel, &ModuleRegistry::new());

    let unmatched_searches = events
        .iter()
        .filter(|e| {
            matches!(
                e.event,
                Event::ModuleIndexMismatch {
                    found_index: None,
                    ..
                }
            )
        })
        .count();
    assert_eq!(unmatched_searches, 1);
    assert_eq!(
        count(&events, |e| matches!(e, Event::ModuleUnmatched { .. })),
        1
    );
}

#[test]
fn missing_part_definition_skips_modules_but_keeps_containers() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    let mut part = fx::part(1, "retiredPart");
    part.modules
        .push(fx::module("RadioisotopeGenerator", &[("generatorIsActive", "True")]));
    part.resources
        .push(fx::container("ElectricCharge", "5", "10"));
    vessel.snapshot.as_mut().unwrap().parts = vec![part];

    let (record, events) = build(&vessel, &ModuleRegistry::new());
    let record = record.unwrap();

    assert!(record.modules.is_empty());
    assert_eq!(record.storage["ElectricCharge"].len(), 1);
    assert_eq!(
        count(&events, |e| matches!(e, Event::PartDefMissing { .. })),
        1
    );
}

#[test]
fn hooked_module_types_get_callback_slots() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    let mut a = fx::part(4, "transmitter");
    a.modules.push(fx::module("Transmitter", &[]));
    let mut b = fx::part(2, "transmitter");
    b.modules.push(fx::module("Transmitter", &[]));
    vessel.snapshot.as_mut().unwrap().parts = vec![a, b];

    let mut registry = ModuleRegistry::new();
    registry.register_hooks("Transmitter", HookSet::default());

    let (record, _) = build(&vessel, &registry);
    let record = record.unwrap();

    let keys: Vec<&CallbackKey> = record.callbacks.keys().collect();
    assert_eq!(keys.len(), 2);
    // iteration order is type name then part id, regardless of walk order
    assert_eq!(keys[0].part, PartId(2));
    assert_eq!(keys[1].part, PartId(4));
}

#[test]
fn host_classifier_wins_over_built_in_rules() {
    let mut vessel = fx::vessel("v", "gaia", glam::DVec3::ZERO);
    let mut rtg = fx::part(1, "rtg");
    rtg.modules
        .push(fx::module("RadioisotopeGenerator", &[("generatorIsActive", "True")]));
    vessel.snapshot.as_mut().unwrap().parts = vec![rtg];

    let mut registry = ModuleRegistry::new();
    registry.register_classifier(
        "RadioisotopeGenerator",
        Box::new(|_, _| {
            vec![crate::RateEntry {
                resource_name: "ElectricCharge".to_string(),
                rate: 0.1,
            }]
        }),
    );

    let (record, _) = build(&vessel, &registry);
    let record = record.unwrap();

    assert_eq!(record.modules.len(), 1);
    assert!(matches!(record.modules[0], ModuleRecord::HostCustom { .. }));
}

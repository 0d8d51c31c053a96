use anyhow::Result;
use bgsim_core::{
    BackgroundSim, Event, EventEnvelope, FleetState, HookSet, ModuleRegistry, UpdateHook,
    Verbosity,
};
use bgsim_world::{
    advance_positions, generate_fleet, load_config, load_content, load_rates, load_scenario,
    Scenario,
};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "bgsim_cli", about = "Background vessel simulation runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background simulation for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Seconds of simulated time per tick.
        #[arg(long, default_value_t = 60.0)]
        dt: f64,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Scenario file with the fleet and its orbits.
        #[arg(long, default_value = "./content/scenario.json")]
        scenario: String,
        /// Replace the scenario's fleet with N generated probes.
        #[arg(long)]
        generate: Option<usize>,
        /// Seed for fleet generation; random when omitted.
        #[arg(long, requires = "generate")]
        seed: Option<u64>,
        /// Engine config file; defaults alongside the content directory.
        #[arg(long)]
        config: Option<String>,
        #[arg(long, default_value_t = 60)]
        print_every: u64,
        /// Override the configured event verbosity.
        #[arg(long, value_parser = ["silent", "normal", "warning", "debug"])]
        verbosity: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Demo host integration: transmitters trickle-draw charge through the
/// broker and report their lifetime total when the vessel is saved off.
fn demo_registry(rates: HashMap<String, Vec<bgsim_core::RateEntry>>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    for (type_name, entries) in rates {
        registry.register_rates(&type_name, entries);
    }
    registry.register_hooks(
        "Transmitter",
        HookSet {
            load: Some(Box::new(|_, _, slot| {
                if slot.is_none() {
                    *slot = Some(Box::new(0.0f64));
                }
            })),
            update: Some(UpdateHook::WithResources(Box::new(|broker, _, slot| {
                let got = broker.request(0.5, "ElectricCharge");
                if let Some(total) = slot.as_mut().and_then(|b| b.downcast_mut::<f64>()) {
                    *total += got;
                }
            }))),
            save: Some(Box::new(|vessel, _, slot| {
                if let Some(total) = slot.as_ref().and_then(|b| b.downcast_ref::<f64>()) {
                    println!("  [{}] transmitter relayed {total:.1} charge", vessel.id);
                }
            })),
        },
    );
    registry
}

fn run(
    ticks: u64,
    dt: f64,
    content_dir: &str,
    scenario_path: &str,
    generate: Option<usize>,
    seed: Option<u64>,
    config_path: Option<String>,
    print_every: u64,
    verbosity: Option<Verbosity>,
) -> Result<()> {
    let content = load_content(Path::new(content_dir))?;

    let mut config = match config_path {
        Some(path) => load_config(Path::new(&path)),
        None => load_config(&Path::new(content_dir).join("config.json")),
    };
    if let Some(level) = verbosity {
        config.verbosity = level;
    }

    let Scenario {
        mut state,
        mut orbits,
    } = load_scenario(Path::new(scenario_path))?;

    if let Some(count) = generate {
        let resolved_seed = seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(resolved_seed);
        state.vessels.clear();
        orbits = generate_fleet(&mut state, count, &mut rng);
        println!("Generated fleet: {count} probes (seed={resolved_seed})");
    }

    let rates = load_rates(Path::new(content_dir))?;
    let mut sim = BackgroundSim::claim(config, demo_registry(rates));

    println!(
        "Starting background run: ticks={ticks} dt={dt}s vessels={} content_version={}",
        state.vessels.len(),
        content.content_version,
    );
    println!("{}", "-".repeat(80));

    for _ in 0..ticks {
        advance_positions(&mut state, &mut orbits, dt);
        let events = sim.tick(&mut state, &content, dt);
        for envelope in &events {
            print_event(envelope);
        }
        if print_every > 0 && state.tick % print_every == 0 {
            print_status(&state, &sim);
        }
    }

    // run save hooks so hosts see final callback state
    sim.flush(&state);

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.tick);
    print_status(&state, &sim);
    Ok(())
}

fn print_event(envelope: &EventEnvelope) {
    let tick = envelope.tick;
    match &envelope.event {
        Event::VesselCached {
            vessel_id,
            module_records,
            resource_names,
        } => println!(
            "[tick={tick:05}] cached {vessel_id}: {module_records} module records, {resource_names} resources"
        ),
        Event::VesselReleased { vessel_id } => {
            println!("[tick={tick:05}] released {vessel_id}");
        }
        other => println!(
            "[tick={tick:05}] {}",
            serde_json::to_string(other).unwrap_or_default()
        ),
    }
}

fn print_status(state: &FleetState, sim: &BackgroundSim) {
    let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for vessel in state.vessels.values() {
        let Some(snapshot) = &vessel.snapshot else {
            continue;
        };
        for part in &snapshot.parts {
            for container in &part.resources {
                let Some((amount, max)) = container.read() else {
                    continue;
                };
                let entry = totals
                    .entry(container.resource_name.as_str())
                    .or_insert((0.0, 0.0));
                entry.0 += amount;
                if max.is_finite() {
                    entry.1 += max;
                }
            }
        }
    }
    let summary = totals
        .iter()
        .map(|(name, (amount, max))| format!("{name}={amount:.1}/{max:.1}"))
        .collect::<Vec<_>>()
        .join("  ");
    println!(
        "[tick={:05}] vessels={:3} cached={:3}  {summary}",
        state.tick,
        state.vessels.len(),
        sim.cached_vessels(),
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            dt,
            content_dir,
            scenario,
            generate,
            seed,
            config,
            print_every,
            verbosity,
        } => {
            let level = verbosity.map(|v| match v.as_str() {
                "silent" => Verbosity::Silent,
                "warning" => Verbosity::Warning,
                "debug" => Verbosity::Debug,
                _ => Verbosity::Normal,
            });
            run(
                ticks,
                dt,
                &content_dir,
                &scenario,
                generate,
                seed,
                config,
                print_every,
                level,
            )?;
        }
    }
    Ok(())
}

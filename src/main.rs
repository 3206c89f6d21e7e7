//! Life Sim CLI - Run a board from JSON configuration.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use life_sim::{
    host::SimulationHost,
    schema::{Pattern, Seed, SimulationConfig},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [generations]", args[0]);
        eprintln!();
        eprintln!("Run a Game of Life board from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  generations  Maximum generations to run (default: 1000)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let limit: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1000);

    let config = SimulationConfig::from_path(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    let mut host = SimulationHost::from_config(&config).unwrap_or_else(|e| {
        eprintln!("Error creating simulation: {}", e);
        std::process::exit(1);
    });

    println!("Life Simulation");
    println!("===============");
    println!("Board: {}x{}", config.rows, config.cols);
    println!("Scheduler: {:?}", host.scheduler_kind());
    println!(
        "Period: {}ms / {} = {:.1}ms",
        config.base_interval_ms,
        config.speed,
        config.base_interval_ms as f64 / config.speed
    );
    println!("Generation limit: {}", limit);
    println!();
    println!("Initial population: {}", host.grid().population());
    println!();

    if let Err(e) = host.run() {
        eprintln!("Error starting simulation: {}", e);
        std::process::exit(1);
    }

    println!("Running simulation...");
    let start = Instant::now();
    let report_every = (limit / 10).max(1);
    let mut stabilized = false;

    let wait = Duration::from_millis(250);

    while host.generation() < limit {
        let update = match host.pump_wait(wait) {
            Ok(update) => update,
            Err(e) => {
                eprintln!("Error merging update: {}", e);
                std::process::exit(1);
            }
        };
        if update.stabilized {
            stabilized = true;
            break;
        }
        if !update.changed() {
            if !host.is_running() {
                break;
            }
            continue;
        }
        if host.generation() % report_every == 0 {
            println!(
                "  Generation {}/{}: population={}",
                host.generation(),
                limit,
                host.grid().population()
            );
        }
    }
    host.stop();

    let elapsed = start.elapsed();
    println!();
    println!("Final state:");
    println!("  Generations: {}", host.generation());
    println!("  Population: {}", host.grid().population());
    println!("  Stabilized: {}", if stabilized { "yes" } else { "no" });
    println!(
        "Time: {:.2}s ({:.1} generations/s)",
        elapsed.as_secs_f32(),
        host.generation() as f32 / elapsed.as_secs_f32().max(f32::EPSILON)
    );
}

fn print_example_config() {
    let config = SimulationConfig {
        seed: Seed::new(Pattern::Random {
            density: 0.25,
            seed: Some(7),
        }),
        ..Default::default()
    };

    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing example config: {}", e);
            std::process::exit(1);
        }
    }
}

//! SWARM FORAGE - CLI Entry Point
//!
//! Headless foraging swarm simulator.

use clap::{Parser, Subcommand};
use swarm_forage::{benchmark, Config, World};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "swarm-forage")]
#[command(version)]
#[command(about = "Foraging swarm simulator with decaying-pheromone perception and dynamic caches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of steps to simulate
        #[arg(short, long, default_value = "10000")]
        steps: u64,

        /// Output directory for statistics
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of steps
        #[arg(short, long, default_value = "1000")]
        steps: u64,

        /// Swarm size
        #[arg(short, long, default_value = "64")]
        robots: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            output,
            seed,
            quiet,
        } => run_simulation(config, steps, output, seed, quiet),

        Commands::Benchmark { steps, robots } => {
            init_logging("warn");
            run_benchmark(steps, robots)
        }

        Commands::Init { output } => {
            init_logging("info");
            generate_config(output)
        }
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn run_simulation(
    config_path: PathBuf,
    steps: u64,
    output: PathBuf,
    seed: Option<u64>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };
    init_logging(&config.logging.log_level);
    if config_path.exists() {
        log::info!("Loaded config from {:?}", config_path);
    } else {
        log::info!("No config at {:?}, using defaults", config_path);
    }

    std::fs::create_dir_all(&output)?;

    let mut world = match seed {
        Some(s) => {
            println!("Using seed: {}", s);
            World::new_with_seed(config.clone(), s)?
        }
        None => World::new(config.clone())?,
    };

    let (xd, yd) = config.arena.dsize();
    println!("Starting simulation");
    println!("  Robots: {}", world.robots.len());
    println!("  Blocks: {}", config.arena.n_blocks);
    println!("  Grid size: {}x{}", xd, yd);
    println!("  Recreation policy: {}", world.caches.policy_name());
    println!("  Steps: {}", steps);
    println!();

    let start = Instant::now();
    let stats_interval = config.logging.stats_interval;

    for i in 0..steps {
        world.step();

        if !quiet && i % stats_interval == 0 {
            println!("{}", world.stats.summary());
        }
    }

    let elapsed = start.elapsed();
    world.stats.record_speed(world.time, elapsed);
    let steps_per_sec = world.stats.steps_per_second;
    let metrics = world.caches.metrics();

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Steps: {}", world.time);
    println!("Speed: {:.1} steps/s", steps_per_sec);
    println!("Deliveries: {}", world.stats.total_deliveries);
    println!(
        "Caches: {} live, {} created, {} depleted, {} discarded",
        world.arena.caches().len(),
        metrics.n_created,
        metrics.n_depleted,
        metrics.n_discarded
    );

    let stats_path = output.join("stats_final.json");
    world.stats.save_json(&stats_path.to_string_lossy())?;
    let history_path = output.join("stats_history.json");
    world.stats_history.save(&history_path.to_string_lossy())?;
    println!("Stats history: {:?}", history_path);

    Ok(())
}

fn run_benchmark(steps: u64, robots: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== SWARM FORAGE Benchmark ===");
    println!("Steps: {}", steps);
    println!("Robots: {}", robots);
    println!();

    let result = benchmark(steps, robots)?;
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    log::info!("Configuration saved to: {:?}", output);
    Ok(())
}

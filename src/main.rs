use anyhow::Result;
use clap::Parser;
use log::{info, warn};

use intersection_sim::simulation::{
    AdaptiveConfig, IntersectionConfig, LightConfig, LightKind, SimIntersection, StatsSnapshot,
    TrafficStats,
};

#[derive(Parser)]
#[command(name = "intersection_sim")]
#[command(about = "Headless four-way intersection traffic simulation")]
struct Cli {
    /// Number of frames to simulate
    #[arg(long, default_value = "3000")]
    ticks: u32,

    /// Frame duration in seconds
    #[arg(long, default_value = "0.0166667")]
    delta: f64,

    /// Simulated seconds per real second
    #[arg(long, default_value = "15.0")]
    speed: f64,

    /// Lanes on the top and bottom sides
    #[arg(long, default_value = "3")]
    width: usize,

    /// Lanes on the left and right sides
    #[arg(long, default_value = "3")]
    height: usize,

    /// Use the adaptive traffic light instead of the fixed cycle
    #[arg(long)]
    adaptive: bool,

    /// Run a fixed and an adaptive intersection side by side
    #[arg(long, conflicts_with = "adaptive")]
    compare: bool,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Print a summary every this many frames (0 disables)
    #[arg(long, default_value = "600")]
    report_every: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,intersection_sim=info"),
    )
    .init();

    let cli = Cli::parse();
    if cli.compare {
        run_comparison(&cli)
    } else {
        let light = if cli.adaptive {
            LightKind::Adaptive(AdaptiveConfig::default())
        } else {
            LightKind::Fixed(LightConfig::default())
        };
        run_headless(&cli, light)
    }
}

fn build(cli: &Cli, light: LightKind, seed: Option<u64>) -> Result<SimIntersection> {
    SimIntersection::new(IntersectionConfig {
        width: cli.width,
        height: cli.height,
        light,
        seed,
        ..IntersectionConfig::default()
    })
}

/// Run one intersection without graphics
fn run_headless(cli: &Cli, light: LightKind) -> Result<()> {
    let dt = cli.delta * cli.speed;
    if cli.ticks == 0 {
        warn!("zero frames requested, nothing will be simulated");
    }

    println!("Running intersection simulation in headless mode...");
    println!(
        "Frames: {}, frame delta: {}s, speed: {}x ({:.3}s per tick)",
        cli.ticks, cli.delta, cli.speed, dt
    );
    println!();

    let mut intersection = build(cli, light, cli.seed)?;
    let stats = TrafficStats::attach(intersection.events());

    println!("Initial state:");
    intersection.print_summary();
    intersection.draw_map();
    println!();

    for frame in 1..=cli.ticks {
        intersection.tick(dt)?;

        if cli.report_every > 0 && frame % cli.report_every == 0 {
            println!("--- After frame {} ({:.1}s simulated) ---", frame, intersection.time());
            intersection.print_summary();
            intersection.draw_map();
            println!();
        }
    }

    println!("=== Final State ===");
    intersection.print_summary();
    intersection.draw_map();

    log_completion(&intersection, &stats.snapshot());
    Ok(())
}

/// Run a fixed-cycle and an adaptive intersection with the same seed and
/// compare their sampled waits
fn run_comparison(cli: &Cli) -> Result<()> {
    let dt = cli.delta * cli.speed;
    let seed = cli.seed.unwrap_or_else(rand::random);

    let mut fixed = build(cli, LightKind::Fixed(LightConfig::default()), Some(seed))?;
    let mut adaptive = build(cli, LightKind::Adaptive(AdaptiveConfig::default()), Some(seed))?;
    let fixed_stats = TrafficStats::attach(fixed.events());
    let adaptive_stats = TrafficStats::attach(adaptive.events());

    for _ in 0..cli.ticks {
        fixed.tick(dt)?;
        adaptive.tick(dt)?;
    }

    info!("=== COMPARISON (seed {}) ===", seed);
    for (label, intersection, stats) in [
        ("fixed", &fixed, fixed_stats.snapshot()),
        ("adaptive", &adaptive, adaptive_stats.snapshot()),
    ] {
        let history = intersection.wait_history();
        let (horizontal, vertical) = intersection.light().durations();
        info!(
            "{}: mean wait {:.1}, peak wait {:.1}, queued {}, entered {}, green {:.1}s/{:.1}s",
            label,
            history.mean_average().unwrap_or(0.0),
            history.peak_average().unwrap_or(0.0),
            intersection.total_queued(),
            stats.cars_entered,
            horizontal,
            vertical
        );
    }

    log_completion(&adaptive, &adaptive_stats.snapshot());
    Ok(())
}

fn log_completion(intersection: &SimIntersection, stats: &StatsSnapshot) {
    let arrived = stats.cars_entered + intersection.total_queued();
    info!("=== SIMULATION COMPLETE ===");
    info!("Simulated time: {:.2}s", intersection.time());
    info!("Waves: {}", stats.waves);
    info!("Cars arrived: {}", arrived);
    info!("Cars entered: {}", stats.cars_entered);
    info!("Cars consumed: {}", stats.cars_consumed);
    info!("Cars queued: {}", intersection.total_queued());
    info!("Light switches: {}", stats.light_switches);
    info!(
        "Throughput: {:.1}%",
        if arrived > 0 {
            stats.cars_entered as f64 / arrived as f64 * 100.0
        } else {
            0.0
        }
    );
}

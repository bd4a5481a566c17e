//! GhostLAN SimWorld CLI
//!
//! Play synthetic LAN matches and check the anti-cheat engine against the
//! ground truth of who is really cheating.

use clap::Parser;
use ghostlan_sim::{
    seed_sweep, ClockMode, ConfigOverrides, MatchConfig, ScenarioId, ScenarioResult,
    ScenarioRunner, SimError,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// GhostLAN synthetic match harness
#[derive(Parser, Debug)]
#[command(name = "ghostlan-sim")]
#[command(about = "Run synthetic LAN matches against the GhostLAN anti-cheat engine", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (clean_lobby, mixed_lobby, cheater_lobby, lag_spike, packet_storm, lan_final, quick, all)
    #[arg(short = 'S', long, default_value = "quick")]
    scenario: String,

    /// Number of consecutive seeds to run each scenario with
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Players per match (split evenly into two teams)
    #[arg(short, long)]
    players: Option<usize>,

    /// Match duration in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Chance each player cheats
    #[arg(long)]
    cheat_probability: Option<f64>,

    /// Base packet loss (0.0 - 1.0)
    #[arg(long)]
    packet_loss: Option<f64>,

    /// Pace the match on the wall clock instead of the logical clock
    #[arg(long)]
    realtime: bool,

    /// Base match configuration (JSON); replaces the scenario preset
    #[arg(long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the full match record to a JSON file (single scenario and seed)
    #[arg(long)]
    export: Option<String>,
}

fn parse_scenarios(name: &str) -> Result<Vec<ScenarioId>, String> {
    match name {
        "all" => Ok(ScenarioId::all()),
        "quick" => Ok(ScenarioId::quick()),
        other => other.parse().map(|s| vec![s]),
    }
}

fn load_config(path: &str) -> Result<MatchConfig, SimError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn overrides(args: &Args) -> Result<ConfigOverrides, SimError> {
    Ok(ConfigOverrides {
        base: args.config.as_deref().map(load_config).transpose()?,
        duration_secs: args.duration,
        tick_rate_hz: args.tick_rate,
        num_players: args.players,
        cheat_probability: args.cheat_probability,
        packet_loss: args.packet_loss,
        clock: args.realtime.then_some(ClockMode::RealTime),
    })
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED - {} ticks, {} detections, {}/{} cheaters caught",
            result.scenario.name(),
            result.seed,
            result.total_ticks,
            result.metrics.detections,
            result.metrics.cheaters_detected,
            result.metrics.cheaters
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if !args.json {
        info!("GhostLAN SimWorld v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios = match parse_scenarios(&args.scenario) {
        Ok(scenarios) => scenarios,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: clean_lobby, mixed_lobby, cheater_lobby, lag_spike, packet_storm, lan_final, quick, all");
            std::process::exit(1);
        }
    };

    let overrides = match overrides(&args) {
        Ok(overrides) => overrides,
        Err(e) => {
            eprintln!("Error: cannot load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 || args.seeds > 1 {
            eprintln!("Error: --export needs a single scenario and a single seed");
            std::process::exit(1);
        }

        let runner = ScenarioRunner::new(base_seed).with_overrides(overrides);
        let run = match runner.run_recorded(scenarios[0]).await {
            Ok(run) => run,
            Err(e) => {
                error!("{} could not run: {}", scenarios[0], e);
                std::process::exit(1);
            }
        };

        match run.export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} events to {}", run.export.events.len(), export_path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                std::process::exit(1);
            }
        }

        report(&run.result);
        if !run.result.passed {
            std::process::exit(1);
        }
        return;
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed in seed_sweep(base_seed, args.seeds) {
        let runner = ScenarioRunner::new(seed).with_overrides(overrides.clone());

        for scenario in &scenarios {
            let result = match runner.run(*scenario).await {
                Ok(result) => result,
                Err(e) => {
                    error!("✗ {} (seed={}) could not run: {}", scenario.name(), seed, e);
                    std::process::exit(1);
                }
            };

            if !args.json {
                report(&result);
            }
            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: cannot encode results: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        std::process::exit(1);
    }
}

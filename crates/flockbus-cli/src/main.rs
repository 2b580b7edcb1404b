//! Runner for the flockbus receiver and sender loops.
//!
//! Usage: flockbus <receive|send|targets|status> [options]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flockbus::prelude::*;

/// Interval between receiver/sender summary log lines.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(10);

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "receive" => load_config(&args).and_then(|config| receive(&config)),
        "send" => load_config(&args).and_then(|config| {
            let seed = match option_value(&args, "--seed") {
                Some(value) => Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("--seed expects an integer, got {value:?}"))?,
                ),
                None => None,
            };
            send(&config, seed)
        }),
        "targets" => targets(args.iter().any(|a| a == "--json")),
        "status" => load_config(&args).and_then(|config| status(&config)),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage: flockbus <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  receive    Listen for offsets and run the apply tick");
    eprintln!("  send       Run the flock and stream offsets to the receiver");
    eprintln!("  targets    List the modulation targets");
    eprintln!("  status     Print the resolved configuration and initial bus status");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>    Read settings from a TOML file (receive, send, status)");
    eprintln!("  --seed <n>         Override the flock seed (send)");
    eprintln!("  --json             Print targets as JSON (targets)");
    eprintln!();
    eprintln!("Logging is controlled with RUST_LOG (default: info).");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  flockbus receive --config flockbus.toml");
    eprintln!("  flockbus send --seed 7");
    eprintln!("  RUST_LOG=flockbus_core=trace flockbus receive");
}

/// Value following `flag`, if present.
fn option_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn load_config(args: &[String]) -> Result<ConfigFile, String> {
    match option_value(args, "--config") {
        Some(path) => ConfigFile::load(Path::new(path))
            .map_err(|e| format!("Failed to load {}: {}", path, e)),
        None => Ok(ConfigFile::default()),
    }
}

fn receive(config: &ConfigFile) -> Result<(), String> {
    let bus_config = config.bus_config().map_err(|e| e.to_string())?;
    let bus = UnifiedBus::new(Arc::new(Registry::build()), bus_config);
    bus.initialize();

    let mut receiver = OffsetReceiver::bind(bus_config.listen_addr)
        .map_err(|e| format!("Failed to bind {}: {}", bus_config.listen_addr, e))?;
    let mut cadence = Cadence::new(bus.tick_interval());
    let mut last_summary = Instant::now();
    let mut applied = 0u64;

    loop {
        receiver.poll(&bus);
        if let Some(report) = bus.tick() {
            applied += u64::from(report.offsets_applied);
        }

        if last_summary.elapsed() >= SUMMARY_INTERVAL {
            let stats = receiver.stats();
            log::info!(
                "receiver: {} frames, {} malformed, {} offsets applied, generation {}, {} overruns",
                stats.frames,
                stats.malformed,
                applied,
                bus.effective().generation(),
                cadence.overruns()
            );
            last_summary = Instant::now();
        }

        cadence.wait();
    }
}

fn send(config: &ConfigFile, seed: Option<u64>) -> Result<(), String> {
    let mut pipeline = config.pipeline_config().map_err(|e| e.to_string())?;
    if let Some(seed) = seed {
        pipeline = pipeline.with_seed(seed);
    }

    let flock = Flock::new(
        FlockParams {
            agents: pipeline.agents,
            ..FlockParams::default()
        },
        pipeline.seed,
    );
    let link = UdpLink::new(pipeline.target_addr, pipeline.reconnect_backoff);
    log::info!(
        "sending offsets to {} (seed {}, {} agents)",
        pipeline.target_addr,
        pipeline.seed,
        pipeline.agents
    );

    let mut controller = Controller::new(flock, link, NullSink, &pipeline);
    let mut cadence = Cadence::new(controller.tick_interval());
    let mut last_summary = Instant::now();

    loop {
        controller.tick();

        if last_summary.elapsed() >= SUMMARY_INTERVAL {
            let status = controller.status();
            log::info!(
                "sender: {} ticks, {} sends, {} failures, {} senders built",
                status.ticks,
                status.sends,
                status.failures,
                status.senders_constructed
            );
            last_summary = Instant::now();
        }

        cadence.wait();
    }
}

fn targets(json: bool) -> Result<(), String> {
    let registry = Registry::build();
    if json {
        println!("{}", registry.dump_json());
        return Ok(());
    }

    println!("{:>5}  {:<24} {:>10} {:>10} {:>10}  unit", "index", "key", "min", "max", "default");
    for target in registry.iter() {
        println!(
            "{:>5}  {:<24} {:>10} {:>10} {:>10}  {:?}",
            target.index, target.key, target.min, target.max, target.default, target.unit
        );
    }
    Ok(())
}

fn status(config: &ConfigFile) -> Result<(), String> {
    let bus = UnifiedBus::new(
        Arc::new(Registry::build()),
        config.bus_config().map_err(|e| e.to_string())?,
    );
    bus.initialize();

    let report = serde_json::json!({
        "config": config,
        "bus": bus.status(),
    });
    let text = serde_json::to_string_pretty(&report)
        .map_err(|e| format!("Failed to serialize status: {}", e))?;
    println!("{}", text);
    Ok(())
}

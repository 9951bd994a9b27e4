//! Engine-exercise CLI.
//!
//! Builds one branch predictor, one prefetcher, and one replacement policy
//! from a JSON configuration (or defaults), drives them over a deterministic
//! synthetic trace, and prints the collected statistics.

use std::fs;
use std::process;

use clap::{Parser, Subcommand};

use engine_core::config::Config;
use engine_core::sim::Host;

#[derive(Parser, Debug)]
#[command(
    name = "oosim",
    author,
    version,
    about = "Predictive/replacement engine driver",
    long_about = "Run the branch prediction, prefetching, and cache replacement engines \
over a synthetic trace.\n\nConfiguration is JSON (see engine_core::config::Config); the \
CLI uses built-in defaults when no file is given.\n\nExamples:\n  oosim run\n  oosim run \
-c config.json -n 2000000"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engines over a synthetic trace.
    Run {
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<String>,

        /// Number of trace records (overrides the configured count).
        #[arg(short = 'n', long)]
        records: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { config, records }) => cmd_run(config, records),
        None => {
            eprintln!("oosim: pass a subcommand");
            eprintln!();
            eprintln!("  oosim run                 Run with default configuration");
            eprintln!("  oosim run -c <file.json>  Run with a JSON configuration");
            eprintln!();
            eprintln!("  oosim --help  for full options");
            process::exit(1);
        }
    }
}

/// Loads the configuration, runs the harness, and prints statistics.
fn cmd_run(config_path: Option<String>, records: Option<u64>) {
    let config = match config_path {
        Some(path) => {
            let text = fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Error reading config {path}: {e}");
                process::exit(1);
            });
            serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
                eprintln!("Error parsing config {path}: {e}");
                process::exit(1);
            })
        }
        None => Config::default(),
    };

    let records = records.unwrap_or(config.general.records);
    println!(
        "Configuration: predictor={:?} prefetcher={:?} replacement={:?} cache={}x{}",
        config.predictor.kind,
        config.prefetcher.kind,
        config.cache.replacement,
        config.cache.sets,
        config.cache.ways
    );
    println!("Running {records} records");
    println!();

    let mut host = Host::new(&config);
    host.run(records);
    host.finish().print();
}

use std::env;
use std::process;

use clap::Parser;
use env_logger::Builder;

mod cli;
mod error;
mod scenarios;

use cli::Cli;
use scenarios::SCENARIOS;

fn main() {
    Builder::new()
        .parse_filters(&env::var("CLYDEFS_HARNESS_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let cli = Cli::parse();

    if cli.list {
        for s in SCENARIOS {
            println!("{:>2}  {}", s.id, s.name);
        }
        return;
    }

    let selected: Vec<&scenarios::Scenario> = match &cli.scenario {
        Some(needle) => SCENARIOS
            .iter()
            .filter(|s| s.name == needle || s.id.to_string() == *needle)
            .collect(),
        None => SCENARIOS.iter().collect(),
    };

    if selected.is_empty() {
        log::error!("no scenario matches {:?} (run --list to see available scenarios)", cli.scenario);
        process::exit(2);
    }

    let mut failures = 0usize;
    for scenario in &selected {
        log::info!("running scenario {} ({})", scenario.id, scenario.name);
        match (scenario.run)() {
            Ok(()) => log::info!("scenario {} ({}) passed", scenario.id, scenario.name),
            Err(err) => {
                log::error!("scenario {} ({}) FAILED: {err}", scenario.id, scenario.name);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        log::error!("{failures}/{} scenario(s) failed", selected.len());
        process::exit(1);
    }
    log::info!("all {} scenario(s) passed", selected.len());
}

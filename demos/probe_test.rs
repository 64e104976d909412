// Probe run: heavy quarks of fixed energy in a static medium
//
// Usage: probe_test <settings.json> <tables.json> <new|load> [history.json]

use std::env;
use std::fs;
use std::path::Path;
use std::process;
use stochastic_rates::{probe_test, InitMode, ProbeSettings, ProcessSet, Settings};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("probe_test: {}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        return Err("usage: probe_test <settings.json> <tables.json> <new|load> [history.json]".into());
    }
    let mode = match args[3].as_str() {
        "new" => InitMode::New,
        "load" => InitMode::Load,
        other => return Err(format!("unknown mode '{}', expected 'new' or 'load'", other).into()),
    };
    let output = args.get(4).map(String::as_str).unwrap_or("history.json");

    let settings = Settings::from_file(&args[1])?;
    let probe = ProbeSettings::from_settings(&settings)?;
    let mut set = ProcessSet::standard(&settings, "Boltzmann")?;
    set.initialize(mode, Path::new(&args[2]))?;

    let histories = probe_test(&set, &probe);
    let interactions: Vec<usize> = (0..set.len())
        .map(|c| histories.iter().map(|h| h.interactions[c]).sum())
        .collect();
    for (process, count) in set.processes().iter().zip(&interactions) {
        log::info!("{}: {} interactions", process.name(), count);
    }
    let failures: usize = histories.iter().map(|h| h.sampling_failures).sum();
    if failures > 0 {
        println!("{} steps streamed freely after sampling failures", failures);
    }
    let mean_energy =
        histories.iter().filter_map(|h| h.snapshots.last()).map(|s| s.particle.p.t()).sum::<f64>()
            / histories.len().max(1) as f64;
    println!("mean final energy: {:.4} GeV after {} fm/c", mean_energy, probe.steps as f64 * probe.dt);

    fs::write(output, serde_json::to_string(&histories)?)?;
    println!("wrote {}", output);
    Ok(())
}

// Sahar-e-Nau Score Generator CLI entry point.
//
// Generates the full composition and writes it to MIDI and MusicXML.
// The pipeline: config → movement generation → timeline assembly → export.
//
// Usage:
//   cargo run -p sahar_music -- [output-stem] [--seed N] [--root NOTE]
//     [--tempo BPM] [--alaap-quarters N] [--riff-reps N] [--config PATH]
//     [--json]

use rand::SeedableRng;
use rand::rngs::StdRng;
use sahar_music::conductor::{CompositionConfig, build_score};
use sahar_music::midi::write_midi;
use sahar_music::musicxml::write_musicxml;
use sahar_music::timeline::{PULSES_PER_QUARTER, Pitch};
use std::path::Path;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let stem = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("sahar_e_nau");
    let seed: Option<u64> = parse_flag(&args, "--seed");

    let mut config = if let Some(path) = parse_flag::<String>(&args, "--config") {
        match CompositionConfig::load(Path::new(&path)) {
            Ok(c) => {
                println!("Loaded config from {}.", path);
                c
            }
            Err(e) => {
                println!("Failed to load {}: {}. Using defaults.", path, e);
                CompositionConfig::default()
            }
        }
    } else {
        CompositionConfig::default()
    };

    // CLI flags override the config file.
    if let Some(root) = parse_flag::<String>(&args, "--root") {
        config.root = root;
    }
    if let Some(tempo) = parse_flag(&args, "--tempo") {
        config.base_tempo = tempo;
    }
    if let Some(n) = parse_flag(&args, "--alaap-quarters") {
        config.alaap_quarters = n;
    }
    if let Some(n) = parse_flag::<usize>(&args, "--riff-reps") {
        config.riff_repetitions = n;
        config.drum_cycles = n * 4; // keep the theka under the whole riff
    }

    println!("=== Sahar-e-Nau Score Generator ===");
    println!("Output: {stem}.mid / {stem}.musicxml");
    println!("Root: {}", config.root);
    println!("Tempo: {} BPM -> {} BPM at the rock entry", config.base_tempo, config.rock_tempo());
    if let Some(s) = seed {
        println!("Seed: {}", s);
    }
    println!();

    let mut rng = if let Some(s) = seed {
        StdRng::seed_from_u64(s)
    } else {
        StdRng::from_os_rng()
    };

    let root = Pitch::parse(&config.root).unwrap_or_else(|| {
        eprintln!("Unknown root '{}'. Using D4.", config.root);
        Pitch::new(62)
    });

    println!("[1/3] Generating movements and assembling timelines...");
    let score = build_score(&config, root, &mut rng);
    print!("{}", score.summary());

    let seconds = performance_seconds(&score, &config);
    println!("  Duration: {:.0}s at the marked tempi.", seconds);

    println!("[2/3] Writing MIDI...");
    let midi_path = format!("{stem}.mid");
    if let Err(e) = write_midi(&score, Path::new(&midi_path)) {
        eprintln!("  Error writing {}: {}", midi_path, e);
        std::process::exit(1);
    }

    println!("[3/3] Writing MusicXML...");
    let xml_path = format!("{stem}.musicxml");
    if let Err(e) = write_musicxml(&score, Path::new(&xml_path)) {
        eprintln!("  Error writing {}: {}", xml_path, e);
        std::process::exit(1);
    }

    if has_flag(&args, "--json") {
        let json_path = format!("{stem}.json");
        match serde_json::to_string_pretty(&score) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&json_path, json) {
                    eprintln!("  Error writing {}: {}", json_path, e);
                    std::process::exit(1);
                }
                println!("Score dumped to {}.", json_path);
            }
            Err(e) => {
                eprintln!("  Error serializing score: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!();
    println!("Play with: timidity {} (or any MIDI player)", midi_path);
}

/// Wall-clock length of the piece given its two tempo segments.
fn performance_seconds(score: &sahar_music::timeline::Score, config: &CompositionConfig) -> f64 {
    let total = score.end();
    let split = config.riff_start().min(total);
    pulse_seconds(split, config.base_tempo) + pulse_seconds(total - split, config.rock_tempo())
}

fn pulse_seconds(pulses: u64, bpm: u16) -> f64 {
    pulses as f64 / PULSES_PER_QUARTER as f64 * 60.0 / bpm as f64
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

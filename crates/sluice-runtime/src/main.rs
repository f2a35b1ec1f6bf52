// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Sluice runtime
// Runs a level simulation or the divisor game from the command line.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use sluice_control::{
    DivisorConfig, DivisorGame, Ledger, Preset, Simulation, SimulationConfig,
};

#[derive(Debug, Parser)]
#[command(name = "sluice", version, about = "Hysteresis-gated shared level simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a level simulation until killed, or for a fixed duration.
    Run {
        /// Built-in configuration (pool, bank, credit-pause).
        #[arg(long, default_value = "pool")]
        preset: Preset,
        /// RON or JSON configuration file; overrides --preset.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stop after this many milliseconds and print a summary.
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// Run the divisor game.
    Divisor {
        /// One task per divisor.
        #[arg(long, value_delimiter = ',', default_values_t = [3u32, 5, 7, 17])]
        divisors: Vec<u32>,
        /// Length of one pause unit in milliseconds.
        #[arg(long, default_value_t = 1000)]
        unit_ms: u64,
        /// Counter value at start.
        #[arg(long, default_value_t = 1)]
        start: i64,
        /// Stop after this many milliseconds.
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// Print a built-in configuration, as a starting point for --config.
    Preset {
        /// Preset to print.
        name: Preset,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Ron)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Ron,
    Json,
}

fn run_simulation(config: SimulationConfig, duration: Option<Duration>) -> Result<()> {
    let mut sim = Simulation::new(config).context("invalid simulation configuration")?;

    let Some(duration) = duration else {
        sim.start()?;
        // Tasks only end on a fatal error.
        sim.join()?;
        return Ok(());
    };

    let events = sim.subscribe();
    let mut ledger = Ledger::new();
    sim.start()?;

    let deadline = Instant::now() + duration;
    loop {
        match events.recv_deadline(deadline) {
            Ok(event) => ledger.record(&event),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let summary = sim.stop()?;
    ledger.drain(&events);

    print!("{summary}");
    let movement = summary.final_value - summary.initial_value;
    if ledger.net_delta() != movement {
        anyhow::bail!(
            "ledger mismatch: tasks reported a net change of {} but the level moved by {}",
            ledger.net_delta(),
            movement
        );
    }
    log::info!(
        "Ledger consistent: {} steps, net change {}.",
        ledger.steps(),
        ledger.net_delta()
    );
    Ok(())
}

fn run_divisor(config: DivisorConfig, duration: Option<Duration>) -> Result<()> {
    let mut game = DivisorGame::new(config).context("invalid divisor game configuration")?;
    match duration {
        Some(duration) => {
            let summary = game.run_for(duration)?;
            println!(
                "counter {} -> {}",
                summary.initial_value, summary.final_value
            );
            for task in &summary.tasks {
                println!("  {:<12} steps {:>6}", task.name, task.applied);
            }
        }
        None => {
            game.start()?;
            game.join()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env, Target};

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            preset,
            config,
            duration_ms,
        } => {
            let config = match config {
                Some(path) => SimulationConfig::from_path(&path)
                    .with_context(|| format!("failed to load '{}'", path.display()))?,
                None => preset.config(),
            };
            run_simulation(config, duration_ms.map(Duration::from_millis))
        }
        Command::Divisor {
            divisors,
            unit_ms,
            start,
            duration_ms,
        } => run_divisor(
            DivisorConfig {
                initial_value: start,
                divisors,
                unit_ms,
            },
            duration_ms.map(Duration::from_millis),
        ),
        Command::Preset { name, format } => {
            let config = name.config();
            let text = match format {
                Format::Ron => config.to_ron_string()?,
                Format::Json => config.to_json_string()?,
            };
            println!("{text}");
            Ok(())
        }
    }
}

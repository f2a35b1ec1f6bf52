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

//! The simulation driver: builds the shared level and runs its task set.

use crate::config::SimulationConfig;
use crate::signal::StopHandle;
use crate::task::LevelTask;
use crate::worker::{TaskSet, TaskStats};
use crossbeam_channel::{Receiver, Sender};
use sluice_core::event::TaskEvent;
use sluice_core::{GuardedLevel, Level, Mode, ModeGate, SluiceError, SluiceResult, TaskSpec};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of a stopped run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Level value at start.
    pub initial_value: i64,
    /// Level value after every task stopped.
    pub final_value: i64,
    /// Mode after every task stopped.
    pub final_mode: Mode,
    /// Steps applied over the whole lifetime of the level.
    pub revision: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Per-task counters, sorted by task name.
    pub tasks: Vec<TaskStats>,
}

impl RunSummary {
    /// Total mode flips across tasks.
    pub fn flips(&self) -> u64 {
        self.tasks.iter().map(|t| t.flips).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "level {} -> {} ({}), {} steps, {} flips in {:.2?}",
            self.initial_value,
            self.final_value,
            self.final_mode,
            self.revision,
            self.flips(),
            self.elapsed
        )?;
        for task in &self.tasks {
            writeln!(
                f,
                "  {:<12} applied {:>6}  skipped {:>6}  flips {:>3}",
                task.name, task.applied, task.skipped, task.flips
            )?;
        }
        Ok(())
    }
}

/// A level shared by a set of periodic producer and consumer tasks.
///
/// ```ignore
/// let mut sim = Simulation::new(SimulationConfig::pool())?;
/// let summary = sim.run_for(Duration::from_secs(10))?;
/// ```
pub struct Simulation {
    config: SimulationConfig,
    gate: ModeGate,
    specs: Vec<TaskSpec>,
    level: GuardedLevel,
    tasks: TaskSet,
    events: Option<Sender<TaskEvent>>,
    started_at: Option<Instant>,
}

impl Simulation {
    /// Validates `config` and builds the shared level. No thread is started.
    pub fn new(config: SimulationConfig) -> SluiceResult<Self> {
        config.validate()?;
        let gate = config.gate()?;
        let specs = config.task_specs()?;
        let level = GuardedLevel::new(Level::new(config.initial_value, config.initial_mode));
        log::info!(
            "Simulation ready: level {} ({}), band {}..={}, {} producer(s), {} consumer(s).",
            config.initial_value,
            config.initial_mode,
            config.low_watermark,
            config.high_watermark,
            config.producers.len(),
            config.consumers.len()
        );
        Ok(Self {
            config,
            gate,
            specs,
            level,
            tasks: TaskSet::new(),
            events: None,
            started_at: None,
        })
    }

    /// The configuration the simulation was built from.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The shared level, for inspection.
    pub fn level(&self) -> &GuardedLevel {
        &self.level
    }

    /// Returns the receiver of step reports for the next run.
    ///
    /// Without a subscription tasks only log. Subscribing again replaces the
    /// previous subscription; the subscription is consumed by [`start`](Self::start).
    pub fn subscribe(&mut self) -> Receiver<TaskEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.events = Some(tx);
        rx
    }

    /// Returns true while tasks are running.
    pub fn is_running(&self) -> bool {
        self.tasks.is_running()
    }

    /// A handle that stops the running tasks from any thread.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.tasks.stop_handle()
    }

    /// Spawns one thread per configured task.
    pub fn start(&mut self) -> SluiceResult<()> {
        if self.tasks.is_running() {
            return Err(SluiceError::AlreadyStarted);
        }

        let events = self.events.take();
        for (index, spec) in self.specs.iter().enumerate() {
            let seed = self.config.seed.map(|seed| seed.wrapping_add(index as u64));
            let task = LevelTask::new(
                spec.clone(),
                self.gate,
                self.level.clone(),
                events.clone(),
                seed,
            );
            if let Err(e) = self.tasks.spawn(task) {
                log::error!("Failed to start simulation: {e}");
                if let Err(stop_err) = self.tasks.stop() {
                    log::error!("Failed to stop already spawned tasks: {stop_err}");
                }
                return Err(e);
            }
        }

        self.started_at = Some(Instant::now());
        log::info!("Simulation started with {} task(s).", self.tasks.len());
        Ok(())
    }

    /// Blocks until every task exits. Healthy tasks only exit when stopped,
    /// so without a stop this blocks for the life of the process.
    pub fn join(&mut self) -> SluiceResult<RunSummary> {
        let tasks = self.tasks.join()?;
        self.summary(tasks)
    }

    /// Stops every task within one period and returns the run's summary.
    pub fn stop(&mut self) -> SluiceResult<RunSummary> {
        let tasks = self.tasks.stop()?;
        let summary = self.summary(tasks)?;
        log::info!(
            "Simulation stopped: level {} ({}) after {} steps.",
            summary.final_value,
            summary.final_mode,
            summary.revision
        );
        Ok(summary)
    }

    /// Starts, lets the tasks run for `duration`, then stops.
    pub fn run_for(&mut self, duration: Duration) -> SluiceResult<RunSummary> {
        self.start()?;
        thread::sleep(duration);
        self.stop()
    }

    fn summary(&mut self, tasks: Vec<TaskStats>) -> SluiceResult<RunSummary> {
        let level = self.level.snapshot()?;
        let elapsed = self
            .started_at
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default();
        Ok(RunSummary {
            initial_value: self.config.initial_value,
            final_value: level.value(),
            final_mode: level.mode(),
            revision: level.revision(),
            elapsed,
            tasks,
        })
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if self.tasks.is_running() {
            if let Err(e) = self.tasks.stop() {
                log::error!("Simulation dropped while running; stop failed: {e}");
            }
        }
    }
}

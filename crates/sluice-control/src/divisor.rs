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

//! Driver for the divisor game.

use crate::config::DivisorConfig;
use crate::signal::StopHandle;
use crate::worker::{Routine, TaskSet, TaskStats};
use crossbeam_channel::{Receiver, Sender};
use sluice_core::divisor;
use sluice_core::event::{DivisorReport, TaskEvent};
use sluice_core::{Guarded, SluiceError, SluiceResult};
use std::thread;
use std::time::{Duration, Instant};

struct DivisorTask {
    divisor: u32,
    unit: Duration,
    counter: Guarded<i64>,
    events: Option<Sender<TaskEvent>>,
}

impl Routine for DivisorTask {
    fn name(&self) -> String {
        format!("divisor-{}", self.divisor)
    }

    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn step(&mut self, stats: &mut TaskStats) -> SluiceResult<Duration> {
        let divisor = self.divisor;
        let report = self.counter.with_lock(|value| {
            let before = *value;
            let next = divisor::step(before, divisor)?;
            *value = next.value;
            Ok::<_, SluiceError>(DivisorReport {
                divisor,
                before,
                after: next.value,
                pause_units: next.pause_units,
                at: Instant::now(),
            })
        })??;

        let pause = self.unit.checked_mul(report.pause_units).ok_or_else(|| {
            SluiceError::InvalidConfig(format!(
                "pause of {} units of {:?} is out of range",
                report.pause_units, self.unit
            ))
        })?;
        log::info!(
            "[divisor-{divisor}] {} -> {}, sleeping {:?}",
            report.before,
            report.after,
            pause
        );
        stats.applied += 1;
        if let Some(events) = &self.events {
            if events.send(TaskEvent::Divisor(report)).is_err() {
                log::trace!("[divisor-{divisor}] event receiver dropped.");
            }
        }
        Ok(pause)
    }
}

/// Outcome of a stopped divisor game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisorSummary {
    /// Counter value at start.
    pub initial_value: i64,
    /// Counter value after every task stopped.
    pub final_value: i64,
    /// Per-task counters, sorted by task name.
    pub tasks: Vec<TaskStats>,
}

/// Several tasks advancing one shared counter by the divisor rule.
pub struct DivisorGame {
    config: DivisorConfig,
    counter: Guarded<i64>,
    tasks: TaskSet,
    events: Option<Sender<TaskEvent>>,
}

impl DivisorGame {
    /// Validates `config` and builds the shared counter.
    pub fn new(config: DivisorConfig) -> SluiceResult<Self> {
        config.validate()?;
        Ok(Self {
            counter: Guarded::new(config.initial_value),
            config,
            tasks: TaskSet::new(),
            events: None,
        })
    }

    /// The shared counter, for inspection.
    pub fn counter(&self) -> &Guarded<i64> {
        &self.counter
    }

    /// Returns the receiver of step reports for the next run.
    pub fn subscribe(&mut self) -> Receiver<TaskEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.events = Some(tx);
        rx
    }

    /// A handle that stops the running tasks from any thread.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.tasks.stop_handle()
    }

    /// Spawns one task per divisor.
    pub fn start(&mut self) -> SluiceResult<()> {
        if self.tasks.is_running() {
            return Err(SluiceError::AlreadyStarted);
        }
        log::info!("Starting divisor game with value = {}", self.config.initial_value);
        let events = self.events.take();
        for &divisor in &self.config.divisors {
            let task = DivisorTask {
                divisor,
                unit: self.config.unit(),
                counter: self.counter.clone(),
                events: events.clone(),
            };
            if let Err(e) = self.tasks.spawn(task) {
                if let Err(stop_err) = self.tasks.stop() {
                    log::error!("Failed to stop divisor tasks after spawn error: {stop_err}");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Blocks until every task exits.
    pub fn join(&mut self) -> SluiceResult<DivisorSummary> {
        let tasks = self.tasks.join()?;
        self.summary(tasks)
    }

    /// Stops every task and returns the summary.
    pub fn stop(&mut self) -> SluiceResult<DivisorSummary> {
        let tasks = self.tasks.stop()?;
        self.summary(tasks)
    }

    /// Starts, lets the tasks run for `duration`, then stops.
    pub fn run_for(&mut self, duration: Duration) -> SluiceResult<DivisorSummary> {
        self.start()?;
        thread::sleep(duration);
        self.stop()
    }

    fn summary(&self, tasks: Vec<TaskStats>) -> SluiceResult<DivisorSummary> {
        Ok(DivisorSummary {
            initial_value: self.config.initial_value,
            final_value: self.counter.snapshot()?,
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_divisor_follows_rule() {
        let mut game = DivisorGame::new(DivisorConfig {
            initial_value: 1,
            divisors: vec![3],
            unit_ms: 1,
        })
        .unwrap();
        let events = game.subscribe();
        let summary = game.run_for(Duration::from_millis(100)).unwrap();

        let mut expected = 1;
        let mut seen = 0;
        for event in events.try_iter() {
            let report = match event {
                TaskEvent::Divisor(report) => report,
                other => panic!("unexpected event {other:?}"),
            };
            assert_eq!(report.before, expected);
            expected = divisor::step(expected, 3).unwrap().value;
            assert_eq!(report.after, expected);
            seen += 1;
        }
        assert!(seen > 0);
        assert_eq!(summary.final_value, expected);
        assert_eq!(summary.tasks[0].applied, seen);
    }

    #[test]
    fn test_counter_overflow_stops_the_game_cleanly() {
        // 9_223_372_036_854_775_806 is a multiple of 3 but not of 9, so the
        // first step needs +4 and overflows.
        let mut game = DivisorGame::new(DivisorConfig {
            initial_value: i64::MAX - 1,
            divisors: vec![3],
            unit_ms: 1,
        })
        .unwrap();
        game.start().unwrap();

        match game.join() {
            Err(SluiceError::CounterOverflow { value, divisor }) => {
                assert_eq!(value, i64::MAX - 1);
                assert_eq!(divisor, 3);
            }
            other => panic!("expected a counter overflow, got {other:?}"),
        }
        assert!(!game.counter().is_poisoned());
        assert_eq!(game.counter().snapshot().unwrap(), i64::MAX - 1);
    }

    #[test]
    fn test_dropped_subscriber_does_not_stop_the_game() {
        let mut game = DivisorGame::new(DivisorConfig {
            initial_value: 1,
            divisors: vec![3, 5],
            unit_ms: 1,
        })
        .unwrap();
        drop(game.subscribe());
        let summary = game.run_for(Duration::from_millis(50)).unwrap();
        assert!(summary.final_value > 1);
        assert!(summary.tasks.iter().all(|t| t.applied > 0));
    }

    #[test]
    fn test_rejects_bad_divisor() {
        assert!(DivisorGame::new(DivisorConfig {
            divisors: vec![1],
            ..Default::default()
        })
        .is_err());
    }
}

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

//! The periodic producer/consumer task.

use crate::worker::{Routine, TaskStats};
use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sluice_core::event::{StepReport, TaskEvent};
use sluice_core::{GateDecision, GuardedLevel, ModeGate, Role, SkipReason, SluiceResult, TaskSpec};
use std::time::{Duration, Instant};

/// Drives one producer or consumer on a fixed period.
///
/// Each wake-up samples the step amounts, then takes the lock once and
/// decides and commits up to `burst` steps inside it. Reporting happens
/// after the lock is released.
pub struct LevelTask {
    spec: TaskSpec,
    name: String,
    gate: ModeGate,
    level: GuardedLevel,
    events: Option<Sender<TaskEvent>>,
    rng: StdRng,
}

impl LevelTask {
    /// Creates a task bound to a shared level.
    pub fn new(
        spec: TaskSpec,
        gate: ModeGate,
        level: GuardedLevel,
        events: Option<Sender<TaskEvent>>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            name: spec.name(),
            spec,
            gate,
            level,
            events,
            rng,
        }
    }

    /// The task's description.
    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    fn report(&self, step: &StepReport) {
        let sign = match self.spec.role() {
            Role::Producer => '+',
            Role::Consumer => '-',
        };
        log::info!(
            "[{}] {sign}{} -> level {}",
            self.name,
            step.delta().abs(),
            step.after
        );
        if let Some(transition) = step.transition {
            log::warn!(
                "*** [{}] level {} reached the {:?}, mode is now {} ***",
                self.name,
                transition.value,
                transition.reason,
                transition.mode
            );
        }
        if let Some(until) = step.cooldown_until {
            log::warn!(
                "*** [{}] consumers paused for {} ms ***",
                self.name,
                until.saturating_duration_since(step.at).as_millis()
            );
        }
        if let Some(events) = &self.events {
            if events.send(TaskEvent::Step(step.clone())).is_err() {
                log::trace!("[{}] event receiver dropped.", self.name);
            }
        }
    }
}

impl Routine for LevelTask {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn initial_delay(&self) -> Duration {
        self.spec.period
    }

    fn step(&mut self, stats: &mut TaskStats) -> SluiceResult<Duration> {
        let role = self.spec.role();
        let task = self.spec.id;
        let amounts: Vec<i64> = (0..self.spec.burst)
            .map(|_| self.spec.amount.sample(&mut self.rng))
            .collect();
        let gate = self.gate;

        let (steps, skipped) = self.level.with_lock(|level| {
            let now = Instant::now();
            let mut steps = Vec::with_capacity(amounts.len());
            for amount in amounts {
                let before = level.value();
                let decision = gate.decide(level, role, amount, now);
                if let GateDecision::Skip(reason) = decision {
                    return (steps, Some(reason));
                }
                level.commit(&decision, now);
                let (transition, cooldown_until) = match decision {
                    GateDecision::ApplyAndFlip { cooldown_until, .. } => {
                        (level.last_transition(), cooldown_until)
                    }
                    _ => (None, None),
                };
                steps.push(StepReport {
                    task,
                    amount,
                    before,
                    after: level.value(),
                    mode: level.mode(),
                    transition,
                    cooldown_until,
                    revision: level.revision(),
                    at: now,
                });
                if transition.is_some() {
                    break;
                }
            }
            (steps, None)
        })?;

        for step in &steps {
            self.report(step);
        }
        stats.applied += steps.len() as u64;
        stats.flips += steps.iter().filter(|s| s.transition.is_some()).count() as u64;

        if let Some(reason) = skipped {
            if steps.is_empty() {
                stats.skipped += 1;
            }
            match reason {
                SkipReason::WrongMode => log::trace!("[{}] idle, mode does not permit {role}.", self.name),
                SkipReason::Cooldown => log::debug!("[{}] idle, cooling down.", self.name),
                SkipReason::AtWatermark => log::trace!("[{}] idle, level is full.", self.name),
            }
        }

        Ok(self.spec.period)
    }
}

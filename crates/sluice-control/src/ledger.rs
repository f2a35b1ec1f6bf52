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

//! Tally of the events published by a running simulation.

use crossbeam_channel::Receiver;
use sluice_core::event::{StepReport, TaskEvent};
use sluice_core::{Mode, TaskId};
use std::collections::HashMap;

/// Per-task totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskTally {
    /// Steps applied by the task.
    pub steps: u64,
    /// Sum of the deltas the task applied.
    pub net_delta: i64,
    /// Steps cut short by a watermark.
    pub clamped: u64,
}

/// Consumes [`TaskEvent`]s and keeps running totals.
///
/// Deltas are taken from the stored before/after values, so clamping at a
/// watermark is accounted for: after a stopped run, [`net_delta`](Self::net_delta)
/// equals `final - initial`.
#[derive(Debug, Default)]
pub struct Ledger {
    steps: u64,
    net_delta: i64,
    flips_to_filling: u64,
    flips_to_draining: u64,
    cooldowns: u64,
    last_revision: u64,
    per_task: HashMap<TaskId, TaskTally>,
    divisor_steps: u64,
    divisor_high: Option<i64>,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single event.
    pub fn record(&mut self, event: &TaskEvent) {
        match event {
            TaskEvent::Step(step) => self.record_step(step),
            TaskEvent::Divisor(report) => {
                self.divisor_steps += 1;
                self.divisor_high = Some(self.divisor_high.map_or(report.after, |h| h.max(report.after)));
            }
        }
    }

    /// Records every event currently queued on `events` without blocking.
    /// Returns how many were consumed.
    pub fn drain(&mut self, events: &Receiver<TaskEvent>) -> usize {
        let mut count = 0;
        for event in events.try_iter() {
            self.record(&event);
            count += 1;
        }
        count
    }

    fn record_step(&mut self, step: &StepReport) {
        self.steps += 1;
        self.net_delta += step.delta();
        self.last_revision = self.last_revision.max(step.revision);
        if let Some(transition) = step.transition {
            match transition.mode {
                Mode::Filling => self.flips_to_filling += 1,
                Mode::Draining => self.flips_to_draining += 1,
            }
        }
        if step.cooldown_until.is_some() {
            self.cooldowns += 1;
        }
        let tally = self.per_task.entry(step.task).or_default();
        tally.steps += 1;
        tally.net_delta += step.delta();
        if step.clamped() {
            tally.clamped += 1;
        }
    }

    /// Number of level steps recorded.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Sum of all applied deltas.
    pub fn net_delta(&self) -> i64 {
        self.net_delta
    }

    /// Number of flips into `mode`.
    pub fn flips_to(&self, mode: Mode) -> u64 {
        match mode {
            Mode::Filling => self.flips_to_filling,
            Mode::Draining => self.flips_to_draining,
        }
    }

    /// Number of cooldowns armed.
    pub fn cooldowns(&self) -> u64 {
        self.cooldowns
    }

    /// Highest level revision seen.
    pub fn last_revision(&self) -> u64 {
        self.last_revision
    }

    /// Totals for one task, if it applied anything.
    pub fn tally(&self, task: TaskId) -> Option<TaskTally> {
        self.per_task.get(&task).copied()
    }

    /// Number of divisor game steps recorded.
    pub fn divisor_steps(&self) -> u64 {
        self.divisor_steps
    }

    /// Largest counter value reported by the divisor game.
    pub fn divisor_high(&self) -> Option<i64> {
        self.divisor_high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::event::DivisorReport;
    use sluice_core::{Role, Transition, TransitionReason};
    use std::time::Instant;

    fn step(task: TaskId, amount: i64, before: i64, after: i64, revision: u64) -> StepReport {
        StepReport {
            task,
            amount,
            before,
            after,
            mode: Mode::Draining,
            transition: None,
            cooldown_until: None,
            revision,
            at: Instant::now(),
        }
    }

    #[test]
    fn test_net_delta_accounts_for_clamping() {
        let producer = TaskId::new(Role::Producer, 1);
        let consumer = TaskId::new(Role::Consumer, 1);
        let mut ledger = Ledger::new();

        ledger.record(&TaskEvent::Step(step(consumer, 10, 810, 800, 1)));
        let mut flip = step(producer, 20, 1990, 2000, 2);
        flip.transition = Some(Transition {
            reason: TransitionReason::HighWatermark,
            mode: Mode::Draining,
            value: 2000,
            revision: 2,
        });
        ledger.record(&TaskEvent::Step(flip));

        assert_eq!(ledger.net_delta(), 0);
        assert_eq!(ledger.steps(), 2);
        assert_eq!(ledger.flips_to(Mode::Draining), 1);
        assert_eq!(ledger.last_revision(), 2);
        assert_eq!(ledger.tally(producer).unwrap().clamped, 1);
        assert_eq!(ledger.tally(consumer).unwrap().net_delta, -10);
    }

    #[test]
    fn test_drain_consumes_queued_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let task = TaskId::new(Role::Consumer, 2);
        for r in 1..=5 {
            tx.send(TaskEvent::Step(step(task, 5, 1000, 995, r))).unwrap();
        }
        tx.send(TaskEvent::Divisor(DivisorReport {
            divisor: 3,
            before: 1,
            after: 2,
            pause_units: 3,
            at: Instant::now(),
        }))
        .unwrap();

        let mut ledger = Ledger::new();
        assert_eq!(ledger.drain(&rx), 6);
        assert_eq!(ledger.net_delta(), -25);
        assert_eq!(ledger.divisor_steps(), 1);
        assert_eq!(ledger.divisor_high(), Some(2));
        assert_eq!(ledger.drain(&rx), 0);
    }
}

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

//! Reports published by running tasks.

use crate::level::{Mode, Transition};
use crate::task::TaskId;
use std::time::Instant;

/// One applied step on the shared level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// The task that applied the step.
    pub task: TaskId,
    /// The magnitude the task asked for.
    pub amount: i64,
    /// Level value before the step.
    pub before: i64,
    /// Level value after the step, clamped at a watermark if one was reached.
    pub after: i64,
    /// Mode after the step.
    pub mode: Mode,
    /// Set when this step flipped the mode.
    pub transition: Option<Transition>,
    /// Set when this step armed the consumer cooldown.
    pub cooldown_until: Option<Instant>,
    /// Level revision produced by this step.
    pub revision: u64,
    /// When the step was decided, under the lock.
    pub at: Instant,
}

impl StepReport {
    /// The change actually applied to the level.
    pub fn delta(&self) -> i64 {
        self.after - self.before
    }

    /// Returns true if the requested magnitude was cut short by a watermark.
    pub fn clamped(&self) -> bool {
        self.delta().abs() != self.amount
    }
}

/// One step of the divisor game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisorReport {
    /// The divisor owned by the stepping task.
    pub divisor: u32,
    /// Counter value before the step.
    pub before: i64,
    /// Counter value after the step.
    pub after: i64,
    /// Pause chosen by the rule, in game time units.
    pub pause_units: u32,
    /// When the step was applied.
    pub at: Instant,
}

/// An event sent from a task to whoever drains the simulation's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A level task applied a step.
    Step(StepReport),
    /// A divisor task applied a step.
    Divisor(DivisorReport),
}

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

//! Task descriptions: who mutates the level, by how much, and how often.

use crate::error::{SluiceError, SluiceResult};
use crate::level::Mode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The side of the level a task works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Raises the level.
    Producer,
    /// Lowers the level.
    Consumer,
}

impl Role {
    /// The mode in which this role may act under exclusive gating.
    pub fn permitted_mode(self) -> Mode {
        match self {
            Role::Producer => Mode::Filling,
            Role::Consumer => Mode::Draining,
        }
    }

    /// Applies a step of `amount` to `value` in this role's direction.
    pub fn step(self, value: i64, amount: i64) -> i64 {
        match self {
            Role::Producer => value.saturating_add(amount),
            Role::Consumer => value.saturating_sub(amount),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Identifies one task inside a simulation, e.g. `consumer-2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    /// The task's role.
    pub role: Role,
    /// 1-based index among the tasks of the same role.
    pub index: u32,
}

impl TaskId {
    /// Creates a task identifier.
    pub fn new(role: Role, index: u32) -> Self {
        Self { role, index }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.role, self.index)
    }
}

/// How much a single step moves the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    /// The same magnitude every step.
    Fixed(u32),
    /// A magnitude drawn uniformly from `min..=max` before each step.
    Uniform {
        /// Smallest magnitude.
        min: u32,
        /// Largest magnitude.
        max: u32,
    },
}

impl Amount {
    /// Draws the magnitude of the next step.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        match *self {
            Amount::Fixed(rate) => i64::from(rate),
            Amount::Uniform { min, max } => i64::from(rng.gen_range(min..=max)),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match *self {
            Amount::Fixed(0) => Err("rate must be positive".to_string()),
            Amount::Fixed(_) => Ok(()),
            Amount::Uniform { min: 0, .. } => Err("minimum rate must be positive".to_string()),
            Amount::Uniform { min, max } if max < min => {
                Err(format!("rate range {min}..={max} is empty"))
            }
            Amount::Uniform { .. } => Ok(()),
        }
    }
}

/// Immutable description of one periodic task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// The task's identifier.
    pub id: TaskId,
    /// Optional human-readable label used in log lines instead of the id.
    pub label: Option<String>,
    /// Magnitude of each step.
    pub amount: Amount,
    /// Sleep between two wake-ups.
    pub period: Duration,
    /// Maximum number of consecutive steps applied per wake-up.
    pub burst: u32,
}

impl TaskSpec {
    /// Creates a validated task description.
    pub fn new(
        id: TaskId,
        label: Option<String>,
        amount: Amount,
        period: Duration,
        burst: u32,
    ) -> SluiceResult<Self> {
        let spec = Self {
            id,
            label,
            amount,
            period,
            burst,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// The task's role.
    pub fn role(&self) -> Role {
        self.id.role
    }

    /// Name used for the task's thread and log lines.
    pub fn name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.id.to_string())
    }

    fn validate(&self) -> SluiceResult<()> {
        let invalid = |reason: String| SluiceError::InvalidTask {
            task: self.name(),
            reason,
        };
        self.amount.validate().map_err(invalid)?;
        if self.period.is_zero() {
            return Err(invalid("period must be positive".to_string()));
        }
        if self.burst == 0 {
            return Err(invalid("burst must be at least 1".to_string()));
        }
        Ok(())
    }
}

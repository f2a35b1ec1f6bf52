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

//! The shared level: its value, its mode, and the watermarks that flip it.

use crate::error::{SluiceError, SluiceResult};
use crate::gate::GateDecision;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Which task role the level currently accepts mutations from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Producers may raise the level.
    Filling,
    /// Consumers may lower the level.
    #[default]
    Draining,
}

impl Mode {
    /// Returns the mode on the other side of the hysteresis band.
    pub fn opposite(self) -> Self {
        match self {
            Mode::Filling => Mode::Draining,
            Mode::Draining => Mode::Filling,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Filling => f.write_str("filling"),
            Mode::Draining => f.write_str("draining"),
        }
    }
}

/// The hysteresis band of a simulation. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    low: i64,
    high: i64,
}

impl Thresholds {
    /// Creates a band, rejecting `high <= low`.
    pub fn new(low: i64, high: i64) -> SluiceResult<Self> {
        if high <= low {
            return Err(SluiceError::InvalidThresholds { low, high });
        }
        Ok(Self { low, high })
    }

    /// The low watermark; consumers flip the level to filling here.
    pub fn low(&self) -> i64 {
        self.low
    }

    /// The high watermark; producers flip the level to draining here.
    pub fn high(&self) -> i64 {
        self.high
    }

    /// Returns true if `value` lies inside the band, watermarks included.
    pub fn contains(&self, value: i64) -> bool {
        (self.low..=self.high).contains(&value)
    }
}

/// Which watermark caused a mode flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionReason {
    /// A producer carried the level to or past the high watermark.
    HighWatermark,
    /// A consumer carried the level to or past the low watermark.
    LowWatermark,
}

/// Record of the most recent mode flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Why the flip happened.
    pub reason: TransitionReason,
    /// The mode entered by the flip.
    pub mode: Mode,
    /// The clamped value at the moment of the flip.
    pub value: i64,
    /// The level revision produced by the flipping step.
    pub revision: u64,
}

/// The single shared mutable object of a simulation.
///
/// A `Level` is only ever touched through [`Guarded::with_lock`](crate::guard::Guarded::with_lock);
/// it carries no synchronization of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    value: i64,
    mode: Mode,
    cooldown_until: Option<Instant>,
    revision: u64,
    last_transition: Option<Transition>,
}

impl Level {
    /// Creates a level with an initial value and mode.
    pub fn new(value: i64, mode: Mode) -> Self {
        Self {
            value,
            mode,
            cooldown_until: None,
            revision: 0,
            last_transition: None,
        }
    }

    /// The current value.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// The current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of steps applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The most recent mode flip, if any.
    pub fn last_transition(&self) -> Option<Transition> {
        self.last_transition
    }

    /// The deadline until which consumers are suspended, if one was armed.
    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    /// Returns true while consumers are suspended at `now`.
    pub fn cooldown_active(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Applies a gate decision. Returns true if the value changed hands
    /// (any non-skip decision), false for a skip.
    ///
    /// A skip leaves the level untouched. An applied step bumps the revision
    /// and drops a cooldown that has already expired at `now`.
    pub fn commit(&mut self, decision: &GateDecision, now: Instant) -> bool {
        match *decision {
            GateDecision::Skip(_) => false,
            GateDecision::Apply { value } => {
                self.value = value;
                self.revision += 1;
                self.expire_cooldown(now);
                true
            }
            GateDecision::ApplyAndFlip {
                value,
                mode,
                reason,
                cooldown_until,
            } => {
                self.value = value;
                self.mode = mode;
                self.revision += 1;
                self.last_transition = Some(Transition {
                    reason,
                    mode,
                    value,
                    revision: self.revision,
                });
                match cooldown_until {
                    Some(until) => self.cooldown_until = Some(until),
                    None => self.expire_cooldown(now),
                }
                true
            }
        }
    }

    fn expire_cooldown(&mut self, now: Instant) {
        if !self.cooldown_active(now) {
            self.cooldown_until = None;
        }
    }
}

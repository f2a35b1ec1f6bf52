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

//! The mode gate: a pure decision of whether a step may happen and whether
//! it flips the level's mode.
//!
//! The gate never locks and never sleeps. Callers evaluate it inside the
//! locked section together with [`Level::commit`], so the check and the
//! write-back happen under a single lock acquisition.

use crate::level::{Level, Mode, Thresholds, TransitionReason};
use crate::task::Role;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Which roles the level's mode restricts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GatePolicy {
    /// Producers act only while filling, consumers only while draining.
    #[default]
    Exclusive,
    /// Producers act in either mode; only consumers are gated by the mode
    /// and the cooldown.
    ConsumersOnly,
}

/// Why a step was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The level's mode does not permit the caller's role.
    WrongMode,
    /// Consumers are suspended until the cooldown deadline.
    Cooldown,
    /// A producer not gated by the mode found the level already at the high
    /// watermark, so the step would not change anything.
    AtWatermark,
}

/// The outcome of one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// No mutation this step.
    Skip(SkipReason),
    /// Store `value`; no watermark was reached.
    Apply {
        /// The new level value.
        value: i64,
    },
    /// Store the clamped `value` and enter `mode`.
    ApplyAndFlip {
        /// The new level value, equal to the crossed watermark.
        value: i64,
        /// The mode entered.
        mode: Mode,
        /// Which watermark was crossed.
        reason: TransitionReason,
        /// Deadline before which consumers stay suspended, when a cooldown
        /// is configured and a consumer caused the flip.
        cooldown_until: Option<Instant>,
    },
}

impl GateDecision {
    /// Returns true for [`GateDecision::Skip`].
    pub fn is_skip(&self) -> bool {
        matches!(self, GateDecision::Skip(_))
    }

    /// The value that would be stored, if any.
    pub fn value(&self) -> Option<i64> {
        match *self {
            GateDecision::Skip(_) => None,
            GateDecision::Apply { value } | GateDecision::ApplyAndFlip { value, .. } => Some(value),
        }
    }

    /// The mode entered by a flip, if this decision flips.
    pub fn flipped_to(&self) -> Option<Mode> {
        match *self {
            GateDecision::ApplyAndFlip { mode, .. } => Some(mode),
            _ => None,
        }
    }
}

/// Watermark policy of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeGate {
    thresholds: Thresholds,
    policy: GatePolicy,
    cooldown: Option<Duration>,
}

impl ModeGate {
    /// Creates an exclusive gate without cooldown.
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            policy: GatePolicy::Exclusive,
            cooldown: None,
        }
    }

    /// Sets which roles the mode restricts.
    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Suspends consumers for `cooldown` after each low-watermark flip.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// The hysteresis band.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// The gating policy.
    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// The configured consumer cooldown.
    pub fn cooldown(&self) -> Option<Duration> {
        self.cooldown
    }

    /// Checks whether `role` may act on `level` at `now`.
    pub fn permits(&self, level: &Level, role: Role, now: Instant) -> Result<(), SkipReason> {
        let mode_ok = match (self.policy, role) {
            (GatePolicy::ConsumersOnly, Role::Producer) => true,
            _ => level.mode() == role.permitted_mode(),
        };
        if !mode_ok {
            return Err(SkipReason::WrongMode);
        }
        if role == Role::Consumer && level.cooldown_active(now) {
            return Err(SkipReason::Cooldown);
        }
        Ok(())
    }

    /// Decides a step of magnitude `amount` by `role`.
    ///
    /// The level is expected to lie inside the band; a step that reaches a
    /// watermark is clamped to it exactly.
    pub fn decide(&self, level: &Level, role: Role, amount: i64, now: Instant) -> GateDecision {
        if let Err(reason) = self.permits(level, role, now) {
            return GateDecision::Skip(reason);
        }

        let raw = role.step(level.value(), amount);
        let (low, high) = (self.thresholds.low(), self.thresholds.high());

        match role {
            Role::Producer if raw >= high => {
                // Draining is only reachable here under `ConsumersOnly`:
                // clamp, nothing to flip.
                if level.mode() == Mode::Draining && level.value() >= high {
                    GateDecision::Skip(SkipReason::AtWatermark)
                } else if level.mode() == Mode::Draining {
                    GateDecision::Apply { value: high }
                } else {
                    GateDecision::ApplyAndFlip {
                        value: high,
                        mode: Mode::Draining,
                        reason: TransitionReason::HighWatermark,
                        cooldown_until: None,
                    }
                }
            }
            Role::Consumer if raw <= low => GateDecision::ApplyAndFlip {
                value: low,
                mode: Mode::Filling,
                reason: TransitionReason::LowWatermark,
                cooldown_until: self.cooldown.map(|cooldown| now + cooldown),
            },
            _ => GateDecision::Apply { value: raw },
        }
    }
}

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

//! Simulation configuration: presets, validation, and RON/JSON files.

use serde::{Deserialize, Serialize};
use sluice_core::divisor::validate_divisor;
use sluice_core::{
    Amount, GatePolicy, Mode, ModeGate, Role, SluiceError, SluiceResult, TaskId, TaskSpec,
    Thresholds,
};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// One producer or consumer entry of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Step magnitude, or the lower bound when `max_rate` is set.
    pub rate: u32,
    /// Upper bound of a uniformly drawn magnitude.
    pub max_rate: Option<u32>,
    /// Sleep between wake-ups, in milliseconds.
    pub period_ms: u64,
    /// Steps applied per wake-up.
    pub burst: u32,
    /// Name shown in logs instead of `producer-N` / `consumer-N`.
    pub label: Option<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            rate: 1,
            max_rate: None,
            period_ms: 1000,
            burst: 1,
            label: None,
        }
    }
}

impl TaskConfig {
    /// A task stepping by `rate` every `period_ms`.
    pub fn fixed(rate: u32, period_ms: u64) -> Self {
        Self {
            rate,
            period_ms,
            ..Default::default()
        }
    }

    /// A task stepping by a random magnitude in `min..=max` every `period_ms`.
    pub fn uniform(min: u32, max: u32, period_ms: u64) -> Self {
        Self {
            rate: min,
            max_rate: Some(max),
            period_ms,
            ..Default::default()
        }
    }

    /// Sets the number of steps per wake-up.
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Sets the log label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn amount(&self) -> Amount {
        match self.max_rate {
            Some(max) => Amount::Uniform {
                min: self.rate,
                max,
            },
            None => Amount::Fixed(self.rate),
        }
    }

    fn to_spec(&self, id: TaskId) -> SluiceResult<TaskSpec> {
        TaskSpec::new(
            id,
            self.label.clone(),
            self.amount(),
            Duration::from_millis(self.period_ms),
            self.burst,
        )
    }
}

/// Everything needed to build a [`Simulation`](crate::Simulation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Level value at start.
    pub initial_value: i64,
    /// Mode at start.
    pub initial_mode: Mode,
    /// Consumers flip the level to filling here.
    pub low_watermark: i64,
    /// Producers flip the level to draining here.
    pub high_watermark: i64,
    /// Which roles the mode restricts.
    pub policy: GatePolicy,
    /// Consumer suspension after a low-watermark flip, in milliseconds.
    pub cooldown_ms: Option<u64>,
    /// Seed for randomized amounts; each task derives its own stream.
    pub seed: Option<u64>,
    /// Producer tasks.
    pub producers: Vec<TaskConfig>,
    /// Consumer tasks.
    pub consumers: Vec<TaskConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::pool()
    }
}

impl SimulationConfig {
    /// A pool that one pipe fills at 20 per second and two pipes drain at
    /// 10 and 5 per second, between 800 and 2000.
    pub fn pool() -> Self {
        Self {
            initial_value: 2000,
            initial_mode: Mode::Draining,
            low_watermark: 800,
            high_watermark: 2000,
            policy: GatePolicy::Exclusive,
            cooldown_ms: None,
            seed: None,
            producers: vec![TaskConfig::fixed(20, 1000).with_label("inflow")],
            consumers: vec![
                TaskConfig::fixed(10, 1000).with_label("pipe-1"),
                TaskConfig::fixed(5, 1000).with_label("pipe-2"),
            ],
        }
    }

    /// A bank that alternates between bursts of four deposits of 1000 and
    /// bursts of four credits of 1500, between 20000 and 40000.
    pub fn bank() -> Self {
        Self {
            initial_value: 20_000,
            initial_mode: Mode::Filling,
            low_watermark: 20_000,
            high_watermark: 40_000,
            policy: GatePolicy::Exclusive,
            cooldown_ms: None,
            seed: None,
            producers: vec![TaskConfig::fixed(1000, 1000)
                .with_burst(4)
                .with_label("depositor")],
            consumers: vec![TaskConfig::fixed(1500, 1000)
                .with_burst(4)
                .with_label("creditor")],
        }
    }

    /// A bank whose deposits never stop and whose credits pause for five
    /// seconds once the balance falls to 4000, resuming only after the
    /// balance is back at 10000.
    pub fn credit_pause() -> Self {
        Self {
            initial_value: 10_000,
            initial_mode: Mode::Draining,
            low_watermark: 4000,
            high_watermark: 10_000,
            policy: GatePolicy::ConsumersOnly,
            cooldown_ms: Some(5000),
            seed: None,
            producers: vec![TaskConfig::uniform(1, 400, 500).with_label("depositor")],
            consumers: vec![TaskConfig::uniform(1, 500, 700).with_label("creditor")],
        }
    }

    /// The hysteresis band.
    pub fn thresholds(&self) -> SluiceResult<Thresholds> {
        Thresholds::new(self.low_watermark, self.high_watermark)
    }

    /// The mode gate described by this configuration.
    pub fn gate(&self) -> SluiceResult<ModeGate> {
        let gate = ModeGate::new(self.thresholds()?).with_policy(self.policy);
        Ok(match self.cooldown_ms {
            Some(ms) => gate.with_cooldown(Duration::from_millis(ms)),
            None => gate,
        })
    }

    /// Task descriptions, producers first, numbered from 1 per role.
    pub fn task_specs(&self) -> SluiceResult<Vec<TaskSpec>> {
        let producers = self.producers.iter().zip(1..).map(|(task, index)| {
            task.to_spec(TaskId::new(Role::Producer, index))
        });
        let consumers = self.consumers.iter().zip(1..).map(|(task, index)| {
            task.to_spec(TaskId::new(Role::Consumer, index))
        });
        producers.chain(consumers).collect()
    }

    /// Checks the whole configuration before anything is spawned.
    pub fn validate(&self) -> SluiceResult<()> {
        let thresholds = self.thresholds()?;
        if !thresholds.contains(self.initial_value) {
            return Err(SluiceError::InvalidConfig(format!(
                "initial value {} lies outside the band {}..={}",
                self.initial_value, self.low_watermark, self.high_watermark
            )));
        }
        if self.producers.is_empty() && self.consumers.is_empty() {
            return Err(SluiceError::InvalidConfig(
                "at least one producer or consumer is required".to_string(),
            ));
        }
        self.task_specs()?;
        Ok(())
    }

    /// Parses a RON document.
    pub fn from_ron_str(source: &str) -> SluiceResult<Self> {
        ron::from_str(source).map_err(|e| SluiceError::Parse {
            format: "ron",
            message: e.to_string(),
        })
    }

    /// Parses a JSON document.
    pub fn from_json_str(source: &str) -> SluiceResult<Self> {
        serde_json::from_str(source).map_err(|e| SluiceError::Parse {
            format: "json",
            message: e.to_string(),
        })
    }

    /// Loads a `.ron` or `.json` file and validates it.
    pub fn from_path(path: impl AsRef<Path>) -> SluiceResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("ron") => Self::from_ron_str(&source)?,
            Some("json") => Self::from_json_str(&source)?,
            _ => {
                return Err(SluiceError::InvalidConfig(format!(
                    "unsupported configuration file '{}', expected .ron or .json",
                    path.display()
                )))
            }
        };
        config.validate()?;
        log::info!("Loaded configuration from '{}'.", path.display());
        Ok(config)
    }

    /// Serializes to pretty RON.
    pub fn to_ron_string(&self) -> SluiceResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()).map_err(|e| {
            SluiceError::Parse {
                format: "ron",
                message: e.to_string(),
            }
        })
    }

    /// Serializes to pretty JSON.
    pub fn to_json_string(&self) -> SluiceResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SluiceError::Parse {
            format: "json",
            message: e.to_string(),
        })
    }
}

/// Built-in configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// See [`SimulationConfig::pool`].
    Pool,
    /// See [`SimulationConfig::bank`].
    Bank,
    /// See [`SimulationConfig::credit_pause`].
    CreditPause,
}

impl Preset {
    /// Every preset, in display order.
    pub const ALL: [Preset; 3] = [Preset::Pool, Preset::Bank, Preset::CreditPause];

    /// The preset's command-line name.
    pub fn name(self) -> &'static str {
        match self {
            Preset::Pool => "pool",
            Preset::Bank => "bank",
            Preset::CreditPause => "credit-pause",
        }
    }

    /// Builds the preset's configuration.
    pub fn config(self) -> SimulationConfig {
        match self {
            Preset::Pool => SimulationConfig::pool(),
            Preset::Bank => SimulationConfig::bank(),
            Preset::CreditPause => SimulationConfig::credit_pause(),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = SluiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Preset::ALL.iter().map(|p| p.name()).collect();
                SluiceError::InvalidConfig(format!(
                    "unknown preset '{s}', expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

/// Configuration of the divisor game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivisorConfig {
    /// Counter value at start.
    pub initial_value: i64,
    /// One task per divisor.
    pub divisors: Vec<u32>,
    /// Length of one pause unit, in milliseconds.
    pub unit_ms: u64,
}

impl Default for DivisorConfig {
    fn default() -> Self {
        Self {
            initial_value: 1,
            divisors: vec![3, 5, 7, 17],
            unit_ms: 1000,
        }
    }
}

impl DivisorConfig {
    /// Checks the divisors and the time unit.
    pub fn validate(&self) -> SluiceResult<()> {
        if self.divisors.is_empty() {
            return Err(SluiceError::InvalidConfig(
                "the divisor game needs at least one divisor".to_string(),
            ));
        }
        if self.unit_ms == 0 {
            return Err(SluiceError::InvalidConfig(
                "the pause unit must be positive".to_string(),
            ));
        }
        self.divisors.iter().try_for_each(|&d| validate_divisor(d))?;
        let longest = self.divisors.iter().copied().max().unwrap_or(0);
        if self.unit().checked_mul(longest).is_none() {
            return Err(SluiceError::InvalidConfig(format!(
                "a pause of {longest} units of {} ms is out of range",
                self.unit_ms
            )));
        }
        Ok(())
    }

    /// Length of one pause unit.
    pub fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }
}

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

//! Error types shared by every Sluice crate.

use std::io;

/// A specialized `Result` type for Sluice operations.
pub type SluiceResult<T> = Result<T, SluiceError>;

/// An error that can occur while configuring or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SluiceError {
    /// The watermarks do not satisfy `high > low`.
    #[error("invalid thresholds: high watermark {high} must be greater than low watermark {low}")]
    InvalidThresholds {
        /// The configured low watermark.
        low: i64,
        /// The configured high watermark.
        high: i64,
    },
    /// A task description is unusable (zero period, empty amount range, ...).
    #[error("invalid task '{task}': {reason}")]
    InvalidTask {
        /// Label of the offending task.
        task: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The simulation configuration as a whole is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A task panicked while holding the shared lock, leaving the level in an
    /// unknown state.
    #[error("shared state lock is poisoned")]
    LockPoisoned,
    /// `start` was called on a simulation whose tasks are already running.
    #[error("simulation is already running")]
    AlreadyStarted,
    /// The operating system refused to spawn a task thread.
    #[error("failed to spawn task '{task}': {source}")]
    Spawn {
        /// Label of the task that could not be spawned.
        task: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A task thread panicked outside of the locked section.
    #[error("task '{0}' panicked")]
    TaskPanicked(String),
    /// A divisor step would move the counter past the `i64` range.
    #[error("divisor {divisor} cannot advance counter {value} without overflow")]
    CounterOverflow {
        /// Counter value before the step.
        value: i64,
        /// Divisor of the task that attempted the step.
        divisor: u32,
    },
    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A configuration file could not be parsed.
    #[error("failed to parse {format} configuration: {message}")]
    Parse {
        /// The format being parsed (`ron` or `json`).
        format: &'static str,
        /// The parser's message.
        message: String,
    },
}

impl SluiceError {
    /// Returns true for errors after which the shared level can no longer be
    /// trusted and the process should terminate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SluiceError::LockPoisoned | SluiceError::TaskPanicked(_))
    }
}

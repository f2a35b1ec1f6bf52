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

//! # Sluice Control
//!
//! Runs the primitives of `sluice-core` on real threads: a stop signal,
//! the periodic worker loop, the task set that owns the workers, and the
//! drivers for the level simulation and the divisor game.

#![warn(missing_docs)]

pub mod config;
pub mod divisor;
pub mod ledger;
pub mod signal;
pub mod simulation;
pub mod task;
pub mod worker;

pub use config::{DivisorConfig, Preset, SimulationConfig, TaskConfig};
pub use divisor::{DivisorGame, DivisorSummary};
pub use ledger::{Ledger, TaskTally};
pub use signal::{stop_pair, StopHandle, StopSignal};
pub use simulation::{RunSummary, Simulation};
pub use worker::{Routine, TaskSet, TaskStats, Worker};

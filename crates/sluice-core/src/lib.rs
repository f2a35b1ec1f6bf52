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

//! # Sluice Core
//!
//! Foundational crate of the Sluice simulator: the shared level and its mode,
//! the pure mode gate that decides every mutation, and the lock wrapper that
//! serializes all access to the level.
//!
//! Nothing in this crate spawns threads or sleeps. Higher-level crates drive
//! these primitives from periodic tasks.

#![warn(missing_docs)]

pub mod divisor;
pub mod error;
pub mod event;
pub mod gate;
pub mod guard;
pub mod level;
pub mod task;

pub use error::{SluiceError, SluiceResult};
pub use gate::{GateDecision, GatePolicy, ModeGate, SkipReason};
pub use guard::{Guarded, GuardedLevel};
pub use level::{Level, Mode, Thresholds, Transition, TransitionReason};
pub use task::{Amount, Role, TaskId, TaskSpec};

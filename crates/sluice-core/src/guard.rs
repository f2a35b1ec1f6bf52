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

//! Exclusive-lock wrapper around shared simulation state.

use crate::error::{SluiceError, SluiceResult};
use crate::level::Level;
use std::sync::{Arc, Mutex};

/// Shared state behind one exclusive lock.
///
/// Cloning a `Guarded` clones the handle, not the state. Every access goes
/// through [`with_lock`](Self::with_lock), whose closure cannot leak a
/// reference to the state past the locked scope.
#[derive(Debug, Default)]
pub struct Guarded<T> {
    inner: Arc<Mutex<T>>,
}

/// The guarded level shared by all tasks of a simulation.
pub type GuardedLevel = Guarded<Level>;

impl<T> Guarded<T> {
    /// Wraps `state` in a new lock.
    pub fn new(state: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Runs `f` with exclusive access to the state.
    ///
    /// Blocks until the lock is available. The lock is released when `f`
    /// returns or unwinds. A panic inside `f` poisons the lock and every
    /// later call fails with [`SluiceError::LockPoisoned`].
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> SluiceResult<R> {
        let mut guard = self.inner.lock().map_err(|_| {
            log::error!("Shared state lock poisoned: a task panicked while holding it.");
            SluiceError::LockPoisoned
        })?;
        Ok(f(&mut guard))
    }

    /// Returns true once a holder of the lock has panicked.
    pub fn is_poisoned(&self) -> bool {
        self.inner.is_poisoned()
    }
}

impl<T: Clone> Guarded<T> {
    /// Returns a copy of the state taken under the lock.
    pub fn snapshot(&self) -> SluiceResult<T> {
        self.with_lock(|state| state.clone())
    }
}

impl<T> Clone for Guarded<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

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

//! The periodic worker loop and the task set that owns a group of workers.

use crate::signal::{stop_pair, StopHandle, StopSignal};
use crossbeam_channel::{Receiver, Sender};
use sluice_core::{SluiceError, SluiceResult};
use std::thread;
use std::time::Duration;

/// One unit of periodic work driven by a [`Worker`].
pub trait Routine: Send + 'static {
    /// Name of the task, used for its thread and log lines.
    fn name(&self) -> String;

    /// How long to sleep before the first step.
    fn initial_delay(&self) -> Duration;

    /// Performs one iteration and returns the sleep before the next one.
    ///
    /// An error ends the task.
    fn step(&mut self, stats: &mut TaskStats) -> SluiceResult<Duration>;
}

/// Counters kept by a worker over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Task name.
    pub name: String,
    /// Number of wake-ups that reached the locked section.
    pub iterations: u64,
    /// Steps applied to the shared state.
    pub applied: u64,
    /// Wake-ups refused by the gate.
    pub skipped: u64,
    /// Mode flips caused by this task.
    pub flips: u64,
}

impl TaskStats {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

/// Sends the worker id on `done` when the thread leaves, unwinding included.
struct ExitNotice {
    id: u64,
    done: Sender<u64>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        if self.done.send(self.id).is_err() {
            log::trace!("Exit notice for worker {} has no listener.", self.id);
        }
    }
}

/// A routine running on its own OS thread.
#[derive(Debug)]
pub struct Worker {
    id: u64,
    name: String,
    handle: thread::JoinHandle<SluiceResult<TaskStats>>,
}

impl Worker {
    /// Spawns `routine` on a named thread. When the thread exits, normally or
    /// by panic, `id` is sent on `done`.
    pub fn spawn<R: Routine>(
        routine: R,
        signal: StopSignal,
        id: u64,
        done: Sender<u64>,
    ) -> SluiceResult<Self> {
        let name = routine.name();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _notice = ExitNotice { id, done };
                run(routine, signal)
            })
            .map_err(|source| SluiceError::Spawn {
                task: name.clone(),
                source,
            })?;
        Ok(Self { id, name, handle })
    }

    /// The task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the thread to exit.
    pub fn join(self) -> SluiceResult<TaskStats> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(SluiceError::TaskPanicked(self.name)),
        }
    }
}

fn run<R: Routine>(mut routine: R, signal: StopSignal) -> SluiceResult<TaskStats> {
    let mut stats = TaskStats::new(routine.name());
    let mut delay = routine.initial_delay();
    log::debug!("[{}] started.", stats.name);

    while !signal.wait(delay) {
        match routine.step(&mut stats) {
            Ok(next) => delay = next,
            Err(e) => {
                log::error!("[{}] stopping on fatal error: {e}", stats.name);
                return Err(e);
            }
        }
        stats.iterations += 1;
    }

    log::debug!(
        "[{}] stopped after {} iterations.",
        stats.name,
        stats.iterations
    );
    Ok(stats)
}

/// A group of workers sharing one stop signal.
///
/// A failing member stops the whole set: the level is shared, so the other
/// members cannot be trusted to keep going alone.
#[derive(Debug)]
pub struct TaskSet {
    stop: Option<StopHandle>,
    signal: Option<StopSignal>,
    workers: Vec<Worker>,
    next_id: u64,
    done_tx: Sender<u64>,
    done_rx: Receiver<u64>,
}

impl Default for TaskSet {
    fn default() -> Self {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        Self {
            stop: None,
            signal: None,
            workers: Vec::new(),
            next_id: 0,
            done_tx,
            done_rx,
        }
    }
}

impl TaskSet {
    /// Creates an empty task set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `routine` as a new member of the set.
    pub fn spawn<R: Routine>(&mut self, routine: R) -> SluiceResult<()> {
        let signal = match (&self.signal, self.workers.is_empty()) {
            (Some(signal), false) => signal.clone(),
            _ => {
                let (handle, signal) = stop_pair();
                self.stop = Some(handle);
                self.signal = Some(signal.clone());
                signal
            }
        };
        let id = self.next_id;
        self.next_id += 1;
        let worker = Worker::spawn(routine, signal, id, self.done_tx.clone())?;
        log::info!("Spawned task '{}'.", worker.name());
        self.workers.push(worker);
        Ok(())
    }

    /// Number of spawned, not yet joined workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns true if no worker is alive.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Returns true while at least one worker has not been joined.
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// A handle that stops every member of the set.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.stop.clone()
    }

    /// Blocks until every worker exits, which for healthy periodic tasks
    /// means until someone stops the set.
    ///
    /// All workers are joined even if some fail; the first error is
    /// returned. Stats come back sorted by task name.
    pub fn join(&mut self) -> SluiceResult<Vec<TaskStats>> {
        let mut stats = Vec::with_capacity(self.workers.len());
        let mut first_error = None;

        while !self.workers.is_empty() {
            // The set owns a sender, so the channel never disconnects here.
            let Ok(id) = self.done_rx.recv() else {
                break;
            };
            let Some(pos) = self.workers.iter().position(|w| w.id == id) else {
                continue;
            };
            match self.workers.swap_remove(pos).join() {
                Ok(s) => stats.push(s),
                Err(e) => {
                    log::error!("Task failed: {e}. Stopping the task set.");
                    if let Some(stop) = &self.stop {
                        stop.stop();
                    }
                    first_error.get_or_insert(e);
                }
            }
        }

        self.stop = None;
        self.signal = None;
        match first_error {
            Some(e) => Err(e),
            None => {
                stats.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(stats)
            }
        }
    }

    /// Stops every worker and waits for them to exit.
    pub fn stop(&mut self) -> SluiceResult<Vec<TaskStats>> {
        if let Some(stop) = &self.stop {
            stop.stop();
        }
        self.join()
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop() {
                log::error!("Task set stopped with error: {e}");
            }
        }
    }
}

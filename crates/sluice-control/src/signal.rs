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

//! Cooperative shutdown for periodic tasks.
//!
//! Every task sleeps on the receiving end of a channel that never carries a
//! message. Stopping drops the only sender, which disconnects the channel
//! and wakes all sleepers at once.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The task side of a stop pair.
#[derive(Debug, Clone)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
    wake: Receiver<()>,
}

/// The driver side of a stop pair. Cloning shares the same signal.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Arc<Mutex<Option<Sender<()>>>>,
}

/// Creates a connected stop handle and signal.
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    let stopped = Arc::new(AtomicBool::new(false));
    (
        StopHandle {
            stopped: Arc::clone(&stopped),
            wake: Arc::new(Mutex::new(Some(tx))),
        },
        StopSignal { stopped, wake: rx },
    )
}

impl StopHandle {
    /// Requests every task holding a matching signal to stop. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        match self.wake.lock() {
            Ok(mut wake) => {
                wake.take();
            }
            // The flag alone still stops tasks, one period late at worst.
            Err(_) => log::warn!("Stop handle lock poisoned; sleepers wake on their own."),
        }
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl StopSignal {
    /// Returns true once a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Sleeps for `timeout` unless a stop arrives first.
    ///
    /// Returns true if the task must stop, checked both before and after
    /// the sleep.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        match self.wake.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out_when_not_stopped() {
        let (_handle, signal) = stop_pair();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_stop_wakes_long_sleeper() {
        let (handle, signal) = stop_pair();
        let sleeper = thread::spawn(move || {
            let start = Instant::now();
            let stopped = signal.wait(Duration::from_secs(30));
            (stopped, start.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        handle.stop();
        let (stopped, elapsed) = sleeper.join().expect("sleeper panicked");
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5), "woke after {elapsed:?}");
    }

    #[test]
    fn test_stop_is_idempotent_and_shared_by_clones() {
        let (handle, signal) = stop_pair();
        let other = handle.clone();
        let signal2 = signal.clone();
        other.stop();
        handle.stop();
        assert!(handle.is_stopped());
        assert!(signal.wait(Duration::from_secs(10)));
        assert!(signal2.wait(Duration::ZERO));
    }
}

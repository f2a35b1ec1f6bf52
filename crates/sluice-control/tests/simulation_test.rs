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

use sluice_control::{Ledger, Simulation, SimulationConfig, TaskConfig};
use sluice_core::event::{StepReport, TaskEvent};
use sluice_core::{GatePolicy, Mode, Role, TransitionReason};
use std::thread;
use std::time::{Duration, Instant};

fn steps_by_revision(events: impl IntoIterator<Item = TaskEvent>) -> Vec<StepReport> {
    let mut steps: Vec<StepReport> = events
        .into_iter()
        .filter_map(|event| match event {
            TaskEvent::Step(step) => Some(step),
            TaskEvent::Divisor(_) => None,
        })
        .collect();
    steps.sort_by_key(|s| s.revision);
    steps
}

fn wait_for_mode(sim: &Simulation, mode: Mode, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if sim.level().snapshot().unwrap().mode() == mode {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_no_lost_updates_under_contention() {
    // --- ARRANGE ---
    // Many tasks on a 1 ms period fight over a narrow band.
    let config = SimulationConfig {
        initial_value: 250,
        initial_mode: Mode::Filling,
        low_watermark: 0,
        high_watermark: 500,
        producers: vec![
            TaskConfig::fixed(7, 1),
            TaskConfig::fixed(11, 1).with_burst(3),
            TaskConfig::uniform(1, 40, 1),
        ],
        consumers: vec![
            TaskConfig::fixed(5, 1),
            TaskConfig::fixed(9, 1).with_burst(2),
            TaskConfig::uniform(1, 60, 1),
        ],
        seed: Some(42),
        ..SimulationConfig::pool()
    };
    let mut sim = Simulation::new(config).unwrap();
    let events = sim.subscribe();

    // --- ACT ---
    let summary = sim.run_for(Duration::from_millis(300)).unwrap();

    // --- ASSERT ---
    let mut ledger = Ledger::new();
    ledger.drain(&events);
    assert!(ledger.steps() > 0, "no step was applied");
    assert_eq!(
        ledger.net_delta(),
        summary.final_value - summary.initial_value,
        "sum of applied deltas must match the level's movement"
    );
    assert_eq!(ledger.steps(), summary.revision);
    assert_eq!(ledger.last_revision(), summary.revision);
    assert!((0..=500).contains(&summary.final_value));
    let applied: u64 = summary.tasks.iter().map(|t| t.applied).sum();
    assert_eq!(applied, ledger.steps());
}

#[test]
fn test_replayed_steps_form_one_consistent_history() {
    let config = SimulationConfig {
        producers: vec![TaskConfig::fixed(20, 1), TaskConfig::fixed(35, 1)],
        consumers: vec![TaskConfig::fixed(10, 1), TaskConfig::fixed(5, 1)],
        ..SimulationConfig::pool()
    };
    let initial = config.initial_value;
    let mut mode = config.initial_mode;
    let mut sim = Simulation::new(config).unwrap();
    let events = sim.subscribe();
    sim.run_for(Duration::from_millis(250)).unwrap();

    let steps = steps_by_revision(events.try_iter());
    assert!(!steps.is_empty());

    let mut value = initial;
    for (expected_revision, step) in (1..).zip(&steps) {
        assert_eq!(step.revision, expected_revision, "a revision is missing");
        assert_eq!(step.before, value, "step {} read a stale value", step.revision);
        assert_eq!(
            step.task.role.permitted_mode(),
            mode,
            "{} acted while the level was {mode}",
            step.task
        );
        assert!((800..=2000).contains(&step.after), "overshoot at {}", step.after);
        value = step.after;
        mode = step.mode;
    }
}

#[test]
fn test_two_consumers_settle_exactly_on_low_watermark() {
    // --- ARRANGE ---
    let config = SimulationConfig {
        initial_value: 2000,
        initial_mode: Mode::Draining,
        low_watermark: 800,
        high_watermark: 2000,
        producers: vec![],
        consumers: vec![TaskConfig::fixed(10, 1), TaskConfig::fixed(5, 1)],
        ..SimulationConfig::pool()
    };
    let mut sim = Simulation::new(config).unwrap();

    // --- ACT ---
    sim.start().unwrap();
    let flipped = wait_for_mode(&sim, Mode::Filling, Duration::from_secs(10));
    // Keep the consumers running past the flip: they must all be refused.
    thread::sleep(Duration::from_millis(30));
    let summary = sim.stop().unwrap();

    // --- ASSERT ---
    assert!(flipped, "the level never reached the low watermark");
    assert_eq!(summary.final_value, 800);
    assert_eq!(summary.final_mode, Mode::Filling);
    let transition = sim.level().snapshot().unwrap().last_transition().unwrap();
    assert_eq!(transition.reason, TransitionReason::LowWatermark);
    assert_eq!(transition.value, 800);
    assert_eq!(summary.flips(), 1);
    assert!(summary.tasks.iter().any(|t| t.skipped > 0));
}

#[test]
fn test_cooldown_suspends_consumers_while_producers_continue() {
    // --- ARRANGE ---
    let cooldown = Duration::from_millis(200);
    let config = SimulationConfig {
        initial_value: 100,
        initial_mode: Mode::Draining,
        low_watermark: 50,
        high_watermark: 120,
        policy: GatePolicy::Exclusive,
        cooldown_ms: Some(cooldown.as_millis() as u64),
        producers: vec![TaskConfig::fixed(10, 5)],
        consumers: vec![TaskConfig::fixed(60, 5)],
        ..SimulationConfig::pool()
    };
    let mut sim = Simulation::new(config).unwrap();
    let events = sim.subscribe();

    // --- ACT ---
    sim.run_for(Duration::from_millis(600)).unwrap();

    // --- ASSERT ---
    let steps = steps_by_revision(events.try_iter());
    let first_cooldown = steps
        .iter()
        .find(|s| s.cooldown_until.is_some())
        .expect("the consumer never reached the low watermark");
    let until = first_cooldown.cooldown_until.unwrap();
    assert_eq!(until, first_cooldown.at + cooldown);

    // Producers refilled the level to the high watermark inside the window.
    let refill = steps
        .iter()
        .find(|s| {
            s.revision > first_cooldown.revision
                && s.transition.map(|t| t.mode) == Some(Mode::Draining)
        })
        .expect("producers never reached the high watermark");
    assert!(refill.at < until, "refill should land inside the cooldown");

    // Every consumer step respects every armed cooldown.
    for armed in steps.iter().filter(|s| s.cooldown_until.is_some()) {
        let window_end = armed.cooldown_until.unwrap();
        for step in steps.iter().filter(|s| s.task.role == Role::Consumer) {
            if step.revision > armed.revision {
                assert!(
                    step.at >= window_end,
                    "consumer stepped {:?} into a cooldown",
                    window_end - step.at
                );
            }
        }
    }

    // And consumers did resume once the window closed.
    assert!(steps
        .iter()
        .any(|s| s.task.role == Role::Consumer && s.revision > refill.revision));
}

#[test]
fn test_consumers_only_producers_keep_depositing_through_cooldown() {
    // --- ARRANGE ---
    // Consumers drain faster than producers fill, so the level keeps
    // reaching the low watermark and arming the cooldown.
    let cooldown = Duration::from_millis(150);
    let config = SimulationConfig {
        initial_value: 100,
        initial_mode: Mode::Draining,
        low_watermark: 50,
        high_watermark: 120,
        policy: GatePolicy::ConsumersOnly,
        cooldown_ms: Some(cooldown.as_millis() as u64),
        producers: vec![TaskConfig::fixed(10, 5)],
        consumers: vec![TaskConfig::fixed(60, 20)],
        ..SimulationConfig::pool()
    };
    let mut sim = Simulation::new(config).unwrap();
    let events = sim.subscribe();

    // --- ACT ---
    let summary = sim.run_for(Duration::from_millis(600)).unwrap();

    // --- ASSERT ---
    let steps = steps_by_revision(events.try_iter());
    let armed = steps
        .iter()
        .find(|s| s.cooldown_until.is_some())
        .expect("the consumer never reached the low watermark");
    let until = armed.cooldown_until.unwrap();

    // Deposits land inside the window.
    assert!(steps.iter().any(|s| {
        s.task.role == Role::Producer && s.revision > armed.revision && s.at < until
    }));

    // No consumer step falls inside any armed window.
    for window in steps.iter().filter(|s| s.cooldown_until.is_some()) {
        let window_end = window.cooldown_until.unwrap();
        assert!(steps
            .iter()
            .filter(|s| s.task.role == Role::Consumer && s.revision > window.revision)
            .all(|s| s.at >= window_end));
    }

    // Producers are not gated by the draining mode.
    let mut previous_mode = Mode::Draining;
    let mut deposited_while_draining = false;
    for step in &steps {
        if step.task.role == Role::Producer && previous_mode == Mode::Draining {
            deposited_while_draining = true;
        }
        previous_mode = step.mode;
    }
    assert!(deposited_while_draining);

    // A full level turns producer wake-ups into skips, never into empty steps.
    assert!(steps.iter().all(|s| s.delta() != 0));
    let producer = summary
        .tasks
        .iter()
        .find(|t| t.name.starts_with("producer"))
        .unwrap();
    assert!(producer.skipped > 0);

    let mut ledger = Ledger::new();
    for step in &steps {
        ledger.record(&TaskEvent::Step(step.clone()));
    }
    assert_eq!(
        ledger.net_delta(),
        summary.final_value - summary.initial_value
    );
}

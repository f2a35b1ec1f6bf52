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

use sluice_control::{Preset, Simulation, SimulationConfig};
use sluice_core::{GatePolicy, Mode, SluiceError};
use std::fs;

#[test]
fn test_ron_and_json_files_load_the_same_config() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let preset = Preset::CreditPause.config();

    let ron_path = dir.path().join("credit.ron");
    let json_path = dir.path().join("credit.json");
    fs::write(&ron_path, preset.to_ron_string().unwrap()).unwrap();
    fs::write(&json_path, preset.to_json_string().unwrap()).unwrap();

    let from_ron = SimulationConfig::from_path(&ron_path).unwrap();
    let from_json = SimulationConfig::from_path(&json_path).unwrap();
    assert_eq!(from_ron, preset);
    assert_eq!(from_json, preset);
    assert_eq!(from_ron.policy, GatePolicy::ConsumersOnly);
}

#[test]
fn test_handwritten_ron_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("tank.ron");
    fs::write(
        &path,
        r#"(
    initial_value: 500,
    initial_mode: Filling,
    low_watermark: 100,
    high_watermark: 900,
    producers: [(rate: 50, period_ms: 10, label: Some("pump"))],
    consumers: [(rate: 20, max_rate: Some(30), period_ms: 10, burst: 2)],
)"#,
    )
    .unwrap();

    let config = SimulationConfig::from_path(&path).unwrap();
    assert_eq!(config.initial_mode, Mode::Filling);
    assert_eq!(config.producers[0].label.as_deref(), Some("pump"));
    assert_eq!(config.consumers[0].burst, 2);
    assert!(Simulation::new(config).is_ok());
}

#[test]
fn test_file_errors() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    let missing = dir.path().join("missing.ron");
    assert!(matches!(
        SimulationConfig::from_path(&missing),
        Err(SluiceError::Io(_))
    ));

    let yaml = dir.path().join("config.yaml");
    fs::write(&yaml, "initial_value: 1").unwrap();
    assert!(matches!(
        SimulationConfig::from_path(&yaml),
        Err(SluiceError::InvalidConfig(_))
    ));

    let inverted = dir.path().join("inverted.json");
    fs::write(
        &inverted,
        r#"{ "initial_value": 10, "low_watermark": 20, "high_watermark": 5 }"#,
    )
    .unwrap();
    assert!(matches!(
        SimulationConfig::from_path(&inverted),
        Err(SluiceError::InvalidThresholds { low: 20, high: 5 })
    ));
}

#[test]
fn test_bundled_tank_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/tank.ron");
    let config = SimulationConfig::from_path(&path).unwrap();
    assert_eq!(config.cooldown_ms, Some(1500));
    assert_eq!(config.consumers.len(), 2);
    assert_eq!(config.consumers[1].burst, 1);
}

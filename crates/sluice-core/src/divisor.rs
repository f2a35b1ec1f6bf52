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

//! The divisor game: several tasks advance one shared counter, each by a
//! rule keyed on its own divisor, and sleep for a rule-chosen pause.

use crate::error::{SluiceError, SluiceResult};

/// Result of one divisor step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisorStep {
    /// The new counter value.
    pub value: i64,
    /// How many time units the task pauses afterwards.
    pub pause_units: u32,
}

/// Largest divisor accepted by [`validate_divisor`]. Keeps `k²` and the
/// pause of `k` units well inside the counter and clock ranges.
pub const MAX_DIVISOR: u32 = 1 << 16;

/// Rejects divisors that would make the rule degenerate or overflow.
pub fn validate_divisor(divisor: u32) -> SluiceResult<()> {
    if divisor < 2 {
        return Err(SluiceError::InvalidConfig(format!(
            "divisor {divisor} must be at least 2"
        )));
    }
    if divisor > MAX_DIVISOR {
        return Err(SluiceError::InvalidConfig(format!(
            "divisor {divisor} exceeds the maximum of {MAX_DIVISOR}"
        )));
    }
    Ok(())
}

/// Advances `value` by the rule of `divisor` (`k`):
///
/// | condition | new value | pause |
/// |---|---|---|
/// | `value % k != 0` | `value + 1` | `k` |
/// | `value % k² == 0` | `value + 2k + 1` | `0` |
/// | otherwise | `value + k + 1` | `1` |
///
/// Fails with [`SluiceError::CounterOverflow`] when the new value does not
/// fit in an `i64`; `value` is then left to the caller unchanged.
pub fn step(value: i64, divisor: u32) -> SluiceResult<DivisorStep> {
    let overflow = || SluiceError::CounterOverflow { value, divisor };
    let k = i64::from(divisor);
    if k == 0 {
        return Err(SluiceError::InvalidConfig(
            "divisor 0 must be at least 2".to_string(),
        ));
    }
    let (increment, pause_units) = if value.rem_euclid(k) != 0 {
        (1, divisor)
    } else {
        let square = k.checked_mul(k).ok_or_else(overflow)?;
        if value.rem_euclid(square) == 0 {
            (2 * k + 1, 0)
        } else {
            (k + 1, 1)
        }
    };
    let value = value.checked_add(increment).ok_or_else(overflow)?;
    Ok(DivisorStep { value, pause_units })
}

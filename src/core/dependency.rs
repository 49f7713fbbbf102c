// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
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

//! Cross-control dependency resolution
//!
//! A control may declare [`DependencyProvision`]s against other controls.
//! Each provision compares the value being set with the other control's
//! value and, depending on the outcome, derives a new value:
//!
//! ```text
//! phase             derived value            applied to
//! ----------------  -----------------------  ---------------------------
//! self              dependency OP constant   the value being set
//! dependent_control value OP constant        dependency's register program
//! ```
//!
//! The `self` pass runs before the primary control's register write, the
//! `dependent_control` pass after it.
//!
//! Provisions are resolved to bank indices once, when the bank is built
//! ([`DependencyGraph`]), so a set never scans the bank for its targets.

use serde::{Deserialize, Serialize};

use super::controls::{ControlBank, ControlId, ControlInstance};
use super::error::SensorError;
use super::program::{self, ProgramTarget};

/// When a provision is evaluated relative to the primary register write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[serde(rename = "self")]
    SelfControl,
    DependentControl,
}

/// Outcome of comparing the value being set with the dependency's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Greater,
    Lesser,
    Equal,
}

impl Condition {
    pub fn compare(value: u32, dependency: u32) -> Self {
        match value.cmp(&dependency) {
            std::cmp::Ordering::Greater => Condition::Greater,
            std::cmp::Ordering::Less => Condition::Lesser,
            std::cmp::Ordering::Equal => Condition::Equal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Action {
    /// Wrapping arithmetic; `None` for a division by zero
    pub fn apply(self, base: u32, operand: u32) -> Option<u32> {
        match self {
            Action::Add => Some(base.wrapping_add(operand)),
            Action::Subtract => Some(base.wrapping_sub(operand)),
            Action::Multiply => Some(base.wrapping_mul(operand)),
            Action::Divide => base.checked_div(operand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRule {
    pub when: Condition,
    pub action: Action,
    #[serde(default)]
    pub value: u32,
}

/// Rule set tying a control to one dependency control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyProvision {
    pub control: ControlId,
    pub phase: Phase,
    #[serde(default)]
    pub rules: Vec<ActionRule>,
}

impl DependencyProvision {
    /// Value derived from `value` (being set) and `dependency` (current)
    ///
    /// The first rule matching the comparison wins. Returns `None` when no
    /// rule matches or the rule divides by zero.
    pub fn outcome(&self, value: u32, dependency: u32) -> Option<u32> {
        let condition = Condition::compare(value, dependency);
        let rule = self.rules.iter().find(|r| r.when == condition)?;
        let base = match self.phase {
            Phase::SelfControl => dependency,
            Phase::DependentControl => value,
        };

        let result = rule.action.apply(base, rule.value);
        if result.is_none() {
            log::warn!(
                "Dependency on {}: {:?} by zero ignored",
                self.control,
                rule.action
            );
        }
        result
    }
}

/// One provision of a control with its dependency resolved to a bank index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Index into the owning descriptor's `dependencies`
    pub provision: usize,
    /// Bank index of the dependency control, `None` if it does not exist
    pub target: Option<usize>,
}

/// Adjacency list of dependency edges, one entry per bank index
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: Vec<Vec<DependencyEdge>>,
}

impl DependencyGraph {
    pub fn build<F>(instances: &[ControlInstance], lookup: F) -> Self
    where
        F: Fn(ControlId) -> Option<usize>,
    {
        let edges = instances
            .iter()
            .map(|instance| {
                instance
                    .descriptor()
                    .dependencies
                    .iter()
                    .enumerate()
                    .map(|(provision, dep)| DependencyEdge {
                        provision,
                        target: lookup(dep.control),
                    })
                    .collect()
            })
            .collect();
        Self { edges }
    }

    pub fn edges(&self, index: usize) -> &[DependencyEdge] {
        self.edges.get(index).map_or(&[], Vec::as_slice)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }
}

/// Run one dependency pass for the control at `primary`
///
/// In the `self` phase `proposed` may be rewritten. In the
/// `dependent_control` phase each derived value is pushed through the
/// dependency's register program and `proposed` is left alone.
///
/// Missing dependencies, unreadable values and program failures are logged
/// and skipped; this never fails.
pub fn apply<T: ProgramTarget + ?Sized>(
    bank: &ControlBank,
    primary: usize,
    proposed: &mut u32,
    phase: Phase,
    target: &mut T,
) {
    let Some(instance) = bank.get(primary) else {
        return;
    };

    for edge in bank.dependencies(primary) {
        let provision = &instance.descriptor().dependencies[edge.provision];
        if provision.phase != phase {
            continue;
        }

        let failed = || SensorError::DependencyLookupFailed {
            control: instance.id(),
            dependency: provision.control,
        };

        let Some(dep_index) = edge.target else {
            log::warn!("{}", failed());
            continue;
        };
        let dep_value = match bank.value_at(dep_index) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("{}: {}", failed(), e);
                continue;
            }
        };

        let Some(outcome) = provision.outcome(*proposed, dep_value) else {
            continue;
        };

        match phase {
            Phase::SelfControl => {
                log::debug!(
                    "{}: {} adjusted to {} by {}",
                    instance.descriptor().name,
                    *proposed,
                    outcome,
                    provision.control
                );
                *proposed = outcome;
            }
            Phase::DependentControl => {
                let Some(dependency) = bank.get(dep_index) else {
                    continue;
                };
                log::debug!(
                    "{}: pushing {} to {}",
                    instance.descriptor().name,
                    outcome,
                    dependency.descriptor().name
                );
                if let Err(e) = program::run(&dependency.descriptor().program, outcome, target) {
                    log::warn!(
                        "Dependent control {} update failed: {}",
                        dependency.descriptor().name,
                        e
                    );
                }
            }
        }
    }
}

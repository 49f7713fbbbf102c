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

//! Control bank
//!
//! Owns the live copy of every control of one sensor. Controls are kept in
//! descriptor order; lookups by id return the first control with that id,
//! lookups by `(stage, id)` disambiguate ids shared between stages (pixel
//! rate on the pixel array and on the CSI side, for instance).

use std::collections::HashMap;

use super::{Context, ControlDescriptor, ControlId, ControlKind, MenuItem, Stage};
use crate::core::dependency::{DependencyEdge, DependencyGraph};
use crate::core::error::{Result, SensorError};

/// Live state of one control
#[derive(Debug, Clone)]
pub struct ControlInstance {
    descriptor: ControlDescriptor,
    value: i64,
    enabled: bool,
    /// False when the control has no backing value (absent stage, empty menu)
    ready: bool,
    min: i64,
    max: i64,
    step: i64,
    default: i64,
}

impl ControlInstance {
    fn new(descriptor: ControlDescriptor, ready: bool) -> Self {
        let (min, max, step, default) = descriptor.kind.bounds();
        Self {
            descriptor,
            value: default,
            enabled: false,
            ready,
            min,
            max,
            step,
            default,
        }
    }

    pub fn id(&self) -> ControlId {
        self.descriptor.id
    }

    pub fn descriptor(&self) -> &ControlDescriptor {
        &self.descriptor
    }

    /// Stored raw value (menu index for menu controls)
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn default_value(&self) -> i64 {
        self.default
    }

    /// Value as seen by expressions
    ///
    /// Integer menus resolve the stored index through the menu; an index past
    /// the end of the menu reads as 0.
    pub fn resolved_value(&self) -> u32 {
        match &self.descriptor.kind {
            ControlKind::IntegerMenu { menu, .. } => usize::try_from(self.value)
                .ok()
                .and_then(|i| menu.get(i))
                .map_or(0, |&v| v as u32),
            _ => self.value as u32,
        }
    }

    pub(crate) fn set_value(&mut self, value: i64) {
        self.value = value;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_bounds(&mut self, min: i64, max: i64, default: i64) {
        self.min = min;
        self.max = max;
        self.default = default;
    }
}

/// Every control of one sensor plus its dependency graph
#[derive(Debug, Clone)]
pub struct ControlBank {
    instances: Vec<ControlInstance>,
    index: HashMap<ControlId, usize>,
    graph: DependencyGraph,
}

impl ControlBank {
    /// Copy `descriptors` into a new bank
    ///
    /// Controls owned by a stage not listed in `stages` are registered
    /// without a backing value, as are menus with no entries.
    pub fn new(descriptors: &[ControlDescriptor], stages: &[Stage]) -> Self {
        let instances: Vec<ControlInstance> = descriptors
            .iter()
            .map(|desc| {
                let stage_present = stages.contains(&desc.stage);
                if !stage_present {
                    log::warn!(
                        "Control {} belongs to absent stage {:?}",
                        desc.name,
                        desc.stage
                    );
                }
                let menu_ok = !desc.kind.is_menu() || desc.kind.bounds().1 >= 0;
                ControlInstance::new(desc.clone(), stage_present && menu_ok)
            })
            .collect();

        let mut index = HashMap::new();
        for (i, instance) in instances.iter().enumerate() {
            index.entry(instance.id()).or_insert(i);
        }

        let graph = DependencyGraph::build(&instances, |id| index.get(&id).copied());

        log::debug!(
            "Control bank: {} controls, {} dependency edges",
            instances.len(),
            graph.edge_count()
        );

        Self {
            instances,
            index,
            graph,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ControlInstance> {
        self.instances.iter()
    }

    /// First control with this id
    pub fn find(&self, id: ControlId) -> Option<&ControlInstance> {
        self.position(id).map(|i| &self.instances[i])
    }

    pub fn position(&self, id: ControlId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Control with this id owned by `stage`
    pub fn position_on(&self, stage: Stage, id: ControlId) -> Option<usize> {
        self.instances
            .iter()
            .position(|c| c.id() == id && c.descriptor.stage == stage)
    }

    pub fn get(&self, index: usize) -> Option<&ControlInstance> {
        self.instances.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut ControlInstance> {
        self.instances.get_mut(index)
    }

    /// Resolved value of the first control with this id
    ///
    /// # Errors
    ///
    /// [`SensorError::NotFound`] for an unknown id, [`SensorError::NotReady`]
    /// for a control without a backing value.
    pub fn get_value(&self, id: ControlId) -> Result<u32> {
        let index = self.position(id).ok_or(SensorError::NotFound { id })?;
        self.value_at(index)
    }

    /// Resolved value of the control at `index`
    pub fn value_at(&self, index: usize) -> Result<u32> {
        let instance = self
            .instances
            .get(index)
            .ok_or_else(|| {
                SensorError::InvalidDescription(format!("control index {} out of range", index))
            })?;
        if !instance.ready {
            return Err(SensorError::NotReady { id: instance.id() });
        }
        Ok(instance.resolved_value())
    }

    /// Store a raw value without running anything
    pub fn set_raw(&mut self, id: ControlId, value: i64) -> Result<()> {
        let index = self.position(id).ok_or(SensorError::NotFound { id })?;
        let instance = &mut self.instances[index];
        if !instance.ready {
            return Err(SensorError::NotReady { id });
        }
        instance.value = value;
        Ok(())
    }

    /// Enable or disable every control tagged with `context`
    ///
    /// # Returns
    ///
    /// Number of controls touched
    pub fn set_enabled_by_context(&mut self, context: Context, enabled: bool) -> usize {
        let mut count = 0;
        for instance in self
            .instances
            .iter_mut()
            .filter(|c| c.descriptor.context == context)
        {
            instance.enabled = enabled;
            count += 1;
        }
        log::trace!(
            "{:?} controls {} ({})",
            context,
            if enabled { "enabled" } else { "disabled" },
            count
        );
        count
    }

    /// Entry `index` of a menu control
    pub fn menu_item(&self, id: ControlId, index: usize) -> Result<MenuItem> {
        let instance = self.find(id).ok_or(SensorError::NotFound { id })?;
        let out_of_range = || SensorError::OutOfRange {
            id,
            value: index as i64,
            min: instance.min,
            max: instance.max,
        };
        match &instance.descriptor.kind {
            ControlKind::IntegerMenu { menu, .. } => menu
                .get(index)
                .map(|&v| MenuItem::Integer(v))
                .ok_or_else(out_of_range),
            ControlKind::StringMenu { items, .. } => items
                .get(index)
                .map(|s| MenuItem::Name(s.clone()))
                .ok_or_else(out_of_range),
            _ => Err(SensorError::TypeMismatch {
                id,
                expected: "menu",
            }),
        }
    }

    /// Outgoing dependency edges of the control at `index`
    pub fn dependencies(&self, index: usize) -> &[DependencyEdge] {
        self.graph.edges(index)
    }
}

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

//! Expression evaluator
//!
//! Register values are rarely the control value itself. A control's register
//! program attaches a short chain of [`Operation`]s to every register it
//! writes, and the chain is folded left to right over a seed (normally the
//! control value).
//!
//! # Operators
//!
//! ```text
//! and, or, xor             acc OP operand
//! left_shift, right_shift  acc << operand, acc >> operand (0 when >= 32)
//! complement               !acc, operand ignored
//! add, multiply            wrapping
//! subtract                 max(acc, operand) - min(acc, operand)
//! divide                   acc / operand, fails on 0
//! assign                   operand
//! ```
//!
//! `subtract` yields the absolute difference. Sensor tables rely on this for
//! flip and shutter computations, so it is not ordinary subtraction.
//!
//! # Example
//!
//! A 16-bit frame length split over two 8-bit registers:
//!
//! ```text
//! 0x0340: [right_shift 8]   -> high byte
//! 0x0341: [and 0xFF]        -> low byte
//! ```

use serde::{Deserialize, Serialize};

use super::controls::ControlId;
use super::error::{Result, SensorError};

/// Live pipeline value an operand can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRef {
    /// Width of the source stage's output crop
    OutputWidth,
    /// Height of the source stage's output crop
    OutputHeight,
    /// Bits per pixel of the current data format
    BitsPerPixel,
}

/// Value source of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Constant(u32),
    /// Current value of another control, menus resolved
    Control(ControlId),
    Variable(VariableRef),
    /// 8-bit read of a sensor register
    Register(u16),
}

/// Operator applied between the accumulator and an operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    And,
    Or,
    Xor,
    LeftShift,
    RightShift,
    Complement,
    Add,
    Subtract,
    Multiply,
    Divide,
    Assign,
}

impl ArithOp {
    /// Combine the accumulator with an already resolved operand
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::DivideByZero`] for `Divide` by 0.
    pub fn apply(self, acc: u32, operand: u32) -> Result<u32> {
        let value = match self {
            ArithOp::And => acc & operand,
            ArithOp::Or => acc | operand,
            ArithOp::Xor => acc ^ operand,
            ArithOp::LeftShift => acc.checked_shl(operand).unwrap_or(0),
            ArithOp::RightShift => acc.checked_shr(operand).unwrap_or(0),
            ArithOp::Complement => !acc,
            ArithOp::Add => acc.wrapping_add(operand),
            ArithOp::Subtract => acc.max(operand) - acc.min(operand),
            ArithOp::Multiply => acc.wrapping_mul(operand),
            ArithOp::Divide => acc.checked_div(operand).ok_or(SensorError::DivideByZero)?,
            ArithOp::Assign => operand,
        };
        Ok(value)
    }
}

/// One step of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub op: ArithOp,
    pub operand: Operand,
}

impl Operation {
    pub fn new(op: ArithOp, operand: Operand) -> Self {
        Self { op, operand }
    }

    pub fn constant(op: ArithOp, value: u32) -> Self {
        Self::new(op, Operand::Constant(value))
    }
}

/// Ordered list of operations folded over a seed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(pub Vec<Operation>);

impl Expression {
    pub fn new(ops: Vec<Operation>) -> Self {
        Self(ops)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn evaluate<S: OperandSource + ?Sized>(&self, seed: u32, source: &mut S) -> Result<u32> {
        evaluate(seed, &self.0, source)
    }
}

/// Live state the evaluator reads operands from
pub trait OperandSource {
    /// Current value of a control, resolved through its menu if it has one
    ///
    /// # Errors
    ///
    /// [`SensorError::NotFound`] or [`SensorError::NotReady`].
    fn control_value(&self, id: ControlId) -> Result<u32>;

    fn variable(&self, var: VariableRef) -> Result<u32>;

    /// Synchronous 8-bit register read
    fn read_register(&mut self, address: u16) -> Result<u32>;
}

impl Operand {
    pub fn resolve<S: OperandSource + ?Sized>(&self, source: &mut S) -> Result<u32> {
        match *self {
            Operand::Constant(value) => Ok(value),
            Operand::Control(id) => source.control_value(id),
            Operand::Variable(var) => source.variable(var),
            Operand::Register(address) => source.read_register(address),
        }
    }
}

/// Fold `ops` over `seed`
///
/// Every operand is resolved before its operator is applied, so a failing
/// register read aborts the evaluation even under `complement`.
///
/// # Arguments
///
/// * `seed` - Initial accumulator
/// * `ops` - Operations, applied in order
/// * `source` - Live state for control, variable and register operands
///
/// # Errors
///
/// Lookup and bus errors from `source`, or [`SensorError::DivideByZero`].
pub fn evaluate<S: OperandSource + ?Sized>(seed: u32, ops: &[Operation], source: &mut S) -> Result<u32> {
    let mut acc = seed;
    for operation in ops {
        let operand = operation.operand.resolve(source)?;
        acc = operation.op.apply(acc, operand)?;
    }
    log::trace!("evaluate seed={} -> {} ({} ops)", seed, acc, ops.len());
    Ok(acc)
}

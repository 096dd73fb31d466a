use serde::{Deserialize, Serialize};
use std::fmt;

use crate::internal::common::error::RgError;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountOperator {
    #[default]
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "^")]
    Pow,
}

impl fmt::Display for CountOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CountOperator::Add => "+",
            CountOperator::Mul => "*",
            CountOperator::Pow => "^",
        };
        f.write_str(symbol)
    }
}

fn default_max() -> u32 {
    u32::MAX
}

fn default_operand() -> u32 {
    1
}

/// Requested amount of a resource.
///
/// A plain count `n` is `min = max = n`. A range walks from `min` towards `max` by
/// repeatedly applying `operator` with `operand`; the matcher picks the largest value of
/// that sequence that is available.
///
/// Deserializes either from a plain integer or from a map with `min` and optional
/// `max` (unbounded when missing), `operator` and `operand`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "CountRepr")]
pub struct Count {
    pub min: u32,
    pub max: u32,
    pub operator: CountOperator,
    pub operand: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountRepr {
    Exact(u32),
    Range {
        min: u32,
        #[serde(default = "default_max")]
        max: u32,
        #[serde(default)]
        operator: CountOperator,
        #[serde(default = "default_operand")]
        operand: u32,
    },
}

impl From<CountRepr> for Count {
    fn from(repr: CountRepr) -> Self {
        match repr {
            CountRepr::Exact(count) => Count::exact(count),
            CountRepr::Range {
                min,
                max,
                operator,
                operand,
            } => Count {
                min,
                max,
                operator,
                operand,
            },
        }
    }
}

impl Default for Count {
    fn default() -> Self {
        Count::exact(1)
    }
}

impl Count {
    pub fn exact(count: u32) -> Self {
        Count {
            min: count,
            max: count,
            operator: CountOperator::Add,
            operand: 1,
        }
    }

    pub fn range(min: u32, max: u32) -> Self {
        Count {
            min,
            max,
            operator: CountOperator::Add,
            operand: 1,
        }
    }

    pub fn with_operator(mut self, operator: CountOperator, operand: u32) -> Self {
        self.operator = operator;
        self.operand = operand;
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.min == 0 {
            return Err(RgError::InvalidSpecification(
                "count must be at least 1".into(),
            ));
        }
        if self.min > self.max {
            return Err(RgError::InvalidSpecification(format!(
                "count minimum {} is greater than maximum {}",
                self.min, self.max
            )));
        }
        let least = match self.operator {
            CountOperator::Add => 1,
            CountOperator::Mul | CountOperator::Pow => 2,
        };
        if self.min != self.max && self.operand < least {
            return Err(RgError::InvalidSpecification(format!(
                "operand {} is not valid for operator '{}'",
                self.operand, self.operator
            )));
        }
        Ok(())
    }

    fn step(&self, current: u64) -> Option<u64> {
        let operand = u64::from(self.operand);
        match self.operator {
            CountOperator::Add => current.checked_add(operand),
            CountOperator::Mul => current.checked_mul(operand),
            CountOperator::Pow => current.checked_pow(self.operand),
        }
    }

    /// Largest count of the sequence `min, step(min), ...` that does not exceed either
    /// `max` or `qualified`. Zero when even `min` does not fit.
    pub fn calc_count(&self, qualified: i64) -> i64 {
        let qualified = u64::try_from(qualified).unwrap_or(0);
        let min = u64::from(self.min);
        let max = u64::from(self.max).min(qualified);
        if self.min > self.max || min > qualified {
            return 0;
        }
        let mut count = min;
        while let Some(next) = self.step(count) {
            if next > max || next <= count {
                break;
            }
            count = next;
        }
        count as i64
    }
}

impl From<u32> for Count {
    fn from(count: u32) -> Self {
        Count::exact(count)
    }
}

/// Negative counts become zero, which fails validation.
impl From<i32> for Count {
    fn from(count: i32) -> Self {
        Count::exact(u32::try_from(count).unwrap_or(0))
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else if self.max == u32::MAX {
            write!(f, "{}+", self.min)
        } else {
            write!(
                f,
                "{}-{}:{}{}",
                self.min, self.max, self.operator, self.operand
            )
        }
    }
}

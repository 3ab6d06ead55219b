//! Value range and linear scale.

use crate::error::{ChartError, ChartResult};
use serde::Serialize;

/// Fraction of the data range added above and below the data.
const PADDING_RATIO: f64 = 0.1;

/// Padding used when a flat series sits at exactly zero.
const ZERO_FLAT_PADDING: f64 = 1.0;

/// Closed value interval with `max > min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Data min/max widened by 10% of the range on each end.
    ///
    /// A flat series is widened by 10% of its absolute value, or by 1.0 when
    /// the value is zero, so the result always has a positive span.
    pub fn padded(values: &[f64]) -> ChartResult<Self> {
        if values.is_empty() {
            return Err(ChartError::EmptySeries);
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ChartError::NonFiniteValue { index });
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });

        let span = max - min;
        let pad = if span > 0.0 {
            span * PADDING_RATIO
        } else if min != 0.0 {
            min.abs() * PADDING_RATIO
        } else {
            ZERO_FLAT_PADDING
        };

        Ok(Self {
            min: min - pad,
            max: max + pad,
        })
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Maps values onto a vertical pixel interval, `max` to `top`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub range: ValueRange,
    pub top: f64,
    pub bottom: f64,
}

impl LinearScale {
    pub fn new(range: ValueRange, top: f64, bottom: f64) -> Self {
        Self { range, top, bottom }
    }

    pub fn y(&self, value: f64) -> f64 {
        let norm = (value - self.range.min) / self.range.span();
        self.bottom - norm * (self.bottom - self.top)
    }

    pub fn value_at(&self, y: f64) -> f64 {
        let rel = (self.bottom - y) / (self.bottom - self.top);
        self.range.min + rel * self.range.span()
    }
}

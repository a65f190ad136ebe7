//! Numeric range normalization.
//!
//! Vendor data points such as `fan_speed_percent` or `bright_value` report an
//! integer inside a device specific `[min, max]` range with a fixed step. The
//! host expects the same quantity as a fraction in `[0, 1]`. Both directions
//! snap to the step grid (round half away from zero) and clamp.
//!
//! ```text
//! vendor raw ──to_normalized──▶ [0, 1]
//! host value ──to_vendor_range──▶ [min, max]   (range | fraction | percent input)
//! ```

use serde::{Deserialize, Serialize};
use tuya_bridge_core::config::defaults;

/// Numeric domain of one vendor code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeMeta {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for RangeMeta {
    fn default() -> Self {
        Self::new(defaults::RANGE_MIN, defaults::RANGE_MAX, defaults::RANGE_STEP)
    }
}

impl RangeMeta {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Width of the range. Zero or negative means the range is degenerate.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Step used for snapping; never finer than one unit.
    pub fn effective_step(&self) -> f64 {
        if self.step.is_finite() {
            self.step.max(1.0)
        } else {
            1.0
        }
    }

    fn snap(&self, value: f64) -> f64 {
        let step = self.effective_step();
        ((value - self.min) / step).round() * step + self.min
    }

    /// Vendor raw value to a host fraction in `[0, 1]`.
    ///
    /// A degenerate range yields `0`.
    pub fn to_normalized(&self, raw: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 || raw.is_nan() {
            return 0.0;
        }

        let normalized = (self.snap(raw) - self.min) / span;
        normalized.clamp(0.0, 1.0)
    }

    /// Host value to a vendor raw value in `[min, max]`.
    ///
    /// The input unit is guessed from its magnitude: values already inside
    /// `[min, max]` pass through, values `<= 1` are a fraction of the range and
    /// anything larger is a percentage. When `min <= 1` the first rule shadows
    /// the fraction rule for inputs in `[min, 1]`.
    pub fn to_vendor_range(&self, input: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 || input.is_nan() {
            return self.min;
        }

        let scaled = if input >= self.min && input <= self.max {
            input
        } else if input <= 1.0 {
            self.min + input * span
        } else {
            self.min + (input / 100.0) * span
        };

        self.snap(scaled).clamp(self.min, self.max)
    }

    /// Step of the host-side `[0, 1]` domain matching this vendor range.
    pub fn normalized_step(&self) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return 0.1;
        }
        (self.step / span).max(0.01)
    }

    /// Parse a vendor specification `values` object (`{"min":..,"max":..,"step":..}`).
    ///
    /// Missing or unparseable fields fall back to `fallback`. Numbers encoded
    /// as strings are accepted.
    pub fn from_spec_values(values: &serde_json::Value, fallback: RangeMeta) -> Self {
        Self {
            min: spec_number(values.get("min")).unwrap_or(fallback.min),
            max: spec_number(values.get("max")).unwrap_or(fallback.max),
            step: spec_number(values.get("step")).unwrap_or(fallback.step),
        }
    }
}

fn spec_number(value: Option<&serde_json::Value>) -> Option<f64> {
    let n = match value? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Free-function form of [`RangeMeta::to_normalized`].
pub fn to_normalized(raw: f64, range: &RangeMeta) -> f64 {
    range.to_normalized(raw)
}

/// Free-function form of [`RangeMeta::to_vendor_range`].
pub fn to_vendor_range(input: f64, range: &RangeMeta) -> f64 {
    range.to_vendor_range(input)
}

//! Keyframed curve with linear interpolation — the stand-in for the host's
//! sampled curves (panel power vs. distance, temperature vs. efficiency).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CurveKeys")]
pub struct FloatCurve {
    /// `(x, value)` pairs, kept sorted by x.
    keys: Vec<(f64, f64)>,
}

/// Raw wire form; conversion goes through [`FloatCurve::new`] so loaded
/// keys end up sorted no matter how the file orders them.
#[derive(Deserialize)]
struct CurveKeys {
    keys: Vec<(f64, f64)>,
}

impl From<CurveKeys> for FloatCurve {
    fn from(raw: CurveKeys) -> Self {
        Self::new(raw.keys)
    }
}

impl FloatCurve {
    pub fn new(mut keys: Vec<(f64, f64)>) -> Self {
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys }
    }

    /// A curve that evaluates to `value` everywhere.
    pub fn constant(value: f64) -> Self {
        Self {
            keys: vec![(0.0, value)],
        }
    }

    /// Sample the curve at `x`. Clamps to the end keys outside the keyed
    /// range; an empty curve evaluates to 0.
    pub fn evaluate(&self, x: f64) -> f64 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        if x <= first.0 {
            return first.1;
        }
        let last = self.keys[self.keys.len() - 1];
        if x >= last.0 {
            return last.1;
        }
        // x is strictly inside the keyed range, so a right neighbor exists.
        let hi = self.keys.partition_point(|key| key.0 < x);
        let (x0, v0) = self.keys[hi - 1];
        let (x1, v1) = self.keys[hi];
        let dx = x1 - x0;
        if dx <= 0.0 {
            return v1;
        }
        v0 + (v1 - v0) * (x - x0) / dx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_keys() {
        let curve = FloatCurve::new(vec![(0.0, 1.0), (10.0, 3.0)]);
        assert!((curve.evaluate(5.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn clamps_outside_range() {
        let curve = FloatCurve::new(vec![(0.0, 1.0), (10.0, 3.0)]);
        assert!((curve.evaluate(-5.0) - 1.0).abs() < 1e-12);
        assert!((curve.evaluate(25.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn unsorted_keys_are_sorted_on_construction() {
        let curve = FloatCurve::new(vec![(10.0, 3.0), (0.0, 1.0)]);
        assert!((curve.evaluate(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn deserialized_keys_are_sorted_before_use() {
        let curve: FloatCurve =
            serde_json::from_str(r#"{"keys":[[10.0,3.0],[0.0,1.0]]}"#).unwrap();
        assert!((curve.evaluate(0.0) - 1.0).abs() < 1e-12);
        assert!((curve.evaluate(5.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn constant_curve_ignores_x() {
        let curve = FloatCurve::constant(0.75);
        assert!((curve.evaluate(-1e9) - 0.75).abs() < 1e-12);
        assert!((curve.evaluate(1e9) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn empty_curve_evaluates_to_zero() {
        let curve = FloatCurve::new(vec![]);
        assert!(curve.evaluate(1.0).abs() < 1e-12);
    }
}

//! Piecewise-linear map between two strictly increasing coordinate systems.
//!
//! Used to carry locations (mean, median, mode) from fitting space (class
//! positions `1..=n`) back to physical class values. Inputs outside the
//! knot range have no image.

#[derive(Debug, Clone, PartialEq)]
pub struct MonotoneMap {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl MonotoneMap {
    /// Build a map from knots. Requires at least two knots, equal lengths,
    /// finite values and strictly increasing `xs`.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Option<Self> {
        if xs.len() < 2 || xs.len() != ys.len() {
            return None;
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return None;
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }
        Some(Self { xs, ys })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluate the map, or `None` when `x` lies outside the knot range.
    pub fn eval(&self, x: f64) -> Option<f64> {
        let (lo, hi) = self.domain();
        if !x.is_finite() || x < lo || x > hi {
            return None;
        }
        // First knot strictly greater than x; clamp so x == hi uses the last segment.
        let upper = self.xs.partition_point(|&k| k <= x).clamp(1, self.xs.len() - 1);
        let (x0, x1) = (self.xs[upper - 1], self.xs[upper]);
        let (y0, y1) = (self.ys[upper - 1], self.ys[upper]);
        let u = (x - x0) / (x1 - x0);
        Some(y0 + u * (y1 - y0))
    }

    /// Like [`MonotoneMap::eval`], with `NaN` for out-of-range input.
    pub fn eval_or_nan(&self, x: f64) -> f64 {
        self.eval(x).unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_classes() -> MonotoneMap {
        MonotoneMap::new(vec![1.0, 2.0, 3.0, 4.0], vec![0.1, 1.0, 10.0, 100.0]).unwrap()
    }

    #[test]
    fn hits_knots_and_interpolates_between() {
        let map = log_classes();
        assert_eq!(map.eval(1.0), Some(0.1));
        assert_eq!(map.eval(4.0), Some(100.0));
        assert!((map.eval(2.5).unwrap() - 5.5).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_has_no_image() {
        let map = log_classes();
        assert_eq!(map.eval(0.99), None);
        assert_eq!(map.eval(4.01), None);
        assert_eq!(map.eval(f64::NAN), None);
        assert!(map.eval_or_nan(0.0).is_nan());
    }

    #[test]
    fn rejects_non_increasing_knots() {
        assert!(MonotoneMap::new(vec![1.0, 1.0], vec![0.0, 1.0]).is_none());
        assert!(MonotoneMap::new(vec![1.0], vec![0.0]).is_none());
        assert!(MonotoneMap::new(vec![1.0, 2.0], vec![0.0]).is_none());
    }
}

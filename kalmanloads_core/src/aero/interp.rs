// kalmanloads_core/src/aero/interp.rs

use nalgebra::DMatrix;

use crate::error::{EstimatorError, Result};

/// Index `i` such that `xs[i] <= x <= xs[i + 1]`, clamped to the first and
/// last interval. `xs` must be strictly increasing with at least 2 knots.
pub fn find_interval(xs: &[f64], x: f64) -> usize {
    let last = xs.len() - 2;
    match xs.partition_point(|&k| k <= x) {
        0 => 0,
        p => (p - 1).min(last),
    }
}

/// Piecewise-linear interpolation that holds the end values outside the knots.
pub fn interp1(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    match xs.len() {
        0 => f64::NAN,
        1 => ys[0],
        _ => {
            if x <= xs[0] {
                return ys[0];
            }
            if x >= xs[xs.len() - 1] {
                return ys[ys.len() - 1];
            }
            let i = find_interval(xs, x);
            let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
            ys[i] + t * (ys[i + 1] - ys[i])
        }
    }
}

/// A surface `z = f(x, y)` tabulated on a rectangular grid.
///
/// `values[(i, j)]` holds the value at `(xs[i], ys[j])`. Queries outside the
/// grid are errors rather than extrapolations.
#[derive(Debug, Clone, PartialEq)]
pub struct BilinearTable {
    xs: Vec<f64>,
    ys: Vec<f64>,
    values: DMatrix<f64>,
    x_name: &'static str,
    y_name: &'static str,
}

impl BilinearTable {
    pub fn new(
        xs: Vec<f64>,
        ys: Vec<f64>,
        values: DMatrix<f64>,
        x_name: &'static str,
        y_name: &'static str,
    ) -> Result<Self> {
        validate_knots(x_name, &xs)?;
        validate_knots(y_name, &ys)?;
        if values.shape() != (xs.len(), ys.len()) {
            return Err(EstimatorError::InvalidTable {
                reason: format!(
                    "surface is {}x{}, grid is {}x{} ({} x {})",
                    values.nrows(),
                    values.ncols(),
                    xs.len(),
                    ys.len(),
                    x_name,
                    y_name
                ),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EstimatorError::InvalidTable {
                reason: "surface contains non-finite values".into(),
            });
        }
        Ok(Self {
            xs,
            ys,
            values,
            x_name,
            y_name,
        })
    }

    pub fn x_range(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn y_range(&self) -> (f64, f64) {
        (self.ys[0], self.ys[self.ys.len() - 1])
    }

    pub fn contains_x(&self, x: f64) -> bool {
        let (lo, hi) = self.x_range();
        x >= lo && x <= hi
    }

    pub fn check_y(&self, y: f64) -> Result<()> {
        let (min, max) = self.y_range();
        if !(y >= min && y <= max) {
            return Err(EstimatorError::LookupOutOfTable {
                what: self.y_name,
                value: y,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Evaluate the surface at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> Result<f64> {
        if !self.contains_x(x) {
            let (min, max) = self.x_range();
            return Err(EstimatorError::LookupOutOfTable {
                what: self.x_name,
                value: x,
                min,
                max,
            });
        }
        self.check_y(y)?;

        let ix = find_interval(&self.xs, x);
        let iy = find_interval(&self.ys, y);
        let tx = (x - self.xs[ix]) / (self.xs[ix + 1] - self.xs[ix]);
        let ty = (y - self.ys[iy]) / (self.ys[iy + 1] - self.ys[iy]);
        let z00 = self.values[(ix, iy)];
        let z10 = self.values[(ix + 1, iy)];
        let z01 = self.values[(ix, iy + 1)];
        let z11 = self.values[(ix + 1, iy + 1)];
        Ok((1.0 - tx) * (1.0 - ty) * z00
            + tx * (1.0 - ty) * z10
            + (1.0 - tx) * ty * z01
            + tx * ty * z11)
    }
}

fn validate_knots(name: &str, knots: &[f64]) -> Result<()> {
    if knots.len() < 2 {
        return Err(EstimatorError::InvalidTable {
            reason: format!("{name} grid needs at least 2 knots"),
        });
    }
    if knots.iter().any(|k| !k.is_finite()) || knots.windows(2).any(|w| w[1] <= w[0]) {
        return Err(EstimatorError::InvalidTable {
            reason: format!("{name} grid must be finite and strictly increasing"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interp1_holds_end_values() {
        let xs = [0.0, 1.0, 3.0];
        let ys = [0.0, 10.0, 30.0];
        assert_relative_eq!(interp1(&xs, &ys, -1.0), 0.0);
        assert_relative_eq!(interp1(&xs, &ys, 0.5), 5.0);
        assert_relative_eq!(interp1(&xs, &ys, 2.0), 20.0);
        assert_relative_eq!(interp1(&xs, &ys, 3.0), 30.0);
        assert_relative_eq!(interp1(&xs, &ys, 7.0), 30.0);
    }

    #[test]
    fn bilinear_reproduces_plane() {
        // z = x + 2y is reproduced exactly by bilinear interpolation.
        let xs = vec![0.0, 1.0, 2.0];
        let ys = vec![-1.0, 0.0, 4.0];
        let values = DMatrix::from_fn(3, 3, |i, j| xs[i] + 2.0 * ys[j]);
        let table = BilinearTable::new(xs, ys, values, "x", "y").unwrap();

        assert_relative_eq!(table.eval(0.5, 2.0).unwrap(), 4.5, epsilon = 1e-12);
        assert_relative_eq!(table.eval(2.0, 4.0).unwrap(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(table.eval(1.25, -0.5).unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn out_of_grid_queries_fail() {
        let table = BilinearTable::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            DMatrix::zeros(2, 2),
            "tip speed ratio",
            "pitch",
        )
        .unwrap();
        assert!(matches!(
            table.eval(1.5, 0.5),
            Err(EstimatorError::LookupOutOfTable { what: "tip speed ratio", .. })
        ));
        assert!(matches!(
            table.eval(0.5, -0.1),
            Err(EstimatorError::LookupOutOfTable { what: "pitch", .. })
        ));
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let err = BilinearTable::new(vec![0.0, 1.0], vec![0.0, 1.0, 2.0], DMatrix::zeros(2, 2), "x", "y");
        assert!(matches!(err, Err(EstimatorError::InvalidTable { .. })));
    }
}

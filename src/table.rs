// N-dimensional interpolation tables on uniform grids

use crate::error::{ConfigError, TableError};
use crate::fourvec::{FourVec, Scalar, Tensor};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::ops::{Add, Mul};
use std::sync::Arc;

/// Values that can be stored in an [`InterpolationTable`].
///
/// Multilinear interpolation only needs addition and scaling by a weight.
pub trait TableValue:
    Copy + Send + Sync + Serialize + DeserializeOwned + Add<Output = Self> + Mul<f64, Output = Self>
{
    fn zero() -> Self;
    fn is_finite(&self) -> bool;
}

impl TableValue for Scalar {
    fn zero() -> Self {
        Scalar(0.0)
    }
    fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

impl TableValue for FourVec {
    fn zero() -> Self {
        FourVec::zero()
    }
    fn is_finite(&self) -> bool {
        self.components().iter().all(|c| c.is_finite())
    }
}

impl TableValue for Tensor {
    fn zero() -> Self {
        Tensor::zero()
    }
    fn is_finite(&self) -> bool {
        self.rows().iter().flatten().all(|c| c.is_finite())
    }
}

/// Uniform grid: `shape[d]` points spanning `[lower[d], upper[d]]` in each dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid<const N: usize> {
    pub lower: [f64; N],
    pub upper: [f64; N],
    pub shape: [usize; N],
}

impl<const N: usize> Grid<N> {
    pub fn new(lower: [f64; N], upper: [f64; N], shape: [usize; N]) -> Result<Self, ConfigError> {
        for d in 0..N {
            let reason = if shape[d] == 0 {
                Some(format!("dimension {} has no grid points", d))
            } else if !(lower[d].is_finite() && upper[d].is_finite()) {
                Some(format!("dimension {} has non-finite bounds", d))
            } else if shape[d] > 1 && upper[d] <= lower[d] {
                Some(format!("dimension {} has upper bound {} <= lower bound {}", d, upper[d], lower[d]))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ConfigError::InvalidGrid {
                    table: format!("{:?}..{:?}", lower, upper),
                    reason,
                });
            }
        }
        Ok(Self { lower, upper, shape })
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn step(&self, d: usize) -> f64 {
        if self.shape[d] > 1 {
            (self.upper[d] - self.lower[d]) / (self.shape[d] - 1) as f64
        } else {
            0.0
        }
    }

    /// Multi-index of a flat index; the last dimension varies fastest.
    pub fn unravel(&self, mut index: usize) -> [usize; N] {
        let mut idx = [0usize; N];
        for d in (0..N).rev() {
            idx[d] = index % self.shape[d];
            index /= self.shape[d];
        }
        idx
    }

    pub fn ravel(&self, idx: &[usize; N]) -> usize {
        idx.iter().zip(self.shape.iter()).fold(0, |acc, (i, n)| acc * n + i)
    }

    /// Parameter values at a grid point.
    pub fn point(&self, idx: &[usize; N]) -> [f64; N] {
        std::array::from_fn(|d| self.lower[d] + idx[d] as f64 * self.step(d))
    }

    pub fn contains(&self, params: &[f64; N]) -> bool {
        (0..N).all(|d| params[d] >= self.lower[d] && params[d] <= self.upper[d])
    }

    /// Largest of `values` over each grid point and its neighbours one step
    /// away along any combination of axes.
    ///
    /// Every vertex of a cell then holds at least the maximum over that cell,
    /// so a multilinear interpolation inside it is never below any of its
    /// vertices. Non-finite values are kept as they are.
    pub fn neighbourhood_max(&self, values: &[f64]) -> Vec<f64> {
        let offsets = 3usize.pow(N as u32);
        (0..values.len())
            .map(|i| {
                let centre = self.unravel(i);
                let mut best = values[i];
                if !best.is_finite() {
                    return best;
                }
                for offset in 0..offsets {
                    let mut idx = centre;
                    let mut rest = offset;
                    let mut inside = true;
                    for d in 0..N {
                        match (centre[d] + rest % 3).checked_sub(1) {
                            Some(j) if j < self.shape[d] => idx[d] = j,
                            _ => inside = false,
                        }
                        rest /= 3;
                    }
                    if inside {
                        if let Some(v) = values.get(self.ravel(&idx)) {
                            best = best.max(*v);
                        }
                    }
                }
                best
            })
            .collect()
    }

    /// Evaluate `generator` at every grid point, in parallel.
    ///
    /// Each point is evaluated exactly once and the results come back in
    /// flat-index order.
    pub fn tabulate<T, G>(&self, generator: G) -> Vec<T>
    where
        T: Send,
        G: Fn(&[f64; N]) -> T + Sync,
    {
        (0..self.len())
            .into_par_iter()
            .map(|i| generator(&self.point(&self.unravel(i))))
            .collect()
    }
}

/// Fallback evaluated outside the grid or before the table is filled.
pub type ApproxFn<T, const N: usize> = Arc<dyn Fn(&[f64; N]) -> T + Send + Sync>;

/// Values of type `T` cached on an N-dimensional grid.
///
/// Inside the grid, values are interpolated multilinearly. Outside the grid,
/// the approximate function is used when one is installed, otherwise each
/// coordinate is clamped to the nearest grid edge. Before [`fill`](Self::fill),
/// only the approximate function can answer.
pub struct InterpolationTable<T: TableValue, const N: usize> {
    name: String,
    grid: Grid<N>,
    values: Option<Vec<T>>,
    approx: Option<ApproxFn<T, N>>,
}

impl<T: TableValue, const N: usize> InterpolationTable<T, N> {
    pub fn new(name: impl Into<String>, grid: Grid<N>) -> Self {
        Self {
            name: name.into(),
            grid,
            values: None,
            approx: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &Grid<N> {
        &self.grid
    }

    pub fn is_filled(&self) -> bool {
        self.values.is_some()
    }

    pub fn values(&self) -> Option<&[T]> {
        self.values.as_deref()
    }

    pub fn set_approximate_function<F>(&mut self, f: F)
    where
        F: Fn(&[f64; N]) -> T + Send + Sync + 'static,
    {
        self.approx = Some(Arc::new(f));
    }

    pub fn has_approx(&self) -> bool {
        self.approx.is_some()
    }

    pub fn get_approx(&self, params: &[f64; N]) -> Option<T> {
        self.approx.as_ref().map(|f| f(params))
    }

    /// Install precomputed grid values (flat-index order, see [`Grid::tabulate`]).
    pub fn fill(&mut self, values: Vec<T>) -> Result<(), TableError> {
        if values.len() != self.grid.len() {
            return Err(TableError::ShapeMismatch {
                table: self.name.clone(),
                expected: self.grid.len(),
                provided: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(TableError::NonFinite {
                table: self.name.clone(),
                index,
            });
        }
        self.values = Some(values);
        Ok(())
    }

    /// Tabulate `generator` over the grid and install the result.
    pub fn fill_with<G>(&mut self, generator: G) -> Result<(), TableError>
    where
        G: Fn(&[f64; N]) -> T + Sync,
    {
        let values = self.grid.tabulate(generator);
        self.fill(values)
    }

    /// Value at `params` following the boundary policy described on the type.
    ///
    /// # Panics
    /// If the table is unfilled and has no approximate function.
    pub fn interpolate(&self, params: &[f64; N]) -> T {
        match self.try_interpolate(params) {
            Ok(value) => value,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_interpolate(&self, params: &[f64; N]) -> Result<T, TableError> {
        let values = match &self.values {
            Some(values) => values,
            None => {
                return self
                    .get_approx(params)
                    .ok_or_else(|| TableError::NotFilled(self.name.clone()))
            }
        };
        if !self.grid.contains(params) {
            if let Some(value) = self.get_approx(params) {
                return Ok(value);
            }
        }
        Ok(self.multilinear(values, params))
    }

    fn multilinear(&self, values: &[T], params: &[f64; N]) -> T {
        let mut base = [0usize; N];
        let mut frac = [0.0f64; N];
        for d in 0..N {
            let n = self.grid.shape[d];
            if n < 2 {
                continue;
            }
            let u = ((params[d] - self.grid.lower[d]) / self.grid.step(d)).clamp(0.0, (n - 1) as f64);
            let i = (u.floor() as usize).min(n - 2);
            base[d] = i;
            frac[d] = u - i as f64;
        }

        let mut result = T::zero();
        for corner in 0..(1usize << N) {
            let mut weight = 1.0;
            let mut idx = base;
            for d in 0..N {
                if corner & (1 << d) != 0 {
                    if self.grid.shape[d] < 2 {
                        weight = 0.0;
                        break;
                    }
                    idx[d] += 1;
                    weight *= frac[d];
                } else {
                    weight *= 1.0 - frac[d];
                }
            }
            if weight != 0.0 {
                result = result + values[self.grid.ravel(&idx)] * weight;
            }
        }
        result
    }
}

impl<T: TableValue, const N: usize> fmt::Debug for InterpolationTable<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpolationTable")
            .field("name", &self.name)
            .field("grid", &self.grid)
            .field("filled", &self.is_filled())
            .field("approx", &self.approx.is_some())
            .finish()
    }
}

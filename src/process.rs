// Common shape of tabulated stochastic processes
//
// A process tabulates the integrated probability of an event (zero moment),
// the first and second moments of the heavy-quark momentum transfer, and an
// upper bound of the differential probability used for rejection sampling.

use crate::error::{SampleError, TableError};
use crate::fourvec::{FourVec, Scalar, Tensor};
use crate::store::TableStore;
use crate::table::{Grid, InterpolationTable, TableValue};
use rand::Rng;
use std::path::Path;

/// Values of the four tables at one parameter point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub zero: Scalar,
    pub first: FourVec,
    pub second: Tensor,
    pub fmax: Scalar,
}

/// The four tables of a process, sharing one grid.
#[derive(Debug)]
pub struct MomentTables<const N: usize> {
    pub zero: InterpolationTable<Scalar, N>,
    pub first: InterpolationTable<FourVec, N>,
    pub second: InterpolationTable<Tensor, N>,
    pub fmax: InterpolationTable<Scalar, N>,
}

impl<const N: usize> MomentTables<N> {
    /// Tables named `<prefix>/zero`, `<prefix>/first`, `<prefix>/second`, `<prefix>/fmax`.
    pub fn new(prefix: &str, grid: Grid<N>) -> Self {
        Self {
            zero: InterpolationTable::new(format!("{}/zero", prefix), grid),
            first: InterpolationTable::new(format!("{}/first", prefix), grid),
            second: InterpolationTable::new(format!("{}/second", prefix), grid),
            fmax: InterpolationTable::new(format!("{}/fmax", prefix), grid),
        }
    }

    pub fn grid(&self) -> &Grid<N> {
        self.zero.grid()
    }

    /// Install per-point moments produced by [`Grid::tabulate`].
    ///
    /// The envelope table stores the largest `fmax` among each point and its
    /// grid neighbours, see [`Grid::neighbourhood_max`].
    pub fn fill(&mut self, points: Vec<Moments>) -> Result<(), TableError> {
        self.zero.fill(points.iter().map(|m| m.zero).collect())?;
        self.first.fill(points.iter().map(|m| m.first).collect())?;
        self.second.fill(points.iter().map(|m| m.second).collect())?;
        let fmax: Vec<f64> = points.iter().map(|m| m.fmax.value()).collect();
        let widened = self.grid().neighbourhood_max(&fmax);
        self.fmax.fill(widened.into_iter().map(Scalar).collect())
    }

    /// Write every filled table.
    pub fn save(&self, store: &TableStore) -> Result<(), TableError> {
        save_filled(store, &self.zero)?;
        save_filled(store, &self.first)?;
        save_filled(store, &self.second)?;
        save_filled(store, &self.fmax)
    }

    /// Restore every table. A table backed by an approximate function may be
    /// absent from the store; any other missing table is an error.
    pub fn load(&mut self, store: &TableStore) -> Result<(), TableError> {
        load_table(store, &mut self.zero)?;
        load_table(store, &mut self.first)?;
        load_table(store, &mut self.second)?;
        load_table(store, &mut self.fmax)
    }
}

fn save_filled<T: TableValue, const N: usize>(
    store: &TableStore,
    table: &InterpolationTable<T, N>,
) -> Result<(), TableError> {
    if table.is_filled() {
        store.save(table)?;
    }
    Ok(())
}

fn load_table<T: TableValue, const N: usize>(
    store: &TableStore,
    table: &mut InterpolationTable<T, N>,
) -> Result<(), TableError> {
    match store.load(table) {
        Err(TableError::Missing { .. }) if table.has_approx() => Ok(()),
        other => other,
    }
}

/// A process whose probability and moments are tabulated over `N` parameters
/// and whose final states can be sampled exactly.
///
/// After `init` or `load` a process is only read, so it can be shared across
/// threads; randomness always comes from the caller's generator.
pub trait StochasticProcess<const N: usize>: Send + Sync {
    fn name(&self) -> &str;

    fn is_active(&self) -> bool;

    fn tables(&self) -> &MomentTables<N>;

    fn tables_mut(&mut self) -> &mut MomentTables<N>;

    /// Fill the tables by integrating the differential probability at every grid point.
    fn compute(&mut self) -> Result<(), TableError>;

    /// Draw final-state momenta for `params` into `final_states`.
    fn sample<R: Rng + ?Sized>(
        &self,
        params: &[f64; N],
        rng: &mut R,
        final_states: &mut Vec<FourVec>,
    ) -> Result<(), SampleError>;

    fn get_zero_m(&self, params: &[f64; N]) -> Scalar {
        self.tables().zero.interpolate(params)
    }

    fn get_first_m(&self, params: &[f64; N]) -> FourVec {
        self.tables().first.interpolate(params)
    }

    fn get_second_m(&self, params: &[f64; N]) -> Tensor {
        self.tables().second.interpolate(params)
    }

    fn get_fmax(&self, params: &[f64; N]) -> Scalar {
        self.tables().fmax.interpolate(params)
    }

    /// Compute the tables and persist them to the store at `path`.
    fn init(&mut self, path: &Path) -> Result<(), TableError> {
        log::info!("Computing tables for {}", self.name());
        self.compute()?;
        self.tables().save(&TableStore::new(path))?;
        log::info!("Saved tables for {} to {}", self.name(), path.display());
        Ok(())
    }

    /// Restore the tables from the store at `path`.
    fn load(&mut self, path: &Path) -> Result<(), TableError> {
        self.tables_mut().load(&TableStore::new(path))?;
        log::info!("Loaded tables for {} from {}", self.name(), path.display());
        Ok(())
    }
}

/// Keep only the parts of a momentum-transfer moment that survive averaging
/// over rotations about the z axis.
pub fn azimuthal_average_vec(v: FourVec) -> FourVec {
    FourVec::new(v.t(), 0.0, 0.0, v.z())
}

/// Diagonal of a second moment averaged over rotations about the z axis.
pub fn azimuthal_average_tensor(t: &Tensor) -> Tensor {
    let [tt, xx, yy, zz] = t.diagonal_components();
    let transverse = 0.5 * (xx + yy);
    Tensor::diagonal([tt, transverse, transverse, zz])
}

/// Deterministic seed for the Monte Carlo integral at one grid point, so table
/// contents do not depend on thread scheduling.
pub fn point_seed(base: u64, params: &[f64]) -> u64 {
    params.iter().fold(base ^ 0x9e37_79b9_7f4a_7c15, |h, p| {
        (h.rotate_left(23) ^ p.to_bits()).wrapping_mul(0x2545_f491_4f6c_dd1d)
    })
}

// Thermal scattering rates of a heavy quark in a static medium
//
// A rate folds a partonic cross section with the Boltzmann distribution of
// massless medium partons. Parameters are the heavy-quark energy E and the
// temperature T in the medium rest frame, plus the time since the last
// emission for the radiative channels. Sampled momenta are returned in the
// medium frame with the incoming heavy quark along +z.

use crate::config::{IntegrationSettings, Settings};
use crate::error::{ConfigError, SampleError, TableError};
use crate::fourvec::{FourVec, Scalar, Tensor};
use crate::integrate::{Cubature, Vegas};
use crate::minimize::{maximize_density, NelderMead, ENVELOPE_SAFETY};
use crate::process::{
    azimuthal_average_tensor, azimuthal_average_vec, point_seed, MomentTables, Moments, StochasticProcess,
};
use crate::sampler::RejectionSampler;
use crate::table::Grid;
use crate::xsection::{KernelParams, ScatteringEvent, ThreeBodyState, Xsection, DEFAULT_DT_MAX, DEFAULT_T_RANGE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::Path;

/// Upper end of the default energy axis, GeV
pub const DEFAULT_E_MAX: f64 = 50.0;

/// Sampling box in (x = ln(1 + E2/T), cos theta).
const THERMAL_BOUNDS: [[f64; 2]; 2] = [[0.0, 3.0], [-1.0, 1.0]];

/// Heavy quark of energy `e` in a medium of temperature `temp`.
#[derive(Debug, Clone, Copy)]
struct Thermal {
    mass: f64,
    e: f64,
    v1: f64,
    temp: f64,
}

/// A medium parton of energy `e2` at polar angle `acos(cos)` and azimuth `phi`
/// relative to the heavy quark, and the resulting pair invariants.
#[derive(Debug, Clone, Copy)]
struct Pair {
    e2: f64,
    s: f64,
    sqrts: f64,
    vcom: [f64; 3],
}

impl Thermal {
    fn new(mass: f64, e: f64, temp: f64) -> Option<Self> {
        if !(e > mass && temp > 0.0) {
            return None;
        }
        let v1 = (1.0 - (mass / e).powi(2)).sqrt();
        Some(Self { mass, e, v1, temp })
    }

    fn p1(&self) -> FourVec {
        FourVec::new(self.e, 0.0, 0.0, self.v1 * self.e)
    }

    /// Largest E2 reached by the sampling box.
    fn e2_max(&self) -> f64 {
        self.temp * (THERMAL_BOUNDS[0][1].exp() - 1.0)
    }

    fn pair(&self, e2: f64, cos: f64, phi: f64) -> Option<Pair> {
        if !(e2 > 0.0) || !(-1.0..=1.0).contains(&cos) {
            return None;
        }
        let s = 2.0 * e2 * self.e * (1.0 - self.v1 * cos) + self.mass * self.mass;
        let sin = (1.0 - cos * cos).sqrt();
        let total = self.e + e2;
        Some(Pair {
            e2,
            s,
            sqrts: s.sqrt(),
            vcom: [
                e2 * sin * phi.cos() / total,
                e2 * sin * phi.sin() / total,
                (e2 * cos + self.v1 * self.e) / total,
            ],
        })
    }

    /// Boltzmann weight and flux of the pair, without the cross section.
    fn weight(&self, pair: &Pair) -> f64 {
        pair.e2 * (-pair.e2 / self.temp).exp() * (pair.s - self.mass * self.mass) * 2.0
            / (16.0 * PI * PI * self.e)
    }

    /// Time since the last emission seen from the pair rest frame.
    fn dt_com(&self, delta_t: f64, pair: &Pair) -> f64 {
        let [vx, vy, vz] = pair.vcom;
        FourVec::new(delta_t, 0.0, 0.0, delta_t * self.v1)
            .boost_to(vx, vy, vz)
            .t()
    }

    /// Differential rate in (x, cos theta) including dE2/dx = E2 + T.
    fn density<S>(&self, x: &[f64; 2], sigma_at: &S) -> f64
    where
        S: Fn(&Pair) -> f64,
    {
        let e2 = self.temp * (x[0].exp() - 1.0);
        match self.pair(e2, x[1], 0.0) {
            Some(pair) => {
                let value = self.weight(&pair) * sigma_at(&pair) * (e2 + self.temp);
                if value.is_finite() && value > 0.0 {
                    value
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// Envelope of [`density`](Self::density), safety factor included.
    fn find_max<S>(&self, sigma_at: &S) -> f64
    where
        S: Fn(&Pair) -> f64,
    {
        let (_, max) = maximize_density(
            |x| self.density(&[x[0], x[1]], sigma_at),
            &THERMAL_BOUNDS,
            &[vec![1.0, 0.0]],
            6,
            &NelderMead::default(),
        );
        max * ENVELOPE_SAFETY
    }

    /// Rate and momentum-transfer moments, integrated over E2 and cos theta.
    ///
    /// `xsection_at` returns the cross section and its moments in the
    /// canonical frame of the pair; they are rotated and boosted to the medium
    /// frame before accumulation. Components are
    /// (R, <dp_t>, <dp_z>, <dp_t^2>, <dp_x^2> = <dp_y^2>, <dp_z^2>).
    fn moments<X>(&self, cubature: &Cubature, xsection_at: X) -> [f64; 6]
    where
        X: Fn(&Pair) -> (Scalar, FourVec, Tensor),
    {
        let p1 = self.p1();
        let estimate = cubature.integrate(
            |x| {
                let Some(pair) = self.pair(x[0], x[1], 0.0) else {
                    return [0.0; 6];
                };
                let (sigma, first, second) = xsection_at(&pair);
                let w = self.weight(&pair);
                let [vx, vy, vz] = pair.vcom;
                let axis = p1.boost_to(vx, vy, vz);
                let first = azimuthal_average_vec(first.rotate_back(&axis).boost_back(vx, vy, vz));
                let second = azimuthal_average_tensor(&second.rotate_back(&axis).boost_back(vx, vy, vz));
                let [tt, xx, _, zz] = second.diagonal_components();
                [
                    w * sigma.value(),
                    w * first.t(),
                    w * first.z(),
                    w * tt,
                    w * xx,
                    w * zz,
                ]
            },
            &[0.0, -1.0],
            &[self.e2_max(), 1.0],
        );
        estimate.value
    }

    /// Move an event from the pair's canonical frame to the medium frame.
    fn to_medium(&self, pair: &Pair, event: ScatteringEvent) -> ScatteringEvent {
        let [vx, vy, vz] = pair.vcom;
        let axis = self.p1().boost_to(vx, vy, vz);
        let transform = |p: FourVec| p.rotate_back(&axis).boost_back(vx, vy, vz);
        ScatteringEvent {
            incoming: event.incoming.into_iter().map(transform).collect(),
            outgoing: event.outgoing.into_iter().map(transform).collect(),
        }
    }
}

fn split_moments(m: [f64; 6]) -> (Scalar, FourVec, Tensor) {
    (
        Scalar(m[0]),
        FourVec::new(m[1], 0.0, 0.0, m[2]),
        Tensor::diagonal([m[3], m[4], m[4], m[5]]),
    )
}

/// Rate of one process tabulated over `N1` parameters, built on a cross
/// section tabulated over `N2` parameters.
pub struct Rate<const N1: usize, const N2: usize, F> {
    name: String,
    mass: f64,
    active: bool,
    x: Xsection<N2, F>,
    tables: MomentTables<N1>,
    integration: IntegrationSettings,
    sampler: RejectionSampler,
}

impl<const N1: usize, const N2: usize, F> Rate<N1, N2, F> {
    fn build<G>(name: &str, settings: &Settings, x: Xsection<N2, F>, default_grid: G) -> Result<Self, ConfigError>
    where
        G: FnOnce(f64) -> Result<Grid<N1>, ConfigError>,
    {
        let process = settings.process(name)?;
        let grid = process.rate_grid(default_grid(process.mass)?)?;
        let integration = settings.integration(&process.model)?;
        let prefix = format!("{}/rate", process.name());
        Ok(Self {
            tables: MomentTables::new(&prefix, grid),
            name: prefix,
            mass: process.mass,
            active: process.active,
            x,
            sampler: RejectionSampler::new(integration.max_trials),
            integration,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn xsection(&self) -> &Xsection<N2, F> {
        &self.x
    }

    fn cubature(&self) -> Cubature {
        Cubature::new(self.integration.rel_tol, self.integration.max_evals)
    }

    fn thermal(&self, e: f64, temp: f64) -> Option<Thermal> {
        Thermal::new(self.mass, e, temp)
    }

    fn envelope_hint(&self, params: &[f64; N1]) -> Option<f64> {
        let fmax = &self.tables.fmax;
        (fmax.is_filled() && fmax.grid().contains(params)).then(|| fmax.interpolate(params).value())
    }

    /// Rejection-sample (E2, cos theta) and attach a uniform azimuth.
    fn draw_pair<S, R>(&self, th: &Thermal, params: &[f64; N1], sigma_at: S, rng: &mut R) -> Result<Pair, SampleError>
    where
        S: Fn(&Pair) -> f64,
        R: Rng + ?Sized,
    {
        let draw = self.sampler.sample_or_retry(
            |x: &[f64; 2]| th.density(x, &sigma_at),
            &THERMAL_BOUNDS,
            self.envelope_hint(params),
            || th.find_max(&sigma_at),
            rng,
        )?;
        let e2 = th.temp * (draw.point[0].exp() - 1.0);
        let phi = 2.0 * PI * rng.gen::<f64>();
        th.pair(e2, draw.point[1], phi)
            .ok_or(SampleError::ClosedPhaseSpace { sqrts: th.e })
    }
}

macro_rules! impl_process_plumbing {
    ($n:literal) => {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn tables(&self) -> &MomentTables<$n> {
            &self.tables
        }

        fn tables_mut(&mut self) -> &mut MomentTables<$n> {
            &mut self.tables
        }
    };
}

/*------------------------------ 2 -> 2 ------------------------------*/

impl<F> Rate<2, 2, F>
where
    F: Fn(f64, &KernelParams) -> f64 + Send + Sync,
{
    pub fn new(name: &str, settings: &Settings, kernel: F) -> Result<Self, ConfigError> {
        let x = Xsection::<2, F>::new(name, settings, kernel)?;
        Self::build(name, settings, x, |mass| {
            Grid::new([mass + 0.1, DEFAULT_T_RANGE[0]], [DEFAULT_E_MAX, DEFAULT_T_RANGE[1]], [40, 10])
        })
    }

    pub fn init_x(&mut self, path: &Path) -> Result<(), TableError> {
        self.x.init(path)
    }

    pub fn load_x(&mut self, path: &Path) -> Result<(), TableError> {
        self.x.load(path)
    }

    fn sigma(&self, temp: f64) -> impl Fn(&Pair) -> f64 + '_ {
        move |pair: &Pair| self.x.get_zero_m(&[pair.sqrts, temp]).value()
    }

    fn integrate_moments(&self, params: &[f64; 2]) -> [f64; 6] {
        let [e, temp] = *params;
        let Some(th) = self.thermal(e, temp) else {
            return [0.0; 6];
        };
        th.moments(&self.cubature(), |pair| {
            let xp = [pair.sqrts, temp];
            (self.x.get_zero_m(&xp), self.x.get_first_m(&xp), self.x.get_second_m(&xp))
        })
    }

    pub fn calculate_scalar(&self, params: &[f64; 2]) -> Scalar {
        split_moments(self.integrate_moments(params)).0
    }

    pub fn calculate_fourvec(&self, params: &[f64; 2]) -> FourVec {
        split_moments(self.integrate_moments(params)).1
    }

    pub fn calculate_tensor(&self, params: &[f64; 2]) -> Tensor {
        split_moments(self.integrate_moments(params)).2
    }

    /// Differential rate in (ln(1 + E2/T), cos theta); zero outside the physical region.
    pub fn differential(&self, params: &[f64; 2], x: &[f64; 2]) -> f64 {
        let [e, temp] = *params;
        match self.thermal(e, temp) {
            Some(th) => th.density(x, &self.sigma(temp)),
            None => 0.0,
        }
    }

    pub fn find_max(&self, params: &[f64; 2]) -> Scalar {
        let [e, temp] = *params;
        match self.thermal(e, temp) {
            Some(th) => Scalar(th.find_max(&self.sigma(temp))),
            None => Scalar(0.0),
        }
    }

    fn moments_at(&self, params: &[f64; 2]) -> Moments {
        let (zero, first, second) = split_moments(self.integrate_moments(params));
        Moments {
            zero,
            first,
            second,
            fmax: self.find_max(params),
        }
    }

    /// Sample a scattering in the medium frame, heavy quark along +z.
    pub fn sample_event<R: Rng + ?Sized>(
        &self,
        params: &[f64; 2],
        rng: &mut R,
    ) -> Result<ScatteringEvent, SampleError> {
        let [e, temp] = *params;
        let th = self
            .thermal(e, temp)
            .ok_or(SampleError::ClosedPhaseSpace { sqrts: e })?;
        let pair = self.draw_pair(&th, params, self.sigma(temp), rng)?;
        let event = self.x.sample_event(&[pair.sqrts, temp], rng)?;
        Ok(th.to_medium(&pair, event))
    }
}

impl<F> StochasticProcess<2> for Rate<2, 2, F>
where
    F: Fn(f64, &KernelParams) -> f64 + Send + Sync,
{
    impl_process_plumbing!(2);

    fn compute(&mut self) -> Result<(), TableError> {
        let grid = *self.tables.grid();
        let points = grid.tabulate(|p| self.moments_at(p));
        self.tables.fill(points)
    }

    fn sample<R: Rng + ?Sized>(
        &self,
        params: &[f64; 2],
        rng: &mut R,
        final_states: &mut Vec<FourVec>,
    ) -> Result<(), SampleError> {
        let event = self.sample_event(params, rng)?;
        final_states.clear();
        final_states.extend(event.outgoing);
        Ok(())
    }
}

/*------------------------------ 2 -> 3 ------------------------------*/

impl<F> Rate<3, 3, F>
where
    F: Fn(&ThreeBodyState, &KernelParams) -> f64 + Send + Sync,
{
    pub fn new(name: &str, settings: &Settings, kernel: F) -> Result<Self, ConfigError> {
        let x = Xsection::<3, F>::new(name, settings, kernel)?;
        Self::build(name, settings, x, |mass| {
            Grid::new(
                [mass + 0.1, DEFAULT_T_RANGE[0], 0.1],
                [DEFAULT_E_MAX, DEFAULT_T_RANGE[1], DEFAULT_DT_MAX],
                [20, 8, 10],
            )
        })
    }

    pub fn init_x(&mut self, path: &Path) -> Result<(), TableError> {
        self.x.init(path)
    }

    pub fn load_x(&mut self, path: &Path) -> Result<(), TableError> {
        self.x.load(path)
    }

    fn sigma<'a>(&'a self, th: &'a Thermal, temp: f64, delta_t: f64) -> impl Fn(&Pair) -> f64 + 'a {
        move |pair: &Pair| {
            let xp = [pair.sqrts, temp, th.dt_com(delta_t, pair)];
            self.x.get_zero_m(&xp).value()
        }
    }

    fn integrate_moments(&self, params: &[f64; 3]) -> [f64; 6] {
        let [e, temp, delta_t] = *params;
        let Some(th) = self.thermal(e, temp) else {
            return [0.0; 6];
        };
        th.moments(&self.cubature(), |pair| {
            let xp = [pair.sqrts, temp, th.dt_com(delta_t, pair)];
            (self.x.get_zero_m(&xp), self.x.get_first_m(&xp), self.x.get_second_m(&xp))
        })
    }

    pub fn calculate_scalar(&self, params: &[f64; 3]) -> Scalar {
        split_moments(self.integrate_moments(params)).0
    }

    pub fn calculate_fourvec(&self, params: &[f64; 3]) -> FourVec {
        split_moments(self.integrate_moments(params)).1
    }

    pub fn calculate_tensor(&self, params: &[f64; 3]) -> Tensor {
        split_moments(self.integrate_moments(params)).2
    }

    pub fn differential(&self, params: &[f64; 3], x: &[f64; 2]) -> f64 {
        let [e, temp, delta_t] = *params;
        match self.thermal(e, temp) {
            Some(th) => th.density(x, &self.sigma(&th, temp, delta_t)),
            None => 0.0,
        }
    }

    pub fn find_max(&self, params: &[f64; 3]) -> Scalar {
        let [e, temp, delta_t] = *params;
        match self.thermal(e, temp) {
            Some(th) => Scalar(th.find_max(&self.sigma(&th, temp, delta_t))),
            None => Scalar(0.0),
        }
    }

    fn moments_at(&self, params: &[f64; 3]) -> Moments {
        let (zero, first, second) = split_moments(self.integrate_moments(params));
        Moments {
            zero,
            first,
            second,
            fmax: self.find_max(params),
        }
    }

    pub fn sample_event<R: Rng + ?Sized>(
        &self,
        params: &[f64; 3],
        rng: &mut R,
    ) -> Result<ScatteringEvent, SampleError> {
        let [e, temp, delta_t] = *params;
        let th = self
            .thermal(e, temp)
            .ok_or(SampleError::ClosedPhaseSpace { sqrts: e })?;
        let pair = self.draw_pair(&th, params, self.sigma(&th, temp, delta_t), rng)?;
        let dt_com = th.dt_com(delta_t, &pair);
        let event = self.x.sample_event(&[pair.sqrts, temp, dt_com], rng)?;
        Ok(th.to_medium(&pair, event))
    }
}

impl<F> StochasticProcess<3> for Rate<3, 3, F>
where
    F: Fn(&ThreeBodyState, &KernelParams) -> f64 + Send + Sync,
{
    impl_process_plumbing!(3);

    fn compute(&mut self) -> Result<(), TableError> {
        let grid = *self.tables.grid();
        let points = grid.tabulate(|p| self.moments_at(p));
        self.tables.fill(points)
    }

    fn sample<R: Rng + ?Sized>(
        &self,
        params: &[f64; 3],
        rng: &mut R,
        final_states: &mut Vec<FourVec>,
    ) -> Result<(), SampleError> {
        let event = self.sample_event(params, rng)?;
        final_states.clear();
        final_states.extend(event.outgoing);
        Ok(())
    }
}

/*------------------------------ 3 -> 2 ------------------------------*/

impl<F> Rate<3, 5, F>
where
    F: Fn(&[f64; 5]) -> f64 + Send + Sync + Clone + 'static,
{
    pub fn new(name: &str, settings: &Settings, kernel: F) -> Result<Self, ConfigError> {
        let x = Xsection::<5, F>::new(name, settings, kernel)?;
        let rate = Self::build(name, settings, x, |mass| {
            Grid::new(
                [mass + 0.1, DEFAULT_T_RANGE[0], 0.1],
                [DEFAULT_E_MAX, DEFAULT_T_RANGE[1], DEFAULT_DT_MAX],
                [20, 8, 10],
            )
        })?;
        if rate.active {
            log::warn!(
                "{} is active but absorption channels only carry a placeholder cross section and are never selected",
                rate.name
            );
        }
        Ok(rate)
    }

    pub fn init_x(&mut self, path: &Path) -> Result<(), TableError> {
        self.x.init(path)
    }

    pub fn load_x(&mut self, path: &Path) -> Result<(), TableError> {
        self.x.load(path)
    }

    /// Absorption rate from a thermal quark (or gluon) and a thermal gluon,
    /// integrated with VEGAS over (k, E2, cos theta_k, cos theta_2, phi_2).
    pub fn calculate_scalar(&self, params: &[f64; 3]) -> Scalar {
        let [e, temp, delta_t] = *params;
        let Some(th) = self.thermal(e, temp) else {
            return Scalar(0.0);
        };
        let m2 = self.mass * self.mass;
        let p1 = th.p1();
        let dx = FourVec::new(delta_t, 0.0, 0.0, delta_t * th.v1);
        let integrand = |x: &[f64]| -> [f64; 1] {
            let (k, e2, cos_k, cos_2, phi_2) = (x[0], x[1], x[2], x[3], x[4]);
            let sin_k = (1.0 - cos_k * cos_k).sqrt();
            let sin_2 = (1.0 - cos_2 * cos_2).sqrt();
            let p2 = FourVec::new(e2, e2 * sin_2 * phi_2.cos(), e2 * sin_2 * phi_2.sin(), e2 * cos_2);
            let kmu = FourVec::new(k, k * sin_k, 0.0, k * cos_k);
            let p12 = p1 + p2;
            let s = (p12 + kmu).norm2();
            let s12 = p12.norm2();
            let s1k = (p1 + kmu).norm2();
            let [vx, vy, vz] = p12.velocity();
            let dt12 = dx.boost_to(vx, vy, vz).t();
            let x_inel = (s12 - m2) / (s - m2);
            let y_inel = (s1k / s - m2 / s12) / (1.0 - s12 / s) / (1.0 - m2 / s12);
            let sigma = self.x.get_zero_m(&[s.sqrt(), temp, x_inel, y_inel, dt12]).value();
            [(-(k + e2) / temp).exp() * k * e2 * sigma / e / 8.0 / (2.0 * PI).powi(5)]
        };
        let mut rng = StdRng::seed_from_u64(point_seed(self.integration.seed, params));
        let vegas = Vegas::new(self.integration.vegas_calls, self.integration.vegas_iterations);
        let estimate = vegas.integrate(
            integrand,
            &[0.0, 0.0, -1.0, -1.0, 0.0],
            &[10.0 * temp, 10.0 * temp, 1.0, 1.0, 2.0 * PI],
            &mut rng,
        );
        Scalar(estimate.value[0])
    }

    /// Absorption channels have no sampler, so the envelope is a fixed placeholder.
    pub fn find_max(&self, _params: &[f64; 3]) -> Scalar {
        Scalar(1.0)
    }

    fn moments_at(&self, params: &[f64; 3]) -> Moments {
        Moments {
            zero: self.calculate_scalar(params),
            first: FourVec::zero(),
            second: Tensor::zero(),
            fmax: self.find_max(params),
        }
    }
}

impl<F> StochasticProcess<3> for Rate<3, 5, F>
where
    F: Fn(&[f64; 5]) -> f64 + Send + Sync + Clone + 'static,
{
    impl_process_plumbing!(3);

    fn compute(&mut self) -> Result<(), TableError> {
        let grid = *self.tables.grid();
        let points = grid.tabulate(|p| self.moments_at(p));
        self.tables.fill(points)
    }

    /// Leaves `final_states` untouched.
    fn sample<R: Rng + ?Sized>(
        &self,
        _params: &[f64; 3],
        _rng: &mut R,
        _final_states: &mut Vec<FourVec>,
    ) -> Result<(), SampleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix_elements::{dx_qq2qq_dt, x32_placeholder, Qcd};
    use serde_json::json;

    fn settings() -> Settings {
        Settings::from_value(json!({
            "Boltzmann": {
                "integration": { "rel_tol": 1e-3, "max_evals": 20000, "vegas_calls": 2000, "vegas_iterations": 3 },
                "Qq2Qq": { "status": "active", "mass": 1.3, "degeneracy": 36,
                           "rate_grid": { "lower": [2.0, 0.2], "upper": [12.0, 0.4], "shape": [3, 2] },
                           "xsection_grid": { "lower": [1.3, 0.2], "upper": [20.0, 0.4], "shape": [40, 3] } },
                "Qqg2Qq": { "status": "inactive", "mass": 1.3, "degeneracy": 96,
                            "rate_grid": { "lower": [2.0, 0.2, 1.0], "upper": [12.0, 0.4, 5.0], "shape": [2, 2, 2] } }
            }
        }))
    }

    fn elastic() -> Rate<2, 2, impl Fn(f64, &KernelParams) -> f64 + Send + Sync> {
        let qcd = Qcd::default();
        let mut rate = Rate::<2, 2, _>::new("Boltzmann/Qq2Qq", &settings(), move |t: f64, kp: &KernelParams| {
            dx_qq2qq_dt(&qcd, t, kp)
        })
        .unwrap();
        rate.x.compute().unwrap();
        rate
    }

    #[test]
    fn test_thermal_pair_edges() {
        let th = Thermal::new(1.3, 10.0, 0.3).unwrap();
        assert!(th.pair(0.0, 0.5, 0.0).is_none());
        assert!(th.pair(1.0, 1.0001, 0.0).is_none());
        assert!(th.pair(1.0, -1.0, 0.0).is_some());
        assert!(Thermal::new(1.3, 1.2, 0.3).is_none());
        let sigma = |_: &Pair| 1.0;
        assert_eq!(th.density(&[1.0, 1.5], &sigma), 0.0);
        assert_eq!(th.density(&[0.0, 0.5], &sigma), 0.0);
        assert!(th.density(&[1.0, 0.5], &sigma) > 0.0);
    }

    #[test]
    fn test_dt_in_pair_frame_is_dilated_back() {
        let th = Thermal::new(1.3, 10.0, 0.3).unwrap();
        let pair = th.pair(0.5, -1.0, 0.0).unwrap();
        let dt = th.dt_com(2.0, &pair);
        // a heavy quark moving with the pair ages less in the pair frame
        assert!(dt > 0.0 && dt < 2.0);
    }

    #[test]
    fn test_elastic_rate_and_moments() {
        let rate = elastic();
        let r = rate.calculate_scalar(&[10.0, 0.3]).value();
        assert!(r > 0.0 && r.is_finite());
        // drag: the heavy quark loses longitudinal momentum on average
        let first = rate.calculate_fourvec(&[10.0, 0.3]);
        assert!(first.z() < 0.0);
        assert_eq!((first.x(), first.y()), (0.0, 0.0));
        let second = rate.calculate_tensor(&[10.0, 0.3]);
        assert!(second.get(1, 1) > 0.0);
        assert_eq!(second.get(0, 3), 0.0);
        assert_eq!(rate.calculate_scalar(&[1.0, 0.3]).value(), 0.0);
    }

    #[test]
    fn test_elastic_sample_conserves_momentum() {
        let rate = elastic();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let event = rate.sample_event(&[10.0, 0.3], &mut rng).unwrap();
            let p_in = event.incoming[0] + event.incoming[1];
            let p_out = event.outgoing[0] + event.outgoing[1];
            for (a, b) in p_in.components().iter().zip(p_out.components()) {
                assert!((a - b).abs() < 1e-8, "{:?} vs {:?}", p_in, p_out);
            }
            // heavy quark arrives along +z with the requested energy
            assert!((event.incoming[0].t() - 10.0).abs() < 1e-8);
            assert!(event.incoming[0].x().abs() < 1e-8);
            assert!((event.outgoing[0].norm2() - 1.69).abs() < 1e-7);
            assert!(event.outgoing[1].norm2().abs() < 1e-7);
        }
    }

    #[test]
    fn test_absorption_rate_placeholder() {
        let mut rate = Rate::<3, 5, _>::new("Boltzmann/Qqg2Qq", &settings(), x32_placeholder).unwrap();
        assert!(!rate.is_active());
        assert_eq!(rate.find_max(&[5.0, 0.3, 1.0]).value(), 1.0);
        rate.compute().unwrap();
        assert!(rate.get_zero_m(&[5.0, 0.3, 2.0]).value() > 0.0);
        let mut fs = Vec::new();
        rate.sample(&[5.0, 0.3, 2.0], &mut StdRng::seed_from_u64(1), &mut fs).unwrap();
        assert!(fs.is_empty());
    }
}

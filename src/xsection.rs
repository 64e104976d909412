// Partonic cross sections of heavy-quark scattering processes
//
// Every cross section is evaluated in the centre-of-mass frame of the
// incoming pair with the heavy quark moving along +z ("canonical frame").
// Moments of the heavy-quark momentum transfer dp = p1' - p1 are tabulated
// in that frame.

use crate::config::{IntegrationSettings, Settings};
use crate::error::{ConfigError, SampleError, TableError};
use crate::fourvec::{FourVec, Scalar, Tensor};
use crate::integrate::{Cubature, Vegas};
use crate::minimize::{maximize_density, NelderMead, ENVELOPE_SAFETY};
use crate::process::{point_seed, MomentTables, Moments, StochasticProcess};
use crate::sampler::RejectionSampler;
use crate::table::Grid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Arguments handed to a matrix-element kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub s: f64,
    pub sqrts: f64,
    pub temp: f64,
    pub mass: f64,
    /// Time since the last emission, in the frame the kernel is evaluated in
    pub delta_t: f64,
}

impl KernelParams {
    pub fn new(sqrts: f64, temp: f64, mass: f64, delta_t: f64) -> Self {
        Self {
            s: sqrts * sqrts,
            sqrts,
            temp,
            mass,
            delta_t,
        }
    }
}

/// Momenta of a 2 -> 3 configuration in the canonical frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreeBodyState {
    pub p1: FourVec,
    pub p2: FourVec,
    pub p1_out: FourVec,
    pub p2_out: FourVec,
    pub k: FourVec,
}

/// Incoming and outgoing momenta of one sampled scattering.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatteringEvent {
    pub incoming: Vec<FourVec>,
    pub outgoing: Vec<FourVec>,
}

/// Cross section of one process, tabulated over `N` parameters.
///
/// `F` is the physics kernel; its meaning depends on `N`:
/// * `N = 2`, parameters `(sqrt(s), T)`: `F(t, params)` is dsigma/dt of a 2 -> 2 process.
/// * `N = 3`, parameters `(sqrt(s), T, dt)`: `F(state, params)` is |M|^2 of a 2 -> 3 process.
/// * `N = 5`, parameters `(sqrt(s), T, x, y, dt)`: `F(params)` is the 3 -> 2 cross section.
pub struct Xsection<const N: usize, F> {
    name: String,
    mass: f64,
    degeneracy: f64,
    active: bool,
    kernel: F,
    tables: MomentTables<N>,
    integration: IntegrationSettings,
    sampler: RejectionSampler,
}

/// Upper end of the default formation-time axis, GeV^-1
pub const DEFAULT_DT_MAX: f64 = 20.0;
/// Upper end of the default sqrt(s) axis, GeV
pub const DEFAULT_SQRTS_MAX: f64 = 60.0;
pub const DEFAULT_T_RANGE: [f64; 2] = [0.15, 0.6];

impl<const N: usize, F> Xsection<N, F> {
    fn build<G>(name: &str, settings: &Settings, kernel: F, default_grid: G) -> Result<Self, ConfigError>
    where
        G: FnOnce(f64) -> Result<Grid<N>, ConfigError>,
    {
        let process = settings.process(name)?;
        let grid = process.xsection_grid(default_grid(process.mass)?)?;
        let integration = settings.integration(&process.model)?;
        let prefix = format!("{}/xsection", process.name());
        Ok(Self {
            tables: MomentTables::new(&prefix, grid),
            name: prefix,
            mass: process.mass,
            degeneracy: process.degeneracy,
            active: process.active,
            kernel,
            sampler: RejectionSampler::new(integration.max_trials),
            integration,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn degeneracy(&self) -> f64 {
        self.degeneracy
    }

    fn cubature(&self) -> Cubature {
        Cubature::new(self.integration.rel_tol, self.integration.max_evals)
    }

    /// Tabulated envelope at `params`, if the point lies on a filled grid.
    fn envelope_hint(&self, params: &[f64; N]) -> Option<f64> {
        let fmax = &self.tables.fmax;
        (fmax.is_filled() && fmax.grid().contains(params)).then(|| fmax.interpolate(params).value())
    }

    /// Incoming pair in the canonical frame: (p, p1, p2) with p the CM momentum.
    fn incoming(&self, sqrts: f64) -> Option<(f64, FourVec, FourVec)> {
        let m2 = self.mass * self.mass;
        let p = (sqrts * sqrts - m2) / (2.0 * sqrts);
        if !(p > 0.0 && p.is_finite()) {
            return None;
        }
        let e1 = (p * p + m2).sqrt();
        Some((p, FourVec::new(e1, 0.0, 0.0, p), FourVec::new(p, 0.0, 0.0, -p)))
    }
}

/*------------------------------ 2 -> 2 ------------------------------*/

/// Upper end of u = ln(1 - t/T^2), reached at t = -4 p^2.
fn u_max(temp: f64, p: f64) -> f64 {
    (1.0 + 4.0 * p * p / (temp * temp)).ln()
}

impl<F> Xsection<2, F>
where
    F: Fn(f64, &KernelParams) -> f64 + Send + Sync,
{
    pub fn new(name: &str, settings: &Settings, kernel: F) -> Result<Self, ConfigError> {
        Self::build(name, settings, kernel, |mass| {
            Grid::new([mass, DEFAULT_T_RANGE[0]], [DEFAULT_SQRTS_MAX, DEFAULT_T_RANGE[1]], [100, 10])
        })
    }

    /// Density in u = ln(1 - t/T^2): dsigma/dt * |dt/du|, zero outside the physical range.
    fn density_u(&self, u: f64, kp: &KernelParams, p: f64) -> f64 {
        let t2 = kp.temp * kp.temp;
        let t = t2 * (1.0 - u.exp());
        if !(t <= 0.0 && t >= -4.0 * p * p) {
            return 0.0;
        }
        let value = (self.kernel)(t, kp) * (t2 - t);
        if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        }
    }

    /// (sigma, <dp_z>, <dp_x^2> = <dp_y^2>, <dp_z^2>), each weighted by the cross section.
    fn integrate_moments(&self, params: &[f64; 2]) -> [f64; 4] {
        let [sqrts, temp] = *params;
        let Some((p, _, _)) = self.incoming(sqrts) else {
            return [0.0; 4];
        };
        let kp = KernelParams::new(sqrts, temp, self.mass, 0.0);
        let estimate = self.cubature().integrate(
            |x| {
                let u = x[0];
                let w = self.density_u(u, &kp, p);
                if w == 0.0 {
                    return [0.0; 4];
                }
                let t = temp * temp * (1.0 - u.exp());
                let dz = t / (2.0 * p);
                let cos = 1.0 + dz / p;
                let sin2 = (1.0 - cos * cos).max(0.0);
                [w, w * dz, w * 0.5 * p * p * sin2, w * dz * dz]
            },
            &[0.0],
            &[u_max(temp, p)],
        );
        estimate.value.map(|v| v * self.degeneracy)
    }

    pub fn calculate_scalar(&self, params: &[f64; 2]) -> Scalar {
        Scalar(self.integrate_moments(params)[0])
    }

    pub fn calculate_fourvec(&self, params: &[f64; 2]) -> FourVec {
        let m = self.integrate_moments(params);
        FourVec::new(0.0, 0.0, 0.0, m[1])
    }

    pub fn calculate_tensor(&self, params: &[f64; 2]) -> Tensor {
        let m = self.integrate_moments(params);
        Tensor::diagonal([0.0, m[2], m[2], m[3]])
    }

    /// Envelope of the sampling density in u, with the safety factor applied.
    pub fn find_max(&self, params: &[f64; 2]) -> Scalar {
        let [sqrts, temp] = *params;
        let Some((p, _, _)) = self.incoming(sqrts) else {
            return Scalar(0.0);
        };
        let kp = KernelParams::new(sqrts, temp, self.mass, 0.0);
        let (_, max) = maximize_density(
            |x| self.density_u(x[0], &kp, p),
            &[[0.0, u_max(temp, p)]],
            &[vec![0.0]],
            16,
            &NelderMead::default(),
        );
        Scalar(max * ENVELOPE_SAFETY)
    }

    fn moments_at(&self, params: &[f64; 2]) -> Moments {
        let m = self.integrate_moments(params);
        Moments {
            zero: Scalar(m[0]),
            first: FourVec::new(0.0, 0.0, 0.0, m[1]),
            second: Tensor::diagonal([0.0, m[2], m[2], m[3]]),
            fmax: self.find_max(params),
        }
    }

    /// Draw t and a uniform azimuth; returns momenta in the canonical frame.
    pub fn sample_event<R: Rng + ?Sized>(
        &self,
        params: &[f64; 2],
        rng: &mut R,
    ) -> Result<ScatteringEvent, SampleError> {
        let [sqrts, temp] = *params;
        let (p, p1, p2) = self
            .incoming(sqrts)
            .ok_or(SampleError::ClosedPhaseSpace { sqrts })?;
        let kp = KernelParams::new(sqrts, temp, self.mass, 0.0);
        let draw = self.sampler.sample_or_retry(
            |x: &[f64; 1]| self.density_u(x[0], &kp, p),
            &[[0.0, u_max(temp, p)]],
            self.envelope_hint(params),
            || self.find_max(params).value(),
            rng,
        )?;

        let t = temp * temp * (1.0 - draw.point[0].exp());
        let cos = (1.0 + t / (2.0 * p * p)).clamp(-1.0, 1.0);
        let sin = (1.0 - cos * cos).sqrt();
        let phi = 2.0 * PI * rng.gen::<f64>();
        let direction = [sin * phi.cos(), sin * phi.sin(), cos];
        let p1_out = FourVec::new(p1.t(), p * direction[0], p * direction[1], p * direction[2]);
        let p2_out = FourVec::new(p, -p * direction[0], -p * direction[1], -p * direction[2]);
        Ok(ScatteringEvent {
            incoming: vec![p1, p2],
            outgoing: vec![p1_out, p2_out],
        })
    }
}

impl<F> StochasticProcess<2> for Xsection<2, F>
where
    F: Fn(f64, &KernelParams) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn tables(&self) -> &MomentTables<2> {
        &self.tables
    }

    fn tables_mut(&mut self) -> &mut MomentTables<2> {
        &mut self.tables
    }

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

/// Bounds of (omega, cos theta_k, cos theta*, phi*) at CM momentum `p`.
fn three_body_bounds(p: f64) -> [[f64; 2]; 4] {
    [[0.0, p], [-1.0, 1.0], [-1.0, 1.0], [0.0, 2.0 * PI]]
}

/// Best scan points polished by Nelder-Mead in the 2 -> 3 envelope search
const EMISSION_STARTS: usize = 4;

/// Scan points in (omega, cos theta_k, cos theta*, phi*) for the 2 -> 3
/// envelope search.
///
/// Gluon energies are log-spaced from 1e-3 p up to p. At each energy the
/// polar angle is swept uniformly and also placed where the transverse
/// momentum is a small multiple of `temp`, forward and backward, which is
/// where the screened emission spectrum peaks.
fn emission_seeds(p: f64, temp: f64) -> Vec<[f64; 4]> {
    const OMEGA_POINTS: usize = 24;
    const COS_POINTS: usize = 9;
    let cos_star = [-0.99, -0.6, 0.0, 0.6, 0.99];
    let phi_star = [0.25 * PI, 0.75 * PI, 1.25 * PI, 1.75 * PI];
    let mut seeds = Vec::new();
    for i in 0..OMEGA_POINTS {
        let omega = p * 1e-3f64.powf(1.0 - (i as f64 + 0.5) / OMEGA_POINTS as f64);
        let mut cos_k: Vec<f64> = (0..COS_POINTS)
            .map(|j| -1.0 + 2.0 * (j as f64 + 0.5) / COS_POINTS as f64)
            .collect();
        for kt in [0.5, 1.0, 2.0, 3.0, 5.0].map(|c| c * temp) {
            if kt < omega {
                let c = (1.0 - (kt / omega).powi(2)).sqrt();
                cos_k.extend([c, -c]);
            }
        }
        for &c in &cos_k {
            for &cs in &cos_star {
                for &phi in &phi_star {
                    seeds.push([omega, c, cs, phi]);
                }
            }
        }
    }
    seeds
}

impl<F> Xsection<3, F>
where
    F: Fn(&ThreeBodyState, &KernelParams) -> f64 + Send + Sync,
{
    pub fn new(name: &str, settings: &Settings, kernel: F) -> Result<Self, ConfigError> {
        Self::build(name, settings, kernel, |mass| {
            Grid::new(
                [mass, DEFAULT_T_RANGE[0], 0.1],
                [DEFAULT_SQRTS_MAX, DEFAULT_T_RANGE[1], DEFAULT_DT_MAX],
                [50, 8, 10],
            )
        })
    }

    /// Final state for gluon energy omega, gluon polar angle, the decay angles of
    /// the recoiling pair in its rest frame, and the gluon azimuth, together with
    /// the three-body phase-space weight (gluon azimuth integrated out).
    fn three_body(&self, sqrts: f64, x: &[f64; 4], phi_k: f64) -> Option<(ThreeBodyState, f64)> {
        let (p, p1, p2) = self.incoming(sqrts)?;
        let [omega, cos_k, cos_star, phi_star] = *x;
        if !(omega > 0.0 && omega < p) || cos_k.abs() > 1.0 || cos_star.abs() > 1.0 {
            return None;
        }
        let m2 = self.mass * self.mass;
        let sin_k = (1.0 - cos_k * cos_k).sqrt();
        let k = FourVec::new(
            omega,
            omega * sin_k * phi_k.cos(),
            omega * sin_k * phi_k.sin(),
            omega * cos_k,
        );

        let m12_sq = sqrts * sqrts - 2.0 * sqrts * omega;
        let m12 = m12_sq.sqrt();
        let p_star = (m12_sq - m2) / (2.0 * m12);
        if !(p_star > 0.0) {
            return None;
        }
        let sin_star = (1.0 - cos_star * cos_star).sqrt();
        let n = [sin_star * phi_star.cos(), sin_star * phi_star.sin(), cos_star];
        let p1_rest = FourVec::new((p_star * p_star + m2).sqrt(), p_star * n[0], p_star * n[1], p_star * n[2]);
        let p2_rest = FourVec::new(p_star, -p_star * n[0], -p_star * n[1], -p_star * n[2]);

        // recoiling pair moves opposite to the gluon
        let q0 = sqrts - omega;
        let (vx, vy, vz) = (-k.x() / q0, -k.y() / q0, -k.z() / q0);
        let state = ThreeBodyState {
            p1,
            p2,
            p1_out: p1_rest.boost_back(vx, vy, vz),
            p2_out: p2_rest.boost_back(vx, vy, vz),
            k,
        };
        let jacobian = 2.0 * PI * omega / (2.0 * (2.0 * PI).powi(3)) * p_star / (16.0 * PI * PI * m12);
        Some((state, jacobian))
    }

    /// Differential cross section in (omega, cos theta_k, cos theta*, phi*).
    fn density(&self, x: &[f64; 4], phi_k: f64, kp: &KernelParams) -> Option<(ThreeBodyState, f64)> {
        let (state, jacobian) = self.three_body(kp.sqrts, x, phi_k)?;
        let flux = 2.0 * (kp.s - self.mass * self.mass);
        let value = self.degeneracy * (self.kernel)(&state, kp) * jacobian / flux;
        (value.is_finite() && value > 0.0).then_some((state, value))
    }

    /// (sigma, <dp_t>, <dp_z>, <dp_t^2>, <dp_x^2> = <dp_y^2>, <dp_z^2>) weighted by sigma.
    fn integrate_moments(&self, params: &[f64; 3]) -> [f64; 6] {
        let [sqrts, temp, delta_t] = *params;
        let Some((p, _, _)) = self.incoming(sqrts) else {
            return [0.0; 6];
        };
        let kp = KernelParams::new(sqrts, temp, self.mass, delta_t);
        let bounds = three_body_bounds(p);
        let lower: Vec<f64> = bounds.iter().map(|b| b[0]).collect();
        let upper: Vec<f64> = bounds.iter().map(|b| b[1]).collect();
        let mut rng = StdRng::seed_from_u64(point_seed(self.integration.seed, params));
        let vegas = Vegas::new(self.integration.vegas_calls, self.integration.vegas_iterations);
        let estimate = vegas.integrate(
            |x| {
                let x: [f64; 4] = [x[0], x[1], x[2], x[3]];
                match self.density(&x, 0.0, &kp) {
                    Some((state, w)) => {
                        let dp = state.p1_out - state.p1;
                        [
                            w,
                            w * dp.t(),
                            w * dp.z(),
                            w * dp.t() * dp.t(),
                            w * 0.5 * (dp.x() * dp.x() + dp.y() * dp.y()),
                            w * dp.z() * dp.z(),
                        ]
                    }
                    None => [0.0; 6],
                }
            },
            &lower,
            &upper,
            &mut rng,
        );
        if estimate.discarded > 0 {
            log::debug!(
                "{}: discarded {} non-finite integrand values at {:?}",
                self.name,
                estimate.discarded,
                params
            );
        }
        estimate.value
    }

    pub fn calculate_scalar(&self, params: &[f64; 3]) -> Scalar {
        Scalar(self.integrate_moments(params)[0])
    }

    pub fn calculate_fourvec(&self, params: &[f64; 3]) -> FourVec {
        let m = self.integrate_moments(params);
        FourVec::new(m[1], 0.0, 0.0, m[2])
    }

    pub fn calculate_tensor(&self, params: &[f64; 3]) -> Tensor {
        let m = self.integrate_moments(params);
        Tensor::diagonal([m[3], m[4], m[4], m[5]])
    }

    /// Rejection envelope at `(sqrt(s), T, dt)`.
    ///
    /// The emission peak sits at small transverse momentum of the gluon and
    /// is too narrow for a uniform scan, so the best few points of
    /// `emission_seeds` start the search alongside the coarse scan.
    pub fn find_max(&self, params: &[f64; 3]) -> Scalar {
        let [sqrts, temp, delta_t] = *params;
        let Some((p, _, _)) = self.incoming(sqrts) else {
            return Scalar(0.0);
        };
        let kp = KernelParams::new(sqrts, temp, self.mass, delta_t);
        let density = |x: &[f64]| {
            let x: [f64; 4] = [x[0], x[1], x[2], x[3]];
            self.density(&x, 0.0, &kp).map_or(0.0, |(_, w)| w)
        };
        let mut ranked: Vec<(f64, [f64; 4])> =
            emission_seeds(p, temp).into_iter().map(|x| (density(&x[..]), x)).collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        let starts: Vec<Vec<f64>> = ranked
            .iter()
            .take(EMISSION_STARTS)
            .map(|(_, x)| x.to_vec())
            .chain(std::iter::once(vec![0.5 * p, 0.5, 0.0, PI]))
            .collect();
        let (_, max) = maximize_density(&density, &three_body_bounds(p), &starts, 5, &NelderMead::default());
        Scalar(max * ENVELOPE_SAFETY)
    }

    fn moments_at(&self, params: &[f64; 3]) -> Moments {
        let m = self.integrate_moments(params);
        Moments {
            zero: Scalar(m[0]),
            first: FourVec::new(m[1], 0.0, 0.0, m[2]),
            second: Tensor::diagonal([m[3], m[4], m[4], m[5]]),
            fmax: self.find_max(params),
        }
    }

    pub fn sample_event<R: Rng + ?Sized>(
        &self,
        params: &[f64; 3],
        rng: &mut R,
    ) -> Result<ScatteringEvent, SampleError> {
        let [sqrts, temp, delta_t] = *params;
        let (p, _, _) = self
            .incoming(sqrts)
            .ok_or(SampleError::ClosedPhaseSpace { sqrts })?;
        let kp = KernelParams::new(sqrts, temp, self.mass, delta_t);
        let draw = self.sampler.sample_or_retry(
            |x: &[f64; 4]| self.density(x, 0.0, &kp).map_or(0.0, |(_, w)| w),
            &three_body_bounds(p),
            self.envelope_hint(params),
            || self.find_max(params).value(),
            rng,
        )?;
        let phi_k = 2.0 * PI * rng.gen::<f64>();
        let (state, _) = self
            .three_body(sqrts, &draw.point, phi_k)
            .ok_or(SampleError::ClosedPhaseSpace { sqrts })?;
        Ok(ScatteringEvent {
            incoming: vec![state.p1, state.p2],
            outgoing: vec![state.p1_out, state.p2_out, state.k],
        })
    }
}

impl<F> StochasticProcess<3> for Xsection<3, F>
where
    F: Fn(&ThreeBodyState, &KernelParams) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn tables(&self) -> &MomentTables<3> {
        &self.tables
    }

    fn tables_mut(&mut self) -> &mut MomentTables<3> {
        &mut self.tables
    }

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

impl<F> Xsection<5, F>
where
    F: Fn(&[f64; 5]) -> f64 + Send + Sync + Clone + 'static,
{
    /// Absorption channel. Its tables are never computed: every query is
    /// answered by the approximate functions installed here.
    pub fn new(name: &str, settings: &Settings, kernel: F) -> Result<Self, ConfigError> {
        let mut x = Self::build(name, settings, kernel, |mass| {
            Grid::new(
                [mass, DEFAULT_T_RANGE[0], 0.0, 0.0, 0.1],
                [DEFAULT_SQRTS_MAX, DEFAULT_T_RANGE[1], 1.0, 1.0, DEFAULT_DT_MAX],
                [2, 2, 2, 2, 2],
            )
        })?;
        let degeneracy = x.degeneracy;
        let sigma = x.kernel.clone();
        x.tables
            .zero
            .set_approximate_function(move |p| Scalar(degeneracy * sigma(p)));
        x.tables.first.set_approximate_function(|_| FourVec::zero());
        x.tables.second.set_approximate_function(|_| Tensor::zero());
        x.tables.fmax.set_approximate_function(|_| Scalar(1.0));
        Ok(x)
    }

    pub fn calculate_scalar(&self, params: &[f64; 5]) -> Scalar {
        Scalar(self.degeneracy * (self.kernel)(params))
    }
}

impl<F> StochasticProcess<5> for Xsection<5, F>
where
    F: Fn(&[f64; 5]) -> f64 + Send + Sync + Clone + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn tables(&self) -> &MomentTables<5> {
        &self.tables
    }

    fn tables_mut(&mut self) -> &mut MomentTables<5> {
        &mut self.tables
    }

    fn compute(&mut self) -> Result<(), TableError> {
        Ok(())
    }

    fn sample<R: Rng + ?Sized>(
        &self,
        _params: &[f64; 5],
        _rng: &mut R,
        _final_states: &mut Vec<FourVec>,
    ) -> Result<(), SampleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix_elements::{dx_qq2qq_dt, m2_qq2qqg, Qcd};
    use rand::rngs::StdRng;
    use serde_json::json;

    fn settings() -> Settings {
        Settings::from_value(json!({
            "Boltzmann": {
                "integration": { "rel_tol": 1e-4, "vegas_calls": 3000, "vegas_iterations": 4 },
                "Qq2Qq": { "status": "active", "mass": 1.3, "degeneracy": 36,
                           "xsection_grid": { "lower": [1.3, 0.2], "upper": [8.0, 0.4], "shape": [8, 3] } },
                "Qq2Qqg": { "status": "active", "mass": 1.3, "degeneracy": 36,
                            "xsection_grid": { "lower": [1.3, 0.2, 1.0], "upper": [8.0, 0.4, 5.0], "shape": [3, 2, 2] } },
                "Qqg2Qq": { "status": "inactive", "mass": 1.3, "degeneracy": 96 }
            }
        }))
    }

    fn elastic() -> Xsection<2, impl Fn(f64, &KernelParams) -> f64 + Send + Sync> {
        let qcd = Qcd::default();
        Xsection::<2, _>::new("Boltzmann/Qq2Qq", &settings(), move |t: f64, kp: &KernelParams| {
            dx_qq2qq_dt(&qcd, t, kp)
        })
        .unwrap()
    }

    #[test]
    fn test_elastic_cross_section_positive_and_closed_below_threshold() {
        let x = elastic();
        assert_eq!(x.calculate_scalar(&[1.3, 0.3]).value(), 0.0);
        assert_eq!(x.calculate_scalar(&[1.0, 0.3]).value(), 0.0);
        let sigma = x.calculate_scalar(&[4.0, 0.3]).value();
        assert!(sigma > 0.0 && sigma.is_finite());
        // momentum transfer points backwards along the heavy quark
        assert!(x.calculate_fourvec(&[4.0, 0.3]).z() < 0.0);
        let second = x.calculate_tensor(&[4.0, 0.3]);
        assert!(second.get(1, 1) > 0.0 && second.get(3, 3) > 0.0);
        assert_eq!(second.get(1, 1), second.get(2, 2));
    }

    #[test]
    fn test_elastic_sampling_conserves_momentum() {
        let x = elastic();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let event = x.sample_event(&[5.0, 0.3], &mut rng).unwrap();
            let total_in = event.incoming[0] + event.incoming[1];
            let total_out = event.outgoing[0] + event.outgoing[1];
            for (a, b) in total_in.components().iter().zip(total_out.components()) {
                assert!((a - b).abs() < 1e-10);
            }
            assert!((event.outgoing[0].norm2() - 1.69).abs() < 1e-9);
            assert!(event.outgoing[1].norm2().abs() < 1e-9);
        }
        assert!(matches!(
            x.sample_event(&[1.2, 0.3], &mut rng),
            Err(SampleError::ClosedPhaseSpace { .. })
        ));
    }

    #[test]
    fn test_elastic_envelope_bounds_density() {
        let x = elastic();
        let params = [6.0, 0.25];
        let (p, _, _) = x.incoming(params[0]).unwrap();
        let kp = KernelParams::new(params[0], params[1], 1.3, 0.0);
        let envelope = x.find_max(&params).value();
        let umax = u_max(params[1], p);
        let scan = (0..=2000)
            .map(|i| x.density_u(umax * i as f64 / 2000.0, &kp, p))
            .fold(0.0, f64::max);
        assert!(envelope >= scan, "{} < {}", envelope, scan);
    }

    #[test]
    fn test_radiative_sampling_conserves_momentum() {
        let qcd = Qcd::default();
        let x = Xsection::<3, _>::new("Boltzmann/Qq2Qqg", &settings(), move |s: &ThreeBodyState, kp: &KernelParams| {
            m2_qq2qqg(&qcd, s, kp)
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let params = [6.0, 0.3, 3.0];
        assert!(x.calculate_scalar(&params).value() > 0.0);
        for _ in 0..20 {
            let event = x.sample_event(&params, &mut rng).unwrap();
            assert_eq!(event.outgoing.len(), 3);
            let total = event.outgoing[0] + event.outgoing[1] + event.outgoing[2];
            assert!((total.t() - 6.0).abs() < 1e-9);
            assert!(total.momentum() < 1e-9);
            assert!((event.outgoing[0].norm2() - 1.69).abs() < 1e-8);
        }
    }

    #[test]
    fn test_radiative_envelope_bounds_random_points() {
        let qcd = Qcd::default();
        let x = Xsection::<3, _>::new("Boltzmann/Qq2Qqg", &settings(), move |s: &ThreeBodyState, kp: &KernelParams| {
            m2_qq2qqg(&qcd, s, kp)
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        for params in [
            [2.5, 0.2, 0.5],
            [2.5, 0.4, 10.0],
            [8.0, 0.3, 3.0],
            [20.0, 0.2, 0.5],
            [20.0, 0.2, 10.0],
            [20.0, 0.4, 0.5],
            [20.0, 0.4, 10.0],
        ] {
            let envelope = x.find_max(&params).value();
            let (p, _, _) = x.incoming(params[0]).unwrap();
            let kp = KernelParams::new(params[0], params[1], 1.3, params[2]);
            let bounds = three_body_bounds(p);
            let mut sampled_max: f64 = 0.0;
            for _ in 0..100_000 {
                let point: [f64; 4] = std::array::from_fn(|d| rng.gen_range(bounds[d][0]..bounds[d][1]));
                if let Some((_, w)) = x.density(&point, 0.0, &kp) {
                    sampled_max = sampled_max.max(w);
                }
            }
            assert!(sampled_max > 0.0, "{:?}", params);
            assert!(envelope >= sampled_max, "{:?}: {} < {}", params, envelope, sampled_max);
        }
    }

    #[test]
    fn test_absorption_placeholder() {
        let mut x = Xsection::<5, _>::new(
            "Boltzmann/Qqg2Qq",
            &settings(),
            crate::matrix_elements::x32_placeholder,
        )
        .unwrap();
        assert!(!x.is_active());
        x.compute().unwrap();
        let params = [5.0, 0.3, 0.5, 0.5, 1.0];
        assert_eq!(x.get_zero_m(&params).value(), 96.0 * crate::matrix_elements::X32_PLACEHOLDER);
        let mut fs = vec![FourVec::new(1.0, 0.0, 0.0, 0.0)];
        x.sample(&params, &mut StdRng::seed_from_u64(0), &mut fs).unwrap();
        assert_eq!(fs, vec![FourVec::new(1.0, 0.0, 0.0, 0.0)]);
    }
}

// Leading-order heavy-quark matrix elements in a screened QCD plasma
//
// Energies in GeV, cross sections in GeV^-2, times in GeV^-1.

use crate::fourvec::FourVec;
use crate::xsection::{KernelParams, ThreeBodyState};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// QCD scale parameter in GeV
pub const LAMBDA_QCD: f64 = 0.2;
/// Infrared freeze-out value of the running coupling
pub const ALPHA_MAX: f64 = 1.0;

/// Coupling and screening setup of a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Qcd {
    /// Debye-mass scale in units of 2 pi T
    pub mu: f64,
    /// Number of light flavours
    pub nf: usize,
}

impl Default for Qcd {
    fn default() -> Self {
        Self { mu: 2.0, nf: 3 }
    }
}

impl Qcd {
    fn beta0(&self) -> f64 {
        11.0 - 2.0 * self.nf as f64 / 3.0
    }

    /// One-loop running coupling, frozen at [`ALPHA_MAX`] in the infrared.
    pub fn alpha_s(&self, q2: f64) -> f64 {
        let lambda2 = LAMBDA_QCD * LAMBDA_QCD;
        if q2 <= lambda2 {
            return ALPHA_MAX;
        }
        (4.0 * PI / (self.beta0() * (q2 / lambda2).ln())).min(ALPHA_MAX)
    }

    /// Leading-order Debye mass squared at temperature `temp`.
    pub fn debye_mass2(&self, temp: f64) -> f64 {
        let scale = 2.0 * PI * self.mu * temp;
        (1.0 + self.nf as f64 / 6.0) * 4.0 * PI * self.alpha_s(scale * scale) * temp * temp
    }
}

/// Screened t-channel |M|^2 for Q + q -> Q + q (spin/colour averaged).
pub fn m2_qq2qq(qcd: &Qcd, t: f64, params: &KernelParams) -> f64 {
    let m2 = params.mass * params.mass;
    let s = params.s;
    let u = 2.0 * m2 - s - t;
    let md2 = qcd.debye_mass2(params.temp);
    let alpha = qcd.alpha_s(-t);
    let numerator = (m2 - u).powi(2) + (s - m2).powi(2) + 2.0 * m2 * t;
    64.0 * PI * PI * alpha * alpha / 9.0 * numerator / (t - md2).powi(2)
}

/// Screened t-channel |M|^2 for Q + g -> Q + g (spin/colour averaged).
pub fn m2_qg2qg(qcd: &Qcd, t: f64, params: &KernelParams) -> f64 {
    let m2 = params.mass * params.mass;
    let s = params.s;
    let u = 2.0 * m2 - s - t;
    let md2 = qcd.debye_mass2(params.temp);
    let alpha = qcd.alpha_s(-t);
    32.0 * PI * PI * alpha * alpha * (s - m2) * (m2 - u) / (t - md2).powi(2)
}

fn flux_normalised(m2: f64, params: &KernelParams) -> f64 {
    let m_sq = params.mass * params.mass;
    m2 / (16.0 * PI * (params.s - m_sq).powi(2))
}

/// dsigma/dt for Q + q -> Q + q.
pub fn dx_qq2qq_dt(qcd: &Qcd, t: f64, params: &KernelParams) -> f64 {
    flux_normalised(m2_qq2qq(qcd, t, params), params)
}

/// dsigma/dt for Q + g -> Q + g.
pub fn dx_qg2qg_dt(qcd: &Qcd, t: f64, params: &KernelParams) -> f64 {
    flux_normalised(m2_qg2qg(qcd, t, params), params)
}

/// Gluon emission weight multiplying an elastic |M|^2.
///
/// Gunion-Bertsch spectrum with the heavy-quark dead cone and Debye
/// regulator, times the interference factor `2 (1 - cos(dt / tau_f))` that
/// suppresses radiation formed within `dt` of the previous emission.
pub fn radiation_factor(qcd: &Qcd, state: &ThreeBodyState, params: &KernelParams) -> f64 {
    let k = &state.k;
    let omega = k.t();
    if omega <= 0.0 {
        return 0.0;
    }
    let plus = state.p1.t() + state.p1.z();
    let x = ((k.t() + k.z()) / plus).clamp(0.0, 1.0);
    let kt2 = k.x() * k.x() + k.y() * k.y();
    let md2 = qcd.debye_mass2(params.temp);
    let denominator = kt2 + x * x * params.mass * params.mass + md2;
    let alpha = qcd.alpha_s(kt2.max(md2));
    let spectrum = 48.0 * PI * alpha * (1.0 - x).powi(2) * kt2 / (denominator * denominator);
    let tau_f = 2.0 * omega / denominator;
    let interference = 2.0 * (1.0 - (params.delta_t / tau_f).cos());
    spectrum * interference
}

fn transfer(state: &ThreeBodyState) -> f64 {
    let q: FourVec = state.p2_out - state.p2;
    q.norm2()
}

/// |M|^2 for Q + q -> Q + q + g.
pub fn m2_qq2qqg(qcd: &Qcd, state: &ThreeBodyState, params: &KernelParams) -> f64 {
    m2_qq2qq(qcd, transfer(state), params) * radiation_factor(qcd, state, params)
}

/// |M|^2 for Q + g -> Q + g + g.
pub fn m2_qg2qgg(qcd: &Qcd, state: &ThreeBodyState, params: &KernelParams) -> f64 {
    m2_qg2qg(qcd, transfer(state), params) * radiation_factor(qcd, state, params)
}

/// Cross section in GeV^-2 assumed for the absorption channels
/// (Q + q + g -> Q + q and Q + g + g -> Q + g) until they are tabulated.
pub const X32_PLACEHOLDER: f64 = 1.0;

/// Absorption cross section as a function of `(sqrt(s), T, x, y, dt)`.
pub fn x32_placeholder(_params: &[f64; 5]) -> f64 {
    X32_PLACEHOLDER
}

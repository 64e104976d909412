// Rejection sampling from a bounded density

use crate::error::SampleError;
use crate::minimize::ENVELOPE_SAFETY;
use rand::Rng;

/// An accepted point together with the bookkeeping of how it was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw<const D: usize> {
    pub point: [f64; D],
    pub trials: usize,
    /// Envelope in force when the point was accepted.
    pub envelope: f64,
    /// Number of times the density exceeded the envelope.
    pub violations: usize,
}

/// Uniform-proposal rejection sampler on a box.
///
/// A candidate `x` is accepted with probability `density(x) / envelope`. If the
/// density ever exceeds the envelope, the envelope is raised to
/// `ENVELOPE_SAFETY * density(x)` and the draw restarts, so accepted points
/// always follow the density exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RejectionSampler {
    pub max_trials: usize,
}

impl Default for RejectionSampler {
    fn default() -> Self {
        Self {
            max_trials: 1_000_000,
        }
    }
}

impl RejectionSampler {
    pub fn new(max_trials: usize) -> Self {
        Self { max_trials }
    }

    pub fn sample<const D: usize, F, R>(
        &self,
        density: F,
        bounds: &[[f64; 2]; D],
        envelope: f64,
        rng: &mut R,
    ) -> Result<Draw<D>, SampleError>
    where
        F: Fn(&[f64; D]) -> f64,
        R: Rng + ?Sized,
    {
        if !(envelope.is_finite() && envelope > 0.0) {
            return Err(SampleError::InvalidEnvelope(envelope));
        }
        let mut envelope = envelope;
        let mut violations = 0;
        let mut point = [0.0; D];

        for trial in 1..=self.max_trials {
            for d in 0..D {
                let [lo, hi] = bounds[d];
                point[d] = lo + (hi - lo) * rng.gen::<f64>();
            }
            let value = density(&point);
            if !(value > 0.0) || !value.is_finite() {
                continue;
            }
            if value > envelope {
                log::warn!(
                    "Density {:e} exceeds sampling envelope {:e} at {:?}, raising envelope",
                    value,
                    envelope,
                    point
                );
                envelope = value * ENVELOPE_SAFETY;
                violations += 1;
                continue;
            }
            if rng.gen::<f64>() * envelope < value {
                return Ok(Draw {
                    point,
                    trials: trial,
                    envelope,
                    violations,
                });
            }
        }
        Err(SampleError::Exhausted {
            trials: self.max_trials,
            envelope,
        })
    }

    /// Sample with a tabulated envelope `hint`, falling back to `recompute`.
    ///
    /// `recompute` is used when there is no usable hint, and once more if the
    /// first attempt exhausts its trials.
    pub fn sample_or_retry<const D: usize, F, G, R>(
        &self,
        density: F,
        bounds: &[[f64; 2]; D],
        hint: Option<f64>,
        recompute: G,
        rng: &mut R,
    ) -> Result<Draw<D>, SampleError>
    where
        F: Fn(&[f64; D]) -> f64,
        G: Fn() -> f64,
        R: Rng + ?Sized,
    {
        let envelope = match hint {
            Some(e) if e.is_finite() && e > 0.0 => e,
            _ => recompute(),
        };
        match self.sample(&density, bounds, envelope, rng) {
            Err(SampleError::Exhausted { trials, envelope }) => {
                log::warn!(
                    "Rejection sampling gave up after {} trials with envelope {:e}, retrying with a fresh envelope",
                    trials,
                    envelope
                );
                self.sample(&density, bounds, recompute(), rng)
            }
            other => other,
        }
    }
}

// Multidimensional quadrature: adaptive Gauss-Kronrod cubature and VEGAS

use rand::Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Kronrod 15-point abscissae on [0, 1], largest first; the last entry is the centre.
const XGK: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.0,
];

const WGK: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];

/// Gauss 7-point weights at XGK[1], XGK[3], XGK[5] and the centre.
const WG: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

/// The 15 nodes on [-1, 1] with their Kronrod and embedded Gauss weights.
fn gk15_rule() -> [(f64, f64, f64); 15] {
    let mut rule = [(0.0, 0.0, 0.0); 15];
    for i in 0..7 {
        let wg = match i {
            1 => WG[0],
            3 => WG[1],
            5 => WG[2],
            _ => 0.0,
        };
        rule[2 * i] = (-XGK[i], WGK[i], wg);
        rule[2 * i + 1] = (XGK[i], WGK[i], wg);
    }
    rule[14] = (0.0, WGK[7], WG[3]);
    rule
}

/// Result of an integration: value, error estimate and number of integrand calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate<const M: usize> {
    pub value: [f64; M],
    pub error: [f64; M],
    pub evaluations: usize,
    /// Integrand values discarded because they were NaN or infinite (VEGAS only).
    pub discarded: usize,
}

impl<const M: usize> Estimate<M> {
    fn zero() -> Self {
        Self {
            value: [0.0; M],
            error: [0.0; M],
            evaluations: 0,
            discarded: 0,
        }
    }
}

/// Global-adaptive tensor-product Gauss-Kronrod (7/15) cubature for
/// vector-valued integrands on a hyper-rectangle.
///
/// The region with the largest error is bisected along the axis whose
/// Gauss/Kronrod difference is largest, until the summed error drops below
/// `max(abs_tol, rel_tol * |I|)` or the evaluation budget is spent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubature {
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub max_evals: usize,
}

impl Default for Cubature {
    fn default() -> Self {
        Self {
            rel_tol: 1e-4,
            abs_tol: 0.0,
            max_evals: 100_000,
        }
    }
}

struct Region<const M: usize> {
    center: Vec<f64>,
    half: Vec<f64>,
    value: [f64; M],
    error: [f64; M],
    split_axis: usize,
}

impl<const M: usize> Region<M> {
    fn key(&self) -> f64 {
        self.error.iter().sum()
    }
}

impl<const M: usize> PartialEq for Region<M> {
    fn eq(&self, other: &Self) -> bool {
        self.key().total_cmp(&other.key()) == Ordering::Equal
    }
}

impl<const M: usize> Eq for Region<M> {}

impl<const M: usize> PartialOrd for Region<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<const M: usize> Ord for Region<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().total_cmp(&other.key())
    }
}

impl Cubature {
    pub fn new(rel_tol: f64, max_evals: usize) -> Self {
        Self {
            rel_tol,
            max_evals,
            ..Default::default()
        }
    }

    pub fn integrate<const M: usize, F>(&self, f: F, lower: &[f64], upper: &[f64]) -> Estimate<M>
    where
        F: Fn(&[f64]) -> [f64; M],
    {
        assert_eq!(lower.len(), upper.len(), "integration bounds differ in dimension");
        let dim = lower.len();
        if dim == 0 || lower.iter().zip(upper).any(|(a, b)| a == b) {
            return Estimate::zero();
        }

        let rule = gk15_rule();
        let cost = 15usize.pow(dim as u32);
        let mut evaluations = 0;

        let center: Vec<f64> = lower.iter().zip(upper).map(|(a, b)| 0.5 * (a + b)).collect();
        let half: Vec<f64> = lower.iter().zip(upper).map(|(a, b)| 0.5 * (b - a)).collect();
        let first = evaluate_region(&f, &rule, center, half);
        evaluations += cost;

        let mut total = first.value;
        let mut total_err = first.error;
        let mut heap = BinaryHeap::new();
        heap.push(first);

        while evaluations + 2 * cost <= self.max_evals {
            let err: f64 = total_err.iter().sum();
            let size: f64 = total.iter().map(|v| v.abs()).sum();
            if err <= self.abs_tol.max(self.rel_tol * size) {
                break;
            }
            let worst = match heap.pop() {
                Some(region) => region,
                None => break,
            };
            let axis = worst.split_axis;
            let mut half = worst.half.clone();
            half[axis] *= 0.5;
            let mut left = worst.center.clone();
            left[axis] -= half[axis];
            let mut right = worst.center;
            right[axis] += half[axis];

            let a = evaluate_region(&f, &rule, left, half.clone());
            let b = evaluate_region(&f, &rule, right, half);
            evaluations += 2 * cost;
            for m in 0..M {
                total[m] += a.value[m] + b.value[m] - worst.value[m];
                total_err[m] += a.error[m] + b.error[m] - worst.error[m];
            }
            heap.push(a);
            heap.push(b);
        }

        // resum to shed the drift of the running totals
        let mut value = [0.0; M];
        let mut error = [0.0; M];
        for region in heap.iter() {
            for m in 0..M {
                value[m] += region.value[m];
                error[m] += region.error[m];
            }
        }
        Estimate {
            value,
            error,
            evaluations,
            discarded: 0,
        }
    }
}

fn evaluate_region<const M: usize, F>(
    f: &F,
    rule: &[(f64, f64, f64); 15],
    center: Vec<f64>,
    half: Vec<f64>,
) -> Region<M>
where
    F: Fn(&[f64]) -> [f64; M],
{
    let dim = center.len();
    let mut kronrod = [0.0; M];
    let mut gauss = vec![[0.0; M]; dim];
    let mut index = vec![0usize; dim];
    let mut x = center.clone();
    let volume: f64 = half.iter().product();

    loop {
        let mut wk = 1.0;
        for d in 0..dim {
            let (node, w, _) = rule[index[d]];
            x[d] = center[d] + half[d] * node;
            wk *= w;
        }
        let fx = f(&x);
        for m in 0..M {
            kronrod[m] += wk * fx[m];
        }
        for d in 0..dim {
            let (_, w, wg) = rule[index[d]];
            if wg != 0.0 {
                let weight = wk / w * wg;
                for m in 0..M {
                    gauss[d][m] += weight * fx[m];
                }
            }
        }

        // mixed-radix increment over the 15^dim nodes
        let mut d = 0;
        loop {
            if d == dim {
                break;
            }
            index[d] += 1;
            if index[d] < 15 {
                break;
            }
            index[d] = 0;
            d += 1;
        }
        if d == dim {
            break;
        }
    }

    let mut value = [0.0; M];
    let mut error = [0.0; M];
    let mut split_axis = 0;
    let mut worst = -1.0;
    for m in 0..M {
        value[m] = kronrod[m] * volume;
    }
    for (d, g) in gauss.iter().enumerate() {
        let mut axis_err = 0.0;
        for m in 0..M {
            let e = ((kronrod[m] - g[m]) * volume).abs();
            error[m] += e;
            axis_err += e;
        }
        if axis_err > worst {
            worst = axis_err;
            split_axis = d;
        }
    }
    Region {
        center,
        half,
        value,
        error,
        split_axis,
    }
}

/// Stratified VEGAS Monte Carlo integration.
///
/// Samples are drawn in `ns^d` equal hypercubes of the unit cube and mapped
/// through a per-axis importance grid that adapts to the first integrand
/// component after every iteration. Iterations after the first are combined
/// with inverse-variance weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vegas {
    pub calls: usize,
    pub iterations: usize,
    pub bins: usize,
    pub alpha: f64,
}

impl Default for Vegas {
    fn default() -> Self {
        Self {
            calls: 10_000,
            iterations: 6,
            bins: 50,
            alpha: 1.5,
        }
    }
}

impl Vegas {
    pub fn new(calls: usize, iterations: usize) -> Self {
        Self {
            calls,
            iterations,
            ..Default::default()
        }
    }

    pub fn integrate<const M: usize, F, R>(
        &self,
        f: F,
        lower: &[f64],
        upper: &[f64],
        rng: &mut R,
    ) -> Estimate<M>
    where
        F: Fn(&[f64]) -> [f64; M],
        R: Rng + ?Sized,
    {
        assert_eq!(lower.len(), upper.len(), "integration bounds differ in dimension");
        let dim = lower.len();
        if dim == 0 || self.iterations == 0 || lower.iter().zip(upper).any(|(a, b)| a == b) {
            return Estimate::zero();
        }
        let bins = self.bins.max(1);

        let strata = (((self.calls as f64) / 2.0).powf(1.0 / dim as f64).floor() as usize).max(1);
        let boxes = strata.pow(dim as u32);
        let per_box = (self.calls / boxes).max(2);

        let mut edges: Vec<Vec<f64>> = (0..dim)
            .map(|_| (0..=bins).map(|k| k as f64 / bins as f64).collect())
            .collect();

        let mut results: Vec<([f64; M], [f64; M])> = Vec::with_capacity(self.iterations);
        let mut evaluations = 0;
        let mut discarded = 0;
        let mut x = vec![0.0; dim];
        let mut hit = vec![0usize; dim];

        for _ in 0..self.iterations {
            let mut density = vec![vec![0.0; bins]; dim];
            let mut mean = [0.0; M];
            let mut variance = [0.0; M];
            let mut cube = vec![0usize; dim];

            for _ in 0..boxes {
                let mut sum = [0.0; M];
                let mut sum2 = [0.0; M];
                for _ in 0..per_box {
                    let mut jacobian = 1.0;
                    for d in 0..dim {
                        let y = (cube[d] as f64 + rng.gen::<f64>()) / strata as f64;
                        let z = y * bins as f64;
                        let k = (z as usize).min(bins - 1);
                        let width = edges[d][k + 1] - edges[d][k];
                        let u = edges[d][k] + (z - k as f64) * width;
                        x[d] = lower[d] + u * (upper[d] - lower[d]);
                        jacobian *= (upper[d] - lower[d]) * bins as f64 * width;
                        hit[d] = k;
                    }
                    let mut fx = f(&x);
                    evaluations += 1;
                    if fx.iter().any(|v| !v.is_finite()) {
                        fx = [0.0; M];
                        discarded += 1;
                    }
                    for m in 0..M {
                        let v = fx[m] * jacobian;
                        sum[m] += v;
                        sum2[m] += v * v;
                    }
                    let w0 = fx[0] * jacobian;
                    for d in 0..dim {
                        density[d][hit[d]] += w0 * w0;
                    }
                }
                let n = per_box as f64;
                for m in 0..M {
                    let box_mean = sum[m] / n;
                    let box_var = ((sum2[m] / n - box_mean * box_mean) / (n - 1.0)).max(0.0);
                    mean[m] += box_mean;
                    variance[m] += box_var;
                }

                for d in 0..dim {
                    cube[d] += 1;
                    if cube[d] < strata {
                        break;
                    }
                    cube[d] = 0;
                }
            }

            let b = boxes as f64;
            for m in 0..M {
                mean[m] /= b;
                variance[m] /= b * b;
            }
            results.push((mean, variance));

            for (axis, d) in edges.iter_mut().zip(density.iter()) {
                refine_axis(axis, d, self.alpha);
            }
        }

        let (value, error) = combine(if results.len() > 1 {
            &results[1..]
        } else {
            &results[..]
        });
        Estimate {
            value,
            error,
            evaluations,
            discarded,
        }
    }
}

/// Smooth the accumulated bin densities and move the edges of one axis so each
/// bin carries equal weight.
fn refine_axis(edges: &mut [f64], density: &[f64], alpha: f64) {
    let bins = density.len();
    if bins < 2 {
        return;
    }
    let mut smooth = vec![0.0; bins];
    smooth[0] = 0.5 * (density[0] + density[1]);
    smooth[bins - 1] = 0.5 * (density[bins - 2] + density[bins - 1]);
    for k in 1..bins - 1 {
        smooth[k] = (density[k - 1] + density[k] + density[k + 1]) / 3.0;
    }
    let total: f64 = smooth.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return;
    }

    let weights: Vec<f64> = smooth
        .iter()
        .map(|&s| {
            let r = s / total;
            if r <= 0.0 {
                0.0
            } else if r >= 1.0 {
                1.0
            } else {
                ((r - 1.0) / r.ln()).powf(alpha)
            }
        })
        .collect();
    let sum_w: f64 = weights.iter().sum();
    if !(sum_w > 0.0) {
        return;
    }
    let per_bin = sum_w / bins as f64;

    let mut new = vec![0.0; bins + 1];
    let mut i = 1;
    let mut acc = 0.0;
    let mut x_new = 0.0;
    for k in 0..bins {
        acc += weights[k];
        let x_old = x_new;
        x_new = edges[k + 1];
        while acc > per_bin && i < bins {
            acc -= per_bin;
            new[i] = x_new - (x_new - x_old) * acc / weights[k];
            i += 1;
        }
    }
    for j in i..bins {
        new[j] = edges[j];
    }
    new[bins] = 1.0;
    edges.copy_from_slice(&new);
}

/// Inverse-variance combination; exact (zero-variance) iterations win outright.
fn combine<const M: usize>(results: &[([f64; M], [f64; M])]) -> ([f64; M], [f64; M]) {
    let mut value = [0.0; M];
    let mut error = [0.0; M];
    for m in 0..M {
        let exact: Vec<f64> = results
            .iter()
            .filter(|(_, var)| var[m] <= 0.0)
            .map(|(mean, _)| mean[m])
            .collect();
        if !exact.is_empty() {
            value[m] = exact.iter().sum::<f64>() / exact.len() as f64;
            continue;
        }
        let mut sum_w = 0.0;
        let mut sum = 0.0;
        for (mean, var) in results {
            let w = 1.0 / var[m];
            sum_w += w;
            sum += w * mean[m];
        }
        value[m] = sum / sum_w;
        error[m] = (1.0 / sum_w).sqrt();
    }
    (value, error)
}

// Derivative-free minimisation used to bound sampling densities

/// Factor applied to a located maximum before it is used as a rejection envelope.
pub const ENVELOPE_SAFETY: f64 = 1.5;

/// Nelder-Mead downhill simplex.
///
/// Non-finite objective values are treated as `+inf`, so the simplex walks
/// away from points where the density is undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }

    pub fn minimize<F>(&self, f: F, start: &[f64], step: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        assert_eq!(start.len(), step.len(), "start and step differ in dimension");
        let n = start.len();
        let eval = |x: &[f64]| {
            let v = f(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        simplex.push(start.to_vec());
        for i in 0..n {
            let mut vertex = start.to_vec();
            vertex[i] += step[i];
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = simplex.iter().map(|x| eval(x)).collect();

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            if simplex_size(&simplex) < self.tolerance {
                converged = true;
                break;
            }
            iterations += 1;

            let mut centroid = vec![0.0; n];
            for vertex in &simplex[..n] {
                for (c, v) in centroid.iter_mut().zip(vertex) {
                    *c += v / n as f64;
                }
            }
            let along = |t: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&simplex[n])
                    .map(|(c, w)| c + t * (c - w))
                    .collect()
            };

            let reflected = along(REFLECT);
            let f_r = eval(&reflected);
            if f_r < values[0] {
                let expanded = along(EXPAND);
                let f_e = eval(&expanded);
                if f_e < f_r {
                    simplex[n] = expanded;
                    values[n] = f_e;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_r;
                }
                continue;
            }
            if f_r < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_r;
                continue;
            }

            let (contracted, f_c) = if f_r < values[n] {
                let x = along(CONTRACT * REFLECT);
                let v = eval(&x);
                (x, v)
            } else {
                let x = along(-CONTRACT);
                let v = eval(&x);
                (x, v)
            };
            if f_c < values[n].min(f_r) {
                simplex[n] = contracted;
                values[n] = f_c;
                continue;
            }

            let best = simplex[0].clone();
            for i in 1..=n {
                for (x, b) in simplex[i].iter_mut().zip(&best) {
                    *x = b + SHRINK * (*x - b);
                }
                values[i] = eval(&simplex[i]);
            }
        }

        let best = (0..=n)
            .min_by(|&a, &b| values[a].total_cmp(&values[b]))
            .unwrap_or(0);
        Minimum {
            point: simplex[best].clone(),
            value: values[best],
            iterations,
            converged,
        }
    }
}

/// Largest distance of any vertex from the best vertex.
fn simplex_size(simplex: &[Vec<f64>]) -> f64 {
    let best = &simplex[0];
    simplex[1..]
        .iter()
        .map(|v| {
            v.iter()
                .zip(best)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .fold(0.0, f64::max)
}

/// Maximum of a non-negative density on a box.
///
/// A coarse scan with `scan` points per axis seeds the search, together with
/// any explicit `starts`; each seed is polished with Nelder-Mead on the
/// negated density. Points outside `bounds` count as zero density. The result
/// is the raw maximum; callers scale it by [`ENVELOPE_SAFETY`].
pub fn maximize_density<F>(
    density: F,
    bounds: &[[f64; 2]],
    starts: &[Vec<f64>],
    scan: usize,
    solver: &NelderMead,
) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
{
    let dim = bounds.len();
    let inside = |x: &[f64]| x.iter().zip(bounds).all(|(v, [a, b])| *v >= *a && *v <= *b);
    let objective = |x: &[f64]| if inside(x) { -density(x) } else { 0.0 };

    let mut seeds: Vec<(Vec<f64>, f64)> = starts.iter().map(|s| (s.clone(), objective(s))).collect();

    let scan = scan.max(2);
    let total = scan.pow(dim as u32);
    let mut idx = vec![0usize; dim];
    let mut coarse: Vec<(Vec<f64>, f64)> = Vec::with_capacity(total);
    for _ in 0..total {
        let x: Vec<f64> = (0..dim)
            .map(|d| {
                let [a, b] = bounds[d];
                a + (b - a) * (idx[d] as f64 + 0.5) / scan as f64
            })
            .collect();
        let v = objective(&x);
        coarse.push((x, v));
        for d in 0..dim {
            idx[d] += 1;
            if idx[d] < scan {
                break;
            }
            idx[d] = 0;
        }
    }
    coarse.sort_by(|a, b| a.1.total_cmp(&b.1));
    seeds.extend(coarse.into_iter().take(3));

    let step: Vec<f64> = bounds.iter().map(|[a, b]| 0.1 * (b - a)).collect();
    let mut best_point = seeds.first().map(|s| s.0.clone()).unwrap_or_else(|| vec![0.0; dim]);
    let mut best = 0.0f64;
    for (seed, value) in seeds {
        if -value > best {
            best = -value;
            best_point = seed.clone();
        }
        let found = solver.minimize(&objective, &seed, &step);
        if -found.value > best {
            best = -found.value;
            best_point = found.point;
        }
    }
    (best_point, best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rosenbrock() {
        let nm = NelderMead::new(5000, 1e-10);
        let m = nm.minimize(
            |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
            &[-1.2, 1.0],
            &[0.2, 0.2],
        );
        assert!(m.converged);
        assert!((m.point[0] - 1.0).abs() < 1e-4, "{:?}", m.point);
        assert!((m.point[1] - 1.0).abs() < 1e-4, "{:?}", m.point);
    }

    #[test]
    fn test_nan_regions_are_avoided() {
        let nm = NelderMead::default();
        let m = nm.minimize(
            |x| if x[0] < 0.0 { f64::NAN } else { (x[0] - 0.5).powi(2) },
            &[0.1],
            &[0.3],
        );
        assert!((m.point[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_maximize_density_finds_off_start_peak() {
        let density = |x: &[f64]| {
            (-((x[0] - 2.5).powi(2) + (x[1] + 0.8).powi(2)) * 10.0).exp()
                + 0.3 * (-(x[0] * x[0] + x[1] * x[1])).exp()
        };
        let (point, max) = maximize_density(
            density,
            &[[0.0, 3.0], [-1.0, 1.0]],
            &[vec![1.0, 0.0]],
            8,
            &NelderMead::default(),
        );
        assert!(max >= 1.0 - 1e-6, "max {}", max);
        assert!((point[0] - 2.5).abs() < 1e-2);
    }
}

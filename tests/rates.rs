// Thermal rates and final-state sampling of the standard channels

mod common;

use rand::rngs::StdRng;
use rand::SeedableRng;
use stochastic_rates::matrix_elements::x32_placeholder;
use stochastic_rates::{FourVec, Process, Rate, ScatteringEvent, StochasticProcess};

const E: f64 = 10.0;
const T: f64 = 0.3;
const M: f64 = 1.3;

fn assert_conserved(event: &ScatteringEvent) {
    let sum = |ps: &[FourVec]| ps.iter().fold(FourVec::zero(), |acc, p| acc + *p);
    let p_in = sum(&event.incoming);
    let p_out = sum(&event.outgoing);
    for (a, b) in p_in.components().iter().zip(p_out.components()) {
        assert!((a - b).abs() < 1e-7, "{:?} -> {:?}", p_in, p_out);
    }
    // heavy quark first, massless partners after
    assert!((event.outgoing[0].norm2() - M * M).abs() < 1e-6);
    for p in &event.outgoing[1..] {
        assert!(p.norm2().abs() < 1e-6, "{:?}", p);
        assert!(p.t() > 0.0);
    }
}

#[test]
fn test_elastic_sampling_conserves_four_momentum() {
    let set = &common::initialized().set;
    let mut rng = StdRng::seed_from_u64(10);
    for process in &set.processes()[..2] {
        let Process::Rate22(rate) = process else {
            panic!("{} is not elastic", process.name());
        };
        for _ in 0..200 {
            let event = rate.sample_event(&[E, T], &mut rng).unwrap();
            assert_eq!(event.outgoing.len(), 2);
            // heavy quark enters along +z with energy E
            assert!((event.incoming[0].t() - E).abs() < 1e-8);
            assert!(event.incoming[0].x().abs() < 1e-8 && event.incoming[0].y().abs() < 1e-8);
            assert!(event.incoming[1].norm2().abs() < 1e-6);
            assert_conserved(&event);
        }
    }
}

#[test]
fn test_radiative_sampling_conserves_four_momentum() {
    let set = &common::initialized().set;
    let Process::Rate23(rate) = &set.processes()[2] else {
        panic!("channel 2 is not radiative");
    };
    let mut rng = StdRng::seed_from_u64(20);
    for _ in 0..50 {
        let event = rate.sample_event(&[E, T, 4.0], &mut rng).unwrap();
        assert_eq!(event.outgoing.len(), 3);
        assert_conserved(&event);
    }
}

#[test]
fn test_rate_is_non_negative_and_zero_outside_angles() {
    let set = &common::initialized().set;
    let Process::Rate22(rate) = &set.processes()[0] else {
        panic!("channel 0 is not elastic");
    };
    for e in [1.31, 2.0, 5.0, 15.0] {
        for temp in [0.2, 0.3, 0.4] {
            assert!(rate.calculate_scalar(&[e, temp]).value() >= 0.0);
            for x in [0.0, 0.7, 1.9, 3.0] {
                assert!(rate.differential(&[e, temp], &[x, 0.3]) >= 0.0);
                assert_eq!(rate.differential(&[e, temp], &[x, 1.01]), 0.0);
                assert_eq!(rate.differential(&[e, temp], &[x, -1.2]), 0.0);
            }
        }
    }
    // heavy quark below its mass shell
    assert_eq!(rate.calculate_scalar(&[1.0, 0.3]).value(), 0.0);
}

#[test]
fn test_envelope_bounds_dense_scan() {
    let set = &common::initialized().set;
    let Process::Rate22(rate) = &set.processes()[1] else {
        panic!("channel 1 is not elastic");
    };
    for params in [[3.0, 0.2], [E, T], [18.0, 0.4]] {
        let envelope = rate.find_max(&params).value();
        let n = 80;
        let mut scan_max: f64 = 0.0;
        for i in 0..=n {
            for j in 0..=n {
                let x = [3.0 * i as f64 / n as f64, -1.0 + 2.0 * j as f64 / n as f64];
                scan_max = scan_max.max(rate.differential(&params, &x));
            }
        }
        assert!(scan_max > 0.0);
        assert!(envelope >= scan_max, "{:?}: {} < {}", params, envelope, scan_max);
    }
}

#[test]
fn test_radiative_envelope_bounds_dense_scan() {
    let set = &common::initialized().set;
    let Process::Rate23(rate) = &set.processes()[2] else {
        panic!("channel 2 is not radiative");
    };
    for params in [[1.5, 0.2, 0.5], [E, T, 3.0], [20.0, 0.2, 10.0], [20.0, 0.4, 0.5], [20.0, 0.4, 10.0]] {
        let envelope = rate.find_max(&params).value();
        let n = 60;
        let mut scan_max: f64 = 0.0;
        for i in 0..=n {
            for j in 0..=n {
                let x = [3.0 * i as f64 / n as f64, -1.0 + 2.0 * j as f64 / n as f64];
                scan_max = scan_max.max(rate.differential(&params, &x));
            }
        }
        assert!(scan_max > 0.0, "{:?}", params);
        assert!(envelope >= scan_max, "{:?}: {} < {}", params, envelope, scan_max);
    }
}

#[test]
fn test_sampled_momentum_transfer_matches_drag() {
    let set = &common::initialized().set;
    let Process::Rate22(rate) = &set.processes()[0] else {
        panic!("channel 0 is not elastic");
    };
    let mut rng = StdRng::seed_from_u64(30);
    let n = 4000;
    let mut mean_dpz = 0.0;
    for _ in 0..n {
        let event = rate.sample_event(&[E, T], &mut rng).unwrap();
        mean_dpz += (event.outgoing[0] - event.incoming[0]).z();
    }
    mean_dpz /= n as f64;
    let first = rate.get_first_m(&[E, T]);
    let zero = rate.get_zero_m(&[E, T]).value();
    let expected = first.z() / zero;
    assert!(expected < 0.0);
    assert!(
        (mean_dpz - expected).abs() < 0.25 * expected.abs(),
        "sampled {} vs tabulated {}",
        mean_dpz,
        expected
    );
}

#[test]
fn test_absorption_channel_leaves_final_states_untouched() {
    let settings = common::settings();
    let rate = Rate::<3, 5, _>::new("Boltzmann/Qqg2Qq", &settings, x32_placeholder).unwrap();
    assert!(!rate.is_active());
    let mut final_states = vec![FourVec::new(1.0, 0.0, 0.0, 0.5)];
    rate.sample(&[E, T, 1.0], &mut StdRng::seed_from_u64(1), &mut final_states)
        .unwrap();
    assert_eq!(final_states, vec![FourVec::new(1.0, 0.0, 0.0, 0.5)]);
    assert_eq!(rate.find_max(&[E, T, 1.0]).value(), 1.0);
}

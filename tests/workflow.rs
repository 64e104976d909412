// Channel selection, lab-frame updates and the probe run

mod common;

use rand::rngs::StdRng;
use rand::SeedableRng;
use stochastic_rates::workflow::FMC_TO_GEV_M1;
use stochastic_rates::{probe_test, select_channel, FourVec, InitMode, ProbeSettings, Process, ProcessSet, Settings};

#[test]
fn test_channel_selection_fairness() {
    let mut rng = StdRng::seed_from_u64(99);
    let n = 100_000;
    let (mut first, mut second) = (0, 0);
    for _ in 0..n {
        match select_channel(&[0.04, 0.06], &mut rng) {
            Some(0) => first += 1,
            Some(1) => second += 1,
            Some(i) => panic!("unexpected channel {}", i),
            None => {}
        }
    }
    assert!((first as f64 / n as f64 - 0.04).abs() < 0.004);
    assert!((second as f64 / n as f64 - 0.06).abs() < 0.004);
}

#[test]
fn test_inactive_channels_are_never_selected() {
    let set = &common::initialized().set;
    let probabilities = set.channel_probabilities(10.0, 0.3, 2.0, 1.0);
    for (process, p) in set.processes().iter().zip(&probabilities) {
        if process.is_active() {
            assert!(*p > 0.0, "{}", process.name());
        } else {
            assert_eq!(*p, 0.0, "{}", process.name());
        }
    }
    let mut rng = StdRng::seed_from_u64(5);
    let mut final_states = Vec::new();
    let p = FourVec::new(10.0, 0.0, 0.0, (100.0f64 - 1.69).sqrt());
    for _ in 0..2000 {
        let hit = set
            .update_particle_momentum(0.5 * FMC_TO_GEV_M1, 0.3, [0.0; 3], 2.0, p, &mut rng, &mut final_states)
            .unwrap();
        if let Some(channel) = hit {
            assert!(set.processes()[channel].is_active());
            assert!(!matches!(set.processes()[channel], Process::Rate32(_)));
            assert!(!final_states.is_empty());
        } else {
            assert!(final_states.is_empty());
        }
    }
}

#[test]
fn test_update_in_moving_cell_conserves_energy_momentum() {
    let set = &common::initialized().set;
    let mut rng = StdRng::seed_from_u64(6);
    let mut final_states = Vec::new();
    let p = FourVec::new(8.0, 1.0, -2.0, (64.0f64 - 1.69 - 5.0).sqrt());
    let v_cell = [0.2, 0.1, -0.3];
    let mut hits = 0;
    while hits < 20 {
        let Some(channel) = set
            .update_particle_momentum(2.0 * FMC_TO_GEV_M1, 0.35, v_cell, 3.0, p, &mut rng, &mut final_states)
            .unwrap()
        else {
            continue;
        };
        hits += 1;
        // the heavy quark stays on shell after the transform back to the lab
        assert!((final_states[0].norm2() - 1.69).abs() < 1e-6, "{}", set.processes()[channel].name());
        // the medium partner adds energy
        let total: f64 = final_states.iter().map(|q| q.t()).sum();
        assert!(total > p.t() - 1e-9);
    }
}

#[test]
fn test_probe_run_is_reproducible() {
    let set = &common::initialized().set;
    let probe = ProbeSettings::from_settings(&common::settings()).unwrap();
    let first = probe_test(set, &probe);
    let second = probe_test(set, &probe);
    assert_eq!(first, second);
    assert_eq!(first.len(), probe.particles);
    for history in &first {
        assert_eq!(history.snapshots.len(), probe.steps / probe.record_every + 1);
        let last = history.snapshots.last().unwrap();
        assert!((last.particle.x.t() - probe.steps as f64 * probe.dt).abs() < 1e-9);
        assert!((last.particle.p.norm2() - probe.mass * probe.mass).abs() < 1e-6);
        assert_eq!(history.interactions[4] + history.interactions[5], 0);
        assert_eq!(history.sampling_failures, 0);
    }
}

#[test]
fn test_sampling_exhaustion_does_not_abort_run() {
    let fixture = common::initialized();
    let mut document = common::settings().document().clone();
    document[common::MODEL]["integration"]["max_trials"] = 1.into();
    let settings = Settings::from_value(document);
    let mut set = ProcessSet::standard(&settings, common::MODEL).unwrap();
    set.initialize(InitMode::Load, &fixture.store_path()).unwrap();

    let mut probe = ProbeSettings::from_settings(&settings).unwrap();
    probe.particles = 50;
    probe.steps = 40;
    probe.dt = 0.2;
    let histories = probe_test(&set, &probe);

    assert_eq!(histories.len(), 50);
    let failures: usize = histories.iter().map(|h| h.sampling_failures).sum();
    assert!(failures > 0);
    for history in &histories {
        let last = history.snapshots.last().unwrap();
        assert_eq!(last.step, 40);
        assert!((last.particle.x.t() - 8.0).abs() < 1e-9);
        assert!((last.particle.p.norm2() - probe.mass * probe.mass).abs() < 1e-6);
    }
}

#[test]
fn test_coarse_steps_are_counted() {
    let set = &common::initialized().set;
    let mut rng = StdRng::seed_from_u64(12);
    let mut final_states = Vec::new();
    let p = FourVec::new(10.0, 0.0, 0.0, (100.0f64 - 1.69).sqrt());
    let before = set.coarse_steps();
    for _ in 0..10 {
        // one hundred fm/c is far beyond any sensible step
        set.update_particle_momentum(100.0 * FMC_TO_GEV_M1, 0.3, [0.0; 3], 2.0, p, &mut rng, &mut final_states)
            .unwrap();
    }
    assert!(set.coarse_steps() >= before + 10);
}

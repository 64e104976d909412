// Table persistence: computed tables reload to identical interpolated values

mod common;

use std::path::Path;
use stochastic_rates::{ConfigError, InitMode, ProcessSet, TableError};

#[test]
fn test_load_reproduces_computed_tables() {
    let fixture = common::initialized();
    let mut loaded = ProcessSet::standard(&common::settings(), common::MODEL).unwrap();
    loaded.initialize(InitMode::Load, &fixture.store_path()).unwrap();

    // on grid, between grid points and outside the grid (clamped)
    let points = [
        (1.5, 0.2, 0.5),
        (7.3, 0.27, 3.3),
        (19.9, 0.39, 9.0),
        (45.0, 0.8, 30.0),
    ];
    for (computed, restored) in fixture.set.processes().iter().zip(loaded.processes()) {
        assert_eq!(computed.name(), restored.name());
        if !computed.is_active() {
            continue;
        }
        for (e, temp, dt) in points {
            assert_eq!(
                computed.get_zero_m(e, temp, dt),
                restored.get_zero_m(e, temp, dt),
                "{} at ({}, {}, {})",
                computed.name(),
                e,
                temp,
                dt
            );
        }
    }
}

#[test]
fn test_rates_grow_with_temperature() {
    let set = &common::initialized().set;
    for process in set.processes().iter().filter(|p| p.is_active()) {
        let cold = process.get_zero_m(10.0, 0.2, 5.0);
        let hot = process.get_zero_m(10.0, 0.4, 5.0);
        assert!(cold > 0.0, "{}", process.name());
        assert!(hot > cold, "{}: {} vs {}", process.name(), hot, cold);
    }
}

#[test]
fn test_load_from_missing_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut set = ProcessSet::standard(&common::settings(), common::MODEL).unwrap();
    let err = set
        .initialize(InitMode::Load, &dir.path().join("absent.json"))
        .unwrap_err();
    assert!(matches!(err, TableError::Missing { .. }), "{}", err);
}

#[test]
fn test_load_rejects_different_grid() {
    let fixture = common::initialized();
    let mut document = common::settings().document().clone();
    document["Boltzmann"]["Qq2Qq"]["rate_grid"]["shape"] = serde_json::json!([9, 3]);
    let settings = stochastic_rates::Settings::from_value(document);
    let mut set = ProcessSet::standard(&settings, common::MODEL).unwrap();
    let err = set.initialize(InitMode::Load, &fixture.store_path()).unwrap_err();
    assert!(matches!(err, TableError::GridMismatch(_)), "{}", err);
}

#[test]
fn test_config_errors_are_reported() {
    let mut document = common::settings().document().clone();
    document["Boltzmann"]["Qg2Qg"]
        .as_object_mut()
        .unwrap()
        .remove("mass");
    let settings = stochastic_rates::Settings::from_value(document);
    assert!(matches!(
        ProcessSet::standard(&settings, common::MODEL),
        Err(ConfigError::MissingField { ref field, .. }) if field == "mass"
    ));
    assert!(matches!(
        ProcessSet::standard(&common::settings(), "Langevin"),
        Err(ConfigError::MissingSection(_))
    ));
    assert!(stochastic_rates::Settings::from_file(Path::new("tests/does-not-exist.json")).is_err());
}

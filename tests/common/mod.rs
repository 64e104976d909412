// Shared fixture: the test settings and one initialized channel set per test binary
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::OnceLock;
use stochastic_rates::{InitMode, ProcessSet, Settings};
use tempfile::TempDir;

pub const MODEL: &str = "Boltzmann";

pub fn settings() -> Settings {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/settings.json");
    Settings::from_file(path).unwrap()
}

pub struct Initialized {
    pub dir: TempDir,
    pub set: ProcessSet,
}

impl Initialized {
    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("tables.json")
    }
}

/// Standard set with every active table computed and saved once.
pub fn initialized() -> &'static Initialized {
    static FIXTURE: OnceLock<Initialized> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let mut set = ProcessSet::standard(&settings(), MODEL).unwrap();
        set.initialize(InitMode::New, &dir.path().join("tables.json")).unwrap();
        Initialized { dir, set }
    })
}

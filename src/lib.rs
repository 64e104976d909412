// Table-driven scattering rates and final-state sampling for heavy quarks in a thermal medium
pub mod config;
pub mod error;
pub mod fast_rng;
pub mod fourvec;
pub mod integrate;
pub mod matrix_elements;
pub mod minimize;
pub mod particle;
pub mod process;
pub mod rate;
pub mod sampler;
pub mod settings;
pub mod store;
pub mod table;
pub mod workflow;
pub mod xsection;

pub use config::{ProcessSettings, Settings};
pub use error::{ConfigError, SampleError, TableError};
pub use fast_rng::FastRng;
pub use fourvec::{FourVec, Scalar, Tensor};
pub use matrix_elements::Qcd;
pub use particle::Particle;
pub use process::{Moments, StochasticProcess};
pub use rate::Rate;
pub use settings::ProbeSettings;
pub use store::TableStore;
pub use table::{Grid, InterpolationTable};
pub use workflow::{probe_test, select_channel, InitMode, Process, ProcessSet};
pub use xsection::{KernelParams, ScatteringEvent, ThreeBodyState, Xsection};

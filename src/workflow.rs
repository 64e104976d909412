// Channel set, Monte Carlo channel selection and the probe-particle run
use crate::config::{split_name, Settings};
use crate::error::{ConfigError, SampleError, TableError};
use crate::fast_rng::FastRng;
use crate::fourvec::FourVec;
use crate::matrix_elements::{dx_qg2qg_dt, dx_qq2qq_dt, m2_qg2qgg, m2_qq2qqg, x32_placeholder};
use crate::particle::Particle;
use crate::process::StochasticProcess;
use crate::rate::Rate;
use crate::settings::ProbeSettings;
use crate::xsection::{KernelParams, ThreeBodyState};
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// fm/c to GeV^-1
pub const FMC_TO_GEV_M1: f64 = 5.026;

/// Total interaction probability per step above which the time step is too coarse
pub const MAX_STEP_PROBABILITY: f64 = 0.15;

pub type Kernel22 = Box<dyn Fn(f64, &KernelParams) -> f64 + Send + Sync>;
pub type Kernel23 = Box<dyn Fn(&ThreeBodyState, &KernelParams) -> f64 + Send + Sync>;
pub type Kernel32 = fn(&[f64; 5]) -> f64;

/// Channels of the standard heavy-quark set as (kind, process).
pub const STANDARD_CHANNELS: [(&str, &str); 6] = [
    ("2->2", "Qq2Qq"),
    ("2->2", "Qg2Qg"),
    ("2->3", "Qq2Qqg"),
    ("2->3", "Qg2Qgg"),
    ("3->2", "Qqg2Qq"),
    ("3->2", "Qgg2Qg"),
];

/// One scattering channel of the transport model.
pub enum Process {
    Rate22(Rate<2, 2, Kernel22>),
    Rate23(Rate<3, 3, Kernel23>),
    Rate32(Rate<3, 5, Kernel32>),
}

impl Process {
    /// Build the channel `name` ("<model>/<process>") of kind `"2->2"`,
    /// `"2->3"` or `"3->2"`.
    ///
    /// # Panics
    ///
    /// On any other kind string.
    pub fn from_kind(kind: &str, name: &str, settings: &Settings) -> Result<Self, ConfigError> {
        let (model, process) = split_name(name)?;
        let qcd = settings.qcd(model)?;
        let unknown = || ConfigError::UnknownProcess(name.to_string());
        match kind {
            "2->2" => {
                let kernel: Kernel22 = match process {
                    "Qq2Qq" => Box::new(move |t: f64, kp: &KernelParams| dx_qq2qq_dt(&qcd, t, kp)),
                    "Qg2Qg" => Box::new(move |t: f64, kp: &KernelParams| dx_qg2qg_dt(&qcd, t, kp)),
                    _ => return Err(unknown()),
                };
                Ok(Process::Rate22(Rate::<2, 2, Kernel22>::new(name, settings, kernel)?))
            }
            "2->3" => {
                let kernel: Kernel23 = match process {
                    "Qq2Qqg" => Box::new(move |state: &ThreeBodyState, kp: &KernelParams| m2_qq2qqg(&qcd, state, kp)),
                    "Qg2Qgg" => Box::new(move |state: &ThreeBodyState, kp: &KernelParams| m2_qg2qgg(&qcd, state, kp)),
                    _ => return Err(unknown()),
                };
                Ok(Process::Rate23(Rate::<3, 3, Kernel23>::new(name, settings, kernel)?))
            }
            "3->2" => {
                let kernel: Kernel32 = match process {
                    "Qqg2Qq" | "Qgg2Qg" => x32_placeholder,
                    _ => return Err(unknown()),
                };
                Ok(Process::Rate32(Rate::<3, 5, Kernel32>::new(name, settings, kernel)?))
            }
            _ => panic!("Unsupported channel kind '{}' for {}", kind, name),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Process::Rate22(r) => r.name(),
            Process::Rate23(r) => r.name(),
            Process::Rate32(r) => r.name(),
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Process::Rate22(r) => r.is_active(),
            Process::Rate23(r) => r.is_active(),
            Process::Rate32(r) => r.is_active(),
        }
    }

    /// Gluon emission channels reset the formation clock of the heavy quark.
    pub fn is_radiative(&self) -> bool {
        matches!(self, Process::Rate23(_))
    }

    /// Interaction rate in GeV for energy `e`, temperature `temp` and time
    /// `delta_t` since the last emission (ignored by the elastic channels).
    pub fn get_zero_m(&self, e: f64, temp: f64, delta_t: f64) -> f64 {
        match self {
            Process::Rate22(r) => r.get_zero_m(&[e, temp]).value(),
            Process::Rate23(r) => r.get_zero_m(&[e, temp, delta_t]).value(),
            Process::Rate32(r) => r.get_zero_m(&[e, temp, delta_t]).value(),
        }
    }

    /// Final states in the medium frame for an incoming heavy quark along +z.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        e: f64,
        temp: f64,
        delta_t: f64,
        rng: &mut R,
        final_states: &mut Vec<FourVec>,
    ) -> Result<(), SampleError> {
        match self {
            Process::Rate22(r) => r.sample(&[e, temp], rng, final_states),
            Process::Rate23(r) => r.sample(&[e, temp, delta_t], rng, final_states),
            Process::Rate32(r) => r.sample(&[e, temp, delta_t], rng, final_states),
        }
    }

    /// Compute and persist the cross-section tables.
    pub fn init_x(&mut self, path: &Path) -> Result<(), TableError> {
        match self {
            Process::Rate22(r) => r.init_x(path),
            Process::Rate23(r) => r.init_x(path),
            Process::Rate32(r) => r.init_x(path),
        }
    }

    pub fn load_x(&mut self, path: &Path) -> Result<(), TableError> {
        match self {
            Process::Rate22(r) => r.load_x(path),
            Process::Rate23(r) => r.load_x(path),
            Process::Rate32(r) => r.load_x(path),
        }
    }

    /// Compute and persist the rate tables. The cross-section tables must be
    /// ready.
    pub fn init(&mut self, path: &Path) -> Result<(), TableError> {
        match self {
            Process::Rate22(r) => r.init(path),
            Process::Rate23(r) => r.init(path),
            Process::Rate32(r) => r.init(path),
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<(), TableError> {
        match self {
            Process::Rate22(r) => r.load(path),
            Process::Rate23(r) => r.load(path),
            Process::Rate32(r) => r.load(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    /// Compute every table and write it to the store
    New,
    /// Restore every table from the store
    Load,
}

/// The channels a heavy quark can scatter through, in selection order.
pub struct ProcessSet {
    processes: Vec<Process>,
    coarse_steps: AtomicUsize,
}

impl ProcessSet {
    pub fn new(processes: Vec<Process>) -> Self {
        Self {
            processes,
            coarse_steps: AtomicUsize::new(0),
        }
    }

    /// Build `channels` of `model`.
    pub fn from_channels(settings: &Settings, model: &str, channels: &[(&str, &str)]) -> Result<Self, ConfigError> {
        let processes = channels
            .iter()
            .map(|(kind, process)| Process::from_kind(kind, &format!("{}/{}", model, process), settings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(processes))
    }

    /// Elastic, radiative and absorption channels for quark and gluon scattering partners.
    pub fn standard(settings: &Settings, model: &str) -> Result<Self, ConfigError> {
        Self::from_channels(settings, model, &STANDARD_CHANNELS)
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Number of updates so far whose total interaction probability exceeded
    /// `MAX_STEP_PROBABILITY`.
    pub fn coarse_steps(&self) -> usize {
        self.coarse_steps.load(Ordering::Relaxed)
    }

    /// Prepare the tables of every active channel. Inactive channels are skipped.
    pub fn initialize(&mut self, mode: InitMode, path: &Path) -> Result<(), TableError> {
        for process in self.processes.iter_mut().filter(|p| p.is_active()) {
            log::info!("Initializing {} ({:?})", process.name(), mode);
            match mode {
                InitMode::New => {
                    process.init_x(path)?;
                    process.init(path)?;
                }
                InitMode::Load => {
                    process.load_x(path)?;
                    process.load(path)?;
                }
            }
        }
        Ok(())
    }

    /// Interaction probability of each channel during a step `dt`; zero for
    /// inactive channels and for absorption channels, which cannot update
    /// momenta yet.
    pub fn channel_probabilities(&self, e: f64, temp: f64, delta_t: f64, dt: f64) -> Vec<f64> {
        self.processes
            .iter()
            .map(|p| {
                if p.is_active() && !matches!(p, Process::Rate32(_)) {
                    p.get_zero_m(e, temp, delta_t) * dt
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Interact during a step of length `dt` (GeV^-1) in a fluid cell of
    /// temperature `temp` moving with velocity `v_cell`.
    ///
    /// Returns the index of the channel that fired, or `None` when the quark
    /// streams freely. On a hit `final_states` holds the outgoing momenta in
    /// the frame of `p`; otherwise it is cleared.
    #[allow(clippy::too_many_arguments)]
    pub fn update_particle_momentum<R: Rng + ?Sized>(
        &self,
        dt: f64,
        temp: f64,
        v_cell: [f64; 3],
        formation_time: f64,
        p: FourVec,
        rng: &mut R,
        final_states: &mut Vec<FourVec>,
    ) -> Result<Option<usize>, SampleError> {
        final_states.clear();
        let [vx, vy, vz] = v_cell;
        let p_cell = p.boost_to(vx, vy, vz);
        let dilation = p_cell.t() / p.t();
        let dt_cell = dt * dilation;
        let formation_cell = formation_time * dilation;

        let probabilities = self.channel_probabilities(p_cell.t(), temp, formation_cell, dt_cell);
        let total: f64 = probabilities.iter().sum();
        if total > MAX_STEP_PROBABILITY && self.coarse_steps.fetch_add(1, Ordering::Relaxed) == 0 {
            log::warn!(
                "Total interaction probability {:.3} per step exceeds {}, reduce the time step",
                total,
                MAX_STEP_PROBABILITY
            );
        }
        let Some(channel) = select_channel(&probabilities, rng) else {
            return Ok(None);
        };
        if let Err(err) = self.processes[channel].sample(p_cell.t(), temp, formation_cell, rng, final_states) {
            final_states.clear();
            return Err(err);
        }
        for q in final_states.iter_mut() {
            *q = q.rotate_back(&p_cell).boost_back(vx, vy, vz);
        }
        Ok(Some(channel))
    }
}

/// Pick a channel with probability `probabilities[i]`, or none with the
/// remaining probability.
pub fn select_channel<R: Rng + ?Sized>(probabilities: &[f64], rng: &mut R) -> Option<usize> {
    let total: f64 = probabilities.iter().sum();
    if !(total > 0.0) || rng.gen::<f64>() > total {
        return None;
    }
    let r = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, p) in probabilities.iter().enumerate() {
        cumulative += p;
        if *p > 0.0 && cumulative > r {
            return Some(i);
        }
    }
    probabilities.iter().rposition(|p| *p > 0.0)
}

/// State of one probe particle at a recorded step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub step: usize,
    pub particle: Particle,
}

/// Recorded snapshots of one probe particle plus its interaction counts per channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeHistory {
    pub snapshots: Vec<Snapshot>,
    pub interactions: Vec<usize>,
    /// Steps whose final-state sampling gave up; the particle streamed freely instead.
    pub sampling_failures: usize,
}

/// Evolve `probe.particles` heavy quarks of energy `probe.e0` in a static
/// medium at `probe.temperature`.
///
/// Particles run in parallel; particle `i` draws from
/// `FastRng::stream(probe.seed, i)`, so histories do not depend on the thread
/// count. A step whose sampling is exhausted is logged, counted in
/// `sampling_failures` and treated as free streaming.
pub fn probe_test(set: &ProcessSet, probe: &ProbeSettings) -> Vec<ProbeHistory> {
    let coarse_before = set.coarse_steps();
    log::info!(
        "Probe run: {} particles, {} steps of {} fm/c, E0 = {} GeV, T = {} GeV",
        probe.particles,
        probe.steps,
        probe.dt,
        probe.e0,
        probe.temperature
    );
    let histories: Vec<ProbeHistory> = (0..probe.particles)
        .into_par_iter()
        .map(|i| evolve(set, probe, i, &mut FastRng::stream(probe.seed, i as u64)))
        .collect();
    let failures: usize = histories.iter().map(|h| h.sampling_failures).sum();
    if failures > 0 {
        log::warn!("{} steps fell back to free streaming after sampling failures", failures);
    }
    let coarse = set.coarse_steps() - coarse_before;
    if coarse > 0 {
        log::warn!(
            "{} of {} steps exceeded interaction probability {}",
            coarse,
            probe.particles * probe.steps,
            MAX_STEP_PROBABILITY
        );
    }
    histories
}

fn evolve<R: Rng + ?Sized>(set: &ProcessSet, probe: &ProbeSettings, index: usize, rng: &mut R) -> ProbeHistory {
    let mut particle = Particle::new(probe.pid, probe.mass, probe.e0);
    let mut history = ProbeHistory {
        snapshots: Vec::with_capacity(probe.steps / probe.record_every.max(1) + 1),
        interactions: vec![0; set.len()],
        sampling_failures: 0,
    };
    let mut final_states = Vec::new();
    for step in 0..probe.steps {
        if step % probe.record_every.max(1) == 0 {
            history.snapshots.push(Snapshot { step, particle });
        }
        let hit = set.update_particle_momentum(
            probe.dt * FMC_TO_GEV_M1,
            probe.temperature,
            [0.0, 0.0, 0.0],
            particle.formation_time() * FMC_TO_GEV_M1,
            particle.p,
            rng,
            &mut final_states,
        );
        let hit = match hit {
            Ok(hit) => hit,
            Err(err) => {
                log::warn!("Particle {} step {}: {}, streaming freely", index, step, err);
                history.sampling_failures += 1;
                None
            }
        };
        particle.freestream(probe.dt);
        if let Some(channel) = hit {
            history.interactions[channel] += 1;
            if let Some(p) = final_states.first() {
                particle.p = *p;
            }
            if set.processes[channel].is_radiative() {
                particle.t_rad = particle.x.t();
            }
        }
    }
    history.snapshots.push(Snapshot {
        step: probe.steps,
        particle,
    });
    history
}

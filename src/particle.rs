use crate::fourvec::FourVec;
use serde::Serialize;

/// A transported parton: species id, space-time position, four-momentum and
/// the time of its last radiative emission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Particle {
    pub pid: i32,
    pub x: FourVec,
    pub p: FourVec,
    pub t_rad: f64,
}

impl Particle {
    /// Particle of mass `mass` at the origin moving along +z with energy `energy`.
    pub fn new(pid: i32, mass: f64, energy: f64) -> Self {
        let pz = (energy * energy - mass * mass).max(0.0).sqrt();
        Self {
            pid,
            x: FourVec::zero(),
            p: FourVec::new(energy, 0.0, 0.0, pz),
            t_rad: 0.0,
        }
    }

    /// Move along a straight line for a time `dt`.
    pub fn freestream(&mut self, dt: f64) {
        self.x += self.p * (dt / self.p.t());
    }

    /// Time elapsed since the last emission.
    pub fn formation_time(&self) -> f64 {
        self.x.t() - self.t_rad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_construction() {
        let p = Particle::new(4, 1.3, 10.0);
        assert_eq!(p.pid, 4);
        assert_eq!(p.x, FourVec::zero());
        assert!((p.p.norm2() - 1.69).abs() < 1e-10);
        assert_eq!(p.formation_time(), 0.0);
    }

    #[test]
    fn test_freestream_advances_clock_and_position() {
        let mut p = Particle::new(4, 1.3, 10.0);
        p.freestream(0.5);
        p.freestream(0.5);
        assert!((p.x.t() - 1.0).abs() < 1e-12);
        assert!((p.x.z() - p.p.z() / p.p.t()).abs() < 1e-12);
        p.t_rad = 0.4;
        assert!((p.formation_time() - 0.6).abs() < 1e-12);
    }
}

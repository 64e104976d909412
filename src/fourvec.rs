// Lorentz four-vectors and rank-2 tensors, metric (+, -, -, -)

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A plain number stored in a moment table (integrated rate or cross section).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scalar(pub f64);

impl Scalar {
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Add for Scalar {
    type Output = Scalar;
    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Mul<f64> for Scalar {
    type Output = Scalar;
    fn mul(self, rhs: f64) -> Scalar {
        Scalar(self.0 * rhs)
    }
}

/// Contravariant four-vector (t, x, y, z).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FourVec([f64; 4]);

impl FourVec {
    pub const fn new(t: f64, x: f64, y: f64, z: f64) -> Self {
        Self([t, x, y, z])
    }

    pub const fn zero() -> Self {
        Self([0.0; 4])
    }

    #[inline]
    pub fn t(&self) -> f64 {
        self.0[0]
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.0[1]
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.0[2]
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.0[3]
    }

    pub fn components(&self) -> [f64; 4] {
        self.0
    }

    /// Minkowski inner product.
    #[inline]
    pub fn dot(&self, other: &FourVec) -> f64 {
        self.0[0] * other.0[0] - self.0[1] * other.0[1] - self.0[2] * other.0[2] - self.0[3] * other.0[3]
    }

    /// Invariant mass squared.
    #[inline]
    pub fn norm2(&self) -> f64 {
        self.dot(self)
    }

    /// Length of the spatial part.
    pub fn momentum(&self) -> f64 {
        (self.0[1] * self.0[1] + self.0[2] * self.0[2] + self.0[3] * self.0[3]).sqrt()
    }

    /// Three-velocity p/E of the frame in which this vector is at rest.
    pub fn velocity(&self) -> [f64; 3] {
        [self.0[1] / self.0[0], self.0[2] / self.0[0], self.0[3] / self.0[0]]
    }

    /// Components seen from a frame moving with velocity (vx, vy, vz).
    pub fn boost_to(&self, vx: f64, vy: f64, vz: f64) -> FourVec {
        FourVec::from(boost_matrix(vx, vy, vz) * self.to_vector())
    }

    /// Inverse of [`FourVec::boost_to`] for the same velocity.
    pub fn boost_back(&self, vx: f64, vy: f64, vz: f64) -> FourVec {
        self.boost_to(-vx, -vy, -vz)
    }

    /// Take a vector expressed in a frame whose z axis points along `axis`
    /// back into the frame in which `axis` itself is expressed.
    pub fn rotate_back(&self, axis: &FourVec) -> FourVec {
        FourVec::from(rotation_matrix(axis) * self.to_vector())
    }

    /// Express this vector in a frame whose z axis points along `axis`.
    pub fn rotate_to(&self, axis: &FourVec) -> FourVec {
        FourVec::from(rotation_matrix(axis).transpose() * self.to_vector())
    }

    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::new(self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl From<Vector4<f64>> for FourVec {
    fn from(v: Vector4<f64>) -> Self {
        FourVec([v[0], v[1], v[2], v[3]])
    }
}

impl Add for FourVec {
    type Output = FourVec;
    fn add(self, rhs: FourVec) -> FourVec {
        FourVec(std::array::from_fn(|i| self.0[i] + rhs.0[i]))
    }
}

impl AddAssign for FourVec {
    fn add_assign(&mut self, rhs: FourVec) {
        for i in 0..4 {
            self.0[i] += rhs.0[i];
        }
    }
}

impl Sub for FourVec {
    type Output = FourVec;
    fn sub(self, rhs: FourVec) -> FourVec {
        FourVec(std::array::from_fn(|i| self.0[i] - rhs.0[i]))
    }
}

impl Neg for FourVec {
    type Output = FourVec;
    fn neg(self) -> FourVec {
        FourVec(self.0.map(|c| -c))
    }
}

impl Mul<f64> for FourVec {
    type Output = FourVec;
    fn mul(self, rhs: f64) -> FourVec {
        FourVec(self.0.map(|c| c * rhs))
    }
}

/// Contravariant rank-2 tensor T^{mu nu}, row index mu.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tensor([[f64; 4]; 4]);

impl Tensor {
    pub const fn new(rows: [[f64; 4]; 4]) -> Self {
        Self(rows)
    }

    pub const fn zero() -> Self {
        Self([[0.0; 4]; 4])
    }

    pub fn diagonal(d: [f64; 4]) -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (mu, value) in d.into_iter().enumerate() {
            rows[mu][mu] = value;
        }
        Self(rows)
    }

    /// a^mu b^nu
    pub fn outer(a: &FourVec, b: &FourVec) -> Self {
        Self(std::array::from_fn(|mu| std::array::from_fn(|nu| a.0[mu] * b.0[nu])))
    }

    #[inline]
    pub fn get(&self, mu: usize, nu: usize) -> f64 {
        self.0[mu][nu]
    }

    pub fn rows(&self) -> [[f64; 4]; 4] {
        self.0
    }

    pub fn diagonal_components(&self) -> [f64; 4] {
        [self.0[0][0], self.0[1][1], self.0[2][2], self.0[3][3]]
    }

    pub fn boost_to(&self, vx: f64, vy: f64, vz: f64) -> Tensor {
        let lambda = boost_matrix(vx, vy, vz);
        Tensor::from(lambda * self.to_matrix() * lambda.transpose())
    }

    pub fn boost_back(&self, vx: f64, vy: f64, vz: f64) -> Tensor {
        self.boost_to(-vx, -vy, -vz)
    }

    pub fn rotate_back(&self, axis: &FourVec) -> Tensor {
        let r = rotation_matrix(axis);
        Tensor::from(r * self.to_matrix() * r.transpose())
    }

    pub fn rotate_to(&self, axis: &FourVec) -> Tensor {
        let r = rotation_matrix(axis);
        Tensor::from(r.transpose() * self.to_matrix() * r)
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_fn(|mu, nu| self.0[mu][nu])
    }
}

impl From<Matrix4<f64>> for Tensor {
    fn from(m: Matrix4<f64>) -> Self {
        Tensor(std::array::from_fn(|mu| std::array::from_fn(|nu| m[(mu, nu)])))
    }
}

impl Add for Tensor {
    type Output = Tensor;
    fn add(self, rhs: Tensor) -> Tensor {
        Tensor(std::array::from_fn(|mu| std::array::from_fn(|nu| self.0[mu][nu] + rhs.0[mu][nu])))
    }
}

impl Mul<f64> for Tensor {
    type Output = Tensor;
    fn mul(self, rhs: f64) -> Tensor {
        Tensor(self.0.map(|row| row.map(|c| c * rhs)))
    }
}

/// Lorentz transformation into a frame moving with velocity v.
fn boost_matrix(vx: f64, vy: f64, vz: f64) -> Matrix4<f64> {
    let v2 = vx * vx + vy * vy + vz * vz;
    if v2 < 1e-24 {
        return Matrix4::identity();
    }
    debug_assert!(v2 < 1.0, "boost velocity must be subluminal, |v|^2 = {}", v2);
    let gamma = 1.0 / (1.0 - v2).sqrt();
    let v = [vx, vy, vz];
    let mut m = Matrix4::identity();
    m[(0, 0)] = gamma;
    for i in 0..3 {
        m[(0, i + 1)] = -gamma * v[i];
        m[(i + 1, 0)] = -gamma * v[i];
        for j in 0..3 {
            m[(i + 1, j + 1)] += (gamma - 1.0) * v[i] * v[j] / v2;
        }
    }
    m
}

/// Rotation R = Rz(phi) Ry(theta) carrying the z axis onto the direction of `axis`.
fn rotation_matrix(axis: &FourVec) -> Matrix4<f64> {
    let p = axis.momentum();
    if p < 1e-300 {
        return Matrix4::identity();
    }
    let (nx, ny, nz) = (axis.x() / p, axis.y() / p, axis.z() / p);
    let sin_theta = (nx * nx + ny * ny).sqrt();
    let cos_theta = nz;
    let (cos_phi, sin_phi) = if sin_theta > 1e-15 {
        (nx / sin_theta, ny / sin_theta)
    } else {
        (1.0, 0.0)
    };
    #[rustfmt::skip]
    let m = Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, cos_phi * cos_theta, -sin_phi, cos_phi * sin_theta,
        0.0, sin_phi * cos_theta, cos_phi, sin_phi * sin_theta,
        0.0, -sin_theta, 0.0, cos_theta,
    );
    m
}

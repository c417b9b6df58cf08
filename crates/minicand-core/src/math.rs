//! Geometry and kinematics value types.

use core::f64::consts::PI;
use core::ops::{Index, Sub};

/// Wraps an angle into `(-π, π]`.
pub fn reduce_range(x: f64) -> f64 {
    let two_pi = 2.0 * PI;
    if x > PI || x <= -PI {
        let y = x - two_pi * (x / two_pi).round();
        if y <= -PI {
            y + two_pi
        } else {
            y
        }
    } else {
        x
    }
}

/// Signed azimuthal difference `a - b`, wrapped into `(-π, π]`.
pub fn delta_phi(a: f64, b: f64) -> f64 {
    reduce_range(a - b)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const ORIGIN: Point = Point {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Sub for Point {
    type Output = Vector3;

    fn sub(self, rhs: Point) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Builds a vector from transverse magnitude, pseudorapidity and azimuth.
    pub fn from_rho_eta_phi(rho: f64, eta: f64, phi: f64) -> Self {
        let (s, c) = phi.sin_cos();
        Self::new(rho * c, rho * s, rho * eta.sinh())
    }

    pub fn rho(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn mag(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn phi(&self) -> f64 {
        if self.x == 0.0 && self.y == 0.0 {
            0.0
        } else {
            self.y.atan2(self.x)
        }
    }

    pub fn eta(&self) -> f64 {
        pseudorapidity(self.rho(), self.z)
    }
}

fn pseudorapidity(rho: f64, z: f64) -> f64 {
    if rho > 0.0 {
        (z / rho).asinh()
    } else if z == 0.0 {
        0.0
    } else {
        z.signum() * f64::INFINITY
    }
}

/// Four-momentum in `(pt, eta, phi, mass)` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolarLorentzVector {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
}

impl PolarLorentzVector {
    pub const fn new(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        Self { pt, eta, phi, mass }
    }

    pub fn px(&self) -> f64 {
        self.pt * self.phi.cos()
    }

    pub fn py(&self) -> f64 {
        self.pt * self.phi.sin()
    }

    pub fn pz(&self) -> f64 {
        self.pt * self.eta.sinh()
    }

    pub fn p(&self) -> f64 {
        self.pt * self.eta.cosh()
    }

    pub fn energy(&self) -> f64 {
        let p = self.p();
        (p * p + self.mass * self.mass).sqrt()
    }
}

/// Four-momentum in Cartesian `(px, py, pz, E)` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LorentzVector {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl LorentzVector {
    pub const fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    pub fn eta(&self) -> f64 {
        pseudorapidity(self.pt(), self.pz)
    }

    pub fn phi(&self) -> f64 {
        Vector3::new(self.px, self.py, self.pz).phi()
    }

    /// Invariant mass; negative for space-like vectors.
    pub fn mass(&self) -> f64 {
        let m2 = self.e * self.e - (self.px * self.px + self.py * self.py + self.pz * self.pz);
        if m2 >= 0.0 {
            m2.sqrt()
        } else {
            -(-m2).sqrt()
        }
    }
}

impl From<&PolarLorentzVector> for LorentzVector {
    fn from(v: &PolarLorentzVector) -> Self {
        Self::new(v.px(), v.py(), v.pz(), v.energy())
    }
}

/// Symmetric 5×5 track-parameter covariance.
///
/// Parameter order: `q/p`, `lambda`, `phi`, `dxy`, `dsz`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CovarianceMatrix {
    m: [[f64; 5]; 5],
}

impl CovarianceMatrix {
    pub const DIM: usize = 5;

    pub fn zeros() -> Self {
        Self::default()
    }

    pub fn from_diagonal(diagonal: [f64; 5]) -> Self {
        let mut cov = Self::zeros();
        for (i, v) in diagonal.into_iter().enumerate() {
            cov.m[i][i] = v;
        }
        cov
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.m[i][j]
    }

    /// Sets both `(i, j)` and `(j, i)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.m[i][j] = value;
        self.m[j][i] = value;
    }

    pub fn rows(&self) -> &[[f64; 5]; 5] {
        &self.m
    }
}

impl Index<(usize, usize)> for CovarianceMatrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.m[i][j]
    }
}

use crate::hit_pattern::HitPattern;
use crate::math::{CovarianceMatrix, Point, Vector3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrackQuality {
    Loose = 0,
    Tight = 1,
    HighPurity = 2,
}

/// A fitted helix summary: reference point, momentum, covariance and hits.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    chi2: f32,
    ndof: f32,
    reference_point: Point,
    momentum: Vector3,
    charge: i32,
    covariance: CovarianceMatrix,
    quality_mask: u8,
    hit_pattern: HitPattern,
}

impl Track {
    pub fn new(
        chi2: f32,
        ndof: f32,
        reference_point: Point,
        momentum: Vector3,
        charge: i32,
        covariance: CovarianceMatrix,
    ) -> Self {
        Self {
            chi2,
            ndof,
            reference_point,
            momentum,
            charge,
            covariance,
            quality_mask: 0,
            hit_pattern: HitPattern::new(),
        }
    }

    pub fn with_hit_pattern(mut self, hit_pattern: HitPattern) -> Self {
        self.hit_pattern = hit_pattern;
        self
    }

    pub fn chi2(&self) -> f32 {
        self.chi2
    }

    pub fn ndof(&self) -> f32 {
        self.ndof
    }

    pub fn normalized_chi2(&self) -> f32 {
        if self.ndof != 0.0 {
            self.chi2 / self.ndof
        } else {
            0.0
        }
    }

    pub fn reference_point(&self) -> &Point {
        &self.reference_point
    }

    pub fn momentum(&self) -> &Vector3 {
        &self.momentum
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn covariance(&self) -> &CovarianceMatrix {
        &self.covariance
    }

    pub fn hit_pattern(&self) -> &HitPattern {
        &self.hit_pattern
    }

    pub fn pt(&self) -> f64 {
        self.momentum.rho()
    }

    pub fn eta(&self) -> f64 {
        self.momentum.eta()
    }

    pub fn phi(&self) -> f64 {
        self.momentum.phi()
    }

    pub fn p(&self) -> f64 {
        self.momentum.mag()
    }

    /// Transverse impact parameter with respect to `point`.
    pub fn dxy_to(&self, point: &Point) -> f64 {
        let d = self.reference_point - *point;
        (-d.x * self.momentum.y + d.y * self.momentum.x) / self.pt()
    }

    /// Longitudinal impact parameter with respect to `point`.
    pub fn dz_to(&self, point: &Point) -> f64 {
        let d = self.reference_point - *point;
        let pt = self.pt();
        d.z - (d.x * self.momentum.x + d.y * self.momentum.y) / pt * (self.momentum.z / pt)
    }

    pub fn dxy(&self) -> f64 {
        self.dxy_to(&Point::ORIGIN)
    }

    pub fn dz(&self) -> f64 {
        self.dz_to(&Point::ORIGIN)
    }

    pub fn set_quality(&mut self, quality: TrackQuality) {
        self.quality_mask |= 1 << quality as u8;
    }

    pub fn quality(&self, quality: TrackQuality) -> bool {
        self.quality_mask & (1 << quality as u8) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_bits() {
        let momentum = Vector3::new(1.0, 0.0, 0.0);
        let mut track =
            Track::new(10.0, 5.0, Point::ORIGIN, momentum, 1, CovarianceMatrix::zeros());
        assert!(!track.quality(TrackQuality::Loose));
        track.set_quality(TrackQuality::Loose);
        track.set_quality(TrackQuality::HighPurity);
        assert!(track.quality(TrackQuality::Loose));
        assert!(!track.quality(TrackQuality::Tight));
        assert!(track.quality(TrackQuality::HighPurity));
        assert_eq!(track.normalized_chi2(), 2.0);
    }

    #[test]
    fn test_impact_parameters() {
        let momentum = Vector3::from_rho_eta_phi(5.0, 0.0, 0.0);
        let reference = Point::new(0.0, 0.02, 1.5);
        let track = Track::new(0.0, 0.0, reference, momentum, -1, CovarianceMatrix::zeros());
        assert!((track.dxy() - 0.02).abs() < 1e-12);
        assert!((track.dz() - 1.5).abs() < 1e-12);
        assert_eq!(track.normalized_chi2(), 0.0);
    }
}

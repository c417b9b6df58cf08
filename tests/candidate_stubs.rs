//! # Candidate Interface Tests
//!
//! Leaf candidates have no relatives and no vertex fit.

use minicand::record::{LorentzVector, Point, PolarLorentzVector};
use minicand::{Candidate, CandidateBuilder, CandidateError};

struct Bare {
    polar: PolarLorentzVector,
    cartesian: LorentzVector,
    vertex: Point,
}

impl Bare {
    fn new(pt: f64) -> Self {
        let polar = PolarLorentzVector::new(pt, 0.0, 0.0, 0.0);
        Self {
            cartesian: LorentzVector::from(&polar),
            polar,
            vertex: Point::ORIGIN,
        }
    }
}

impl Candidate for Bare {
    fn polar_p4(&self) -> &PolarLorentzVector {
        &self.polar
    }

    fn p4(&self) -> &LorentzVector {
        &self.cartesian
    }

    fn vertex(&self) -> &Point {
        &self.vertex
    }

    fn charge(&self) -> i32 {
        0
    }

    fn pdg_id(&self) -> i32 {
        22
    }
}

/// Verifies the navigation defaults.
#[test]
fn test_leaf_has_no_relatives() {
    let bare = Bare::new(3.0);
    assert_eq!(bare.number_of_daughters(), 0);
    assert_eq!(bare.number_of_mothers(), 0);
    assert!(bare.daughter(0).is_none());
    assert!(bare.mother(0).is_none());
    assert!(matches!(bare.daughter_by_name("lead"), Err(CandidateError::Unimplemented(_))));
    assert!(!bare.has_master_clone());
    assert!(!bare.has_master_clone_ptr());
    assert!(matches!(bare.master_clone(), Err(CandidateError::InvalidReference(_))));
    assert!(matches!(bare.master_clone_ptr(), Err(CandidateError::InvalidReference(_))));
    assert!(!bare.long_lived());
    assert!(!bare.mass_constraint());
}

/// Verifies vertex-fit queries fail except for the degrees of freedom.
#[test]
fn test_vertex_fit_is_unavailable() {
    let cand = CandidateBuilder::new(PolarLorentzVector::new(9.0, 0.4, 1.0, 0.13957))
        .pdg_id(-211)
        .build();
    assert_eq!(cand.vertex_ndof(), 0.0);
    assert!(matches!(cand.vertex_chi2(), Err(CandidateError::Unimplemented(_))));
    assert!(matches!(cand.vertex_normalized_chi2(), Err(CandidateError::Unimplemented(_))));
    assert!(matches!(cand.vertex_covariance(0, 0), Err(CandidateError::Unimplemented(_))));
    let mut out = [[0.0; 3]; 3];
    assert!(cand.fill_vertex_covariance(&mut out).is_err());
    assert_eq!(cand.charge(), -1);
}

/// Verifies overlap compares momentum, vertex and charge across implementations.
#[test]
fn test_overlap() {
    let a = Bare::new(3.0);
    let b = Bare::new(3.0);
    let c = Bare::new(4.0);
    assert!(a.overlap(&b));
    assert!(!a.overlap(&c));

    let pion = CandidateBuilder::new(PolarLorentzVector::new(9.0, 0.4, 1.0, 0.13957))
        .pdg_id(211)
        .build();
    let copy = pion.clone();
    assert!(pion.overlap(&copy));
    assert!(!pion.overlap(&a));

    let mut flipped = pion.clone();
    flipped.set_pdg_id(-211);
    assert!(!pion.overlap(&flipped));
}

/// Verifies the derived kinematic accessors agree with the four-vectors.
#[test]
fn test_provided_accessors() {
    let bare = Bare::new(3.0);
    assert_eq!(bare.pt(), 3.0);
    assert_eq!(bare.px(), bare.p4().px);
    assert_eq!(bare.energy(), bare.p4().e);
    assert_eq!((bare.vx(), bare.vy(), bare.vz()), (0.0, 0.0, 0.0));
}

//! The generic particle-candidate capability interface.
//!
//! Leaf candidates implement the five required accessors and inherit the
//! rest: navigation returns nothing and vertex-fit queries fail with
//! [`CandidateError::Unimplemented`].

use crate::error::CandidateError;
use crate::math::{LorentzVector, Point, PolarLorentzVector};

pub trait Candidate {
    fn polar_p4(&self) -> &PolarLorentzVector;
    fn p4(&self) -> &LorentzVector;
    fn vertex(&self) -> &Point;
    fn charge(&self) -> i32;
    fn pdg_id(&self) -> i32;

    fn pt(&self) -> f64 {
        self.polar_p4().pt
    }

    fn eta(&self) -> f64 {
        self.polar_p4().eta
    }

    fn phi(&self) -> f64 {
        self.polar_p4().phi
    }

    fn mass(&self) -> f64 {
        self.polar_p4().mass
    }

    fn energy(&self) -> f64 {
        self.p4().e
    }

    fn px(&self) -> f64 {
        self.p4().px
    }

    fn py(&self) -> f64 {
        self.p4().py
    }

    fn pz(&self) -> f64 {
        self.p4().pz
    }

    fn vx(&self) -> f64 {
        self.vertex().x
    }

    fn vy(&self) -> f64 {
        self.vertex().y
    }

    fn vz(&self) -> f64 {
        self.vertex().z
    }

    fn number_of_daughters(&self) -> usize {
        0
    }

    fn number_of_mothers(&self) -> usize {
        0
    }

    fn daughter(&self, _index: usize) -> Option<&dyn Candidate> {
        None
    }

    fn mother(&self, _index: usize) -> Option<&dyn Candidate> {
        None
    }

    fn daughter_by_name(&self, _name: &str) -> Result<&dyn Candidate, CandidateError> {
        Err(CandidateError::Unimplemented("daughter lookup by name"))
    }

    fn has_master_clone(&self) -> bool {
        false
    }

    fn master_clone(&self) -> Result<&dyn Candidate, CandidateError> {
        Err(CandidateError::InvalidReference("candidate has no master clone reference"))
    }

    fn has_master_clone_ptr(&self) -> bool {
        false
    }

    fn master_clone_ptr(&self) -> Result<&dyn Candidate, CandidateError> {
        Err(CandidateError::InvalidReference("candidate has no master clone pointer"))
    }

    fn vertex_chi2(&self) -> Result<f64, CandidateError> {
        Err(CandidateError::Unimplemented("vertex chi-square"))
    }

    /// Always zero for candidates without a vertex fit.
    fn vertex_ndof(&self) -> f64 {
        0.0
    }

    fn vertex_normalized_chi2(&self) -> Result<f64, CandidateError> {
        Err(CandidateError::Unimplemented("vertex normalized chi-square"))
    }

    fn vertex_covariance(&self, _i: usize, _j: usize) -> Result<f64, CandidateError> {
        Err(CandidateError::Unimplemented("vertex covariance"))
    }

    fn fill_vertex_covariance(&self, _out: &mut [[f64; 3]; 3]) -> Result<(), CandidateError> {
        Err(CandidateError::Unimplemented("vertex covariance"))
    }

    fn long_lived(&self) -> bool {
        false
    }

    fn mass_constraint(&self) -> bool {
        false
    }

    /// Two candidates overlap when they share momentum, vertex and charge.
    fn overlap(&self, other: &dyn Candidate) -> bool {
        self.p4() == other.p4()
            && self.vertex() == other.vertex()
            && self.charge() == other.charge()
    }
}

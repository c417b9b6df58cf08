//! # Missing Parameterization Tests
//!
//! The process-wide table is pointed at a file that does not exist. Loading
//! must degrade to an invalid table: covariance and pseudo-track access fail,
//! everything else keeps working.

use minicand::record::config::COVARIANCE_TABLE_ENV;
use minicand::record::{CovarianceMatrix, Point, PolarLorentzVector, TrackAtVertex};
use minicand::{Candidate, CandidateError, CovarianceParameterization, PackedCandidate};
use std::sync::Once;

static BROKEN_TABLE: Once = Once::new();

fn broken_global() -> &'static CovarianceParameterization {
    BROKEN_TABLE.call_once(|| {
        std::env::set_var(COVARIANCE_TABLE_ENV, "/nonexistent/minicand/covariance_v9.toml");
    });
    CovarianceParameterization::global()
}

fn packed_with_builtin() -> PackedCandidate {
    let p4 = PolarLorentzVector::new(10.0, 1.0, 0.0, 0.13957);
    let trk = TrackAtVertex::from_p4(&p4);
    let mut cand = PackedCandidate::new(&p4, &Point::new(0.0, 0.01, 0.2), &trk, 211, None);
    let cov = CovarianceMatrix::from_diagonal([2.0e-6, 3.0e-7, 5.0e-7, 4.0e-5, 9.0e-5]);
    cand.pack_covariance_with(&cov, 1, &CovarianceParameterization::builtin())
        .unwrap();
    cand
}

/// Verifies the failed load yields an invalid table instead of a panic.
#[test]
fn test_failed_load_is_invalid() {
    let table = broken_global();
    assert!(!table.is_valid());
    let late = CovarianceParameterization::install_global(CovarianceParameterization::builtin());
    assert!(late.is_err());
}

/// Verifies the failure is scoped to covariance and the pseudo-track.
#[test]
fn test_failure_is_scoped() {
    broken_global();
    let cand = packed_with_builtin();

    assert!(matches!(cand.covariance(), Err(CandidateError::MissingParameterization(_))));
    assert!(matches!(cand.pseudo_track(), Err(CandidateError::MissingParameterization(_))));
    assert!(cand.dxy_error().is_err());

    assert!((cand.pt() - 10.0).abs() < 0.04);
    assert!((cand.vy() - 0.01).abs() < 1e-5);
    assert!(cand.dxy() > 0.0);

    // A valid table supplied explicitly still decodes the record.
    let cov = cand.covariance_with(&CovarianceParameterization::builtin()).unwrap();
    assert!(cov.get(3, 3) > 0.0);
    assert!(cand.pseudo_track().is_ok());
}

/// Verifies that packing through the broken table is refused.
#[test]
fn test_packing_through_invalid_table_fails() {
    broken_global();
    let p4 = PolarLorentzVector::new(3.0, 0.0, 0.0, 0.0);
    let trk = TrackAtVertex::from_p4(&p4);
    let mut cand = PackedCandidate::new(&p4, &Point::ORIGIN, &trk, -11, None);
    let err = cand.pack_covariance(&CovarianceMatrix::from_diagonal([1.0; 5]), 1).unwrap_err();
    assert!(err.to_string().contains("unimplemented"));
}

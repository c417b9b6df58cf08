use minicand::record::{
    CovarianceMatrix, HitPattern, HitType, Point, PolarLorentzVector, SubDetector, Track,
    TrackAtVertex, TrackQuality, Vector3, VertexLookup, VertexRef,
};
use minicand::{Candidate, CandidateBuilder, CandidateError, PackedCandidate};
use std::sync::Arc;

fn main() -> Result<(), CandidateError> {
    tracing_subscriber::fmt::init();

    let pvs: Arc<dyn VertexLookup> = Arc::new(vec![Point::new(0.01, -0.02, 1.3)]);
    let p4 = PolarLorentzVector::new(10.0, 1.0, 0.0, 0.13957);

    let mut hits = HitPattern::new();
    for layer in 1..=4 {
        hits.append_track_hit(SubDetector::PixelBarrel, layer, false, HitType::Valid);
    }
    for layer in 1..=6 {
        hits.append_track_hit(SubDetector::Tob, layer, false, HitType::Valid);
    }
    let mut cov = CovarianceMatrix::from_diagonal([2.0e-6, 3.0e-7, 5.0e-7, 4.0e-5, 9.0e-5]);
    cov.set(3, 4, 1.2e-5);
    let mut track = Track::new(
        12.0,
        9.0,
        Point::new(0.012, -0.021, 1.31),
        Vector3::from_rho_eta_phi(10.0, 1.0, 0.0),
        1,
        cov,
    )
    .with_hit_pattern(hits);
    track.set_quality(TrackQuality::HighPurity);

    let cand = CandidateBuilder::new(p4)
        .vertex(Point::new(0.012, -0.021, 1.31))
        .track_at_vertex(TrackAtVertex { pt: 10.02, eta: 1.002, phi: 0.001 })
        .pdg_id(211)
        .primary_vertex(VertexRef::new(pvs.clone(), 0))
        .puppi_weights(1.0, 0.8)
        .build_with_track(&track)?;

    println!("packed: {:?}", cand.fields());
    println!(
        "p4: pt={:.4} eta={:.5} phi={:.5} m={:.5}",
        cand.pt(),
        cand.eta(),
        cand.phi(),
        cand.mass()
    );
    println!("vertex: {:?}", cand.vertex());
    println!("dxy={:.5} dz={:.5} dxy_err={:.5}", cand.dxy(), cand.dz(), cand.dxy_error()?);
    println!("puppi: {} / {}", cand.puppi_weight(), cand.puppi_weight_no_lep());

    let reloaded = PackedCandidate::from_packed(*cand.fields(), Some(pvs));
    let pseudo = reloaded.pseudo_track()?;
    println!(
        "pseudo track: pt={:.4} ndof={} hits={} high_purity={}",
        pseudo.pt(),
        pseudo.ndof(),
        pseudo.hit_pattern().number_of_valid_hits(),
        pseudo.quality(TrackQuality::HighPurity)
    );
    Ok(())
}

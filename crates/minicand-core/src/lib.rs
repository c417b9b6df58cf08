pub mod candidate;
pub mod config;
pub mod covariance;
pub mod error;
pub mod hit_pattern;
pub mod math;
pub mod packed;
pub mod track;
pub mod vertex;

pub use candidate::Candidate;
pub use config::CodecConfig;
pub use covariance::{CovarianceParameterization, PackedCovariance};
pub use error::CandidateError;
pub use hit_pattern::{HitCategory, HitPattern, HitSummary, HitType, LostInnerHits, SubDetector};
pub use math::{CovarianceMatrix, LorentzVector, Point, PolarLorentzVector, Vector3};
pub use packed::{
    Displacement, PackedCandidate, PackedFields, PvAssociationQuality, TrackAtVertex,
    TrackProperties,
};
pub use track::{Track, TrackQuality};
pub use vertex::{VertexLookup, VertexRef};

/// A unified builder for packed candidates.
///
/// ## Mechanical Sympathy: Pack Once
/// Every input is collected first and quantized in a single pass, so the
/// record never goes through intermediate re-packs.
pub struct CandidateBuilder {
    p4: PolarLorentzVector,
    vertex: Point,
    track_at_vertex: Option<TrackAtVertex>,
    pdg_id: i32,
    pv: Option<VertexRef>,
    puppi: Option<(f32, f32)>,
    pub config: CodecConfig,
}

impl CandidateBuilder {
    pub fn new(p4: PolarLorentzVector) -> Self {
        Self {
            p4,
            vertex: Point::ORIGIN,
            track_at_vertex: None,
            pdg_id: 0,
            pv: None,
            puppi: None,
            config: CodecConfig::default(),
        }
    }

    pub fn vertex(mut self, vertex: Point) -> Self {
        self.vertex = vertex;
        self
    }

    /// Track momentum at the point of closest approach. Defaults to the
    /// candidate momentum.
    pub fn track_at_vertex(mut self, track: TrackAtVertex) -> Self {
        self.track_at_vertex = Some(track);
        self
    }

    pub fn pdg_id(mut self, pdg_id: i32) -> Self {
        self.pdg_id = pdg_id;
        self
    }

    pub fn primary_vertex(mut self, pv: VertexRef) -> Self {
        self.pv = Some(pv);
        self
    }

    pub fn puppi_weights(mut self, weight: f32, weight_no_lep: f32) -> Self {
        self.puppi = Some((weight, weight_no_lep));
        self
    }

    /// Overrides the default codec configuration.
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> PackedCandidate {
        let track = self
            .track_at_vertex
            .unwrap_or_else(|| TrackAtVertex::from_p4(&self.p4));
        let mut cand = PackedCandidate::new(&self.p4, &self.vertex, &track, self.pdg_id, self.pv);
        if let Some((weight, weight_no_lep)) = self.puppi {
            cand.set_puppi_weight(weight, weight_no_lep);
        }
        cand
    }

    /// Builds a charged candidate carrying `track`'s summary, packed with the
    /// configured covariance schema.
    ///
    /// The covariance is quantized with the configured table when one is set,
    /// otherwise with the process-wide table. Records packed with a custom
    /// table decode through [`PackedCandidate::covariance_with`].
    pub fn build_with_track(self, track: &Track) -> Result<PackedCandidate, CandidateError> {
        let props = TrackProperties::from_track(track, self.config.default_covariance_schema);
        let table = self
            .config
            .covariance_table
            .is_some()
            .then(|| CovarianceParameterization::from_config(&self.config));
        let mut cand = self.build();
        match &table {
            Some(table) => cand.set_track_properties_with(&props, table)?,
            None => cand.set_track_properties(&props)?,
        }
        Ok(cand)
    }
}

//! # minicand-core: Packed Candidate
//!
//! A fixed-size lossy record of one reconstructed particle. The persisted
//! state is [`PackedFields`]; everything else is rebuilt from it on first
//! access and cached in publish-once slots.
//!
//! ## Lazy Materialization
//! Readers share `&PackedCandidate` across threads. The first reader of a
//! derived object decodes it and publishes it with a single CAS; concurrent
//! first readers may all decode, exactly one result is kept. Polar momentum
//! is published before the Cartesian one, which doubles as the "kinematics
//! ready" guard. Every re-pack takes `&mut self` and clears the slots.

use crate::covariance::{CovarianceParameterization, PackedCovariance};
use crate::error::CandidateError;
use crate::hit_pattern::{HitPattern, HitSummary, LostInnerHits};
use crate::math::{
    delta_phi, reduce_range, CovarianceMatrix, LorentzVector, Point, PolarLorentzVector, Vector3,
};
use crate::track::{Track, TrackQuality};
use crate::vertex::{VertexLookup, VertexRef};
use crate::Candidate;
use minicand_codec::{
    decode16, encode16, fixed, float16_to32, float32_to16, logint, percent, Encoding16,
};
use minicand_dsa::{BitField, OnceSlot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ETA_RANGE: f32 = 6.0;
pub const PHI_RANGE: f32 = 3.2;
/// Range of the fixed-point `dz` used when the record has no reference vertex.
pub const DZ_RANGE_NO_PV: f32 = 40.0;
/// Scale applied to impact parameters before minifloat packing.
pub const IMPACT_SCALE: f32 = 100.0;
pub const MIN_DETA_TO_STORE: f32 = 0.001;
pub const MIN_DTRKPT_TO_STORE: f32 = 0.001;
/// `pv_key` of a record without a reference vertex.
pub const NO_PV: u16 = u16::MAX;

const PUPPI_LMIN: f64 = -2.0;
const PUPPI_LMAX: f64 = 0.0;
const PUPPI_LEVELS: u8 = 64;

const ASSOCIATION_QUALITY: BitField = BitField::span(3, 0);
const TRACK_HIGH_PURITY: BitField = BitField::span(1, 3);
const LOST_INNER_HITS: BitField = BitField::span(2, 4);

const PIXEL_COUNT: BitField = BitField::span(3, 0);
const STRIP_COUNT: BitField = BitField::span(5, 3);

/// How the candidate was associated with its reference vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PvAssociationQuality {
    NotReconstructedPrimary = 0,
    OtherDeltaZ = 1,
    CompatibilityBTag = 4,
    CompatibilityDz = 5,
    UsedInFitLoose = 6,
    UsedInFitTight = 7,
}

impl PvAssociationQuality {
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::NotReconstructedPrimary),
            1 => Some(Self::OtherDeltaZ),
            4 => Some(Self::CompatibilityBTag),
            5 => Some(Self::CompatibilityDz),
            6 => Some(Self::UsedInFitLoose),
            7 => Some(Self::UsedInFitTight),
            _ => None,
        }
    }
}

/// The persisted layout. Nothing outside these fields survives storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackedFields {
    pub packed_pt: u16,
    pub packed_eta: i16,
    pub packed_phi: i16,
    pub packed_mass: u16,
    pub packed_dxy: u16,
    pub packed_dz: u16,
    pub packed_dphi: i16,
    pub packed_deta: u16,
    pub packed_dtrkpt: u16,
    pub packed_covariance: PackedCovariance,
    pub packed_puppi_weight: i8,
    pub packed_puppi_weight_no_lep_diff: i8,
    pub raw_calo_fraction: u8,
    pub hcal_fraction: u8,
    pub packed_hits: u8,
    pub packed_layers: u8,
    pub normalized_chi2: u8,
    pub quality_flags: u16,
    pub covariance_schema: u16,
    pub covariance_version: u16,
    pub pdg_id: i32,
    pub pv_key: u16,
    pub isolated_charged_hadron: bool,
}

static_assertions::const_assert!(core::mem::size_of::<PackedFields>() <= 56);

impl Default for PackedFields {
    fn default() -> Self {
        Self {
            packed_pt: 0,
            packed_eta: 0,
            packed_phi: 0,
            packed_mass: 0,
            packed_dxy: 0,
            packed_dz: 0,
            packed_dphi: 0,
            packed_deta: 0,
            packed_dtrkpt: 0,
            packed_covariance: PackedCovariance::default(),
            packed_puppi_weight: 0,
            packed_puppi_weight_no_lep_diff: 0,
            raw_calo_fraction: 0,
            hcal_fraction: 0,
            packed_hits: 0,
            packed_layers: 0,
            normalized_chi2: 0,
            quality_flags: LOST_INNER_HITS.set(0, LostInnerHits::NoLostInnerHits.code()),
            covariance_schema: 0,
            covariance_version: 0,
            pdg_id: 0,
            pv_key: NO_PV,
            isolated_charged_hadron: false,
        }
    }
}

/// Decoded vertex displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    /// Absolute position of the point of closest approach.
    pub position: Point,
    pub dxy: f32,
    pub dz: f32,
    pub dphi: f32,
    pub deta: f32,
    pub dtrkpt: f32,
}

/// Track momentum direction and magnitude at the point of closest approach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackAtVertex {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
}

impl TrackAtVertex {
    /// The candidate's own momentum, i.e. no deltas.
    pub fn from_p4(p4: &PolarLorentzVector) -> Self {
        Self {
            pt: p4.pt,
            eta: p4.eta,
            phi: p4.phi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Deltas {
    dphi: f32,
    deta: f32,
    dtrkpt: f32,
}

impl Deltas {
    fn between(p4: &PolarLorentzVector, track: &TrackAtVertex) -> Self {
        let deta = (track.eta - p4.eta) as f32;
        let dtrkpt = (track.pt - p4.pt) as f32;
        Self {
            dphi: delta_phi(track.phi, p4.phi) as f32,
            deta: if deta.abs() >= MIN_DETA_TO_STORE { deta } else { 0.0 },
            dtrkpt: if dtrkpt.abs() >= MIN_DTRKPT_TO_STORE { dtrkpt } else { 0.0 },
        }
    }

    fn of(d: &Displacement) -> Self {
        Self {
            dphi: d.dphi,
            deta: d.deta,
            dtrkpt: d.dtrkpt,
        }
    }
}

/// Track-level inputs packed by [`PackedCandidate::set_track_properties`].
#[derive(Debug, Clone, Copy)]
pub struct TrackProperties<'a> {
    pub hit_pattern: &'a HitPattern,
    pub normalized_chi2: f32,
    pub covariance: &'a CovarianceMatrix,
    pub covariance_schema: u16,
    pub high_purity: bool,
}

impl<'a> TrackProperties<'a> {
    pub fn from_track(track: &'a Track, covariance_schema: u16) -> Self {
        Self {
            hit_pattern: track.hit_pattern(),
            normalized_chi2: track.normalized_chi2(),
            covariance: track.covariance(),
            covariance_schema,
            high_purity: track.quality(TrackQuality::HighPurity),
        }
    }
}

/// Electric charge implied by a PDG id; zero for neutral and unknown ids.
pub fn charge_from_pdg_id(pdg_id: i32) -> i32 {
    let sign = pdg_id.signum();
    match pdg_id.abs() {
        211 | 321 | 2212 | 24 | 3222 => sign,
        11 | 13 | 15 | 3112 | 3312 | 3334 => -sign,
        _ => 0,
    }
}

#[derive(Clone)]
pub struct PackedCandidate {
    fields: PackedFields,
    pv_source: Option<Arc<dyn VertexLookup>>,
    p4: OnceSlot<PolarLorentzVector>,
    p4c: OnceSlot<LorentzVector>,
    vertex: OnceSlot<Displacement>,
    covariance: OnceSlot<CovarianceMatrix>,
    track: OnceSlot<Track>,
}

static_assertions::assert_impl_all!(PackedCandidate: Send, Sync, Clone);

impl PackedCandidate {
    /// Packs a candidate from full-precision inputs.
    pub fn new(
        p4: &PolarLorentzVector,
        vertex: &Point,
        track_at_vertex: &TrackAtVertex,
        pdg_id: i32,
        pv: Option<VertexRef>,
    ) -> Self {
        let fields = PackedFields {
            pdg_id,
            pv_key: pv.as_ref().map_or(NO_PV, VertexRef::key),
            ..PackedFields::default()
        };
        let mut cand = Self::from_packed(fields, pv.map(|r| r.source().clone()));
        cand.pack_both(p4, vertex, Deltas::between(p4, track_at_vertex));
        cand
    }

    /// Rebuilds a record from its persisted fields. Caches start empty.
    ///
    /// `pv_source` resolves `fields.pv_key`; it is ignored when the record
    /// has no reference vertex.
    pub fn from_packed(fields: PackedFields, pv_source: Option<Arc<dyn VertexLookup>>) -> Self {
        Self {
            fields,
            pv_source,
            p4: OnceSlot::new(),
            p4c: OnceSlot::new(),
            vertex: OnceSlot::new(),
            covariance: OnceSlot::new(),
            track: OnceSlot::new(),
        }
    }

    pub fn fields(&self) -> &PackedFields {
        &self.fields
    }

    pub fn into_fields(self) -> PackedFields {
        self.fields
    }

    fn invalidate(&mut self) {
        self.p4.clear();
        self.p4c.clear();
        self.vertex.clear();
        self.covariance.clear();
        self.track.clear();
    }

    fn pack_both(&mut self, p4: &PolarLorentzVector, vertex: &Point, deltas: Deltas) {
        self.invalidate();
        self.pack_kinematics(p4);
        self.pack_vertex(p4, vertex, deltas);
    }

    fn pack_kinematics(&mut self, p4: &PolarLorentzVector) {
        let f = &mut self.fields;
        f.packed_pt = float32_to16(p4.pt as f32);
        f.packed_eta = fixed::encode::<f64, i16>(p4.eta, f64::from(ETA_RANGE));
        f.packed_phi = fixed::encode::<f64, i16>(p4.phi, f64::from(PHI_RANGE));
        f.packed_mass = float32_to16(p4.mass as f32);
    }

    fn dz_encoding(&self) -> Encoding16 {
        if self.has_reference_vertex() {
            Encoding16::MiniFloat {
                scale: IMPACT_SCALE,
            }
        } else {
            Encoding16::Fixed {
                range: DZ_RANGE_NO_PV,
            }
        }
    }

    /// Stores `vertex` as impact parameters against the reference point,
    /// along the direction `p4.phi + dphi`.
    fn pack_vertex(&mut self, p4: &PolarLorentzVector, vertex: &Point, deltas: Deltas) {
        let pv = self.reference_point();
        let dx = (vertex.x - pv.x) as f32;
        let dy = (vertex.y - pv.y) as f32;
        // sin takes the single-precision sum, cos the double-precision one.
        let s = (p4.phi as f32 + deltas.dphi).sin();
        let c = ((p4.phi + f64::from(deltas.dphi)) as f32).cos();
        let dxy = -dx * s + dy * c;
        let pzpt = if p4.pt != 0.0 {
            (p4.pz() / p4.pt) as f32
        } else {
            0.0
        };
        let dz = (vertex.z - pv.z - f64::from((dx * c + dy * s) * pzpt)) as f32;

        let dz_encoding = self.dz_encoding();
        let f = &mut self.fields;
        f.packed_dxy = encode16(
            dxy,
            Encoding16::MiniFloat {
                scale: IMPACT_SCALE,
            },
        );
        f.packed_dz = encode16(dz, dz_encoding);
        f.packed_dphi = fixed::encode::<f32, i16>(deltas.dphi, PHI_RANGE);
        f.packed_deta = float32_to16(deltas.deta);
        f.packed_dtrkpt = float32_to16(deltas.dtrkpt);
    }

    fn unpack(&self) -> (&PolarLorentzVector, &LorentzVector) {
        let f = &self.fields;
        let pt = float16_to32(f.packed_pt);
        let ptd = f64::from(pt);
        let shift = if pt < 1.0 { 0.1 * ptd } else { 0.1 / ptd };
        let sign = if (pt * 10.0) as i32 % 2 == 0 { 1.0 } else { -1.0 };
        let phi = f64::from(fixed::decode::<f32, i16>(f.packed_phi, PHI_RANGE))
            + sign * shift * 3.2 / f64::from(i16::MAX);
        let eta = fixed::decode::<f32, i16>(f.packed_eta, ETA_RANGE);
        let mass = float16_to32(f.packed_mass);

        let polar = self
            .p4
            .publish(PolarLorentzVector::new(ptd, f64::from(eta), phi, f64::from(mass)));
        let cartesian = self.p4c.publish(LorentzVector::from(polar));
        (polar, cartesian)
    }

    fn kinematics(&self) -> (&PolarLorentzVector, &LorentzVector) {
        if let Some(cartesian) = self.p4c.get() {
            if let Some(polar) = self.p4.get() {
                return (polar, cartesian);
            }
        }
        self.unpack()
    }

    fn unpack_vertex(&self) -> Displacement {
        let (polar, _) = self.kinematics();
        let f = &self.fields;
        let dphi = fixed::decode::<f32, i16>(f.packed_dphi, PHI_RANGE);
        let dxy = decode16(
            f.packed_dxy,
            Encoding16::MiniFloat {
                scale: IMPACT_SCALE,
            },
        );
        let dz = decode16(f.packed_dz, self.dz_encoding());
        let pv = self.reference_point();
        let (s, c) = ((polar.phi + f64::from(dphi)) as f32).sin_cos();
        Displacement {
            position: Point::new(
                pv.x - f64::from(dxy * s),
                pv.y + f64::from(dxy * c),
                pv.z + f64::from(dz),
            ),
            dxy,
            dz,
            dphi,
            deta: float16_to32(f.packed_deta),
            dtrkpt: float16_to32(f.packed_dtrkpt),
        }
    }

    /// The decoded displacement, unpacking kinematics first if needed.
    pub fn displacement(&self) -> &Displacement {
        self.vertex.get_or_publish_with(|| self.unpack_vertex())
    }

    pub fn has_reference_vertex(&self) -> bool {
        self.fields.pv_key != NO_PV
    }

    pub fn vertex_ref(&self) -> Option<VertexRef> {
        if !self.has_reference_vertex() {
            return None;
        }
        self.pv_source
            .as_ref()
            .map(|source| VertexRef::new(source.clone(), self.fields.pv_key))
    }

    /// Position of the reference vertex, or the origin without one.
    pub fn reference_point(&self) -> Point {
        if !self.has_reference_vertex() {
            return Point::ORIGIN;
        }
        let key = self.fields.pv_key;
        match self.pv_source.as_ref().and_then(|source| source.position(key)) {
            Some(position) => position,
            None => {
                tracing::warn!(key, "reference vertex unresolved; using origin");
                Point::ORIGIN
            }
        }
    }

    /// Replaces the momentum, keeping vertex position and track deltas.
    pub fn set_p4(&mut self, p4: &PolarLorentzVector) {
        let d = *self.displacement();
        self.pack_both(p4, &d.position, Deltas::of(&d));
    }

    /// Moves the point of closest approach, keeping momentum and deltas.
    pub fn set_vertex(&mut self, vertex: &Point) {
        let polar = *self.kinematics().0;
        let d = *self.displacement();
        self.invalidate();
        self.pack_vertex(&polar, vertex, Deltas::of(&d));
    }

    /// Changes the reference vertex, re-expressing the current position
    /// against it.
    pub fn set_vertex_ref(&mut self, pv: Option<VertexRef>) {
        let polar = *self.kinematics().0;
        let d = *self.displacement();
        self.fields.pv_key = pv.as_ref().map_or(NO_PV, VertexRef::key);
        self.pv_source = pv.map(|r| r.source().clone());
        self.invalidate();
        self.pack_vertex(&polar, &d.position, Deltas::of(&d));
    }

    pub fn set_pdg_id(&mut self, pdg_id: i32) {
        self.fields.pdg_id = pdg_id;
        self.track.clear();
    }

    pub fn pt_trk(&self) -> f32 {
        self.pt() as f32 + self.displacement().dtrkpt
    }

    pub fn eta_at_vtx(&self) -> f32 {
        self.eta() as f32 + self.displacement().deta
    }

    pub fn phi_at_vtx(&self) -> f32 {
        reduce_range(self.phi() + f64::from(self.displacement().dphi)) as f32
    }

    /// Transverse impact parameter against the reference vertex.
    pub fn dxy(&self) -> f32 {
        self.displacement().dxy
    }

    /// Longitudinal impact parameter against the reference vertex.
    pub fn dz(&self) -> f32 {
        self.displacement().dz
    }

    pub fn dxy_to(&self, point: &Point) -> f32 {
        let d = self.displacement();
        let phi = self.phi() as f32 + d.dphi;
        let (s, c) = phi.sin_cos();
        -((d.position.x - point.x) as f32) * s + (d.position.y - point.y) as f32 * c
    }

    pub fn dz_to(&self, point: &Point) -> f32 {
        let d = self.displacement();
        let (polar, _) = self.kinematics();
        let (s, c) = (polar.phi as f32 + d.dphi).sin_cos();
        let pzpt = (polar.pz() / polar.pt) as f32;
        (d.position.z - point.z) as f32
            - ((d.position.x - point.x) as f32 * c + (d.position.y - point.y) as f32 * s) * pzpt
    }

    // Covariance

    fn decoded_pt(&self) -> f32 {
        float16_to32(self.fields.packed_pt)
    }

    /// Quantizes `cov` with the process-wide parameterization.
    pub fn pack_covariance(
        &mut self,
        cov: &CovarianceMatrix,
        schema: u16,
    ) -> Result<(), CandidateError> {
        self.pack_covariance_with(cov, schema, CovarianceParameterization::global())
    }

    pub fn pack_covariance_with(
        &mut self,
        cov: &CovarianceMatrix,
        schema: u16,
        table: &CovarianceParameterization,
    ) -> Result<(), CandidateError> {
        let packed = table.pack_matrix(schema, cov, self.decoded_pt())?;
        self.covariance.clear();
        self.track.clear();
        self.fields.packed_covariance = packed;
        self.fields.covariance_schema = schema;
        self.fields.covariance_version = table.version();
        Ok(())
    }

    /// Track-parameter covariance, decoded with the process-wide table.
    pub fn covariance(&self) -> Result<&CovarianceMatrix, CandidateError> {
        self.covariance_with(CovarianceParameterization::global())
    }

    /// Like [`covariance`](Self::covariance) with an explicit table. The
    /// first successful decode is cached regardless of the table used later.
    pub fn covariance_with(
        &self,
        table: &CovarianceParameterization,
    ) -> Result<&CovarianceMatrix, CandidateError> {
        self.covariance.get_or_try_publish_with(|| {
            table.unpack_matrix(
                self.fields.covariance_schema,
                self.fields.covariance_version,
                &self.fields.packed_covariance,
                self.decoded_pt(),
            )
        })
    }

    pub fn dxy_error(&self) -> Result<f32, CandidateError> {
        Ok(self.covariance()?.get(3, 3).sqrt() as f32)
    }

    pub fn dz_error(&self) -> Result<f32, CandidateError> {
        Ok(self.covariance()?.get(4, 4).sqrt() as f32)
    }

    // Track summary

    pub fn set_track_properties(
        &mut self,
        props: &TrackProperties<'_>,
    ) -> Result<(), CandidateError> {
        self.set_track_properties_with(props, CovarianceParameterization::global())
    }

    pub fn set_track_properties_with(
        &mut self,
        props: &TrackProperties<'_>,
        table: &CovarianceParameterization,
    ) -> Result<(), CandidateError> {
        self.pack_covariance_with(props.covariance, props.covariance_schema, table)?;
        self.fields.normalized_chi2 = props.normalized_chi2.clamp(0.0, 255.0) as u8;
        self.set_hits(props.hit_pattern);
        self.set_lost_inner_hits(LostInnerHits::from_hit_pattern(props.hit_pattern));
        self.set_track_high_purity(props.high_purity);
        Ok(())
    }

    /// Packs the layer and hit counts of `pattern`.
    pub fn set_hits(&mut self, pattern: &HitPattern) {
        self.set_hit_summary(&pattern.summary());
    }

    /// Packs aggregate counts, clamping each to its field width.
    pub fn set_hit_summary(&mut self, summary: &HitSummary) {
        let clamp = |field: BitField, n: usize| n.min(usize::from(field.max_value())) as u16;
        let pixel_layers = clamp(PIXEL_COUNT, summary.pixel_layers);
        let strip_layers = clamp(STRIP_COUNT, summary.strip_layers);
        let extra_pixel = clamp(
            PIXEL_COUNT,
            summary.pixel_hits.saturating_sub(usize::from(pixel_layers)),
        );
        let strip_hits = summary.hits.saturating_sub(summary.pixel_hits);
        let extra_strip = clamp(STRIP_COUNT, strip_hits.saturating_sub(usize::from(strip_layers)));

        let layers = STRIP_COUNT.set(PIXEL_COUNT.set(0, pixel_layers), strip_layers);
        let hits = STRIP_COUNT.set(PIXEL_COUNT.set(0, extra_pixel), extra_strip);
        self.fields.packed_layers = layers as u8;
        self.fields.packed_hits = hits as u8;
        self.track.clear();
    }

    pub fn pixel_layers_with_measurement(&self) -> usize {
        usize::from(PIXEL_COUNT.get(u16::from(self.fields.packed_layers)))
    }

    pub fn strip_layers_with_measurement(&self) -> usize {
        usize::from(STRIP_COUNT.get(u16::from(self.fields.packed_layers)))
    }

    pub fn tracker_layers_with_measurement(&self) -> usize {
        self.pixel_layers_with_measurement() + self.strip_layers_with_measurement()
    }

    pub fn number_of_pixel_hits(&self) -> usize {
        usize::from(PIXEL_COUNT.get(u16::from(self.fields.packed_hits)))
            + self.pixel_layers_with_measurement()
    }

    pub fn number_of_hits(&self) -> usize {
        usize::from(STRIP_COUNT.get(u16::from(self.fields.packed_hits)))
            + self.strip_layers_with_measurement()
            + self.number_of_pixel_hits()
    }

    pub fn hit_summary(&self) -> HitSummary {
        HitSummary {
            pixel_layers: self.pixel_layers_with_measurement(),
            strip_layers: self.strip_layers_with_measurement(),
            pixel_hits: self.number_of_pixel_hits(),
            hits: self.number_of_hits(),
            lost_inner_hits: self.lost_inner_hits(),
        }
    }

    pub fn normalized_chi2(&self) -> f32 {
        f32::from(self.fields.normalized_chi2)
    }

    pub fn set_lost_inner_hits(&mut self, lost: LostInnerHits) {
        self.fields.quality_flags = LOST_INNER_HITS.set(self.fields.quality_flags, lost.code());
        self.track.clear();
    }

    pub fn lost_inner_hits(&self) -> LostInnerHits {
        LostInnerHits::from_code(LOST_INNER_HITS.get(self.fields.quality_flags))
    }

    pub fn set_track_high_purity(&mut self, high_purity: bool) {
        self.fields.quality_flags =
            TRACK_HIGH_PURITY.set(self.fields.quality_flags, u16::from(high_purity));
        self.track.clear();
    }

    pub fn track_high_purity(&self) -> bool {
        TRACK_HIGH_PURITY.get(self.fields.quality_flags) != 0
    }

    pub fn set_association_quality(&mut self, quality: PvAssociationQuality) {
        self.fields.quality_flags =
            ASSOCIATION_QUALITY.set(self.fields.quality_flags, quality as u16);
    }

    /// `None` for codes outside the defined qualities.
    pub fn association_quality(&self) -> Option<PvAssociationQuality> {
        PvAssociationQuality::from_code(ASSOCIATION_QUALITY.get(self.fields.quality_flags))
    }

    /// The synthetic track rebuilt from the packed summary.
    ///
    /// Fails when the covariance cannot be decoded.
    pub fn pseudo_track(&self) -> Result<&Track, CandidateError> {
        self.track.get_or_try_publish_with(|| self.unpack_track())
    }

    /// Alias of [`pseudo_track`](Self::pseudo_track).
    pub fn best_track(&self) -> Result<&Track, CandidateError> {
        self.pseudo_track()
    }

    fn unpack_track(&self) -> Result<Track, CandidateError> {
        let position = self.displacement().position;
        let covariance = *self.covariance()?;
        let momentum = Vector3::from_rho_eta_phi(
            f64::from(self.pt_trk()),
            f64::from(self.eta_at_vtx()),
            f64::from(self.phi_at_vtx()),
        );
        let summary = self.hit_summary();
        let ndof = (summary.hits + summary.pixel_hits) as f32 - 5.0;
        let mut track = Track::new(
            self.normalized_chi2() * ndof,
            ndof,
            position,
            momentum,
            self.charge(),
            covariance,
        )
        .with_hit_pattern(HitPattern::synthesize(&summary));
        track.set_quality(TrackQuality::Loose);
        if self.track_high_purity() {
            track.set_quality(TrackQuality::HighPurity);
        }
        Ok(track)
    }

    // Weights and fractions

    /// Sets both pileup weights; the second is stored as a code delta.
    pub fn set_puppi_weight(&mut self, weight: f32, weight_no_lep: f32) {
        let pack = |w: f32| {
            let x = (f64::from(w) - 0.5) * 2.0;
            logint::pack8_log_closed(x, PUPPI_LMIN, PUPPI_LMAX, PUPPI_LEVELS)
        };
        let primary = pack(weight);
        self.fields.packed_puppi_weight = primary;
        self.fields.packed_puppi_weight_no_lep_diff = pack(weight_no_lep).wrapping_sub(primary);
    }

    fn unpack_puppi(code: i8) -> f32 {
        (logint::unpack8_log_closed(code, PUPPI_LMIN, PUPPI_LMAX, PUPPI_LEVELS) / 2.0 + 0.5) as f32
    }

    pub fn puppi_weight(&self) -> f32 {
        Self::unpack_puppi(self.fields.packed_puppi_weight)
    }

    pub fn puppi_weight_no_lep(&self) -> f32 {
        Self::unpack_puppi(
            self.fields
                .packed_puppi_weight
                .wrapping_add(self.fields.packed_puppi_weight_no_lep_diff),
        )
    }

    pub fn set_raw_calo_fraction(&mut self, fraction: f32) {
        self.fields.raw_calo_fraction = percent::encode(fraction);
    }

    pub fn raw_calo_fraction(&self) -> f32 {
        percent::decode(self.fields.raw_calo_fraction)
    }

    pub fn set_hcal_fraction(&mut self, fraction: f32) {
        self.fields.hcal_fraction = percent::encode(fraction);
    }

    pub fn hcal_fraction(&self) -> f32 {
        percent::decode(self.fields.hcal_fraction)
    }

    pub fn set_isolated_charged_hadron(&mut self, isolated: bool) {
        self.fields.isolated_charged_hadron = isolated;
    }

    pub fn is_isolated_charged_hadron(&self) -> bool {
        self.fields.isolated_charged_hadron
    }
}

impl Candidate for PackedCandidate {
    fn polar_p4(&self) -> &PolarLorentzVector {
        self.kinematics().0
    }

    fn p4(&self) -> &LorentzVector {
        self.kinematics().1
    }

    fn vertex(&self) -> &Point {
        &self.displacement().position
    }

    fn charge(&self) -> i32 {
        charge_from_pdg_id(self.fields.pdg_id)
    }

    fn pdg_id(&self) -> i32 {
        self.fields.pdg_id
    }
}

impl std::fmt::Debug for PackedCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedCandidate")
            .field("fields", &self.fields)
            .field("p4", &self.p4)
            .field("vertex", &self.vertex)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit_pattern::{HitType, SubDetector};

    fn pion() -> PackedCandidate {
        let p4 = PolarLorentzVector::new(10.0, 1.0, 0.0, 0.13957);
        PackedCandidate::new(&p4, &Point::ORIGIN, &TrackAtVertex::from_p4(&p4), 211, None)
    }

    #[test]
    fn test_charge_from_pdg_id() {
        assert_eq!(charge_from_pdg_id(211), 1);
        assert_eq!(charge_from_pdg_id(-211), -1);
        assert_eq!(charge_from_pdg_id(11), -1);
        assert_eq!(charge_from_pdg_id(-13), 1);
        assert_eq!(charge_from_pdg_id(22), 0);
        assert_eq!(charge_from_pdg_id(130), 0);
    }

    #[test]
    fn test_default_fields_have_no_reference() {
        let fields = PackedFields::default();
        assert_eq!(fields.pv_key, NO_PV);
        let cand = PackedCandidate::from_packed(fields, None);
        assert!(!cand.has_reference_vertex());
        assert_eq!(cand.lost_inner_hits(), LostInnerHits::NoLostInnerHits);
        assert_eq!(cand.reference_point(), Point::ORIGIN);
    }

    #[test]
    fn test_small_deltas_are_not_stored() {
        let p4 = PolarLorentzVector::new(5.0, 0.5, 1.0, 0.0);
        let trk = TrackAtVertex {
            pt: 5.0005,
            eta: 0.5004,
            phi: 1.01,
        };
        let cand = PackedCandidate::new(&p4, &Point::ORIGIN, &trk, 211, None);
        assert_eq!(cand.fields().packed_deta, 0);
        assert_eq!(cand.fields().packed_dtrkpt, 0);
        assert!((cand.displacement().dphi - 0.01).abs() < 1e-4);
    }

    #[test]
    fn test_quality_flag_fields_are_independent() {
        let mut cand = pion();
        cand.set_association_quality(PvAssociationQuality::UsedInFitTight);
        cand.set_track_high_purity(true);
        cand.set_lost_inner_hits(LostInnerHits::MoreLostInnerHits);
        assert_eq!(cand.association_quality(), Some(PvAssociationQuality::UsedInFitTight));
        assert!(cand.track_high_purity());
        assert_eq!(cand.lost_inner_hits(), LostInnerHits::MoreLostInnerHits);
        cand.set_track_high_purity(false);
        assert_eq!(cand.association_quality(), Some(PvAssociationQuality::UsedInFitTight));
        assert_eq!(cand.lost_inner_hits(), LostInnerHits::MoreLostInnerHits);
    }

    #[test]
    fn test_set_hits_matches_pattern_statistics() {
        let mut hp = HitPattern::new();
        hp.append_track_hit(SubDetector::PixelBarrel, 1, false, HitType::Valid);
        hp.append_track_hit(SubDetector::PixelBarrel, 2, false, HitType::Valid);
        hp.append_track_hit(SubDetector::PixelBarrel, 2, false, HitType::Valid);
        for layer in 1..=4 {
            hp.append_track_hit(SubDetector::Tib, layer, false, HitType::Valid);
            hp.append_track_hit(SubDetector::Tib, layer, true, HitType::Valid);
        }
        let mut cand = pion();
        cand.set_hits(&hp);
        assert_eq!(cand.pixel_layers_with_measurement(), 2);
        assert_eq!(cand.strip_layers_with_measurement(), 4);
        assert_eq!(cand.number_of_pixel_hits(), 3);
        assert_eq!(cand.number_of_hits(), 11);
    }

    #[test]
    fn test_set_hits_clamps_to_field_width() {
        let mut cand = pion();
        cand.set_hit_summary(&HitSummary {
            pixel_layers: 9,
            strip_layers: 40,
            pixel_hits: 20,
            hits: 120,
            lost_inner_hits: LostInnerHits::NoLostInnerHits,
        });
        assert_eq!(cand.pixel_layers_with_measurement(), 7);
        assert_eq!(cand.strip_layers_with_measurement(), 31);
        assert_eq!(cand.number_of_pixel_hits(), 14);
        assert_eq!(cand.number_of_hits(), 14 + 31 + 31);
    }

    #[test]
    fn test_repack_clears_caches() {
        let mut cand = pion();
        let before = cand.pt();
        cand.set_p4(&PolarLorentzVector::new(20.0, 1.0, 0.0, 0.13957));
        assert!((cand.pt() - 20.0).abs() / 20.0 < 1e-3);
        assert!((before - 10.0).abs() / 10.0 < 1e-3);
    }
}

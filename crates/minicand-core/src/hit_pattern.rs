//! # minicand-core: Hit Patterns
//!
//! An ordered list of tracker hits with the aggregate statistics the packed
//! record keeps, and the synthetic pattern rebuilt from those statistics.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SubDetector {
    PixelBarrel = 1,
    PixelEndcap = 2,
    Tib = 3,
    Tid = 4,
    Tob = 5,
    Tec = 6,
}

impl SubDetector {
    pub const fn is_pixel(self) -> bool {
        matches!(self, SubDetector::PixelBarrel | SubDetector::PixelEndcap)
    }

    pub const fn is_strip(self) -> bool {
        !self.is_pixel()
    }

    /// Number of layers (or disks/wheels) in the nominal geometry.
    pub const fn layer_count(self) -> u8 {
        match self {
            SubDetector::PixelBarrel => 4,
            SubDetector::PixelEndcap => 3,
            SubDetector::Tib => 4,
            SubDetector::Tid => 3,
            SubDetector::Tob => 6,
            SubDetector::Tec => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitType {
    Valid,
    Missing,
    Inactive,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitCategory {
    TrackHits,
    MissingInnerHits,
    MissingOuterHits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerHit {
    pub subdet: SubDetector,
    pub layer: u8,
    pub stereo: bool,
    pub hit_type: HitType,
    pub category: HitCategory,
}

impl TrackerHit {
    fn is_valid_track_hit(&self) -> bool {
        self.category == HitCategory::TrackHits && self.hit_type == HitType::Valid
    }

    fn layer_bit(&self) -> u128 {
        1u128 << ((self.subdet as u32) * 16 + u32::from(self.layer))
    }
}

/// What the track had before its innermost recorded hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i8)]
pub enum LostInnerHits {
    ValidHitInFirstPixelBarrelLayer = -1,
    #[default]
    NoLostInnerHits = 0,
    OneLostInnerHit = 1,
    MoreLostInnerHits = 2,
}

impl LostInnerHits {
    /// Classifies a full hit pattern.
    pub fn from_hit_pattern(pattern: &HitPattern) -> Self {
        match pattern.number_of_lost_hits(HitCategory::MissingInnerHits) {
            0 if pattern.has_valid_hit_in_pixel_layer(SubDetector::PixelBarrel, 1) => {
                LostInnerHits::ValidHitInFirstPixelBarrelLayer
            }
            0 => LostInnerHits::NoLostInnerHits,
            1 => LostInnerHits::OneLostInnerHit,
            _ => LostInnerHits::MoreLostInnerHits,
        }
    }

    /// Two-bit code stored in the flag word (`value + 1`).
    pub const fn code(self) -> u16 {
        (self as i8 + 1) as u16
    }

    pub const fn from_code(code: u16) -> Self {
        match code {
            0 => LostInnerHits::ValidHitInFirstPixelBarrelLayer,
            1 => LostInnerHits::NoLostInnerHits,
            2 => LostInnerHits::OneLostInnerHit,
            _ => LostInnerHits::MoreLostInnerHits,
        }
    }
}

/// Strip sub-detectors in the order synthetic layers are assigned.
const STRIP_ORDER: [SubDetector; 4] = [
    SubDetector::Tib,
    SubDetector::Tob,
    SubDetector::Tec,
    SubDetector::Tid,
];

/// Distinct strip layers a synthetic pattern can place.
pub const CANONICAL_STRIP_LAYERS: usize = 22;

static_assertions::const_assert_eq!(
    SubDetector::Tib.layer_count() as usize
        + SubDetector::Tob.layer_count() as usize
        + SubDetector::Tec.layer_count() as usize
        + SubDetector::Tid.layer_count() as usize,
    CANONICAL_STRIP_LAYERS
);

/// Maps the `index`-th strip layer (0-based) onto TIB, TOB, TEC, TID.
pub fn canonical_strip_layer(index: usize) -> Option<(SubDetector, u8)> {
    let mut rest = index;
    for subdet in STRIP_ORDER {
        let n = usize::from(subdet.layer_count());
        if rest < n {
            return Some((subdet, rest as u8 + 1));
        }
        rest -= n;
    }
    None
}

/// Aggregate hit statistics as kept in the packed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HitSummary {
    pub pixel_layers: usize,
    pub strip_layers: usize,
    pub pixel_hits: usize,
    pub hits: usize,
    pub lost_inner_hits: LostInnerHits,
}

/// Track hits and expected-inner hits are kept in separate bounded lists, so
/// inner markers never compete with valid hits for capacity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HitPattern {
    hits: Vec<TrackerHit>,
    missing_inner: Vec<TrackerHit>,
}

impl HitPattern {
    /// Capacity of the track-hit list. Holds every valid hit the packed
    /// counts can describe (7 + 7 pixel, 31 + 31 strip).
    pub const MAX_HITS: usize = 80;
    pub const MAX_INNER_HITS: usize = 8;
    pub const MAX_LAYER: u8 = 15;

    pub fn new() -> Self {
        Self {
            hits: Vec::with_capacity(Self::MAX_HITS),
            missing_inner: Vec::new(),
        }
    }

    /// Appends a hit. Returns `false` (and drops the hit) when its list is
    /// full or the layer is not addressable.
    pub fn append_hit(&mut self, hit: TrackerHit) -> bool {
        let (list, capacity) = match hit.category {
            HitCategory::MissingInnerHits => (&mut self.missing_inner, Self::MAX_INNER_HITS),
            _ => (&mut self.hits, Self::MAX_HITS),
        };
        if list.len() >= capacity || hit.layer == 0 || hit.layer > Self::MAX_LAYER {
            tracing::trace!(?hit, "hit pattern: hit dropped");
            return false;
        }
        list.push(hit);
        true
    }

    pub fn append_track_hit(
        &mut self,
        subdet: SubDetector,
        layer: u8,
        stereo: bool,
        hit_type: HitType,
    ) -> bool {
        self.append_hit(TrackerHit {
            subdet,
            layer,
            stereo,
            hit_type,
            category: HitCategory::TrackHits,
        })
    }

    pub fn append_missing_inner_hit(&mut self, subdet: SubDetector, layer: u8) -> bool {
        self.append_hit(TrackerHit {
            subdet,
            layer,
            stereo: false,
            hit_type: HitType::Missing,
            category: HitCategory::MissingInnerHits,
        })
    }

    pub fn len(&self) -> usize {
        self.hits.len() + self.missing_inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.missing_inner.is_empty()
    }

    /// Track hits in order, followed by the expected-inner hits.
    pub fn iter(&self) -> impl Iterator<Item = &TrackerHit> {
        self.hits.iter().chain(self.missing_inner.iter())
    }

    pub fn hits(&self, category: HitCategory) -> impl Iterator<Item = &TrackerHit> {
        self.iter().filter(move |h| h.category == category)
    }

    fn valid_track_hits(&self) -> impl Iterator<Item = &TrackerHit> {
        self.hits.iter().filter(|h| h.is_valid_track_hit())
    }

    pub fn number_of_valid_hits(&self) -> usize {
        self.valid_track_hits().count()
    }

    pub fn number_of_valid_pixel_hits(&self) -> usize {
        self.valid_track_hits().filter(|h| h.subdet.is_pixel()).count()
    }

    pub fn number_of_valid_strip_hits(&self) -> usize {
        self.valid_track_hits().filter(|h| h.subdet.is_strip()).count()
    }

    fn layers_with_measurement(&self, keep: impl Fn(SubDetector) -> bool) -> usize {
        self.valid_track_hits()
            .filter(|h| keep(h.subdet))
            .fold(0u128, |mask, h| mask | h.layer_bit())
            .count_ones() as usize
    }

    pub fn pixel_layers_with_measurement(&self) -> usize {
        self.layers_with_measurement(SubDetector::is_pixel)
    }

    pub fn strip_layers_with_measurement(&self) -> usize {
        self.layers_with_measurement(SubDetector::is_strip)
    }

    pub fn tracker_layers_with_measurement(&self) -> usize {
        self.layers_with_measurement(|_| true)
    }

    pub fn number_of_lost_hits(&self, category: HitCategory) -> usize {
        self.hits(category)
            .filter(|h| h.hit_type == HitType::Missing)
            .count()
    }

    pub fn has_valid_hit_in_pixel_layer(&self, subdet: SubDetector, layer: u8) -> bool {
        subdet.is_pixel()
            && self
                .valid_track_hits()
                .any(|h| h.subdet == subdet && h.layer == layer)
    }

    /// Statistics of this pattern, in the form the packed record keeps them.
    pub fn summary(&self) -> HitSummary {
        HitSummary {
            pixel_layers: self.pixel_layers_with_measurement(),
            strip_layers: self.strip_layers_with_measurement(),
            pixel_hits: self.number_of_valid_pixel_hits(),
            hits: self.number_of_valid_hits(),
            lost_inner_hits: LostInnerHits::from_hit_pattern(self),
        }
    }

    /// Builds a plausible pattern reproducing `summary`.
    ///
    /// Layer placement is canonical, not physical: pixel barrel layers first,
    /// then endcap disks; strip layers in TIB, TOB, TEC, TID order, stopping
    /// after [`CANONICAL_STRIP_LAYERS`]. Surplus hits are piled onto the
    /// innermost used layer of each detector.
    pub fn synthesize(summary: &HitSummary) -> HitPattern {
        use SubDetector::*;

        let mut pattern = HitPattern::new();
        let first_valid = summary.lost_inner_hits == LostInnerHits::ValidHitInFirstPixelBarrelLayer;
        let mut i = 0usize;

        if first_valid {
            pattern.append_track_hit(PixelBarrel, 1, false, HitType::Valid);
            i = 1;
            while i < summary.pixel_layers {
                if i <= 3 {
                    pattern.append_track_hit(PixelBarrel, i as u8 + 1, false, HitType::Valid);
                } else {
                    pattern.append_track_hit(PixelEndcap, (i - 3) as u8, false, HitType::Valid);
                }
                i += 1;
            }
        } else {
            while i < summary.pixel_layers {
                if i <= 2 {
                    pattern.append_track_hit(PixelBarrel, i as u8 + 2, false, HitType::Valid);
                } else {
                    pattern.append_track_hit(PixelEndcap, (i - 2) as u8, false, HitType::Valid);
                }
                i += 1;
            }
        }

        let pile_layer = if first_valid { 1 } else { 2 };
        while i < summary.pixel_hits {
            pattern.append_track_hit(PixelBarrel, pile_layer, false, HitType::Valid);
            i += 1;
        }

        for index in 0..summary.strip_layers {
            let Some((subdet, layer)) = canonical_strip_layer(index) else {
                break;
            };
            pattern.append_track_hit(subdet, layer, true, HitType::Valid);
            i += 1;
        }

        while i < summary.hits {
            pattern.append_track_hit(Tib, 1, true, HitType::Valid);
            i += 1;
        }

        match summary.lost_inner_hits {
            LostInnerHits::OneLostInnerHit => {
                pattern.append_missing_inner_hit(PixelBarrel, 1);
            }
            LostInnerHits::MoreLostInnerHits => {
                pattern.append_missing_inner_hit(PixelBarrel, 1);
                pattern.append_missing_inner_hit(PixelBarrel, 2);
            }
            _ => {}
        }

        pattern
    }
}

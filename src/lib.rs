//! # minicand
//!
//! Compact lossy particle-candidate records with lazily rebuilt,
//! full-precision views.
//!
//! - [`codec`]: scalar bit-level encodings.
//! - [`dsa`]: the publish-once cache cell.
//! - [`record`]: the packed record, its geometry and the shared covariance table.

pub use minicand_codec as codec;
pub use minicand_core as record;
pub use minicand_dsa as dsa;

pub use minicand_core::{
    Candidate, CandidateBuilder, CandidateError, CodecConfig, CovarianceParameterization,
    PackedCandidate, PackedFields,
};

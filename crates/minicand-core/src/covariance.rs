//! # minicand-core: Covariance Parameterization
//!
//! Quantizes the eight populated entries of a 5×5 track covariance into
//! 16-bit codes. Each entry of a schema has its own codec; diagonals are
//! usually stored as a log-ratio against a pt-dependent expectation, cross
//! terms as a correlation coefficient against the already-decoded diagonals.
//!
//! One table is shared by the whole process ([`CovarianceParameterization::global`]).
//! It is loaded on first use and read-only afterwards.

use crate::config::CodecConfig;
use crate::error::CandidateError;
use crate::math::CovarianceMatrix;
use minicand_codec::{decode16, encode16, logint, Encoding16};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// `(i, j)` of each packed entry in storage order. Diagonals come first so
/// that cross terms can be decoded against them.
pub const PACKED_ENTRIES: [(usize, usize); 8] = [
    (0, 0),
    (1, 1),
    (2, 2),
    (3, 3),
    (4, 4),
    (3, 4),
    (1, 4),
    (2, 3),
];

const LOG_BASE: u16 = 32768;
const PT_FLOOR: f32 = 0.1;
const BUILTIN_TABLE: &str = include_str!("../data/covariance_v1.toml");

static GLOBAL: OnceLock<CovarianceParameterization> = OnceLock::new();

/// The eight 16-bit codes, ordered as [`PACKED_ENTRIES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackedCovariance(pub [u16; 8]);

static_assertions::assert_eq_size!(PackedCovariance, [u16; 8]);

fn entry_index(i: usize, j: usize) -> Option<usize> {
    let key = if i <= j { (i, j) } else { (j, i) };
    PACKED_ENTRIES.iter().position(|&e| e == key)
}

/// Per-record inputs an element codec may depend on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackContext {
    /// Decoded transverse momentum of the record.
    pub pt: f32,
    pub cii: f32,
    pub cjj: f32,
}

fn unit() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementCodec {
    Zero,
    Float16 {
        #[serde(default = "unit")]
        scale: f32,
    },
    LogRatio {
        reference: f32,
        #[serde(default)]
        pt_exponent: f32,
        lmin: f64,
        lmax: f64,
    },
    Correlation {
        #[serde(default = "unit")]
        range: f32,
    },
}

impl ElementCodec {
    fn expected(reference: f32, pt_exponent: f32, pt: f32) -> f32 {
        if pt_exponent == 0.0 {
            reference
        } else {
            reference * pt.max(PT_FLOOR).powf(pt_exponent)
        }
    }

    pub fn pack(&self, value: f32, ctx: &PackContext) -> u16 {
        match *self {
            ElementCodec::Zero => 0,
            ElementCodec::Float16 { scale } => encode16(value, Encoding16::MiniFloat { scale }),
            ElementCodec::LogRatio {
                reference,
                pt_exponent,
                lmin,
                lmax,
            } => {
                let ratio = value / Self::expected(reference, pt_exponent, ctx.pt);
                logint::pack16_log(f64::from(ratio), lmin, lmax, LOG_BASE) as u16
            }
            ElementCodec::Correlation { range } => {
                let norm = (ctx.cii * ctx.cjj).sqrt();
                let rho = if norm > 0.0 { value / norm } else { 0.0 };
                encode16(rho, Encoding16::Fixed { range })
            }
        }
    }

    pub fn unpack(&self, code: u16, ctx: &PackContext) -> f32 {
        match *self {
            ElementCodec::Zero => 0.0,
            ElementCodec::Float16 { scale } => decode16(code, Encoding16::MiniFloat { scale }),
            ElementCodec::LogRatio {
                reference,
                pt_exponent,
                lmin,
                lmax,
            } => {
                let ratio = logint::unpack16_log(code as i16, lmin, lmax, LOG_BASE) as f32;
                ratio * Self::expected(reference, pt_exponent, ctx.pt)
            }
            ElementCodec::Correlation { range } => {
                let norm = (ctx.cii * ctx.cjj).sqrt();
                decode16(code, Encoding16::Fixed { range }) * norm
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceSchema {
    codecs: [ElementCodec; 8],
}

impl CovarianceSchema {
    pub fn codec(&self, i: usize, j: usize) -> Option<&ElementCodec> {
        entry_index(i, j).map(|k| &self.codecs[k])
    }
}

#[derive(Deserialize)]
struct TableFile {
    version: u16,
    #[serde(default, rename = "schema")]
    schemas: Vec<SchemaFile>,
}

#[derive(Deserialize)]
struct SchemaFile {
    id: u16,
    #[serde(default)]
    elements: Vec<ElementFile>,
}

#[derive(Deserialize)]
struct ElementFile {
    i: usize,
    j: usize,
    codec: ElementCodec,
}

fn build_schema(file: SchemaFile) -> Result<CovarianceSchema, CandidateError> {
    let mut codecs = [ElementCodec::Zero; 8];
    for element in file.elements {
        let (i, j) = (element.i, element.j);
        let k = entry_index(i, j).ok_or_else(|| {
            CandidateError::Config(format!(
                "schema {}: ({i}, {j}) is not a packed covariance entry",
                file.id
            ))
        })?;
        match element.codec {
            ElementCodec::Correlation { .. } if i == j => {
                return Err(CandidateError::Config(format!(
                    "schema {}: correlation codec on diagonal ({i}, {i})",
                    file.id
                )));
            }
            ElementCodec::LogRatio { lmin, lmax, .. } if lmax <= lmin => {
                return Err(CandidateError::Config(format!(
                    "schema {}: empty log range [{lmin}, {lmax}] at ({i}, {j})",
                    file.id
                )));
            }
            _ => {}
        }
        codecs[k] = element.codec;
    }
    Ok(CovarianceSchema { codecs })
}

/// A versioned set of covariance schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceParameterization {
    version: u16,
    valid: bool,
    schemas: BTreeMap<u16, CovarianceSchema>,
}

impl CovarianceParameterization {
    /// A table that refuses every pack and unpack.
    pub fn invalid() -> Self {
        Self {
            version: 0,
            valid: false,
            schemas: BTreeMap::new(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, CandidateError> {
        let file: TableFile = toml::from_str(text)?;
        let mut schemas = BTreeMap::new();
        for schema in file.schemas {
            let id = schema.id;
            if schemas.insert(id, build_schema(schema)?).is_some() {
                return Err(CandidateError::Config(format!("duplicate schema id {id}")));
            }
        }
        Ok(Self {
            version: file.version,
            valid: true,
            schemas,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CandidateError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let table = Self::from_toml_str(&text)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            version = table.version,
            schemas = table.schemas.len(),
            "loaded covariance parameterization"
        );
        Ok(table)
    }

    /// The table compiled into the crate.
    pub fn builtin() -> Self {
        match Self::from_toml_str(BUILTIN_TABLE) {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(error = %e, "built-in covariance parameterization is malformed");
                Self::invalid()
            }
        }
    }

    /// Resolves the table a configuration points at. A table that fails to
    /// load is replaced by [`invalid`](Self::invalid).
    pub fn from_config(config: &CodecConfig) -> Self {
        match &config.covariance_table {
            Some(path) => match Self::load(path) {
                Ok(table) => table,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "covariance parameterization failed to load; \
                         track uncertainties unavailable"
                    );
                    Self::invalid()
                }
            },
            None => Self::builtin(),
        }
    }

    /// The process-wide table, loaded on first call from [`CodecConfig::from_env`].
    pub fn global() -> &'static CovarianceParameterization {
        GLOBAL.get_or_init(|| Self::from_config(&CodecConfig::from_env()))
    }

    /// Installs `table` as the process-wide table. Fails, handing the table
    /// back, once the global has been initialized.
    pub fn install_global(
        table: CovarianceParameterization,
    ) -> Result<(), CovarianceParameterization> {
        GLOBAL.set(table)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn schema(&self, id: u16) -> Option<&CovarianceSchema> {
        self.schemas.get(&id)
    }

    fn checked_schema(&self, id: u16) -> Result<&CovarianceSchema, CandidateError> {
        if !self.valid {
            return Err(CandidateError::MissingParameterization(
                "no parameterization table loaded".to_string(),
            ));
        }
        self.schemas.get(&id).ok_or_else(|| {
            CandidateError::MissingParameterization(format!(
                "schema {id} not in table version {}",
                self.version
            ))
        })
    }

    fn checked_codec(
        &self,
        schema: u16,
        i: usize,
        j: usize,
    ) -> Result<&ElementCodec, CandidateError> {
        self.checked_schema(schema)?.codec(i, j).ok_or_else(|| {
            CandidateError::MissingParameterization(format!("({i}, {j}) is never packed"))
        })
    }

    pub fn pack(
        &self,
        schema: u16,
        i: usize,
        j: usize,
        value: f32,
        ctx: &PackContext,
    ) -> Result<u16, CandidateError> {
        Ok(self.checked_codec(schema, i, j)?.pack(value, ctx))
    }

    pub fn unpack(
        &self,
        schema: u16,
        i: usize,
        j: usize,
        code: u16,
        ctx: &PackContext,
    ) -> Result<f32, CandidateError> {
        Ok(self.checked_codec(schema, i, j)?.unpack(code, ctx))
    }

    /// Quantizes the populated entries of `cov`. Unlisted entries are dropped.
    pub fn pack_matrix(
        &self,
        schema: u16,
        cov: &CovarianceMatrix,
        pt: f32,
    ) -> Result<PackedCovariance, CandidateError> {
        let schema = self.checked_schema(schema)?;
        let mut codes = [0u16; 8];
        for (k, &(i, j)) in PACKED_ENTRIES.iter().enumerate() {
            let ctx = PackContext {
                pt,
                cii: cov.get(i, i) as f32,
                cjj: cov.get(j, j) as f32,
            };
            codes[k] = schema.codecs[k].pack(cov.get(i, j) as f32, &ctx);
        }
        Ok(PackedCovariance(codes))
    }

    /// Rebuilds the 5×5 matrix of a record packed with `schema` by table
    /// `version`. Entries that are never packed come back as zero.
    pub fn unpack_matrix(
        &self,
        schema: u16,
        version: u16,
        packed: &PackedCovariance,
        pt: f32,
    ) -> Result<CovarianceMatrix, CandidateError> {
        let codecs = &self.checked_schema(schema)?.codecs;
        if version != self.version {
            return Err(CandidateError::MissingParameterization(format!(
                "record packed with version {version}, table is version {}",
                self.version
            )));
        }
        let mut cov = CovarianceMatrix::zeros();
        for (k, &(i, j)) in PACKED_ENTRIES.iter().enumerate() {
            let ctx = PackContext {
                pt,
                cii: cov.get(i, i) as f32,
                cjj: cov.get(j, j) as f32,
            };
            cov.set(i, j, f64::from(codecs[k].unpack(packed.0[k], &ctx)));
        }
        Ok(cov)
    }
}

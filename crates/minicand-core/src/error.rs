use thiserror::Error;

#[derive(Debug, Error)]
pub enum CandidateError {
    /// The operation is not defined for this kind of candidate.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
    /// A reference the operation needs was never set.
    #[error("invalid reference: {0}")]
    InvalidReference(&'static str),
    /// No usable covariance parameterization for this record.
    #[error(
        "unimplemented: track parameter uncertainties are unavailable ({0}); \
         load a parameterization table matching the input data"
    )]
    MissingParameterization(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CandidateError {
    fn from(e: toml::de::Error) -> Self {
        CandidateError::Config(e.to_string())
    }
}

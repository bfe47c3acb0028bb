use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum XwmtError {
    #[error("{0}")]
    Error(String),
    #[error("{0} is not a supported lambda")]
    UnsupportedLambda(String),
    #[error("{0} is not a supported process")]
    UnsupportedProcess(String),
    #[error("Unsupported reference pressure {0}. Expected one of sigma0, sigma1, sigma2, sigma3, sigma4")]
    UnsupportedReferencePressure(String),
    #[error("Invalid process taxonomy: {0}")]
    InvalidTaxonomy(String),
    #[error("Invalid bin edges: {0}")]
    InvalidBins(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Variable {0} is required but not present in the dataset")]
    MissingVariable(String),
    #[error("Shape mismatch for {name}: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

impl From<toml::de::Error> for XwmtError {
    fn from(value: toml::de::Error) -> Self {
        XwmtError::InvalidConfig(value.to_string())
    }
}

/// Convenience type for `Result<T, XwmtError>`.
pub type XwmtResult<T> = Result<T, XwmtError>;

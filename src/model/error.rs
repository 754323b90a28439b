use thiserror::Error;

/// Domain error taxonomy. Constraint violations and validation errors are
/// always local to the single write or propagation batch that raised them;
/// the enclosing operation aborts wholesale, there is no partial success.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Attempted creation of a duplicate key tuple. Never auto-merged.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Domain-rule violation: bound ordering, out-of-range numeric value,
    /// unparseable numeric text, reclassification of a feature in use.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Backend failure from the underlying store.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl FeatureError {
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::NotFound(format!("{} '{}'", what, id))
    }
}

pub type FeatureResult<T> = Result<T, FeatureError>;

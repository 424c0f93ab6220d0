use thiserror::Error;

/// Errors from rendering typed wrappers.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("invalid client name `{0}`")]
    InvalidClientName(String),
}

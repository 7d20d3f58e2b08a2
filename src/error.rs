use thiserror::Error;

/// A generation run failed; nothing was produced.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to parse input: {0}")]
    Parse(#[source] syn::Error),

    #[error("function '{function}': parameter {index} must bind a plain identifier")]
    UnnamedParameter { function: String, index: usize },

    #[error("function '{function}' cannot be projected: {reason}")]
    UnsupportedSignature { function: String, reason: &'static str },

    #[error("function '{0}' is declared more than once")]
    DuplicateFunction(String),

    #[error("record '{record}' cannot be projected: {reason}")]
    UnsupportedRecord { record: String, reason: &'static str },

    #[error("generated item '{0}' collides with a declaration in the input")]
    NameCollision(String),

    #[error("'{0}' cannot prefix a function name")]
    InvalidPrefix(String),

    #[error("invalid runtime path '{path}': {source}")]
    RuntimePath {
        path: String,
        #[source]
        source: syn::Error,
    },

    #[error("failed to parse generated code: {0}")]
    Fragment(#[source] syn::Error),
}

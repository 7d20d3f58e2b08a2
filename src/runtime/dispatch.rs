//! Helpers called by generated server dispatchers.

use super::{
    codec::CodecError,
    wire::{FromWire, NamedArguments, TypeMismatch},
};
use std::{error::Error, fmt::Debug};
use thiserror::Error;

/// Everything a generated `receive` can fail with.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("decoding function call: {0}")]
    Codec(#[from] CodecError),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("parameter '{0}' is not in the received arguments")]
    MissingArgument(String),

    #[error("failed to cast parameter '{name}': {source}")]
    ArgumentType {
        name: String,
        #[source]
        source: TypeMismatch,
    },

    /// The implementation itself returned an error.
    #[error("{0}")]
    Call(Box<dyn Error + Send + Sync>),
}

impl DispatchError {
    pub fn call<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        DispatchError::Call(err.into())
    }
}

pub type Reply = Result<String, DispatchError>;

/// Removes the argument `name` from `args` and decodes it as `T`.
pub fn take_argument<T: FromWire>(args: &mut NamedArguments, name: &str) -> Result<T, DispatchError> {
    let argument = args
        .remove(name)
        .ok_or_else(|| DispatchError::MissingArgument(name.to_owned()))?;
    T::from_wire(argument.value).map_err(|source| DispatchError::ArgumentType {
        name: name.to_owned(),
        source,
    })
}

/// Renders results that are neither the payload string nor the error: every value in
/// its `{:?}` form, single-quoted, joined with `", "`.
pub fn render_results(results: &[&dyn Debug]) -> String {
    results
        .iter()
        .map(|r| format!("'{r:?}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

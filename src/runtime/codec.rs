//! Encoding and decoding of whole function calls.

use super::wire::NamedArguments;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Serialization format used for a call payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Bincode,
    /// Human readable, `{"functionName": .., "args": {..}}`.
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub format: Format,
}

impl Options {
    pub fn json() -> Self {
        Self {
            format: Format::Json,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FunctionCall {
    function_name: String,
    args: NamedArguments,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("function call carries an empty function name")]
    EmptyName,
}

pub fn encode_function_call(
    name: &str,
    options: &Options,
    args: NamedArguments,
) -> Result<Vec<u8>, CodecError> {
    if name.is_empty() {
        return Err(CodecError::EmptyName);
    }
    let call = FunctionCall {
        function_name: name.to_owned(),
        args,
    };
    let payload = match options.format {
        Format::Bincode => bincode::serialize(&call)?,
        Format::Json => serde_json::to_vec(&call)?,
    };
    trace!(function = name, bytes = payload.len(), "encoded function call");
    Ok(payload)
}

pub fn decode_function_call(
    payload: &[u8],
    options: &Options,
) -> Result<(String, NamedArguments), CodecError> {
    let call: FunctionCall = match options.format {
        Format::Bincode => bincode::deserialize(payload)?,
        Format::Json => serde_json::from_slice(payload)?,
    };
    if call.function_name.is_empty() {
        return Err(CodecError::EmptyName);
    }
    trace!(
        function = %call.function_name,
        args = call.args.len(),
        "decoded function call"
    );
    Ok((call.function_name, call.args))
}

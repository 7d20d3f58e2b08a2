//! The host side of a sandboxed client.

use super::{
    codec::CodecError,
    convert::{convert, BridgeValue, Callable, ConversionError, FromBridge},
};
use thiserror::Error;
use tracing::debug;

/// A bridge-callable wrapper, as registered in the host's global namespace.
pub type Handler = fn(&[BridgeValue]) -> Result<(), ClientError>;

/// What a generated client needs from the environment embedding it.
pub trait BridgeHost {
    /// Looks `name` up in the host's global namespace.
    fn global(&self, name: &str) -> BridgeValue;

    /// Copies `payload` into a buffer the host can see and calls `callable` with it.
    fn invoke_with_buffer(&self, callable: &Callable, payload: &[u8]) -> Result<(), BridgeError>;

    fn register(&self, name: &str, handler: Handler);

    /// Keeps every registered handler alive for as long as the host runs.
    fn park(self);
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0} is not a callable host function")]
    NotCallable(String),

    #[error("host call failed: {0}")]
    Invoke(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("expected {expected} arguments, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("parameter '{name}': {source}")]
    Conversion {
        name: String,
        #[source]
        source: ConversionError,
    },

    #[error("encoding function call: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub fn expect_arity(args: &[BridgeValue], expected: usize) -> Result<(), ClientError> {
    if args.len() != expected {
        return Err(ClientError::Arity {
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

/// Converts one positional bridge argument, naming the parameter on failure.
pub fn convert_argument<T: FromBridge>(value: &BridgeValue, name: &str) -> Result<T, ClientError> {
    convert(value).map_err(|source| ClientError::Conversion {
        name: name.to_owned(),
        source,
    })
}

/// Hands `payload` to the host function registered globally as `function`.
pub fn send_message_via<H: BridgeHost>(
    host: &H,
    function: &str,
    payload: &[u8],
) -> Result<(), ClientError> {
    let callable = match host.global(function) {
        BridgeValue::Function(callable) => callable,
        other => {
            debug!(function, tag = other.tag(), "send target is not callable");
            return Err(BridgeError::NotCallable(function.to_owned()).into());
        }
    };
    host.invoke_with_buffer(&callable, payload)?;
    Ok(())
}

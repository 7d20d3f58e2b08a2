//! Support code linked into generated servers and clients.
//!
//! Generated files only ever name items re-exported here, so the path to this module
//! is the one thing a generated file needs to know about the crate.

pub mod bridge;
pub mod codec;
pub mod convert;
pub mod dispatch;
#[cfg(feature = "js")]
pub mod js;
pub mod wire;

pub use bridge::{
    convert_argument, expect_arity, send_message_via, BridgeError, BridgeHost, ClientError,
    Handler,
};
pub use codec::{decode_function_call, encode_function_call, CodecError, Format, Options};
pub use convert::{
    aggregate_from_native, convert, from_interchange, to_native, BridgeValue, Callable,
    ConversionError, FromBridge, Native, TargetKind,
};
pub use dispatch::{render_results, take_argument, DispatchError, Reply};
#[cfg(feature = "js")]
pub use js::JsHost;
pub use wire::{take_field, Argument, FromWire, NamedArguments, ToWire, TypeMismatch, WireValue};

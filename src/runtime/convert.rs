//! Conversion of weakly typed bridge values into static Rust types.
//!
//! [`convert`] is total over the tag of a [`BridgeValue`]: primitives are mapped
//! directly, numbers are narrowed according to the target's [`TargetKind`], and
//! objects take a detour through JSON so any `Deserialize` type can be produced
//! without a per-type converter.

use serde::{de::DeserializeOwned, ser::Error as _, Serialize, Serializer};
use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    fmt,
    rc::Rc,
};
use thiserror::Error;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// An opaque handle to something callable on the host side.
#[derive(Clone)]
pub struct Callable(Rc<dyn Any>);

impl Callable {
    pub fn new<T: Any>(handle: T) -> Self {
        Self(Rc::new(handle))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

/// A value as the host bridge hands it over, tagged the way the host sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Function(Callable),
    Array(Vec<BridgeValue>),
    Object(Vec<(String, BridgeValue)>),
    /// Any tag with no native counterpart (`symbol`, `bigint`, ..).
    Other(String),
}

impl BridgeValue {
    pub fn tag(&self) -> &str {
        use BridgeValue::*;
        match self {
            Undefined => "undefined",
            Null => "null",
            Boolean(_) => "boolean",
            Number(_) => "number",
            String(_) => "string",
            Function(_) => "function",
            Array(_) | Object(_) => "object",
            Other(tag) => tag,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, BridgeValue::Function(_))
    }
}

/// The shape of number a target type wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    String,
    Callable,
    Aggregate,
    Unconstrained,
}

/// A bridge value after tag dispatch, before it is bound to a static type.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Callable(Callable),
    List(Vec<Native>),
    Table(BTreeMap<String, Native>),
}

impl Native {
    fn kind_name(&self) -> &'static str {
        use Native::*;
        match self {
            Nil => "null",
            Bool(_) => "boolean",
            Int(_) => "signed integer",
            Uint(_) => "unsigned integer",
            Float(_) => "float",
            String(_) => "string",
            Callable(_) => "function",
            List(_) => "array",
            Table(_) => "object",
        }
    }
}

/// Integral floats serialize as integers, matching how JSON treats numbers.
impl Serialize for Native {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Native::Nil => serializer.serialize_unit(),
            Native::Bool(b) => serializer.serialize_bool(*b),
            Native::Int(i) => serializer.serialize_i64(*i),
            Native::Uint(u) => serializer.serialize_u64(*u),
            Native::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*f as i64)
            }
            Native::Float(f) => serializer.serialize_f64(*f),
            Native::String(s) => serializer.serialize_str(s),
            Native::Callable(_) => Err(S::Error::custom(
                "a function cannot be carried through the interchange format",
            )),
            Native::List(items) => serializer.collect_seq(items),
            Native::Table(entries) => serializer.collect_map(entries),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("null or undefined is not a valid {0}")]
    Null(&'static str),

    #[error("unsupported value type '{0}'")]
    UnsupportedTag(String),

    #[error("interchange serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("interchange deserialization failed: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// A static type a bridge value can be converted into.
pub trait FromBridge: Sized {
    const KIND: TargetKind;
    const TYPE_NAME: &'static str;

    fn from_native(native: Native) -> Result<Self, ConversionError>;
}

/// Converts a bridge value into `T`.
pub fn convert<T: FromBridge>(value: &BridgeValue) -> Result<T, ConversionError> {
    T::from_native(to_native(value, T::KIND)?)
}

/// Tag dispatch. Nested values are always converted at [`TargetKind::Unconstrained`].
pub fn to_native(value: &BridgeValue, kind: TargetKind) -> Result<Native, ConversionError> {
    Ok(match value {
        BridgeValue::Undefined | BridgeValue::Null => Native::Nil,
        BridgeValue::Boolean(b) => Native::Bool(*b),
        BridgeValue::Number(n) => match kind {
            TargetKind::Signed => Native::Int(*n as i64),
            TargetKind::Unsigned => Native::Uint(*n as u64),
            _ => Native::Float(*n),
        },
        BridgeValue::String(s) => Native::String(s.clone()),
        BridgeValue::Function(f) => Native::Callable(f.clone()),
        BridgeValue::Array(items) => Native::List(
            items
                .iter()
                .map(|item| to_native(item, TargetKind::Unconstrained))
                .collect::<Result<_, _>>()?,
        ),
        BridgeValue::Object(entries) => Native::Table(
            entries
                .iter()
                .map(|(key, item)| Ok((key.clone(), to_native(item, TargetKind::Unconstrained)?)))
                .collect::<Result<_, ConversionError>>()?,
        ),
        BridgeValue::Other(tag) => return Err(ConversionError::UnsupportedTag(tag.clone())),
    })
}

/// Serializes `native` to JSON text and deserializes that text into `T`.
pub fn from_interchange<T: DeserializeOwned>(native: Native) -> Result<T, ConversionError> {
    let text = serde_json::to_string(&native).map_err(ConversionError::Serialize)?;
    serde_json::from_str(&text).map_err(ConversionError::Deserialize)
}

/// Integer targets saturate at their bounds, the same way `f64 as i32` does.
macro_rules! impl_from_bridge_integer {
    ($kind:ident, $($rust_type:ty => $name:literal),* $(,)?) => {
        $(
            impl FromBridge for $rust_type {
                const KIND: TargetKind = TargetKind::$kind;
                const TYPE_NAME: &'static str = $name;

                fn from_native(native: Native) -> Result<Self, ConversionError> {
                    match native {
                        Native::Int(v) => Ok(<$rust_type>::try_from(v).unwrap_or(if v < 0 {
                            <$rust_type>::MIN
                        } else {
                            <$rust_type>::MAX
                        })),
                        Native::Uint(v) => Ok(<$rust_type>::try_from(v).unwrap_or(<$rust_type>::MAX)),
                        Native::Float(v) => Ok(v as $rust_type),
                        Native::Nil => Err(ConversionError::Null(Self::TYPE_NAME)),
                        other => Err(ConversionError::Mismatch {
                            expected: Self::TYPE_NAME,
                            found: other.kind_name(),
                        }),
                    }
                }
            }
        )*
    };
}

macro_rules! impl_from_bridge_float {
    ($($rust_type:ty => $name:literal),* $(,)?) => {
        $(
            impl FromBridge for $rust_type {
                const KIND: TargetKind = TargetKind::Float;
                const TYPE_NAME: &'static str = $name;

                fn from_native(native: Native) -> Result<Self, ConversionError> {
                    match native {
                        Native::Int(v) => Ok(v as $rust_type),
                        Native::Uint(v) => Ok(v as $rust_type),
                        Native::Float(v) => Ok(v as $rust_type),
                        Native::Nil => Err(ConversionError::Null(Self::TYPE_NAME)),
                        other => Err(ConversionError::Mismatch {
                            expected: Self::TYPE_NAME,
                            found: other.kind_name(),
                        }),
                    }
                }
            }
        )*
    };
}

impl_from_bridge_integer!(Signed, i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64");
impl_from_bridge_integer!(Unsigned, u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64");
impl_from_bridge_float!(f32 => "f32", f64 => "f64");

impl FromBridge for bool {
    const KIND: TargetKind = TargetKind::Bool;
    const TYPE_NAME: &'static str = "bool";

    fn from_native(native: Native) -> Result<Self, ConversionError> {
        match native {
            Native::Bool(b) => Ok(b),
            Native::Nil => Err(ConversionError::Null(Self::TYPE_NAME)),
            other => Err(ConversionError::Mismatch {
                expected: Self::TYPE_NAME,
                found: other.kind_name(),
            }),
        }
    }
}

impl FromBridge for String {
    const KIND: TargetKind = TargetKind::String;
    const TYPE_NAME: &'static str = "String";

    fn from_native(native: Native) -> Result<Self, ConversionError> {
        match native {
            Native::String(s) => Ok(s),
            Native::Nil => Err(ConversionError::Null(Self::TYPE_NAME)),
            other => Err(ConversionError::Mismatch {
                expected: Self::TYPE_NAME,
                found: other.kind_name(),
            }),
        }
    }
}

/// A one-character string.
impl FromBridge for char {
    const KIND: TargetKind = TargetKind::String;
    const TYPE_NAME: &'static str = "char";

    fn from_native(native: Native) -> Result<Self, ConversionError> {
        match native {
            Native::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(ConversionError::Mismatch {
                        expected: Self::TYPE_NAME,
                        found: "string",
                    }),
                }
            }
            Native::Nil => Err(ConversionError::Null(Self::TYPE_NAME)),
            other => Err(ConversionError::Mismatch {
                expected: Self::TYPE_NAME,
                found: other.kind_name(),
            }),
        }
    }
}

impl FromBridge for Callable {
    const KIND: TargetKind = TargetKind::Callable;
    const TYPE_NAME: &'static str = "Callable";

    fn from_native(native: Native) -> Result<Self, ConversionError> {
        match native {
            Native::Callable(c) => Ok(c),
            Native::Nil => Err(ConversionError::Null(Self::TYPE_NAME)),
            other => Err(ConversionError::Mismatch {
                expected: Self::TYPE_NAME,
                found: other.kind_name(),
            }),
        }
    }
}

impl<T: FromBridge> FromBridge for Option<T> {
    const KIND: TargetKind = T::KIND;
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_native(native: Native) -> Result<Self, ConversionError> {
        match native {
            Native::Nil => Ok(None),
            other => T::from_native(other).map(Some),
        }
    }
}

impl<T: DeserializeOwned> FromBridge for Vec<T> {
    const KIND: TargetKind = TargetKind::Aggregate;
    const TYPE_NAME: &'static str = "Vec";

    fn from_native(native: Native) -> Result<Self, ConversionError> {
        match native {
            Native::Nil => Err(ConversionError::Null(Self::TYPE_NAME)),
            other => from_interchange(other),
        }
    }
}

impl<T: DeserializeOwned> FromBridge for BTreeMap<String, T> {
    const KIND: TargetKind = TargetKind::Aggregate;
    const TYPE_NAME: &'static str = "map";

    fn from_native(native: Native) -> Result<Self, ConversionError> {
        aggregate_from_native(native, Self::TYPE_NAME)
    }
}

impl<T: DeserializeOwned> FromBridge for HashMap<String, T> {
    const KIND: TargetKind = TargetKind::Aggregate;
    const TYPE_NAME: &'static str = "map";

    fn from_native(native: Native) -> Result<Self, ConversionError> {
        aggregate_from_native(native, Self::TYPE_NAME)
    }
}

/// Shared body of generated `FromBridge` impls for record types.
pub fn aggregate_from_native<T: DeserializeOwned>(
    native: Native,
    type_name: &'static str,
) -> Result<T, ConversionError> {
    match native {
        Native::Nil => Err(ConversionError::Null(type_name)),
        table @ Native::Table(_) => from_interchange(table),
        other => Err(ConversionError::Mismatch {
            expected: type_name,
            found: other.kind_name(),
        }),
    }
}

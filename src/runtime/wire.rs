use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    error::Error,
    fmt,
};

/// A dynamically tagged value as it travels on the wire.
///
/// Every primitive Rust type gets its own variant, so a value always reports the exact
/// static type it was encoded from (see [`WireValue::type_name`]).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum WireValue {
    Nil,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    List(Vec<WireValue>),
    Record(BTreeMap<String, WireValue>),
}

impl WireValue {
    pub fn type_name(&self) -> &'static str {
        use WireValue::*;
        match self {
            Nil => "nil",
            Bool(_) => "bool",
            I8(_) => "i8",
            I16(_) => "i16",
            I32(_) => "i32",
            I64(_) => "i64",
            U8(_) => "u8",
            U16(_) => "u16",
            U32(_) => "u32",
            U64(_) => "u64",
            F32(_) => "f32",
            F64(_) => "f64",
            Char(_) => "char",
            String(_) => "String",
            List(_) => "list",
            Record(_) => "record",
        }
    }

    /// Opens a record so a generated aggregate decoder can pull fields out of it.
    pub fn into_record(self, expected: &'static str) -> Result<BTreeMap<String, WireValue>, TypeMismatch> {
        match self {
            WireValue::Record(fields) => Ok(fields),
            other => Err(TypeMismatch::new(expected, &other)),
        }
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One named argument of a decoded call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Argument {
    pub value: WireValue,
}

impl Argument {
    pub fn new<T: ToWire + ?Sized>(value: &T) -> Self {
        Self {
            value: value.to_wire(),
        }
    }

    /// The dynamic type the sender reported for this argument.
    pub fn type_tag(&self) -> &'static str {
        self.value.type_name()
    }
}

impl From<WireValue> for Argument {
    fn from(value: WireValue) -> Self {
        Self { value }
    }
}

pub type NamedArguments = BTreeMap<String, Argument>;

/// Decoding from a [`WireValue`] into one static type.
///
/// `zero` is the value used for record fields that are absent on the wire.
pub trait FromWire: Sized {
    const TYPE_NAME: &'static str;

    fn from_wire(value: WireValue) -> Result<Self, TypeMismatch>;

    fn zero() -> Self;
}

pub trait ToWire {
    fn to_wire(&self) -> WireValue;
}

macro_rules! impl_wire {
    ($rust_type:ty, $variant:ident, $name:literal) => {
        impl FromWire for $rust_type {
            const TYPE_NAME: &'static str = $name;

            fn from_wire(value: WireValue) -> Result<Self, TypeMismatch> {
                match value {
                    WireValue::$variant(v) => Ok(v),
                    other => Err(TypeMismatch::new(Self::TYPE_NAME, &other)),
                }
            }

            fn zero() -> Self {
                <$rust_type>::default()
            }
        }

        impl ToWire for $rust_type {
            fn to_wire(&self) -> WireValue {
                WireValue::$variant(self.clone())
            }
        }
    };
}

impl_wire!(bool, Bool, "bool");
impl_wire!(i8, I8, "i8");
impl_wire!(i16, I16, "i16");
impl_wire!(i32, I32, "i32");
impl_wire!(i64, I64, "i64");
impl_wire!(u8, U8, "u8");
impl_wire!(u16, U16, "u16");
impl_wire!(u32, U32, "u32");
impl_wire!(u64, U64, "u64");
impl_wire!(f32, F32, "f32");
impl_wire!(f64, F64, "f64");
impl_wire!(char, Char, "char");
impl_wire!(String, String, "String");

impl FromWire for () {
    const TYPE_NAME: &'static str = "nil";

    fn from_wire(value: WireValue) -> Result<Self, TypeMismatch> {
        match value {
            WireValue::Nil => Ok(()),
            other => Err(TypeMismatch::new(Self::TYPE_NAME, &other)),
        }
    }

    fn zero() -> Self {}
}

impl ToWire for () {
    fn to_wire(&self) -> WireValue {
        WireValue::Nil
    }
}

impl ToWire for str {
    fn to_wire(&self) -> WireValue {
        WireValue::String(self.to_owned())
    }
}

impl<T: ToWire + ?Sized> ToWire for &T {
    fn to_wire(&self) -> WireValue {
        (**self).to_wire()
    }
}

/// `None` travels as nil and `Some(v)` as `v`, so `Some(None)` reads back as `None`.
/// The generator refuses nested `Option` parameters and fields for that reason.
impl<T: FromWire> FromWire for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_wire(value: WireValue) -> Result<Self, TypeMismatch> {
        match value {
            WireValue::Nil => Ok(None),
            other => T::from_wire(other).map(Some),
        }
    }

    fn zero() -> Self {
        None
    }
}

impl<T: ToWire> ToWire for Option<T> {
    fn to_wire(&self) -> WireValue {
        match self {
            Some(v) => v.to_wire(),
            None => WireValue::Nil,
        }
    }
}

impl<T: FromWire> FromWire for Vec<T> {
    const TYPE_NAME: &'static str = "list";

    fn from_wire(value: WireValue) -> Result<Self, TypeMismatch> {
        match value {
            WireValue::List(items) => items.into_iter().map(T::from_wire).collect(),
            other => Err(TypeMismatch::new(Self::TYPE_NAME, &other)),
        }
    }

    fn zero() -> Self {
        Vec::new()
    }
}

impl<T: ToWire> ToWire for [T] {
    fn to_wire(&self) -> WireValue {
        WireValue::List(self.iter().map(ToWire::to_wire).collect())
    }
}

impl<T: ToWire> ToWire for Vec<T> {
    fn to_wire(&self) -> WireValue {
        self.as_slice().to_wire()
    }
}

impl<T: FromWire> FromWire for BTreeMap<String, T> {
    const TYPE_NAME: &'static str = "record";

    fn from_wire(value: WireValue) -> Result<Self, TypeMismatch> {
        value
            .into_record(Self::TYPE_NAME)?
            .into_iter()
            .map(|(k, v)| T::from_wire(v).map(|v| (k, v)))
            .collect()
    }

    fn zero() -> Self {
        BTreeMap::new()
    }
}

impl<T: ToWire> ToWire for BTreeMap<String, T> {
    fn to_wire(&self) -> WireValue {
        WireValue::Record(self.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect())
    }
}

impl<T: FromWire> FromWire for HashMap<String, T> {
    const TYPE_NAME: &'static str = "record";

    fn from_wire(value: WireValue) -> Result<Self, TypeMismatch> {
        value
            .into_record(Self::TYPE_NAME)?
            .into_iter()
            .map(|(k, v)| T::from_wire(v).map(|v| (k, v)))
            .collect()
    }

    fn zero() -> Self {
        HashMap::new()
    }
}

impl<T: ToWire> ToWire for HashMap<String, T> {
    fn to_wire(&self) -> WireValue {
        WireValue::Record(self.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect())
    }
}

/// Takes one field out of a record for a generated aggregate decoder.
///
/// Absent fields decode to [`FromWire::zero`]; fields the record has but the target
/// doesn't are simply never taken.
pub fn take_field<T: FromWire>(
    fields: &mut BTreeMap<String, WireValue>,
    name: &str,
) -> Result<T, TypeMismatch> {
    match fields.remove(name) {
        Some(value) => T::from_wire(value).map_err(|e| e.in_field(name)),
        None => Ok(T::zero()),
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TypeMismatch {
    expected: String,
    found: String,
    field: Option<String>,
}

impl TypeMismatch {
    pub fn new(expected: &str, found: &WireValue) -> Self {
        Self {
            expected: expected.to_owned(),
            found: found.type_name().to_owned(),
            field: None,
        }
    }

    fn in_field(mut self, name: &str) -> Self {
        self.field = Some(match self.field.take() {
            Some(inner) => format!("{name}.{inner}"),
            None => name.to_owned(),
        });
        self
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn found(&self) -> &str {
        &self.found
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "field '{field}': ")?;
        }
        write!(f, "expected '{}', found '{}'", self.expected, self.found)
    }
}

impl Error for TypeMismatch {}

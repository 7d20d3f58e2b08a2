//! A dispatcher written the way `wirestub server` generates one, driven through the
//! runtime codec.

use rand::{distributions::Alphanumeric, Rng};
use std::{cell::Cell, collections::BTreeMap};
use wirestub::runtime::{
    self, decode_function_call, encode_function_call, Argument, CodecError, DispatchError,
    NamedArguments, Options, WireValue,
};

thread_local! {
    static CALLS: Cell<usize> = const { Cell::new(0) };
}

fn count_call() {
    CALLS.with(|calls| calls.set(calls.get() + 1));
}

fn calls() -> usize {
    CALLS.with(Cell::get)
}

#[derive(Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub tags: Vec<String>,
}

pub fn wirestub_greet(name: &str) -> String {
    count_call();
    format!("Hello, {name}")
}

pub fn wirestub_sum(a: i64, b: i64) -> Result<i64, String> {
    count_call();
    a.checked_add(b).ok_or_else(|| "overflow".to_owned())
}

pub fn wirestub_describe(segment: Segment) -> (f64, usize) {
    count_call();
    let (dx, dy) = (segment.to.x - segment.from.x, segment.to.y - segment.from.y);
    ((dx * dx + dy * dy).sqrt(), segment.tags.len())
}

pub fn receive(payload: &[u8]) -> runtime::Reply {
    let (function_name, mut call_args) = runtime::decode_function_call(payload, &runtime::Options::default())?;
    match function_name.as_str() {
        "greet" => {
            let param_name: String = runtime::take_argument(&mut call_args, "name")?;
            let result_0 = wirestub_greet(&param_name);
            Ok(String::from(result_0))
        }
        "sum" => {
            let param_a: i64 = runtime::take_argument(&mut call_args, "a")?;
            let param_b: i64 = runtime::take_argument(&mut call_args, "b")?;
            let result_0 = wirestub_sum(param_a, param_b).map_err(runtime::DispatchError::call)?;
            Ok(runtime::render_results(&[&result_0]))
        }
        "describe" => {
            let param_segment: Segment = runtime::take_argument(&mut call_args, "segment")?;
            let (result_0, result_1) = wirestub_describe(param_segment);
            Ok(runtime::render_results(&[&result_0, &result_1]))
        }
        unknown => Err(runtime::DispatchError::UnknownFunction(unknown.to_owned())),
    }
}

impl runtime::FromWire for Point {
    const TYPE_NAME: &'static str = "Point";

    fn from_wire(value: runtime::WireValue) -> Result<Self, runtime::TypeMismatch> {
        let mut fields = value.into_record(Self::TYPE_NAME)?;
        Ok(Self {
            x: runtime::take_field(&mut fields, "x")?,
            y: runtime::take_field(&mut fields, "y")?,
        })
    }

    fn zero() -> Self {
        Self {
            x: runtime::FromWire::zero(),
            y: runtime::FromWire::zero(),
        }
    }
}

impl runtime::FromWire for Segment {
    const TYPE_NAME: &'static str = "Segment";

    fn from_wire(value: runtime::WireValue) -> Result<Self, runtime::TypeMismatch> {
        let mut fields = value.into_record(Self::TYPE_NAME)?;
        Ok(Self {
            from: runtime::take_field(&mut fields, "from")?,
            to: runtime::take_field(&mut fields, "to")?,
            tags: runtime::take_field(&mut fields, "tags")?,
        })
    }

    fn zero() -> Self {
        Self {
            from: runtime::FromWire::zero(),
            to: runtime::FromWire::zero(),
            tags: runtime::FromWire::zero(),
        }
    }
}

fn call(name: &str, args: impl IntoIterator<Item = (&'static str, Argument)>) -> Vec<u8> {
    let args: NamedArguments = args.into_iter().map(|(k, v)| (k.to_owned(), v)).collect();
    encode_function_call(name, &Options::default(), args).unwrap()
}

fn record(fields: impl IntoIterator<Item = (&'static str, WireValue)>) -> WireValue {
    WireValue::Record(fields.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
}

#[test]
fn greet() {
    let payload = call("greet", [("name", Argument::new("Ada"))]);
    assert_eq!(receive(&payload).unwrap(), "Hello, Ada");
}

#[test]
fn sum() {
    let payload = call("sum", [("a", Argument::new(&2i64)), ("b", Argument::new(&3i64))]);
    assert_eq!(receive(&payload).unwrap(), "'5'");

    let payload = call("sum", [("a", Argument::new(&i64::MAX)), ("b", Argument::new(&1i64))]);
    let err = receive(&payload).unwrap_err();
    assert!(matches!(err, DispatchError::Call(_)));
    assert_eq!(err.to_string(), "overflow");
}

#[test]
fn unknown_function_invokes_nothing() {
    let before = calls();
    let payload = call("Greet", [("name", Argument::new("Ada"))]);
    let err = receive(&payload).unwrap_err();
    assert!(matches!(&err, DispatchError::UnknownFunction(name) if name == "Greet"));
    assert!(err.to_string().contains("Greet"));
    assert_eq!(calls(), before);
}

#[test]
fn missing_argument() {
    let payload = call("sum", [("a", Argument::new(&2i64))]);
    let err = receive(&payload).unwrap_err();
    assert!(matches!(&err, DispatchError::MissingArgument(name) if name == "b"));
}

#[test]
fn argument_type_mismatch_names_both_types() {
    let payload = call("sum", [("a", Argument::new("2")), ("b", Argument::new(&3i64))]);
    let err = receive(&payload).unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to cast parameter 'a': expected 'i64', found 'String'"
    );
    let DispatchError::ArgumentType { name, source } = err else {
        panic!("expected a type mismatch");
    };
    assert_eq!(name, "a");
    assert_eq!((source.expected(), source.found()), ("i64", "String"));
}

#[test]
fn aggregate_fields_are_copied_by_name() {
    // `to` is absent, `color` is unknown.
    let segment = record([
        ("from", record([("x", WireValue::F64(3.0)), ("y", WireValue::F64(4.0))])),
        ("color", WireValue::String("red".to_owned())),
        (
            "tags",
            WireValue::List(vec![WireValue::String("a".to_owned()), WireValue::String("b".to_owned())]),
        ),
    ]);
    let payload = call("describe", [("segment", Argument::from(segment))]);
    assert_eq!(receive(&payload).unwrap(), "'5.0', '2'");
}

#[test]
fn nested_mismatch_names_the_field_path() {
    let segment = record([("from", record([("x", WireValue::I32(3))]))]);
    let payload = call("describe", [("segment", Argument::from(segment))]);
    assert_eq!(
        receive(&payload).unwrap_err().to_string(),
        "failed to cast parameter 'segment': field 'from.x': expected 'f64', found 'i32'"
    );
}

#[test]
fn aggregate_argument_must_be_a_record() {
    let payload = call("describe", [("segment", Argument::new(&1u8))]);
    assert_eq!(
        receive(&payload).unwrap_err().to_string(),
        "failed to cast parameter 'segment': expected 'Segment', found 'u8'"
    );
}

#[test]
fn garbage_payload_is_a_codec_error() {
    let err = receive(&[0xff, 0xff, 0xff]).unwrap_err();
    assert!(matches!(err, DispatchError::Codec(CodecError::Bincode(_))));
}

#[test]
fn json_format() {
    let args = NamedArguments::from([("name".to_owned(), Argument::new("Ada"))]);
    let payload = encode_function_call("greet", &Options::json(), args.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(json["functionName"], "greet");
    assert_eq!(json["args"]["name"], serde_json::json!({ "String": "Ada" }));

    let (name, decoded) = decode_function_call(&payload, &Options::json()).unwrap();
    assert_eq!(name, "greet");
    assert_eq!(decoded, args);
}

#[test]
fn empty_function_name_is_rejected() {
    assert!(matches!(
        encode_function_call("", &Options::default(), NamedArguments::new()),
        Err(CodecError::EmptyName)
    ));
}

#[test]
fn random_primitives_round_trip() {
    let mut rng = rand::thread_rng();
    for _ in 0..64 {
        let text: String = (0..rng.gen_range(0..24)).map(|_| rng.sample(Alphanumeric) as char).collect();
        let values = [
            WireValue::Bool(rng.gen()),
            WireValue::I8(rng.gen()),
            WireValue::I16(rng.gen()),
            WireValue::I32(rng.gen()),
            WireValue::I64(rng.gen()),
            WireValue::U8(rng.gen()),
            WireValue::U16(rng.gen()),
            WireValue::U32(rng.gen()),
            WireValue::U64(rng.gen()),
            // Quarters survive the JSON text form exactly.
            WireValue::F32(rng.gen_range(-4000..4000) as f32 / 4.0),
            WireValue::F64(rng.gen_range(-4000..4000) as f64 / 4.0),
            WireValue::Char(rng.gen()),
            WireValue::String(text),
        ];
        let args: NamedArguments = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("arg{i:02}"), Argument::from(v.clone())))
            .collect();

        for options in [Options::default(), Options::json()] {
            let payload = encode_function_call("f", &options, args.clone()).unwrap();
            let (name, decoded) = decode_function_call(&payload, &options).unwrap();
            assert_eq!(name, "f");
            assert_eq!(decoded, args);
            let tags: Vec<&str> = decoded.values().map(Argument::type_tag).collect();
            let expected: Vec<&str> = values.iter().map(WireValue::type_name).collect();
            assert_eq!(tags, expected);
        }
    }
}

#[test]
fn maps_and_options_decode() {
    let mut args = NamedArguments::from([
        ("limits".to_owned(), Argument::new(&BTreeMap::from([("a".to_owned(), 1u32)]))),
        ("note".to_owned(), Argument::from(WireValue::Nil)),
    ]);
    let limits: BTreeMap<String, u32> = runtime::take_argument(&mut args, "limits").unwrap();
    let note: Option<String> = runtime::take_argument(&mut args, "note").unwrap();
    assert_eq!(limits["a"], 1);
    assert_eq!(note, None);
    assert!(args.is_empty());
}

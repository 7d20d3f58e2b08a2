//! [`BridgeHost`] over the JavaScript global object, for `wasm32` clients.

use super::{
    bridge::{BridgeError, BridgeHost, Handler},
    convert::{BridgeValue, Callable},
};
use js_sys::{Array, Function, Object, Reflect, Uint8Array};
use std::cell::RefCell;
use tracing::warn;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};

/// Wraps a one-argument closure into a JS function taking any number of arguments.
const VARIADIC_SHIM: &str =
    "return function() { return handler(Array.prototype.slice.call(arguments)); };";

#[derive(Default)]
pub struct JsHost {
    closures: RefCell<Vec<Closure<dyn FnMut(Array) -> JsValue>>>,
}

impl JsHost {
    /// Snapshots a JS value into a [`BridgeValue`], recursing into arrays and objects.
    pub fn from_js(value: &JsValue) -> BridgeValue {
        if value.is_undefined() {
            BridgeValue::Undefined
        } else if value.is_null() {
            BridgeValue::Null
        } else if let Some(b) = value.as_bool() {
            BridgeValue::Boolean(b)
        } else if let Some(n) = value.as_f64() {
            BridgeValue::Number(n)
        } else if let Some(s) = value.as_string() {
            BridgeValue::String(s)
        } else if value.is_function() {
            BridgeValue::Function(Callable::new(value.clone()))
        } else if Array::is_array(value) {
            let items: &Array = value.unchecked_ref();
            BridgeValue::Array(items.iter().map(|item| Self::from_js(&item)).collect())
        } else if value.is_object() {
            let object: &Object = value.unchecked_ref();
            let entries = Object::entries(object)
                .iter()
                .map(|entry| {
                    let pair: Array = entry.unchecked_into();
                    let key = pair.get(0).as_string().unwrap_or_default();
                    (key, Self::from_js(&pair.get(1)))
                })
                .collect();
            BridgeValue::Object(entries)
        } else {
            let tag = value.js_typeof().as_string();
            BridgeValue::Other(tag.unwrap_or_else(|| "unknown".to_owned()))
        }
    }
}

impl BridgeHost for JsHost {
    fn global(&self, name: &str) -> BridgeValue {
        match Reflect::get(&js_sys::global(), &JsValue::from_str(name)) {
            Ok(value) => Self::from_js(&value),
            Err(_) => BridgeValue::Undefined,
        }
    }

    fn invoke_with_buffer(&self, callable: &Callable, payload: &[u8]) -> Result<(), BridgeError> {
        let function = callable
            .downcast_ref::<JsValue>()
            .and_then(|value| value.dyn_ref::<Function>())
            .ok_or_else(|| BridgeError::NotCallable("host callable".to_owned()))?;
        let buffer = Uint8Array::new_with_length(payload.len() as u32);
        buffer.copy_from(payload);
        function
            .call1(&JsValue::NULL, &buffer)
            .map_err(|e| BridgeError::Invoke(format!("{e:?}")))?;
        Ok(())
    }

    fn register(&self, name: &str, handler: Handler) {
        let closure = Closure::wrap(Box::new(move |args: Array| -> JsValue {
            let args: Vec<BridgeValue> = args.iter().map(|arg| Self::from_js(&arg)).collect();
            match handler(&args) {
                Ok(()) => JsValue::UNDEFINED,
                Err(err) => js_sys::Error::new(&err.to_string()).into(),
            }
        }) as Box<dyn FnMut(Array) -> JsValue>);

        let shim = Function::new_with_args("handler", VARIADIC_SHIM);
        match shim.call1(&JsValue::NULL, closure.as_ref()) {
            Ok(function) => {
                if let Err(e) = Reflect::set(&js_sys::global(), &JsValue::from_str(name), &function) {
                    warn!(name, error = ?e, "failed to register handler");
                }
            }
            Err(e) => warn!(name, error = ?e, "failed to build handler function"),
        }
        self.closures.borrow_mut().push(closure);
    }

    /// The JS event loop cannot be blocked, so parking leaks the closures instead;
    /// they stay callable for the lifetime of the page.
    fn park(self) {
        for closure in self.closures.into_inner() {
            closure.forget();
        }
    }
}

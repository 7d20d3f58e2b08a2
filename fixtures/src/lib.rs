//! Code generated from `api/geometry.rs`, compiled for the host.
//!
//! `server` and `server_namespaced` are the two server layouts. `client` is the wasm
//! client built against [`rpc`], where a recording host stands in for JavaScript: every
//! payload the client sends is kept so a test can hand it to a server.

include!(concat!(env!("OUT_DIR"), "/generated.rs"));

/// The runtime as the generated client imports it.
pub mod rpc {
    pub use wirestub::runtime::*;

    use std::cell::RefCell;

    pub type JsHost = RecordingHost;

    thread_local! {
        static SENT: RefCell<Vec<Vec<u8>>> = RefCell::new(Vec::new());
    }

    /// The global `sendMessage` function.
    struct SendMessage;

    #[derive(Debug, Default)]
    pub struct RecordingHost;

    impl BridgeHost for RecordingHost {
        fn global(&self, name: &str) -> BridgeValue {
            match name {
                "sendMessage" => BridgeValue::Function(Callable::new(SendMessage)),
                _ => BridgeValue::Undefined,
            }
        }

        fn invoke_with_buffer(&self, callable: &Callable, payload: &[u8]) -> Result<(), BridgeError> {
            if callable.downcast_ref::<SendMessage>().is_none() {
                return Err(BridgeError::Invoke("not sendMessage".to_owned()));
            }
            SENT.with(|sent| sent.borrow_mut().push(payload.to_vec()));
            Ok(())
        }

        fn register(&self, _: &str, _: Handler) {}

        fn park(self) {}
    }

    /// Payloads sent on this thread since the last call.
    pub fn take_sent() -> Vec<Vec<u8>> {
        SENT.with(|sent| sent.take())
    }
}

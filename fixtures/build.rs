//! Generates both servers and the client from `api/geometry.rs` into OUT_DIR.

use std::{env, fs, path::Path};
use wirestub::{generate, GenerateOptions, Layout, Target};

const INPUT: &str = "api/geometry.rs";

/// The client is gated to wasm; the fixture runs it on the host.
const WASM_ONLY: &str = "target_arch = \"wasm32\"";

fn main() {
    println!("cargo::rerun-if-changed=build.rs");
    println!("cargo::rerun-if-changed={INPUT}");

    let source = fs::read_to_string(INPUT).unwrap();
    let out_dir = env::var("OUT_DIR").unwrap();

    let mut namespaced = GenerateOptions::new(Target::Server);
    namespaced.layout = Layout::Namespaced;
    let mut client = GenerateOptions::new(Target::Client);
    client.runtime_path = "crate::rpc".to_owned();

    let mut modules = String::new();
    for (module, mut options) in [
        ("server", GenerateOptions::new(Target::Server)),
        ("server_namespaced", namespaced),
        ("client", client),
    ] {
        options.source_name = Some("geometry.rs".to_owned());
        let mut code = generate(&source, &options).unwrap_or_else(|e| panic!("{INPUT}: {e}"));
        if options.target == Target::Client {
            assert!(code.contains(WASM_ONLY), "client is no longer gated to wasm");
            code = code.replace(WASM_ONLY, &format!("not({WASM_ONLY})"));
        }

        let dest = Path::new(&out_dir).join(format!("{module}.rs"));
        fs::write(&dest, code).unwrap();
        modules.push_str(&format!(
            "#[allow(dead_code)]\n#[path = {:?}]\npub mod {module};\n",
            dest.display().to_string()
        ));
    }

    fs::write(Path::new(&out_dir).join("generated.rs"), modules).unwrap();
}

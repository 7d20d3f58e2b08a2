//! The client projection: types kept, every function replaced by a proxy that encodes
//! the call and a wrapper the host bridge can call with loosely typed arguments.

use super::{aggregate, parse_fragment, Projection, RuntimePath};
use crate::{
    catalog::{FunctionCatalog, FunctionSignature, Passing},
    error::GenerateError,
    rewrite, Target,
};
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use std::collections::BTreeSet;
use syn::parse_quote;
use tracing::debug;

/// Global host function every encoded call is handed to.
const SEND_FUNCTION: &str = "sendMessage";

pub fn project(
    file: syn::File,
    catalog: &FunctionCatalog,
    runtime: &RuntimePath,
) -> Result<Projection, GenerateError> {
    let records = catalog.registry.reachable_records(catalog.param_types());
    let needs_derive: BTreeSet<String> = records
        .iter()
        .filter(|r| !r.derives_deserialize)
        .map(|r| r.ident.to_string())
        .collect();
    debug!(
        records = ?records.iter().map(|r| r.ident.to_string()).collect::<Vec<_>>(),
        ?needs_derive,
        "generating bridge conversions"
    );
    let conversions = records
        .into_iter()
        .map(|record| aggregate::client_impls(record, runtime))
        .collect::<Result<Vec<_>, _>>()?;

    let retained = rewrite::strip_for_client(file.items, &needs_derive);

    let rt = runtime.alias();
    let import = runtime.import();
    let path = runtime.path();
    let stubs = catalog.functions.iter().map(|function| {
        let proxy = proxy_fn(function, runtime);
        let wrapper = wrapper_fn(function, runtime);
        quote!(#proxy #wrapper)
    });
    let names = catalog.functions.iter().map(|f| f.ident.to_string());
    let wrappers = catalog.functions.iter().map(wrapper_ident);

    let (generated_imports, generated) = parse_fragment(quote! {
        #import
        use #path::BridgeHost as _;

        type Host = #rt::JsHost;

        #(#stubs)*

        /// Hands an encoded call to the host.
        pub fn send_message(payload: &[u8]) -> Result<(), #rt::ClientError> {
            #rt::send_message_via(&Host::default(), #SEND_FUNCTION, payload)
        }

        fn main() {
            let host = Host::default();
            #(host.register(#names, #wrappers);)*
            host.park();
        }

        #(#conversions)*
    })?;

    rewrite::check_collisions(&retained, &[], &generated, &generated_imports)?;

    Ok(Projection {
        target: Target::Client,
        attrs: vec![parse_quote!(#![cfg(all(target_arch = "wasm32", feature = "client"))])],
        imports: Vec::new(),
        retained,
        generated_imports,
        generated,
    })
}

fn wrapper_ident(function: &FunctionSignature) -> syn::Ident {
    format_ident!("{}_wrapper", function.ident)
}

/// Same name and parameters as the original function; encodes the call and sends it.
fn proxy_fn(function: &FunctionSignature, runtime: &RuntimePath) -> TokenStream {
    let rt = runtime.alias();
    let ident = &function.ident;
    let name = ident.to_string();
    let docs = &function.docs;
    let generics = &function.generics;
    let where_clause = &generics.where_clause;
    let params = function.params.iter().map(|p| {
        let (name, ty) = (&p.name, &p.ty.ty);
        quote!(#name: #ty)
    });
    let keys = function.params.iter().map(|p| p.name.to_string());
    let values = function.params.iter().map(|p| {
        let name = &p.name;
        match p.binding().1 {
            Passing::Exclusive => quote!(&*#name),
            _ => quote!(&#name),
        }
    });
    quote! {
        #(#docs)*
        pub fn #ident #generics (#(#params),*) -> Result<(), #rt::ClientError> #where_clause {
            let payload = #rt::encode_function_call(
                #name,
                &#rt::Options::default(),
                #rt::NamedArguments::from([#((#keys.to_owned(), #rt::Argument::new(#values)),)*]),
            )?;
            send_message(&payload)
        }
    }
}

/// Checks the argument count, converts each positional value to its parameter type and
/// calls the proxy.
fn wrapper_fn(function: &FunctionSignature, runtime: &RuntimePath) -> TokenStream {
    let rt = runtime.alias();
    let ident = &function.ident;
    let wrapper = wrapper_ident(function);
    let arity = Literal::usize_unsuffixed(function.params.len());

    let mut convert = Vec::with_capacity(function.params.len());
    let mut call_args = Vec::with_capacity(function.params.len());
    for (index, param) in function.params.iter().enumerate() {
        let index = Literal::usize_unsuffixed(index);
        let key = param.name.to_string();
        let binding = format_ident!("param_{}", param.name);
        let (owned, passing) = param.binding();
        let (mutability, pass) = match passing {
            Passing::Value => (quote!(), quote!(#binding)),
            Passing::Shared => (quote!(), quote!(&#binding)),
            Passing::Exclusive => (quote!(mut), quote!(&mut #binding)),
        };
        convert.push(quote! {
            let #mutability #binding: #owned = #rt::convert_argument(&args[#index], #key)?;
        });
        call_args.push(pass);
    }

    quote! {
        pub fn #wrapper(args: &[#rt::BridgeValue]) -> Result<(), #rt::ClientError> {
            #rt::expect_arity(args, #arity)?;
            #(#convert)*
            #ident(#(#call_args),*)
        }
    }
}

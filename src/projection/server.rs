//! The server projection: original items kept, plus a `receive` dispatcher.

use super::{aggregate, parse_fragment, split_imports, Projection, RuntimePath};
use crate::{
    catalog::{FunctionCatalog, FunctionSignature, OkShape, Passing},
    error::GenerateError,
    rewrite, Layout, Target,
};
use proc_macro2::TokenStream;
use quote::{format_ident, quote, ToTokens};
use std::collections::BTreeSet;
use syn::{parse_quote, Attribute};
use tracing::debug;

const DISPATCH_MODULE: &str = "dispatch";

pub fn project(
    file: syn::File,
    catalog: &FunctionCatalog,
    layout: &Layout,
    runtime: &RuntimePath,
) -> Result<Projection, GenerateError> {
    let (imports, mut retained) = split_imports(file.items);

    if let Layout::Prefixed(prefix) = layout {
        let names: BTreeSet<String> = catalog.functions.iter().map(|f| f.ident.to_string()).collect();
        rewrite::prefix_functions(&mut retained, &names, prefix)?;
    }

    // Results are rendered with `{:?}`.
    let needs_debug: BTreeSet<String> = catalog
        .registry
        .reachable_records(catalog.result_types())
        .into_iter()
        .filter(|r| !r.implements_debug)
        .map(|r| r.ident.to_string())
        .collect();
    if !needs_debug.is_empty() {
        debug!(?needs_debug, "deriving Debug for rendered records");
        rewrite::add_derive(&mut retained, &needs_debug, &parse_quote!(Debug));
    }

    let arms = catalog
        .functions
        .iter()
        .map(|function| dispatch_arm(function, &callee(layout, function), runtime));
    let receive = receive_fn(arms, runtime);
    let receive = match layout {
        Layout::Prefixed(_) => receive,
        Layout::Namespaced => {
            let module = format_ident!("{}", DISPATCH_MODULE);
            quote! {
                pub mod #module {
                    use super::*;

                    #receive
                }
            }
        }
    };

    let records = catalog.registry.reachable_records(catalog.param_types());
    debug!(
        records = ?records.iter().map(|r| r.ident.to_string()).collect::<Vec<_>>(),
        "generating wire decoders"
    );
    let decoders = records
        .into_iter()
        .map(|record| aggregate::from_wire_impl(record, runtime))
        .collect::<Result<Vec<_>, _>>()?;

    let import = runtime.import();
    let (generated_imports, generated) = parse_fragment(quote! {
        #import
        #receive
        #(#decoders)*
    })?;

    rewrite::check_collisions(&retained, &imports, &generated, &generated_imports)?;

    let mut attrs: Vec<Attribute> = vec![parse_quote!(#![cfg(feature = "server")])];
    attrs.extend(file.attrs);

    Ok(Projection {
        target: Target::Server,
        attrs,
        imports,
        retained,
        generated_imports,
        generated,
    })
}

/// How the dispatcher reaches the implementation of `function`.
fn callee(layout: &Layout, function: &FunctionSignature) -> TokenStream {
    match layout {
        Layout::Prefixed(prefix) => {
            let ident = rewrite::prefixed(prefix, &function.ident.to_string());
            quote!(#ident)
        }
        Layout::Namespaced => {
            let ident = &function.ident;
            quote!(super::#ident)
        }
    }
}

fn receive_fn(arms: impl Iterator<Item = TokenStream>, runtime: &RuntimePath) -> TokenStream {
    let rt = runtime.alias();
    quote! {
        /// Decodes one function call from `payload`, runs it and formats its reply.
        pub fn receive(payload: &[u8]) -> #rt::Reply {
            let (function_name, mut call_args) =
                #rt::decode_function_call(payload, &#rt::Options::default())?;
            match function_name.as_str() {
                #(#arms)*
                unknown => Err(#rt::DispatchError::UnknownFunction(unknown.to_owned())),
            }
        }
    }
}

fn dispatch_arm(function: &FunctionSignature, callee: &TokenStream, runtime: &RuntimePath) -> TokenStream {
    let rt = runtime.alias();
    let name = function.ident.to_string();

    let mut decode = Vec::with_capacity(function.params.len());
    let mut call_args = Vec::with_capacity(function.params.len());
    for param in &function.params {
        debug!(
            function = %name,
            param = %param.name,
            ty = %param.ty.name,
            class = ?param.ty.classification,
            "decoding parameter"
        );
        let key = param.name.to_string();
        let binding = format_ident!("param_{}", param.name);
        let (owned, passing) = param.binding();
        let (mutability, pass) = match passing {
            Passing::Value => (quote!(), quote!(#binding)),
            Passing::Shared => (quote!(), quote!(&#binding)),
            Passing::Exclusive => (quote!(mut), quote!(&mut #binding)),
        };
        decode.push(quote! {
            let #mutability #binding: #owned = #rt::take_argument(&mut call_args, #key)?;
        });
        call_args.push(pass);
    }

    let mut call = quote!(#callee(#(#call_args),*));
    if function.fallible {
        call = quote!(#call.map_err(#rt::DispatchError::call)?);
    }

    let values: Vec<_> = function.values().collect();
    let payload = function.payload_index();
    let used = |i: usize| payload.map_or(true, |p| p == i);
    let bindings: Vec<TokenStream> = (0..values.len())
        .map(|i| match used(i) {
            true => format_ident!("result_{}", i).into_token_stream(),
            false => quote!(_),
        })
        .collect();

    let invoke = match function.shape {
        OkShape::Unit => quote!(#call;),
        OkShape::Single => {
            let result = &bindings[0];
            quote!(let #result = #call;)
        }
        OkShape::Tuple(_) => quote!(let (#(#bindings,)*) = #call;),
    };

    let reply = match payload {
        Some(i) => {
            let result = format_ident!("result_{}", i);
            quote!(Ok(String::from(#result)))
        }
        None if values.is_empty() => quote!(Ok(String::new())),
        None => quote!(Ok(#rt::render_results(&[#(&#bindings),*]))),
    };

    quote! {
        #name => {
            #(#decode)*
            #invoke
            #reply
        }
    }
}

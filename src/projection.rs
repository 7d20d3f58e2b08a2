//! Projection of one input file onto a server or client artifact.

pub mod aggregate;
pub mod client;
pub mod server;

use crate::{error::GenerateError, Target};
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Attribute, Ident, Item, ItemUse};

/// Everything an artifact is merged from, before formatting.
#[derive(Debug)]
pub struct Projection {
    pub target: Target,
    pub attrs: Vec<Attribute>,
    /// Original imports kept by the projection.
    pub imports: Vec<ItemUse>,
    /// Original items kept by the projection, after rewriting.
    pub retained: Vec<Item>,
    pub generated_imports: Vec<ItemUse>,
    pub generated: Vec<Item>,
}

/// Where generated code finds the runtime, and the name it is imported under.
#[derive(Debug, Clone)]
pub struct RuntimePath {
    path: syn::Path,
    alias: Ident,
}

impl RuntimePath {
    pub fn parse(text: &str) -> Result<Self, GenerateError> {
        let invalid = |source| GenerateError::RuntimePath {
            path: text.to_owned(),
            source,
        };
        let path: syn::Path = syn::parse_str(text).map_err(invalid)?;
        let alias = match path.segments.last() {
            Some(last) if !matches!(last.ident.to_string().as_str(), "crate" | "self" | "super") => {
                last.ident.clone()
            }
            _ => {
                return Err(invalid(syn::Error::new(
                    Span::call_site(),
                    "the path must end in a module name",
                )))
            }
        };
        if path
            .segments
            .iter()
            .any(|segment| !segment.arguments.is_none())
        {
            return Err(invalid(syn::Error::new(
                Span::call_site(),
                "the path must not carry generic arguments",
            )));
        }
        Ok(Self { path, alias })
    }

    /// The name generated code refers to the runtime by.
    pub fn alias(&self) -> &Ident {
        &self.alias
    }

    pub fn path(&self) -> &syn::Path {
        &self.path
    }

    pub fn import(&self) -> TokenStream {
        let path = &self.path;
        quote!(use #path;)
    }
}

/// Parses generated tokens back into items, splitting off the imports.
pub(crate) fn parse_fragment(tokens: TokenStream) -> Result<(Vec<ItemUse>, Vec<Item>), GenerateError> {
    let file: syn::File = syn::parse2(tokens).map_err(GenerateError::Fragment)?;
    let mut imports = Vec::new();
    let mut items = Vec::new();
    for item in file.items {
        match item {
            Item::Use(import) => imports.push(import),
            other => items.push(other),
        }
    }
    Ok((imports, items))
}

/// Splits original items into imports and everything else.
pub(crate) fn split_imports(items: Vec<Item>) -> (Vec<ItemUse>, Vec<Item>) {
    let mut imports = Vec::new();
    let mut rest = Vec::new();
    for item in items {
        match item {
            Item::Use(import) => imports.push(import),
            other => rest.push(other),
        }
    }
    (imports, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_path_alias_is_last_segment() {
        let runtime = RuntimePath::parse("::wirestub::runtime").unwrap();
        assert_eq!(runtime.alias(), "runtime");
        assert_eq!(runtime.import().to_string(), "use :: wirestub :: runtime ;");
        assert_eq!(RuntimePath::parse("crate::rpc").unwrap().alias(), "rpc");
    }

    #[test]
    fn runtime_path_must_name_a_module() {
        for bad in ["", "crate", "a::<T>", "not a path"] {
            assert!(
                matches!(RuntimePath::parse(bad), Err(GenerateError::RuntimePath { .. })),
                "{bad:?} was accepted"
            );
        }
    }
}

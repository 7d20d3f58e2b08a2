//! Primitive/aggregate classification of declared types.
//!
//! The registry is built once from the top-level items of the input and passed by
//! reference to everything that needs to classify a type.

use std::collections::{BTreeMap, BTreeSet};
use syn::{Fields, GenericArgument, Ident, Item, PathArguments, Type};

/// Aliases pointing at aliases are followed at most this far.
const MAX_ALIAS_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Primitive,
    Aggregate,
}

#[derive(Debug, Clone)]
pub struct RecordField {
    pub ident: Ident,
    pub ty: Type,
}

/// A struct with named fields.
#[derive(Debug, Clone)]
pub struct RecordShape {
    pub ident: Ident,
    pub generics: syn::Generics,
    pub fields: Vec<RecordField>,
    pub derives_deserialize: bool,
    /// Derives `Debug` or has a `Debug` impl in the same file.
    pub implements_debug: bool,
}

#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    records: Vec<RecordShape>,
    index: BTreeMap<String, usize>,
    aliases: BTreeMap<String, Type>,
}

impl TypeRegistry {
    pub fn from_items(items: &[Item]) -> Self {
        let mut registry = Self::default();
        for item in items {
            match item {
                Item::Struct(item) => {
                    let Fields::Named(named) = &item.fields else {
                        continue;
                    };
                    let fields = named
                        .named
                        .iter()
                        .filter_map(|field| {
                            Some(RecordField {
                                ident: field.ident.clone()?,
                                ty: field.ty.clone(),
                            })
                        })
                        .collect();
                    registry
                        .index
                        .insert(item.ident.to_string(), registry.records.len());
                    registry.records.push(RecordShape {
                        ident: item.ident.clone(),
                        generics: item.generics.clone(),
                        fields,
                        derives_deserialize: derives(&item.attrs, "Deserialize"),
                        implements_debug: derives(&item.attrs, "Debug"),
                    });
                }
                Item::Type(alias) => {
                    registry
                        .aliases
                        .insert(alias.ident.to_string(), (*alias.ty).clone());
                }
                _ => {}
            }
        }
        for item in items {
            let Item::Impl(imp) = item else {
                continue;
            };
            let Some((_, trait_, _)) = &imp.trait_ else {
                continue;
            };
            if !trait_.segments.last().is_some_and(|s| s.ident == "Debug") {
                continue;
            }
            if let Some(&i) = path_ident(&imp.self_ty).and_then(|name| registry.index.get(&name.to_string())) {
                registry.records[i].implements_debug = true;
            }
        }
        registry
    }

    pub fn record(&self, name: &str) -> Option<&RecordShape> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub fn classify(&self, ty: &Type) -> Classification {
        match self.record_index(ty) {
            Some(_) => Classification::Aggregate,
            None => Classification::Primitive,
        }
    }

    /// Every record mentioned by `roots`, directly, through generic arguments or
    /// through other records' fields. Returned in declaration order.
    pub fn reachable_records<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a Type>,
    ) -> Vec<&RecordShape> {
        let mut seen = BTreeSet::new();
        let mut seen_aliases = BTreeSet::new();
        let mut pending: Vec<Type> = roots.into_iter().cloned().collect();
        while let Some(ty) = pending.pop() {
            for mentioned in mentioned_types(&ty) {
                let Some(name) = path_ident(mentioned).map(Ident::to_string) else {
                    continue;
                };
                if let Some(alias) = self.aliases.get(&name) {
                    if seen_aliases.insert(name.clone()) {
                        pending.push(alias.clone());
                    }
                }
                if let Some(&i) = self.index.get(&name) {
                    if seen.insert(i) {
                        pending.extend(self.records[i].fields.iter().map(|f| f.ty.clone()));
                    }
                }
            }
        }
        seen.into_iter().map(|i| &self.records[i]).collect()
    }

    fn record_index(&self, ty: &Type) -> Option<usize> {
        let mut ty = strip_reference(ty);
        for _ in 0..MAX_ALIAS_DEPTH {
            let name = path_ident(ty)?.to_string();
            if let Some(&i) = self.index.get(&name) {
                return Some(i);
            }
            ty = strip_reference(self.aliases.get(&name)?);
        }
        None
    }
}

/// Looks through references, parentheses and invisible groups.
fn strip_reference(ty: &Type) -> &Type {
    match ty {
        Type::Reference(reference) => strip_reference(&reference.elem),
        Type::Paren(paren) => strip_reference(&paren.elem),
        Type::Group(group) => strip_reference(&group.elem),
        other => other,
    }
}

/// The last path segment of a plain type path.
pub(crate) fn path_ident(ty: &Type) -> Option<&Ident> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last().map(|s| &s.ident),
        _ => None,
    }
}

/// `ty` itself plus every type nested in it.
fn mentioned_types(ty: &Type) -> Vec<&Type> {
    let mut out = vec![ty];
    match ty {
        Type::Reference(r) => out.extend(mentioned_types(&r.elem)),
        Type::Paren(p) => out.extend(mentioned_types(&p.elem)),
        Type::Group(g) => out.extend(mentioned_types(&g.elem)),
        Type::Slice(s) => out.extend(mentioned_types(&s.elem)),
        Type::Array(a) => out.extend(mentioned_types(&a.elem)),
        Type::Tuple(t) => t.elems.iter().for_each(|e| out.extend(mentioned_types(e))),
        Type::Path(p) => {
            for segment in &p.path.segments {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    for arg in &args.args {
                        if let GenericArgument::Type(inner) = arg {
                            out.extend(mentioned_types(inner));
                        }
                    }
                }
            }
        }
        _ => {}
    }
    out
}

/// Whether `ty` mentions `Option<Option<_>>` anywhere. `None` and `Some(None)` encode
/// identically, so such a value cannot survive the trip.
pub(crate) fn has_nested_option(ty: &Type) -> bool {
    mentioned_types(ty).into_iter().any(|outer| {
        option_argument(outer).is_some_and(|inner| option_argument(strip_reference(inner)).is_some())
    })
}

/// `T` for an `Option<T>`.
fn option_argument(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let last = path.path.segments.last()?;
    if last.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

/// Whether `attrs` carry a `#[derive(..)]` naming `name` (by its last path segment).
fn derives(attrs: &[syn::Attribute], name: &str) -> bool {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("derive"))
        .filter_map(|attr| {
            attr.parse_args_with(
                syn::punctuated::Punctuated::<syn::Path, syn::Token![,]>::parse_terminated,
            )
            .ok()
        })
        .flatten()
        .any(|path| path.segments.last().is_some_and(|s| s.ident == name))
}

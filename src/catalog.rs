//! Normalized signatures of the public functions in one input file.

use crate::{
    classify::{has_nested_option, path_ident, Classification, TypeRegistry},
    error::GenerateError,
};
use quote::ToTokens;
use std::{collections::BTreeSet, fmt};
use syn::{
    FnArg, GenericArgument, GenericParam, Ident, Item, ItemFn, Pat, PathArguments, ReturnType,
    Type, Visibility,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TypeRef {
    pub ty: Type,
    pub name: String,
    pub classification: Classification,
}

impl TypeRef {
    fn new(ty: Type, registry: &TypeRegistry) -> Self {
        let name = ty.to_token_stream().to_string();
        let classification = registry.classify(&ty);
        Self {
            ty,
            name,
            classification,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: Ident,
    pub ty: TypeRef,
}

/// How a decoded argument is handed to the function it was decoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passing {
    Value,
    Shared,
    Exclusive,
}

impl ParamInfo {
    /// The owned type an argument is decoded into: `&str` is held as a `String`,
    /// `&[T]` as a `Vec<T>` and `&T` as a `T`.
    pub fn binding(&self) -> (Type, Passing) {
        let Type::Reference(reference) = &self.ty.ty else {
            return (self.ty.ty.clone(), Passing::Value);
        };
        let owned = match &*reference.elem {
            Type::Path(path) if path.qself.is_none() && path.path.is_ident("str") => {
                syn::parse_quote!(String)
            }
            Type::Slice(slice) => {
                let elem = &slice.elem;
                syn::parse_quote!(Vec<#elem>)
            }
            other => other.clone(),
        };
        let passing = match reference.mutability {
            Some(_) => Passing::Exclusive,
            None => Passing::Shared,
        };
        (owned, passing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultRole {
    /// The failure signal; an `Err`.
    Error,
    /// The string result returned verbatim as the reply.
    Payload,
    Other,
}

#[derive(Debug, Clone)]
pub struct ResultInfo {
    pub name: Option<Ident>,
    pub ty: TypeRef,
    pub role: ResultRole,
}

/// How the value a function returns is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OkShape {
    Unit,
    Single,
    Tuple(usize),
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub ident: Ident,
    pub params: Vec<ParamInfo>,
    pub results: Vec<ResultInfo>,
    pub shape: OkShape,
    pub fallible: bool,
    /// `#[doc]` attributes of the declaration.
    pub docs: Vec<syn::Attribute>,
    pub generics: syn::Generics,
}

impl FunctionSignature {
    /// Results other than the error, in declared order.
    pub fn values(&self) -> impl Iterator<Item = &ResultInfo> {
        self.results.iter().filter(|r| r.role != ResultRole::Error)
    }

    pub fn payload_index(&self) -> Option<usize> {
        self.values().position(|r| r.role == ResultRole::Payload)
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.ident)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty.name)?;
        }
        f.write_str(") -> (")?;
        for (i, result) in self.results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&result.ty.name)?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone)]
pub struct FunctionCatalog {
    pub functions: Vec<FunctionSignature>,
    pub registry: TypeRegistry,
}

impl FunctionCatalog {
    /// Walks the top-level items in order and keeps every `pub fn`.
    pub fn build(items: &[Item]) -> Result<Self, GenerateError> {
        let registry = TypeRegistry::from_items(items);
        let mut functions = Vec::new();
        let mut names = BTreeSet::new();
        for item in items {
            let Item::Fn(function) = item else {
                continue;
            };
            if !is_public(&function.vis) {
                continue;
            }
            let signature = signature(function, &registry)?;
            if !names.insert(signature.ident.to_string()) {
                return Err(GenerateError::DuplicateFunction(signature.ident.to_string()));
            }
            debug!(function = %signature, "found function");
            functions.push(signature);
        }
        Ok(Self {
            functions,
            registry,
        })
    }

    /// Parameter types of every function.
    pub fn param_types(&self) -> impl Iterator<Item = &Type> {
        self.functions
            .iter()
            .flat_map(|f| f.params.iter().map(|p| &p.ty.ty))
    }

    /// Types of every result other than the error.
    pub fn result_types(&self) -> impl Iterator<Item = &Type> {
        self.functions
            .iter()
            .flat_map(|f| f.values().map(|r| &r.ty.ty))
    }
}

fn is_public(vis: &Visibility) -> bool {
    matches!(vis, Visibility::Public(_))
}

fn signature(function: &ItemFn, registry: &TypeRegistry) -> Result<FunctionSignature, GenerateError> {
    let sig = &function.sig;
    let name = sig.ident.to_string();
    let unsupported = |reason| GenerateError::UnsupportedSignature {
        function: name.clone(),
        reason,
    };
    if sig.asyncness.is_some() {
        return Err(unsupported("async functions are not supported"));
    }
    if sig.unsafety.is_some() {
        return Err(unsupported("unsafe functions are not supported"));
    }
    if sig.abi.is_some() || sig.variadic.is_some() {
        return Err(unsupported("foreign ABIs are not supported"));
    }
    if sig
        .generics
        .params
        .iter()
        .any(|p| !matches!(p, GenericParam::Lifetime(_)))
    {
        return Err(unsupported("only lifetime parameters are supported"));
    }

    let mut params = Vec::with_capacity(sig.inputs.len());
    for (index, input) in sig.inputs.iter().enumerate() {
        let FnArg::Typed(typed) = input else {
            return Err(unsupported("receivers are not supported"));
        };
        let Pat::Ident(binding) = &*typed.pat else {
            return Err(GenerateError::UnnamedParameter {
                function: name.clone(),
                index,
            });
        };
        if binding.subpat.is_some() || binding.by_ref.is_some() {
            return Err(GenerateError::UnnamedParameter {
                function: name.clone(),
                index,
            });
        }
        if has_nested_option(&typed.ty) {
            return Err(unsupported("nested Option parameters cannot be told apart on the wire"));
        }
        params.push(ParamInfo {
            name: binding.ident.clone(),
            ty: TypeRef::new((*typed.ty).clone(), registry),
        });
    }

    let (results, shape, fallible) = explode_output(&sig.output, registry);

    Ok(FunctionSignature {
        ident: sig.ident.clone(),
        params,
        results,
        shape,
        fallible,
        docs: function
            .attrs
            .iter()
            .filter(|a| a.path().is_ident("doc"))
            .cloned()
            .collect(),
        generics: sig.generics.clone(),
    })
}

/// Splits a return type into its results.
fn explode_output(output: &ReturnType, registry: &TypeRegistry) -> (Vec<ResultInfo>, OkShape, bool) {
    let ReturnType::Type(_, ty) = output else {
        return (Vec::new(), OkShape::Unit, false);
    };
    let (ok, err) = match split_result(ty) {
        Some((ok, err)) => (ok, Some(err)),
        None => (&**ty, None),
    };

    let (ok_types, shape): (Vec<&Type>, OkShape) = match ok {
        Type::Tuple(tuple) if tuple.elems.is_empty() => (Vec::new(), OkShape::Unit),
        Type::Tuple(tuple) => (tuple.elems.iter().collect(), OkShape::Tuple(tuple.elems.len())),
        single => (vec![single], OkShape::Single),
    };

    let mut payload_seen = false;
    let mut results: Vec<ResultInfo> = ok_types
        .into_iter()
        .map(|ty| {
            let role = if !payload_seen && is_string(ty) {
                payload_seen = true;
                ResultRole::Payload
            } else {
                ResultRole::Other
            };
            ResultInfo {
                name: None,
                ty: TypeRef::new(ty.clone(), registry),
                role,
            }
        })
        .collect();

    let fallible = err.is_some();
    if let Some(err) = err {
        results.push(ResultInfo {
            name: None,
            ty: TypeRef::new(err, registry),
            role: ResultRole::Error,
        });
    }
    (results, shape, fallible)
}

/// `Result<T, E>` gives `(T, E)`; a one-argument alias such as `io::Result<T>` gives
/// `(T, _)`.
fn split_result(ty: &Type) -> Option<(&Type, Type)> {
    let Type::Path(path) = ty else {
        return None;
    };
    let last = path.path.segments.last()?;
    if last.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    let mut types = args.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    });
    let ok = types.next()?;
    let err = types.next().cloned().unwrap_or_else(|| syn::parse_quote!(_));
    Some((ok, err))
}

fn is_string(ty: &Type) -> bool {
    match ty {
        Type::Reference(reference) => is_string(&reference.elem),
        other => path_ident(other).is_some_and(|i| i == "String" || i == "str"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(src: &str) -> Result<FunctionCatalog, GenerateError> {
        FunctionCatalog::build(&syn::parse_file(src).unwrap().items)
    }

    #[test]
    fn keeps_public_functions_in_order() {
        let c = catalog(
            "pub fn b() {} fn hidden() {} pub(crate) fn internal() {} pub fn a(x: i32, mut y: i32) {}",
        )
        .unwrap();
        let names: Vec<String> = c.functions.iter().map(|f| f.ident.to_string()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(c.functions[1].params.len(), 2);
        assert_eq!(c.functions[1].params[1].name, "y");
    }

    #[test]
    fn result_roles() {
        let c = catalog(
            "pub fn greet(name: String) -> String { name }
             pub fn sum(a: i64, b: i64) -> Result<i64, String> { Ok(a + b) }
             pub fn pair() -> (u8, String, String) { todo!() }
             pub fn io() -> std::io::Result<()> { Ok(()) }",
        )
        .unwrap();

        let greet = &c.functions[0];
        assert_eq!(greet.results.len(), 1);
        assert_eq!(greet.results[0].role, ResultRole::Payload);
        assert!(!greet.fallible);

        let sum = &c.functions[1];
        let roles: Vec<_> = sum.results.iter().map(|r| r.role).collect();
        assert_eq!(roles, [ResultRole::Other, ResultRole::Error]);
        assert!(sum.fallible);
        assert_eq!(sum.shape, OkShape::Single);

        let pair = &c.functions[2];
        let roles: Vec<_> = pair.results.iter().map(|r| r.role).collect();
        assert_eq!(roles, [ResultRole::Other, ResultRole::Payload, ResultRole::Other]);
        assert_eq!(pair.shape, OkShape::Tuple(3));
        assert_eq!(pair.payload_index(), Some(1));

        let io = &c.functions[3];
        assert_eq!(io.shape, OkShape::Unit);
        assert_eq!(io.results.len(), 1);
        assert_eq!(io.results[0].ty.name, "_");
    }

    #[test]
    fn references_decode_into_owned_bindings() {
        let c = catalog("pub fn f(a: &str, b: &[u8], c: &mut Point, d: u8) {}").unwrap();
        let bindings: Vec<(String, Passing)> = c.functions[0]
            .params
            .iter()
            .map(|p| {
                let (ty, passing) = p.binding();
                (ty.to_token_stream().to_string(), passing)
            })
            .collect();
        assert_eq!(
            bindings,
            [
                ("String".to_owned(), Passing::Shared),
                ("Vec < u8 >".to_owned(), Passing::Shared),
                ("Point".to_owned(), Passing::Exclusive),
                ("u8".to_owned(), Passing::Value),
            ]
        );
    }

    #[test]
    fn display_matches_declaration() {
        let c = catalog("pub fn sum(a: i64, b: i64) -> Result<i64, String> { Ok(a + b) }").unwrap();
        assert_eq!(c.functions[0].to_string(), "sum(a: i64, b: i64) -> (i64, String)");
    }

    #[test]
    fn rejects_unprojectable_signatures() {
        assert!(matches!(
            catalog("pub fn f((a, b): (i32, i32)) {}"),
            Err(GenerateError::UnnamedParameter { index: 0, .. })
        ));
        assert!(matches!(
            catalog("pub fn f(_: i32) {}"),
            Err(GenerateError::UnnamedParameter { .. })
        ));
        assert!(matches!(
            catalog("pub async fn f() {}"),
            Err(GenerateError::UnsupportedSignature { .. })
        ));
        assert!(matches!(
            catalog("pub fn f<T>(t: T) {}"),
            Err(GenerateError::UnsupportedSignature { .. })
        ));
        assert!(catalog("pub fn f<'a>(s: &'a str) {}").is_ok());
        assert!(matches!(
            catalog("pub fn f(flag: Option<Option<bool>>) {}"),
            Err(GenerateError::UnsupportedSignature { function, reason })
                if function == "f" && reason.contains("nested Option")
        ));
        assert!(catalog("pub fn f() -> Option<Option<bool>> { None }").is_ok());
        assert!(matches!(
            catalog("#[cfg(a)] pub fn f() {} #[cfg(not(a))] pub fn f() {}"),
            Err(GenerateError::DuplicateFunction(name)) if name == "f"
        ));
    }
}

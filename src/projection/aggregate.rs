//! Wire impls for record types reachable from the catalog.

use super::RuntimePath;
use crate::{
    classify::{has_nested_option, RecordShape},
    error::GenerateError,
};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, GenericParam, Generics};

fn check(record: &RecordShape) -> Result<(), GenerateError> {
    if record.generics.lifetimes().next().is_some() {
        return Err(GenerateError::UnsupportedRecord {
            record: record.ident.to_string(),
            reason: "records with lifetime parameters cannot be decoded from the wire",
        });
    }
    if record.fields.iter().any(|f| has_nested_option(&f.ty)) {
        return Err(GenerateError::UnsupportedRecord {
            record: record.ident.to_string(),
            reason: "nested Option fields cannot be told apart on the wire",
        });
    }
    Ok(())
}

/// Adds `bound` to every type parameter.
fn bounded(generics: &Generics, bound: syn::TypeParamBound) -> Generics {
    let mut generics = generics.clone();
    for param in &mut generics.params {
        if let GenericParam::Type(param) = param {
            param.bounds.push(bound.clone());
        }
    }
    generics
}

/// `FromWire` for the server: start from the zero value of every field and copy the
/// fields the wire record carries.
pub fn from_wire_impl(record: &RecordShape, runtime: &RuntimePath) -> Result<TokenStream, GenerateError> {
    check(record)?;
    let rt = runtime.alias();
    let ident = &record.ident;
    let name = ident.to_string();
    let generics = bounded(&record.generics, parse_quote!(#rt::FromWire));
    let (impl_generics, _, where_clause) = generics.split_for_impl();
    let (_, ty_generics, _) = record.generics.split_for_impl();

    let fields = record.fields.iter().map(|f| &f.ident);
    let keys = record.fields.iter().map(|f| f.ident.to_string());
    let zero_fields = record.fields.iter().map(|f| &f.ident);

    Ok(quote! {
        impl #impl_generics #rt::FromWire for #ident #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #name;

            fn from_wire(value: #rt::WireValue) -> Result<Self, #rt::TypeMismatch> {
                let mut fields = value.into_record(Self::TYPE_NAME)?;
                Ok(Self {
                    #(#fields: #rt::take_field(&mut fields, #keys)?,)*
                })
            }

            fn zero() -> Self {
                Self {
                    #(#zero_fields: #rt::FromWire::zero(),)*
                }
            }
        }
    })
}

/// `ToWire` and `FromBridge` for the client. Bridge conversion goes through the
/// record's `Deserialize` impl.
pub fn client_impls(record: &RecordShape, runtime: &RuntimePath) -> Result<TokenStream, GenerateError> {
    check(record)?;
    let rt = runtime.alias();
    let ident = &record.ident;
    let name = ident.to_string();
    let generics = bounded(&record.generics, parse_quote!(#rt::ToWire));
    let (to_impl_generics, _, to_where) = generics.split_for_impl();
    let (impl_generics, ty_generics, _) = record.generics.split_for_impl();

    let fields = record.fields.iter().map(|f| &f.ident);
    let keys = record.fields.iter().map(|f| f.ident.to_string());

    Ok(quote! {
        impl #to_impl_generics #rt::ToWire for #ident #ty_generics #to_where {
            fn to_wire(&self) -> #rt::WireValue {
                #rt::WireValue::Record(::std::collections::BTreeMap::from([
                    #((#keys.to_owned(), #rt::ToWire::to_wire(&self.#fields)),)*
                ]))
            }
        }

        impl #impl_generics #rt::FromBridge for #ident #ty_generics
        where
            Self: ::serde::de::DeserializeOwned,
        {
            const KIND: #rt::TargetKind = #rt::TargetKind::Aggregate;
            const TYPE_NAME: &'static str = #name;

            fn from_native(native: #rt::Native) -> Result<Self, #rt::ConversionError> {
                #rt::aggregate_from_native(native, Self::TYPE_NAME)
            }
        }
    })
}

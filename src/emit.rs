//! Merging a projection into one formatted source file.

use crate::{projection::Projection, GenerateOptions};
use chrono::SecondsFormat;
use syn::{Item, ItemUse};

/// Imports first (original, then generated ones not already present), then the retained
/// items, then the generated ones.
pub fn render(projection: Projection, options: &GenerateOptions) -> String {
    let Projection {
        target,
        attrs,
        imports,
        retained,
        generated_imports,
        generated,
    } = projection;

    let mut merged: Vec<ItemUse> = Vec::with_capacity(imports.len() + generated_imports.len());
    for import in imports.into_iter().chain(generated_imports) {
        if !merged.contains(&import) {
            merged.push(import);
        }
    }

    let file = syn::File {
        shebang: None,
        attrs,
        items: merged
            .into_iter()
            .map(Item::Use)
            .chain(retained)
            .chain(generated)
            .collect(),
    };

    let mut out = format!(
        "// Code generated by wirestub ({target}) from {}. DO NOT EDIT.\n",
        options.source_name.as_deref().unwrap_or("<input>")
    );
    if let Some(timestamp) = &options.timestamp {
        out += &format!(
            "// Generated at {}.\n",
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
        );
    }
    out.push('\n');
    out.push_str(&prettyplease::unparse(&file));
    out
}

//! Renaming, stripping and collision checks on the original items.

use crate::error::GenerateError;
use proc_macro2::{Delimiter, Group, Ident, TokenStream, TokenTree};
use std::collections::{BTreeMap, BTreeSet};
use syn::{
    parse_quote,
    visit::{self, Visit},
    visit_mut::{self, VisitMut},
    Arm, Block, Expr, ExprClosure, ExprForLoop, ExprIf, ExprPath, ExprWhile, FnArg, ImplItemFn,
    Item, ItemFn, ItemMod, ItemUse, Local, Macro, Pat, PatIdent, Path, Signature, TraitItemFn,
    UseTree,
};
use tracing::trace;

/// Renames each function in `names` to `<prefix>_<name>`, along with every reference to
/// it from the top-level items of the file. Nested modules and names shadowed by a local
/// binding are left alone.
pub fn prefix_functions(
    items: &mut [Item],
    names: &BTreeSet<String>,
    prefix: &str,
) -> Result<(), GenerateError> {
    let renames: BTreeMap<String, Ident> = names
        .iter()
        .map(|name| (name.clone(), prefixed(prefix, name)))
        .collect();
    let mut declared = Vec::new();
    declared_names(items, &mut declared);
    if let Some(taken) = renames
        .values()
        .find(|new| declared.iter().any(|name| name == *new))
    {
        return Err(GenerateError::NameCollision(taken.to_string()));
    }

    let mut renamer = Renamer {
        renames,
        scopes: Vec::new(),
    };
    for item in items.iter_mut() {
        if let Item::Fn(function) = item {
            if let Some(new) = renamer.renames.get(&function.sig.ident.to_string()) {
                trace!(from = %function.sig.ident, to = %new, "renaming function");
                let mut new = new.clone();
                new.set_span(function.sig.ident.span());
                function.sig.ident = new;
            }
        }
        renamer.visit_item_mut(item);
    }
    Ok(())
}

pub fn prefixed(prefix: &str, name: &str) -> Ident {
    quote::format_ident!("{}_{}", prefix, name.trim_start_matches("r#"))
}

struct Renamer {
    renames: BTreeMap<String, Ident>,
    /// Names bound by the parameters, `let`s, closures, loops and match arms around the
    /// expression being visited, innermost last.
    scopes: Vec<BTreeSet<String>>,
}

/// Every identifier a pattern binds.
#[derive(Default)]
struct Bindings(Vec<String>);

impl<'ast> Visit<'ast> for Bindings {
    fn visit_pat_ident(&mut self, pat: &'ast PatIdent) {
        self.0.push(pat.ident.to_string());
        visit::visit_pat_ident(self, pat);
    }
}

fn params(sig: &Signature) -> impl Iterator<Item = &Pat> {
    sig.inputs.iter().filter_map(|input| match input {
        FnArg::Typed(typed) => Some(&*typed.pat),
        FnArg::Receiver(_) => None,
    })
}

impl Renamer {
    fn shadowed(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn bind(&mut self, pat: &Pat) {
        let mut bindings = Bindings::default();
        bindings.visit_pat(pat);
        match self.scopes.last_mut() {
            Some(scope) => scope.extend(bindings.0),
            None => self.scopes.push(bindings.0.into_iter().collect()),
        }
    }

    fn enter<'p>(&mut self, pats: impl IntoIterator<Item = &'p Pat>) {
        self.scopes.push(BTreeSet::new());
        for pat in pats {
            self.bind(pat);
        }
    }

    fn leave(&mut self) {
        self.scopes.pop();
    }

    /// Function bodies never see the locals of an enclosing function. Returns the outer
    /// scopes, to be restored once the function has been visited.
    fn enter_function(&mut self, sig: &Signature) -> Vec<BTreeSet<String>> {
        let outer = std::mem::take(&mut self.scopes);
        self.enter(params(sig));
        outer
    }

    /// Visits an `if`/`while` condition. A `let` condition opens a scope holding its
    /// bindings, which the caller leaves after the body; returns whether it did.
    fn visit_condition(&mut self, cond: &mut Expr) -> bool {
        match cond {
            Expr::Let(condition) => {
                self.visit_expr_mut(&mut condition.expr);
                self.enter([&*condition.pat]);
                true
            }
            other => {
                self.visit_expr_mut(other);
                false
            }
        }
    }

    fn rename_path(&self, path: &mut Path) {
        if path.leading_colon.is_some() {
            return;
        }
        let qualifiers = path.segments.len().saturating_sub(1);
        if !path.segments.iter().take(qualifiers).all(|s| s.ident == "self") {
            return;
        }
        if let Some(last) = path.segments.last_mut() {
            if qualifiers == 0 && self.shadowed(&last.ident.to_string()) {
                return;
            }
            if let Some(new) = self.renames.get(&last.ident.to_string()) {
                let mut new = new.clone();
                new.set_span(last.ident.span());
                last.ident = new;
            }
        }
    }

    /// Macro bodies are opaque tokens, so only the `name(..)` call shape is renamed.
    fn rename_tokens(&self, tokens: TokenStream) -> TokenStream {
        let mut out = Vec::new();
        let mut previous = None;
        let mut tokens = tokens.into_iter().peekable();
        while let Some(tree) = tokens.next() {
            let tree = match tree {
                TokenTree::Ident(ident) => {
                    let called = matches!(
                        tokens.peek(),
                        Some(TokenTree::Group(group)) if group.delimiter() == Delimiter::Parenthesis
                    );
                    let qualified = matches!(previous, Some('.' | ':'));
                    let name = ident.to_string();
                    match self.renames.get(&name) {
                        Some(new) if called && !qualified && !self.shadowed(&name) => {
                            let mut new = new.clone();
                            new.set_span(ident.span());
                            TokenTree::Ident(new)
                        }
                        _ => TokenTree::Ident(ident),
                    }
                }
                TokenTree::Group(group) => {
                    let mut renamed = Group::new(group.delimiter(), self.rename_tokens(group.stream()));
                    renamed.set_span(group.span());
                    TokenTree::Group(renamed)
                }
                other => other,
            };
            previous = match &tree {
                TokenTree::Punct(punct) => Some(punct.as_char()),
                _ => None,
            };
            out.push(tree);
        }
        out.into_iter().collect()
    }
}

impl VisitMut for Renamer {
    fn visit_expr_path_mut(&mut self, expr: &mut ExprPath) {
        if expr.qself.is_none() {
            self.rename_path(&mut expr.path);
        }
        visit_mut::visit_expr_path_mut(self, expr);
    }

    fn visit_macro_mut(&mut self, mac: &mut Macro) {
        mac.tokens = self.rename_tokens(std::mem::take(&mut mac.tokens));
    }

    fn visit_item_mod_mut(&mut self, _: &mut ItemMod) {}

    fn visit_item_fn_mut(&mut self, function: &mut ItemFn) {
        let outer = self.enter_function(&function.sig);
        visit_mut::visit_item_fn_mut(self, function);
        self.scopes = outer;
    }

    fn visit_impl_item_fn_mut(&mut self, function: &mut ImplItemFn) {
        let outer = self.enter_function(&function.sig);
        visit_mut::visit_impl_item_fn_mut(self, function);
        self.scopes = outer;
    }

    fn visit_trait_item_fn_mut(&mut self, function: &mut TraitItemFn) {
        let outer = self.enter_function(&function.sig);
        visit_mut::visit_trait_item_fn_mut(self, function);
        self.scopes = outer;
    }

    fn visit_block_mut(&mut self, block: &mut Block) {
        self.scopes.push(BTreeSet::new());
        visit_mut::visit_block_mut(self, block);
        self.leave();
    }

    /// The initializer still sees the outer meaning of the names the pattern binds.
    fn visit_local_mut(&mut self, local: &mut Local) {
        if let Some(init) = &mut local.init {
            self.visit_local_init_mut(init);
        }
        self.bind(&local.pat);
    }

    fn visit_expr_closure_mut(&mut self, closure: &mut ExprClosure) {
        self.enter(closure.inputs.iter());
        self.visit_expr_mut(&mut closure.body);
        self.leave();
    }

    fn visit_expr_for_loop_mut(&mut self, expr: &mut ExprForLoop) {
        self.visit_expr_mut(&mut expr.expr);
        self.enter([&*expr.pat]);
        self.visit_block_mut(&mut expr.body);
        self.leave();
    }

    fn visit_arm_mut(&mut self, arm: &mut Arm) {
        self.enter([&arm.pat]);
        if let Some((_, guard)) = &mut arm.guard {
            self.visit_expr_mut(guard);
        }
        self.visit_expr_mut(&mut arm.body);
        self.leave();
    }

    fn visit_expr_if_mut(&mut self, expr: &mut ExprIf) {
        let bound = self.visit_condition(&mut expr.cond);
        self.visit_block_mut(&mut expr.then_branch);
        if bound {
            self.leave();
        }
        if let Some((_, otherwise)) = &mut expr.else_branch {
            self.visit_expr_mut(otherwise);
        }
    }

    fn visit_expr_while_mut(&mut self, expr: &mut ExprWhile) {
        let bound = self.visit_condition(&mut expr.cond);
        self.visit_block_mut(&mut expr.body);
        if bound {
            self.leave();
        }
    }
}

/// Drops every function, impl block and import, and derives `Deserialize` for the
/// structs named in `needs_derive`.
pub fn strip_for_client(items: Vec<Item>, needs_derive: &BTreeSet<String>) -> Vec<Item> {
    let mut kept: Vec<Item> = items
        .into_iter()
        .filter(|item| {
            !matches!(
                item,
                Item::Fn(_) | Item::Impl(_) | Item::Use(_) | Item::ExternCrate(_)
            )
        })
        .collect();
    add_derive(&mut kept, needs_derive, &parse_quote!(::serde::Deserialize));
    kept
}

/// Appends `#[derive(trait_)]` to the top-level structs named in `names`.
pub fn add_derive(items: &mut [Item], names: &BTreeSet<String>, trait_: &Path) {
    for item in items {
        if let Item::Struct(record) = item {
            if names.contains(&record.ident.to_string()) {
                record.attrs.push(parse_quote!(#[derive(#trait_)]));
            }
        }
    }
}

/// The names `items` declare at the top level of a module.
fn declared_names(items: &[Item], names: &mut Vec<Ident>) {
    for item in items {
        let ident = match item {
            Item::Const(item) => &item.ident,
            Item::Enum(item) => &item.ident,
            Item::ExternCrate(item) => match &item.rename {
                Some((_, rename)) => rename,
                None => &item.ident,
            },
            Item::Fn(item) => &item.sig.ident,
            Item::Macro(item) => match &item.ident {
                Some(ident) => ident,
                None => continue,
            },
            Item::Mod(item) => &item.ident,
            Item::Static(item) => &item.ident,
            Item::Struct(item) => &item.ident,
            Item::Trait(item) => &item.ident,
            Item::TraitAlias(item) => &item.ident,
            Item::Type(item) => &item.ident,
            Item::Union(item) => &item.ident,
            Item::Use(item) => {
                use_names(&item.tree, names);
                continue;
            }
            _ => continue,
        };
        names.push(ident.clone());
    }
}

fn use_names(tree: &UseTree, names: &mut Vec<Ident>) {
    match tree {
        UseTree::Path(path) => use_names(&path.tree, names),
        UseTree::Name(name) if name.ident != "self" => names.push(name.ident.clone()),
        UseTree::Rename(rename) if rename.rename != "_" => names.push(rename.rename.clone()),
        UseTree::Group(group) => group.items.iter().for_each(|tree| use_names(tree, names)),
        _ => {}
    }
}

/// Fails if a generated top-level name is declared twice or is also declared by a
/// retained item. Generated imports identical to an original import are merged later and
/// do not collide.
pub fn check_collisions(
    retained: &[Item],
    imports: &[ItemUse],
    generated: &[Item],
    generated_imports: &[ItemUse],
) -> Result<(), GenerateError> {
    let mut existing = Vec::new();
    declared_names(retained, &mut existing);
    let fresh_imports: Vec<Item> = generated_imports
        .iter()
        .filter(|import| !imports.contains(import))
        .cloned()
        .map(Item::Use)
        .collect();
    declared_names(&imports.iter().cloned().map(Item::Use).collect::<Vec<_>>(), &mut existing);
    let existing: BTreeSet<String> = existing.iter().map(Ident::to_string).collect();

    let mut fresh = Vec::new();
    declared_names(generated, &mut fresh);
    declared_names(&fresh_imports, &mut fresh);
    let mut seen = BTreeSet::new();
    for name in fresh.iter().map(Ident::to_string) {
        if existing.contains(&name) || !seen.insert(name.clone()) {
            return Err(GenerateError::NameCollision(name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::ToTokens;

    fn items(src: &str) -> Vec<Item> {
        syn::parse_file(src).unwrap().items
    }

    fn render(items: &[Item]) -> String {
        items
            .iter()
            .map(|item| item.to_token_stream().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renames_declarations_and_references() {
        let mut items = items(
            "pub fn greet(name: String) -> String { name }
             fn twice(n: String) -> String { greet(self::greet(n)) }
             fn log() { println!(\"{}\", greet(x.greet())); }
             mod inner { pub fn greet() {} fn call() { greet() } }",
        );
        let names = BTreeSet::from(["greet".to_owned()]);
        prefix_functions(&mut items, &names, "wirestub").unwrap();
        let out = render(&items);
        assert!(out.contains("pub fn wirestub_greet"));
        assert!(out.contains("wirestub_greet (self :: wirestub_greet (n))"));
        assert!(out.contains("wirestub_greet (x . greet ())"));
        assert!(out.contains("mod inner { pub fn greet () { } fn call () { greet () } }"));
    }

    #[test]
    fn locals_shadow_renamed_functions() {
        let mut items = items(
            "pub fn sum(a: i64, b: i64) -> i64 { a + b }
             fn total(xs: &[i64]) -> i64 { let mut sum = 0; for x in xs { sum += x; } sum }
             fn twice(sum: i64) -> i64 { sum + self::sum(sum, sum) }
             fn after() -> i64 { { let sum = 1; } sum(1, 2) }
             fn arms(v: Option<i64>) -> i64 { match v { Some(sum) => sum, None => sum(0, 0) } }
             fn closure() -> i64 { let f = |sum: i64| sum; f(sum(1, 1)) }
             fn guarded(v: Option<i64>) -> i64 { if let Some(sum) = v { sum } else { sum(2, 2) } }",
        );
        let names = BTreeSet::from(["sum".to_owned()]);
        prefix_functions(&mut items, &names, "wirestub").unwrap();
        let rendered: Vec<String> = items
            .iter()
            .map(|item| item.to_token_stream().to_string())
            .collect();
        assert!(rendered[0].starts_with("pub fn wirestub_sum"));
        assert!(!rendered[1].contains("wirestub_sum"));
        assert!(rendered[2].contains("sum + self :: wirestub_sum (sum , sum)"));
        assert!(rendered[3].contains("} wirestub_sum (1 , 2)"));
        assert!(rendered[4].contains("Some (sum) => sum , None => wirestub_sum (0 , 0)"));
        assert!(rendered[5].contains("| sum : i64 | sum ; f (wirestub_sum (1 , 1))"));
        assert!(rendered[6].contains("{ sum } else { wirestub_sum (2 , 2) }"));
    }

    #[test]
    fn renamed_functions_must_not_shadow() {
        let mut items = items("pub fn greet() {} fn wirestub_greet() {}");
        let names = BTreeSet::from(["greet".to_owned()]);
        assert!(matches!(
            prefix_functions(&mut items, &names, "wirestub"),
            Err(GenerateError::NameCollision(name)) if name == "wirestub_greet"
        ));
    }

    #[test]
    fn client_keeps_types_only() {
        let kept = strip_for_client(
            items(
                "use std::fmt; pub struct Point { x: i32 } #[derive(serde::Deserialize)] pub struct Named { n: String }
                 impl Point { fn new() -> Self { todo!() } } pub fn f(p: Point) {} const LIMIT: u8 = 3;",
            ),
            &BTreeSet::from(["Point".to_owned()]),
        );
        let out = render(&kept);
        assert_eq!(kept.len(), 3);
        assert!(out.contains("# [derive (:: serde :: Deserialize)] pub struct Point"));
        assert_eq!(out.matches("Deserialize").count(), 2);
    }

    #[test]
    fn generated_names_must_be_fresh() {
        let retained = items("fn receive() {} struct Runtime;");
        let generated = items("pub fn receive(payload: &[u8]) {}");
        assert!(matches!(
            check_collisions(&retained, &[], &generated, &[]),
            Err(GenerateError::NameCollision(name)) if name == "receive"
        ));

        let imports: Vec<ItemUse> = vec![parse_quote!(use ::wirestub::runtime;)];
        assert!(check_collisions(&items("struct A;"), &imports, &[], &imports).is_ok());

        let other: Vec<ItemUse> = vec![parse_quote!(use my::runtime;)];
        assert!(check_collisions(&[], &other, &[], &imports).is_err());
    }
}

//! Derive macros for the flatsat configuration types.
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{parse_quote, Attribute, Expr, Ident, Lit, LitStr, Meta, MetaNameValue};
use synstructure::decl_derive;

/// Collects the `///` doc comment lines of an item.
fn doc_strings(attrs: &[Attribute]) -> Vec<LitStr> {
    let mut docs = vec![];
    for attr in attrs.iter() {
        if let Ok(Meta::NameValue(MetaNameValue {
            ident,
            lit: Lit::Str(doc_str),
            ..
        })) = attr.parse_meta()
        {
            if ident == "doc" {
                docs.push(doc_str);
            }
        }
    }
    docs
}

/// Derives a default instance from the documentation.
///
/// Each field may contain a `(Default: <expr>)` marker in its doc comment. Fields without a marker
/// use `Default::default()`.
fn derive_doc_default(s: synstructure::Structure) -> TokenStream {
    let variant = match s.variants() {
        [variant] => variant,
        _ => panic!("DocDefault requires a struct"),
    };

    let default_re = regex::Regex::new(r"\(Default: (.*)\)").expect("invalid default regex");

    let body = variant.construct(|field, _| {
        let mut default_value: Expr = parse_quote!(Default::default());
        for doc_str in doc_strings(&field.attrs) {
            if let Some(captures) = default_re.captures(&doc_str.value()) {
                if let Some(default_str) = captures.get(1) {
                    default_value = LitStr::new(default_str.as_str(), doc_str.span())
                        .parse()
                        .expect("error parsing default expression");
                }
            }
        }
        default_value
    });

    s.gen_impl(quote! {
        gen impl Default for @Self {
            fn default() -> Self {
                #body
            }
        }
    })
}

/// Derives a partial update type and a help text for a configuration struct.
///
/// For a struct `Config` this generates `ConfigUpdate`, a deserializable struct with all fields
/// wrapped in `Option`, supporting `new`, `merge` and `apply`, as well as `Config::help()` listing
/// every field with its type and documentation.
fn derive_config_update(s: synstructure::Structure) -> TokenStream {
    let variant = match s.variants() {
        [variant] => variant,
        _ => panic!("ConfigUpdate requires a struct"),
    };

    let ast = s.ast();
    let config_ident = &ast.ident;
    let vis = &ast.vis;
    let update_ident = Ident::new(&format!("{}Update", config_ident), Span::call_site());

    let mut update_fields = vec![];
    let mut merge_stmts = vec![];
    let mut apply_stmts = vec![];
    let mut help = String::new();

    for field in variant.ast().fields.iter() {
        let name = field
            .ident
            .as_ref()
            .expect("ConfigUpdate requires named fields");
        let ty = &field.ty;

        let docs = doc_strings(&field.attrs);
        let update_docs = docs.iter().map(|doc| quote!(#[doc = #doc]));

        update_fields.push(quote! {
            #(#update_docs)*
            #[serde(default)]
            pub #name: Option<#ty>,
        });
        merge_stmts.push(quote! {
            if other.#name.is_some() {
                self.#name = other.#name;
            }
        });
        apply_stmts.push(quote! {
            if let Some(value) = &self.#name {
                config.#name = value.clone();
            }
        });

        help.push_str(&format!("{}: {}\n", name, quote!(#ty)));
        for doc in docs.iter() {
            help.push_str("    ");
            help.push_str(doc.value().trim());
            help.push('\n');
        }
        help.push('\n');
    }

    let update_doc = format!("Partial update of a [`{}`].", config_ident);

    quote! {
        #[doc = #update_doc]
        #[derive(Clone, Debug, Default, ::serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        #vis struct #update_ident {
            #(#update_fields)*
        }

        impl #update_ident {
            /// Create an empty update.
            pub fn new() -> #update_ident {
                #update_ident::default()
            }

            /// Overwrite values of `self` with all values present in `other`.
            pub fn merge(&mut self, other: #update_ident) {
                #(#merge_stmts)*
            }

            /// Overwrite values of `config` with all values present in `self`.
            pub fn apply(&self, config: &mut #config_ident) {
                #(#apply_stmts)*
            }
        }

        impl #config_ident {
            /// Description of all configuration options.
            pub fn help() -> &'static str {
                #help
            }
        }
    }
}

decl_derive!([DocDefault] => derive_doc_default);
decl_derive!([ConfigUpdate] => derive_config_update);

//! Procedural macros for the quarry project.
//!
//! `#[derive(Indexed)]` builds a record's index table at compile time from field
//! attributes:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize, Indexed)]
//! pub struct Episode {
//!     #[index]
//!     pub title: String,
//!     #[index(desc)]
//!     #[serde(rename = "release_date")]
//!     pub released: bson::DateTime,
//! }
//! ```
//!
//! The storage name of each field is its `#[serde(rename = "...")]` value when
//! present, otherwise the lowercased field name.

#[allow(unused_extern_crates)]
extern crate self as quarry_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, LitStr, Result, Token, parenthesized,
    parse_macro_input, spanned::Spanned,
};

#[proc_macro_derive(Indexed, attributes(index))]
pub fn derive_indexed(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_indexed(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

fn expand_indexed(input: DeriveInput) -> Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new(input.span(), "`Indexed` can only be derived for structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(Error::new(input.span(), "`Indexed` needs named fields"));
    };

    let mut entries = Vec::new();

    for field in &fields.named {
        let Some(annotation) = index_annotation(&field.attrs)? else {
            continue;
        };

        let name = field
            .ident
            .as_ref()
            .map(|ident| ident.to_string().trim_start_matches("r#").to_string())
            .unwrap_or_default();

        let rename = match serde_rename(&field.attrs)? {
            Some(rename) => quote!(::core::option::Option::Some(#rename)),
            None => quote!(::core::option::Option::None),
        };

        entries.push(quote! {
            ::quarry::index::FieldIndex::from_annotation(#name, #rename, #annotation)
        });
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = if entries.is_empty() {
        quote!(::std::vec::Vec::new())
    } else {
        quote! {
            [#(#entries),*].into_iter().flatten().collect()
        }
    };

    Ok(quote! {
        impl #impl_generics ::quarry::index::Indexed for #ident #ty_generics #where_clause {
            fn declared_indexes() -> ::std::vec::Vec<::quarry::index::FieldIndex> {
                #body
            }
        }
    })
}

/// Reads `#[index]` / `#[index(desc)]` into the `index[,direction]` annotation form.
fn index_annotation(attrs: &[Attribute]) -> Result<Option<String>> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("index")) else {
        return Ok(None);
    };

    if matches!(attr.meta, syn::Meta::Path(_)) {
        return Ok(Some("index".to_string()));
    }

    let mut direction = None;
    attr.parse_nested_meta(|meta| {
        for token in ["asc", "desc", "text"] {
            if meta.path.is_ident(token) {
                direction = Some(token);
                return Ok(());
            }
        }

        Err(meta.error("expected `asc`, `desc` or `text`"))
    })?;

    Ok(Some(match direction {
        Some(direction) => format!("index,{direction}"),
        None => "index".to_string(),
    }))
}

/// Finds `rename = "..."` inside `#[serde(...)]`, skipping every other serde option.
fn serde_rename(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut rename = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                rename = Some(meta.value()?.parse::<LitStr>()?);
            } else if meta.input.peek(Token![=]) {
                meta.value()?.parse::<syn::Expr>()?;
            } else if meta.input.peek(syn::token::Paren) {
                let content;
                parenthesized!(content in meta.input);
                content.parse::<TokenStream2>()?;
            }

            Ok(())
        })?;
    }

    Ok(rename)
}

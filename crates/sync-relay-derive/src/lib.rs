// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `#[derive(Row)]` — the compile-time stand-in for the struct-tag
//! reflection `sync_def.BuildFieldConfig[T]` relies on in the source this
//! crate is modeled on. Reads `#[row(table = "...")]` on the struct and
//! `#[row(primary = N)]` / `#[row(cache = N)]` / `#[row(seq)]` /
//! `#[row(score)]` on fields, and emits one `RowMeta` impl. A struct with no
//! `#[row(cache = N)]` fields gets its cache key fields defaulted to its
//! primary fields, in declared order.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Expr, ExprLit, Fields, Lit, Meta, MetaNameValue,
};

struct FieldAttrs {
    primary: Option<u32>,
    cache: Option<u32>,
    is_seq: bool,
    is_score: bool,
}

fn parse_field_attrs(attrs: &[syn::Attribute]) -> Result<FieldAttrs, syn::Error> {
    let mut out = FieldAttrs { primary: None, cache: None, is_seq: false, is_score: false };

    for attr in attrs {
        if !attr.path().is_ident("row") {
            continue;
        }
        let Meta::List(list) = &attr.meta else {
            return Err(syn::Error::new_spanned(attr, "expected #[row(...)]"));
        };
        let metas = list
            .parse_args_with(syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated)?;

        for meta in metas {
            match meta {
                Meta::NameValue(MetaNameValue { path, value, .. }) if path.is_ident("primary") => {
                    out.primary = Some(parse_index(&value)?);
                }
                Meta::NameValue(MetaNameValue { path, value, .. }) if path.is_ident("cache") => {
                    out.cache = Some(parse_index(&value)?);
                }
                Meta::Path(p) if p.is_ident("seq") => out.is_seq = true,
                Meta::Path(p) if p.is_ident("score") => out.is_score = true,
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "unsupported key in #[row(...)] (expected primary, cache, seq, score)",
                    ));
                }
            }
        }
    }

    Ok(out)
}

fn parse_index(value: &Expr) -> Result<u32, syn::Error> {
    match value {
        Expr::Lit(ExprLit { lit: Lit::Int(li), .. }) => li.base10_parse::<u32>(),
        other => Err(syn::Error::new_spanned(other, "expected an integer literal")),
    }
}

fn table_name(attrs: &[syn::Attribute], fallback: &str) -> Result<String, syn::Error> {
    for attr in attrs {
        if !attr.path().is_ident("row") {
            continue;
        }
        let Meta::List(list) = &attr.meta else {
            continue;
        };
        let metas = list
            .parse_args_with(syn::punctuated::Punctuated::<Meta, syn::Token![,]>::parse_terminated)?;
        for meta in metas {
            if let Meta::NameValue(MetaNameValue { path, value, .. }) = meta {
                if path.is_ident("table") {
                    if let Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) = value {
                        return Ok(s.value());
                    }
                    return Err(syn::Error::new_spanned(value, "expected table = \"...\""));
                }
            }
        }
    }
    Ok(fallback.to_string())
}

#[proc_macro_derive(Row, attributes(row))]
pub fn derive_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Struct(data) = &input.data else {
        return syn::Error::new_spanned(name, "Row can only be derived for structs")
            .to_compile_error()
            .into();
    };
    let Fields::Named(fields) = &data.fields else {
        return syn::Error::new_spanned(name, "Row requires named fields")
            .to_compile_error()
            .into();
    };

    let table = match table_name(&input.attrs, &name.to_string()) {
        Ok(t) => t,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut primaries: Vec<(u32, syn::Ident)> = Vec::new();
    let mut caches: Vec<(u32, syn::Ident)> = Vec::new();
    let mut seq_field: Option<syn::Ident> = None;
    let mut score_field: Option<syn::Ident> = None;
    let mut all_idents: Vec<syn::Ident> = Vec::new();

    for f in &fields.named {
        let attrs = match parse_field_attrs(&f.attrs) {
            Ok(a) => a,
            Err(e) => return e.to_compile_error().into(),
        };
        let ident = f.ident.clone().expect("named field");
        all_idents.push(ident.clone());

        if let Some(idx) = attrs.primary {
            primaries.push((idx, ident.clone()));
        }
        if let Some(idx) = attrs.cache {
            caches.push((idx, ident.clone()));
        }
        if attrs.is_seq {
            seq_field = Some(ident.clone());
        }
        if attrs.is_score {
            score_field = Some(ident);
        }
    }

    primaries.sort_by_key(|(idx, _)| *idx);
    if caches.is_empty() {
        caches = primaries.clone();
    } else {
        caches.sort_by_key(|(idx, _)| *idx);
    }

    let primary_names: Vec<String> = primaries.iter().map(|(_, id)| id.to_string()).collect();
    let cache_names: Vec<String> = caches.iter().map(|(_, id)| id.to_string()).collect();
    let all_names: Vec<String> = all_idents.iter().map(|id| id.to_string()).collect();
    let seq_name = seq_field.as_ref().map(|id| id.to_string());
    let score_name = score_field.as_ref().map(|id| id.to_string());

    let primary_idents: Vec<&syn::Ident> = primaries.iter().map(|(_, id)| id).collect();
    let cache_idents: Vec<&syn::Ident> = caches.iter().map(|(_, id)| id).collect();

    let seq_value_expr = match &seq_field {
        Some(id) => quote! { Some(self.#id as i64) },
        None => quote! { None },
    };
    let score_value_expr = match &score_field {
        Some(id) => quote! { Some(self.#id as f64) },
        None => quote! { None },
    };
    let seq_name_tokens = match &seq_name {
        Some(s) => quote! { Some(#s) },
        None => quote! { None },
    };
    let score_name_tokens = match &score_name {
        Some(s) => quote! { Some(#s) },
        None => quote! { None },
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics sync_relay::sync::field_meta::RowMeta for #name #ty_generics #where_clause {
            fn row_meta() -> &'static sync_relay::sync::field_meta::RowMetaInfo {
                static META: ::std::sync::OnceLock<sync_relay::sync::field_meta::RowMetaInfo> =
                    ::std::sync::OnceLock::new();
                META.get_or_init(|| sync_relay::sync::field_meta::RowMetaInfo {
                    table: #table,
                    primary_names: &[#(#primary_names),*],
                    cache_names: &[#(#cache_names),*],
                    all_names: &[#(#all_names),*],
                    seq_name: #seq_name_tokens,
                    score_name: #score_name_tokens,
                })
            }

            fn primary_values(&self) -> Vec<String> {
                vec![#(self.#primary_idents.to_string()),*]
            }

            fn cache_values(&self) -> Vec<String> {
                vec![#(self.#cache_idents.to_string()),*]
            }

            fn all_values(&self) -> Vec<(&'static str, ::serde_json::Value)> {
                vec![#((#all_names, ::serde_json::json!(self.#all_idents))),*]
            }

            fn seq_value(&self) -> Option<i64> {
                #seq_value_expr
            }

            fn score_value(&self) -> Option<f64> {
                #score_value_expr
            }
        }
    };

    expanded.into()
}

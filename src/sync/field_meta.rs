// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Field metadata (C9/C10/C11's shared dependency): the compile-time
//! replacement for `sync_def.BuildFieldConfig[T]`'s struct-tag reflection.
//! `#[derive(Row)]` (in `sync-relay-derive`) implements this trait; nothing
//! in this module inspects a type at runtime.

use serde_json::Value;

/// Static, per-type metadata computed once from `#[row(...)]` attributes.
pub struct RowMetaInfo {
    pub table: &'static str,
    pub primary_names: &'static [&'static str],
    pub cache_names: &'static [&'static str],
    pub all_names: &'static [&'static str],
    pub seq_name: Option<&'static str>,
    pub score_name: Option<&'static str>,
}

pub trait RowMeta {
    fn row_meta() -> &'static RowMetaInfo
    where
        Self: Sized;

    /// Stringified primary-key field values, in declared `#[row(primary = N)]` order.
    fn primary_values(&self) -> Vec<String>;

    /// Stringified cache-key field values, in declared `#[row(cache = N)]` order.
    fn cache_values(&self) -> Vec<String>;

    /// Every named field as `(column_name, json_value)`, in declaration order.
    fn all_values(&self) -> Vec<(&'static str, Value)>;

    fn seq_value(&self) -> Option<i64>;

    fn score_value(&self) -> Option<f64>;
}

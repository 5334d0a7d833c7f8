// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cache-to-database synchronizer (C8–C12): distributed lease, cache/store
//! handlers, a dirty-key marker and the synchronizer tying them together
//! into a read-through/write-behind layer per row type.

pub mod cache;
pub mod error;
pub mod field_meta;
pub mod lease;
pub mod marker;
pub mod store;
pub mod synchronizer;

pub use cache::CacheHandler;
pub use error::SyncError;
pub use field_meta::{RowMeta, RowMetaInfo};
pub use lease::{Lease, LeaseConfig, LeaseManager};
pub use marker::Marker;
pub use store::StoreHandler;
pub use synchronizer::{FlushConfig, Synchronizer};

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

// Lets `#[derive(Row)]` emit `sync_relay::...` paths that resolve both from
// this crate's own modules and from any external crate that depends on it.
extern crate self as sync_relay;

pub use sync_relay_derive::Row;

pub mod cfg;
pub mod client;
pub mod codec;
pub mod net;
pub mod router;
pub mod service;
pub mod session;
pub mod sync;
pub mod transport;

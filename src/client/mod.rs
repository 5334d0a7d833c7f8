// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RPC client: connects to a `Service`, sends `ask`/`tell` requests and
//! receives pushes, completing asks by `req_id` off a dedicated read loop.

pub mod client;
pub mod common;

pub use client::{Client, ClientConfig, PushHandler};

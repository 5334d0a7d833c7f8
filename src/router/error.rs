// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("route {route_id} already registered for {kind}")]
    DuplicateRoute { kind: &'static str, route_id: u32 },

    #[error("failed to decode request body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode response body: {0}")]
    Encode(#[source] serde_json::Error),
}

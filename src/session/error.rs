// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found for connection {0}")]
    NotFound(u32),

    #[error("io error: {0}")]
    Io(#[from] TransportError),
}

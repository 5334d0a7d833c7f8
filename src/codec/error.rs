// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("buffer too short: need at least {need} bytes, got {got}")]
    TooShort { need: usize, got: usize },

    #[error("heartbeat packet must be exactly 1 byte, got {0}")]
    BadHeartbeatLen(usize),

    #[error("empty buffer")]
    Empty,
}

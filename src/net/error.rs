// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

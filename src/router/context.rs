// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use crate::session::Session;

/// Passed to every handler invocation; borrowed for the call's duration.
pub struct Context {
    pub req_id: u32,
    pub session: Arc<Session>,
}

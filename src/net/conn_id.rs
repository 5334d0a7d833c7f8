// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-global connection id allocator. A connection id counter is
//! inherently process-wide identity rather than service state, so it is the
//! one deliberate global here (mirrors `conn_id.NextId()`).

use std::sync::atomic::{AtomicU32, Ordering};

static GLOBAL_ID: AtomicU32 = AtomicU32::new(0);

pub fn next_id() -> u32 {
    GLOBAL_ID.fetch_add(1, Ordering::Relaxed) + 1
}

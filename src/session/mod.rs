// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session manager (C4): per-connection attribute bag with keepalive,
//! expiry sweep, and bind/end lifecycle callbacks.

pub mod error;
pub mod manager;
pub mod session;

pub use error::SessionError;
pub use manager::{Manager, ManagerConfig, SessionLifecycle};
pub use session::Session;

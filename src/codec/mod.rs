// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire packet codec (C1): the two sibling frames that cross the transport,
//! and heartbeat detection. Integers are big-endian; bodies are borrowed
//! slices of the input buffer via [`bytes::Bytes`], never copied.

pub mod c2s;
pub mod error;
pub mod s2c;

pub use c2s::C2SFrame;
pub use error::CodecError;
pub use s2c::S2CFrame;

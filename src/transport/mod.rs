// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Framed transport adapters (C2): turn a byte stream or a message
//! transport into a sequence of bounded, length-delimited packets.

pub mod error;
pub mod message_framer;
pub mod stream_framer;

pub use error::TransportError;
pub use stream_framer::MAX_PACKET_LEN;

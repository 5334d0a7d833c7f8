// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Pass-through framing for message transports (WebSocket): the transport
//! already delimits messages, so only the [`MAX_PACKET_LEN`] ceiling is
//! enforced against the decoded frame.

use super::{error::TransportError, stream_framer::MAX_PACKET_LEN};

pub fn validate_len(len: usize) -> Result<(), TransportError> {
    if len == 0 || len > MAX_PACKET_LEN {
        return Err(TransportError::BadLength(len));
    }
    Ok(())
}

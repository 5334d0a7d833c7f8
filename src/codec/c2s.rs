// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Client→server wire frame: one header byte (`HEARTBEAT` at bit 1,
//! `ONE_WAY` at bit 2) followed by either nothing (heartbeat) or a
//! `service_id`/`route_id`/`req_id` tail and an opaque body.

use bytes::Bytes;

use super::error::CodecError;

const HEARTBEAT_BIT: u8 = 1 << 1;
const ONE_WAY_BIT: u8 = 1 << 2;
const TAIL_LEN: usize = 12;

/// A decoded client→server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum C2SFrame {
    Heartbeat,
    Request {
        service_id: u32,
        route_id: u32,
        req_id: u32,
        one_way: bool,
        body: Bytes,
    },
}

pub fn encode_heartbeat() -> Bytes {
    Bytes::from_static(&[HEARTBEAT_BIT])
}

pub fn encode_request(
    service_id: u32,
    route_id: u32,
    req_id: u32,
    one_way: bool,
    body: &[u8],
) -> Bytes {
    let head = if one_way { ONE_WAY_BIT } else { 0 };
    let mut out = Vec::with_capacity(1 + TAIL_LEN + body.len());
    out.push(head);
    out.extend_from_slice(&service_id.to_be_bytes());
    out.extend_from_slice(&route_id.to_be_bytes());
    out.extend_from_slice(&req_id.to_be_bytes());
    out.extend_from_slice(body);
    Bytes::from(out)
}

pub fn decode(buf: Bytes) -> Result<C2SFrame, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::Empty);
    }
    let head = buf[0];

    if head & HEARTBEAT_BIT != 0 {
        if buf.len() != 1 {
            return Err(CodecError::BadHeartbeatLen(buf.len()));
        }
        return Ok(C2SFrame::Heartbeat);
    }

    if buf.len() < 1 + TAIL_LEN {
        return Err(CodecError::TooShort { need: 1 + TAIL_LEN, got: buf.len() });
    }

    let service_id = u32::from_be_bytes(buf[1..5].try_into().expect("4-byte slice"));
    let route_id = u32::from_be_bytes(buf[5..9].try_into().expect("4-byte slice"));
    let req_id = u32::from_be_bytes(buf[9..13].try_into().expect("4-byte slice"));
    let one_way = head & ONE_WAY_BIT != 0;
    let body = buf.slice(13..);

    Ok(C2SFrame::Request { service_id, route_id, req_id, one_way, body })
}

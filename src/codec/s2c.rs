// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Server→client wire frame: one header byte (`IS_PUSH` at bit 1) followed
//! by either a `req_id` tail (response) or a `service_id`/`route_id` tail
//! (server-initiated push), then an opaque body.

use bytes::Bytes;

use super::error::CodecError;

const IS_PUSH_BIT: u8 = 1 << 1;

/// A decoded server→client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S2CFrame {
    Response { req_id: u32, body: Bytes },
    Push { service_id: u32, route_id: u32, body: Bytes },
}

pub fn encode_response(req_id: u32, body: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(5 + body.len());
    out.push(0);
    out.extend_from_slice(&req_id.to_be_bytes());
    out.extend_from_slice(body);
    Bytes::from(out)
}

pub fn encode_push(service_id: u32, route_id: u32, body: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(9 + body.len());
    out.push(IS_PUSH_BIT);
    out.extend_from_slice(&service_id.to_be_bytes());
    out.extend_from_slice(&route_id.to_be_bytes());
    out.extend_from_slice(body);
    Bytes::from(out)
}

pub fn decode(buf: Bytes) -> Result<S2CFrame, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::Empty);
    }
    let head = buf[0];

    if head & IS_PUSH_BIT != 0 {
        if buf.len() < 9 {
            return Err(CodecError::TooShort { need: 9, got: buf.len() });
        }
        let service_id = u32::from_be_bytes(buf[1..5].try_into().expect("4-byte slice"));
        let route_id = u32::from_be_bytes(buf[5..9].try_into().expect("4-byte slice"));
        return Ok(S2CFrame::Push { service_id, route_id, body: buf.slice(9..) });
    }

    if buf.len() < 5 {
        return Err(CodecError::TooShort { need: 5, got: buf.len() });
    }
    let req_id = u32::from_be_bytes(buf[1..5].try_into().expect("4-byte slice"));
    Ok(S2CFrame::Response { req_id, body: buf.slice(5..) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_round_trips() {
        let body = b"{\"msg\":\"hi\"}";
        let wire = encode_response(7, body);
        assert_eq!(
            decode(wire).unwrap(),
            S2CFrame::Response { req_id: 7, body: Bytes::from_static(body) }
        );
    }

    #[test]
    fn push_round_trips() {
        let body = b"evt";
        let wire = encode_push(0, 42, body);
        assert_eq!(
            decode(wire).unwrap(),
            S2CFrame::Push { service_id: 0, route_id: 42, body: Bytes::from_static(body) }
        );
    }

    #[test]
    fn truncated_push_is_rejected() {
        let wire = Bytes::from_static(&[IS_PUSH_BIT, 0, 0, 0, 1]);
        assert!(matches!(decode(wire), Err(CodecError::TooShort { .. })));
    }
}

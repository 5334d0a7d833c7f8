// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Length-prefixed framing for stream transports (TCP, reliable UDP): each
//! packet is preceded by a 4-byte big-endian length. Both directions enforce
//! [`MAX_PACKET_LEN`]; writes loop over chunks of that size so callers never
//! have to special-case payloads at the ceiling.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::TransportError;

pub const MAX_PACKET_LEN: usize = 4096;

pub async fn read_frame<R>(reader: &mut R) -> Result<Bytes, TransportError>
where R: AsyncRead + Unpin {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_PACKET_LEN {
        return Err(TransportError::BadLength(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Bytes::from(body))
}

pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), TransportError>
where W: AsyncWrite + Unpin {
    if body.is_empty() || body.len() > MAX_PACKET_LEN {
        return Err(TransportError::BadLength(body.len()));
    }

    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    for chunk in body.chunks(MAX_PACKET_LEN) {
        writer.write_all(chunk).await?;
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[tokio::test]
    async fn frame_round_trips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();

        let mut cursor = Cursor::new(buf);
        let body = read_frame(&mut cursor).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn oversized_write_is_rejected() {
        let body = vec![0u8; MAX_PACKET_LEN + 1];
        let mut buf = Vec::new();
        assert!(matches!(
            write_frame(&mut buf, &body).await,
            Err(TransportError::BadLength(_))
        ));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected_on_read() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((MAX_PACKET_LEN + 1) as u32).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        assert!(matches!(read_frame(&mut cursor).await, Err(TransportError::BadLength(_))));
    }

    #[tokio::test]
    async fn zero_length_prefix_is_rejected_on_read() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_be_bytes());
        let mut cursor = Cursor::new(buf);
        assert!(matches!(read_frame(&mut cursor).await, Err(TransportError::BadLength(0))));
    }
}

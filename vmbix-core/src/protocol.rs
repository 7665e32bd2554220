//! Zabbix agent wire protocol.
//!
//! # Request
//!
//! Either a bare newline-terminated line, or a framed packet:
//!
//! ```text
//! ┌──────────┬───────────┬──────────────┬──────────────┬─────────────────┐
//! │ "ZBXD"   │ Flags (1) │ Length (4)   │ Reserved (4) │ Payload         │
//! │          │ 0x01      │ little-endian│ zero         │ (Length bytes)  │
//! └──────────┴───────────┴──────────────┴──────────────┴─────────────────┘
//! ```
//!
//! # Reply
//!
//! Always framed as above with flags `0x01`.

use crate::error::{Result, VmbixError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Packet signature.
pub const HEADER: &[u8; 4] = b"ZBXD";

/// Protocol flag: standard (uncompressed) packet.
pub const FLAG_PROTOCOL: u8 = 0x01;

/// Protocol flag: zlib-compressed payload.
pub const FLAG_COMPRESSED: u8 = 0x02;

/// Largest request accepted, framed or not.
pub const MAX_REQUEST_LEN: usize = 64 * 1024;

/// Read one request. Returns `None` if the peer closed without sending.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    // Stop at the first byte that leaves the header prefix, so a short bare
    // line is answered without waiting for more input.
    let mut head = Vec::with_capacity(HEADER.len());
    while head.len() < HEADER.len() {
        match reader.read_u8().await {
            Ok(byte) => head.push(byte),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        if !HEADER.starts_with(&head) {
            break;
        }
    }
    if head.is_empty() {
        return Ok(None);
    }

    if head.as_slice() == HEADER {
        let flags = reader.read_u8().await?;
        if flags & FLAG_COMPRESSED != 0 {
            return Err(VmbixError::Protocol { reason: "compressed requests are not supported".to_string() });
        }
        let len = reader.read_u32_le().await? as usize;
        let _reserved = reader.read_u32_le().await?;
        if len > MAX_REQUEST_LEN {
            return Err(VmbixError::Protocol {
                reason: format!("request of {} bytes exceeds {} bytes", len, MAX_REQUEST_LEN),
            });
        }
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        return Ok(Some(clean(&body)));
    }

    let mut line = head;
    if !line.contains(&b'\n') {
        let limit = (MAX_REQUEST_LEN - line.len()) as u64;
        (&mut *reader).take(limit).read_until(b'\n', &mut line).await?;
    }
    Ok(Some(clean(&line)))
}

/// First line of the payload, without surrounding whitespace or NULs.
fn clean(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.lines()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

/// Frame a reply payload.
pub fn encode_reply(payload: &str) -> Vec<u8> {
    let body = payload.as_bytes();
    let mut packet = Vec::with_capacity(13 + body.len());
    packet.extend_from_slice(HEADER);
    packet.push(FLAG_PROTOCOL);
    packet.extend_from_slice(&(body.len() as u32).to_le_bytes());
    packet.extend_from_slice(&[0u8; 4]);
    packet.extend_from_slice(body);
    packet
}

/// Write a framed reply and flush.
pub async fn write_reply<W>(writer: &mut W, payload: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_reply(payload)).await?;
    writer.flush().await?;
    Ok(())
}

/// Decode a framed reply (used by clients and tests).
pub fn decode_reply(packet: &[u8]) -> Result<String> {
    if packet.len() < 13 || &packet[..4] != HEADER {
        return Err(VmbixError::Protocol { reason: "missing ZBXD header".to_string() });
    }
    let len = u32::from_le_bytes([packet[5], packet[6], packet[7], packet[8]]) as usize;
    let body = packet.get(13..13 + len).ok_or_else(|| VmbixError::Protocol {
        reason: format!("truncated reply: expected {} bytes", len),
    })?;
    Ok(String::from_utf8_lossy(body).into_owned())
}

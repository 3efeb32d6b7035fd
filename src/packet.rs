//! Head/tail packet sniffer over hex-formatted receive lines.
//!
//! A line whose first byte is the head sentinel and whose last byte is the
//! tail sentinel is treated as a packet; its payload is shown as big-endian
//! 16-bit words. There is no resynchronization, length field or checksum.

use crate::error::HexError;
use crate::hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketExtractor {
    head: u8,
    tail: u8,
}

impl PacketExtractor {
    pub fn new(head: u8, tail: u8) -> Self {
        Self { head, tail }
    }

    /// Builds an extractor from sentinels typed as hex, e.g. `"5a"`.
    pub fn parse(head: &str, tail: &str) -> Result<Self, HexError> {
        Ok(Self::new(hex::decode_byte(head)?, hex::decode_byte(tail)?))
    }

    /// Returns the decoded payload when `line` is a framed packet.
    pub fn extract(&self, line: &str) -> Option<String> {
        let bytes = hex::decode(line).ok()?;
        match bytes.as_slice() {
            [first, payload @ .., last] if *first == self.head && *last == self.tail => {
                Some(deep_analysis(payload))
            }
            _ => None,
        }
    }
}

pub fn deep_analysis(payload: &[u8]) -> String {
    if payload.is_empty() {
        return "<no data>".to_string();
    }
    if payload.len() % 2 != 0 {
        return "<odd data>".to_string();
    }
    let words = payload
        .chunks_exact(2)
        .map(|w| u16::from_be_bytes([w[0], w[1]]).to_string())
        .collect::<Vec<_>>();
    format!("[{}]", words.join(", "))
}

//! Conversions between raw serial bytes and the text shown or typed in the
//! terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, HexError};

pub const CRLF: &str = "\r\n";

/// How bytes are rendered on receive and how typed text is interpreted on send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Hex,
    Ascii,
}

impl DataFormat {
    pub const ALL: [DataFormat; 2] = [DataFormat::Hex, DataFormat::Ascii];
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Hex => write!(f, "HEX"),
            DataFormat::Ascii => write!(f, "ASCII"),
        }
    }
}

/// Renders bytes as space separated lowercase octets, `5a 5a 02`.
pub fn encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses whitespace separated hex tokens. A token may hold several bytes
/// (`5a5a`) but must have an even number of digits.
pub fn decode(s: &str) -> Result<Vec<u8>, HexError> {
    let mut out = Vec::new();
    for token in s.split_whitespace() {
        if !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HexError::InvalidDigit {
                token: token.to_string(),
            });
        }
        if token.len() % 2 != 0 {
            return Err(HexError::OddLength {
                token: token.to_string(),
            });
        }
        for i in (0..token.len()).step_by(2) {
            // all-ascii token, slicing on byte offsets is safe
            let byte = u8::from_str_radix(&token[i..i + 2], 16).map_err(|_| HexError::InvalidDigit {
                token: token.to_string(),
            })?;
            out.push(byte);
        }
    }
    Ok(out)
}

/// Parses exactly one byte, as entered for packet head/tail sentinels.
pub fn decode_byte(s: &str) -> Result<u8, HexError> {
    match decode(s)?.as_slice() {
        [b] => Ok(*b),
        _ => Err(HexError::NotAByte(s.trim().to_string())),
    }
}

pub fn decode_utf8(bytes: &[u8]) -> Result<String, DecodeError> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

/// Turns one received line into display text.
pub fn format_received(
    bytes: &[u8],
    format: DataFormat,
    line_ending: bool,
) -> Result<String, DecodeError> {
    match format {
        DataFormat::Ascii => decode_utf8(bytes),
        DataFormat::Hex => {
            let mut s = encode(bytes);
            if line_ending {
                s.push_str(CRLF);
            }
            Ok(s)
        }
    }
}

/// Turns typed text into the bytes put on the wire.
pub fn encode_outgoing(text: &str, format: DataFormat, line_ending: bool) -> Result<Vec<u8>, HexError> {
    let mut bytes = match format {
        DataFormat::Hex => decode(text)?,
        DataFormat::Ascii => text.as_bytes().to_vec(),
    };
    if line_ending {
        bytes.extend_from_slice(CRLF.as_bytes());
    }
    Ok(bytes)
}

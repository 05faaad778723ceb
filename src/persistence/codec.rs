//! Save transport encoding
//!
//! Records are stored as text. Uncompressed saves are plain JSON; compressed
//! saves are an LZ4 block (little-endian size prefix) wrapped in base64.
//! Decoding never needs to be told which one it is looking at.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::consts::MAX_DECOMPRESSED_BYTES;

/// Outcome of [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Transport was already JSON.
    Plain(Value),
    /// Transport decompressed into JSON.
    Compressed(Value),
    /// Neither interpretation parsed. Carries the original transport.
    Unrecoverable(String),
}

impl Decoded {
    /// Parsed document, `None` if unrecoverable.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Decoded::Plain(v) | Decoded::Compressed(v) => Some(v),
            Decoded::Unrecoverable(_) => None,
        }
    }

    pub fn was_compressed(&self) -> bool {
        matches!(self, Decoded::Compressed(_))
    }
}

/// Encode `text` for storage, compressing when asked.
pub fn encode(text: &str, compress: bool) -> String {
    if !compress {
        return text.to_string();
    }
    let packed = lz4_flex::compress_prepend_size(text.as_bytes());
    STANDARD.encode(packed)
}

/// Decode a stored transport: plain JSON first, then the compressed form.
pub fn decode(transport: &str) -> Decoded {
    if let Ok(value) = serde_json::from_str::<Value>(transport) {
        return Decoded::Plain(value);
    }
    match decompress(transport).and_then(|text| serde_json::from_str::<Value>(&text).ok()) {
        Some(value) => Decoded::Compressed(value),
        None => Decoded::Unrecoverable(transport.to_string()),
    }
}

/// Undo [`encode`] with `compress = true`. `None` if the transport is not a
/// well-formed compressed payload.
pub fn decompress(transport: &str) -> Option<String> {
    let bytes = STANDARD.decode(transport.trim()).ok()?;
    let (size, block) = bytes.split_first_chunk::<4>()?;
    let size = u32::from_le_bytes(*size) as usize;
    if size > MAX_DECOMPRESSED_BYTES {
        log::warn!("Compressed save claims {size} bytes, refusing to inflate");
        return None;
    }
    let raw = lz4_flex::decompress(block, size).ok()?;
    String::from_utf8(raw).ok()
}

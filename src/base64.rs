//! `!!binary` payloads: base64 text that may be wrapped over several lines.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Error;

/// Decode a YAML `!!binary` scalar; ASCII whitespace inside the text is ignored.
pub(crate) fn decode_base64_yaml(s: &str) -> Result<Vec<u8>, Error> {
    let cleaned: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    STANDARD
        .decode(&cleaned)
        .map_err(|e| Error::msg(format!("invalid !!binary base64: {e}")))
}

pub(crate) fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

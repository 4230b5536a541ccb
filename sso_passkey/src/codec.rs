use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use thiserror::Error;

/// Errors raised while converting between base64url text and raw bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The text could not be decoded as base64url
    #[error("Invalid base64url: {0}")]
    Decode(String),

    /// A binary field was missing or could not be encoded
    #[error("Invalid binary field: {0}")]
    Encode(String),
}

/// Decodes base64url text into bytes.
///
/// Standard base64 input is tolerated: `+` and `/` are mapped onto the URL-safe
/// alphabet, and padded input is accepted when it is a whole number of quads
/// ending in at most two `=`. Unpadded text is right-padded before decoding.
pub fn base64url_decode(input: &str) -> Result<Vec<u8>, CodecError> {
    let normalized: String = input
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let data_len = normalized.trim_end_matches('=').len();
    let padding = normalized.len() - data_len;
    if padding > 0 && (padding > 2 || normalized.len() % 4 != 0 || data_len % 4 == 0) {
        return Err(CodecError::Decode(format!(
            "{padding} trailing '=' do not pad a {data_len}-character input"
        )));
    }

    if data_len % 4 == 1 {
        return Err(CodecError::Decode(format!(
            "length {data_len} cannot be produced by an encoder"
        )));
    }

    let mut padded = normalized;
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| CodecError::Decode(e.to_string()))
}

/// Encodes bytes as unpadded base64url text.
pub fn base64url_encode(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

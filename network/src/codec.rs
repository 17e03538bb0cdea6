//! Envelope codec: bincode with a hard size limit.

use bincode::Options;

use crate::{Envelope, NetworkError};

/// Maximum encoded envelope size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_MESSAGE_SIZE as u64)
}

/// Encode an envelope for transmission.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, NetworkError> {
    options().serialize(envelope).map_err(|e| match *e {
        bincode::ErrorKind::SizeLimit => NetworkError::TooLarge {
            size: MAX_MESSAGE_SIZE + 1,
            max: MAX_MESSAGE_SIZE,
        },
        other => NetworkError::Malformed(other.to_string()),
    })
}

/// Decode an envelope from raw bytes. Trailing bytes are rejected.
pub fn decode(data: &[u8]) -> Result<Envelope, NetworkError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(NetworkError::TooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(options().deserialize(data)?)
}

//! Per-connection body transforms applied after framing.
//!
//! The engine treats a cipher as an opaque capability: it hands over the next
//! sequence number and the connection key and stores whatever comes back. The
//! bundled implementations are framing aids, not transport encryption.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

/// Bodies at or above this many bytes are compressed by [`GzipCipher`].
pub const DEFAULT_GZIP_THRESHOLD: usize = 1024;

/// Upper bound on inflated bodies produced by [`GzipCipher`].
pub const DEFAULT_INFLATE_LIMIT: usize = 16 * 1024 * 1024;

const MARKER_RAW: u8 = 0x00;
const MARKER_GZIP: u8 = 0x01;

/// Failures raised while sealing or opening a body.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The body carried a marker this cipher does not understand.
    #[error("unknown body marker {marker:#04x}")]
    UnknownMarker {
        /// Leading byte of the sealed body.
        marker: u8,
    },
    /// Compressing the body failed.
    #[error("failed to compress body: {source}")]
    Compress {
        /// Underlying encoder error.
        #[source]
        source: io::Error,
    },
    /// Inflating the body failed.
    #[error("failed to inflate body: {source}")]
    Inflate {
        /// Underlying decoder error.
        #[source]
        source: io::Error,
    },
    /// The inflated body exceeded the configured limit.
    #[error("inflated body exceeds {limit} bytes")]
    InflatedTooLarge {
        /// Limit that was exceeded.
        limit: usize,
    },
}

/// Seals outbound bodies and opens inbound ones.
///
/// `sequence` advances once per call on each direction of a connection and
/// `key` is the connection's current key for that direction. Empty input must
/// map to empty output.
#[cfg_attr(test, mockall::automock)]
pub trait Cipher: Send + Sync {
    /// Produces the wire form of `plain`.
    fn encrypt(&self, sequence: u64, key: u32, plain: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Recovers the plaintext from `sealed`.
    fn decrypt(&self, sequence: u64, key: u32, sealed: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Pass-through cipher.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainCipher;

impl Cipher for PlainCipher {
    fn encrypt(&self, _sequence: u64, _key: u32, plain: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(plain.to_vec())
    }

    fn decrypt(&self, _sequence: u64, _key: u32, sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(sealed.to_vec())
    }
}

/// Compresses bodies above a size threshold.
///
/// Sealed bodies start with a marker byte: `0x00` for raw bytes, `0x01` for a
/// gzip stream. Compressed output is only kept when it is smaller.
#[derive(Debug, Clone, Copy)]
pub struct GzipCipher {
    threshold: usize,
    inflate_limit: usize,
}

impl Default for GzipCipher {
    fn default() -> Self {
        Self::new(DEFAULT_GZIP_THRESHOLD)
    }
}

impl GzipCipher {
    /// Builds a cipher compressing bodies of at least `threshold` bytes.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            inflate_limit: DEFAULT_INFLATE_LIMIT,
        }
    }

    /// Caps the size of inflated bodies.
    #[must_use]
    pub fn with_inflate_limit(mut self, limit: usize) -> Self {
        self.inflate_limit = limit;
        self
    }

    fn compress(plain: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut sealed = Vec::with_capacity(plain.len());
        sealed.push(MARKER_GZIP);
        let mut encoder = GzEncoder::new(sealed, Compression::fast());
        encoder
            .write_all(plain)
            .map_err(|source| CipherError::Compress { source })?;
        encoder
            .finish()
            .map_err(|source| CipherError::Compress { source })
    }

    fn inflate(&self, compressed: &[u8]) -> Result<Vec<u8>, CipherError> {
        let limit = u64::try_from(self.inflate_limit).unwrap_or(u64::MAX);
        let mut plain = Vec::new();
        GzDecoder::new(compressed)
            .take(limit.saturating_add(1))
            .read_to_end(&mut plain)
            .map_err(|source| CipherError::Inflate { source })?;
        if plain.len() > self.inflate_limit {
            return Err(CipherError::InflatedTooLarge {
                limit: self.inflate_limit,
            });
        }
        Ok(plain)
    }
}

fn raw(plain: &[u8]) -> Vec<u8> {
    let mut sealed = Vec::with_capacity(plain.len() + 1);
    sealed.push(MARKER_RAW);
    sealed.extend_from_slice(plain);
    sealed
}

impl Cipher for GzipCipher {
    fn encrypt(&self, _sequence: u64, _key: u32, plain: &[u8]) -> Result<Vec<u8>, CipherError> {
        if plain.is_empty() {
            return Ok(Vec::new());
        }
        if plain.len() < self.threshold {
            return Ok(raw(plain));
        }
        let compressed = Self::compress(plain)?;
        if compressed.len() <= plain.len() {
            Ok(compressed)
        } else {
            Ok(raw(plain))
        }
    }

    fn decrypt(&self, _sequence: u64, _key: u32, sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
        let Some((&marker, rest)) = sealed.split_first() else {
            return Ok(Vec::new());
        };
        match marker {
            MARKER_RAW => Ok(rest.to_vec()),
            MARKER_GZIP => self.inflate(rest),
            other => Err(CipherError::UnknownMarker { marker: other }),
        }
    }
}

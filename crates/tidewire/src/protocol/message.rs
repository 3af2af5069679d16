//! Wire header codec and the owned message type.

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

use super::cipher::{Cipher, CipherError};

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 16;

/// Failures raised while encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A raw frame was shorter than the fixed header.
    #[error("frame of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    Truncated {
        /// Length of the raw frame.
        len: usize,
    },
    /// A sealed body does not fit the header's length field.
    #[error("body of {len} bytes does not fit the header length field")]
    BodyTooLong {
        /// Length of the sealed body.
        len: usize,
    },
    /// The cipher rejected the body.
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Fixed frame header.
///
/// Layout, big endian: body length (`u32`), command (`u32`), RPC sequence
/// (`u64`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// Length of the body that follows, as sent on the wire.
    pub body_len: u32,
    /// Command code.
    pub cmd: u32,
    /// Caller-chosen correlation number for RPC traffic.
    pub rpc_seq: u64,
}

impl Header {
    /// Decodes a header from its wire form.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        let (len, rest) = bytes.split_at(4);
        let (cmd, seq) = rest.split_at(4);
        Self {
            body_len: BigEndian::read_u32(len),
            cmd: BigEndian::read_u32(cmd),
            rpc_seq: BigEndian::read_u64(seq),
        }
    }

    /// Encodes the header into its wire form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0_u8; HEADER_LEN];
        let (len, rest) = bytes.split_at_mut(4);
        let (cmd, seq) = rest.split_at_mut(4);
        BigEndian::write_u32(len, self.body_len);
        BigEndian::write_u32(cmd, self.cmd);
        BigEndian::write_u64(seq, self.rpc_seq);
        bytes
    }

    /// Total frame length, header included.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN.saturating_add(usize::try_from(self.body_len).unwrap_or(usize::MAX))
    }
}

/// A decoded message with a plaintext body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    cmd: u32,
    rpc_seq: u64,
    body: Vec<u8>,
}

impl Message {
    /// Builds a message on `cmd` with a zero RPC sequence.
    pub fn new(cmd: u32, body: impl Into<Vec<u8>>) -> Self {
        Self::rpc(cmd, 0, body)
    }

    /// Builds a message carrying an RPC sequence number.
    pub fn rpc(cmd: u32, rpc_seq: u64, body: impl Into<Vec<u8>>) -> Self {
        Self {
            cmd,
            rpc_seq,
            body: body.into(),
        }
    }

    /// Command code.
    pub fn cmd(&self) -> u32 {
        self.cmd
    }

    /// RPC correlation number.
    pub fn rpc_seq(&self) -> u64 {
        self.rpc_seq
    }

    /// Plaintext body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Plaintext body length.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Consumes the message, returning its body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Drops `count` bytes from the end of the body without reallocating.
    pub fn truncate_tail(&mut self, count: usize) {
        let keep = self.body.len().saturating_sub(count);
        self.body.truncate(keep);
    }

    /// Decodes a raw frame (header followed by the sealed body) and opens the
    /// body with `cipher`.
    pub fn open(
        mut raw: Vec<u8>,
        sequence: u64,
        key: u32,
        cipher: &dyn Cipher,
    ) -> Result<Self, ProtocolError> {
        let header_bytes: [u8; HEADER_LEN] = raw
            .get(..HEADER_LEN)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(ProtocolError::Truncated { len: raw.len() })?;
        let header = Header::decode(&header_bytes);
        let sealed = raw.split_off(HEADER_LEN);
        let body = cipher.decrypt(sequence, key, &sealed)?;
        Ok(Self {
            cmd: header.cmd,
            rpc_seq: header.rpc_seq,
            body,
        })
    }

    /// Seals the body with `cipher` and returns the complete wire frame.
    pub fn seal(
        &self,
        sequence: u64,
        key: u32,
        cipher: &dyn Cipher,
    ) -> Result<Vec<u8>, ProtocolError> {
        let sealed = cipher.encrypt(sequence, key, &self.body)?;
        let body_len = u32::try_from(sealed.len())
            .map_err(|_| ProtocolError::BodyTooLong { len: sealed.len() })?;
        let header = Header {
            body_len,
            cmd: self.cmd,
            rpc_seq: self.rpc_seq,
        };
        let mut frame = Vec::with_capacity(HEADER_LEN + sealed.len());
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(&sealed);
        Ok(frame)
    }
}

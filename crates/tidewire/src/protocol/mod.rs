//! Wire-level building blocks: reserved commands, the frame header codec, the
//! owned [`Message`] type, and the [`Cipher`] capability.

mod cipher;
mod command;
mod message;

#[cfg(test)]
pub(crate) use self::cipher::MockCipher;
pub use self::cipher::{
    Cipher, CipherError, DEFAULT_GZIP_THRESHOLD, DEFAULT_INFLATE_LIMIT, GzipCipher, PlainCipher,
};
pub use self::command::{
    CMD_PING, CMD_PING_ACK, CMD_RPC_ERROR, CMD_RPC_METHOD, RESERVED_COMMANDS, is_reserved,
};
pub use self::message::{HEADER_LEN, Header, Message, ProtocolError};

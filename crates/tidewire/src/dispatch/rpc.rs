//! RPC sub-dispatch.
//!
//! An RPC call travels on [`CMD_RPC_METHOD`]. Its body ends with the method
//! name followed by a single byte holding the name's length:
//!
//! ```text
//! [payload ...][method name (L bytes)][L]
//! ```
//!
//! Malformed calls are answered on [`CMD_RPC_ERROR`] with the caller's RPC
//! sequence and a text body; the connection stays open.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::DISPATCH_TARGET;
use super::handler::execute;
use super::table::CommandTable;
use crate::client::{Client, SendError};
use crate::protocol::{CMD_RPC_ERROR, CMD_RPC_METHOD, Message};

/// Longest method name the one-byte trailer can describe.
pub const MAX_METHOD_LEN: usize = 127;

/// A single RPC call handed to a handler.
///
/// The context owns the message, so work forked from a handler must move the
/// context (or its parts) explicitly.
#[derive(Debug)]
pub struct RpcContext {
    method: String,
    client: Arc<Client>,
    message: Message,
}

impl RpcContext {
    pub(crate) fn new(method: String, client: Arc<Client>, message: Message) -> Self {
        Self {
            method,
            client,
            message,
        }
    }

    /// Resolved method name; empty for numeric RPC commands.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Connection that issued the call.
    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Request message with the method trailer removed.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Request payload.
    pub fn body(&self) -> &[u8] {
        self.message.body()
    }

    /// Sends `body` back on the request's command, echoing its RPC sequence.
    pub fn reply(&self, body: impl Into<Vec<u8>>) -> Result<(), SendError> {
        self.client.send_msg(Message::rpc(
            self.message.cmd(),
            self.message.rpc_seq(),
            body,
        ))
    }

    /// Sends an error text on [`CMD_RPC_ERROR`], echoing the RPC sequence.
    pub fn reply_error(&self, text: impl Into<String>) -> Result<(), SendError> {
        send_error(&self.client, self.message.rpc_seq(), text.into())
    }

    /// Splits the context into its method name, client, and message.
    pub fn into_parts(self) -> (String, Arc<Client>, Message) {
        (self.method, self.client, self.message)
    }
}

/// Reasons an RPC call could not be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MethodError {
    InvalidPayload,
    InvalidLength(u8),
    UnknownMethod(String),
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload => write!(f, "invalid rpc payload"),
            Self::InvalidLength(len) => {
                write!(f, "invalid rpc method length {len}, should be (1-127)")
            }
            Self::UnknownMethod(method) => write!(f, "invalid rpc method {method}"),
        }
    }
}

/// Locates the method name in an RPC body.
///
/// Returns the name bytes and the number of trailing bytes (name plus length
/// byte) to strip from the body.
pub(crate) fn split_method(body: &[u8]) -> Result<(&[u8], usize), MethodError> {
    if body.len() < 2 {
        return Err(MethodError::InvalidPayload);
    }
    let Some((&len_byte, rest)) = body.split_last() else {
        return Err(MethodError::InvalidPayload);
    };
    let len = usize::from(len_byte);
    if !(1..=MAX_METHOD_LEN).contains(&len) || rest.len() < len {
        return Err(MethodError::InvalidLength(len_byte));
    }
    let (_, name) = rest.split_at(rest.len() - len);
    Ok((name, len + 1))
}

/// Routes an RPC call to its method handler or replies with an error frame.
pub(crate) fn dispatch(table: &CommandTable, client: &Arc<Client>, mut message: Message) {
    let resolved = split_method(message.body()).and_then(|(name, trailer)| {
        let Ok(method) = std::str::from_utf8(name) else {
            return Err(MethodError::UnknownMethod(
                String::from_utf8_lossy(name).into_owned(),
            ));
        };
        match table.method(method) {
            Some(entry) => Ok((method.to_owned(), trailer, entry.clone())),
            None => Err(MethodError::UnknownMethod(method.to_owned())),
        }
    });

    let (method, trailer, entry) = match resolved {
        Ok(found) => found,
        Err(error) => {
            debug!(
                target: DISPATCH_TARGET,
                client = %client.id(),
                rpc_seq = message.rpc_seq(),
                error = %error,
                "rejected rpc call"
            );
            if let Err(send_error) = send_error(client, message.rpc_seq(), error.to_string()) {
                debug!(
                    target: DISPATCH_TARGET,
                    client = %client.id(),
                    error = %send_error,
                    "failed to send rpc error reply"
                );
            }
            return;
        }
    };

    message.truncate_tail(trailer);
    let context = RpcContext::new(method, Arc::clone(client), message);
    let handler = entry.handler;
    execute(entry.execution, client, CMD_RPC_METHOD, move || {
        handler(context);
    });
}

fn send_error(client: &Client, rpc_seq: u64, text: String) -> Result<(), SendError> {
    client.send_msg(Message::rpc(CMD_RPC_ERROR, rpc_seq, text.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::rpc_body;
    use rstest::rstest;

    #[test]
    fn splits_trailing_method_name() {
        let body = rpc_body(b"payload", "echo");
        let (name, trailer) = split_method(&body).expect("valid body");
        assert_eq!(name, b"echo");
        assert_eq!(trailer, 5);
    }

    #[test]
    fn accepts_empty_payload() {
        let body = rpc_body(b"", "x");
        let (name, trailer) = split_method(&body).expect("valid body");
        assert_eq!(name, b"x");
        assert_eq!(trailer, 2);
    }

    #[rstest]
    #[case::empty(Vec::new())]
    #[case::single_byte(vec![1])]
    fn short_bodies_are_invalid_payloads(#[case] body: Vec<u8>) {
        assert_eq!(split_method(&body), Err(MethodError::InvalidPayload));
    }

    #[rstest]
    #[case::zero_length(vec![b'a', 0], 0)]
    #[case::above_limit(vec![b'a', 128], 128)]
    #[case::longer_than_body(vec![b'a', b'b', 5], 5)]
    fn bad_lengths_are_rejected(#[case] body: Vec<u8>, #[case] len: u8) {
        assert_eq!(split_method(&body), Err(MethodError::InvalidLength(len)));
    }

    #[test]
    fn longest_method_name_is_accepted() {
        let method = "m".repeat(MAX_METHOD_LEN);
        let body = rpc_body(b"", &method);
        let (name, _) = split_method(&body).expect("valid body");
        assert_eq!(name.len(), MAX_METHOD_LEN);
    }

    #[rstest]
    #[case(MethodError::InvalidPayload, "invalid rpc payload")]
    #[case(
        MethodError::InvalidLength(0),
        "invalid rpc method length 0, should be (1-127)"
    )]
    #[case(MethodError::UnknownMethod("nope".to_owned()), "invalid rpc method nope")]
    fn error_texts_are_stable(#[case] error: MethodError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }
}

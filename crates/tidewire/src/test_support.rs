//! Shared fixtures for unit and behavioural tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use tidewire_config::{Config, EngineSettings, SocketTuning};

use crate::client::Client;
use crate::protocol::{Cipher, GzipCipher, HEADER_LEN, Header, Message, PlainCipher};

pub(crate) const TEST_CEILING: u32 = 0x1000;

/// Connected `(server, peer)` pair on the loopback interface.
pub(crate) fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    let peer = TcpStream::connect(addr).expect("connect peer");
    let (server, _) = listener.accept().expect("accept peer");
    (server, peer)
}

/// Default tuning with a short read deadline so failing tests finish quickly.
pub(crate) fn tuning() -> SocketTuning {
    let mut tuning = Config::default().socket_tuning();
    tuning.recv_timeout = Some(Duration::from_secs(2));
    tuning.send_timeout = Some(Duration::from_secs(2));
    tuning
}

pub(crate) fn settings() -> EngineSettings {
    EngineSettings {
        tuning: tuning(),
        user_command_max: TEST_CEILING,
    }
}

/// Polls `condition` for up to two seconds.
pub(crate) fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// A client whose outbound queue is read directly by the test.
pub(crate) struct QueuedClient {
    pub(crate) client: Arc<Client>,
    pub(crate) outbound: Receiver<Message>,
    _peer: TcpStream,
}

impl QueuedClient {
    pub(crate) fn new() -> Self {
        let (server, peer) = loopback_pair();
        let client = Client::new(server, Arc::new(PlainCipher), 16).expect("client");
        let outbound = client.take_outbound().expect("outbound receiver");
        Self {
            client: Arc::new(client),
            outbound,
            _peer: peer,
        }
    }

    /// Messages queued so far.
    pub(crate) fn drain(&self) -> Vec<Message> {
        self.outbound.try_iter().collect()
    }
}

/// Builds an RPC body: payload, method name, name length.
pub(crate) fn rpc_body(payload: &[u8], method: &str) -> Vec<u8> {
    let mut body = payload.to_vec();
    body.extend_from_slice(method.as_bytes());
    body.push(u8::try_from(method.len()).expect("method name fits one byte"));
    body
}

/// Peer-side codec matching the engine's default cipher.
pub(crate) struct PeerCodec {
    cipher: GzipCipher,
    recv_seq: u64,
    send_seq: u64,
}

impl PeerCodec {
    pub(crate) fn new() -> Self {
        Self {
            cipher: GzipCipher::default(),
            recv_seq: 0,
            send_seq: 0,
        }
    }

    pub(crate) fn write(&mut self, stream: &mut TcpStream, message: &Message) {
        let frame = message
            .seal(self.send_seq, 0, &self.cipher)
            .expect("seal frame");
        self.send_seq += 1;
        stream.write_all(&frame).expect("write frame");
    }

    pub(crate) fn read(&mut self, stream: &mut TcpStream) -> Message {
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        let mut header_bytes = [0_u8; HEADER_LEN];
        stream.read_exact(&mut header_bytes).expect("read header");
        let header = Header::decode(&header_bytes);
        let mut raw = header_bytes.to_vec();
        raw.resize(header.frame_len(), 0);
        stream
            .read_exact(&mut raw[HEADER_LEN..])
            .expect("read body");
        let message =
            Message::open(raw, self.recv_seq, 0, &self.cipher as &dyn Cipher).expect("open frame");
        self.recv_seq += 1;
        message
    }
}

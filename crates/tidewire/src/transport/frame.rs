//! Default frame reader and writer.

use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tidewire_config::SocketTuning;

use super::FrameError;
use crate::client::Client;
use crate::protocol::{HEADER_LEN, Header, Message};

/// Reads one frame from `client` and opens it with the next receive
/// sequence.
///
/// A frame whose header and body together exceed `tuning.max_pack_len` is
/// rejected before any body buffer is allocated.
pub fn read_message(client: &Client, tuning: &SocketTuning) -> Result<Message, FrameError> {
    let raw = read_raw_frame(client.stream(), tuning)?;
    let sequence = client.next_recv_seq();
    Ok(Message::open(
        raw,
        sequence,
        client.recv_key(),
        client.cipher(),
    )?)
}

/// Reads the header and body of one frame into a single buffer.
///
/// Each phase (header, then body) must complete within `tuning.recv_timeout`
/// of its start, however the peer splits its writes.
pub fn read_raw_frame(stream: &TcpStream, tuning: &SocketTuning) -> Result<Vec<u8>, FrameError> {
    let mut header_bytes = [0_u8; HEADER_LEN];
    read_full(stream, &mut header_bytes, deadline(tuning.recv_timeout))
        .map_err(|source| FrameError::ReadHeader { source })?;

    let header = Header::decode(&header_bytes);
    if header.body_len == 0 {
        return Ok(header_bytes.to_vec());
    }

    let frame_len = header.frame_len();
    if frame_len > tuning.max_pack_len {
        return Err(FrameError::PacketTooLarge {
            len: frame_len,
            max: tuning.max_pack_len,
        });
    }

    let body_deadline = deadline(tuning.recv_timeout);
    let mut raw = Vec::with_capacity(frame_len);
    raw.extend_from_slice(&header_bytes);
    raw.resize(frame_len, 0);
    let body = raw.get_mut(HEADER_LEN..).unwrap_or_default();
    read_full(stream, body, body_deadline).map_err(|source| FrameError::ReadBody {
        len: frame_len - HEADER_LEN,
        source,
    })?;
    Ok(raw)
}

/// Writes `frame` with a single write call.
///
/// Errors, expired deadlines, and short writes stop the client.
pub fn write_frame(client: &Client, frame: &[u8], tuning: &SocketTuning) -> Result<(), FrameError> {
    let result = write_once(client.stream(), frame, tuning.send_timeout);
    if result.is_err() {
        client.stop();
    }
    result
}

fn write_once(
    stream: &TcpStream,
    frame: &[u8],
    timeout: Option<Duration>,
) -> Result<(), FrameError> {
    stream
        .set_write_timeout(timeout)
        .map_err(|source| FrameError::Deadline { source })?;
    let mut writer = stream;
    let written = writer
        .write(frame)
        .map_err(|source| FrameError::Write { source })?;
    if written != frame.len() {
        return Err(FrameError::ShortWrite {
            written,
            expected: frame.len(),
        });
    }
    Ok(())
}

fn deadline(timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|timeout| Instant::now() + timeout)
}

/// Fills `buf`, resetting the socket timeout to the time left before
/// `deadline` ahead of every read.
fn read_full(stream: &TcpStream, mut buf: &mut [u8], deadline: Option<Instant>) -> io::Result<()> {
    let mut reader = stream;
    if deadline.is_none() {
        stream.set_read_timeout(None)?;
    }
    while !buf.is_empty() {
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ErrorKind::TimedOut.into());
            }
            stream.set_read_timeout(Some(remaining))?;
        }
        match reader.read(buf) {
            Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
            Ok(read) => {
                let filled = std::mem::take(&mut buf);
                buf = filled.get_mut(read..).unwrap_or_default();
            }
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::protocol::{MockCipher, PlainCipher};
    use crate::test_support::{loopback_pair, tuning};

    fn raw_header(body_len: u32, cmd: u32) -> [u8; HEADER_LEN] {
        Header {
            body_len,
            cmd,
            rpc_seq: 0,
        }
        .encode()
    }

    #[test]
    fn reads_header_only_frames() {
        let (server, mut peer) = loopback_pair();
        peer.write_all(&raw_header(0, 9)).expect("write header");

        let raw = read_raw_frame(&server, &tuning()).expect("read frame");
        assert_eq!(raw.len(), HEADER_LEN);
    }

    #[test]
    fn rejects_oversized_frames_before_reading_body() {
        let (server, mut peer) = loopback_pair();
        let mut limits = tuning();
        limits.max_pack_len = 64;
        limits.recv_timeout = Some(Duration::from_secs(5));
        // Only the header is sent: reading the body would block until the
        // deadline instead of failing fast.
        peer.write_all(&raw_header(u32::MAX, 9)).expect("write header");

        let error = read_raw_frame(&server, &limits).expect_err("oversized");
        assert!(matches!(error, FrameError::PacketTooLarge { max: 64, .. }));
    }

    #[test]
    fn short_body_is_a_read_failure() {
        let (server, mut peer) = loopback_pair();
        peer.write_all(&raw_header(10, 9)).expect("write header");
        peer.write_all(b"abc").expect("write partial body");
        drop(peer);

        let error = read_raw_frame(&server, &tuning()).expect_err("short body");
        assert!(matches!(error, FrameError::ReadBody { len: 10, .. }));
    }

    #[test]
    fn read_deadline_expires() {
        let (server, _peer) = loopback_pair();
        let mut limits = tuning();
        limits.recv_timeout = Some(Duration::from_millis(50));

        let error = read_raw_frame(&server, &limits).expect_err("deadline");
        assert!(error.is_timeout(), "unexpected error: {error}");
    }

    #[test]
    fn trickled_header_still_hits_the_deadline() {
        let (server, mut peer) = loopback_pair();
        let mut limits = tuning();
        limits.recv_timeout = Some(Duration::from_millis(200));
        let writer = thread::spawn(move || {
            for byte in raw_header(0, 9) {
                thread::sleep(Duration::from_millis(120));
                if peer.write_all(&[byte]).is_err() {
                    break;
                }
            }
        });

        let started = Instant::now();
        let error = read_raw_frame(&server, &limits).expect_err("deadline");
        let elapsed = started.elapsed();

        assert!(matches!(error, FrameError::ReadHeader { .. }));
        assert!(error.is_timeout(), "unexpected error: {error}");
        assert!(elapsed < Duration::from_millis(600), "read took {elapsed:?}");
        drop(server);
        writer.join().expect("writer thread");
    }

    #[test]
    fn read_message_opens_with_receive_sequence_and_key() {
        let (server, mut peer) = loopback_pair();
        let frame = Message::rpc(9, 77, b"sealed".to_vec())
            .seal(0, 0, &PlainCipher)
            .expect("seal");
        peer.write_all(&frame).expect("write frame");

        let mut cipher = MockCipher::new();
        cipher
            .expect_decrypt()
            .withf(|sequence, key, sealed| *sequence == 0 && *key == 31 && sealed == b"sealed")
            .times(1)
            .returning(|_, _, _| Ok(b"plain body".to_vec()));
        let client = Client::new(server, Arc::new(cipher), 4).expect("client");
        client.set_keys(31, 0);

        let message = read_message(&client, &tuning()).expect("read message");
        assert_eq!(message.cmd(), 9);
        assert_eq!(message.rpc_seq(), 77);
        assert_eq!(message.body(), b"plain body");
        assert_eq!(client.next_recv_seq(), 1, "sequence advanced once");
    }

    #[test]
    fn written_frames_arrive_intact() {
        let (server, mut peer) = loopback_pair();
        let client = Client::new(server, Arc::new(PlainCipher), 4).expect("client");

        write_frame(&client, b"0123456789abcdef", &tuning()).expect("write frame");

        let mut received = [0_u8; 16];
        peer.read_exact(&mut received).expect("read frame");
        assert_eq!(&received, b"0123456789abcdef");
        assert!(!client.is_stopped());
    }

    #[test]
    fn failed_write_stops_the_client() {
        let (server, _peer) = loopback_pair();
        let client = Client::new(server, Arc::new(PlainCipher), 4).expect("client");
        client
            .stream()
            .shutdown(std::net::Shutdown::Write)
            .expect("shutdown write half");

        let error = write_frame(&client, b"payload", &tuning()).expect_err("write fails");
        assert!(matches!(error, FrameError::Write { .. }));
        assert!(client.is_stopped());
    }
}

#![allow(dead_code)]

// Shared mock JDWP peer for the integration tests
//
// Speaks raw wire bytes over an in-process duplex stream, so every test
// asserts the exact frames the client produces and controls the exact
// frames it consumes.

use anyhow::{bail, Result};
use bytes::BufMut;
use jdwp_core::JdwpConnection;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

pub const HEADER_SIZE: usize = 11;
pub const REPLY_FLAG: u8 = 0x80;

/// A command packet as read off the wire.
#[derive(Debug)]
pub struct Command {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

pub struct MockPeer {
    stream: DuplexStream,
    // The peer has its own id space for the packets it originates.
    next_packet_id: u32,
}

impl MockPeer {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            next_packet_id: 0x8000_0001,
        }
    }

    /// Read the client's magic and echo it back.
    pub async fn accept_handshake(&mut self) -> Result<()> {
        let mut buf = [0u8; 14];
        self.stream.read_exact(&mut buf).await?;
        if &buf != b"JDWP-Handshake" {
            bail!("bad handshake: {buf:?}");
        }
        self.stream.write_all(b"JDWP-Handshake").await?;
        Ok(())
    }

    /// Answer the handshake with the wrong magic.
    pub async fn reject_handshake(&mut self) -> Result<()> {
        let mut buf = [0u8; 14];
        self.stream.read_exact(&mut buf).await?;
        self.stream.write_all(b"HTTP/1.1 200 O").await?;
        Ok(())
    }

    /// Read one command packet from the client.
    pub async fn read_command(&mut self) -> Result<Command> {
        let mut header = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut header).await?;

        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let flags = header[8];
        if flags & REPLY_FLAG != 0 {
            bail!("client sent a reply packet");
        }
        if length < HEADER_SIZE {
            bail!("client sent a short packet: {length}");
        }

        let mut data = vec![0u8; length - HEADER_SIZE];
        self.stream.read_exact(&mut data).await?;

        Ok(Command {
            id,
            command_set: header[9],
            command: header[10],
            data,
        })
    }

    /// Send a reply packet echoing `id`.
    pub async fn reply(&mut self, id: u32, error_code: u16, data: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + data.len());
        buf.put_u32((HEADER_SIZE + data.len()) as u32);
        buf.put_u32(id);
        buf.put_u8(REPLY_FLAG);
        buf.put_u16(error_code);
        buf.put_slice(data);
        self.stream.write_all(&buf).await?;
        Ok(())
    }

    /// Send a composite event command (set 64, command 100).
    pub async fn send_composite(&mut self, payload: &[u8]) -> Result<()> {
        let id = self.next_packet_id;
        self.next_packet_id += 1;

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u32((HEADER_SIZE + payload.len()) as u32);
        buf.put_u32(id);
        buf.put_u8(0x00);
        buf.put_u8(64);
        buf.put_u8(100);
        buf.put_slice(payload);
        self.stream.write_all(&buf).await?;
        Ok(())
    }

    /// Serve the IDSizes negotiation the client issues during attach.
    pub async fn negotiate(&mut self, sizes: [i32; 5]) -> Result<()> {
        let cmd = self.read_command().await?;
        if (cmd.command_set, cmd.command) != (1, 7) {
            bail!(
                "expected IDSizes first, got ({}, {})",
                cmd.command_set,
                cmd.command
            );
        }
        let mut data = Vec::new();
        for size in sizes {
            data.put_i32(size);
        }
        self.reply(cmd.id, 0, &data).await
    }

    /// Drop the stream so the client observes end-of-stream.
    pub fn shutdown(self) {
        drop(self.stream);
    }
}

/// Opt-in wire logging when debugging a failing test:
/// `RUST_LOG=jdwp_core=trace cargo test -- --nocapture`
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Attach a connection to a fresh mock peer reporting 8-byte ids.
pub async fn connect() -> Result<(JdwpConnection, MockPeer)> {
    connect_with_sizes([8, 8, 8, 8, 8]).await
}

pub async fn connect_with_sizes(sizes: [i32; 5]) -> Result<(JdwpConnection, MockPeer)> {
    init_logging();
    let (client, server) = tokio::io::duplex(64 * 1024);
    let mut peer = MockPeer::new(server);

    let attach: JoinHandle<jdwp_core::JdwpResult<JdwpConnection>> =
        tokio::spawn(JdwpConnection::attach(client));
    peer.accept_handshake().await?;
    peer.negotiate(sizes).await?;
    let conn = attach.await??;

    Ok((conn, peer))
}

// Reply payload builders (8-byte id widths unless stated otherwise).

pub fn version_payload(
    description: &str,
    jdwp_major: i32,
    jdwp_minor: i32,
    vm_version: &str,
    vm_name: &str,
) -> Vec<u8> {
    let mut buf = Vec::new();
    put_string(&mut buf, description);
    buf.put_i32(jdwp_major);
    buf.put_i32(jdwp_minor);
    put_string(&mut buf, vm_version);
    put_string(&mut buf, vm_name);
    buf
}

pub fn put_string(buf: &mut Vec<u8>, value: &str) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

// Composite event payload builders.

pub fn composite(suspend_policy: u8, events: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(suspend_policy);
    buf.put_i32(events.len() as i32);
    for event in events {
        buf.put_slice(event);
    }
    buf
}

pub fn class_prepare_event(
    request_id: i32,
    thread: u64,
    type_id: u64,
    signature: &str,
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(8); // CLASS_PREPARE
    buf.put_i32(request_id);
    buf.put_u64(thread);
    buf.put_u8(1); // class
    buf.put_u64(type_id);
    put_string(&mut buf, signature);
    buf.put_i32(3); // verified | prepared
    buf
}

pub fn thread_start_event(request_id: i32, thread: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(6); // THREAD_START
    buf.put_i32(request_id);
    buf.put_u64(thread);
    buf
}

pub fn breakpoint_event(request_id: i32, thread: u64, class_id: u64, method_id: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(2); // BREAKPOINT
    buf.put_i32(request_id);
    buf.put_u64(thread);
    put_location(&mut buf, class_id, method_id, 0);
    buf
}

pub fn method_entry_event(request_id: i32, thread: u64, class_id: u64, method_id: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(40); // METHOD_ENTRY
    buf.put_i32(request_id);
    buf.put_u64(thread);
    put_location(&mut buf, class_id, method_id, 0);
    buf
}

pub fn put_location(buf: &mut Vec<u8>, class_id: u64, method_id: u64, index: u64) {
    buf.put_u8(1); // class
    buf.put_u64(class_id);
    buf.put_u64(method_id);
    buf.put_u64(index);
}

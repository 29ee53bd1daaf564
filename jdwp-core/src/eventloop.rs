// JDWP receive loop
//
// A single task owns the read side of the stream for the lifetime of
// the connection: it reads every inbound packet, classifies it as reply
// or command, and routes it through the correlator.

use std::io;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commands::{command_sets, event_commands};
use crate::correlator::Correlator;
use crate::events::parse_composite_event;
use crate::protocol::{
    CommandPacket, JdwpError, JdwpResult, ReplyPacket, HEADER_SIZE, MAX_PACKET_SIZE, REPLY_FLAG,
};
use crate::types::IdSizes;

pub(crate) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// A packet from the peer: a reply to one of our commands, or a command
/// the peer originated (events).
#[derive(Debug)]
pub(crate) enum InboundPacket {
    Reply(ReplyPacket),
    Command(CommandPacket),
}

/// Read one whole packet from the stream.
pub(crate) async fn read_packet(reader: &mut BoxedReader) -> JdwpResult<InboundPacket> {
    let mut header = [0u8; HEADER_SIZE];
    read_fully(reader, &mut header).await?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let flags = header[8];

    if length < HEADER_SIZE {
        return Err(JdwpError::Protocol(format!(
            "packet length {length} shorter than the {HEADER_SIZE}-byte header"
        )));
    }
    if length > MAX_PACKET_SIZE {
        return Err(JdwpError::Protocol(format!(
            "packet too large: {length} bytes (max {MAX_PACKET_SIZE})"
        )));
    }

    let mut data = vec![0u8; length - HEADER_SIZE];
    if !data.is_empty() {
        read_fully(reader, &mut data).await?;
    }

    if flags & REPLY_FLAG != 0 {
        let error_code = u16::from_be_bytes([header[9], header[10]]);
        Ok(InboundPacket::Reply(ReplyPacket {
            id,
            error_code,
            data,
        }))
    } else {
        Ok(InboundPacket::Command(CommandPacket {
            id,
            command_set: header[9],
            command: header[10],
            data,
        }))
    }
}

async fn read_fully(reader: &mut BoxedReader, buf: &mut [u8]) -> JdwpResult<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(JdwpError::ConnectionClosed),
        Err(e) => Err(JdwpError::Transport(e)),
    }
}

/// Start the receive loop task.
pub(crate) fn spawn_receive_loop(
    reader: BoxedReader,
    correlator: Arc<Correlator>,
    id_sizes: Arc<RwLock<IdSizes>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(receive_loop(reader, correlator, id_sizes, shutdown))
}

async fn receive_loop(
    mut reader: BoxedReader,
    correlator: Arc<Correlator>,
    id_sizes: Arc<RwLock<IdSizes>>,
    shutdown: CancellationToken,
) {
    debug!("receive loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("receive loop shut down");
                break;
            }
            packet = read_packet(&mut reader) => match packet {
                Ok(InboundPacket::Reply(reply)) => {
                    debug!(id = reply.id, "received reply");
                    correlator.deliver_reply(reply);
                }
                Ok(InboundPacket::Command(command)) => {
                    if let Err(e) = handle_command(command, &correlator, &id_sizes).await {
                        error!("receive loop failed: {e}");
                        break;
                    }
                }
                Err(JdwpError::ConnectionClosed) => {
                    info!("peer closed the connection");
                    break;
                }
                Err(e) => {
                    error!("receive loop failed: {e}");
                    break;
                }
            }
        }
    }

    // Unblock every waiter with ConnectionClosed and make subsequent
    // calls fail fast.
    correlator.close();
    shutdown.cancel();
    debug!("receive loop exited");
}

/// Route a peer-originated command. Only composite events are expected;
/// anything else is logged and discarded. A composite that fails to
/// decode is fatal: the stream is out of sync.
async fn handle_command(
    command: CommandPacket,
    correlator: &Correlator,
    id_sizes: &RwLock<IdSizes>,
) -> JdwpResult<()> {
    if command.command_set != command_sets::EVENT || command.command != event_commands::COMPOSITE {
        warn!(
            command_set = command.command_set,
            command = command.command,
            "discarding unexpected command from peer"
        );
        return Ok(());
    }

    let sizes = *id_sizes.read().expect("id sizes lock poisoned");
    let set = parse_composite_event(&command.data, sizes)?;
    debug!(
        events = set.events.len(),
        suspend_policy = set.suspend_policy,
        "received composite event"
    );

    for event in set.events {
        match correlator.subscriber(event.request_id) {
            // Sending outside the correlator lock; per-subscriber order
            // is preserved because this loop is the only producer.
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    debug!("subscriber dropped its receiver");
                }
            }
            None => debug!(
                request_id = event.request_id,
                "event with no subscriber, dropping"
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn packet_from(bytes: &[u8]) -> JdwpResult<InboundPacket> {
        let (mut tx, rx) = tokio::io::duplex(1024);
        tx.write_all(bytes).await.unwrap();
        drop(tx);
        let mut reader: BoxedReader = Box::new(rx);
        read_packet(&mut reader).await
    }

    #[tokio::test]
    async fn test_read_reply_packet() {
        let bytes = [
            0, 0, 0, 13, // length
            0, 0, 0, 9, // id
            0x80, // reply flag
            0, 13, // error code
            0xAB, 0xCD, // payload
        ];
        match packet_from(&bytes).await.unwrap() {
            InboundPacket::Reply(reply) => {
                assert_eq!(reply.id, 9);
                assert_eq!(reply.error_code, 13);
                assert_eq!(reply.data, vec![0xAB, 0xCD]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_command_packet() {
        let bytes = [
            0, 0, 0, 11, // length
            0, 0, 0, 2, // id
            0x00, // command flag
            64, 100, // Event.Composite
        ];
        match packet_from(&bytes).await.unwrap() {
            InboundPacket::Command(command) => {
                assert_eq!(command.id, 2);
                assert_eq!(command.command_set, 64);
                assert_eq!(command.command, 100);
                assert!(command.data.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_short_length_is_protocol_error() {
        let bytes = [
            0, 0, 0, 5, // length < 11
            0, 0, 0, 1, 0x80, 0, 0,
        ];
        match packet_from(&bytes).await {
            Err(JdwpError::Protocol(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        match packet_from(&[0, 0, 0]).await {
            Err(JdwpError::ConnectionClosed) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}

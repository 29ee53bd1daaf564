// JDWP connection management
//
// Handshake, the shared send path, and connection lifecycle. One
// JdwpConnection per stream; clones share it.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::correlator::Correlator;
use crate::eventloop::{spawn_receive_loop, BoxedReader};
use crate::protocol::{CommandPacket, JdwpError, JdwpResult, ReplyPacket, JDWP_HANDSHAKE};
use crate::types::IdSizes;

/// Default bound on the wait for any single reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A live JDWP connection.
///
/// Cheap to clone; every request operation takes `&self`, so any number
/// of tasks may drive the VM concurrently over the one stream. Writes
/// are serialized by a send mutex held only across the frame write,
/// never across the wait for a reply.
#[derive(Clone)]
pub struct JdwpConnection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JdwpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JdwpConnection").finish_non_exhaustive()
    }
}

struct Inner {
    writer: Mutex<BoxedWriter>,
    correlator: Arc<Correlator>,
    id_sizes: Arc<RwLock<IdSizes>>,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Last handle gone: stop the receive loop.
        self.shutdown.cancel();
    }
}

impl JdwpConnection {
    /// Connect to a JVM debug port and attach.
    pub async fn connect(host: &str, port: u16) -> JdwpResult<Self> {
        info!("connecting to JDWP at {host}:{port}");
        let stream = TcpStream::connect((host, port)).await?;
        Self::attach(stream).await
    }

    /// Attach over an established byte stream.
    ///
    /// Performs the handshake, starts the receive loop, then negotiates
    /// id sizes; once this resolves the connection is ready for
    /// arbitrary commands.
    pub async fn attach<S>(mut stream: S) -> JdwpResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        Self::handshake(&mut stream).await?;

        let (reader, writer) = tokio::io::split(stream);
        let reader: BoxedReader = Box::new(reader);

        let correlator = Arc::new(Correlator::new());
        let id_sizes = Arc::new(RwLock::new(IdSizes::default()));
        let shutdown = CancellationToken::new();
        spawn_receive_loop(
            reader,
            correlator.clone(),
            id_sizes.clone(),
            shutdown.clone(),
        );

        let conn = Self {
            inner: Arc::new(Inner {
                writer: Mutex::new(Box::new(writer)),
                correlator,
                id_sizes,
                shutdown,
            }),
        };

        // IDSizes is fixed-width, so it is the one command that is safe
        // to issue before the real widths are known.
        conn.negotiate_id_sizes().await?;

        Ok(conn)
    }

    /// Exchange the 14-byte magic in both directions.
    async fn handshake<S>(stream: &mut S) -> JdwpResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!("performing JDWP handshake");

        stream.write_all(JDWP_HANDSHAKE).await?;
        stream.flush().await?;

        let mut buf = [0u8; JDWP_HANDSHAKE.len()];
        match stream.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(JdwpError::HandshakeFailed);
            }
            Err(e) => return Err(e.into()),
        }

        if buf != *JDWP_HANDSHAKE {
            warn!("invalid handshake response: {buf:?}");
            return Err(JdwpError::HandshakeFailed);
        }

        debug!("JDWP handshake successful");
        Ok(())
    }

    /// Send a command and wait for the matching reply.
    ///
    /// The frame is written as one contiguous unit under the send
    /// mutex; the reply wait is bounded by `DEFAULT_REQUEST_TIMEOUT`.
    /// On timeout the reply slot is removed, so a late reply is dropped
    /// rather than leaking table entries.
    pub async fn send_command(
        &self,
        command_set: u8,
        command: u8,
        data: Vec<u8>,
    ) -> JdwpResult<ReplyPacket> {
        let (id, reply_rx) = self.inner.correlator.register()?;
        let packet = CommandPacket::with_data(id, command_set, command, data);
        debug!(id, command_set, command, "sending command");

        let encoded = packet.encode();
        {
            let mut writer = self.inner.writer.lock().await;
            if let Err(e) = write_frame(&mut writer, &encoded).await {
                self.inner.correlator.abandon(id);
                // A write failure means the stream is gone for every
                // caller, not just this one.
                self.inner.shutdown.cancel();
                return Err(JdwpError::Transport(e));
            }
        }

        match timeout(DEFAULT_REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(JdwpError::ConnectionClosed),
            Err(_) => {
                warn!(id, "command timed out");
                self.inner.correlator.abandon(id);
                Err(JdwpError::Timeout)
            }
        }
    }

    /// The id widths in effect for this connection.
    pub fn id_sizes(&self) -> IdSizes {
        *self.inner.id_sizes.read().expect("id sizes lock poisoned")
    }

    pub(crate) fn set_id_sizes(&self, sizes: IdSizes) {
        *self.inner.id_sizes.write().expect("id sizes lock poisoned") = sizes;
    }

    pub(crate) fn correlator(&self) -> &Arc<Correlator> {
        &self.inner.correlator
    }

    /// Tear the connection down: stops the receive loop, fails every
    /// pending waiter with ConnectionClosed and ends every
    /// subscription. Safe to call more than once.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
        self.inner.correlator.close();
    }

    /// Whether the connection has been closed or has failed.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Resolves once the connection is torn down, whichever side
    /// initiated it.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await;
    }
}

async fn write_frame(writer: &mut BoxedWriter, encoded: &[u8]) -> std::io::Result<()> {
    writer.write_all(encoded).await?;
    writer.flush().await
}

//! Socket factory and per-connection I/O task.
//!
//! A [`Connector`] opens the byte stream. Each connect attempt then runs as
//! one spawned task that writes the handshake, reports the outcome and
//! shuttles lines in both directions until the stream closes or the task
//! is aborted. The task never touches connection state; it only reports
//! [`SessionEvent`]s, tagged with the attempt's generation so the manager
//! can discard reports from sessions it already tore down.

use std::future::Future;
use std::io;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

use crate::codec::LineCodec;
use crate::command::Command;
use crate::error::CodecError;

/// Opens the byte stream to the chat server.
///
/// The returned future must not borrow the connector, so the attempt can
/// run on a spawned task while the caller moves on.
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Start opening a stream to `addr` (`host:port`).
    fn connect(&self, addr: String) -> impl Future<Output = io::Result<Self::Stream>> + Send + 'static;
}

/// Plain TCP with OS-level keepalive enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, addr: String) -> impl Future<Output = io::Result<Self::Stream>> + Send + 'static {
        async move {
            let stream = TcpStream::connect(addr.as_str()).await?;
            if let Err(e) = enable_keepalive(&stream) {
                warn!("failed to enable TCP keepalive: {}", e);
            }
            if let Err(e) = stream.set_nodelay(true) {
                debug!("failed to set TCP_NODELAY: {}", e);
            }
            Ok(stream)
        }
    }
}

fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    use socket2::{SockRef, TcpKeepalive};

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));

    sock.set_tcp_keepalive(&keepalive)
}

/// What a session task reports.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// Stream open and handshake written.
    Connected,
    /// The attempt failed before the handshake was written.
    ConnectFailed(io::Error),
    /// One complete inbound line, terminator removed.
    Line(String),
    /// The stream ended; `None` for an orderly close.
    Closed(Option<io::Error>),
}

/// A [`TransportEvent`] from the attempt numbered `generation`.
#[derive(Debug)]
pub(crate) struct SessionEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Per-attempt settings.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SessionLimits {
    pub max_line_len: usize,
    pub connect_timeout: Duration,
}

/// Owner side of a running session. Dropping it aborts the task, which
/// closes the stream and cancels an attempt still in progress.
#[derive(Debug)]
pub(crate) struct SessionHandle {
    generation: u64,
    outbound: UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue `command` for writing. Commands queued before the handshake
    /// finishes are written right after it.
    pub fn send(&self, command: &Command) -> bool {
        trace!(line = %command.redacted(), "queue");
        self.outbound.send(command.to_string()).is_ok()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the I/O task for one attempt. `connecting` is the connector's
/// future, already started by the caller.
pub(crate) fn spawn_session<S, F>(
    runtime: &Handle,
    connecting: F,
    handshake: Vec<Command>,
    limits: SessionLimits,
    generation: u64,
    events: UnboundedSender<SessionEvent>,
) -> SessionHandle
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    F: Future<Output = io::Result<S>> + Send + 'static,
{
    let (outbound, queued) = mpsc::unbounded_channel();
    let task = runtime.spawn(run_session(
        connecting, handshake, limits, generation, events, queued,
    ));
    SessionHandle {
        generation,
        outbound,
        task,
    }
}

async fn run_session<S, F>(
    connecting: F,
    handshake: Vec<Command>,
    limits: SessionLimits,
    generation: u64,
    events: UnboundedSender<SessionEvent>,
    mut queued: UnboundedReceiver<String>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    F: Future<Output = io::Result<S>> + Send + 'static,
{
    let report = |event: TransportEvent| {
        let _ = events.send(SessionEvent { generation, event });
    };

    let opened = tokio::time::timeout(limits.connect_timeout, async {
        let stream = connecting.await?;
        let (read_half, write_half) = tokio::io::split(stream);
        let mut writer = FramedWrite::new(write_half, LineCodec::with_max_line_len(limits.max_line_len));
        for command in &handshake {
            debug!(line = %command.redacted(), "handshake");
            writer.send(command.to_string()).await.map_err(into_io)?;
        }
        io::Result::Ok((read_half, writer))
    })
    .await
    .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")));

    let (read_half, mut writer) = match opened {
        Ok(halves) => halves,
        Err(e) => {
            report(TransportEvent::ConnectFailed(e));
            return;
        }
    };
    report(TransportEvent::Connected);

    let mut reader = FramedRead::new(read_half, LineCodec::with_max_line_len(limits.max_line_len));
    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(line)) => {
                    trace!(%line, "recv");
                    report(TransportEvent::Line(line));
                }
                Some(Err(e)) => {
                    report(TransportEvent::Closed(Some(into_io(e))));
                    return;
                }
                None => {
                    report(TransportEvent::Closed(None));
                    return;
                }
            },
            line = queued.recv() => match line {
                Some(line) => match writer.send(line).await {
                    Ok(()) => {}
                    Err(CodecError::Io(e)) => {
                        report(TransportEvent::Closed(Some(e)));
                        return;
                    }
                    Err(e) => warn!("dropping outbound line: {}", e),
                },
                // Owner dropped the handle; nothing more to send.
                None => return,
            },
        }
    }
}

fn into_io(e: CodecError) -> io::Error {
    match e {
        CodecError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn limits() -> SessionLimits {
        SessionLimits {
            max_line_len: 512,
            connect_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_handshake_then_lines_both_ways() {
        let (client, server) = tokio::io::duplex(4096);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handshake = vec![Command::Nick("bot".into()), Command::Join("chan".into())];
        let session = spawn_session(
            &Handle::current(),
            async move { Ok(client) },
            handshake,
            limits(),
            7,
            tx,
        );
        assert!(session.send(&Command::Ping("host".into())));

        let (server_read, mut server_write) = tokio::io::split(server);
        let mut lines = BufReader::new(server_read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK bot");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "JOIN #chan");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PING host");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.generation, 7);
        assert!(matches!(first.event, TransportEvent::Connected));

        server_write.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();
        let next = rx.recv().await.unwrap();
        assert!(matches!(next.event, TransportEvent::Line(ref l) if l == "PING :tmi.twitch.tv"));

        drop(server_write);
        drop(lines);
        let closed = rx.recv().await.unwrap();
        assert!(matches!(closed.event, TransportEvent::Closed(_)));
    }

    #[tokio::test]
    async fn test_connect_failure_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _session = spawn_session(
            &Handle::current(),
            async { Err::<tokio::io::DuplexStream, _>(io::Error::from(io::ErrorKind::ConnectionRefused)) },
            Vec::new(),
            limits(),
            1,
            tx,
        );
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.event,
            TransportEvent::ConnectFailed(ref e) if e.kind() == io::ErrorKind::ConnectionRefused
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _session = spawn_session(
            &Handle::current(),
            std::future::pending::<io::Result<tokio::io::DuplexStream>>(),
            Vec::new(),
            limits(),
            1,
            tx,
        );
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.event,
            TransportEvent::ConnectFailed(ref e) if e.kind() == io::ErrorKind::TimedOut
        ));
    }

    #[tokio::test]
    async fn test_drop_aborts_session() {
        let (client, server) = tokio::io::duplex(4096);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = spawn_session(
            &Handle::current(),
            async move { Ok(client) },
            Vec::new(),
            limits(),
            3,
            tx,
        );
        assert!(matches!(rx.recv().await.unwrap().event, TransportEvent::Connected));
        drop(session);

        let mut lines = BufReader::new(server).lines();
        assert!(lines.next_line().await.unwrap().is_none());
    }
}

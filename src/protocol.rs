//! TCP transport between the overlay and an out-of-process host.
//!
//! Each bridge event travels as one length-delimited frame holding a JSON
//! document. Frames from the host are validated and discarded.

use std::collections::VecDeque;
use std::net::SocketAddr;

use anyhow::Result;
use bytes::Bytes;
use futures::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use crate::bridge::{accept_inbound, message_type};

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(1024 * 1024) // 1MB
        .new_codec();
    Framed::new(stream, codec)
}

/// Send one JSON payload (whole stream or the write half of a split one).
pub async fn send_to_sink<S>(sink: &mut S, payload: &str) -> Result<()>
where
    S: Sink<Bytes, Error = std::io::Error> + Unpin,
{
    sink.send(Bytes::copy_from_slice(payload.as_bytes())).await?;
    Ok(())
}

/// Receive one raw frame.
pub async fn recv_payload(stream: &mut MessageStream) -> Result<Bytes> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bytes.freeze()),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}

/// 接続前に保持するイベント数の上限
const BACKLOG_LIMIT: usize = 64;

/// `status` / `error` events produced while no host is connected.
///
/// `poseData` is never kept; a host only wants the current pose.
#[derive(Debug, Default)]
struct Backlog {
    pending: VecDeque<String>,
}

impl Backlog {
    fn hold(&mut self, payload: String) {
        if matches!(message_type(payload.as_bytes()).as_deref(), Ok("poseData")) {
            return;
        }
        if self.pending.len() == BACKLOG_LIMIT {
            self.pending.pop_front();
        }
        self.pending.push_back(payload);
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Accepts one host at a time and forwards queued payloads to it.
///
/// While no host is connected, `poseData` is dropped and control events are
/// kept (oldest first out past [`BACKLOG_LIMIT`]) and delivered to the next
/// host before anything else. Once the sending side of `outbound` is gone,
/// returns as soon as nothing is pending; otherwise waits for a host to
/// collect the pending events first.
pub async fn serve_host(listener: TcpListener, mut outbound: UnboundedReceiver<String>) -> Result<()> {
    info!("Host bridge listening on {}", listener.local_addr()?);
    let mut backlog = Backlog::default();
    let mut closed = false;

    loop {
        if closed && backlog.len() == 0 {
            return Ok(());
        }
        let (stream, addr) = if closed {
            info!("Waiting for a host to collect {} pending events", backlog.len());
            listener.accept().await?
        } else {
            tokio::select! {
                accepted = listener.accept() => accepted?,
                payload = outbound.recv() => match payload {
                    Some(payload) => {
                        backlog.hold(payload);
                        continue;
                    }
                    None => {
                        closed = true;
                        continue;
                    }
                },
            }
        };
        stream.set_nodelay(true)?;
        info!("Host connected: {} ({} pending events)", addr, backlog.len());

        match run_session(message_stream(stream), addr, &mut outbound, &mut backlog).await {
            Ok(SessionEnd::Disconnected) => info!("Host disconnected, waiting for next connection..."),
            Ok(SessionEnd::Shutdown) => return Ok(()),
            Err(e) => warn!("Host session error: {e:#}"),
        }
    }
}

enum SessionEnd {
    Disconnected,
    Shutdown,
}

async fn run_session(
    stream: MessageStream,
    addr: SocketAddr,
    outbound: &mut UnboundedReceiver<String>,
    backlog: &mut Backlog,
) -> Result<SessionEnd> {
    let (mut sink, mut reader) = stream.split();

    while let Some(payload) = backlog.pending.pop_front() {
        send_to_sink(&mut sink, &payload).await?;
    }

    loop {
        tokio::select! {
            payload = outbound.recv() => match payload {
                Some(payload) => send_to_sink(&mut sink, &payload).await?,
                None => return Ok(SessionEnd::Shutdown),
            },
            frame = reader.next() => match frame {
                Some(Ok(bytes)) => {
                    debug!("[{addr}] {} bytes from host", bytes.len());
                    accept_inbound(&bytes);
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::Disconnected),
            },
        }
    }
}

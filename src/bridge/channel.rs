//! One-way transports from the overlay to its host.

use std::io::{self, Write};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Error)]
#[error("host channel closed: {0}")]
pub struct ChannelClosed(pub String);

/// Outward message transport. Delivery is fire-and-forget.
pub trait HostChannel {
    fn post(&mut self, payload: &str) -> Result<(), ChannelClosed>;
}

/// Writes one JSON document per line to stdout.
pub struct StdoutChannel {
    out: io::Stdout,
}

impl StdoutChannel {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for StdoutChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl HostChannel for StdoutChannel {
    fn post(&mut self, payload: &str) -> Result<(), ChannelClosed> {
        let mut out = self.out.lock();
        writeln!(out, "{payload}")
            .and_then(|_| out.flush())
            .map_err(|e| ChannelClosed(e.to_string()))
    }
}

/// Hands payloads to a transport task (see [`crate::protocol::serve_host`]).
pub struct QueueChannel {
    tx: UnboundedSender<String>,
}

impl QueueChannel {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl HostChannel for QueueChannel {
    fn post(&mut self, payload: &str) -> Result<(), ChannelClosed> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| ChannelClosed("transport task has exited".into()))
    }
}

/// In-memory channel; keeps every payload in order.
impl HostChannel for Vec<String> {
    fn post(&mut self, payload: &str) -> Result<(), ChannelClosed> {
        self.push(payload.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_channel_forwards_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut channel = QueueChannel::new(tx);
        channel.post("a").unwrap();
        channel.post("b").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(rx.try_recv().unwrap(), "b");
    }

    #[test]
    fn test_queue_channel_reports_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let mut channel = QueueChannel::new(tx);
        assert!(channel.post("lost").is_err());
    }

    #[test]
    fn test_vec_channel() {
        let mut channel: Vec<String> = Vec::new();
        channel.post("x").unwrap();
        assert_eq!(channel, vec!["x".to_string()]);
    }
}

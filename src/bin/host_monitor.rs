//! Host-side monitor for the overlay's TCP bridge.
//!
//! Usage: host_monitor [ADDR]   (default 127.0.0.1:9100)

use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpStream;
use tracing::{error, info, warn};
use tryon_overlay::bridge::BridgeEvent;
use tryon_overlay::protocol::{self, MessageStream};

const DEFAULT_ADDR: &str = "127.0.0.1:9100";
const RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    info!("=== host monitor {} ===", env!("GIT_VERSION"));

    loop {
        match TcpStream::connect(addr.as_str()).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                info!("Connected to {}", addr);
                if let Err(e) = monitor(protocol::message_stream(stream)).await {
                    warn!("{e:#}");
                }
                info!("Disconnected, reconnecting in {}s...", RECONNECT_INTERVAL.as_secs());
            }
            Err(e) => warn!("connect to {} failed: {}", addr, e),
        }
        tokio::time::sleep(RECONNECT_INTERVAL).await;
    }
}

async fn monitor(mut stream: MessageStream) -> Result<()> {
    // poseData は毎フレーム届くので、表示が変わったときだけ出す
    let mut last_pose: Option<String> = None;

    loop {
        let payload = protocol::recv_payload(&mut stream).await?;
        match serde_json::from_slice::<BridgeEvent>(&payload) {
            Ok(BridgeEvent::Status { message }) => info!("[status] {}", message),
            Ok(BridgeEvent::Error { message, detail }) => match detail {
                Some(detail) => error!("[error] {} ({})", message, detail),
                None => error!("[error] {}", message),
            },
            Ok(BridgeEvent::PoseData { landmarks }) => {
                let line = describe_pose(landmarks.len());
                if last_pose.as_deref() != Some(line.as_str()) {
                    info!("{}", line);
                    last_pose = Some(line);
                }
            }
            Err(e) => warn!(
                "unrecognized payload ({}): {}",
                e,
                String::from_utf8_lossy(&payload)
            ),
        }
    }
}

fn describe_pose(count: usize) -> String {
    if count > 0 {
        format!("Tracking {count} points.")
    } else {
        "Searching for body...".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_pose() {
        assert_eq!(describe_pose(17), "Tracking 17 points.");
        assert_eq!(describe_pose(0), "Searching for body...");
    }
}

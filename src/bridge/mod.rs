//! Events between the rendering core and its hosting surface.
//!
//! Outward traffic is a closed set of three JSON shapes:
//!
//! ```text
//! { "type": "poseData", "landmarks": [ {x, y, visibility}, ... ] }
//! { "type": "status",   "message": string }
//! { "type": "error",    "message": string, "error"?: string }
//! ```
//!
//! Inbound traffic is reserved: messages are validated, logged and ignored.

pub mod channel;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

pub use channel::{ChannelClosed, HostChannel, QueueChannel, StdoutChannel};

use crate::error::PipelineError;
use crate::pose::{Landmark, LandmarkSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeEvent {
    Status {
        message: String,
    },
    Error {
        message: String,
        #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    PoseData {
        landmarks: Vec<Landmark>,
    },
}

/// Outcome of validating a host-originated message. Neither case is acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Well-formed, but no command of this type exists.
    Unhandled { kind: String },
    Malformed { reason: String },
}

/// `type` tag of a JSON message, or why there is none.
pub fn message_type(raw: &[u8]) -> Result<String, String> {
    let value: Value = serde_json::from_slice(raw).map_err(|e| e.to_string())?;
    value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "expected an object with a string \"type\" field".to_string())
}

pub fn parse_inbound(raw: &[u8]) -> Inbound {
    match message_type(raw) {
        Ok(kind) => Inbound::Unhandled { kind },
        Err(reason) => Inbound::Malformed { reason },
    }
}

/// Validates and logs one host message without acting on it.
pub fn accept_inbound(raw: &[u8]) -> Inbound {
    let inbound = parse_inbound(raw);
    match &inbound {
        Inbound::Unhandled { kind } => debug!("ignoring host command {kind:?}"),
        Inbound::Malformed { reason } => debug!("ignoring malformed host message: {reason}"),
    }
    inbound
}

pub struct HostBridge<C> {
    channel: C,
    sent: u64,
    failed: u64,
}

impl<C: HostChannel> HostBridge<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            sent: 0,
            failed: 0,
        }
    }

    /// Sends one event. Failures are logged and counted, never retried.
    pub fn emit(&mut self, event: &BridgeEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!("dropping unserializable bridge event: {e}");
                self.failed += 1;
                return;
            }
        };
        match self.channel.post(&payload) {
            Ok(()) => self.sent += 1,
            Err(e) => {
                // 最初の失敗だけ警告、以降は debug
                if self.failed == 0 {
                    warn!("{e}");
                } else {
                    debug!("{e}");
                }
                self.failed += 1;
            }
        }
    }

    pub fn status(&mut self, message: &str) {
        info!("[status] {message}");
        self.emit(&BridgeEvent::Status {
            message: message.to_string(),
        });
    }

    pub fn error(&mut self, message: &str, detail: Option<String>) {
        match &detail {
            Some(d) => warn!("[error] {message}: {d}"),
            None => warn!("[error] {message}"),
        }
        self.emit(&BridgeEvent::Error {
            message: message.to_string(),
            detail,
        });
    }

    /// Classified pipeline failure → `error` event.
    pub fn report(&mut self, err: &PipelineError) {
        self.error(&err.to_string(), err.detail());
    }

    /// Per-frame landmark export; an empty set is sent as an empty list.
    pub fn pose_data(&mut self, landmarks: &LandmarkSet) {
        trace!(count = landmarks.len(), "poseData");
        self.emit(&BridgeEvent::PoseData {
            landmarks: landmarks.as_slice().to_vec(),
        });
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraError;
    use crate::pose::LandmarkIndex;
    use serde_json::json;

    fn sent_json(bridge: &HostBridge<Vec<String>>) -> Vec<Value> {
        bridge
            .channel()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    struct BrokenChannel;

    impl HostChannel for BrokenChannel {
        fn post(&mut self, _payload: &str) -> Result<(), ChannelClosed> {
            Err(ChannelClosed("gone".into()))
        }
    }

    #[test]
    fn test_status_shape() {
        let mut bridge = HostBridge::new(Vec::new());
        bridge.status("Camera playing");
        assert_eq!(sent_json(&bridge), vec![json!({"type": "status", "message": "Camera playing"})]);
    }

    #[test]
    fn test_error_shape_with_and_without_detail() {
        let mut bridge = HostBridge::new(Vec::new());
        bridge.error("Camera blocked", Some("NotAllowedError".into()));
        bridge.error("Model missing", None);
        assert_eq!(
            sent_json(&bridge),
            vec![
                json!({"type": "error", "message": "Camera blocked", "error": "NotAllowedError"}),
                json!({"type": "error", "message": "Model missing"}),
            ]
        );
    }

    #[test]
    fn test_report_uses_error_classification() {
        let mut bridge = HostBridge::new(Vec::new());
        bridge.report(&PipelineError::from(CameraError::PermissionDenied("denied by user".into())));
        assert_eq!(
            sent_json(&bridge),
            vec![json!({"type": "error", "message": "camera access was denied", "error": "denied by user"})]
        );
    }

    #[test]
    fn test_pose_data_shape_and_count() {
        let mut bridge = HostBridge::new(Vec::new());
        let set = LandmarkSet::from_array([Landmark::new(0.5, 0.25, 1.0); LandmarkIndex::COUNT]);
        bridge.pose_data(&set);

        let events = sent_json(&bridge);
        assert_eq!(events[0]["type"], "poseData");
        let landmarks = events[0]["landmarks"].as_array().unwrap();
        assert_eq!(landmarks.len(), LandmarkIndex::COUNT);
        assert_eq!(landmarks[0], json!({"x": 0.5, "y": 0.25, "visibility": 1.0}));
    }

    #[test]
    fn test_empty_pose_data() {
        let mut bridge = HostBridge::new(Vec::new());
        bridge.pose_data(&LandmarkSet::empty());
        assert_eq!(sent_json(&bridge), vec![json!({"type": "poseData", "landmarks": []})]);
    }

    #[test]
    fn test_events_round_trip_through_json() {
        let event: BridgeEvent =
            serde_json::from_str(r#"{"type":"error","message":"m","error":"d"}"#).unwrap();
        assert_eq!(
            event,
            BridgeEvent::Error {
                message: "m".into(),
                detail: Some("d".into())
            }
        );
        let event: BridgeEvent = serde_json::from_str(r#"{"type":"poseData","landmarks":[]}"#).unwrap();
        assert_eq!(event, BridgeEvent::PoseData { landmarks: vec![] });
        assert!(serde_json::from_str::<BridgeEvent>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn test_failed_posts_are_counted_not_retried() {
        let mut bridge = HostBridge::new(BrokenChannel);
        bridge.status("a");
        bridge.pose_data(&LandmarkSet::empty());
        assert_eq!(bridge.sent(), 0);
        assert_eq!(bridge.failed(), 2);
    }

    #[test]
    fn test_inbound_is_accepted_and_ignored() {
        assert_eq!(
            accept_inbound(br#"{"type":"changeGarment","id":3}"#),
            Inbound::Unhandled {
                kind: "changeGarment".into()
            }
        );
        assert!(matches!(accept_inbound(b"not json"), Inbound::Malformed { .. }));
        assert!(matches!(accept_inbound(br#"{"kind":"x"}"#), Inbound::Malformed { .. }));
        assert!(matches!(accept_inbound(br#"["status"]"#), Inbound::Malformed { .. }));
        assert!(matches!(accept_inbound(br#"{"type":7}"#), Inbound::Malformed { .. }));
        assert!(matches!(accept_inbound(&[0xff, 0xfe]), Inbound::Malformed { .. }));
    }

    #[test]
    fn test_message_type_of_outbound_events() {
        let mut bridge = HostBridge::new(Vec::new());
        bridge.status("a");
        bridge.pose_data(&LandmarkSet::empty());
        let kinds: Vec<_> = bridge
            .channel()
            .iter()
            .map(|p| message_type(p.as_bytes()).unwrap())
            .collect();
        assert_eq!(kinds, vec!["status", "poseData"]);
    }
}

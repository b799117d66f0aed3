//! Message bus transport
//!
//! The printer speaks MQTT: it publishes reports on
//! `device/<serial>/report` and accepts commands on
//! `device/<serial>/request`. Establishing the connection (TLS, auth) is
//! the job of whoever owns the session; this module only defines the seam
//! the controller publishes through.

use bambukit_core::TransportError;
use serde_json::Value;
use tokio::sync::mpsc;

/// Topic the printer publishes reports on
pub fn report_topic(serial: &str) -> String {
    format!("device/{}/report", serial)
}

/// Topic the printer accepts commands on
pub fn request_topic(serial: &str) -> String {
    format!("device/{}/request", serial)
}

/// Outbound side of a printer connection
///
/// `publish` hands a document over and returns; delivery is the
/// transport's concern.
pub trait Transport: Send + Sync {
    /// Publish a JSON document on a topic
    fn publish(&self, topic: &str, document: Value) -> Result<(), TransportError>;
}

/// A message waiting to be written to the broker
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Destination topic
    pub topic: String,
    /// Encoded JSON payload
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    /// Decode the payload back into JSON
    pub fn document(&self) -> Result<Value, TransportError> {
        serde_json::from_slice(&self.payload).map_err(|e| TransportError::Encode {
            reason: e.to_string(),
        })
    }
}

/// Transport that queues messages on a tokio channel
///
/// The receiving end is drained by the task that owns the MQTT client.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its messages arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Transport for ChannelTransport {
    fn publish(&self, topic: &str, document: Value) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(&document).map_err(|e| TransportError::Encode {
            reason: e.to_string(),
        })?;
        self.sender
            .send(OutboundMessage {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| TransportError::ChannelClosed)
    }
}

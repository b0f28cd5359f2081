//! In-process transport with an optional simulated mixer
//!
//! Every sent frame is recorded with the (tokio) time it was sent. When a
//! simulated device is attached, parameter requests are answered from its
//! parameter table and parameter changes are stored into it, the way the
//! desk behaves for a remote controller.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{FrameHandler, Transport, TransportError};
use crate::protocol::{self, format_hex, Parameter, Value};

/// A frame handed to [`Transport::send`]
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub at: Instant,
    pub bytes: Vec<u8>,
}

/// Loopback transport for tests and offline use
#[derive(Default)]
pub struct MemoryTransport {
    handler: Mutex<Option<FrameHandler>>,
    sent: Mutex<Vec<SentFrame>>,
    /// Simulated desk state; `None` means nothing answers requests
    device: Option<Mutex<HashMap<Parameter, Value>>>,
}

impl MemoryTransport {
    /// Transport with no device behind it
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport backed by a simulated mixer holding `params`
    ///
    /// Requests for parameters missing from the table get no reply.
    pub fn with_device(params: impl IntoIterator<Item = (Parameter, Value)>) -> Self {
        Self {
            device: Some(Mutex::new(params.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Deliver a raw frame as if it had been received from the port
    pub fn inject(&self, frame: &[u8]) {
        trace!("inject <- {}", format_hex(frame));
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(frame);
        }
    }

    /// Simulate an operator moving a control on the desk
    pub fn touch(&self, param: Parameter, value: Value) {
        if let Some(device) = &self.device {
            device.lock().insert(param, value);
        }
        self.inject(&protocol::encode_param_change(param, value));
    }

    /// Current value held by the simulated device
    pub fn device_value(&self, param: Parameter) -> Option<Value> {
        self.device
            .as_ref()
            .and_then(|device| device.lock().get(&param).copied())
    }

    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.sent.lock().clone()
    }

    /// Parameter changes sent so far, with their send time
    pub fn sent_changes(&self) -> Vec<(Instant, Parameter, Value)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| {
                protocol::decode(&frame.bytes)
                    .ok()
                    .map(|(param, value)| (frame.at, param, value))
            })
            .collect()
    }

    /// Parameter requests sent so far
    pub fn sent_requests(&self) -> Vec<Parameter> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| protocol::decode_request(&frame.bytes).ok())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    fn reply_for(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let device = self.device.as_ref()?;

        if let Ok(param) = protocol::decode_request(frame) {
            let value = device.lock().get(&param).copied();
            return match value {
                Some(value) => Some(protocol::encode_param_change(param, value).to_vec()),
                None => {
                    debug!("Simulated device has no value for {}", param);
                    None
                }
            };
        }

        if let Ok((param, value)) = protocol::decode(frame) {
            device.lock().insert(param, value);
        }
        None
    }
}

impl Transport for MemoryTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().push(SentFrame {
            at: Instant::now(),
            bytes: frame.to_vec(),
        });

        if let Some(reply) = self.reply_for(frame) {
            self.inject(&reply);
        }
        Ok(())
    }

    fn set_frame_handler(&self, handler: FrameHandler) {
        *self.handler.lock() = Some(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn capture(transport: &MemoryTransport) -> Arc<Mutex<Vec<Vec<u8>>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        transport.set_frame_handler(Arc::new(move |data: &[u8]| sink.lock().push(data.to_vec())));
        received
    }

    #[test]
    fn test_records_sent_frames() {
        let transport = MemoryTransport::new();
        let param = Parameter::new(51, 0, 1);
        transport.send(&protocol::encode_param_change(param, 7)).unwrap();
        transport.send(&protocol::encode_param_request(param)).unwrap();

        assert_eq!(transport.sent_frames().len(), 2);
        assert_eq!(transport.sent_changes().len(), 1);
        assert_eq!(transport.sent_changes()[0].2, 7);
        assert_eq!(transport.sent_requests(), vec![param]);

        transport.clear_sent();
        assert!(transport.sent_frames().is_empty());
    }

    #[test]
    fn test_no_device_never_replies() {
        let transport = MemoryTransport::new();
        let received = capture(&transport);
        transport
            .send(&protocol::encode_param_request(Parameter::new(1, 0, 0)))
            .unwrap();
        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_device_answers_requests_and_stores_changes() {
        let param = Parameter::new(51, 0, 10);
        let transport = MemoryTransport::with_device([(param, -100)]);
        let received = capture(&transport);

        transport.send(&protocol::encode_param_request(param)).unwrap();
        assert_eq!(
            received.lock().as_slice(),
            &[protocol::encode_param_change(param, -100).to_vec()]
        );

        // Writes are stored silently
        transport.send(&protocol::encode_param_change(param, 5)).unwrap();
        assert_eq!(received.lock().len(), 1);
        assert_eq!(transport.device_value(param), Some(5));
    }

    #[test]
    fn test_device_ignores_unknown_parameter() {
        let transport = MemoryTransport::with_device([]);
        let received = capture(&transport);
        transport
            .send(&protocol::encode_param_request(Parameter::new(9, 9, 9)))
            .unwrap();
        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_touch_injects_change() {
        let param = Parameter::new(51, 0, 2);
        let transport = MemoryTransport::with_device([]);
        let received = capture(&transport);

        transport.touch(param, 42);
        assert_eq!(transport.device_value(param), Some(42));
        assert_eq!(
            protocol::decode(&received.lock()[0]).unwrap(),
            (param, 42)
        );
    }
}

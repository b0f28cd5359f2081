//! Remote parameter control for an LS9 console
//!
//! [`Mixer`] is the caller-facing engine. Outbound operations encode frames
//! and hand them to the [`Transport`]; inbound frames are queued by the
//! transport's handler and processed by a single delivery task, one frame at
//! a time and in arrival order:
//!
//! ```text
//! transport handler ──► mpsc ──► delivery task ──► decode
//!                                                   ├─► listeners (global, then per-parameter)
//!                                                   ├─► "next touched" slot
//!                                                   └─► pending value slot
//! ```
//!
//! Decoding failures never reach callers: the frame is logged and dropped.
//! When the delivery task stops (transport dropped or a listener panicked),
//! pending and future requests fail with [`Error::Closed`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::correlation::{CorrelationTable, Pending};
use crate::dispatcher::{Dispatcher, Listener};
use crate::error::{Error, Result};
use crate::fade::{FadeConfig, FadeTask};
use crate::protocol::{self, format_hex, Parameter, Value, VALUE_MAX, VALUE_MIN};
use crate::transport::Transport;

/// Element holding the six-character channel name, split over indices 0 and 1
pub const CHANNEL_NAME_ELEMENT: u16 = 148;

/// State touched by the delivery task
#[derive(Default)]
struct Shared {
    dispatcher: Dispatcher,
    correlation: CorrelationTable,
}

impl Shared {
    fn on_frame(&self, data: &[u8]) -> bool {
        match protocol::decode(data) {
            Ok((param, value)) => {
                debug!("Change {} = {}", param, value);
                self.dispatcher.dispatch(param, value);
                self.correlation.resolve_touched(param);
                self.correlation.resolve_value(param, value);
                true
            }
            Err(e) => {
                debug!("Dropping frame [{}]: {}", format_hex(data), e);
                false
            }
        }
    }
}

/// Closes the correlation table when the delivery task ends, including by panic
struct CloseOnExit(Arc<Shared>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("Frame delivery aborted by a panicking listener");
        }
        self.0.correlation.close();
    }
}

fn check_range(value: Value) -> Result<()> {
    if (VALUE_MIN..=VALUE_MAX).contains(&value) {
        Ok(())
    } else {
        Err(Error::ValueOutOfRange(value))
    }
}

/// Handle to a remote mixer
///
/// Cheap to clone; all clones share the same listeners and pending requests.
#[derive(Clone)]
pub struct Mixer {
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    fade: FadeConfig,
}

impl Mixer {
    /// Attach to `transport` and start the frame delivery task
    ///
    /// Must be called from within a Tokio runtime. The delivery task stops
    /// once the transport (and with it the registered handler) is dropped.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let shared = Arc::new(Shared::default());
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        transport.set_frame_handler(Arc::new(move |data: &[u8]| {
            // Receiver is gone only after the delivery task stopped
            let _ = frame_tx.send(data.to_vec());
        }));

        let delivery = CloseOnExit(shared.clone());
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                delivery.0.on_frame(&frame);
            }
            info!("Frame delivery stopped");
        });

        Self {
            transport,
            shared,
            fade: FadeConfig::default(),
        }
    }

    pub fn with_fade_config(mut self, fade: FadeConfig) -> Self {
        self.fade = fade;
        self
    }

    /// Write a value (fire-and-forget)
    ///
    /// Values outside the 35-bit wire range are rejected, never truncated.
    pub fn set(&self, param: Parameter, value: Value) -> Result<()> {
        check_range(value)?;
        self.transport
            .send(&protocol::encode_param_change(param, value))?;
        Ok(())
    }

    /// Create or attach to the pending slot for `param` and send a request
    ///
    /// The request frame is sent on every call, even when attaching to an
    /// existing slot.
    pub fn request_value(&self, param: Parameter) -> Result<Pending<Value>> {
        let pending = self.shared.correlation.request_value(param)?;
        debug!("Requesting {}", param);
        self.transport
            .send(&protocol::encode_param_request(param))?;
        Ok(pending)
    }

    /// Read a value, waiting at most `wait` for the mixer's answer
    pub async fn get(&self, param: Parameter, wait: Duration) -> Result<Value> {
        let pending = self.request_value(param)?;
        timeout(wait, pending.wait())
            .await
            .map_err(|_| Error::Timeout {
                what: format!("value of {}", param),
                after: wait,
            })?
    }

    /// Ramp `param` from its current value to `target` over `ramp`
    ///
    /// Reads the start value first (failing if that read times out), then
    /// returns as soon as the ramp task is spawned.
    pub async fn fade(
        &self,
        param: Parameter,
        target: Value,
        ramp: Duration,
        read_timeout: Duration,
    ) -> Result<()> {
        check_range(target)?;
        let start = self.get(param, read_timeout).await?;

        let task = FadeTask {
            param,
            start,
            target,
            duration: ramp,
            tick: self.fade.tick,
        };
        let mixer = self.clone();
        tokio::spawn(task.run(move |param, value| mixer.set(param, value)));

        Ok(())
    }

    /// Wait for the next change notification from any source
    ///
    /// Concurrent callers share the same slot and see the same parameter.
    pub async fn next_param_touched(&self, wait: Option<Duration>) -> Result<Parameter> {
        let pending = self.shared.correlation.await_next_touched()?;
        match wait {
            Some(wait) => timeout(wait, pending.wait())
                .await
                .map_err(|_| Error::Timeout {
                    what: "next touched parameter".to_string(),
                    after: wait,
                })?,
            None => pending.wait().await,
        }
    }

    /// Read the six-character name of an input channel
    ///
    /// Both halves of the name are requested together and must arrive within
    /// the same deadline.
    pub async fn channel_name(&self, channel: u16, wait: Duration) -> Result<String> {
        let deadline = Instant::now() + wait;
        let head = self.request_value(Parameter::new(CHANNEL_NAME_ELEMENT, 0, channel))?;
        let tail = self.request_value(Parameter::new(CHANNEL_NAME_ELEMENT, 1, channel))?;

        let expired = |_| Error::Timeout {
            what: format!("name of channel {}", channel),
            after: wait,
        };
        let head = timeout_at(deadline, head.wait()).await.map_err(expired)??;
        let tail = timeout_at(deadline, tail.wait()).await.map_err(expired)??;

        Ok(decode_channel_name(head, tail))
    }

    /// Register a listener for every decoded change
    pub fn add_global_listener<F>(&self, listener: F)
    where
        F: Fn(Parameter, Value) + Send + Sync + 'static,
    {
        self.shared
            .dispatcher
            .add_global_listener(Arc::new(listener) as Listener);
    }

    /// Register a listener for changes of `param` only
    pub fn add_param_listener<F>(&self, param: Parameter, listener: F)
    where
        F: Fn(Parameter, Value) + Send + Sync + 'static,
    {
        self.shared
            .dispatcher
            .add_param_listener(param, Arc::new(listener) as Listener);
    }
}

/// Channel names are packed big-endian: four characters in the first value,
/// two in the upper bytes of the second.
fn decode_channel_name(head: Value, tail: Value) -> String {
    let head = (head as u32).to_be_bytes();
    let tail = (tail as u32).to_be_bytes();

    head.iter()
        .chain(&tail[..2])
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end_matches(|c: char| c == '\0' || c == ' ')
        .to_string()
}

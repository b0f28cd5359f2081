//! Byte-frame transports
//!
//! The mixer engine only needs to send opaque frames and to be handed every
//! received frame. [`MidiTransport`] talks to real hardware through midir,
//! [`MemoryTransport`] keeps everything in-process.

pub mod memory;
pub mod midi;

use std::sync::Arc;

pub use memory::MemoryTransport;
pub use midi::MidiTransport;

/// Callback invoked once per received frame with the raw bytes
pub type FrameHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Errors from opening or writing to a transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("MIDI input port matching '{0}' not found")]
    InputPortNotFound(String),

    #[error("MIDI output port matching '{0}' not found")]
    OutputPortNotFound(String),

    #[error("failed to initialise MIDI: {0}")]
    Init(#[from] midir::InitError),

    #[error("failed to connect to MIDI port: {0}")]
    Connect(String),

    #[error("failed to send MIDI message: {0}")]
    Send(#[from] midir::SendError),

    #[error("transport closed")]
    Closed,
}

/// Bidirectional frame channel to the mixer
///
/// All methods take `&self`: a transport is shared between callers, the
/// fade tasks and the delivery side, so implementations use interior
/// mutability and must tolerate concurrent `send` calls.
pub trait Transport: Send + Sync {
    /// Send one complete frame
    fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Register the handler for received frames, replacing any previous one
    ///
    /// Implementations call the handler from a single context, one frame at a
    /// time, in arrival order.
    fn set_frame_handler(&self, handler: FrameHandler);
}

//! LS9 Remote - parameter control for the Yamaha LS9 over MIDI SysEx
//!
//! Read and write mixer parameters, get notified when they change, and fade
//! them over time. See [`Mixer`] for the caller-facing API.

pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod fade;
pub mod mixer;
pub mod protocol;
pub mod transport;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use fade::FadeConfig;
pub use mixer::Mixer;
pub use protocol::{DecodeError, Parameter, Value};
pub use transport::{MemoryTransport, MidiTransport, Transport, TransportError};

//! midir-backed transport for a physical (or virtual) MIDI port pair

use midir::{Ignore, MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use super::{FrameHandler, Transport, TransportError};
use crate::protocol::format_hex;

/// Find a port whose name contains `pattern` (case-insensitive)
pub fn find_port_by_substring<T: MidiIO>(io: &T, pattern: &str) -> Option<(T::Port, String)> {
    let pattern = pattern.to_lowercase();
    io.ports().into_iter().find_map(|port| {
        let name = io.port_name(&port).ok()?;
        if name.to_lowercase().contains(&pattern) {
            debug!("Found port '{}' matching pattern '{}'", name, pattern);
            Some((port, name))
        } else {
            None
        }
    })
}

/// Names of all available MIDI ports
#[derive(Debug, Clone, Default)]
pub struct PortList {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// MIDI transport over an input/output port pair with the same name
pub struct MidiTransport {
    /// Held only to keep the input callback alive
    _input: Mutex<MidiInputConnection<()>>,
    output: Mutex<MidiOutputConnection>,
    handler: Arc<Mutex<Option<FrameHandler>>>,
    port_name: String,
}

impl MidiTransport {
    /// List available MIDI ports
    pub fn list_ports(client_name: &str) -> Result<PortList, TransportError> {
        let midi_in = MidiInput::new(&format!("{}-Scanner", client_name))?;
        let midi_out = MidiOutput::new(&format!("{}-Scanner", client_name))?;

        let inputs = midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect();
        let outputs = midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect();

        Ok(PortList { inputs, outputs })
    }

    /// Open the input and output ports whose names contain `port_name`
    pub fn open(client_name: &str, port_name: &str) -> Result<Self, TransportError> {
        info!("Opening MIDI port matching '{}'", port_name);

        let mut midi_in = MidiInput::new(&format!("{}-Input", client_name))?;
        // SysEx is filtered out unless explicitly requested
        midi_in.ignore(Ignore::None);

        let (in_port, in_name) = find_port_by_substring(&midi_in, port_name)
            .ok_or_else(|| TransportError::InputPortNotFound(port_name.to_string()))?;

        let handler: Arc<Mutex<Option<FrameHandler>>> = Arc::new(Mutex::new(None));
        let callback_handler = handler.clone();

        let input = midi_in
            .connect(
                &in_port,
                client_name,
                move |_timestamp, data, _| {
                    debug!("RX <- {}", format_hex(data));
                    let handler = callback_handler.lock().clone();
                    if let Some(handler) = handler {
                        handler(data);
                    }
                },
                (),
            )
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!("Connected to input port: {}", in_name);

        let midi_out = MidiOutput::new(&format!("{}-Output", client_name))?;
        let (out_port, out_name) = find_port_by_substring(&midi_out, port_name)
            .ok_or_else(|| TransportError::OutputPortNotFound(port_name.to_string()))?;
        let output = midi_out
            .connect(&out_port, client_name)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!("Connected to output port: {}", out_name);

        Ok(Self {
            _input: Mutex::new(input),
            output: Mutex::new(output),
            handler,
            port_name: port_name.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Transport for MidiTransport {
    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.output.lock().send(frame)?;
        debug!("TX -> {}", format_hex(frame));
        Ok(())
    }

    fn set_frame_handler(&self, handler: FrameHandler) {
        *self.handler.lock() = Some(handler);
    }
}

//! MIDI Engine
//!
//! Connects to the Magicstomp's MIDI ports. Uses midir for cross-platform
//! MIDI access; received SysEx frames are pushed from the driver callback
//! into an rtrb ring buffer, and outbound frames are written straight to the
//! output connection.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use super::channels::{InboundSender, InboundSysEx};
use super::transport::{Transport, TransportError};
use crate::sysex::{HexBytes, SYSEX_START};

/// Default client name announced to the MIDI system.
pub const DEFAULT_CLIENT_NAME: &str = "Magicstomp Editor";

/// Default port pattern; alternatives are separated by `|`.
pub const DEFAULT_PORT_PATTERN: &str = "UB99|Magicstomp";

/// Which ports to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiSettings {
    /// Client name announced to the MIDI system.
    pub client_name: String,
    /// Pattern matched against input port names.
    pub input_port: String,
    /// Pattern matched against output port names.
    pub output_port: String,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            input_port: DEFAULT_PORT_PATTERN.to_string(),
            output_port: DEFAULT_PORT_PATTERN.to_string(),
        }
    }
}

/// Names of the ports currently visible to the MIDI system.
#[derive(Debug, Clone, Default)]
pub struct MidiPorts {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Error type for MIDI operations.
#[derive(Debug)]
pub enum MidiError {
    /// Failed to initialize MIDI subsystem.
    InitError(String),
    /// Failed to connect to a port.
    ConnectionError(String),
    /// No port matched the pattern.
    DeviceNotFound(String),
}

impl std::fmt::Display for MidiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MidiError::InitError(s) => write!(f, "MIDI init error: {}", s),
            MidiError::ConnectionError(s) => write!(f, "MIDI connection error: {}", s),
            MidiError::DeviceNotFound(pattern) => {
                write!(f, "No MIDI port matching \"{}\"", pattern)
            }
        }
    }
}

impl std::error::Error for MidiError {}

/// Find the first port whose name contains one of the `|` separated
/// alternatives, case-insensitively. Alternatives are tried in order.
pub fn find_port(names: &[String], pattern: &str) -> Option<usize> {
    let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    pattern
        .split('|')
        .map(|alt| alt.trim().to_lowercase())
        .filter(|alt| !alt.is_empty())
        .find_map(|alt| lowered.iter().position(|name| name.contains(&alt)))
}

/// List input and output port names.
pub fn list_ports(client_name: &str) -> Result<MidiPorts, MidiError> {
    let midi_in = MidiInput::new(client_name).map_err(|e| MidiError::InitError(e.to_string()))?;
    let midi_out =
        MidiOutput::new(client_name).map_err(|e| MidiError::InitError(e.to_string()))?;

    let inputs = midi_in
        .ports()
        .iter()
        .map(|p| midi_in.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
        .collect();
    let outputs = midi_out
        .ports()
        .iter()
        .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
        .collect();
    Ok(MidiPorts { inputs, outputs })
}

/// Open input and output connections to the device.
pub struct MidiEngine {
    input: Option<MidiInputConnection<()>>,
    output: Option<MidiOutputConnection>,
    input_name: String,
    output_name: String,
}

impl MidiEngine {
    /// Connect to the ports matching `settings`. Inbound SysEx frames are
    /// pushed into `inbound`; anything else is ignored.
    pub fn connect(settings: &MidiSettings, mut inbound: InboundSender) -> Result<Self, MidiError> {
        let mut midi_in = MidiInput::new(&settings.client_name)
            .map_err(|e| MidiError::InitError(e.to_string()))?;
        // SysEx is filtered out by default
        midi_in.ignore(Ignore::None);
        let midi_out = MidiOutput::new(&settings.client_name)
            .map_err(|e| MidiError::InitError(e.to_string()))?;

        let in_ports = midi_in.ports();
        let in_names: Vec<String> = in_ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
            .collect();
        let in_index = find_port(&in_names, &settings.input_port)
            .ok_or_else(|| MidiError::DeviceNotFound(settings.input_port.clone()))?;

        let out_ports = midi_out.ports();
        let out_names: Vec<String> = out_ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
            .collect();
        let out_index = find_port(&out_names, &settings.output_port)
            .ok_or_else(|| MidiError::DeviceNotFound(settings.output_port.clone()))?;

        let output = midi_out
            .connect(&out_ports[out_index], "magicstomp-out")
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let input = midi_in
            .connect(
                &in_ports[in_index],
                "magicstomp-in",
                move |timestamp_us, data, _| {
                    if data.first() != Some(&SYSEX_START) {
                        return;
                    }
                    let frame = InboundSysEx {
                        bytes: data.to_vec(),
                        timestamp_us,
                    };
                    if inbound.push(frame).is_err() {
                        log::warn!(target: "midi", "Inbound buffer full, frame dropped");
                    }
                },
                (),
            )
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        log::info!(
            target: "midi",
            "Connected: in \"{}\", out \"{}\"",
            in_names[in_index],
            out_names[out_index]
        );

        Ok(Self {
            input: Some(input),
            output: Some(output),
            input_name: in_names[in_index].clone(),
            output_name: out_names[out_index].clone(),
        })
    }

    pub fn input_port_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_port_name(&self) -> &str {
        &self.output_name
    }

    /// Check if both connections are open.
    pub fn is_connected(&self) -> bool {
        self.input.is_some() && self.output.is_some()
    }

    /// Close both connections.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.input.take() {
            connection.close();
        }
        if let Some(connection) = self.output.take() {
            connection.close();
            log::info!(target: "midi", "Disconnected");
        }
    }
}

impl Transport for MidiEngine {
    fn send_sysex(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let output = self.output.as_mut().ok_or(TransportError::NotConnected)?;
        output.send(frame).map_err(|e| {
            log::debug!(target: "midi", "Failed frame: {}", HexBytes(frame));
            TransportError::SendFailed(e.to_string())
        })
    }
}

impl Drop for MidiEngine {
    fn drop(&mut self) {
        self.disconnect();
    }
}

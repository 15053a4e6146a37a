//! MIDI input via midir.
//!
//! The midir callback runs on the driver's thread; it only decodes packets
//! and forwards note-ons into a channel, so the consumer sees a plain
//! ordered stream of [`NoteEvent`]s.

use crate::errors::{CarillonError, Result};
use crate::midi::{select_device, MidiDeviceInfo, MidiMessage, NoteEvent};
use crossbeam_channel::{unbounded, Receiver, Sender};
use midir::{Ignore, MidiInput, MidiInputConnection};

/// MIDI input manager.
///
/// Owns one device connection. Dropping the manager (or calling
/// [`close`](Self::close)) drops the connection and with it the only
/// sender, which ends the event stream.
pub struct MidiInputManager {
    /// Cloned into the connection callback; dropped once a device is open
    message_tx: Option<Sender<NoteEvent>>,
    connection: Option<MidiInputConnection<()>>,
}

impl MidiInputManager {
    /// Create a new MIDI input manager and the receiving end of its stream.
    pub fn new() -> (Self, Receiver<NoteEvent>) {
        let (tx, rx) = unbounded();
        (
            Self {
                message_tx: Some(tx),
                connection: None,
            },
            rx,
        )
    }

    /// List available MIDI input devices.
    pub fn list_devices() -> Result<Vec<MidiDeviceInfo>> {
        let midi_in = MidiInput::new("carillon-list")
            .map_err(|e| CarillonError::Midi(format!("Failed to create MIDI input: {}", e)))?;

        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| MidiDeviceInfo {
                name: midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index)),
                port_index: index,
            })
            .collect())
    }

    /// Open the first MIDI input whose name contains `name` (case-insensitive).
    pub fn open_by_name(&mut self, name: &str) -> Result<MidiDeviceInfo> {
        let devices = Self::list_devices()?;
        let device = select_device(&devices, name)?;
        self.open_by_index(device.port_index)
    }

    /// Open a MIDI input device by port index.
    pub fn open_by_index(&mut self, port_index: usize) -> Result<MidiDeviceInfo> {
        if self.connection.is_some() {
            return Err(CarillonError::Midi("A MIDI device is already open".to_string()));
        }
        // Cloned so a failed open leaves the manager usable
        let tx = self
            .message_tx
            .clone()
            .ok_or_else(|| CarillonError::Midi("MIDI input was closed".to_string()))?;

        let mut midi_in = MidiInput::new("carillon")
            .map_err(|e| CarillonError::Midi(format!("Failed to create MIDI input: {}", e)))?;
        midi_in.ignore(Ignore::All);

        let ports = midi_in.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| CarillonError::Midi(format!("Invalid MIDI port index: {}", port_index)))?;

        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| format!("Unknown Device {}", port_index));

        let connection = midi_in
            .connect(
                port,
                "carillon-input",
                move |timestamp, bytes, _| forward_packet(&tx, timestamp, bytes),
                (),
            )
            .map_err(|e| CarillonError::Midi(format!("Failed to connect to MIDI device: {}", e)))?;

        let device_info = MidiDeviceInfo { name, port_index };
        log::info!(
            "Connected to MIDI device: {} (port {})",
            device_info.name,
            port_index
        );

        self.connection = Some(connection);
        self.message_tx = None;
        Ok(device_info)
    }

    /// Close the connection, ending the event stream.
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
        self.message_tx = None;
    }
}

/// Decode one raw packet and pass note-ons downstream.
fn forward_packet(tx: &Sender<NoteEvent>, timestamp: u64, bytes: &[u8]) {
    log::debug!("[MIDI RAW] timestamp={} bytes={:?}", timestamp, bytes);
    match MidiMessage::from_bytes(bytes, timestamp) {
        Some(MidiMessage::NoteOn { note, velocity, .. }) => {
            if tx.send(NoteEvent::new(note, velocity)).is_err() {
                log::debug!("[MIDI] Event stream closed, dropping note {}", note);
            }
        }
        Some(other) => log::debug!("[MIDI] Ignoring {:?}", other),
        None => {}
    }
}

impl Drop for MidiInputManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only_note_ons() {
        let (tx, rx) = unbounded();
        forward_packet(&tx, 0, &[0x90, 69, 127]);
        forward_packet(&tx, 1, &[0x80, 69, 0]);
        forward_packet(&tx, 2, &[0x90, 69, 0]);
        forward_packet(&tx, 3, &[0xB0, 7, 100]);
        forward_packet(&tx, 4, &[0x91, 60, 64]);
        drop(tx);

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events, vec![NoteEvent::new(69, 127), NoteEvent::new(60, 64)]);
    }

    #[test]
    fn test_failed_open_keeps_manager_usable() {
        let (mut manager, _rx) = MidiInputManager::new();
        for _ in 0..2 {
            match manager.open_by_index(usize::MAX) {
                Err(CarillonError::Midi(msg)) => {
                    assert!(!msg.contains("already open"), "{}", msg)
                }
                other => panic!("Expected MIDI error, got {:?}", other.map(|d| d.name)),
            }
        }
        assert!(manager.message_tx.is_some());
        assert!(manager.connection.is_none());
    }

    #[test]
    fn test_close_ends_stream() {
        let (mut manager, rx) = MidiInputManager::new();
        manager.close();
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_forward_after_close_is_harmless() {
        let (tx, rx) = unbounded();
        drop(rx);
        forward_packet(&tx, 0, &[0x90, 60, 100]);
    }
}

// Ports MIDI de sortie

use midir::{MidiOutput, MidiOutputPort};

#[derive(Clone, Debug)]
pub struct MidiDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

pub struct MidiDeviceManager;

impl MidiDeviceManager {
    pub fn new() -> Self {
        Self
    }

    /// Liste tous les ports de sortie disponibles
    pub fn list_output_ports(&self) -> Vec<MidiDeviceInfo> {
        let mut devices = Vec::new();

        if let Ok(midi_out) = MidiOutput::new("mmi-drums scanner") {
            for (index, port) in midi_out.ports().iter().enumerate() {
                if let Ok(name) = midi_out.port_name(port) {
                    devices.push(MidiDeviceInfo {
                        id: format!("midi_out_{}", index),
                        name,
                        is_default: index == 0, // premier port = défaut
                    });
                }
            }
        }

        devices
    }

    /// Port par nom, ou le premier port si `name` est None
    pub fn find_output_port(&self, name: Option<&str>) -> Option<(MidiOutput, MidiOutputPort)> {
        let midi_out = MidiOutput::new("mmi-drums output").ok()?;
        let port = midi_out.ports().into_iter().find(|port| match name {
            Some(wanted) => midi_out
                .port_name(port)
                .map(|n| n == wanted)
                .unwrap_or(false),
            None => true,
        })?;
        Some((midi_out, port))
    }
}

impl Default for MidiDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_output_ports() {
        // Depends on the host; an empty list is fine
        let ports = MidiDeviceManager::new().list_output_ports();
        assert!(ports.iter().filter(|p| p.is_default).count() <= 1);
        for (a, b) in ports.iter().zip(ports.iter().skip(1)) {
            assert_ne!(a.id, b.id);
        }
    }
}

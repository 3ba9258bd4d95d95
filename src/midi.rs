//! MIDI utilities and message types
//!
//! Provides the small subset of MIDI parsing and encoding the Launchpad
//! driver needs: channel voice messages for buttons and complete SysEx
//! frames for the handshake.

use std::fmt;

/// SysEx start byte
pub const SYSEX_START: u8 = 0xF0;
/// SysEx end byte
pub const SYSEX_END: u8 = 0xF7;

/// MIDI message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// System Exclusive: the complete frame, `F0` and `F7` included
    SysEx { frame: Vec<u8> },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    ///
    /// Returns `None` for anything the surface does not care about
    /// (running status, realtime bytes, other channel messages). A SysEx
    /// frame is only returned when `F7` is its last byte.
    ///
    /// # Panics
    ///
    /// If a channel message carries a data byte above 127.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        if status == SYSEX_START {
            let end = data.iter().position(|&b| b == SYSEX_END)?;
            if end + 1 != data.len() {
                return None;
            }
            return Some(MidiMessage::SysEx {
                frame: data.to_vec(),
            });
        }

        if !(0x80..0xF0).contains(&status) || data.len() < 3 {
            return None;
        }

        let channel = status & 0x0F;
        let data1 = assert_data_byte(data[1]);
        let data2 = assert_data_byte(data[2]);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            }),
            // Note On with velocity 0 is a Note Off
            0x90 if data2 == 0 => Some(MidiMessage::NoteOff {
                channel,
                note: data1,
                velocity: 0,
            }),
            0x90 => Some(MidiMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            }),
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                cc: data1,
                value: data2,
            }),
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::SysEx { ref frame } => frame.clone(),
        }
    }

}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::SysEx { ref frame } => write!(f, "SysEx {} bytes", frame.len()),
        }
    }
}

/// Check the 7-bit data contract guaranteed by the transport layer.
///
/// A value outside 0-127 here is a programming error, not line noise.
pub fn assert_data_byte(value: u8) -> u8 {
    assert!(value < 0x80, "MIDI data byte out of range: {}", value);
    value
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let data = vec![0x90, 81, 127];
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(
            msg,
            MidiMessage::NoteOn {
                channel: 0,
                note: 81,
                velocity: 127,
            }
        );
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let msg = MidiMessage::parse(&[0x90, 60, 0]).unwrap();

        assert_eq!(
            msg,
            MidiMessage::NoteOff {
                channel: 0,
                note: 60,
                velocity: 0,
            }
        );
    }

    #[test]
    fn test_control_change() {
        let msg = MidiMessage::parse(&[0xB0, 16, 1]).unwrap();

        assert_eq!(
            msg,
            MidiMessage::ControlChange {
                channel: 0,
                cc: 16,
                value: 1,
            }
        );
    }

    #[test]
    fn test_sysex_keeps_full_frame() {
        let data = [0xF0, 0x00, 0x20, 0x29, 0x02, 0x18, 0x40, 0x12, 0x34, 0xF7];
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(msg, MidiMessage::SysEx { frame: data.to_vec() });
        assert_eq!(msg.encode(), data.to_vec());
    }

    #[test]
    fn test_unterminated_sysex_is_dropped() {
        assert!(MidiMessage::parse(&[0xF0, 0x00, 0x20]).is_none());
    }

    #[test]
    fn test_bytes_after_sysex_end_drop_the_frame() {
        assert!(MidiMessage::parse(&[0xF0, 0x00, 0x20, 0xF7, 0x00]).is_none());
        assert!(MidiMessage::parse(&[0xF0, 0xF7, 0x20, 0xF7]).is_none());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_data_byte_panics() {
        MidiMessage::parse(&[0xB0, 16, 0x81]);
    }

    #[test]
    fn test_ignored_messages() {
        assert!(MidiMessage::parse(&[]).is_none());
        assert!(MidiMessage::parse(&[0xF8]).is_none());
        assert!(MidiMessage::parse(&[0xE0, 0x00, 0x40]).is_none());
        assert!(MidiMessage::parse(&[0x90, 60]).is_none());
    }

    #[test]
    fn test_encode_control_change() {
        let msg = MidiMessage::ControlChange {
            channel: 0,
            cc: 17,
            value: 0x58,
        };

        assert_eq!(msg.encode(), vec![0xB0, 17, 0x58]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_data_byte_contract() {
        assert_data_byte(128);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xF0, 0x00, 0xF7]), "F0 00 F7");
    }
}

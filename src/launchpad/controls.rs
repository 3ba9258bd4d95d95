//! Control records
//!
//! One record per physical control. Whether a control tracks its last sent
//! value (and can be forced to resend it) is decided once, when the layout
//! is built, through the `configurable` flag.

use super::address::{AddressMapper, GridButton, SIDE_BUTTON_NAMES, TOP_BUTTON_NAMES};
use crate::midi::{assert_data_byte, MidiMessage};

/// Config button: CC 0 on channel 0
pub const CONFIG_BUTTON_CC: u8 = 0;

/// Write-probe ("user byte") control: CC 16 on channel 0
pub const WRITE_PROBE_CC: u8 = 16;

/// Message type a control speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Note,
    ControlChange,
}

/// What a control is on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRole {
    Grid(GridButton),
    Top(u8),
    Side(u8),
    Config,
    WriteProbe,
}

/// Index into a [`ControlLayout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(usize);

#[derive(Debug, Clone)]
pub struct Control {
    pub name: String,
    pub role: ControlRole,
    pub kind: ControlKind,
    pub channel: u8,
    pub identifier: u8,
    /// Tracks last value and honours forced resends
    pub configurable: bool,
    listening: bool,
    last_sent: Option<u8>,
    force_next: bool,
}

impl Control {
    fn new(name: String, role: ControlRole, kind: ControlKind, identifier: u8, configurable: bool) -> Self {
        Self {
            name,
            role,
            kind,
            channel: 0,
            identifier,
            configurable,
            listening: true,
            last_sent: None,
            force_next: false,
        }
    }

    /// Wire bytes carrying `value` on this control
    pub fn message(&self, value: u8) -> Vec<u8> {
        let value = assert_data_byte(value);
        match self.kind {
            ControlKind::Note => MidiMessage::NoteOn {
                channel: self.channel,
                note: self.identifier,
                velocity: value,
            }
            .encode(),
            ControlKind::ControlChange => MidiMessage::ControlChange {
                channel: self.channel,
                cc: self.identifier,
                value,
            }
            .encode(),
        }
    }

    /// Bytes to send for `value`, or `None` if the hardware already shows it
    pub fn prepare_send(&mut self, value: u8) -> Option<Vec<u8>> {
        if self.configurable && !self.force_next && self.last_sent == Some(value) {
            return None;
        }
        self.force_next = false;
        self.last_sent = Some(value);
        Some(self.message(value))
    }

    /// Next send goes out even if unchanged
    pub fn set_force_next_value(&mut self) {
        self.force_next = true;
    }

    pub fn force_next(&self) -> bool {
        self.force_next
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    fn matches(&self, message: &MidiMessage) -> Option<u8> {
        match (message, self.kind) {
            (&MidiMessage::NoteOn { channel, note, velocity }, ControlKind::Note)
                if channel == self.channel && note == self.identifier =>
            {
                Some(velocity)
            }
            (&MidiMessage::NoteOff { channel, note, .. }, ControlKind::Note)
                if channel == self.channel && note == self.identifier =>
            {
                Some(0)
            }
            (&MidiMessage::ControlChange { channel, cc, value }, ControlKind::ControlChange)
                if channel == self.channel && cc == self.identifier =>
            {
                Some(value)
            }
            _ => None,
        }
    }
}

/// Every control of one surface instance
#[derive(Debug, Clone)]
pub struct ControlLayout {
    controls: Vec<Control>,
    config: ControlId,
    write_probe: ControlId,
}

impl ControlLayout {
    pub fn new(mapper: &AddressMapper) -> Self {
        let mut controls = Vec::with_capacity(82);

        for button in GridButton::all() {
            controls.push(Control::new(
                button.name(),
                ControlRole::Grid(button),
                ControlKind::Note,
                mapper.note_for(button),
                true,
            ));
        }

        for (index, cc) in mapper.top_buttons().into_iter().enumerate() {
            controls.push(Control::new(
                TOP_BUTTON_NAMES[index].to_string(),
                ControlRole::Top(index as u8),
                ControlKind::ControlChange,
                cc,
                true,
            ));
        }

        for (index, note) in mapper.side_buttons().iter().enumerate() {
            controls.push(Control::new(
                SIDE_BUTTON_NAMES[index].to_string(),
                ControlRole::Side(index as u8),
                ControlKind::Note,
                *note,
                true,
            ));
        }

        let config = ControlId(controls.len());
        controls.push(Control::new(
            "Config_Button".to_string(),
            ControlRole::Config,
            ControlKind::ControlChange,
            CONFIG_BUTTON_CC,
            false,
        ));

        let write_probe = ControlId(controls.len());
        controls.push(Control::new(
            "User_Byte_Button".to_string(),
            ControlRole::WriteProbe,
            ControlKind::ControlChange,
            WRITE_PROBE_CC,
            false,
        ));

        Self {
            controls,
            config,
            write_probe,
        }
    }

    pub fn config(&self) -> ControlId {
        self.config
    }

    pub fn write_probe(&self) -> ControlId {
        self.write_probe
    }

    pub fn get(&self, id: ControlId) -> &Control {
        &self.controls[id.0]
    }

    pub fn get_mut(&mut self, id: ControlId) -> &mut Control {
        &mut self.controls[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    /// Control with the given role
    pub fn find_role(&self, role: ControlRole) -> Option<ControlId> {
        self.controls.iter().position(|c| c.role == role).map(ControlId)
    }

    /// Listening control addressed by an inbound message, with its value
    pub fn resolve(&self, message: &MidiMessage) -> Option<(ControlId, u8)> {
        self.controls.iter().enumerate().find_map(|(index, control)| {
            if !control.listening {
                return None;
            }
            control.matches(message).map(|value| (ControlId(index), value))
        })
    }

    /// Mark every configurable control for a full resend
    pub fn force_resend_all(&mut self) {
        for control in self.controls.iter_mut().filter(|c| c.configurable) {
            control.set_force_next_value();
        }
    }

    /// Stop routing inbound values to any control
    pub fn release_listeners(&mut self) {
        for control in &mut self.controls {
            control.listening = false;
        }
    }
}

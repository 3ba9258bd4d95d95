//! Mode selector boundary
//!
//! Session, mixer, instrument and step-sequencer modes live outside this
//! crate. The surface talks to them only through [`ModeSelector`].

use tracing::debug;

/// Mode index of the session view
pub const SESSION_MODE: usize = 0;

/// Mode index of the user/instrument modes whose sub-modes remap drum notes
pub const INSTRUMENT_MODE: usize = 1;

/// Default logical width of one surface's session box
pub const DEFAULT_SESSION_WIDTH: u32 = 8;

pub trait ModeSelector {
    /// Whether mode logic may run and render
    fn set_enabled(&mut self, enabled: bool);
    fn set_mode(&mut self, mode_index: usize);
    fn mode_index(&self) -> usize;
    /// Sub-mode of the active mode
    fn sub_mode_index(&self) -> usize;
    /// MIDI channel instrument notes are translated to in the active mode
    fn channel_for_current_mode(&self) -> u8;

    fn session_width(&self) -> u32;
    fn has_device_component(&self) -> bool;
    fn link_session(&mut self, track_offset: u32);
    fn unlink_session(&mut self);
    fn link_step_sequencer(&mut self, track_offset: u32);
    fn unlink_step_sequencer(&mut self);
    fn set_support_devices(&mut self, support_devices: bool);
}

/// Bookkeeping selector used when no richer mode layer is attached
#[derive(Debug, Clone)]
pub struct SessionSelector {
    pub enabled: bool,
    pub mode_index: usize,
    pub sub_modes: [usize; 4],
    pub session_width: u32,
    pub device_component: bool,
    pub session_offset: Option<u32>,
    pub stepseq_offset: Option<u32>,
    pub support_devices: bool,
}

impl SessionSelector {
    pub fn new(session_width: u32, device_component: bool) -> Self {
        Self {
            enabled: false,
            mode_index: SESSION_MODE,
            sub_modes: [0; 4],
            session_width,
            device_component,
            session_offset: None,
            stepseq_offset: None,
            support_devices: false,
        }
    }

    pub fn set_sub_mode(&mut self, mode_index: usize, sub_mode: usize) {
        if let Some(slot) = self.sub_modes.get_mut(mode_index) {
            *slot = sub_mode;
        }
    }
}

impl Default for SessionSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_WIDTH, false)
    }
}

impl ModeSelector for SessionSelector {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_mode(&mut self, mode_index: usize) {
        debug!("Mode {} -> {}", self.mode_index, mode_index);
        self.mode_index = mode_index;
    }

    fn mode_index(&self) -> usize {
        self.mode_index
    }

    fn sub_mode_index(&self) -> usize {
        self.sub_modes.get(self.mode_index).copied().unwrap_or(0)
    }

    fn channel_for_current_mode(&self) -> u8 {
        // User modes sit above the session channel, one per sub-mode
        (self.mode_index * 4 + self.sub_mode_index()).min(15) as u8
    }

    fn session_width(&self) -> u32 {
        self.session_width
    }

    fn has_device_component(&self) -> bool {
        self.device_component
    }

    fn link_session(&mut self, track_offset: u32) {
        self.session_offset = Some(track_offset);
    }

    fn unlink_session(&mut self) {
        self.session_offset = None;
    }

    fn link_step_sequencer(&mut self, track_offset: u32) {
        self.stepseq_offset = Some(track_offset);
    }

    fn unlink_step_sequencer(&mut self) {
        self.stepseq_offset = None;
    }

    fn set_support_devices(&mut self, support_devices: bool) {
        self.support_devices = support_devices;
    }
}

//! Launchpad surface instance
//!
//! One [`Launchpad`] per connected device. It owns the control layout, the
//! output gate and the handshake for that device and reacts to:
//! - inbound MIDI (`handle_midi`)
//! - the deferred hardware update scheduled by `refresh_state`
//! - the two-phase disconnect driven by the host

pub mod address;
pub mod controls;
pub mod enablement;
pub mod handshake;
pub mod output_gate;
pub mod responder;
pub mod selector;


use std::rc::Rc;
use tracing::{debug, info, trace};

use crate::combination::{CombinationMember, InstanceId};
use crate::midi::{assert_data_byte, format_hex, MidiMessage};

use address::{AddressMapper, DeviceVariant};
use controls::{ControlLayout, ControlRole};
use enablement::{EnablementContext, EnablementController, EnablementState};
use handshake::{Challenge, ChallengeResponder, HandshakeEngine, RandomSource};
use output_gate::{MidiTransport, OutputGate};
use selector::{ModeSelector, INSTRUMENT_MODE};

/// Ticks between `refresh_state` and the probe write
pub const DEFAULT_PROBE_DELAY_TICKS: u64 = 5;

/// Static settings of one surface
#[derive(Debug, Clone)]
pub struct LaunchpadSettings {
    pub name: String,
    pub variant: DeviceVariant,
    pub probe_delay_ticks: u64,
}

impl LaunchpadSettings {
    pub fn new(name: impl Into<String>, variant: DeviceVariant) -> Self {
        Self {
            name: name.into(),
            variant,
            probe_delay_ticks: DEFAULT_PROBE_DELAY_TICKS,
        }
    }
}

/// A deferred hardware update the host must schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    pub delay_ticks: u64,
    pub epoch: u64,
}

/// Something the host or mode layer should know about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A mapped button changed while the surface is enabled
    Button { role: ControlRole, value: u8 },
    /// The probe read-back was evaluated
    ProbeResolved { shadowed: bool },
    /// The challenge response was verified
    Enabled,
}

/// Note remapping produced when the MIDI map is rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteTranslation {
    pub note: u8,
    pub channel: u8,
}

pub struct Launchpad {
    id: InstanceId,
    settings: LaunchpadSettings,
    mapper: AddressMapper,
    controls: ControlLayout,
    gate: OutputGate,
    handshake: HandshakeEngine,
    enablement: EnablementController,
    selector: Box<dyn ModeSelector>,
    responder: Rc<dyn ChallengeResponder>,
    random: Box<dyn RandomSource>,
    /// Bumped on every activation so stale deferred updates are dropped
    epoch: u64,
}

impl Launchpad {
    pub fn new(
        id: InstanceId,
        settings: LaunchpadSettings,
        transport: Box<dyn MidiTransport>,
        selector: Box<dyn ModeSelector>,
        responder: Rc<dyn ChallengeResponder>,
        mut random: Box<dyn RandomSource>,
    ) -> Self {
        let mapper = AddressMapper::new(settings.variant);
        let handshake = HandshakeEngine::new(settings.variant, random.as_mut());

        info!("{} {} ({}) loaded", settings.variant, settings.name, id);

        Self {
            id,
            mapper,
            controls: ControlLayout::new(&mapper),
            gate: OutputGate::new(transport),
            handshake,
            enablement: EnablementController::new(settings.variant),
            selector,
            responder,
            random,
            epoch: 0,
            settings,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn variant(&self) -> DeviceVariant {
        self.settings.variant
    }

    pub fn mapper(&self) -> &AddressMapper {
        &self.mapper
    }

    pub fn controls(&self) -> &ControlLayout {
        &self.controls
    }

    pub fn state(&self) -> EnablementState {
        self.enablement.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.enablement.is_enabled()
    }

    pub fn is_shadowed(&self) -> bool {
        self.enablement.is_shadowed()
    }

    pub fn is_suppressed(&self) -> bool {
        self.gate.is_suppressed()
    }

    pub fn is_alive(&self) -> bool {
        self.enablement.state() != EnablementState::Disabled
    }

    pub fn challenge(&self) -> Challenge {
        self.handshake.challenge()
    }

    pub fn selector(&self) -> &dyn ModeSelector {
        self.selector.as_ref()
    }

    fn split(&mut self) -> (&mut EnablementController, EnablementContext<'_>) {
        (
            &mut self.enablement,
            EnablementContext {
                gate: &mut self.gate,
                controls: &mut self.controls,
                handshake: &self.handshake,
                selector: self.selector.as_mut(),
            },
        )
    }

    /// Host asks for a full re-sync
    ///
    /// Starts a fresh activation cycle; every cycle after the first draws
    /// a new challenge. Returns the deferred update to schedule, or `None`
    /// once disconnected.
    pub fn refresh_state(&mut self) -> Option<ProbeRequest> {
        if !self.is_alive() {
            return None;
        }

        if self.epoch > 0 {
            self.handshake = HandshakeEngine::new(self.settings.variant, self.random.as_mut());
        }
        self.enablement.reset();
        self.epoch += 1;

        debug!(
            "{} refresh, hardware update in {} ticks",
            self.settings.name, self.settings.probe_delay_ticks
        );
        Some(ProbeRequest {
            delay_ticks: self.settings.probe_delay_ticks,
            epoch: self.epoch,
        })
    }

    /// Deferred half of `refresh_state`
    pub fn update_hardware(&mut self, epoch: u64) {
        if epoch != self.epoch {
            trace!("Stale hardware update (epoch {} != {})", epoch, self.epoch);
            return;
        }
        let (enablement, cx) = self.split();
        enablement.update_hardware(cx);
    }

    /// Dispatch one inbound MIDI message
    pub fn handle_midi(&mut self, data: &[u8]) -> Option<SurfaceEvent> {
        let Some(message) = MidiMessage::parse(data) else {
            trace!("Unhandled MIDI: {}", format_hex(data));
            return None;
        };

        if let MidiMessage::SysEx { frame } = &message {
            return self.handle_sysex(frame);
        }

        let (control, value) = self.controls.resolve(&message)?;
        let value = assert_data_byte(value);

        match self.controls.get(control).role {
            ControlRole::WriteProbe => {
                let armed = self.enablement.sentinel_armed();
                let (enablement, cx) = self.split();
                enablement.on_probe_value(value, cx);
                armed.then(|| SurfaceEvent::ProbeResolved {
                    shadowed: self.enablement.is_shadowed(),
                })
            }
            ControlRole::Config => None,
            role => self
                .enablement
                .is_enabled()
                .then_some(SurfaceEvent::Button { role, value }),
        }
    }

    fn handle_sysex(&mut self, frame: &[u8]) -> Option<SurfaceEvent> {
        let responder = Rc::clone(&self.responder);
        let (enablement, cx) = self.split();
        enablement
            .on_sysex(frame, responder.as_ref(), cx)
            .then_some(SurfaceEvent::Enabled)
    }

    /// Send a value to a control on behalf of the mode layer
    ///
    /// Dropped while logically disabled, whatever the gate says.
    pub fn render(&mut self, role: ControlRole, value: u8) -> bool {
        if !self.enablement.is_enabled() {
            trace!("Render {:?}={} while disabled, dropped", role, value);
            return false;
        }
        let Some(control) = self.controls.find_role(role) else {
            return false;
        };
        match self.controls.get_mut(control).prepare_send(value) {
            Some(bytes) => self.gate.send(&bytes),
            None => false,
        }
    }

    /// Explicitly switch the surface off
    pub fn disable(&mut self) {
        self.enablement.disable(&mut self.gate, self.selector.as_mut());
    }

    /// Note translations for the current mode
    ///
    /// Only instrument sub-modes remap the drum notes to their channel.
    pub fn build_midi_map(&self) -> Vec<NoteTranslation> {
        if self.selector.mode_index() != INSTRUMENT_MODE || self.selector.sub_mode_index() == 0 {
            return Vec::new();
        }

        let channel = self.selector.channel_for_current_mode();
        self.mapper
            .drum_notes()
            .iter()
            .map(|&note| NoteTranslation { note, channel })
            .collect()
    }

    /// Silence the surface and stop listening; leaves teardown to
    /// `finish_disconnect`
    pub fn begin_disconnect(&mut self) {
        self.epoch += 1;
        self.enablement
            .begin_disconnect(&mut self.gate, &mut self.controls);
    }

    pub fn finish_disconnect(&mut self) {
        self.enablement
            .finish_disconnect(&mut self.gate, &mut self.controls);
    }
}

impl CombinationMember for Launchpad {
    fn session_width(&self) -> u32 {
        self.selector.session_width()
    }

    fn has_device_component(&self) -> bool {
        self.selector.has_device_component()
    }

    fn link_session(&mut self, track_offset: u32) {
        self.selector.link_session(track_offset);
    }

    fn unlink_session(&mut self) {
        self.selector.unlink_session();
    }

    fn link_step_sequencer(&mut self, track_offset: u32) {
        self.selector.link_step_sequencer(track_offset);
    }

    fn unlink_step_sequencer(&mut self) {
        self.selector.unlink_step_sequencer();
    }

    fn set_support_devices(&mut self, support_devices: bool) {
        self.selector.set_support_devices(support_devices);
    }
}

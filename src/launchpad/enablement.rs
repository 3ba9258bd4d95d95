//! Enablement state machine
//!
//! ```text
//! AwaitingSentinel --probe+challenge--> AwaitingChallengeResponse --valid response--> Enabled
//!        \________________________ disable / disconnect ____________________/--> Disabled
//! ```
//!
//! Two separate switches are driven from here: the output gate (does any
//! byte reach the wire) and the logical enabled flag (may mode logic run).

use std::fmt;
use tracing::{debug, info, trace, warn};

use super::address::DeviceVariant;
use super::controls::ControlLayout;
use super::handshake::{ChallengeResponder, HandshakeEngine, MK2_SYSEX_HEADER};
use super::output_gate::OutputGate;
use super::selector::{ModeSelector, SESSION_MODE};
use crate::midi::{assert_data_byte, SYSEX_END};

/// Value written to the probe control during activation
pub const PROBE_SENTINEL: u8 = 1;

/// Value the config button receives first on disconnect
pub const CONFIG_DISCONNECT_VALUE: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnablementState {
    AwaitingSentinel,
    AwaitingChallengeResponse,
    Enabled,
    Disabled,
}

impl fmt::Display for EnablementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnablementState::AwaitingSentinel => "awaiting sentinel",
            EnablementState::AwaitingChallengeResponse => "awaiting challenge response",
            EnablementState::Enabled => "enabled",
            EnablementState::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Borrowed pieces of the surface the controller drives
pub struct EnablementContext<'a> {
    pub gate: &'a mut OutputGate,
    pub controls: &'a mut ControlLayout,
    pub handshake: &'a HandshakeEngine,
    pub selector: &'a mut dyn ModeSelector,
}

#[derive(Debug)]
pub struct EnablementController {
    variant: DeviceVariant,
    state: EnablementState,
    /// Set by the probe write, consumed by its read-back
    sentinel_armed: bool,
    /// Logical enabled flag gating mode-driven output
    enabled: bool,
    shadowed: bool,
}

impl EnablementController {
    pub fn new(variant: DeviceVariant) -> Self {
        Self {
            variant,
            state: EnablementState::AwaitingSentinel,
            sentinel_armed: false,
            enabled: false,
            shadowed: false,
        }
    }

    pub fn state(&self) -> EnablementState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_shadowed(&self) -> bool {
        self.shadowed
    }

    pub fn sentinel_armed(&self) -> bool {
        self.sentinel_armed
    }

    /// Back to the start of a fresh activation cycle
    pub fn reset(&mut self) {
        if self.state == EnablementState::Disabled {
            return;
        }
        self.state = EnablementState::AwaitingSentinel;
        self.sentinel_armed = false;
    }

    /// Flip the logical enabled flag and tell the mode layer
    pub fn set_enabled(&mut self, enabled: bool, selector: &mut dyn ModeSelector) {
        if self.enabled != enabled {
            debug!("Logical output {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
        selector.set_enabled(enabled);
    }

    /// Deferred activation step: probe write, then the challenge
    pub fn update_hardware(&mut self, cx: EnablementContext<'_>) {
        if self.state == EnablementState::Disabled {
            trace!("Hardware update after disconnect ignored");
            return;
        }

        let probe = cx.controls.write_probe();

        cx.gate.unsuppress();
        self.sentinel_armed = true;
        if let Some(bytes) = cx.controls.get_mut(probe).prepare_send(PROBE_SENTINEL) {
            cx.gate.send(&bytes);
        }
        // Mode teardown triggered by disabling must not reach the wire
        cx.gate.suppress();
        self.set_enabled(false, cx.selector);
        cx.gate.unsuppress();

        for message in cx.handshake.challenge_messages() {
            cx.gate.send(&message);
        }

        self.state = EnablementState::AwaitingChallengeResponse;
        info!(
            "{} challenge {} sent, {}",
            self.variant,
            cx.handshake.challenge(),
            self.state
        );
    }

    /// Value read back from the write-probe control
    pub fn on_probe_value(&mut self, value: u8, cx: EnablementContext<'_>) {
        let value = assert_data_byte(value);

        if !self.sentinel_armed {
            trace!("Probe control value {} outside a probe, ignored", value);
            return;
        }
        self.sentinel_armed = false;

        let free = value == PROBE_SENTINEL;
        self.shadowed = !free;
        if self.shadowed {
            warn!(
                "{} is shadowed by another driver (probe read back {}), output suppressed",
                self.variant, value
            );
        } else {
            debug!("{} probe confirmed, control is free", self.variant);
        }

        cx.gate.set_suppressed(self.shadowed);
        cx.controls.force_resend_all();
        cx.selector.set_mode(SESSION_MODE);
        self.set_enabled(free, cx.selector);
    }

    /// Inbound SysEx; only a verified response while waiting for one counts
    ///
    /// Returns true when the surface became enabled.
    pub fn on_sysex(
        &mut self,
        frame: &[u8],
        responder: &dyn ChallengeResponder,
        cx: EnablementContext<'_>,
    ) -> bool {
        if self.state != EnablementState::AwaitingChallengeResponse {
            trace!("SysEx while {}, ignored", self.state);
            return false;
        }
        if !cx.handshake.verify(frame, responder) {
            return false;
        }

        cx.gate.unsuppress();
        self.set_enabled(true, cx.selector);
        self.state = EnablementState::Enabled;
        info!("{} challenge response ok, surface {}", self.variant, self.state);
        true
    }

    /// Explicit disable: silence the surface and stop mode logic
    pub fn disable(&mut self, gate: &mut OutputGate, selector: &mut dyn ModeSelector) {
        gate.suppress();
        self.set_enabled(false, selector);
        self.sentinel_armed = false;
        self.state = EnablementState::Disabled;
        info!("{} {}", self.variant, self.state);
    }

    /// First half of disconnect: silence and stop listening
    pub fn begin_disconnect(&mut self, gate: &mut OutputGate, controls: &mut ControlLayout) {
        gate.suppress();
        controls.release_listeners();
        self.sentinel_armed = false;
        self.enabled = false;
        self.state = EnablementState::Disabled;
    }

    /// Second half of disconnect: device teardown bytes, then stay silent
    pub fn finish_disconnect(&mut self, gate: &mut OutputGate, controls: &mut ControlLayout) {
        let variant = self.variant;
        let config = controls.config();
        let probe = controls.write_probe();

        gate.with_unsuppressed(|gate| {
            if variant == DeviceVariant::Mk2Rgb {
                let mut notice = MK2_SYSEX_HEADER.to_vec();
                notice.push(SYSEX_END);
                gate.send(&notice);
            }

            for value in [CONFIG_DISCONNECT_VALUE, 0] {
                if let Some(bytes) = controls.get_mut(config).prepare_send(value) {
                    gate.send(&bytes);
                }
            }
            if let Some(bytes) = controls.get_mut(probe).prepare_send(0) {
                gate.send(&bytes);
            }
        });

        gate.suppress();
        info!("{} disconnected", variant);
    }
}

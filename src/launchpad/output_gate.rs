//! Output gate
//!
//! Every byte the surface emits goes through [`OutputGate::send`]. While the
//! gate is suppressed nothing reaches the transport.

use tracing::{trace, warn};

use crate::error::Result;
use crate::midi::format_hex;

/// Raw byte sink towards the hardware
pub trait MidiTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Suppression switch in front of a transport
pub struct OutputGate {
    transport: Box<dyn MidiTransport>,
    suppressed: bool,
}

impl OutputGate {
    /// New gates start suppressed
    pub fn new(transport: Box<dyn MidiTransport>) -> Self {
        Self {
            transport,
            suppressed: true,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    pub fn unsuppress(&mut self) {
        self.suppressed = false;
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    /// Send bytes unless suppressed. Returns whether they were sent.
    ///
    /// Transport failures are logged and reported as "not sent" so a
    /// suppress/write/unsuppress sequence always runs to completion.
    pub fn send(&mut self, bytes: &[u8]) -> bool {
        if self.suppressed {
            trace!("Suppressed: {}", format_hex(bytes));
            return false;
        }

        match self.transport.send(bytes) {
            Ok(()) => {
                trace!("Sent: {}", format_hex(bytes));
                true
            }
            Err(e) => {
                warn!("Failed to send {}: {}", format_hex(bytes), e);
                false
            }
        }
    }

    /// Run `f` with the gate open, then restore the previous state
    pub fn with_unsuppressed<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.suppressed;
        self.suppressed = false;
        let result = f(self);
        self.suppressed = previous;
        result
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;
    use crate::error::SurfaceError;

    struct FailingTransport;

    impl MidiTransport for FailingTransport {
        fn send(&mut self, _bytes: &[u8]) -> Result<()> {
            Err(SurfaceError::Transport("port closed".to_string()))
        }
    }

    #[test]
    fn test_gate_starts_suppressed() {
        let transport = RecordingTransport::new();
        let mut gate = OutputGate::new(Box::new(transport.clone()));

        assert!(gate.is_suppressed());
        assert!(!gate.send(&[0xB0, 16, 1]));
        assert!(transport.frames().is_empty());
    }

    #[test]
    fn test_unsuppressed_send_reaches_transport() {
        let transport = RecordingTransport::new();
        let mut gate = OutputGate::new(Box::new(transport.clone()));

        gate.unsuppress();
        assert!(gate.send(&[0xB0, 16, 1]));
        gate.suppress();
        assert!(!gate.send(&[0xB0, 16, 0]));

        assert_eq!(transport.frames(), vec![vec![0xB0, 16, 1]]);
    }

    #[test]
    fn test_with_unsuppressed_restores_state() {
        let transport = RecordingTransport::new();
        let mut gate = OutputGate::new(Box::new(transport.clone()));

        let sent = gate.with_unsuppressed(|g| g.send(&[0xB0, 0, 32]));

        assert!(sent);
        assert!(gate.is_suppressed());
        assert_eq!(transport.frames().len(), 1);
    }

    #[test]
    fn test_transport_failure_is_not_sent() {
        let mut gate = OutputGate::new(Box::new(FailingTransport));
        gate.unsuppress();

        assert!(!gate.send(&[0x90, 81, 5]));
    }
}

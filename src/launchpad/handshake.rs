//! Challenge/response handshake
//!
//! The host sends a 32-bit challenge split into four 7-bit bytes; genuine
//! hardware answers with a 16-bit response. The transform from challenge to
//! response is owned by the platform and reached through
//! [`ChallengeResponder`]; this module only frames, parses and compares.

use rand::Rng;
use std::fmt;
use tracing::{debug, trace};

use super::address::DeviceVariant;
use crate::midi::{format_hex, SYSEX_END};

/// Keeps the low 7 bits of every byte
pub const CHALLENGE_MASK: u32 = 0x7F7F_7F7F;

/// Novation SysEx header used by the MK2 for challenge and response
pub const MK2_SYSEX_HEADER: [u8; 7] = [0xF0, 0x00, 0x20, 0x29, 0x02, 0x18, 0x40];

/// Bytes 1..5 of a classic response frame
pub const CLASSIC_RESPONSE_SIGNATURE: [u8; 4] = [0x00, 0x20, 0x29, 0x06];

/// Classic challenge byte `i` goes out on CC `17 + i`
pub const CLASSIC_CHALLENGE_BASE_CC: u8 = 17;

const MK2_RESPONSE_LEN: usize = 10;
const CLASSIC_RESPONSE_LEN: usize = 8;

/// Per-session challenge value, always masked to 7-bit bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Challenge(u32);

impl Challenge {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw & CHALLENGE_MASK)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// The four wire bytes, least significant first
    pub fn bytes(&self) -> [u8; 4] {
        std::array::from_fn(|index| ((self.0 >> (8 * index)) & 0x7F) as u8)
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Source of challenge entropy
pub trait RandomSource {
    fn next_u32(&mut self) -> u32;
}

/// Thread-local RNG from `rand`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u32(&mut self) -> u32 {
        rand::rng().random()
    }
}

/// Always yields the same value (bench setups and tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub u32);

impl RandomSource for FixedRandom {
    fn next_u32(&mut self) -> u32 {
        self.0
    }
}

/// Platform service computing the expected response for a challenge
pub trait ChallengeResponder {
    /// `None` when the expectation cannot be computed; the handshake then
    /// never passes.
    fn expected_response(&self, challenge: Challenge) -> Option<u16>;
}

/// Builds challenge messages and checks responses for one connection session
#[derive(Debug, Clone)]
pub struct HandshakeEngine {
    variant: DeviceVariant,
    challenge: Challenge,
}

impl HandshakeEngine {
    pub fn new(variant: DeviceVariant, random: &mut dyn RandomSource) -> Self {
        let challenge = Challenge::from_raw(random.next_u32());
        debug!("New {} challenge {}", variant, challenge);
        Self { variant, challenge }
    }

    pub fn challenge(&self) -> Challenge {
        self.challenge
    }

    /// Messages carrying the challenge, in send order
    pub fn challenge_messages(&self) -> Vec<Vec<u8>> {
        let bytes = self.challenge.bytes();

        match self.variant {
            DeviceVariant::Mk2Rgb => {
                let mut frame = Vec::with_capacity(MK2_SYSEX_HEADER.len() + 5);
                frame.extend_from_slice(&MK2_SYSEX_HEADER);
                frame.extend_from_slice(&bytes);
                frame.push(SYSEX_END);
                vec![frame]
            }
            DeviceVariant::Classic => bytes
                .iter()
                .enumerate()
                .map(|(index, byte)| vec![0xB0, CLASSIC_CHALLENGE_BASE_CC + index as u8, *byte])
                .collect(),
        }
    }

    /// Extract the 16-bit response from a frame, if it is shaped like one
    pub fn parse_response(&self, frame: &[u8]) -> Option<u16> {
        let (lsb, msb) = match self.variant {
            DeviceVariant::Mk2Rgb => {
                if frame.len() != MK2_RESPONSE_LEN || frame[..7] != MK2_SYSEX_HEADER {
                    return None;
                }
                (frame[7], frame[8])
            }
            DeviceVariant::Classic => {
                if frame.len() != CLASSIC_RESPONSE_LEN || frame[1..5] != CLASSIC_RESPONSE_SIGNATURE {
                    return None;
                }
                (frame[5], frame[6])
            }
        };

        Some(u16::from(lsb) | (u16::from(msb) << 8))
    }

    /// True iff `frame` is a well-formed response matching the expectation
    pub fn verify(&self, frame: &[u8], responder: &dyn ChallengeResponder) -> bool {
        let Some(response) = self.parse_response(frame) else {
            trace!("Not a handshake response: {}", format_hex(frame));
            return false;
        };

        match responder.expected_response(self.challenge) {
            Some(expected) if expected == response => true,
            Some(expected) => {
                debug!(
                    "Handshake response 0x{:04X} does not match expected 0x{:04X}",
                    response, expected
                );
                false
            }
            None => {
                debug!("No expected response available for challenge {}", self.challenge);
                false
            }
        }
    }
}

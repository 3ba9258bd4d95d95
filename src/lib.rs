//! Launchpad GW - grid controller driver core
//!
//! Drives Novation Launchpad surfaces (classic and MK2): address mapping,
//! gated output, the challenge/response handshake that unlocks a surface,
//! shadow detection through a write probe, and combining several surfaces
//! into one wider session.

pub mod combination;
pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod launchpad;
pub mod midi;
pub mod scheduler;

pub use combination::{CombinationCoordinator, CombineFlags, InstanceId};
pub use error::{Result, SurfaceError};
pub use host::SurfaceHost;
pub use launchpad::{Launchpad, LaunchpadSettings, SurfaceEvent};
